//! In-memory gateway for tests and offline runs.
//!
//! [`ScriptedGateway`] answers requests from per-path scripts instead of the
//! network. Each path has an optional default reply (returned every time) and
//! a FIFO queue of one-shot replies consumed first. Replies can carry an
//! artificial latency or a [`Gate`] that holds the request open until the test
//! releases it, which is how response-ordering races are reproduced.
//!
//! Paths are endpoint paths without the base URL, e.g. `/alerts`,
//! `/verify/FIRE-001`, `/api/fire-spread`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::error::FetchError;
use crate::gateway::{Endpoint, FetchGateway, Method};

/// Releases a held request.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    notify: Arc<Notify>,
}

impl Gate {
    /// Let the held request complete. Safe to call before the request arrives.
    pub fn release(&self) {
        self.notify.notify_one();
    }
}

/// One scripted reply.
#[derive(Debug, Clone)]
pub struct Reply {
    outcome: Result<Value, FetchError>,
    delay: Duration,
    gate: Option<Gate>,
}

impl Reply {
    pub fn ok(value: Value) -> Self {
        Self {
            outcome: Ok(value),
            delay: Duration::ZERO,
            gate: None,
        }
    }

    pub fn err(error: FetchError) -> Self {
        Self {
            outcome: Err(error),
            delay: Duration::ZERO,
            gate: None,
        }
    }

    /// Respond only after `delay` has elapsed.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Hold the request until the returned gate is released.
    pub fn gated(mut self) -> (Self, Gate) {
        let gate = Gate::default();
        self.gate = Some(gate.clone());
        (self, gate)
    }
}

/// A request seen by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Value of a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct Script {
    default: Option<Reply>,
    queue: VecDeque<Reply>,
    in_flight: usize,
    max_in_flight: usize,
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, Script>,
    log: Vec<RecordedRequest>,
}

/// Scripted, in-memory [`FetchGateway`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    state: Arc<Mutex<State>>,
}

/// Path of an endpoint as used for scripting.
pub fn endpoint_path(endpoint: &Endpoint) -> String {
    format!("/{}", endpoint.segments().join("/"))
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<R>(&self, path: &str, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(state.scripts.entry(path.to_string()).or_default())
    }

    /// Answer every request to `path` with `value`.
    pub fn respond(&self, path: &str, value: Value) -> &Self {
        self.set_default(path, Reply::ok(value))
    }

    /// Fail every request to `path` with `error`.
    pub fn fail(&self, path: &str, error: FetchError) -> &Self {
        self.set_default(path, Reply::err(error))
    }

    /// Replace the default reply for `path`.
    pub fn set_default(&self, path: &str, reply: Reply) -> &Self {
        self.with_script(path, |s| s.default = Some(reply));
        self
    }

    /// Queue a one-shot reply for `path`, used before the default.
    pub fn enqueue(&self, path: &str, reply: Reply) -> &Self {
        self.with_script(path, |s| s.queue.push_back(reply));
        self
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .log
            .clone()
    }

    /// Number of requests seen for `path`.
    pub fn request_count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    /// Highest number of simultaneously open requests observed for `path`.
    pub fn max_in_flight(&self, path: &str) -> usize {
        self.with_script(path, |s| s.max_in_flight)
    }
}

#[async_trait]
impl FetchGateway for ScriptedGateway {
    async fn request(
        &self,
        endpoint: &Endpoint,
        method: Method,
        _body: Option<&Value>,
    ) -> Result<Value, FetchError> {
        let path = endpoint_path(endpoint);

        let reply = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.log.push(RecordedRequest {
                method,
                path: path.clone(),
                query: endpoint
                    .query()
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            });
            let script = state.scripts.entry(path.clone()).or_default();
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
            script.queue.pop_front().or_else(|| script.default.clone())
        };

        let outcome = match reply {
            Some(reply) => {
                if !reply.delay.is_zero() {
                    tokio::time::sleep(reply.delay).await;
                }
                if let Some(gate) = &reply.gate {
                    gate.notify.notified().await;
                }
                reply.outcome
            }
            None => Err(FetchError::http_status(404, format!("no scripted reply for {path}"))),
        };

        self.with_script(&path, |s| s.in_flight -= 1);
        outcome
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_default_and_queue() {
        let gw = ScriptedGateway::new();
        gw.respond("/alerts", json!({"alerts": []}));
        gw.enqueue("/alerts", Reply::err(FetchError::network("refused")));

        assert!(gw.get(&Endpoint::Alerts).await.is_err());
        assert_eq!(gw.get(&Endpoint::Alerts).await.unwrap(), json!({"alerts": []}));
        assert_eq!(gw.request_count("/alerts"), 2);
    }

    #[tokio::test]
    async fn test_unscripted_path_is_404() {
        let gw = ScriptedGateway::new();
        let err = gw.get(&Endpoint::Drones).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_gate_released_before_request() {
        let gw = ScriptedGateway::new();
        let (reply, gate) = Reply::ok(json!(1)).gated();
        gw.enqueue("/drones", reply);
        gate.release();
        assert_eq!(gw.get(&Endpoint::Drones).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_records_query() {
        let gw = ScriptedGateway::new();
        gw.respond("/api/fire-spread", json!({}));
        let endpoint = Endpoint::FireSpread {
            lat: 1.5,
            lng: 2.5,
            wind_speed: 15.0,
            wind_direction: "N".to_string(),
        };
        gw.get(&endpoint).await.unwrap();

        let requests = gw.requests();
        assert_eq!(requests[0].param("wind_speed"), Some("15"));
        assert_eq!(requests[0].param("wind_direction"), Some("N"));
        assert_eq!(requests[0].method, Method::Get);
    }
}
