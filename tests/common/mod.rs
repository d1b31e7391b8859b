//! Scripted stand-in for the report service.
//!
//! Serves `POST /uploadContent` on an ephemeral local port. Responses are
//! taken from a script in order; once it runs out the fallback response is
//! used. Every request's query, body and arrival time are recorded together
//! with the peak number of concurrently open requests.

#![allow(dead_code)]

use arcdps_log_uploader::config::UploaderConfig;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use warp::hyper::body::Bytes;
use warp::Filter;

#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub delay: Duration,
}

impl ScriptedResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// 200 with a valid report named after `id`
    pub fn report(id: &str) -> Self {
        Self::new(200, report_body(id))
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(429, "").with_header("Retry-After", &retry_after_secs.to_string())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub fn report_body(id: &str) -> String {
    serde_json::json!({
        "id": id,
        "error": null,
        "permalink": format!("https://dps.report/{}", id),
        "encounter": { "duration": 95 },
        "encounterTime": 1704110400
    })
    .to_string()
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub query: HashMap<String, String>,
    pub body: Bytes,
    pub received_at: Instant,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug)]
struct ServerState {
    script: Mutex<VecDeque<ScriptedResponse>>,
    fallback: Mutex<ScriptedResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a server answering with `script`, then with a valid report
    pub fn start(script: Vec<ScriptedResponse>) -> Self {
        Self::start_with_fallback(script, ScriptedResponse::report("fallback"))
    }

    pub fn start_with_fallback(script: Vec<ScriptedResponse>, fallback: ScriptedResponse) -> Self {
        let state = Arc::new(ServerState {
            script: Mutex::new(script.into()),
            fallback: Mutex::new(fallback),
            requests: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });

        let state_filter = {
            let state = Arc::clone(&state);
            warp::any().map(move || Arc::clone(&state))
        };

        let route = warp::post()
            .and(warp::path("uploadContent"))
            .and(warp::path::end())
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::body::bytes())
            .and(state_filter)
            .and_then(Self::handle_upload);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(route).bind_with_graceful_shutdown(
            ([127, 0, 0, 1], 0),
            async {
                shutdown_rx.await.ok();
            },
        );
        tokio::spawn(server);

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    async fn handle_upload(
        query: HashMap<String, String>,
        body: Bytes,
        state: Arc<ServerState>,
    ) -> Result<warp::http::Response<String>, Infallible> {
        let active = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_active.fetch_max(active, Ordering::SeqCst);

        state.requests.lock().unwrap().push(RecordedRequest {
            query,
            body,
            received_at: Instant::now(),
        });

        let scripted = state.script.lock().unwrap().pop_front();
        let response = scripted.unwrap_or_else(|| state.fallback.lock().unwrap().clone());

        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }
        state.active.fetch_sub(1, Ordering::SeqCst);

        let mut builder = warp::http::Response::builder().status(response.status);
        for (name, value) in &response.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        Ok(builder.body(response.body).unwrap())
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/uploadContent", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }

    /// Config pointing at this server with a permissive rate limit and no
    /// cool-down grace
    pub fn config(&self) -> UploaderConfig {
        let mut config = UploaderConfig {
            endpoint: self.endpoint(),
            ..UploaderConfig::default()
        };
        config.rate_limit.refill_interval_secs = 0.01;
        config.rate_limit.burst = 100;
        config.retry.cooldown_grace_secs = 0;
        config.retry.request_timeout_secs = 30;
        config
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Write a fake log file named `name` into `dir`
pub fn write_log(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
