#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use accountable_http::dedup::EvictionPolicy;
use accountable_http::retry::{JitterStrategy, RetryPlan};
use accountable_http::transport::ReqwestTransport;
use accountable_http::{
    AuthenticatedClient, Config, CredentialPair, MemoryCredentialStore, RequestDispatchContext,
};
use tracing::subscriber::{DefaultGuard, set_default};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Registry, fmt};

struct VecWriter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl std::io::Write for VecWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.lines.lock().unwrap();
        guard.push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn capture_logs() -> (Arc<Mutex<Vec<String>>>, DefaultGuard) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let writer_lines = lines.clone();
    let subscriber = Registry::default().with(
        fmt::Layer::default()
            .with_writer(move || VecWriter {
                lines: writer_lines.clone(),
            })
            .with_target(false)
            .with_level(true)
            .with_ansi(false),
    );
    let guard = set_default(subscriber);
    (lines, guard)
}

pub fn signed_in_store() -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new(
        "access-1",
        Some("refresh-1".into()),
    )))
}

pub fn client(server_uri: &str, store: Arc<MemoryCredentialStore>) -> AuthenticatedClient {
    let config = Config::from_values(server_uri, None, None, None, None);
    let ctx = RequestDispatchContext::from_config(&config, store).expect("valid config");
    AuthenticatedClient::new(ctx)
}

/// Client whose caller-side retry waits `delay` between attempts.
pub fn retrying_client(
    server_uri: &str,
    store: Arc<MemoryCredentialStore>,
    max_attempts: u8,
    delay: Duration,
) -> AuthenticatedClient {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).expect("transport");
    let ctx = RequestDispatchContext::build(
        server_uri,
        Arc::new(transport),
        store,
        EvictionPolicy::default(),
        RetryPlan::new(max_attempts, delay, JitterStrategy::None),
    );
    AuthenticatedClient::new(ctx)
}
