use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::dedup::{EvictionPolicy, RequestCoordinator};
use crate::errors::Error;
use crate::retry::{RetryCoordinator, RetryPlan};
use crate::session::{CredentialStore, SessionRefresher};
use crate::transport::{HttpResponse, ReqwestTransport, Transport};

pub type ResponseCoordinator = RequestCoordinator<HttpResponse, Error>;

/// Shared context for outbound requests: one coordinator, one refresher and
/// one credential store per session, passed to whoever issues calls.
#[derive(Clone)]
pub struct RequestDispatchContext {
    base_url: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<ResponseCoordinator>,
    refresher: Arc<SessionRefresher>,
    retry: Arc<RetryCoordinator>,
}

impl RequestDispatchContext {
    pub fn build(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        eviction: EvictionPolicy,
        retry_plan: RetryPlan,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let refresher = SessionRefresher::new(&base_url, Arc::clone(&transport), Arc::clone(&store));
        Self {
            base_url,
            transport,
            store,
            coordinator: Arc::new(RequestCoordinator::new(eviction)),
            refresher: Arc::new(refresher),
            retry: Arc::new(RetryCoordinator::new(retry_plan)),
        }
    }

    /// Builds a context backed by [`ReqwestTransport`].
    pub fn from_config(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Self::from_config_with_transport(config, Arc::new(transport), store)
    }

    pub fn from_config_with_transport(
        config: &Config,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, Error> {
        Ok(Self::build(
            config.validated_base_url()?,
            transport,
            store,
            config.eviction_policy()?,
            config.retry_plan()?,
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.store)
    }

    pub fn coordinator(&self) -> Arc<ResponseCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn refresher(&self) -> Arc<SessionRefresher> {
        Arc::clone(&self.refresher)
    }

    pub fn retry(&self) -> Arc<RetryCoordinator> {
        Arc::clone(&self.retry)
    }

    /// Must be called from within a Tokio runtime.
    pub fn start_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        self.coordinator.spawn_sweeper(interval)
    }
}
