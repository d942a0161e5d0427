use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::Error;
use crate::request_context::RequestDispatchContext;
use crate::request_key::{RequestKey, canonical_query};
use crate::retry::OperationKind;
use crate::session::{CredentialPair, CredentialStore};
use crate::transport::{HttpRequest, HttpResponse};
use crate::types::{ApiResponse, HttpMethod};

mod response;
mod state;

use state::CallState;

/// A fully resolved call, reusable for the retry after a refresh.
struct PreparedCall {
    method: HttpMethod,
    url: String,
    body: Option<serde_json::Value>,
    key: RequestKey,
}

struct SweeperHandle(JoinHandle<()>);

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Entry point for API calls: attaches the session's bearer token,
/// deduplicates identical concurrent calls, and recovers from an expired
/// access token by refreshing once and retrying once.
#[derive(Clone)]
pub struct AuthenticatedClient {
    ctx: RequestDispatchContext,
    _sweeper: Option<Arc<SweeperHandle>>,
}

impl AuthenticatedClient {
    /// Client without a background sweep; settled calls still leave the map.
    pub fn new(ctx: RequestDispatchContext) -> Self {
        Self {
            ctx,
            _sweeper: None,
        }
    }

    /// Must be called from within a Tokio runtime.
    pub fn with_sweeper(ctx: RequestDispatchContext, interval: std::time::Duration) -> Self {
        let handle = ctx.start_sweeper(interval);
        Self {
            ctx,
            _sweeper: Some(Arc::new(SweeperHandle(handle))),
        }
    }

    /// Builds a reqwest-backed client and starts its sweep. Must be called
    /// from within a Tokio runtime.
    pub fn from_config(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, Error> {
        let ctx = RequestDispatchContext::from_config(config, store)?;
        Ok(Self::with_sweeper(ctx, config.sweep_interval()))
    }

    pub fn context(&self) -> &RequestDispatchContext {
        &self.ctx
    }

    pub fn sign_in(&self, pair: CredentialPair) {
        self.ctx.store().install(pair);
    }

    /// Drops stored credentials; the expected reaction to [`Error::AuthExpired`].
    pub fn sign_out(&self) {
        self.ctx.store().clear();
    }

    /// Sends `method` to `path` (relative to the base URL).
    ///
    /// # Errors
    /// * [`Error::AuthExpired`] when a 401 could not be fixed by one refresh
    /// * [`Error::Authorization`] on 403
    /// * [`Error::RequestFailed`] for any other non-2xx status
    /// * [`Error::Parse`] when a 2xx body is not JSON
    /// * [`Error::Transport`] when the exchange itself failed
    pub async fn send<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse, Error>
    where
        B: Serialize + ?Sized,
    {
        let call = self.prepare(method, path, body, query)?;
        self.run(&call).await
    }

    /// Like [`send`](Self::send), decoding the JSON body into `T`.
    pub async fn send_json<T, B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(method, path, body, query).await?.into_json()
    }

    /// Like [`send`](Self::send), re-running retriable failures according to
    /// the context's retry plan.
    pub async fn send_with_retry<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse, Error>
    where
        B: Serialize + ?Sized,
    {
        let call = self.prepare(method, path, body, query)?;
        let retry = self.ctx.retry();
        let (value, _outcome) = retry
            .execute(OperationKind::from(method), |_attempt| self.run(&call))
            .await?;
        Ok(value)
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, Error> {
        self.send::<serde_json::Value>(HttpMethod::Get, path, None, query)
            .await
    }

    pub async fn post<B>(&self, path: &str, body: &B) -> Result<ApiResponse, Error>
    where
        B: Serialize + ?Sized,
    {
        self.send(HttpMethod::Post, path, Some(body), &[]).await
    }

    pub async fn put<B>(&self, path: &str, body: &B) -> Result<ApiResponse, Error>
    where
        B: Serialize + ?Sized,
    {
        self.send(HttpMethod::Put, path, Some(body), &[]).await
    }

    pub async fn patch<B>(&self, path: &str, body: &B) -> Result<ApiResponse, Error>
    where
        B: Serialize + ?Sized,
    {
        self.send(HttpMethod::Patch, path, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, Error> {
        self.send::<serde_json::Value>(HttpMethod::Delete, path, None, &[])
            .await
    }

    fn prepare<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<PreparedCall, Error>
    where
        B: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::Parse(format!("request body could not be serialized: {}", e)))?;
        let base = format!(
            "{}/{}",
            self.ctx.base_url(),
            path.trim_start_matches('/')
        );
        let key = RequestKey::build(method, &base, body.as_ref(), Some(query));
        let url = if query.is_empty() {
            base
        } else {
            format!("{}?{}", base, canonical_query(query))
        };
        Ok(PreparedCall {
            method,
            url,
            body,
            key,
        })
    }

    async fn run(&self, call: &PreparedCall) -> Result<ApiResponse, Error> {
        let mut state = CallState::Sending;
        let mut sent_with: Option<String> = None;
        loop {
            debug!(method = %call.method, url = %call.url, state = state.name(), "request.state");
            state = match state {
                CallState::Sending => {
                    sent_with = self.ctx.store().access_token();
                    match self.dispatch(call, call.key.clone(), sent_with.clone()).await {
                        Ok(resp) => CallState::Sending.after_response(resp),
                        Err(err) => CallState::Sending.after_transport_error(err),
                    }
                }
                CallState::Refreshing => {
                    warn!(method = %call.method, url = %call.url, status = 401, "request.unauthorized");
                    let current = self.ctx.store().access_token();
                    if current.is_some() && current != sent_with {
                        // Another caller's refresh already stored a newer token.
                        debug!(method = %call.method, url = %call.url, "request.token_rotated");
                        CallState::Refreshing.after_refresh(true)
                    } else {
                        let refreshed = self.ctx.refresher().refresh().await;
                        CallState::Refreshing.after_refresh(refreshed)
                    }
                }
                CallState::Retrying => {
                    let token = self.ctx.store().access_token();
                    match self.dispatch(call, call.key.retry(), token).await {
                        Ok(resp) => CallState::Retrying.after_response(resp),
                        Err(err) => CallState::Retrying.after_transport_error(err),
                    }
                }
                CallState::Done(resp) => return response::interpret(resp),
                CallState::Fatal(err) => return Err(err),
            };
        }
    }

    /// `token` is read by the caller at dispatch time, so a retry carries
    /// whatever the refresh stored.
    async fn dispatch(
        &self,
        call: &PreparedCall,
        key: RequestKey,
        token: Option<String>,
    ) -> Result<HttpResponse, Error> {
        let request = HttpRequest::new(call.method, call.url.clone())
            .header("Accept", "application/json")
            .bearer(token.as_deref())
            .json_body(call.body.as_ref());
        let transport = self.ctx.transport();
        self.ctx
            .coordinator()
            .execute(key, move || async move { transport.perform(request).await })
            .await
    }
}
