use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use jiff::Timestamp;
use uuid::Uuid;

use crate::errors::Error;
use crate::telemetry::refresh::RefreshTelemetry;
use crate::transport::{HttpRequest, Transport};
use crate::types::{HttpMethod, RefreshRequest, RefreshResponse};

use super::CredentialStore;

pub const REFRESH_PATH: &str = "/auth/refresh";

enum RefreshLock {
    Idle,
    InProgress {
        telemetry: RefreshTelemetry,
        outcome: Shared<BoxFuture<'static, bool>>,
    },
}

/// Exchanges the stored refresh token for a new credential pair, at most one
/// exchange at a time.
///
/// Callers arriving while an exchange runs wait for that exchange instead of
/// starting their own. Credentials are written before any waiter resumes.
pub struct SessionRefresher {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    refresh_url: String,
    lock: Arc<Mutex<RefreshLock>>,
}

impl SessionRefresher {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            transport,
            store,
            refresh_url: format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH),
            lock: Arc::new(Mutex::new(RefreshLock::Idle)),
        }
    }

    /// `true` once new credentials are stored; `false` when no refresh token
    /// is available or the exchange failed. Never clears credentials.
    pub async fn refresh(&self) -> bool {
        self.attach_or_start().await
    }

    pub fn in_progress(&self) -> bool {
        matches!(&*lock(&self.lock), RefreshLock::InProgress { .. })
    }

    fn attach_or_start(&self) -> Shared<BoxFuture<'static, bool>> {
        let mut slot = lock(&self.lock);
        let joined = match &*slot {
            RefreshLock::InProgress { telemetry, outcome } => {
                telemetry.emit_joined();
                Some(outcome.clone())
            }
            RefreshLock::Idle => None,
        };
        if let Some(outcome) = joined {
            return outcome;
        }

        let telemetry = RefreshTelemetry::new("session.refresh");
        let outcome = exchange(
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            self.refresh_url.clone(),
            Arc::downgrade(&self.lock),
            telemetry.clone(),
        )
        .boxed()
        .shared();
        *slot = RefreshLock::InProgress {
            telemetry,
            outcome: outcome.clone(),
        };
        drop(slot);
        tokio::spawn(outcome.clone());
        outcome
    }
}

async fn exchange(
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    url: String,
    slot: Weak<Mutex<RefreshLock>>,
    telemetry: RefreshTelemetry,
) -> bool {
    let refreshed = run_exchange(transport.as_ref(), store.as_ref(), &url, &telemetry).await;
    if let Some(slot) = slot.upgrade() {
        release(&slot, telemetry.attempt_id());
    }
    refreshed
}

fn release(slot: &Mutex<RefreshLock>, attempt_id: Uuid) {
    let mut slot = lock(slot);
    if matches!(&*slot, RefreshLock::InProgress { telemetry, .. } if telemetry.attempt_id() == attempt_id)
    {
        *slot = RefreshLock::Idle;
    }
}

async fn run_exchange(
    transport: &dyn Transport,
    store: &dyn CredentialStore,
    url: &str,
    telemetry: &RefreshTelemetry,
) -> bool {
    let Some(refresh_token) = store.refresh_token() else {
        telemetry.emit_skipped(Timestamp::now());
        return false;
    };

    telemetry.emit_start(Timestamp::now());
    match request_new_pair(transport, url, &refresh_token).await {
        Ok(RefreshResponse {
            access_token,
            refresh_token,
        }) => {
            let rotated = refresh_token.is_some();
            store.set_access_token(access_token);
            if let Some(refresh_token) = refresh_token {
                store.set_refresh_token(refresh_token);
            }
            telemetry.emit_success(rotated, Timestamp::now());
            true
        }
        Err(err) => {
            telemetry.emit_failure(&err, Timestamp::now());
            false
        }
    }
}

async fn request_new_pair(
    transport: &dyn Transport,
    url: &str,
    refresh_token: &str,
) -> Result<RefreshResponse, Error> {
    let body = serde_json::to_value(RefreshRequest { refresh_token })?;
    let request = HttpRequest::new(HttpMethod::Post, url).json_body(Some(&body));
    let resp = transport.perform(request).await?;
    if !resp.status.is_success() {
        return Err(Error::AuthExpired(format!(
            "refresh rejected with status {}",
            resp.status.as_u16()
        )));
    }
    let parsed: RefreshResponse = serde_json::from_str(&resp.body)?;
    if parsed.access_token.trim().is_empty() {
        return Err(Error::Parse("refresh response carried an empty accessToken".into()));
    }
    Ok(parsed)
}

fn lock(mutex: &Mutex<RefreshLock>) -> MutexGuard<'_, RefreshLock> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
