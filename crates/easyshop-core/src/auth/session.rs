use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError, GatewayEvent};
use crate::config::Config;

use super::claims::{Claims, ADMIN_ROLE, DEFAULT_ROLE};

const MISSING_CREDENTIALS: &str = "Email and password required";
const INVALID_LOGIN_RESPONSE: &str = "Invalid response from server";
const LOGIN_SUPERSEDED: &str = "Signed out while login was in progress";
const CREDENTIAL_NOT_SAVED: &str = "Could not save the session on this device";

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Who is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject: String,
    pub role: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.subject,
            role: claims.role,
        }
    }
}

/// The application's current view of who is logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub identity: Option<Identity>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl Session {
    fn initializing() -> Self {
        Self {
            identity: None,
            loading: true,
            last_error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.identity.as_ref().is_some_and(|i| i.role == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// Result of `login` and `register`.
///
/// A rejected password or a duplicate email is an expected outcome, so it is
/// reported here rather than as an error.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Failure(String),
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AuthOutcome::Success => None,
            AuthOutcome::Failure(message) => Some(message),
        }
    }
}

/// State shared between the manager and its background task.
struct Shared {
    api: ApiClient,
    state: watch::Sender<Session>,
    /// Bumped by every explicit logout.
    generation: AtomicU64,
}

impl Shared {
    /// Identity from the stored credential if it is well-formed and unexpired.
    fn stored_identity(&self) -> Option<Identity> {
        let token = self.api.credential_store().get()?;
        match Claims::decode(&token) {
            Ok(claims) if claims.is_expired() => {
                debug!(expires_at = claims.expires_at, "Stored credential expired");
                None
            }
            Ok(claims) => Some(claims.into()),
            Err(e) => {
                debug!(error = %e, "Stored credential is malformed");
                None
            }
        }
    }

    fn clear_store(&self) {
        if let Err(e) = self.api.credential_store().clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
    }

    /// Drop the credential and become anonymous.
    fn end_session(&self, last_error: Option<String>) {
        self.clear_store();
        self.state.send_modify(|s| {
            s.identity = None;
            s.last_error = last_error;
        });
    }

    fn revalidate(&self) {
        if !self.state.borrow().is_authenticated() {
            return;
        }
        if self.stored_identity().is_none() {
            info!("Session expired, signing out");
            self.end_session(None);
        }
    }

    fn handle_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::SessionInvalidated { message } => {
                debug!("Gateway invalidated the session");
                // The gateway already cleared the store
                self.state.send_modify(|s| {
                    s.identity = None;
                    s.last_error = Some(message);
                });
            }
        }
    }

    fn set_error(&self, last_error: Option<String>) {
        self.state.send_modify(|s| s.last_error = last_error);
    }

    fn fail(&self, message: impl Into<String>) -> AuthOutcome {
        let message = message.into();
        self.set_error(Some(message.clone()));
        AuthOutcome::Failure(message)
    }

    /// Report a failed call. A 401 has already cleared the store, so the
    /// identity goes with it.
    fn reject(&self, err: ApiError) -> AuthOutcome {
        let message = err.to_string();
        if err.is_session_invalid() {
            self.end_session(Some(message.clone()));
            return AuthOutcome::Failure(message);
        }
        self.fail(message)
    }
}

/// Owns the session state and the periodic expiry check.
///
/// Construct once at application entry, call `initialize`, then `start` to
/// run the background task. Dropping the manager stops the task.
pub struct SessionManager {
    shared: Arc<Shared>,
    revalidate_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(api: ApiClient, config: &Config) -> Self {
        let (state, _) = watch::channel(Session::initializing());
        Self {
            shared: Arc::new(Shared {
                api,
                state,
                generation: AtomicU64::new(0),
            }),
            revalidate_interval: config.revalidate_interval(),
            task: Mutex::new(None),
        }
    }

    /// Override how often the background task re-checks expiry.
    pub fn with_revalidate_interval(mut self, interval: Duration) -> Self {
        self.revalidate_interval = interval;
        self
    }

    /// The gateway this session issues requests through.
    pub fn api(&self) -> &ApiClient {
        &self.shared.api
    }

    /// Derive the session from the stored credential. No network call.
    pub fn initialize(&self) {
        self.shared.state.send_modify(|s| s.loading = true);

        let identity = self.shared.stored_identity();
        if identity.is_none() {
            self.shared.clear_store();
        }

        match identity {
            Some(ref id) => info!(role = %id.role, "Restored session"),
            None => debug!("No valid stored session"),
        }

        self.shared.state.send_modify(|s| {
            s.identity = identity;
            s.loading = false;
        });
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return self.shared.fail(MISSING_CREDENTIALS);
        }

        self.shared.set_error(None);
        let generation = self.shared.generation.load(Ordering::SeqCst);

        let response = match self.shared.api.authenticate(email, password).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Login failed");
                return self.shared.reject(e);
            }
        };

        let (Some(token), Some(subject)) = (
            response.token(),
            response.email.as_deref().filter(|e| !e.is_empty()),
        ) else {
            warn!("Login response is missing the token or email");
            return self.shared.fail(INVALID_LOGIN_RESPONSE);
        };

        if self.shared.generation.load(Ordering::SeqCst) != generation {
            warn!("Discarding login that completed after logout");
            return self.shared.fail(LOGIN_SUPERSEDED);
        }

        if let Err(e) = self.shared.api.credential_store().set(token) {
            error!(error = %e, "Failed to store credential");
            return self.shared.fail(CREDENTIAL_NOT_SAVED);
        }

        let identity = Identity {
            subject: subject.to_string(),
            role: response
                .role
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        };
        info!(role = %identity.role, "Login successful");

        self.shared.state.send_modify(|s| {
            s.identity = Some(identity);
            s.last_error = None;
        });
        AuthOutcome::Success
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, email: &str, password: &str) -> AuthOutcome {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return self.shared.fail(MISSING_CREDENTIALS);
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return self.shared.fail(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ));
        }

        self.shared.set_error(None);
        match self.shared.api.register(email, password).await {
            Ok(()) => {
                info!("Account registered");
                AuthOutcome::Success
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                self.shared.reject(e)
            }
        }
    }

    /// Forget the credential and the identity. Safe to call when logged out.
    pub fn logout(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.end_session(None);
        info!("Logged out");
    }

    /// Re-check the stored credential's expiry without touching the network.
    pub fn revalidate(&self) {
        self.shared.revalidate();
    }

    pub fn clear_error(&self) {
        self.shared.set_error(None);
    }

    // ===== Read access =====

    pub fn session(&self) -> Session {
        self.shared.state.borrow().clone()
    }

    /// Observe every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.shared.state.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.shared.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.state.borrow().last_error.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.shared.state.borrow().is_authenticated()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.shared.state.borrow().has_role(role)
    }

    pub fn is_admin(&self) -> bool {
        self.shared.state.borrow().is_admin()
    }

    // ===== Background task =====

    /// Start the periodic expiry check and gateway event listener.
    ///
    /// Must be called from within a tokio runtime. Calling it again while the
    /// task is running does nothing.
    pub fn start(&self) {
        let mut task = match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        // Subscribe before spawning so no event slips through
        let events = shared.api.subscribe();
        let period = self.revalidate_interval.max(Duration::from_millis(1));

        *task = Some(tokio::spawn(Self::run(shared, events, period)));
        debug!(period_secs = period.as_secs_f64(), "Session task started");
    }

    async fn run(
        shared: Arc<Shared>,
        mut events: broadcast::Receiver<GatewayEvent>,
        period: Duration,
    ) {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = interval.tick() => shared.revalidate(),
                event = events.recv(), if events_open => match event {
                    Ok(event) => shared.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed gateway events, re-checking session");
                        shared.revalidate();
                    }
                    Err(broadcast::error::RecvError::Closed) => events_open = false,
                },
            }
        }
    }

    pub fn is_running(&self) -> bool {
        match self.task.lock() {
            Ok(task) => task.as_ref().is_some_and(|t| !t.is_finished()),
            Err(_) => false,
        }
    }

    /// Stop the background task.
    pub fn stop(&self) {
        let handle = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
            debug!("Session task stopped");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop();
    }
}
