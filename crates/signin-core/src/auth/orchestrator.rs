use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::authorize::build_authorization_url;
use super::redirect::{interpret_redirect, RedirectOutcome};
use super::{
    AuthError, AuthState, ClientConfig, OauthConfig, ProviderClient, SignInDelegate,
};

/// Stage of the single in-flight sign-in flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowStage {
    #[default]
    Idle,
    AwaitingClientConfig,
    AwaitingDiscovery,
    AwaitingAppState,
    AuthorizationPending,
    Resolved(FlowOutcome),
}

/// How a resolved flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    Success,
    Error,
}

/// Orchestrates one sign-in flow at a time.
///
/// Each orchestrator owns its session; independent flows use independent
/// instances and share nothing. Starting a new flow while one is pending
/// supersedes it: the superseded flow's late results are dropped silently.
///
/// Clones share the same session slot.
#[derive(Clone)]
pub struct SignInOrchestrator {
    inner: Arc<Inner>,
}

/// Subscription for one `sign_in` call.
///
/// Dropping the handle does not cancel anything; detachment is an explicit,
/// deterministic call.
pub struct SignInHandle {
    inner: Arc<Inner>,
    generation: u64,
}

struct Inner {
    provider: ProviderClient,
    flow: Mutex<FlowSlot>,
    // Serializes every delegate callback so they never run concurrently.
    delivery: Mutex<()>,
}

#[derive(Default)]
struct FlowSlot {
    generation: u64,
    stage: FlowStage,
    subscriber: Option<Arc<dyn SignInDelegate>>,
    pending: Option<PendingAuthorization>,
}

struct PendingAuthorization {
    client: ClientConfig,
    oauth: OauthConfig,
}

impl SignInOrchestrator {
    pub fn new() -> Result<Self, AuthError> {
        Ok(Self {
            inner: Arc::new(Inner {
                provider: ProviderClient::new()?,
                flow: Mutex::new(FlowSlot::default()),
                delivery: Mutex::new(()),
            }),
        })
    }

    /// Begin a sign-in flow.
    ///
    /// Returns immediately; the flow advances on a background task, asking
    /// the delegate for its client configuration, discovering the provider,
    /// collecting extension state, and finally handing the authorization URL
    /// to the delegate's browser surface. Terminal results arrive through
    /// the delegate.
    pub fn sign_in(&self, delegate: Arc<dyn SignInDelegate>) -> SignInHandle {
        let generation = {
            let mut flow = self.inner.flow.lock();
            if flow.pending.is_some() {
                info!("superseding pending sign-in flow");
            }
            flow.generation += 1;
            flow.stage = FlowStage::AwaitingClientConfig;
            flow.subscriber = Some(delegate);
            flow.pending = None;
            flow.generation
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            Inner::drive(inner, generation).await;
        });

        SignInHandle {
            inner: Arc::clone(&self.inner),
            generation,
        }
    }

    /// Entry point for the browser collaborator, called with the target URI
    /// of every attempted navigation.
    ///
    /// Returns `false` when the URI is not ours (or no flow is pending); the
    /// surface lets the navigation proceed. Returns `true` when the flow is
    /// resolved by this redirect; the surface must dismiss itself.
    pub fn handle_redirect(&self, candidate: &Url) -> bool {
        let (generation, delegate, registered) = {
            let flow = self.inner.flow.lock();
            let Some(pending) = &flow.pending else {
                return false;
            };
            (
                flow.generation,
                flow.subscriber.clone(),
                pending.client.redirect_uri.clone(),
            )
        };

        let outcome = match interpret_redirect(candidate, &registered) {
            RedirectOutcome::Ignored => return false,
            outcome => outcome,
        };

        // Terminal for the sign-in portion: clear the session first so a
        // resolved flow can never be resolved twice.
        {
            let mut flow = self.inner.flow.lock();
            if flow.generation != generation {
                debug!("flow superseded mid-redirect; dropping result");
                return false;
            }
            flow.pending = None;
            flow.stage = FlowStage::Resolved(match outcome {
                RedirectOutcome::Authorized { .. } => FlowOutcome::Success,
                _ => FlowOutcome::Error,
            });
        }

        let Some(delegate) = delegate else {
            debug!("subscription cancelled; dropping redirect result");
            return true;
        };

        let _guard = self.inner.delivery.lock();
        match outcome {
            RedirectOutcome::Authorized { code, state } => {
                info!("authorization code received");
                delegate.sign_in_success(&code, &state);
            }
            RedirectOutcome::Failure(err) => {
                warn!(error = %err, "authorization redirect reported failure");
                delegate.sign_in_error(&err);
            }
            RedirectOutcome::Ignored => unreachable!("ignored outcomes return early"),
        }
        true
    }

    /// Trade a delivered authorization code for an access token.
    ///
    /// Stateless with respect to the flow: pass the same `ClientConfig`
    /// instance that started it (the exchange sends its bound verifier)
    /// together with the discovered endpoints. Failures are returned and,
    /// while a subscription is alive, mirrored to its error channel.
    pub async fn exchange_auth_code(
        &self,
        config: &ClientConfig,
        oauth: &OauthConfig,
        code: &str,
    ) -> Result<String, AuthError> {
        match self.inner.provider.exchange_code(config, oauth, code).await {
            Ok(token) => Ok(token),
            Err(err) => {
                self.inner.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Fetch the authenticated profile for an access token.
    pub async fn fetch_user_info(
        &self,
        oauth: &OauthConfig,
        access_token: &str,
    ) -> Result<Map<String, Value>, AuthError> {
        match self.inner.provider.fetch_user_info(oauth, access_token).await {
            Ok(profile) => Ok(profile),
            Err(err) => {
                self.inner.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Current stage of the orchestrator's flow slot.
    pub fn stage(&self) -> FlowStage {
        self.inner.flow.lock().stage
    }
}

impl SignInHandle {
    /// Detach the delegate deterministically.
    ///
    /// A flow still in progress is orphaned: its late results are dropped
    /// silently instead of delivered. Calling this after the flow was
    /// superseded by a newer `sign_in` is a no-op.
    pub fn cancel(&self) {
        let mut flow = self.inner.flow.lock();
        if flow.generation == self.generation {
            debug!("sign-in subscription cancelled");
            flow.subscriber = None;
            flow.pending = None;
            flow.stage = FlowStage::Idle;
        }
    }

    /// Stage of this handle's flow; `Idle` once cancelled or superseded.
    pub fn stage(&self) -> FlowStage {
        let flow = self.inner.flow.lock();
        if flow.generation == self.generation {
            flow.stage
        } else {
            FlowStage::Idle
        }
    }
}

impl Inner {
    /// Advance the flow one completed sub-operation at a time. Network steps
    /// run on this background task with immutable captured inputs; every
    /// delegate callback goes through the delivery guard.
    async fn drive(inner: Arc<Inner>, generation: u64) {
        let Some(delegate) = inner.subscriber(generation) else {
            return;
        };

        let config = inner.with_delivery(|| delegate.client_config());
        let Some(config) = config else {
            inner.fail(generation, AuthError::Config("missing client config".into()));
            return;
        };

        if !inner.advance(generation, FlowStage::AwaitingDiscovery) {
            return;
        }
        let oauth = match inner.provider.discover(&config).await {
            Ok(oauth) => oauth,
            Err(err) => {
                inner.fail(generation, err);
                return;
            }
        };

        if !inner.advance(generation, FlowStage::AwaitingAppState) {
            return;
        }
        let Some(delegate) = inner.subscriber(generation) else {
            return;
        };
        let extra = inner.with_delivery(|| delegate.auth_state(&config, &oauth));
        let state = merge_auth_state(extra, &config, &oauth);

        let authorize_url = match build_authorization_url(&config, &oauth, &state) {
            Ok(url) => url,
            Err(err) => {
                inner.fail(generation, err);
                return;
            }
        };

        let surface = inner.with_delivery(|| delegate.browser_surface());
        let Some(surface) = surface else {
            inner.fail(generation, AuthError::Config("context has gone away".into()));
            return;
        };

        {
            let mut flow = inner.flow.lock();
            if flow.generation != generation || flow.subscriber.is_none() {
                debug!("flow superseded before authorization; dropping");
                return;
            }
            flow.stage = FlowStage::AuthorizationPending;
            flow.pending = Some(PendingAuthorization {
                client: config,
                oauth,
            });
        }

        info!(%authorize_url, "presenting authorization request");
        inner.with_delivery(|| surface.present(&authorize_url));
    }

    fn with_delivery<R>(&self, callback: impl FnOnce() -> R) -> R {
        let _guard = self.delivery.lock();
        callback()
    }

    fn subscriber(&self, generation: u64) -> Option<Arc<dyn SignInDelegate>> {
        let flow = self.flow.lock();
        if flow.generation != generation {
            return None;
        }
        flow.subscriber.clone()
    }

    fn advance(&self, generation: u64, stage: FlowStage) -> bool {
        let mut flow = self.flow.lock();
        if flow.generation != generation || flow.subscriber.is_none() {
            return false;
        }
        flow.stage = stage;
        true
    }

    /// Resolve the flow with an error, unless it was superseded or cancelled,
    /// in which case the late result is dropped silently.
    fn fail(&self, generation: u64, err: AuthError) {
        let delegate = {
            let mut flow = self.flow.lock();
            if flow.generation != generation {
                debug!(error = %err, "dropping late failure from superseded flow");
                return;
            }
            flow.pending = None;
            flow.stage = FlowStage::Resolved(FlowOutcome::Error);
            flow.subscriber.clone()
        };

        match delegate {
            Some(delegate) => {
                warn!(error = %err, "sign-in flow failed");
                let _guard = self.delivery.lock();
                delegate.sign_in_error(&err);
            }
            None => debug!(error = %err, "subscription cancelled; dropping failure"),
        }
    }

    fn notify_error(&self, err: &AuthError) {
        let delegate = self.flow.lock().subscriber.clone();
        if let Some(delegate) = delegate {
            let _guard = self.delivery.lock();
            delegate.sign_in_error(err);
        }
    }
}

/// Combine delegate-supplied extension data with the computed defaults.
fn merge_auth_state(
    mut extra: Map<String, Value>,
    config: &ClientConfig,
    oauth: &OauthConfig,
) -> AuthState {
    let source_redirect_url = match extra.remove("source_redirect_url") {
        Some(Value::String(url)) => url,
        Some(other) => {
            warn!(value = %other, "ignoring non-string source_redirect_url override");
            config.redirect_uri.to_string()
        }
        None => config.redirect_uri.to_string(),
    };
    let authorize_url = match extra.remove("authorize_url") {
        Some(Value::String(url)) => url,
        Some(other) => {
            warn!(value = %other, "ignoring non-string authorize_url override");
            oauth.authorization_endpoint.to_string()
        }
        None => oauth.authorization_endpoint.to_string(),
    };

    AuthState {
        source_redirect_url,
        authorize_url: Some(authorize_url),
        extra,
    }
}
