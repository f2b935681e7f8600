use std::sync::Arc;

use serde_json::{Map, Value};
use url::Url;

use super::{AuthError, AuthState, ClientConfig, OauthConfig};

/// Host-implemented capability driving one sign-in flow.
///
/// Every method is invoked on the orchestrator's delivery context, one at a
/// time, never concurrently with another callback. Callbacks should return
/// promptly; long work belongs on the host's own tasks.
pub trait SignInDelegate: Send + Sync {
    /// Supply the client registration for this flow. `None` aborts the flow
    /// with a configuration error.
    fn client_config(&self) -> Option<ClientConfig>;

    /// Extension data to round-trip through the provider inside `state`.
    ///
    /// String-valued `source_redirect_url` and `authorize_url` entries
    /// override the defaults the orchestrator computes; everything else is
    /// carried opaquely.
    fn auth_state(&self, config: &ClientConfig, oauth: &OauthConfig) -> Map<String, Value>;

    /// Terminal success: the provider delivered an authorization code.
    fn sign_in_success(&self, code: &str, state: &AuthState);

    /// Failure channel. Also receives token-exchange and profile-fetch
    /// failures while the subscription is alive.
    fn sign_in_error(&self, error: &AuthError);

    /// Surface used to present the authorization URL. `None` aborts the flow
    /// with a configuration error.
    fn browser_surface(&self) -> Option<Arc<dyn BrowserSurface>>;
}

/// Contract for the host's browser collaborator.
///
/// The surface must load the URL it is given, report every attempted
/// navigation to [`SignInOrchestrator::handle_redirect`] before following
/// it, and dismiss itself exactly when that call returns `true`. The host
/// may dismiss the surface manually at any time; that abandons the flow and
/// nothing is delivered.
///
/// [`SignInOrchestrator::handle_redirect`]: super::SignInOrchestrator::handle_redirect
pub trait BrowserSurface: Send + Sync {
    fn present(&self, authorize_url: &Url);
}
