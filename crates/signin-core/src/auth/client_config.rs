use url::Url;

use super::pkce::PkcePair;
use super::AuthError;

/// Scopes requested when the host does not override them.
pub const DEFAULT_SCOPE: &str = "openid offline_access email profile";

/// Tenant segment inserted between the issuer and the well-known suffix when
/// locating the discovery document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthoritySegment {
    /// The provider's `default` authority.
    #[default]
    Default,
    /// A named authority/tenant.
    Named(String),
    /// The issuer already encodes the full tenant path; append nothing.
    Embedded,
}

impl AuthoritySegment {
    fn path_segment(&self) -> Option<&str> {
        match self {
            AuthoritySegment::Default => Some("default"),
            AuthoritySegment::Named(id) => Some(id),
            AuthoritySegment::Embedded => None,
        }
    }
}

/// Client registration parameters for one sign-in flow.
///
/// Each instance owns exactly one PKCE pair, generated at construction and
/// never regenerated. The challenge sent with the authorization request and
/// the verifier sent at token exchange must come from the same instance;
/// the provider rejects the exchange otherwise. Treat the instance as
/// immutable once a flow has started.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub redirect_uri: Url,
    pub issuer: Url,
    pub authority: AuthoritySegment,
    /// Space-delimited scope list.
    pub scope: String,
    /// Required for the code-for-token exchange. Consider carefully whether
    /// the deployment can afford to carry this secret client side.
    pub client_secret: Option<String>,
    pub login_hint: Option<String>,
    /// Provider-specific parameters appended verbatim to the authorization
    /// request, e.g. interstitial login-UX hints.
    pub extra_authorize_params: Vec<(String, String)>,
    pkce: PkcePair,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, redirect_uri: Url, issuer: Url) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri,
            issuer,
            authority: AuthoritySegment::default(),
            scope: DEFAULT_SCOPE.to_owned(),
            client_secret: None,
            login_hint: None,
            extra_authorize_params: Vec::new(),
            pkce: PkcePair::generate(),
        }
    }

    pub fn with_authority(mut self, authority: AuthoritySegment) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
        self.login_hint = Some(hint.into());
        self
    }

    pub fn with_authorize_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extra_authorize_params.push((key.into(), value.into()));
        self
    }

    /// Verifier bound to this instance; secret until the token exchange.
    pub fn code_verifier(&self) -> &str {
        self.pkce.verifier()
    }

    /// Public challenge derived from this instance's verifier.
    pub fn code_challenge(&self) -> &str {
        self.pkce.challenge()
    }

    /// Location of the provider discovery document for this configuration.
    pub fn discovery_url(&self) -> Result<Url, AuthError> {
        let base = self.issuer.as_str().trim_end_matches('/');
        let location = match self.authority.path_segment() {
            Some(segment) => {
                format!("{base}/{segment}/.well-known/openid-configuration")
            }
            None => format!("{base}/.well-known/openid-configuration"),
        };
        Ok(Url::parse(&location)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new(
            "c1",
            Url::parse("app://cb").unwrap(),
            Url::parse("https://idp.example").unwrap(),
        )
    }

    #[test]
    fn defaults() {
        let config = config();
        assert_eq!(config.scope, DEFAULT_SCOPE);
        assert_eq!(config.authority, AuthoritySegment::Default);
        assert!(config.client_secret.is_none());
        assert!(config.login_hint.is_none());
    }

    #[test]
    fn pkce_pair_is_bound_to_the_instance() {
        let config = config();
        let verifier = config.code_verifier().to_owned();
        let challenge = config.code_challenge().to_owned();
        // Stable across reads.
        assert_eq!(config.code_verifier(), verifier);
        assert_eq!(config.code_challenge(), challenge);
        // Clones share the pair; fresh instances do not.
        assert_eq!(config.clone().code_verifier(), verifier);
        assert_ne!(super::super::pkce::generate_verifier(64), verifier);
    }

    #[test]
    fn identical_inputs_yield_distinct_pairs() {
        let a = config();
        let b = config();
        assert_ne!(a.code_verifier(), b.code_verifier());
        assert_ne!(a.code_challenge(), b.code_challenge());
    }

    #[test]
    fn discovery_url_default_authority() {
        assert_eq!(
            config().discovery_url().unwrap().as_str(),
            "https://idp.example/default/.well-known/openid-configuration"
        );
    }

    #[test]
    fn discovery_url_named_authority() {
        let config = config().with_authority(AuthoritySegment::Named("tenant-a".into()));
        assert_eq!(
            config.discovery_url().unwrap().as_str(),
            "https://idp.example/tenant-a/.well-known/openid-configuration"
        );
    }

    #[test]
    fn discovery_url_embedded_authority() {
        let config = ClientConfig::new(
            "c1",
            Url::parse("app://cb").unwrap(),
            Url::parse("https://idp.example/tenants/t1").unwrap(),
        )
        .with_authority(AuthoritySegment::Embedded);
        assert_eq!(
            config.discovery_url().unwrap().as_str(),
            "https://idp.example/tenants/t1/.well-known/openid-configuration"
        );
    }

    #[test]
    fn trailing_slash_on_issuer_is_tolerated() {
        let config = ClientConfig::new(
            "c1",
            Url::parse("app://cb").unwrap(),
            Url::parse("https://idp.example/").unwrap(),
        );
        assert_eq!(
            config.discovery_url().unwrap().as_str(),
            "https://idp.example/default/.well-known/openid-configuration"
        );
    }
}
