use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use super::{AuthError, ClientConfig};

const USER_AGENT: &str = "signin-rs/0.1.0";

/// Provider endpoints resolved from the discovery document. Populated only
/// by a successful [`ProviderClient::discover`] call.
#[derive(Debug, Clone)]
pub struct OauthConfig {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Url,
}

impl OauthConfig {
    fn from_document(document: &Value) -> Result<Self, AuthError> {
        let object = document.as_object().ok_or_else(|| {
            AuthError::Parse("discovery document is not a JSON object".into())
        })?;

        let field = |key: &str| object.get(key).and_then(Value::as_str);
        match (
            field("issuer"),
            field("authorization_endpoint"),
            field("token_endpoint"),
            field("userinfo_endpoint"),
        ) {
            (Some(issuer), Some(authorization), Some(token), Some(userinfo)) => Ok(Self {
                issuer: issuer.to_owned(),
                authorization_endpoint: Url::parse(authorization)?,
                token_endpoint: Url::parse(token)?,
                userinfo_endpoint: Url::parse(userinfo)?,
            }),
            _ => Err(AuthError::Config(
                "missing required oauth config properties".into(),
            )),
        }
    }
}

/// HTTP half of the flow: discovery, code-for-token exchange, profile fetch.
///
/// Stateless with respect to flow data; every call reads only the inputs it
/// is given.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: Client,
}

impl ProviderClient {
    pub fn new() -> Result<Self, AuthError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http })
    }

    /// Fetch and validate the provider's openid-configuration document.
    pub async fn discover(&self, config: &ClientConfig) -> Result<OauthConfig, AuthError> {
        let location = config.discovery_url()?;
        debug!(%location, "fetching openid configuration");

        let response = self.http.get(location).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status { status, body });
        }

        let body = response.text().await?;
        let document: Value = serde_json::from_str(&body)
            .map_err(|err| AuthError::Parse(format!("discovery document is not JSON: {err}")))?;
        OauthConfig::from_document(&document)
    }

    /// Exchange an authorization code for an access token.
    ///
    /// Confidential-client exchange only: without a client secret this fails
    /// before any request is issued. The verifier sent is the one bound to
    /// `config`, which must be the instance that started the flow.
    pub async fn exchange_code(
        &self,
        config: &ClientConfig,
        oauth: &OauthConfig,
        code: &str,
    ) -> Result<String, AuthError> {
        let secret = config.client_secret.as_deref().ok_or_else(|| {
            AuthError::Config("unknown client secret, cannot exchange auth code".into())
        })?;

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_verifier", config.code_verifier()),
        ];

        debug!(endpoint = %oauth.token_endpoint, "exchanging authorization code");
        let response = self
            .http
            .post(oauth.token_endpoint.clone())
            .basic_auth(&config.client_id, Some(secret))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status { status, body });
        }

        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|err| AuthError::Parse(format!("token response is not JSON: {err}")))?;
        let access_token = payload
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Protocol("access token not found".into()))?;
        Ok(access_token.to_owned())
    }

    /// Retrieve the authenticated profile for an access token.
    ///
    /// The JSON object is returned verbatim; claim extraction is the
    /// caller's responsibility.
    pub async fn fetch_user_info(
        &self,
        oauth: &OauthConfig,
        access_token: &str,
    ) -> Result<Map<String, Value>, AuthError> {
        debug!(endpoint = %oauth.userinfo_endpoint, "fetching user info");
        let response = self
            .http
            .post(oauth.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status { status, body });
        }

        let body = response.text().await?;
        let profile: Value = serde_json::from_str(&body)
            .map_err(|err| AuthError::Parse(format!("userinfo response is not JSON: {err}")))?;
        match profile {
            Value::Object(map) => Ok(map),
            _ => Err(AuthError::Parse("userinfo response is not a JSON object".into())),
        }
    }
}
