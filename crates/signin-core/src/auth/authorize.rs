use url::Url;
use uuid::Uuid;

use super::{AuthError, AuthState, ClientConfig, OauthConfig};

/// Build the browser-facing authorization request URL.
///
/// The nonce is freshly generated per call and never checked against the
/// redirect response; it is an advisory anti-replay decoration. Every other
/// parameter is deterministic for the same inputs.
pub fn build_authorization_url(
    config: &ClientConfig,
    oauth: &OauthConfig,
    state: &AuthState,
) -> Result<Url, AuthError> {
    let encoded_state = state.encode()?;
    let mut url = oauth.authorization_endpoint.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("nonce", &Uuid::new_v4().to_string());
        pairs.append_pair("response_type", "code");
        pairs.append_pair("response_mode", "query");
        pairs.append_pair("state", &encoded_state);
        pairs.append_pair("scope", &config.scope);
        pairs.append_pair("client_id", &config.client_id);
        pairs.append_pair("code_challenge", config.code_challenge());
        pairs.append_pair("code_challenge_method", "S256");
        pairs.append_pair("redirect_uri", config.redirect_uri.as_str());
        if let Some(hint) = &config.login_hint {
            pairs.append_pair("login_hint", hint);
        }
        for (key, value) in &config.extra_authorize_params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> ClientConfig {
        ClientConfig::new(
            "c1",
            Url::parse("app://cb").unwrap(),
            Url::parse("https://idp.example").unwrap(),
        )
    }

    fn oauth() -> OauthConfig {
        OauthConfig {
            issuer: "https://idp.example".into(),
            authorization_endpoint: Url::parse("https://idp.example/authorize").unwrap(),
            token_endpoint: Url::parse("https://idp.example/token").unwrap(),
            userinfo_endpoint: Url::parse("https://idp.example/userinfo").unwrap(),
        }
    }

    fn params(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn includes_required_parameters() {
        let config = config();
        let state = AuthState::new("app://cb");
        let url = build_authorization_url(&config, &oauth(), &state).unwrap();
        let params = params(&url);

        assert_eq!(params["response_type"], "code");
        assert_eq!(params["response_mode"], "query");
        assert_eq!(params["client_id"], "c1");
        assert_eq!(params["scope"], config.scope);
        assert_eq!(params["code_challenge"], config.code_challenge());
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["redirect_uri"], "app://cb");
        assert!(!params["nonce"].is_empty());
        assert!(!params.contains_key("login_hint"));
    }

    #[test]
    fn state_round_trips_through_the_url() {
        let mut state = AuthState::new("app://cb");
        state.insert("k", serde_json::json!({ "nested": [1, 2] }));
        let url = build_authorization_url(&config(), &oauth(), &state).unwrap();
        let decoded = AuthState::decode(&params(&url)["state"]).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn login_hint_and_extra_params_are_appended() {
        let config = config()
            .with_login_hint("ada@example.com")
            .with_authorize_param("$interstitial_email_federation", "true");
        let url = build_authorization_url(&config, &oauth(), &AuthState::new("app://cb")).unwrap();
        let params = params(&url);
        assert_eq!(params["login_hint"], "ada@example.com");
        assert_eq!(params["$interstitial_email_federation"], "true");
    }

    #[test]
    fn only_the_nonce_varies_between_calls() {
        let config = config();
        let state = AuthState::new("app://cb");
        let first = build_authorization_url(&config, &oauth(), &state).unwrap();
        let second = build_authorization_url(&config, &oauth(), &state).unwrap();

        let mut first = params(&first);
        let mut second = params(&second);
        assert_ne!(first.remove("nonce"), second.remove("nonce"));
        assert_eq!(first, second);
    }
}
