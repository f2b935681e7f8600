use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AuthError;

/// Opaque application state round-tripped through the identity provider.
///
/// The provider must echo the encoded blob back unmodified on the redirect;
/// hosts use the extension map to correlate the redirect with whatever
/// triggered the sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    /// Where the provider should ultimately send the user. Defaults to the
    /// client's registered redirect URI.
    pub source_redirect_url: String,
    /// Authorization endpoint recorded for the flow, overridable by the host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize_url: Option<String>,
    /// Arbitrary host-supplied extension data.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthState {
    pub fn new(source_redirect_url: impl Into<String>) -> Self {
        Self {
            source_redirect_url: source_redirect_url.into(),
            authorize_url: None,
            extra: Map::new(),
        }
    }

    pub fn with_authorize_url(mut self, authorize_url: impl Into<String>) -> Self {
        self.authorize_url = Some(authorize_url.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.extra.insert(key.into(), value);
    }

    /// Pack the state into a single transport-safe query-parameter value.
    ///
    /// JSON serialization followed by unpadded base64url keeps arbitrary
    /// extension values lossless without further percent-encoding.
    pub fn encode(&self) -> Result<String, AuthError> {
        let json = serde_json::to_string(self)
            .map_err(|err| AuthError::Parse(format!("state failed to serialize: {err}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Unpack a blob previously produced by [`AuthState::encode`].
    ///
    /// Failures are parse errors, distinct from the provider reporting an
    /// authorization error.
    pub fn decode(blob: &str) -> Result<Self, AuthError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(blob.as_bytes())
            .map_err(|err| AuthError::Parse(format!("state is not valid base64url: {err}")))?;
        let json = std::str::from_utf8(&bytes)
            .map_err(|err| AuthError::Parse(format!("state is not valid UTF-8: {err}")))?;
        serde_json::from_str(json)
            .map_err(|err| AuthError::Parse(format!("state is not valid JSON: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ErrorKind;
    use serde_json::json;

    #[test]
    fn round_trip_minimal() {
        let state = AuthState::new("app://cb");
        let decoded = AuthState::decode(&state.encode().unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn round_trip_with_extension_values() {
        let mut state = AuthState::new("app://cb").with_authorize_url("https://idp.example/auth");
        state.insert("flag", json!(true));
        state.insert("count", json!(42));
        state.insert("tags", json!(["a", "b"]));
        state.insert("nested", json!({ "inner": { "deep": [1, 2, 3] } }));
        let decoded = AuthState::decode(&state.encode().unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn encoded_form_is_query_safe() {
        let mut state = AuthState::new("https://example.com/cb?a=b&c=d");
        state.insert("text", json!("spaces & ampersands = trouble"));
        let blob = state.encode().unwrap();
        assert!(blob
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = AuthState::decode("%%%not-base64%%%").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);

        let not_json = URL_SAFE_NO_PAD.encode("not json at all");
        let err = AuthState::decode(&not_json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn decode_requires_source_redirect_url() {
        let blob = URL_SAFE_NO_PAD.encode(r#"{"authorize_url":"x"}"#);
        let err = AuthState::decode(&blob).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
