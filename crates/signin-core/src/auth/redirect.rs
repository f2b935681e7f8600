use url::Url;

use super::{AuthError, AuthState};

/// Classification of a navigation attempt reported by the browser surface.
#[derive(Debug)]
pub enum RedirectOutcome {
    /// Not our redirect; the surface should let the navigation proceed.
    Ignored,
    /// Ours, and it reports a failure.
    Failure(AuthError),
    /// Ours, carrying an authorization code and the echoed state.
    Authorized { code: String, state: AuthState },
}

impl RedirectOutcome {
    /// Whether the surface should stop the navigation and dismiss itself.
    pub fn handled(&self) -> bool {
        !matches!(self, RedirectOutcome::Ignored)
    }
}

/// Classify a navigation attempt against the registered redirect URI.
///
/// Ownership is decided on the URI scheme alone: any URI sharing the
/// registered scheme is claimed, path and host notwithstanding. This is a
/// known precision gap; stricter matching would be a behavior change for
/// providers that bounce through intermediate URLs on the same scheme.
pub fn interpret_redirect(candidate: &Url, registered: &Url) -> RedirectOutcome {
    if candidate.scheme() != registered.scheme() {
        return RedirectOutcome::Ignored;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in candidate.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    // Provider-reported errors win over everything else in the query.
    if let Some(error) = error {
        let message = match error_description {
            Some(description) => format!("{error} {description}"),
            None => error,
        };
        return RedirectOutcome::Failure(AuthError::Protocol(message));
    }

    let (code, encoded_state) = match (code, state) {
        (Some(code), Some(state)) => (code, state),
        _ => {
            return RedirectOutcome::Failure(AuthError::Redirect(
                "auth code not found in redirect url".into(),
            ))
        }
    };

    match AuthState::decode(&encoded_state) {
        Ok(state) => RedirectOutcome::Authorized { code, state },
        Err(err) => RedirectOutcome::Failure(err),
    }
}
