//! Client side of the OAuth2 Authorization Code flow with PKCE for
//! applications that delegate sign-in to an external browser surface and
//! receive the authorization code back on a registered redirect scheme.
//!
//! The host implements [`auth::SignInDelegate`] (registration parameters,
//! extension state, result delivery) and [`auth::BrowserSurface`] (loading
//! the authorization URL, reporting navigation attempts);
//! [`auth::SignInOrchestrator`] sequences discovery, PKCE binding, the
//! authorization request, and redirect interpretation, and exposes the
//! follow-up code-for-token exchange and profile fetch.

pub mod auth;
