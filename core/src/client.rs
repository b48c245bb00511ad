//! The client contract: lifecycle, scoped sessions, response classification.
//!
//! # Design
//! `ApiClient` models the four lifecycle operations plus the body-decode hook
//! as required capabilities; classification (`process_response`) and scoped
//! acquisition (`connect`) are provided on top of them. A client moves
//! Closed → Open → Authenticated and back; `Session` is the guard that makes
//! the reverse path unconditional. Clients are single-threaded by contract:
//! lifecycle transitions swap the one transport reference without locking.

use std::fmt;
use std::ops::{Deref, DerefMut};

use log::warn;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::ApiResponse;

/// Status codes classified as success. Fixed, not configurable.
pub const SUCCESS_STATUS: [u16; 8] = [200, 201, 202, 203, 204, 205, 206, 207];

/// Lifecycle and classification contract for an API client.
///
/// Implementations provide the transport lifecycle and the authentication
/// handshake; the trait supplies classification and the scoped-session entry
/// point. A client is never reused across an open/close cycle — after
/// `close_connection` a fresh `open_connection` is required.
pub trait ApiClient {
    /// Establish the transport. Valid only from the Closed state; the caller
    /// must not call it twice without closing in between.
    fn open_connection(&mut self) -> Result<(), ApiError>;

    /// Perform the authentication handshake. Called with the transport open.
    fn login(&mut self) -> Result<(), ApiError>;

    /// Best-effort deauthentication. A failure here never prevents the
    /// subsequent close.
    fn logout(&mut self) -> Result<(), ApiError>;

    /// Release the transport. Always safe; closing a closed client is a
    /// no-op.
    fn close_connection(&mut self);

    /// Whether the transport is currently established.
    fn is_open(&self) -> bool;

    /// Convert a response body into a decoded value. Defaults to a strict
    /// JSON parse.
    fn decode_body(&self, text: &str) -> Result<Value, ApiError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the human-readable message for a failed call. Defaults to the
    /// raw body.
    fn render_response_error(&self, text: &str) -> String {
        text.to_string()
    }

    /// Classify a response.
    ///
    /// A success status yields `(true, Some(decoded))`. Any other status
    /// yields `(false, None)` when `errors_ok` is set, and an
    /// [`ApiError::Call`] carrying status, raw body and rendered message
    /// otherwise. Decode failures on a success status propagate as
    /// [`ApiError::Decode`] and are never downgraded.
    fn process_response(
        &self,
        response: ApiResponse,
        errors_ok: bool,
    ) -> Result<(bool, Option<Value>), ApiError> {
        if SUCCESS_STATUS.contains(&response.status) {
            let decoded = self.decode_body(&response.body)?;
            Ok((true, Some(decoded)))
        } else if errors_ok {
            Ok((false, None))
        } else {
            let message = self.render_response_error(&response.body);
            Err(ApiError::call(response.status, response.body, Some(message)))
        }
    }

    /// Scoped acquisition: open the transport, then authenticate.
    ///
    /// If `login` fails the transport is closed before the error propagates,
    /// so no half-open client is ever returned. Dropping the returned
    /// [`Session`] deauthenticates (best effort) and unconditionally closes.
    fn connect(&mut self) -> Result<Session<'_, Self>, ApiError>
    where
        Self: Sized,
    {
        self.open_connection()?;

        if let Err(err) = self.login() {
            self.close_connection();
            return Err(err);
        }

        Ok(Session { client: self })
    }
}

/// Guard for an authenticated client.
///
/// Derefs to the client. On drop it calls `logout` — a failure there is
/// logged and discarded — and then `close_connection`, on every exit path.
pub struct Session<'a, C: ApiClient> {
    client: &'a mut C,
}

impl<C: ApiClient> Deref for Session<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.client
    }
}

impl<C: ApiClient> DerefMut for Session<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.client
    }
}

impl<C: ApiClient> fmt::Debug for Session<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.client.is_open())
            .finish()
    }
}

impl<C: ApiClient> Drop for Session<'_, C> {
    fn drop(&mut self) {
        if let Err(err) = self.client.logout() {
            warn!(target: "restapi.client", "logout failed during session teardown: {err}");
        }
        self.client.close_connection();
    }
}
