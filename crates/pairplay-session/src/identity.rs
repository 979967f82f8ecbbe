//! Identity hints carried by the optional bearer token.
//!
//! Pairplay does not authenticate anyone. An external identity service may
//! have issued the client a JWT-shaped token (`header.payload.signature`);
//! when the client passes it as `?token=...` on the upgrade request, the
//! payload's `username` is shown on the client's seat. The signature is
//! never checked, so the result is only ever used for display.
//!
//! The [`IdentityResolver`] trait is the seam where a verifying
//! implementation could be plugged in instead.

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
};
use serde::Deserialize;

use crate::SessionError;

/// Who a connection claims to be.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Name to show on the connection's seat, if the token carried one.
    pub display_name: Option<String>,
    /// External user id, if the token carried one. Informational only.
    pub user_id: Option<String>,
}

impl Identity {
    /// An identity with nothing known about it.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Turns the optional bearer token of a new connection into an [`Identity`].
///
/// Resolution never fails: a missing or unreadable token degrades to an
/// anonymous identity and the connection proceeds as normal.
///
/// # Example
///
/// ```rust
/// use pairplay_session::{Identity, IdentityResolver};
///
/// /// Names every connection after its token, verbatim.
/// struct EchoResolver;
///
/// impl IdentityResolver for EchoResolver {
///     async fn resolve(&self, token: Option<&str>) -> Identity {
///         Identity {
///             display_name: token.map(str::to_string),
///             user_id: None,
///         }
///     }
/// }
/// ```
pub trait IdentityResolver: Send + Sync + 'static {
    fn resolve(&self, token: Option<&str>) -> impl std::future::Future<Output = Identity> + Send;
}

/// The default resolver: reads `username` and `id` from the token payload
/// without verifying it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedTokenHint;

impl IdentityResolver for UnverifiedTokenHint {
    async fn resolve(&self, token: Option<&str>) -> Identity {
        let Some(token) = token else {
            return Identity::anonymous();
        };
        match decode_token_hint(token) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unreadable token");
                Identity::anonymous()
            }
        }
    }
}

#[derive(Deserialize)]
struct TokenPayload {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// Decodes the middle segment of a `header.payload.signature` token.
///
/// The payload may use the URL-safe or the standard base64 alphabet, with
/// or without `=` padding.
///
/// # Errors
/// Returns [`SessionError::MalformedToken`] if the token has no payload
/// segment, the segment is not base64, or it is not a JSON object.
pub fn decode_token_hint(token: &str) -> Result<Identity, SessionError> {
    let segment = token
        .split('.')
        .nth(1)
        .ok_or_else(|| SessionError::MalformedToken("missing payload segment".into()))?;
    let segment = segment.trim_end_matches('=');

    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| STANDARD_NO_PAD.decode(segment))
        .map_err(|e| SessionError::MalformedToken(e.to_string()))?;
    let payload: TokenPayload =
        serde_json::from_slice(&bytes).map_err(|e| SessionError::MalformedToken(e.to_string()))?;

    let user_id = payload.id.and_then(|id| match id {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    Ok(Identity {
        display_name: payload.username.filter(|name| !name.trim().is_empty()),
        user_id,
    })
}
