//! Bearer credential decoration.

use fintrack_core::AccessToken;
use fintrack_core::ApiRequest;
use fintrack_core::header::{AUTHORIZATION, HeaderValue};
use tracing::warn;

/// Attach `Authorization: Bearer <token>` when a token is present.
///
/// Without a token the request is returned unmodified, which is how login and
/// registration calls go out. A token that is not a valid header value leaves
/// the request undecorated; the server then answers as for an anonymous call.
pub fn authorize(request: ApiRequest, token: Option<&AccessToken>) -> ApiRequest {
    let Some(token) = token else {
        return request;
    };

    match HeaderValue::from_str(&format!("Bearer {}", token.as_str())) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.with_header(AUTHORIZATION, value)
        }
        Err(_) => {
            warn!("access token contains characters not allowed in a header");
            request
        }
    }
}
