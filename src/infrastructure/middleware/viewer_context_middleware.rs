// ViewerContext Middleware - resolves the request principal before any handler runs
// The identity collaborator authenticates upstream and forwards the username in a header

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::infrastructure::store::EntityStore;
use crate::infrastructure::viewer::{new_request_id, Principal, ViewerContext};

/// Application state that can resolve identities
pub trait HasIdentity {
    fn store(&self) -> &Arc<dyn EntityStore>;
    fn identity_header(&self) -> &str;
}

/// Creates the request-scoped ViewerContext and injects it into request extensions
pub async fn viewer_context_middleware<T>(
    State(app_state): State<T>,
    mut request: Request,
    next: Next,
) -> AppResult<Response>
where
    T: HasIdentity + Clone + Send + Sync + 'static,
{
    let username = extract_identity(request.headers(), app_state.identity_header());
    let viewer = resolve_viewer(app_state.store().as_ref(), username).await?;

    request.extensions_mut().insert(Arc::new(viewer));
    Ok(next.run(request).await)
}

/// Username forwarded by the identity collaborator, if any.
pub fn extract_identity(headers: &HeaderMap, header: &str) -> Option<String> {
    let value = headers.get(header)?;
    match value.to_str() {
        Ok(raw) => {
            let username = raw.trim();
            (!username.is_empty()).then(|| username.to_string())
        }
        Err(_) => {
            warn!(header, "identity header is not valid text; treating request as anonymous");
            None
        }
    }
}

/// Unknown usernames degrade to an anonymous viewer.
pub async fn resolve_viewer(
    store: &dyn EntityStore,
    username: Option<String>,
) -> AppResult<ViewerContext> {
    let request_id = new_request_id();

    let Some(username) = username else {
        return Ok(ViewerContext::anonymous(request_id));
    };

    match store.find_user(&username).await? {
        Some(user) => {
            debug!(%request_id, user = %user.username, "authenticated viewer");
            Ok(ViewerContext::authenticated(request_id, Principal::from(&user)))
        }
        None => {
            warn!(%request_id, %username, "identity header names an unknown user");
            Ok(ViewerContext::anonymous(request_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_trimmed_username() {
        let mut headers = HeaderMap::new();
        headers.insert("x-remote-user", HeaderValue::from_static("  sam "));
        assert_eq!(extract_identity(&headers, "x-remote-user"), Some("sam".to_string()));
    }

    #[test]
    fn missing_or_blank_header_is_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_identity(&headers, "x-remote-user"), None);

        headers.insert("x-remote-user", HeaderValue::from_static("   "));
        assert_eq!(extract_identity(&headers, "x-remote-user"), None);
    }

    #[test]
    fn honours_configured_header_name() {
        let mut headers = HeaderMap::new();
        headers.insert("x-remote-user", HeaderValue::from_static("sam"));
        assert_eq!(extract_identity(&headers, "x-forwarded-user"), None);
    }
}
