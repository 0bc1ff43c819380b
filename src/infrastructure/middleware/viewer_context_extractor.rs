// ViewerContext Extractor - ergonomic access from handlers

use crate::infrastructure::viewer::ViewerContext;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use std::sync::Arc;

/// Cheap-to-clone handle on the request's ViewerContext.
///
/// ```ignore
/// async fn handler(vc: Vc) -> impl IntoResponse {
///     let me = vc.require_user()?;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl Vc {
    pub fn new(vc: Arc<ViewerContext>) -> Self {
        Self(vc)
    }
}

impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<ViewerContext> for Vc {
    fn as_ref(&self) -> &ViewerContext {
        &self.0
    }
}

// The middleware must have run; a missing context is a wiring bug.
impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR);

        async move { vc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::viewer::new_request_id;

    #[test]
    fn vc_derefs_to_viewer_context() {
        let viewer = Arc::new(ViewerContext::anonymous("test-request".to_string()));
        let vc = Vc::new(viewer);
        assert_eq!(vc.request_id, "test-request");
        assert!(!vc.is_authenticated());
    }

    #[tokio::test]
    async fn extracts_from_request_extensions() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        parts
            .extensions
            .insert(Arc::new(ViewerContext::anonymous(new_request_id())));
        let vc = Vc::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(vc.request_id.starts_with("req-"));
    }

    #[tokio::test]
    async fn missing_context_is_rejected() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let result = Vc::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
