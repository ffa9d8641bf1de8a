//! Response Cache Filter
//!
//! Axum middleware placing the cache in front of the inner service: answer
//! from the cache when possible, otherwise let the request through and
//! capture the response on its way out.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::context::HttpContext;
use crate::gateway::AppState;

/// Middleware consulting the cache before `next` and feeding it after.
pub async fn response_cache(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let mut ctx = HttpContext::from_request_parts(&parts);

    if state.cache.load(&mut ctx) {
        debug!(method = %parts.method, uri = %parts.uri, "served from cache");
        return ctx.into_response(Body::empty());
    }

    let response = next.run(Request::from_parts(parts, body)).await;
    let (head, body) = response.into_parts();
    ctx.set_response_head(head);
    state.cache.store(&mut ctx);

    ctx.into_response(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, TAG_CACHE_LOAD};
    use crate::config::CacheSpec;
    use axum::{
        body::to_bytes,
        http::{header::CACHE_CONTROL, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(state: AppState, calls: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/a",
                get(move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        ([("x-call", n.to_string())], format!("call {}", n))
                    }
                }),
            )
            .layer(from_fn_with_state(state.clone(), response_cache))
            .with_state(state)
    }

    fn state() -> AppState {
        let spec = CacheSpec {
            expiration: "1s".to_string(),
            max_entry_bytes: 1024,
            codes: vec![200],
            methods: vec!["GET".to_string()],
        };
        AppState::new(MemoryCache::new(&spec), "http://unused")
    }

    async fn send(app: &Router, request: Request) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn get_a() -> Request {
        http::Request::builder()
            .uri("/a")
            .header("host", "example.com")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = state();
        let app = app(state.clone(), Arc::clone(&calls));

        assert_eq!(send(&app, get_a()).await, (StatusCode::OK, "call 1".to_string()));
        assert_eq!(send(&app, get_a()).await, (StatusCode::OK, "call 1".to_string()));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_cached_headers_are_replayed() {
        let app = app(state(), Arc::new(AtomicUsize::new(0)));
        send(&app, get_a()).await;

        let response = app.clone().oneshot(get_a()).await.unwrap();
        assert_eq!(response.headers()["x-call"], "1");
    }

    #[tokio::test]
    async fn test_no_cache_request_bypasses_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = app(state(), Arc::clone(&calls));
        send(&app, get_a()).await;

        let request = http::Request::builder()
            .uri("/a")
            .header("host", "example.com")
            .header(CACHE_CONTROL, "no-cache")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.1, "call 2");
    }

    #[tokio::test]
    async fn test_load_tag_recorded_on_hit() {
        let state = state();
        let app = app(state.clone(), Arc::new(AtomicUsize::new(0)));
        send(&app, get_a()).await;

        let (parts, _) = get_a().into_parts();
        let mut ctx = HttpContext::from_request_parts(&parts);
        assert!(state.cache.load(&mut ctx));
        assert!(ctx.tags().contains(TAG_CACHE_LOAD));
    }
}
