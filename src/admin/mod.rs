//! Admin API: table inspection and diagnostics, Bearer-token protected.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/rules", get(get_rules))
        .route("/admin/resolve", get(resolve))
        .route("/admin/stats", get(get_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::{RewriteRule, RewriterConfig};
    use crate::http::server::RuntimeState;

    fn app() -> (AppState, Router) {
        let mut config = RewriterConfig::default();
        config.admin.api_key = "secret".into();
        config.rewrites = vec![
            RewriteRule::new("/signin/sent", "/signinLinkSent"),
            RewriteRule::new("/signin/:token?", "/signin"),
        ];
        let state = AppState::new(RuntimeState::build(config, 0).unwrap());
        (state.clone(), setup_admin_router(state))
    }

    fn get(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json(router: Router, request: Request<Body>) -> serde_json::Value {
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let (_, router) = app();
        let missing = router.clone().oneshot(get("/admin/status", None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = router.oneshot(get("/admin/status", Some("nope"))).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_and_rules() {
        let (_, router) = app();
        let status = json(router.clone(), get("/admin/status", Some("secret"))).await;
        assert_eq!(status["rules"], 2);
        assert_eq!(status["generation"], 0);

        let rules = json(router, get("/admin/rules", Some("secret"))).await;
        assert_eq!(rules[0]["source"], "/signin/sent");
        assert_eq!(rules[1]["destination"], "/signin");
    }

    #[tokio::test]
    async fn test_resolve_reports_shadowed_rules() {
        let (_, router) = app();
        let body = json(router, get("/admin/resolve?path=/signin/sent/", Some("secret"))).await;
        assert_eq!(body["normalized"], "/signin/sent");
        assert_eq!(body["resolution"]["destination"], "/signinLinkSent");
        assert_eq!(body["shadowed"][0]["params"]["token"], "sent");
    }

    #[tokio::test]
    async fn test_resolve_unmatched() {
        let (_, router) = app();
        let body = json(router, get("/admin/resolve?path=/nowhere", Some("secret"))).await;
        assert!(body["resolution"].is_null());
        assert_eq!(body["shadowed"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let (state, router) = app();
        state.stats.record_hit("/signin");
        state.stats.record_unmatched();
        let body = json(router, get("/admin/stats", Some("secret"))).await;
        assert_eq!(body["hits"]["/signin"], 1);
        assert_eq!(body["unmatched"], 1);
    }
}
