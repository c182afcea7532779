use super::http_layers::log_requests;
use super::metrics::metrics_handler;
use super::state::{GuardedForumStore, GuardedSiteSettingsCache, ServerState};
use super::ServerConfig;
use crate::site_settings::SiteSettings;
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::time::Duration;
use tracing::error;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub posts: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> Response {
    let store = state.store.clone();
    let posts = match tokio::task::spawn_blocking(move || store.count_posts()).await {
        Ok(Ok(count)) => count,
        Ok(Err(err)) => {
            error!("Failed to count posts: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(err) => {
            error!("Post count task failed: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        posts,
    })
    .into_response()
}

async fn get_settings(
    State(cache): State<GuardedSiteSettingsCache>,
    State(store): State<GuardedForumStore>,
) -> Response {
    match cache.get_or_load(store.as_ref()).await {
        Ok(settings) => Json::<SiteSettings>(settings).into_response(),
        Err(err) => {
            error!("Failed to load site settings: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Build the request router.
pub fn make_app(
    config: ServerConfig,
    store: GuardedForumStore,
    settings_cache: GuardedSiteSettingsCache,
) -> Router {
    let state = ServerState::new(config, store, settings_cache);

    Router::new()
        .route("/", get(home))
        .route("/v1/settings", get(get_settings))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site_settings::SiteSettingsCache;
    use crate::store::{ForumStore, SqliteForumStore};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_test_app() -> (Router, Arc<SqliteForumStore>, Arc<SiteSettingsCache>) {
        let store = Arc::new(SqliteForumStore::open_in_memory().unwrap());
        let cache = Arc::new(SiteSettingsCache::new());
        let app = make_app(ServerConfig::default(), store.clone(), cache.clone());
        (app, store, cache)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[tokio::test]
    async fn test_home_reports_post_count() {
        let (app, store, _) = make_test_app();
        store.create_post(1, "hi", false, 0).unwrap();
        store.create_post(1, "draft", true, 0).unwrap();

        let (status, body) = get_json(app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["posts"], 2);
        assert!(body["uptime"].as_str().unwrap().starts_with("0d"));
    }

    #[tokio::test]
    async fn test_settings_served_from_cache() {
        let (app, store, cache) = make_test_app();
        store
            .save_site_settings(&SiteSettings {
                site_name: "In store".to_string(),
                ..Default::default()
            })
            .unwrap();
        cache
            .store(SiteSettings {
                site_name: "In cache".to_string(),
                ..Default::default()
            })
            .await;

        let (status, body) = get_json(app, "/v1/settings").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["site_name"], "In cache");
    }

    #[tokio::test]
    async fn test_settings_loaded_on_cache_miss() {
        let (app, store, cache) = make_test_app();
        store
            .save_site_settings(&SiteSettings {
                site_name: "In store".to_string(),
                ..Default::default()
            })
            .unwrap();

        let (_, body) = get_json(app, "/v1/settings").await;

        assert_eq!(body["site_name"], "In store");
        assert_eq!(cache.get().await.unwrap().site_name, "In store");
    }
}
