// src/api/server.rs
//
// Router wiring: permissive CORS, security headers (with an HSTS toggle),
// and the route table (spec.md §4.9).

use std::sync::Arc;

use axum::http::header::{HeaderName, HeaderValue};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::routes;
use super::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let disable_hsts = state.config.disable_hsts;

    let mut router = Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/api/families", get(routes::list_families))
        .route("/api/snapshots", get(routes::snapshots_all))
        .route("/api/snapshots/:tank_id", get(routes::snapshots_by_tank))
        .route("/api/tanks", get(routes::list_tanks))
        .route(
            "/api/devices/enable",
            get(routes::get_enable_map).post(routes::set_enable_map),
        )
        .route("/api/logs", get(routes::list_logs))
        .route("/api/logs/query", get(routes::query_logs))
        .route("/api/logs/:filename", get(routes::download_log))
        .route(
            "/api/alarms/thresholds",
            get(routes::get_thresholds).post(routes::set_thresholds),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ));

    if !disable_hsts {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ));
    }

    router
}

/// Bind and serve until the process is signalled to stop. Errors here are
/// treated as a startup failure (spec.md §6: non-zero exit).
pub async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.api_host, state.config.api_port);
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tlog!("[api] listening on {}", addr);
    axum::serve(listener, router).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::{AlarmEngine, NullNotifier};
    use crate::config::GatewayConfig;
    use crate::families::FamilyRegistry;

    #[tokio::test]
    async fn router_builds_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GatewayConfig::from_env();
        config.config_dir = dir.path().to_path_buf();
        config.log_dir = dir.path().to_path_buf();

        let families = FamilyRegistry::load(&config).await.unwrap();
        let alarm_engine = AlarmEngine::new(dir.path().join("alarmConfig.json"), 60 * 60_000, Box::new(NullNotifier));

        let state = Arc::new(AppState {
            config,
            families: Arc::new(families),
            alarm_engine: Arc::new(alarm_engine),
        });

        let _router = build_router(state);
    }
}
