use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::{auth, routes};
use routes::AppState;

/// The thin admin/admission HTTP façade (spec.md §6). Mirrors the
/// teacher's `admin_api::server::AdminApiServer::run` shape: a
/// `Router::new().route(...)` tree, an auth middleware keyed on a shared
/// secret header, and a permissive CORS layer — renamed from
/// `X-Fortress-Key` to `X-Admission-Key`. Every route only calls into
/// `Engine`; there is no logic here beyond wiring.
pub struct AdmissionServer {
    state: AppState,
    bind_addr: String,
}

impl AdmissionServer {
    pub fn new(state: AppState, bind_addr: String) -> Self {
        Self { state, bind_addr }
    }

    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let state = self.state.clone();
        let api_key = state.api_key.clone();

        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        let admin_routes = Router::new()
            .route("/api/keys", get(routes::list_keys).post(routes::create_key))
            .route(
                "/api/keys/{id}",
                get(routes::get_key).delete(routes::delete_key),
            )
            .route("/api/keys/{id}/rotate", post(routes::rotate_key))
            .route("/api/keys/{id}/deactivate", post(routes::deactivate_key))
            .route("/api/bans", get(routes::list_bans).post(routes::create_ban))
            .route("/api/bans/{identifier}", get(routes::get_ban))
            .route("/api/bans/{id}/remove", post(routes::remove_ban))
            .route(
                "/api/geo",
                get(routes::get_geo).put(routes::set_geo_enabled),
            )
            .route(
                "/api/geo/countries",
                post(routes::add_geo).put(routes::replace_geo),
            )
            .route("/api/geo/countries/{code}", axum::routing::delete(routes::remove_geo))
            .route(
                "/api/manual-blocks",
                get(routes::list_manual_blocks).post(routes::add_manual_block),
            )
            .route(
                "/api/manual-blocks/{identifier}",
                axum::routing::delete(routes::remove_manual_block),
            )
            .route("/api/stats/aggregate", get(routes::get_aggregate))
            .route("/api/status", get(routes::get_status))
            .layer(middleware::from_fn_with_state(api_key, auth::auth_middleware));

        let app = Router::new()
            .route("/api/admission/check", post(routes::check_admission))
            .route("/api/reputation/check", post(routes::check_reputation))
            .merge(admin_routes)
            .layer(cors)
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;
        info!("admission engine listening on {}", self.bind_addr);
        axum::serve(listener, app).await?;

        Ok(())
    }
}
