mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::search_text_handler,
        api::search_color_handler,
        api::reconcile_handler,
        api::cancel_handler,
        api::rename_handler,
        api::delete_handler,
        api::status_handler,
    ),
    components(schemas(
        types::TextSearchRequest,
        types::ColorSearchRequest,
        types::SearchResponse,
        types::ReconcileRequest,
        types::RenameRequest,
        types::RenameResponse,
        types::DeleteRequest,
        types::DeleteResponse,
        types::CancelResponse,
        crate::rank::Hit,
        crate::engine::ReconcileReport,
        crate::engine::Status,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search/text", post(api::search_text_handler))
        .route("/search/color", post(api::search_color_handler))
        .route("/reconcile", post(api::reconcile_handler))
        .route("/cancel", post(api::cancel_handler))
        .route("/rename", post(api::rename_handler))
        .route("/delete", post(api::delete_handler))
        .route("/status", post(api::status_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // 请求体限制：1M
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .with_state(state)
}
