use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_auth::AuthBearer;
use log::info;
use tokio::task::{block_in_place, spawn_blocking};

use super::error::{BadRequest, Result, Unauthorized};
use super::state::AppState;
use super::types::*;
use crate::color::ColorQuery;
use crate::driver::LogProgress;
use crate::engine::{ReconcileReport, Status};
use crate::identity::Identity;

fn check_token(state: &AppState, token: &str) -> Result<()> {
    if token != state.token {
        return Err(Unauthorized.into());
    }
    Ok(())
}

/// 使用文本搜索图片
#[utoipa::path(
    post,
    path = "/search/text",
    request_body = TextSearchRequest,
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn search_text_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(data): Json<TextSearchRequest>,
) -> Result<Json<SearchResponse>> {
    check_token(&state, &token)?;
    let count = data.count.unwrap_or(state.config.max_results);

    let start = Instant::now();
    let result = block_in_place(|| state.db.search_text(&data.query, count))?;

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, result }))
}

/// 使用颜色搜索图片
#[utoipa::path(
    post,
    path = "/search/color",
    request_body = ColorSearchRequest,
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn search_color_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(data): Json<ColorSearchRequest>,
) -> Result<Json<SearchResponse>> {
    check_token(&state, &token)?;
    let query = ColorQuery::parse(&data.colors)?;
    if query.is_empty() {
        return Err(BadRequest("至少需要一个颜色".to_string()).into());
    }
    let count = data.count.unwrap_or(state.config.max_results);

    let start = Instant::now();
    let result = block_in_place(|| state.db.search_color(&query, count));

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, result }))
}

/// 将缓存与图片目录同步
#[utoipa::path(
    post,
    path = "/reconcile",
    request_body = ReconcileRequest,
    responses(
        (status = 200, body = ReconcileReport),
    )
)]
pub async fn reconcile_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(data): Json<ReconcileRequest>,
) -> Result<Json<ReconcileReport>> {
    check_token(&state, &token)?;
    let folder = match data.folder {
        Some(folder) => PathBuf::from(folder),
        None => state
            .config
            .image_folder
            .clone()
            .ok_or_else(|| BadRequest("未指定图片目录".to_string()))?,
    };

    info!("正在同步目录 {}", folder.display());
    let db = state.db.clone();
    let report = spawn_blocking(move || db.reconcile(&folder, &LogProgress)).await??;
    Ok(Json(report))
}

/// 取消正在运行的同步任务
#[utoipa::path(
    post,
    path = "/cancel",
    responses(
        (status = 200, body = CancelResponse),
    )
)]
pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<CancelResponse>> {
    check_token(&state, &token)?;
    Ok(Json(CancelResponse { cancelled: state.db.cancel_batch() }))
}

/// 重命名缓存中的图片，不会修改磁盘上的文件
#[utoipa::path(
    post,
    path = "/rename",
    request_body = RenameRequest,
    responses(
        (status = 200, body = RenameResponse),
        (status = 409, description = "目标已存在"),
    )
)]
pub async fn rename_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(data): Json<RenameRequest>,
) -> Result<Json<RenameResponse>> {
    check_token(&state, &token)?;
    let old = Identity::from_path(&data.old)?;
    let new = Identity::from_path(&data.new)?;
    let renamed = block_in_place(|| state.db.rename(&old, &new))?;
    Ok(Json(RenameResponse { renamed }))
}

/// 从缓存中删除图片，不会修改磁盘上的文件
#[utoipa::path(
    post,
    path = "/delete",
    request_body = DeleteRequest,
    responses(
        (status = 200, body = DeleteResponse),
    )
)]
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(data): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>> {
    check_token(&state, &token)?;
    let id = Identity::from_path(&data.path)?;
    let deleted = block_in_place(|| state.db.delete(&id));
    Ok(Json(DeleteResponse { deleted }))
}

/// 获取缓存状态
#[utoipa::path(
    post,
    path = "/status",
    responses(
        (status = 200, body = Status),
    )
)]
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<Status>> {
    check_token(&state, &token)?;
    Ok(Json(state.db.status()))
}
