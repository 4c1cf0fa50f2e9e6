use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::ImageSearch;

/// 应用状态
pub struct AppState {
    /// 搜索引擎
    pub db: Arc<ImageSearch>,
    /// 应用配置，提供默认目录和结果数量
    pub config: AppConfig,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(db: ImageSearch, config: AppConfig, token: String) -> Arc<Self> {
        Arc::new(AppState { db: Arc::new(db), config, token })
    }
}
