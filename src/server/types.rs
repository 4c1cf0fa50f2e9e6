use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::rank::Hit;

/// 文本搜索请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct TextSearchRequest {
    /// 搜索的文本
    pub query: String,
    /// 返回的结果数量，默认使用配置文件中的值
    pub count: Option<usize>,
}

/// 颜色搜索请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct ColorSearchRequest {
    /// 十六进制颜色，例如 `#ff0000`，超过 5 个时只保留最后 5 个
    pub colors: Vec<String>,
    /// 返回的结果数量，默认使用配置文件中的值
    pub count: Option<usize>,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 按相似度从高到低排列的结果
    pub result: Vec<Hit>,
}

/// 同步目录的参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReconcileRequest {
    /// 图片目录，不填则使用配置文件中的目录
    pub folder: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameRequest {
    /// 原图片路径
    pub old: String,
    /// 新图片路径
    pub new: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RenameResponse {
    /// 是否有缓存被修改
    pub renamed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteRequest {
    /// 图片路径
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    /// 图片是否存在于缓存中
    pub deleted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    /// 是否有正在运行的任务被取消
    pub cancelled: bool,
}
