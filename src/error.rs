use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::identity::Identity;

/// 引擎对外返回的错误
#[derive(Error, Debug)]
pub enum Error {
    /// 目录不存在或无权限读取，此时不会产生任何增删结果
    #[error("无法读取目录 {}: {source}", path.display())]
    FolderUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// 重命名的目标已存在于缓存中，原有状态未被修改
    #[error("目标已存在: {0}")]
    IdentityConflict(Identity),
    /// 已有一个批处理任务正在运行
    #[error("已有图片处理任务正在进行")]
    ConcurrentBatchRejected,
    #[error("无效的颜色: {0}")]
    InvalidColor(String),
    #[error("未配置嵌入服务")]
    EmbedderUnavailable,
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// 单张图片特征提取失败的原因，只会导致该图片被跳过
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("读取图片失败: {0}")]
    Io(#[from] io::Error),
    #[error("解码图片失败: {0}")]
    Decode(#[from] image::ImageError),
    #[error("嵌入服务请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("向量维度不一致：期望 {expected}，实际 {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
