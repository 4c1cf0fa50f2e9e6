mod http;
mod palette;

use std::path::Path;

pub use http::*;
pub use palette::*;

use crate::color::Palette;
use crate::error::ExtractionError;

/// 图片与文本的嵌入模型
///
/// 两种方法得到的向量维度相同，可以通过余弦相似度比较
pub trait Embedder: Send + Sync {
    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, ExtractionError>;

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, ExtractionError>;
}

/// 图片主色调提取
pub trait PaletteExtractor: Send + Sync {
    fn extract_palette(&self, path: &Path) -> Result<Palette, ExtractionError>;
}
