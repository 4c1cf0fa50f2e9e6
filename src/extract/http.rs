use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;

use super::Embedder;
use crate::error::ExtractionError;

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// 通过 HTTP 调用外部嵌入服务
///
/// - `POST {url}/embed/text`，请求体为 `{"text": "..."}`
/// - `POST {url}/embed/image`，请求体为图片原始字节
///
/// 两者均返回 `{"embedding": [...]}`
pub struct HttpEmbedder {
    base: String,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(base: impl Into<String>) -> Result<Self, ExtractionError> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        let base = base.into().trim_end_matches('/').to_owned();
        Ok(Self { base, client })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/embed/{}", self.base, endpoint)
    }
}

impl Embedder for HttpEmbedder {
    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, ExtractionError> {
        let bytes = fs::read(path)?;
        let resp = self
            .client
            .post(self.url("image"))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()?
            .error_for_status()?
            .json::<EmbeddingResponse>()?;
        Ok(resp.embedding)
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, ExtractionError> {
        let resp = self
            .client
            .post(self.url("text"))
            .json(&json!({ "text": text }))
            .send()?
            .error_for_status()?
            .json::<EmbeddingResponse>()?;
        Ok(resp.embedding)
    }
}
