//! 文字识别客户端
//!
//! 调用 Vision `images:annotate` 接口，一次请求可包含多张图片，
//! 返回结果与请求中的图片一一对应。

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::{config::OcrConfig, error::AppError};

/// 图片转文字
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// `images` 为 base64 编码的图片；结果中 `None` 表示该图片没有识别出文字
    async fn recognize(&self, images: &[String]) -> Result<Vec<Option<String>>, AppError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageAnnotation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageAnnotation {
    full_text_annotation: Option<FullText>,
    error: Option<AnnotationError>,
}

#[derive(Debug, Deserialize)]
struct FullText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnnotationError {
    message: Option<String>,
}

pub struct VisionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<Secret<String>>,
}

impl VisionClient {
    pub fn from_config(config: &OcrConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build OCR client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn request_body(images: &[String]) -> serde_json::Value {
        let requests: Vec<_> = images
            .iter()
            .map(|content| {
                json!({
                    "image": { "content": content },
                    "features": [{ "type": "TEXT_DETECTION" }]
                })
            })
            .collect();
        json!({ "requests": requests })
    }
}

#[async_trait]
impl TextRecognizer for VisionClient {
    async fn recognize(&self, images: &[String]) -> Result<Vec<Option<String>>, AppError> {
        let Some(api_key) = self.api_key.as_ref().filter(|k| !k.expose_secret().is_empty()) else {
            return Err(AppError::BadRequest("Missing OCR API key.".to_string()));
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key.expose_secret().as_str())])
            .json(&Self::request_body(images))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("OCR request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "OCR service returned status: {}",
                response.status()
            )));
        }

        let body: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid OCR response: {}", e)))?;

        let mut texts: Vec<Option<String>> = body
            .responses
            .into_iter()
            .map(|r| {
                if let Some(err) = &r.error {
                    tracing::warn!(message = ?err.message, "OCR failed for one image");
                }
                r.full_text_annotation.map(|t| t.text)
            })
            .collect();

        // 响应条数不足时补齐，保证与请求一一对应
        texts.resize(images.len(), None);
        Ok(texts)
    }
}
