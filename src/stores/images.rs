use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{AppError, Result};

/// The external image service contract.
///
/// Upload and delete may each fail transiently or permanently; the two are
/// indistinguishable here, so every failure is terminal for that call and
/// the caller decides between compensation and log-and-continue.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Uploads an image payload and returns the service's image ID.
    async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        image_id: Uuid,
        uploader_id: Uuid,
    ) -> Result<String>;

    /// Deletes an uploaded image by its service ID.
    async fn delete(&self, image_id: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct CloudflareImageResult {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareEnvelope {
    success: bool,
    result: Option<CloudflareImageResult>,
    #[serde(default)]
    errors: Vec<CloudflareError>,
}

impl CloudflareEnvelope {
    fn error_message(&self, fallback: &str) -> String {
        if self.errors.is_empty() {
            fallback.to_string()
        } else {
            self.errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// Cloudflare Images client.
#[derive(Clone)]
pub struct CloudflareImages {
    http: reqwest::Client,
    account_id: String,
    api_token: Zeroizing<String>,
}

impl CloudflareImages {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_id: config.cloudflare_account_id.clone(),
            api_token: config.cloudflare_images_token.clone(),
        }
    }

    fn base_url(&self) -> String {
        format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/images/v1",
            self.account_id
        )
    }
}

#[async_trait]
impl ImageService for CloudflareImages {
    async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        image_id: Uuid,
        uploader_id: Uuid,
    ) -> Result<String> {
        let metadata = sonic_rs::to_string(&sonic_rs::json!({
            "imageId": image_id.to_string(),
            "uploaderId": uploader_id.to_string(),
        }))
        .map_err(|e| AppError::Internal(format!("Image metadata serialization failed: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(data).file_name(filename.to_string()),
            )
            .text("metadata", metadata);

        let response = self
            .http
            .post(self.base_url())
            .bearer_auth(self.api_token.as_str())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upload(format!(
                "Cloudflare Images API error: {} {}",
                status, body
            )));
        }

        let envelope: CloudflareEnvelope = response.json().await?;
        if !envelope.success {
            return Err(AppError::Upload(format!(
                "Image upload failed: {}",
                envelope.error_message("Upload failed")
            )));
        }

        envelope
            .result
            .map(|r| r.id)
            .ok_or_else(|| AppError::Upload("Image upload returned no result".to_string()))
    }

    async fn delete(&self, image_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/{}", self.base_url(), image_id))
            .bearer_auth(self.api_token.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upload(format!(
                "Cloudflare Images API error: {} {}",
                status, body
            )));
        }

        let envelope: CloudflareEnvelope = response.json().await?;
        if !envelope.success {
            return Err(AppError::Upload(format!(
                "Image deletion failed: {}",
                envelope.error_message("Deletion failed")
            )));
        }

        Ok(())
    }
}
