use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use super::{is_valid_segment, ImageData, ImageError, ImageHost, ImageId, StoredImage};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";

/// Cloudinary upload API client. Requests are signed with SHA-256.
#[derive(Clone)]
pub struct CloudinaryImageHost {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

impl std::fmt::Debug for CloudinaryImageHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryImageHost")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("folder", &self.folder)
            .finish()
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    public_id: String,
    version: i64,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryImageHost {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            folder: folder.into(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{API_BASE}/{}/image/{action}", self.cloud_name)
    }

    /// Adds `timestamp`, `api_key`, `signature` and `signature_algorithm` to
    /// the signed parameters.
    fn signed_form(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        params.push(("timestamp", Utc::now().timestamp().to_string()));
        let signature = sign(&params, &self.api_secret);
        params.push(("api_key", self.api_key.clone()));
        params.push(("signature", signature));
        params.push(("signature_algorithm", "sha256".to_string()));
        params
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        form: Vec<(&'static str, String)>,
    ) -> Result<T, ImageError> {
        let response = self
            .client
            .post(self.endpoint(action))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageError::Host(format!("{status}: {body}")));
        }

        Ok(response.json::<T>().await?)
    }
}

/// Signature over the parameters sorted by name, `k=v` pairs joined by `&`,
/// followed by the API secret.
pub fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ImageHost for CloudinaryImageHost {
    async fn upload(
        &self,
        image: &ImageData,
        public_id: Option<&str>,
    ) -> Result<String, ImageError> {
        let public_id = match public_id {
            Some(id) if is_valid_segment(id) => id.to_owned(),
            Some(id) => return Err(ImageError::Host(format!("Invalid public id: {id}"))),
            None => Uuid::new_v4().simple().to_string(),
        };

        let mut form = self.signed_form(vec![
            ("invalidate", "true".to_string()),
            ("overwrite", "true".to_string()),
            ("public_id", format!("{}/{public_id}", self.folder)),
        ]);
        form.push(("file", image.to_data_url()));

        let uploaded: UploadResponse = self.post("upload", form).await?;
        Ok(format!("v{}/{}", uploaded.version, uploaded.public_id))
    }

    async fn delete(&self, id: &str) -> Result<(), ImageError> {
        let Some(id) = ImageId::parse(id) else {
            return Err(ImageError::Host(format!("Invalid image id: {id}")));
        };

        let form = self.signed_form(vec![
            ("invalidate", "true".to_string()),
            ("public_id", format!("{}/{}", id.folder, id.public_id)),
        ]);
        let destroyed: DestroyResponse = self.post("destroy", form).await?;
        match destroyed.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                warn!(public_id = id.public_id, "Image was not on the host");
                Ok(())
            }
            other => Err(ImageError::Host(other.to_string())),
        }
    }

    fn url(&self, id: &str) -> String {
        format!("{DELIVERY_BASE}/{}/image/upload/{id}", self.cloud_name)
    }

    async fn open(&self, _id: &str) -> Result<Option<StoredImage>, ImageError> {
        Ok(None)
    }
}
