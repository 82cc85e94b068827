//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - sea-orm connection string, e.g. `sqlite://market.db?mode=rwc`
//! - `SECRET` - HMAC secret for access tokens
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 3000)
//! - `FILE_SIZE_LIMIT` - Largest accepted image in bytes (default: 25 MiB)
//! - `IMAGE_HOST` - `local` or `cloudinary` (default: local)
//! - `UPLOAD_DIR` - Root directory of the local image host (default: ./uploads)
//! - `IMAGE_FOLDER` - Folder segment of image ids (default: products)
//! - `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET` -
//!   required when `IMAGE_HOST=cloudinary`
//! - `SEED_DEMO_ACCOUNTS` - Create a demo buyer and seller (default: false)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::images::{CloudinaryImageHost, ImageHost, LocalImageHost, DEFAULT_FILE_SIZE_LIMIT};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageHostConfig {
    Local {
        dir: PathBuf,
    },
    Cloudinary {
        cloud_name: String,
        api_key: String,
        api_secret: String,
    },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: String,
    pub file_size_limit: usize,
    pub image_host: ImageHostConfig,
    pub image_folder: String,
    pub seed_demo_accounts: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("SECRET")?;

        let host = parse_or("HOST", &lookup, IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_or("PORT", &lookup, 3000u16)?;
        let file_size_limit = parse_or("FILE_SIZE_LIMIT", &lookup, DEFAULT_FILE_SIZE_LIMIT)?;
        let seed_demo_accounts = parse_or("SEED_DEMO_ACCOUNTS", &lookup, false)?;
        let image_folder = lookup("IMAGE_FOLDER").unwrap_or_else(|| "products".to_string());
        if !crate::images::is_valid_segment(&image_folder) {
            return Err(ConfigError::InvalidEnvVar(
                "IMAGE_FOLDER".to_string(),
                "use letters, digits, '-' or '_'".to_string(),
            ));
        }

        let image_host = match lookup("IMAGE_HOST").as_deref().unwrap_or("local") {
            "local" => ImageHostConfig::Local {
                dir: lookup("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./uploads")),
            },
            "cloudinary" => ImageHostConfig::Cloudinary {
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
            },
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "IMAGE_HOST".to_string(),
                    format!("expected `local` or `cloudinary`, got `{other}`"),
                ))
            }
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            file_size_limit,
            image_host,
            image_folder,
            seed_demo_accounts,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn build_image_host(&self) -> Arc<dyn ImageHost> {
        match &self.image_host {
            ImageHostConfig::Local { dir } => {
                Arc::new(LocalImageHost::new(dir.clone(), self.image_folder.clone()))
            }
            ImageHostConfig::Cloudinary {
                cloud_name,
                api_key,
                api_secret,
            } => Arc::new(CloudinaryImageHost::new(
                cloud_name.clone(),
                api_key.clone(),
                api_secret.clone(),
                self.image_folder.clone(),
            )),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|err: T::Err| ConfigError::InvalidEnvVar(key.to_string(), err.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(&[("DATABASE_URL", "sqlite::memory:"), ("SECRET", "s3cr3t")])
            .expect("minimal config loads");

        assert_eq!(config.port, 3000);
        assert_eq!(config.file_size_limit, DEFAULT_FILE_SIZE_LIMIT);
        assert_eq!(config.image_folder, "products");
        assert!(!config.seed_demo_accounts);
        assert_eq!(
            config.image_host,
            ImageHostConfig::Local {
                dir: PathBuf::from("./uploads")
            }
        );
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = config_from(&[("DATABASE_URL", "sqlite::memory:")]).expect_err("no secret");
        assert_eq!(err, ConfigError::MissingEnvVar("SECRET".into()));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SECRET", "x"),
            ("PORT", "eighty"),
        ])
        .expect_err("port is not a number");
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "PORT"));
    }

    #[test]
    fn cloudinary_needs_credentials() {
        let err = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SECRET", "x"),
            ("IMAGE_HOST", "cloudinary"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
        ])
        .expect_err("key and secret missing");
        assert_eq!(err, ConfigError::MissingEnvVar("CLOUDINARY_API_KEY".into()));

        let config = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SECRET", "x"),
            ("IMAGE_HOST", "cloudinary"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "secret"),
        ])
        .expect("complete cloudinary config");
        assert!(matches!(config.image_host, ImageHostConfig::Cloudinary { .. }));
    }

    #[test]
    fn unknown_image_host_is_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SECRET", "x"),
            ("IMAGE_HOST", "s3"),
        ])
        .expect_err("s3 is not supported");
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "IMAGE_HOST"));
    }
}
