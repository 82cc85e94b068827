//! Product images: data URL parsing and the hosts images are stored on.
//!
//! Hosted images are addressed by ids of the form
//! `v<version>/<folder>/<public_id>`. Re-uploading under an existing public id
//! replaces the image and bumps the version, so clients holding the old url
//! see a different id.

pub mod cloudinary;
pub mod local;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub use cloudinary::CloudinaryImageHost;
pub use local::LocalImageHost;

/// Default upper bound for a decoded image, 25 MiB.
pub const DEFAULT_FILE_SIZE_LIMIT: usize = 25 * 1024 * 1024;

static SEGMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("segment regex is valid"));

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Invalid image data: {0}")]
    InvalidDataUrl(String),
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),
    #[error("Image is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("Image storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image host request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Image host rejected the request: {0}")]
    Host(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageType {
    Png,
    Jpeg,
    Gif,
    Webp,
    Avif,
}

impl ImageType {
    pub const ALL: [ImageType; 5] = [
        ImageType::Png,
        ImageType::Jpeg,
        ImageType::Gif,
        ImageType::Webp,
        ImageType::Avif,
    ];

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            "image/avif" => Some(Self::Avif),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }
}

/// A decoded image ready to be handed to an [`ImageHost`].
#[derive(Clone, Debug)]
pub struct ImageData {
    pub kind: ImageType,
    pub bytes: Vec<u8>,
}

impl ImageData {
    /// Parses `data:<mime>;base64,<payload>`.
    pub fn from_data_url(input: &str, limit: usize) -> Result<Self, ImageError> {
        let rest = input
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ImageError::InvalidDataUrl("expected a data url".into()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| ImageError::InvalidDataUrl("missing payload".into()))?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or_else(|| ImageError::InvalidDataUrl("payload must be base64".into()))?;
        let kind =
            ImageType::from_mime(mime).ok_or_else(|| ImageError::UnsupportedType(mime.into()))?;

        // Reject before decoding anything that cannot fit.
        let estimated = payload.len() / 4 * 3;
        if estimated > limit + 3 {
            return Err(ImageError::TooLarge {
                size: estimated,
                limit,
            });
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|err| ImageError::InvalidDataUrl(err.to_string()))?;
        if bytes.is_empty() {
            return Err(ImageError::InvalidDataUrl("image is empty".into()));
        }
        if bytes.len() > limit {
            return Err(ImageError::TooLarge {
                size: bytes.len(),
                limit,
            });
        }

        Ok(Self { kind, bytes })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.kind.mime(), STANDARD.encode(&self.bytes))
    }
}

/// The parts of a hosted image id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageId<'a> {
    pub version: &'a str,
    pub folder: &'a str,
    pub public_id: &'a str,
}

impl<'a> ImageId<'a> {
    pub fn parse(id: &'a str) -> Option<Self> {
        let mut parts = id.split('/');
        let version = parts.next()?;
        let folder = parts.next()?;
        let public_id = parts.next()?;
        if parts.next().is_some()
            || !version.starts_with('v')
            || !SEGMENT_REGEX.is_match(folder)
            || !SEGMENT_REGEX.is_match(public_id)
        {
            return None;
        }
        Some(Self {
            version,
            folder,
            public_id,
        })
    }
}

pub fn format_image_id(version: i64, folder: &str, public_id: &str) -> String {
    format!("v{version}/{folder}/{public_id}")
}

/// The public id segment of a hosted image id.
pub fn public_id_of(id: &str) -> Option<&str> {
    ImageId::parse(id).map(|parsed| parsed.public_id)
}

pub fn is_valid_segment(segment: &str) -> bool {
    SEGMENT_REGEX.is_match(segment)
}

/// An image read back from a host that serves files itself.
pub struct StoredImage {
    pub content_type: String,
    pub file: tokio::fs::File,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Stores `image` and returns its id. With `public_id` set the existing
    /// image under that public id is replaced.
    async fn upload(&self, image: &ImageData, public_id: Option<&str>)
        -> Result<String, ImageError>;

    async fn delete(&self, id: &str) -> Result<(), ImageError>;

    /// Where clients fetch the image from.
    fn url(&self, id: &str) -> String;

    /// Opens a locally served image. Hosts with their own delivery return
    /// `None`.
    async fn open(&self, id: &str) -> Result<Option<StoredImage>, ImageError>;
}
