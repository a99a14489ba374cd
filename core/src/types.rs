//! Request and result shapes for the Shrinkix endpoints.
//!
//! Result types are bound from JSON with serde. Their `rate_limit` field is
//! not on the wire; the client fills it in from the response headers.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitInfo;

// ---------------------------------------------------------------------------
// Optimize
// ---------------------------------------------------------------------------

/// Where the image to optimize comes from.
pub enum ImageSource {
    /// A file on disk, opened for the duration of the call.
    Path(PathBuf),
    /// An open byte stream.
    Reader {
        reader: Box<dyn Read + Send>,
        file_name: Option<String>,
    },
    /// Bytes already in memory.
    Bytes {
        data: Vec<u8>,
        file_name: Option<String>,
    },
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ImageSource::Reader { file_name, .. } => f
                .debug_struct("Reader")
                .field("file_name", file_name)
                .finish_non_exhaustive(),
            ImageSource::Bytes { data, file_name } => f
                .debug_struct("Bytes")
                .field("len", &data.len())
                .field("file_name", file_name)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// e.g. `cover`, `contain`, `inside`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropSpec {
    /// e.g. `center`, `smart`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Aspect ratio such as `16:9`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<String>,
}

/// Parameters for `Client::optimize`.
///
/// `source` is required; a call without it fails before any request is
/// made. The remaining fields are sent only when set.
#[derive(Debug, Default)]
pub struct OptimizeParams {
    pub source: Option<ImageSource>,
    pub resize: Option<ResizeSpec>,
    pub crop: Option<CropSpec>,
    /// Output format: `jpg`, `png`, `webp` or `avif`.
    pub format: Option<String>,
    /// 1-100. Zero means "server default" and is not sent.
    pub quality: u32,
    /// `strip` or `keep`.
    pub metadata: Option<String>,
}

impl OptimizeParams {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(ImageSource::Path(path.into())),
            ..Self::default()
        }
    }

    pub fn from_reader(reader: impl Read + Send + 'static, file_name: Option<String>) -> Self {
        Self {
            source: Some(ImageSource::Reader {
                reader: Box::new(reader),
                file_name,
            }),
            ..Self::default()
        }
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>, file_name: Option<String>) -> Self {
        Self {
            source: Some(ImageSource::Bytes {
                data: data.into(),
                file_name,
            }),
            ..Self::default()
        }
    }

    pub fn with_resize(mut self, resize: ResizeSpec) -> Self {
        self.resize = Some(resize);
        self
    }

    pub fn with_crop(mut self, crop: CropSpec) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

/// Size and operation summary the server reports in response headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizeStats {
    pub original_size: u64,
    pub optimized_size: u64,
    pub savings_percent: f64,
    pub operations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OptimizeResult {
    /// The optimized image.
    pub data: Vec<u8>,
    pub rate_limit: RateLimitInfo,
    pub request_id: String,
    pub stats: OptimizeStats,
}

// ---------------------------------------------------------------------------
// Usage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub usage: UsageCounters,
    #[serde(default)]
    pub plan: PlanInfo,
    #[serde(default)]
    pub addons: Addons,
    #[serde(default)]
    pub cycle: BillingCycle,
    #[serde(skip)]
    pub rate_limit: RateLimitInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UsageCounters {
    pub used: u64,
    pub remaining: u64,
    pub total: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlanInfo {
    pub id: String,
    pub name: String,
    pub base_limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Addons {
    pub current_credits: u64,
    pub purchase_history: Vec<AddonPurchase>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddonPurchase {
    #[serde(rename = "type")]
    pub kind: String,
    pub credits: u64,
    /// Price in the smallest currency unit.
    pub price: u64,
    pub purchased_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BillingCycle {
    pub reset_at: String,
    pub days_until_reset: i64,
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlanLimits {
    pub plan: String,
    /// Sent by the server as a decimal string, e.g. `"10"`.
    pub max_file_size_mb: String,
    pub max_pixels: u64,
    pub max_operations: u64,
    pub formats: Vec<String>,
    pub features: Vec<String>,
    /// Requests allowed per rate-limit window.
    #[serde(rename = "rate_limit")]
    pub rate_limit_value: u64,
    #[serde(skip)]
    pub rate_limit: RateLimitInfo,
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

/// Body of `POST /validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateRequest<'a> {
    #[serde(rename = "fileSize")]
    pub file_size: u64,
    pub format: &'a str,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationResult {
    pub valid: bool,
    pub warnings: Vec<ValidationWarning>,
    pub plan: String,
    pub limits: ValidationLimits,
    #[serde(skip)]
    pub rate_limit: RateLimitInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationWarning {
    /// e.g. `FILE_SIZE_EXCEEDED`, `UNSUPPORTED_FORMAT`.
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    pub max_file_size_mb: String,
    pub max_pixels: u64,
    pub allowed_formats: Vec<String>,
}
