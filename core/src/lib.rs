//! Blocking client for the Shrinkix image optimization API.
//!
//! # Overview
//! [`Client`] exposes the API's operations (`optimize`, `usage_stats`,
//! `limits`, `validate`) on top of a [`Transport`] that owns all HTTP
//! mechanics: header injection, multipart uploads, rate-limit extraction and
//! error classification.
//!
//! ```no_run
//! use shrinkix_core::{Client, ClientConfig, OptimizeParams};
//!
//! # fn main() -> shrinkix_core::Result<()> {
//! let client = Client::new(ClientConfig::new("sk_live_xxx"))?;
//! let result = client.optimize(
//!     OptimizeParams::from_path("photo.jpg")
//!         .with_format("webp")
//!         .with_quality(80),
//! )?;
//! std::fs::write("photo.webp", &result.data).ok();
//! println!("{} requests left", result.rate_limit.remaining);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - Every call returns either its result or one of four errors: local
//!   `Config`/`Validation` failures, a server `ApiError`, or a
//!   `NetworkError`. Every server answer carries a [`RateLimitInfo`].
//! - Nothing is retried unless the caller opts in with
//!   [`Client::with_retry`].
//! - The client is immutable after construction and can be shared across
//!   threads.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod multipart;
pub mod rate_limit;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::{ApiError, Error, NetworkError, NetworkStage, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use multipart::MultipartForm;
pub use rate_limit::RateLimitInfo;
pub use retry::{RetryPolicy, Retrying};
pub use transport::{Payload, Requester, Response, Transport};
pub use types::{
    AddonPurchase, Addons, BillingCycle, CropSpec, ImageSource, OptimizeParams, OptimizeResult,
    OptimizeStats, PlanInfo, PlanLimits, ResizeSpec, UsageCounters, UsageStats,
    ValidateRequest, ValidationLimits, ValidationResult, ValidationWarning,
};
