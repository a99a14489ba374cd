//! Domain operations of the Shrinkix API.
//!
//! # Design
//! `Client` owns an immutable [`Requester`] and builds one request per call:
//! a multipart form for `optimize`, JSON or nothing for the rest. Failures
//! from the requester are returned unchanged; the only errors raised here
//! are local validation failures (before any I/O) and decode failures of a
//! successful payload, reported as `NetworkError`.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, NetworkError, NetworkStage, Result};
use crate::multipart::{mime_for, MultipartForm};
use crate::retry::{RetryPolicy, Retrying};
use crate::transport::{Requester, Response, Transport};
use crate::types::{
    ImageSource, OptimizeParams, OptimizeResult, OptimizeStats, PlanLimits, UsageStats,
    ValidateRequest, ValidationResult,
};

pub const ENDPOINT_OPTIMIZE: &str = "/optimize";
pub const ENDPOINT_USAGE_STATS: &str = "/usage/stats";
pub const ENDPOINT_LIMITS: &str = "/limits";
pub const ENDPOINT_VALIDATE: &str = "/validate";

const DEFAULT_FILE_NAME: &str = "image";

/// Client for the Shrinkix API.
///
/// Safe to share between threads; calls carry no state between them.
#[derive(Debug, Clone)]
pub struct Client<R = Transport> {
    requester: R,
}

impl Client<Transport> {
    /// Validate `config` and build a client. Performs no network I/O.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            requester: Transport::new(&config)?,
        })
    }

    /// Build a client from `SHRINKIX_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Wrap the transport in a retry decorator.
    pub fn with_retry(self, policy: RetryPolicy) -> Client<Retrying<Transport>> {
        Client {
            requester: Retrying::new(self.requester, policy),
        }
    }
}

impl<R: Requester> Client<R> {
    /// Use a custom requester, e.g. a decorated transport.
    pub fn with_requester(requester: R) -> Self {
        Self { requester }
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    /// Upload an image and return the optimized bytes.
    pub fn optimize(&self, params: OptimizeParams) -> Result<OptimizeResult> {
        let OptimizeParams {
            source,
            resize,
            crop,
            format,
            quality,
            metadata,
        } = params;
        let source =
            source.ok_or_else(|| Error::Validation("no image input provided".to_string()))?;

        // Options go before the file so stream-parsing servers see them first.
        let mut form = MultipartForm::new();
        if let Some(resize) = &resize {
            form.text("resize", &encode_field("resize", resize)?);
        }
        if let Some(crop) = &crop {
            form.text("crop", &encode_field("crop", crop)?);
        }
        if let Some(format) = format.as_deref().filter(|f| !f.is_empty()) {
            form.text("format", format);
        }
        if quality > 0 {
            form.text("quality", &quality.to_string());
        }
        if let Some(metadata) = metadata.as_deref().filter(|m| !m.is_empty()) {
            form.text("metadata", metadata);
        }
        append_image(&mut form, source)?;
        let (body, content_type) = form.finish();

        debug!(bytes = body.len(), "uploading image");
        let response = self
            .requester
            .post_multipart(ENDPOINT_OPTIMIZE, body, &content_type)?;

        let stats = optimize_stats(&response);
        let request_id = response.rate_limit.request_id.clone();
        Ok(OptimizeResult {
            data: response.payload.into_bytes(),
            rate_limit: response.rate_limit,
            request_id,
            stats,
        })
    }

    /// Usage counters, plan, add-on credits and billing cycle.
    pub fn usage_stats(&self) -> Result<UsageStats> {
        let response = self.requester.get(ENDPOINT_USAGE_STATS)?;
        let mut stats: UsageStats = decode(&response, "usage stats")?;
        stats.rate_limit = response.rate_limit;
        Ok(stats)
    }

    /// Limits of the caller's plan.
    pub fn limits(&self) -> Result<PlanLimits> {
        let response = self.requester.get(ENDPOINT_LIMITS)?;
        let mut limits: PlanLimits = decode(&response, "plan limits")?;
        limits.rate_limit = response.rate_limit;
        Ok(limits)
    }

    /// Ask the server whether an image with these properties would be
    /// accepted, without uploading it.
    pub fn validate(
        &self,
        file_size: u64,
        format: &str,
        width: u32,
        height: u32,
    ) -> Result<ValidationResult> {
        let body = ValidateRequest {
            file_size,
            format,
            width,
            height,
        };
        let response = self.requester.post(ENDPOINT_VALIDATE, &body)?;
        let mut result: ValidationResult = decode(&response, "validation result")?;
        result.rate_limit = response.rate_limit;
        Ok(result)
    }
}

fn encode_field<T: serde::Serialize>(name: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        NetworkError::new(NetworkStage::Build, format!("failed to encode {name}"), e).into()
    })
}

/// Write the `image` part. A path source is opened here and closed when
/// this returns.
fn append_image(form: &mut MultipartForm, source: ImageSource) -> Result<()> {
    let read_err = |e: io::Error| Error::Validation(format!("failed to read image: {e}"));
    match source {
        ImageSource::Path(path) => {
            let mut file = File::open(&path).map_err(|e| {
                Error::Validation(format!("cannot open {}: {e}", path.display()))
            })?;
            let file_name = file_name_of(&path);
            form.file("image", &file_name, mime_for(&file_name), &mut file)
                .map_err(read_err)?;
        }
        ImageSource::Reader {
            mut reader,
            file_name,
        } => {
            let file_name = file_name.unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
            form.file("image", &file_name, mime_for(&file_name), &mut reader)
                .map_err(read_err)?;
        }
        ImageSource::Bytes { data, file_name } => {
            let file_name = file_name.unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
            let mut data: &[u8] = &data;
            form.file("image", &file_name, mime_for(&file_name), &mut data as &mut dyn Read)
                .map_err(read_err)?;
        }
    }
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

fn optimize_stats(response: &Response) -> OptimizeStats {
    let number = |name: &str| response.header(name).and_then(|v| v.trim().parse().ok());
    OptimizeStats {
        original_size: number("X-Original-Size").unwrap_or_default(),
        optimized_size: number("X-Optimized-Size").unwrap_or_default(),
        savings_percent: response
            .header("X-Savings-Percent")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default(),
        operations: response
            .header("X-Operations")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|op| !op.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn decode<T: DeserializeOwned>(response: &Response, what: &str) -> Result<T> {
    response.payload.decode().map_err(|e| {
        NetworkError::new(NetworkStage::Decode, format!("failed to decode {what}"), e).into()
    })
}
