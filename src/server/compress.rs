//! Gzip response compression negotiated through `Accept-Encoding`.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use http::header::{HeaderValue, CONTENT_ENCODING, VARY};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::response::{set_content_length, Body, Response};

const GZIP: &str = "gzip";

/// Response compression settings. Off unless enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    /// Gzip level, 0 (store) to 9 (best)
    pub level: u32,
    /// Bodies shorter than this are sent as-is
    pub min_length: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: 6,
            min_length: 500,
        }
    }
}

/// Whether an `Accept-Encoding` value admits gzip with a non-zero quality.
#[must_use]
pub fn accepts_gzip(accept_encoding: &str) -> bool {
    let mut gzip = None;
    let mut wildcard = None;
    for part in accept_encoding.split(',') {
        let mut params = part.split(';');
        let coding = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        let quality = params
            .filter_map(|param| param.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        match coding.as_str() {
            GZIP | "x-gzip" => gzip = Some(quality),
            "*" => wildcard = Some(quality),
            _ => {}
        }
    }
    gzip.or(wildcard).is_some_and(|q| q > 0.0)
}

/// Gzip a buffered response body in place when the client accepts it.
pub fn compress_response(
    config: &CompressionConfig,
    accept_encoding: Option<&str>,
    response: &mut Response,
) {
    if !config.enabled || response.headers.contains_key(CONTENT_ENCODING) {
        return;
    }
    if !accept_encoding.is_some_and(accepts_gzip) {
        return;
    }
    let Some(data) = response.body.as_bytes() else {
        return;
    };
    if data.len() < config.min_length.max(1) {
        return;
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(config.level.min(9)));
    let compressed = match encoder.write_all(data).and_then(|()| encoder.finish()) {
        Ok(compressed) => compressed,
        Err(err) => {
            warn!(error = %err, "Response compression failed, sending identity body");
            return;
        }
    };
    debug!(
        original = data.len(),
        compressed = compressed.len(),
        "Response compressed"
    );

    set_content_length(&mut response.headers, compressed.len());
    response
        .headers
        .insert(CONTENT_ENCODING, HeaderValue::from_static(GZIP));
    response
        .headers
        .append(VARY, HeaderValue::from_static("Accept-Encoding"));
    response.body = Body::Full(compressed);
}
