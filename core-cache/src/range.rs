//! # Range-Serving Responder
//!
//! Serves byte ranges out of fully cached audio bodies so players can seek
//! offline.
//!
//! Anything that is not a single `bytes=<start>-<end?>` range inside the body
//! falls back to the full stored response instead of failing the request.

use crate::stored::StoredResponse;
use bridge_traits::http::HttpResponse;
use tracing::debug;

/// Content type used for partial responses when the entry has none.
pub const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Inclusive byte range within a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse a `Range` header against a body of `len` bytes.
///
/// Returns `None` for anything that cannot be served as a single slice:
/// other units, multiple ranges, suffix ranges, non-numeric bounds,
/// `start > end` and `start >= len`. An `end` past the body is clamped.
pub fn parse_range(header: &str, len: u64) -> Option<ByteRange> {
    if len == 0 {
        return None;
    }

    let header = header.trim();
    let spec = header
        .get(..6)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes="))
        .map(|_| &header[6..])?;

    if spec.contains(',') {
        return None;
    }

    let (start, end) = spec.split_once('-')?;
    let start = start.trim();
    let end = end.trim();

    if start.is_empty() || !start.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let start: u64 = start.parse().ok()?;

    let last = len - 1;
    let end = if end.is_empty() {
        last
    } else {
        if !end.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        end.parse::<u64>().ok()?.min(last)
    };

    if start > end || start >= len {
        return None;
    }

    Some(ByteRange { start, end })
}

/// Build the response for a cached entry and an optional `Range` header.
pub fn serve(stored: &StoredResponse, range_header: Option<&str>) -> HttpResponse {
    let Some(header) = range_header else {
        return stored.to_response();
    };

    if stored.is_empty() {
        return stored.to_response();
    }

    let total = stored.len() as u64;
    let Some(range) = parse_range(header, total) else {
        debug!(range = header, total, "Unsatisfiable range, serving full body");
        return stored.to_response();
    };

    let body = stored
        .body
        .slice(range.start as usize..=range.end as usize);

    HttpResponse::new(206, body)
        .with_header(
            "Content-Range",
            format!("bytes {}-{}/{}", range.start, range.end, total),
        )
        .with_header("Accept-Ranges", "bytes")
        .with_header("Content-Length", range.len().to_string())
        .with_header(
            "Content-Type",
            stored.content_type().unwrap_or(DEFAULT_AUDIO_CONTENT_TYPE),
        )
}
