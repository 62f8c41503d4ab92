//! Request classification
//!
//! Pure predicates over request metadata; no I/O happens here.

use super::{InterceptedRequest, RequestDestination};
use crate::partition::PartitionKind;
use std::collections::BTreeSet;

const IMAGE_EXTENSIONS: [&str; 9] = [
    "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "bmp", "ico",
];

/// Where a request is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Static partition, cache-first with background store on miss
    Static,
    /// Image partition, cache-first, stored when the fetch is ok
    Image,
    /// Audio partition, cache-first with range serving
    Audio,
    /// Network only, never cached
    Passthrough,
}

impl Route {
    pub fn partition(&self) -> Option<PartitionKind> {
        match self {
            Route::Static => Some(PartitionKind::Static),
            Route::Image => Some(PartitionKind::Image),
            Route::Audio => Some(PartitionKind::Audio),
            Route::Passthrough => None,
        }
    }
}

/// Paths of the application shell stored at install time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticManifest {
    paths: BTreeSet<String>,
}

impl StaticManifest {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn has_image_extension(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    path.rsplit_once('.')
        .filter(|(_, ext)| !ext.contains('/'))
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext))
}

fn is_http(request: &InterceptedRequest) -> bool {
    matches!(request.url.scheme(), "http" | "https")
}

/// Classify a request, first match wins:
///
/// 1. manifest path, or a `style` / `script` / `document` destination
/// 2. `image` destination, image file extension, or `Accept: image/*` (http(s) only)
/// 3. `audio` destination
/// 4. everything else
///
/// Only `GET` requests are ever routed to a partition.
pub fn classify(request: &InterceptedRequest, manifest: &StaticManifest) -> Route {
    if !request.method.is_cacheable() {
        return Route::Passthrough;
    }

    if manifest.contains(request.url.path())
        || matches!(
            request.destination,
            RequestDestination::Style | RequestDestination::Script | RequestDestination::Document
        )
    {
        return Route::Static;
    }

    let looks_like_image = request.destination == RequestDestination::Image
        || has_image_extension(request.url.path())
        || request
            .header("accept")
            .is_some_and(|accept| accept.contains("image/"));
    if looks_like_image {
        return if is_http(request) {
            Route::Image
        } else {
            Route::Passthrough
        };
    }

    if request.destination == RequestDestination::Audio {
        return Route::Audio;
    }

    Route::Passthrough
}
