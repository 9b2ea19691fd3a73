//! Cross-origin image neutralization.
//!
//! Remote images would taint the raster, so before rasterizing each one is
//! fetched host-side and swapped for an equivalent `data:` URI. The swap is
//! undone by [`CaptureScope`] however the capture ends.

use crate::surface::{ImageSlot, SandboxSurface};
use crate::{Error, Result};
use base64::Engine as Base64Engine;
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Fetches an image and returns it as a `data:` URI.
#[allow(async_fn_in_trait)]
pub trait ImageFetcher {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`ImageFetcher`] over HTTP(S) with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let fail = |reason: String| Error::ImageFetch {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {}", status.as_u16())));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let body = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        Ok(data_uri(&content_type, &body))
    }
}

/// `data:<content_type>;base64,<payload>`
pub fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        content_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Whether `url` can be proxied (absolute http or https).
pub fn is_proxyable(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Guard over a surface whose image sources may have been overwritten.
///
/// Dropping the scope restores every replaced `src` to its authored value and
/// clears slot bookkeeping, on success, error, early return or unwind.
pub struct CaptureScope<'a, S: SandboxSurface> {
    surface: &'a mut S,
    replaced: Vec<ImageSlot>,
}

impl<'a, S: SandboxSurface> CaptureScope<'a, S> {
    pub fn new(surface: &'a mut S) -> Self {
        Self {
            surface,
            replaced: Vec::new(),
        }
    }

    /// Point `slot` at `src`, remembering the authored value for restoration.
    pub fn replace(&mut self, slot: &ImageSlot, src: &str) -> Result<()> {
        self.surface.set_image_source(slot, src)?;
        self.replaced.push(slot.clone());
        Ok(())
    }

    pub fn replaced(&self) -> usize {
        self.replaced.len()
    }

    pub fn surface(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: SandboxSurface> Drop for CaptureScope<'_, S> {
    fn drop(&mut self) {
        for slot in self.replaced.drain(..).rev() {
            if let Err(e) = self.surface.set_image_source(&slot, &slot.src) {
                warn!("Failed to restore image #{} to {}: {}", slot.index, slot.src, e);
            }
        }
        if let Err(e) = self.surface.release_images() {
            warn!("Failed to release image slots: {}", e);
        }
        debug!("capture scope closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_urls_are_proxied() {
        assert!(is_proxyable("https://cdn.example.com/a.png"));
        assert!(is_proxyable("http://127.0.0.1:8080/a.png"));
        assert!(!is_proxyable("data:image/png;base64,AA=="));
        assert!(!is_proxyable("blob:https://x/123"));
        assert!(!is_proxyable("/relative.png"));
        assert!(!is_proxyable(""));
    }

    #[test]
    fn data_uri_format() {
        assert_eq!(data_uri("image/png", b"\x89PNG"), "data:image/png;base64,iVBORw==");
    }
}
