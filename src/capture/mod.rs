//! Capture pipeline: image neutralization, rasterization and thumbnail derivation.

pub mod images;
pub mod thumbnail;

pub use images::{data_uri, is_proxyable, CaptureScope, HttpImageFetcher, ImageFetcher};
pub use thumbnail::{derive_thumbnail, encode_jpeg_data_uri, ThumbnailFit};

use crate::surface::{RasterRequest, SandboxSurface};
use crate::{CaptureConfig, Error, Result, Theme};
use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Admits one capture at a time for a sandbox instance.
#[derive(Debug, Clone, Default)]
pub struct CaptureGate {
    busy: Arc<AtomicBool>,
}

impl CaptureGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate, or fail with [`Error::CaptureInProgress`] if held.
    pub fn try_acquire(&self) -> Result<CapturePermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::CaptureInProgress)?;
        Ok(CapturePermit {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one capture; reopens the gate on drop.
#[derive(Debug)]
pub struct CapturePermit {
    busy: Arc<AtomicBool>,
}

impl CapturePermit {
    pub fn is_from(&self, gate: &CaptureGate) -> bool {
        Arc::ptr_eq(&self.busy, &gate.busy)
    }
}

impl Drop for CapturePermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Produces thumbnails from a live sandbox surface.
#[derive(Debug, Clone)]
pub struct CapturePipeline<F: ImageFetcher = HttpImageFetcher> {
    fetcher: F,
    config: CaptureConfig,
}

impl CapturePipeline<HttpImageFetcher> {
    /// Pipeline fetching images over HTTP with the configured timeout
    pub fn http(config: CaptureConfig) -> Result<Self> {
        let fetcher = HttpImageFetcher::new(Duration::from_millis(config.image_timeout_ms))?;
        Ok(Self::new(fetcher, config))
    }
}

impl<F: ImageFetcher> CapturePipeline<F> {
    pub fn new(fetcher: F, config: CaptureConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Capture the surface's current document as a JPEG data URI.
    ///
    /// Image sources overwritten along the way are restored before this
    /// returns, whether or not rasterization succeeded.
    pub async fn capture<S: SandboxSurface>(
        &self,
        surface: &mut S,
        theme: Theme,
        _permit: &CapturePermit,
    ) -> Result<String> {
        let started = Instant::now();
        let background = theme.palette().background_rgb();
        let located = surface.locate_images()?;
        debug!(
            "capture target {:?} with {} image(s)",
            located.target,
            located.images.len()
        );

        let raster = {
            let mut scope = CaptureScope::new(surface);

            let remote: Vec<_> = located
                .images
                .iter()
                .filter(|slot| !slot.is_inline())
                .filter(|slot| {
                    let ok = is_proxyable(&slot.url);
                    if !ok {
                        debug!("skipping image #{} with unsupported url `{}`", slot.index, slot.url);
                    }
                    ok
                })
                .collect();

            let fetched = join_all(remote.iter().map(|slot| self.fetcher.fetch(&slot.url))).await;
            for (slot, result) in remote.iter().zip(fetched) {
                match result {
                    Ok(inline) => {
                        if let Err(e) = scope.replace(slot, &inline) {
                            warn!("Failed to inline image #{}: {}", slot.index, e);
                        }
                    }
                    Err(e) => warn!("Skipping image #{}: {}", slot.index, e),
                }
            }
            debug!("inlined {}/{} remote image(s)", scope.replaced(), remote.len());

            let request = RasterRequest::for_capture(&self.config, background);
            scope.surface().rasterize(&request)?
        };

        let thumb = derive_thumbnail(&raster, &self.config, background)?;
        let uri = encode_jpeg_data_uri(&thumb, self.config.jpeg_quality)?;
        info!(
            "captured {}x{} raster into {}x{} thumbnail in {:?}",
            raster.width(),
            raster.height(),
            thumb.width(),
            thumb.height(),
            started.elapsed()
        );
        Ok(uri)
    }
}
