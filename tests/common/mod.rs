//! Scriptable in-memory surface and fetcher shared by the integration tests

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use rfpreview::surface::{CaptureTarget, ImageSlot, RasterRequest, SandboxSurface, TargetImages};
use rfpreview::{Envelope, Error, ImageFetcher, ResourceHandle, Result, SandboxMessage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct MockImage {
    pub src: String,
    pub url: String,
    pub current: String,
}

pub struct MockState {
    pub attached: Vec<(u64, String)>,
    pub inbox: Vec<String>,
    pub images: Vec<MockImage>,
    pub target: CaptureTarget,
    /// Posted as a resize for every attached document
    pub auto_height: Option<f64>,
    pub fail_raster: bool,
    pub raster_size: (u32, u32),
    /// Image sources as they were when `rasterize` ran
    pub sources_at_raster: Vec<String>,
    pub released: usize,
    pub detached: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            attached: Vec::new(),
            inbox: Vec::new(),
            images: Vec::new(),
            target: CaptureTarget::RenderedChild,
            auto_height: None,
            fail_raster: false,
            raster_size: (2560, 600),
            sources_at_raster: Vec::new(),
            released: 0,
            detached: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockSurface {
    pub state: Arc<Mutex<MockState>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reporting(height: f64) -> Self {
        let surface = Self::default();
        surface.state.lock().unwrap().auto_height = Some(height);
        surface
    }

    pub fn with_images(urls: &[&str]) -> Self {
        let surface = Self::default();
        surface.state.lock().unwrap().images = urls
            .iter()
            .map(|u| MockImage {
                src: u.to_string(),
                url: u.to_string(),
                current: u.to_string(),
            })
            .collect();
        surface
    }

    pub fn post(&self, generation: u64, message: SandboxMessage) {
        self.state
            .lock()
            .unwrap()
            .inbox
            .push(Envelope::new(generation, message).to_json());
    }

    pub fn current_sources(&self) -> Vec<String> {
        self.state.lock().unwrap().images.iter().map(|i| i.current.clone()).collect()
    }
}

impl SandboxSurface for MockSurface {
    fn attach(&mut self, handle: &ResourceHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.attached.push((handle.generation(), handle.url().to_string()));
        if let Some(height) = state.auto_height {
            state
                .inbox
                .push(Envelope::new(handle.generation(), SandboxMessage::Resized { height }).to_json());
        }
        Ok(())
    }

    fn drain_messages(&mut self) -> Result<Vec<String>> {
        Ok(std::mem::take(&mut self.state.lock().unwrap().inbox))
    }

    fn locate_images(&mut self) -> Result<TargetImages> {
        let state = self.state.lock().unwrap();
        Ok(TargetImages {
            target: state.target,
            images: state
                .images
                .iter()
                .enumerate()
                .map(|(index, img)| ImageSlot {
                    index,
                    src: img.src.clone(),
                    url: img.url.clone(),
                })
                .collect(),
        })
    }

    fn set_image_source(&mut self, slot: &ImageSlot, src: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.images.get_mut(slot.index) {
            Some(img) => {
                img.current = src.to_string();
                Ok(())
            }
            None => Err(Error::Surface(format!("no image #{}", slot.index))),
        }
    }

    fn release_images(&mut self) -> Result<()> {
        self.state.lock().unwrap().released += 1;
        Ok(())
    }

    fn rasterize(&mut self, request: &RasterRequest) -> Result<RgbaImage> {
        let mut state = self.state.lock().unwrap();
        state.sources_at_raster = state.images.iter().map(|i| i.current.clone()).collect();
        if state.fail_raster {
            return Err(Error::Capture("rasterizer crashed".into()));
        }
        let (_, height) = state.raster_size;
        Ok(RgbaImage::from_pixel(request.device_width(), height, Rgba([200, 40, 40, 255])))
    }

    fn detach(&mut self) -> Result<()> {
        self.state.lock().unwrap().detached = true;
        Ok(())
    }
}

/// Fetcher answering from a fixed table; unknown URLs fail.
#[derive(Clone, Default)]
pub struct TableFetcher {
    pub responses: HashMap<String, String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl TableFetcher {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            responses: entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            calls: Arc::default(),
        }
    }
}

impl ImageFetcher for TableFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses.get(url).cloned().ok_or_else(|| Error::ImageFetch {
            url: url.to_string(),
            reason: "HTTP 404".into(),
        })
    }
}
