//! Host-side lifecycle of one preview instance.
//!
//! The controller owns exactly one sandbox surface and at most one live
//! sandbox document. Every render bumps a generation counter; messages tagged
//! with any other generation are discarded.

use crate::capture::{CaptureGate, CapturePermit, CapturePipeline, HttpImageFetcher, ImageFetcher};
use crate::compile::{compile, Bindings};
use crate::document::SandboxDocument;
use crate::protocol::{height_px, Envelope, SandboxMessage};
use crate::resource::{ResourceHandle, ResourceStore};
use crate::surface::SandboxSurface;
use crate::{Error, PreviewConfig, Result, Theme, ViewportMode};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const SETTLE_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewState {
    /// Nothing rendered yet
    Idle,
    /// First document attached, waiting for a report
    Generating,
    /// Rendered and reporting a height
    Loaded,
    /// A newer document replaced a rendered one, waiting for a report
    Updating,
    /// A render error is showing
    Error,
    Disposed,
}

/// What [`PreviewController::handle_message`] did with a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Applied,
    /// Posted by a superseded document
    Stale,
    /// Not an rfpreview message
    Ignored,
}

/// Serializable view of a controller, published by the async facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewSnapshot {
    pub state: PreviewState,
    pub generation: u64,
    pub theme: Theme,
    pub component: Option<String>,
    /// Last reported content height; kept across errors
    pub height: Option<u32>,
    /// Error banner text
    pub error: Option<String>,
    pub viewport: ViewportMode,
    pub container_width: Option<u32>,
}

impl Default for PreviewSnapshot {
    fn default() -> Self {
        Self {
            state: PreviewState::Idle,
            generation: 0,
            theme: Theme::default(),
            component: None,
            height: None,
            error: None,
            viewport: ViewportMode::default(),
            container_width: None,
        }
    }
}

/// Drives one sandbox surface through render, report, capture and dispose.
pub struct PreviewController<S: SandboxSurface, F: ImageFetcher = HttpImageFetcher> {
    surface: S,
    config: PreviewConfig,
    bindings: Bindings,
    pipeline: CapturePipeline<F>,
    gate: CaptureGate,
    store: ResourceStore,
    live: Option<ResourceHandle>,
    generation: u64,
    state: PreviewState,
    source: Option<String>,
    theme: Theme,
    component: Option<String>,
    height: Option<u32>,
    error: Option<String>,
    viewport: ViewportMode,
}

impl<S: SandboxSurface> PreviewController<S, HttpImageFetcher> {
    /// Controller whose captures fetch images over HTTP.
    pub fn new(surface: S, config: PreviewConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = CapturePipeline::http(config.capture.clone())?;
        Ok(Self::build(surface, config, pipeline))
    }
}

impl<S: SandboxSurface, F: ImageFetcher> PreviewController<S, F> {
    pub fn with_fetcher(surface: S, config: PreviewConfig, fetcher: F) -> Result<Self> {
        config.validate()?;
        let pipeline = CapturePipeline::new(fetcher, config.capture.clone());
        Ok(Self::build(surface, config, pipeline))
    }

    fn build(surface: S, config: PreviewConfig, pipeline: CapturePipeline<F>) -> Self {
        Self {
            surface,
            bindings: Bindings::from_config(&config),
            config,
            pipeline,
            gate: CaptureGate::new(),
            store: ResourceStore::new(),
            live: None,
            generation: 0,
            state: PreviewState::Idle,
            source: None,
            theme: Theme::default(),
            component: None,
            height: None,
            error: None,
            viewport: ViewportMode::default(),
        }
    }

    /// Render `source` under `theme`, replacing the current document.
    ///
    /// A source that fails to compile still produces a document (showing the
    /// error inline) and leaves the controller in [`PreviewState::Error`];
    /// only surface failures are returned as `Err`.
    pub fn render_preview(&mut self, source: &str, theme: Theme) -> Result<()> {
        self.ensure_active()?;
        self.source = Some(source.to_string());
        self.theme = theme;
        self.regenerate()
    }

    /// Regenerate the current source and theme under a new generation.
    pub fn refresh(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.source.is_none() {
            debug!("refresh requested before any render");
            return Ok(());
        }
        self.regenerate()
    }

    fn regenerate(&mut self) -> Result<()> {
        let source = self.source.clone().unwrap_or_default();
        self.generation += 1;
        let generation = self.generation;
        let runtime = &self.config.runtime;

        let (doc, failed) = match compile(&source, &self.bindings) {
            Ok(factory) => {
                self.component = Some(factory.component.clone());
                self.error = None;
                (SandboxDocument::render(&factory, self.theme, generation, runtime), false)
            }
            Err(e) => {
                let message = e.to_string();
                debug!("generation {} failed to compile: {}", generation, message);
                self.component = None;
                self.error = Some(message.clone());
                (SandboxDocument::failure(&message, self.theme, generation, runtime), true)
            }
        };

        let handle = self.store.publish(&doc);
        if let Err(e) = self.surface.attach(&handle) {
            self.store.revoke(handle);
            self.error = Some(e.to_string());
            self.state = PreviewState::Error;
            return Err(e);
        }
        if let Some(previous) = self.live.replace(handle) {
            self.store.revoke(previous);
        }

        self.state = if failed {
            PreviewState::Error
        } else if generation == 1 || self.height.is_none() {
            PreviewState::Generating
        } else {
            PreviewState::Updating
        };
        debug!(
            "generation {} attached ({:?}, {} live handle(s))",
            generation,
            self.state,
            self.store.outstanding()
        );
        Ok(())
    }

    /// Apply one raw payload posted by the sandbox.
    pub fn handle_message(&mut self, raw: &str) -> MessageOutcome {
        if self.state == PreviewState::Disposed {
            return MessageOutcome::Ignored;
        }
        let envelope = match Envelope::parse(raw) {
            Some(env) => env,
            None => return MessageOutcome::Ignored,
        };
        if envelope.generation != self.generation {
            debug!(
                "discarding message from generation {} (current {})",
                envelope.generation, self.generation
            );
            return MessageOutcome::Stale;
        }
        match envelope.message {
            SandboxMessage::Resized { height } => {
                self.height = Some(height_px(height));
                if self.error.is_none() {
                    self.state = PreviewState::Loaded;
                }
            }
            SandboxMessage::RenderFailed { error } => {
                debug!("generation {} reported render error: {}", self.generation, error);
                self.error = Some(error);
                self.state = PreviewState::Error;
            }
        }
        MessageOutcome::Applied
    }

    /// Drain the surface and apply everything it posted. Returns the number
    /// of messages applied.
    pub fn pump(&mut self) -> Result<usize> {
        self.ensure_active()?;
        let mut applied = 0;
        for raw in self.surface.drain_messages()? {
            if self.handle_message(&raw) == MessageOutcome::Applied {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Pump until the live document reports a height or an error.
    pub fn settle(&mut self, timeout: Duration) -> Result<PreviewState> {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump()?;
            if self.live.is_none() || matches!(self.state, PreviewState::Loaded | PreviewState::Error) {
                return Ok(self.state);
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(timeout.as_millis() as u64));
            }
            std::thread::sleep(SETTLE_POLL);
        }
    }

    /// Clear the error banner.
    pub fn dismiss_error(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.error = None;
        self.state = if self.live.is_some() {
            PreviewState::Loaded
        } else {
            PreviewState::Idle
        };
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: ViewportMode) -> Result<()> {
        self.ensure_active()?;
        self.viewport = viewport;
        Ok(())
    }

    /// Width applied to the container wrapping the sandbox.
    pub fn container_width(&self) -> Option<u32> {
        self.viewport.container_width()
    }

    /// Capture a thumbnail of the live document; `Ok(None)` when nothing is rendered.
    pub async fn capture(&mut self) -> Result<Option<String>> {
        let permit = self.gate.try_acquire()?;
        self.capture_with(&permit).await
    }

    /// Capture under a permit already taken from [`capture_gate`](Self::capture_gate).
    pub async fn capture_with(&mut self, permit: &CapturePermit) -> Result<Option<String>> {
        self.ensure_active()?;
        if !permit.is_from(&self.gate) {
            return Err(Error::Capture("capture permit belongs to another preview".into()));
        }
        if self.live.is_none() {
            return Ok(None);
        }
        let uri = self.pipeline.capture(&mut self.surface, self.theme, permit).await?;
        Ok(Some(uri))
    }

    pub fn capture_gate(&self) -> &CaptureGate {
        &self.gate
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        PreviewSnapshot {
            state: self.state,
            generation: self.generation,
            theme: self.theme,
            component: self.component.clone(),
            height: self.height,
            error: self.error.clone(),
            viewport: self.viewport,
            container_width: self.container_width(),
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Locator of the live document
    pub fn live_url(&self) -> Option<&str> {
        self.live.as_ref().map(|h| h.url())
    }

    /// Handles issued and not yet revoked; 0 or 1 while active
    pub fn outstanding_handles(&self) -> usize {
        self.store.outstanding()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Revoke the live document and detach the surface.
    pub fn dispose(&mut self) -> Result<()> {
        if self.state == PreviewState::Disposed {
            return Ok(());
        }
        if let Some(handle) = self.live.take() {
            self.store.revoke(handle);
        }
        self.state = PreviewState::Disposed;
        debug!("preview disposed after {} generation(s)", self.generation);
        self.surface.detach()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state == PreviewState::Disposed {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }
}

impl<S: SandboxSurface, F: ImageFetcher> Drop for PreviewController<S, F> {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!("Failed to detach sandbox surface: {}", e);
        }
    }
}
