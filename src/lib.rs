//! RFox Preview Sandbox
//!
//! Live preview and thumbnail capture for untrusted UI-component source text.
//! Admin-supplied component code is normalized, embedded into a standalone
//! sandbox document that loads a pinned UI runtime from a CDN, rendered inside
//! an isolated browsing context, and rasterized on demand into a fixed 640x360
//! JPEG thumbnail.
//!
//! # Layout
//!
//! - [`normalize`]: strips module syntax and finds the component to mount
//! - [`icons`]: built-in icon catalog with a total fallback lookup
//! - [`compile`]: the single seam turning source text into a [`ComponentFactory`]
//! - [`document`]: generates the sandbox host document
//! - [`protocol`]: typed messages posted by the sandbox
//! - [`resource`]: one-shot locators for sandbox documents
//! - [`surface`]: the isolated browsing context a preview renders into
//! - [`controller`]: lifecycle of one preview instance
//! - [`capture`]: image proxying, rasterization and thumbnail derivation
//! - [`async_api`]: worker-backed async facade over a controller
//! - `cdp` (feature `cdp`): headless Chrome surface
//!
//! # Example
//!
//! ```
//! use rfpreview::{compile, Bindings, SandboxDocument, Theme, PreviewConfig};
//!
//! # fn main() -> rfpreview::Result<()> {
//! let config = PreviewConfig::default();
//! let factory = compile("function Badge() { return <span>Hi</span> }", &Bindings::default())?;
//! assert_eq!(factory.component, "Badge");
//!
//! let doc = SandboxDocument::render(&factory, Theme::Dark, 1, &config.runtime);
//! assert!(doc.html().contains("id=\"root\""));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod async_api;
pub mod capture;
pub mod compile;
pub mod controller;
pub mod document;
pub mod icons;
pub mod normalize;
pub mod protocol;
pub mod resource;
pub mod surface;

// CDP surface (headless Chrome), feature-gated
#[cfg(feature = "cdp")]
pub mod cdp;

pub use async_api::Preview;
pub use capture::{CaptureGate, CapturePipeline, HttpImageFetcher, ImageFetcher};
pub use compile::{compile, Bindings, ComponentFactory};
pub use controller::{MessageOutcome, PreviewController, PreviewSnapshot, PreviewState};
pub use document::SandboxDocument;
pub use icons::{Icon, IconCatalog};
pub use normalize::{normalize, IconImport, NormalizedSource};
pub use protocol::{Envelope, SandboxMessage};
pub use resource::{ResourceHandle, ResourceStore};
pub use surface::{CaptureTarget, ImageSlot, RasterRequest, SandboxSurface, TargetImages};

/// Color theme applied to the sandbox document and capture background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Brand palette for this theme
    pub fn palette(&self) -> Palette {
        match self {
            Theme::Light => Palette {
                background: "#ffffff",
                foreground: "#0a0a0a",
                muted: "#f4f4f5",
                muted_foreground: "#71717a",
                border: "#e4e4e7",
                primary: "#7c3aed",
                primary_foreground: "#ffffff",
                destructive: "#dc2626",
            },
            Theme::Dark => Palette {
                background: "#09090b",
                foreground: "#fafafa",
                muted: "#18181b",
                muted_foreground: "#a1a1aa",
                border: "#27272a",
                primary: "#a78bfa",
                primary_foreground: "#09090b",
                destructive: "#f87171",
            },
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(Error::Config(format!("unknown theme `{}`", other))),
        }
    }
}

/// CSS colors (`#rrggbb`) for one theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub background: &'static str,
    pub foreground: &'static str,
    pub muted: &'static str,
    pub muted_foreground: &'static str,
    pub border: &'static str,
    pub primary: &'static str,
    pub primary_foreground: &'static str,
    pub destructive: &'static str,
}

impl Palette {
    /// Background as RGB, used to fill capture canvases
    pub fn background_rgb(&self) -> [u8; 3] {
        parse_hex_color(self.background).unwrap_or([255, 255, 255])
    }
}

fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let h = hex.strip_prefix('#')?;
    if h.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&h[0..2], 16).ok()?;
    let g = u8::from_str_radix(&h[2..4], 16).ok()?;
    let b = u8::from_str_radix(&h[4..6], 16).ok()?;
    Some([r, g, b])
}

/// Cosmetic width constraint for the container wrapping the sandbox.
///
/// Only the host-side container is narrowed; the isolated context itself is
/// not resized, so this is not a true breakpoint simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportMode {
    Mobile,
    Tablet,
    #[default]
    Desktop,
}

impl ViewportMode {
    /// Max container width in CSS pixels, `None` meaning unconstrained
    pub fn container_width(&self) -> Option<u32> {
        match self {
            ViewportMode::Mobile => Some(375),
            ViewportMode::Tablet => Some(768),
            ViewportMode::Desktop => None,
        }
    }
}

/// Pinned runtime locations and load polling for the sandbox document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// React UMD build
    pub react_url: String,
    /// ReactDOM UMD build
    pub react_dom_url: String,
    /// In-browser transformer (Babel standalone)
    pub transformer_url: String,
    /// Optional utility-CSS runtime; `None` disables it
    pub utility_css_url: Option<String>,
    /// Delay between runtime availability checks
    pub poll_interval_ms: u64,
    /// Checks before the sandbox reports that the runtime failed to load
    pub poll_max_attempts: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            react_url: "https://unpkg.com/react@18.3.1/umd/react.production.min.js".to_string(),
            react_dom_url: "https://unpkg.com/react-dom@18.3.1/umd/react-dom.production.min.js".to_string(),
            transformer_url: "https://unpkg.com/@babel/standalone@7.26.4/babel.min.js".to_string(),
            utility_css_url: Some("https://cdn.tailwindcss.com/3.4.16".to_string()),
            poll_interval_ms: 50,
            poll_max_attempts: 200,
        }
    }
}

/// Rasterization and thumbnail settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Fixed logical layout width used for every capture
    pub raster_width: u32,
    /// Device scale factor applied while rasterizing
    pub scale: f32,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    /// JPEG quality, 1..=100
    pub jpeg_quality: u8,
    /// Per-image fetch timeout while neutralizing cross-origin images
    pub image_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            raster_width: 1280,
            scale: 2.0,
            thumbnail_width: 640,
            thumbnail_height: 360,
            jpeg_quality: 92,
            image_timeout_ms: 10_000,
        }
    }
}

/// Top-level configuration for a preview instance
///
/// # Examples
///
/// ```
/// let cfg = rfpreview::PreviewConfig::default();
/// assert_eq!(cfg.capture.raster_width, 1280);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub runtime: RuntimeConfig,
    pub capture: CaptureConfig,
    /// Module specifiers whose named imports resolve to the icon catalog
    pub icon_packages: Vec<String>,
    /// How often the async facade drains sandbox messages
    pub pump_interval_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            capture: CaptureConfig::default(),
            icon_packages: vec!["lucide-react".to_string()],
            pump_interval_ms: 100,
        }
    }
}

impl PreviewConfig {
    /// Load from a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: PreviewConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.capture;
        if c.raster_width == 0 {
            return Err(Error::Config("capture.raster_width must be positive".into()));
        }
        if !(c.scale.is_finite() && c.scale > 0.0) {
            return Err(Error::Config("capture.scale must be a positive number".into()));
        }
        if c.thumbnail_width == 0 || c.thumbnail_height == 0 {
            return Err(Error::Config("thumbnail dimensions must be positive".into()));
        }
        if u64::from(c.thumbnail_width) * 9 != u64::from(c.thumbnail_height) * 16 {
            return Err(Error::Config(format!(
                "thumbnail must be 16:9, got {}x{}",
                c.thumbnail_width, c.thumbnail_height
            )));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(Error::Config("capture.jpeg_quality must be within 1..=100".into()));
        }
        if self.runtime.poll_max_attempts == 0 {
            return Err(Error::Config("runtime.poll_max_attempts must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreviewConfig::default();
        assert_eq!(config.capture.raster_width, 1280);
        assert_eq!(config.capture.thumbnail_width, 640);
        assert_eq!(config.capture.thumbnail_height, 360);
        assert_eq!(config.capture.jpeg_quality, 92);
        assert_eq!(config.icon_packages, vec!["lucide-react".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_config() {
        let cfg = PreviewConfig::from_json(r#"{ "capture": { "jpeg_quality": 80 } }"#).unwrap();
        assert_eq!(cfg.capture.jpeg_quality, 80);
        assert_eq!(cfg.capture.raster_width, 1280);
        assert_eq!(cfg.runtime, RuntimeConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        let mut cfg = PreviewConfig::default();
        cfg.capture.jpeg_quality = 0;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let err = PreviewConfig::from_json(r#"{ "capture": { "thumbnail_height": 500 } }"#).unwrap_err();
        assert!(err.to_string().contains("16:9"), "{}", err);

        let cfg = PreviewConfig::from_json(r#"{ "capture": { "thumbnail_width": 320, "thumbnail_height": 180 } }"#).unwrap();
        assert_eq!(cfg.capture.thumbnail_height, 180);
    }

    #[test]
    fn test_theme_palette() {
        assert_eq!(Theme::Light.palette().background_rgb(), [255, 255, 255]);
        assert_eq!(Theme::Dark.palette().background_rgb(), [9, 9, 11]);
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("sepia".parse::<Theme>().is_err());
    }

    #[test]
    fn test_viewport_widths() {
        assert_eq!(ViewportMode::Mobile.container_width(), Some(375));
        assert_eq!(ViewportMode::Tablet.container_width(), Some(768));
        assert_eq!(ViewportMode::Desktop.container_width(), None);
    }
}
