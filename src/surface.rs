//! The isolated browsing context a preview renders into.
//!
//! A [`SandboxSurface`] loads sandbox documents, relays the messages they post
//! and exposes the few DOM operations capture needs. The controller drives it
//! from a single thread; implementations need not be `Send`.

use crate::resource::ResourceHandle;
use crate::{CaptureConfig, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Element that gets rasterized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureTarget {
    /// The single element the component rendered into `#root`
    RenderedChild,
    /// `#root` itself, when it holds zero or several elements
    Root,
    /// Document body, when `#root` is missing
    Body,
}

/// An `<img>` under the capture target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSlot {
    /// Position in document order, also stamped on the element
    pub index: usize,
    /// The `src` attribute exactly as authored
    pub src: String,
    /// Absolute URL the browser resolved `src` to
    pub url: String,
}

impl ImageSlot {
    /// Already inline; nothing to proxy
    pub fn is_inline(&self) -> bool {
        self.url.starts_with("data:") || self.src.starts_with("data:")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetImages {
    pub target: CaptureTarget,
    pub images: Vec<ImageSlot>,
}

/// Parameters for one rasterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRequest {
    /// Logical layout width in CSS pixels
    pub width: u32,
    /// Device pixels per CSS pixel
    pub scale: f32,
    /// Canvas fill behind the target
    pub background: [u8; 3],
    /// Tallest clip in CSS pixels that still affects the thumbnail
    pub max_height: u32,
}

impl RasterRequest {
    /// Request for `config`, clipped to the rows a 16:9 crop can keep.
    pub fn for_capture(config: &CaptureConfig, background: [u8; 3]) -> Self {
        let rows = u64::from(config.thumbnail_height) * u64::from(config.raster_width);
        let max_height = rows.div_ceil(u64::from(config.thumbnail_width.max(1)));
        RasterRequest {
            width: config.raster_width,
            scale: config.scale,
            background,
            max_height: u32::try_from(max_height).unwrap_or(u32::MAX).max(1),
        }
    }

    /// Width of the produced raster in device pixels
    pub fn device_width(&self) -> u32 {
        (self.width as f32 * self.scale).round() as u32
    }

    /// CSS height to rasterize for a target `content_height` pixels tall
    pub fn clip_height(&self, content_height: f64) -> f64 {
        content_height.ceil().clamp(1.0, self.max_height.max(1) as f64)
    }
}

/// An isolated context hosting one sandbox document at a time.
pub trait SandboxSurface {
    /// Load the document behind `handle`, replacing whatever was loaded.
    fn attach(&mut self, handle: &ResourceHandle) -> Result<()>;

    /// Raw payloads posted since the last call, oldest first.
    fn drain_messages(&mut self) -> Result<Vec<String>>;

    /// Find the capture target and the images beneath it.
    fn locate_images(&mut self) -> Result<TargetImages>;

    /// Overwrite the `src` of the image at `slot`.
    fn set_image_source(&mut self, slot: &ImageSlot, src: &str) -> Result<()>;

    /// Drop any bookkeeping `locate_images` left on the DOM.
    fn release_images(&mut self) -> Result<()> {
        Ok(())
    }

    /// Rasterize the capture target.
    fn rasterize(&mut self, request: &RasterRequest) -> Result<RgbaImage>;

    /// Unload the current document.
    fn detach(&mut self) -> Result<()>;
}

impl<S: SandboxSurface + ?Sized> SandboxSurface for Box<S> {
    fn attach(&mut self, handle: &ResourceHandle) -> Result<()> {
        (**self).attach(handle)
    }

    fn drain_messages(&mut self) -> Result<Vec<String>> {
        (**self).drain_messages()
    }

    fn locate_images(&mut self) -> Result<TargetImages> {
        (**self).locate_images()
    }

    fn set_image_source(&mut self, slot: &ImageSlot, src: &str) -> Result<()> {
        (**self).set_image_source(slot, src)
    }

    fn release_images(&mut self) -> Result<()> {
        (**self).release_images()
    }

    fn rasterize(&mut self, request: &RasterRequest) -> Result<RgbaImage> {
        (**self).rasterize(request)
    }

    fn detach(&mut self) -> Result<()> {
        (**self).detach()
    }
}

// Resolves the capture target into `target` and `kind`.
const TARGET_JS: &str = r#"var root = document.getElementById('root');
  var target = document.body, kind = 'body';
  if (root) {
    if (root.children.length === 1) { target = root.children[0]; kind = 'rendered-child'; }
    else { target = root; kind = 'root'; }
  }"#;

const SLOT_ATTR: &str = "data-rfpreview-slot";

/// Page script returning [`TargetImages`] as a JSON string. Stamps each image
/// with its slot index.
pub fn locate_script() -> String {
    r#"(function(){
  __TARGET__
  var imgs = target.tagName === 'IMG' ? [target] : Array.prototype.slice.call(target.querySelectorAll('img'));
  var images = imgs.map(function(img, i){
    img.setAttribute('__SLOT__', String(i));
    return { index: i, src: img.getAttribute('src') || '', url: img.currentSrc || img.src || '' };
  });
  return JSON.stringify({ target: kind, images: images });
})()"#
        .replace("__TARGET__", TARGET_JS)
        .replace("__SLOT__", SLOT_ATTR)
}

/// Page script assigning `src` to the image stamped with `index`.
pub fn set_image_script(index: usize, src: &str) -> String {
    let literal = serde_json::to_string(src).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(function(){{var img=document.querySelector('[{attr}=\"{index}\"]');if(!img)return false;img.setAttribute('src',{literal});return true;}})()",
        attr = SLOT_ATTR,
        index = index,
        literal = literal
    )
}

/// Removes slot stamps left by [`locate_script`].
pub const RELEASE_SLOTS_SCRIPT: &str = "(function(){document.querySelectorAll('[data-rfpreview-slot]').forEach(function(el){el.removeAttribute('data-rfpreview-slot');});return true;})()";

pub const RASTER_STYLE_ID: &str = "__rfpreview_capture";

/// Async page script that pins the layout width, paints the background,
/// waits for images to decode and returns the target's page rect as JSON
/// (`{x, y, width, height}`).
pub fn prepare_raster_script(request: &RasterRequest) -> String {
    let [r, g, b] = request.background;
    let css = format!(
        "html,body{{width:{w}px !important;min-width:{w}px !important;max-width:{w}px !important;background:rgb({r},{g},{b}) !important;}}",
        w = request.width,
        r = r,
        g = g,
        b = b
    );
    r#"(async function(){
  var style = document.getElementById('__STYLE_ID__');
  if (!style) { style = document.createElement('style'); style.id = '__STYLE_ID__'; document.head.appendChild(style); }
  style.textContent = __CSS__;
  await Promise.all(Array.prototype.slice.call(document.images).map(function(img){
    return img.decode ? img.decode().catch(function(){}) : null;
  }));
  __TARGET__
  var rect = target.getBoundingClientRect();
  return JSON.stringify({ x: rect.left + window.scrollX, y: rect.top + window.scrollY, width: rect.width, height: Math.max(rect.height, target.scrollHeight || 0) });
})()"#
        .replace("__STYLE_ID__", RASTER_STYLE_ID)
        .replace("__CSS__", &serde_json::to_string(&css).unwrap_or_else(|_| "\"\"".to_string()))
        .replace("__TARGET__", TARGET_JS)
}

/// Removes the style injected by [`prepare_raster_script`].
pub fn cleanup_raster_script() -> String {
    format!(
        "(function(){{var s=document.getElementById('{}');if(s)s.remove();if(typeof window.__rfpreviewRemeasure==='function')window.__rfpreviewRemeasure();return true;}})()",
        RASTER_STYLE_ID
    )
}

/// Page rect of the capture target, as returned by [`prepare_raster_script`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TargetRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_images_wire_format() {
        let raw = r#"{"target":"rendered-child","images":[{"index":0,"src":"/a.png","url":"https://cdn.test/a.png"},{"index":1,"src":"data:image/png;base64,AA==","url":"data:image/png;base64,AA=="}]}"#;
        let t: TargetImages = serde_json::from_str(raw).unwrap();
        assert_eq!(t.target, CaptureTarget::RenderedChild);
        assert!(!t.images[0].is_inline());
        assert!(t.images[1].is_inline());
    }

    #[test]
    fn set_image_script_quotes_source() {
        let js = set_image_script(3, "data:image/png;base64,\"x\"");
        assert!(js.contains("[data-rfpreview-slot=\"3\"]"));
        assert!(js.contains(r#""data:image/png;base64,\"x\"""#));
    }

    #[test]
    fn scripts_have_no_leftover_tokens() {
        let req = RasterRequest::for_capture(&CaptureConfig::default(), [9, 9, 11]);
        assert!(!locate_script().contains("__TARGET__"));
        let prep = prepare_raster_script(&req);
        assert!(!prep.replace(RASTER_STYLE_ID, "").contains("__"));
        assert!(prep.contains("width:1280px"));
        assert!(prep.contains("rgb(9,9,11)"));
        assert_eq!(req.device_width(), 2560);
    }

    #[test]
    fn clip_stops_at_the_cropped_rows() {
        let req = RasterRequest::for_capture(&CaptureConfig::default(), [255, 255, 255]);
        assert_eq!(req.max_height, 720);
        assert_eq!(req.clip_height(4000.0), 720.0);
        assert_eq!(req.clip_height(150.2), 151.0);
        assert_eq!(req.clip_height(0.0), 1.0);
        // a full-height clip still plans as a crop of the same rows
        let rows = (req.clip_height(4000.0) as f32 * req.scale) as u32;
        assert_eq!(
            crate::capture::ThumbnailFit::plan(req.device_width(), rows, 640, 360),
            crate::capture::ThumbnailFit::Crop { source_height: 1440 }
        );
    }

    #[test]
    fn harness_recognizes_capture_style() {
        assert!(crate::document::HARNESS.contains(RASTER_STYLE_ID));
        let cleanup = cleanup_raster_script();
        assert!(cleanup.contains(RASTER_STYLE_ID));
        assert!(cleanup.contains("__rfpreviewRemeasure()"));
    }
}
