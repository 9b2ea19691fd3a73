//! Messages posted from the sandbox to its host.
//!
//! The sandbox and host share no memory; everything the host learns about a
//! render arrives as one of these JSON messages. Each carries the generation
//! of the document that produced it so reports from superseded documents can
//! be discarded.

use serde::{Deserialize, Serialize};

/// Value of the `source` field on every message the harness posts.
pub const MESSAGE_SOURCE: &str = "rfpreview";

/// Render report variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SandboxMessage {
    /// Content height of `#root` in CSS pixels
    #[serde(rename = "resize")]
    Resized { height: f64 },
    /// Human-readable transform or render failure
    #[serde(rename = "render-error")]
    RenderFailed { error: String },
}

/// A message together with its origin tag and document generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: String,
    pub generation: u64,
    #[serde(flatten)]
    pub message: SandboxMessage,
}

impl Envelope {
    pub fn new(generation: u64, message: SandboxMessage) -> Self {
        Self {
            source: MESSAGE_SOURCE.to_string(),
            generation,
            message,
        }
    }

    /// Parse a raw posted payload.
    ///
    /// Returns `None` for anything that is not a well-formed rfpreview message;
    /// other scripts in the page may post unrelated data.
    pub fn parse(raw: &str) -> Option<Envelope> {
        match serde_json::from_str::<Envelope>(raw) {
            Ok(env) if env.source == MESSAGE_SOURCE => Some(env),
            Ok(env) => {
                log::debug!("ignoring message from foreign source `{}`", env.source);
                None
            }
            Err(e) => {
                log::debug!("ignoring malformed sandbox message: {}", e);
                None
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Convert a reported height to whole pixels; negative or non-finite values map to 0.
pub fn height_px(height: f64) -> u32 {
    if height.is_finite() && height > 0.0 {
        height.ceil().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resize() {
        let env = Envelope::parse(r#"{"type":"resize","height":120.5,"source":"rfpreview","generation":4}"#).unwrap();
        assert_eq!(env.generation, 4);
        assert_eq!(env.message, SandboxMessage::Resized { height: 120.5 });
    }

    #[test]
    fn parses_render_error() {
        let env = Envelope::parse(r#"{"type":"render-error","error":"boom","source":"rfpreview","generation":1}"#).unwrap();
        assert_eq!(env.message, SandboxMessage::RenderFailed { error: "boom".into() });
    }

    #[test]
    fn rejects_foreign_and_malformed() {
        assert!(Envelope::parse(r#"{"type":"resize","height":1,"source":"devtools","generation":1}"#).is_none());
        assert!(Envelope::parse(r#"{"type":"resize","height":1,"source":"rfpreview"}"#).is_none());
        assert!(Envelope::parse(r#"{"type":"scroll","source":"rfpreview","generation":1}"#).is_none());
        assert!(Envelope::parse("not json").is_none());
    }

    #[test]
    fn wire_format_matches_harness() {
        let json = Envelope::new(2, SandboxMessage::RenderFailed { error: "x".into() }).to_json();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["type"], "render-error");
        assert_eq!(v["source"], "rfpreview");
        assert_eq!(v["generation"], 2);
    }

    #[test]
    fn height_rounding() {
        assert_eq!(height_px(10.2), 11);
        assert_eq!(height_px(-3.0), 0);
        assert_eq!(height_px(f64::NAN), 0);
    }
}
