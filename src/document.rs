//! Sandbox host document generation.
//!
//! A sandbox document is a standalone HTML page: pinned runtime scripts, theme
//! variables, the icon catalog, the harness from `sandbox_host.js`, and a
//! bootstrap payload carrying the compiled program. Identical inputs produce
//! byte-identical documents, so the digest doubles as a cache key.

use crate::compile::ComponentFactory;
use crate::icons::IconCatalog;
use crate::{RuntimeConfig, Theme};
use serde::Serialize;
use sha2::{Digest, Sha256};

const TEMPLATE: &str = include_str!("sandbox_host.html");

/// Script run inside the sandbox; exposes `window.__rfpreviewStart(boot)`.
pub const HARNESS: &str = include_str!("sandbox_host.js");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Bootstrap<'a> {
    generation: u64,
    component: Option<&'a str>,
    program: Option<&'a str>,
    failure: Option<&'a str>,
    poll: PollSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PollSettings {
    interval_ms: u64,
    max_attempts: u32,
}

/// A generated sandbox document for one generation of a preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxDocument {
    html: String,
    generation: u64,
    theme: Theme,
    component: Option<String>,
    digest: String,
}

impl SandboxDocument {
    /// Document that transforms and mounts `factory`.
    pub fn render(factory: &ComponentFactory, theme: Theme, generation: u64, runtime: &RuntimeConfig) -> Self {
        let boot = Bootstrap {
            generation,
            component: Some(&factory.component),
            program: Some(&factory.program),
            failure: None,
            poll: PollSettings::from(runtime),
        };
        let html = assemble(&boot, theme, Some(runtime));
        Self::new(html, generation, theme, Some(factory.component.clone()))
    }

    /// Document that shows `message` inline and reports it as a render error.
    ///
    /// Used when compilation fails before anything can be transformed; it
    /// loads no runtime scripts.
    pub fn failure(message: &str, theme: Theme, generation: u64, runtime: &RuntimeConfig) -> Self {
        let boot = Bootstrap {
            generation,
            component: None,
            program: None,
            failure: Some(message),
            poll: PollSettings::from(runtime),
        };
        let html = assemble(&boot, theme, None);
        Self::new(html, generation, theme, None)
    }

    fn new(html: String, generation: u64, theme: Theme, component: Option<String>) -> Self {
        let digest = hex::encode(Sha256::digest(html.as_bytes()));
        Self {
            html,
            generation,
            theme,
            component,
            digest,
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Mounted component name, `None` for failure documents
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    /// Hex SHA-256 of the HTML
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl From<&RuntimeConfig> for PollSettings {
    fn from(r: &RuntimeConfig) -> Self {
        PollSettings {
            interval_ms: r.poll_interval_ms,
            max_attempts: r.poll_max_attempts.max(1),
        }
    }
}

fn assemble(boot: &Bootstrap<'_>, theme: Theme, runtime: Option<&RuntimeConfig>) -> String {
    let scripts = runtime.map(runtime_scripts).unwrap_or_default();
    let bootstrap = serde_json::to_string(boot).unwrap_or_else(|_| "{}".to_string());

    // Admin-controlled text lives only in the bootstrap, so it is substituted last.
    TEMPLATE
        .replace("{{THEME}}", theme.as_str())
        .replace("{{GENERATION}}", &boot.generation.to_string())
        .replace("{{THEME_CSS}}", &theme_css(theme))
        .replace("{{RUNTIME_SCRIPTS}}", &scripts)
        .replace("{{ICON_CATALOG}}", &escape_script(&IconCatalog::builtin().to_script()))
        .replace("{{HARNESS}}", HARNESS)
        .replace("{{BOOTSTRAP}}", &escape_script(&bootstrap))
}

fn runtime_scripts(runtime: &RuntimeConfig) -> String {
    let mut out = String::new();
    if let Some(css) = &runtime.utility_css_url {
        out.push_str(&format!("<script src=\"{}\"></script>\n", escape_attr(css)));
    }
    for src in [&runtime.react_url, &runtime.react_dom_url, &runtime.transformer_url] {
        out.push_str(&format!(
            "<script defer crossorigin=\"anonymous\" src=\"{}\"></script>\n",
            escape_attr(src)
        ));
    }
    out
}

/// Escape text embedded in an inline `<script>` so it cannot close the element.
pub fn escape_script(js: &str) -> String {
    js.replace("</", "<\\/").replace("<!--", "<\\!--")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}

/// CSS reset plus theme variables for the sandbox document.
pub fn theme_css(theme: Theme) -> String {
    let p = theme.palette();
    format!(
        ":root{{--background:{bg};--foreground:{fg};--muted:{muted};--muted-foreground:{mfg};--border:{border};--primary:{primary};--primary-foreground:{pfg};--destructive:{destructive};color-scheme:{scheme};}}\
*,*::before,*::after{{box-sizing:border-box;}}\
html,body{{margin:0;padding:0;background:var(--background);color:var(--foreground);font-family:ui-sans-serif,system-ui,-apple-system,\"Segoe UI\",Roboto,sans-serif;-webkit-font-smoothing:antialiased;}}\
#root{{display:flow-root;}}\
.rf-error{{margin:16px;padding:12px 16px;border:1px solid var(--destructive);border-radius:8px;background:var(--muted);color:var(--destructive);font:13px/1.5 ui-monospace,SFMono-Regular,Menlo,monospace;white-space:pre-wrap;word-break:break-word;}}",
        bg = p.background,
        fg = p.foreground,
        muted = p.muted,
        mfg = p.muted_foreground,
        border = p.border,
        primary = p.primary,
        pfg = p.primary_foreground,
        destructive = p.destructive,
        scheme = theme.as_str(),
    )
}
