//! Built-in icon catalog available inside the sandbox.
//!
//! Components written against an icon package (`lucide-react` by default)
//! cannot load that package in the isolated context, so every imported icon
//! is bound to an inline SVG from this catalog. Lookup is total: unknown names
//! resolve to a generic circle tagged with the requested name.

use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Inner SVG markup of the fallback glyph.
pub const FALLBACK_BODY: &str = r#"<circle cx="12" cy="12" r="10"/>"#;

/// Catalog key reported for the fallback glyph.
pub const FALLBACK_NAME: &str = "Fallback";

// 24x24 stroke icons, rendered with `fill="none" stroke="currentColor"`.
const BUILTIN_ICONS: &[(&str, &str)] = &[
    // navigation
    ("ArrowRight", r#"<path d="M5 12h14"/><path d="m12 5 7 7-7 7"/>"#),
    ("ArrowLeft", r#"<path d="m12 19-7-7 7-7"/><path d="M19 12H5"/>"#),
    ("ArrowUp", r#"<path d="m5 12 7-7 7 7"/><path d="M12 19V5"/>"#),
    ("ArrowDown", r#"<path d="M12 5v14"/><path d="m19 12-7 7-7-7"/>"#),
    ("ChevronRight", r#"<path d="m9 18 6-6-6-6"/>"#),
    ("ChevronLeft", r#"<path d="m15 18-6-6 6-6"/>"#),
    ("ChevronDown", r#"<path d="m6 9 6 6 6-6"/>"#),
    ("ChevronUp", r#"<path d="m18 15-6-6-6 6"/>"#),
    ("Menu", r#"<line x1="4" x2="20" y1="12" y2="12"/><line x1="4" x2="20" y1="6" y2="6"/><line x1="4" x2="20" y1="18" y2="18"/>"#),
    ("X", r#"<path d="M18 6 6 18"/><path d="m6 6 12 12"/>"#),
    ("Home", r#"<path d="m3 9 9-7 9 7v11a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2z"/><polyline points="9 22 9 12 15 12 15 22"/>"#),
    ("Search", r#"<circle cx="11" cy="11" r="8"/><path d="m21 21-4.3-4.3"/>"#),
    ("ExternalLink", r#"<path d="M15 3h6v6"/><path d="M10 14 21 3"/><path d="M18 13v6a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2V8a2 2 0 0 1 2-2h6"/>"#),
    ("Plus", r#"<path d="M5 12h14"/><path d="M12 5v14"/>"#),
    ("Minus", r#"<path d="M5 12h14"/>"#),
    // status
    ("Check", r#"<path d="M20 6 9 17l-5-5"/>"#),
    ("CheckCircle", r#"<path d="M22 11.08V12a10 10 0 1 1-5.93-9.14"/><path d="m9 11 3 3L22 4"/>"#),
    ("XCircle", r#"<circle cx="12" cy="12" r="10"/><path d="m15 9-6 6"/><path d="m9 9 6 6"/>"#),
    ("AlertCircle", r#"<circle cx="12" cy="12" r="10"/><line x1="12" x2="12" y1="8" y2="12"/><line x1="12" x2="12.01" y1="16" y2="16"/>"#),
    ("AlertTriangle", r#"<path d="m21.73 18-8-14a2 2 0 0 0-3.48 0l-8 14A2 2 0 0 0 4 21h16a2 2 0 0 0 1.73-3"/><path d="M12 9v4"/><path d="M12 17h.01"/>"#),
    ("Info", r#"<circle cx="12" cy="12" r="10"/><path d="M12 16v-4"/><path d="M12 8h.01"/>"#),
    ("Loader2", r#"<path d="M21 12a9 9 0 1 1-6.219-8.56"/>"#),
    ("Bell", r#"<path d="M6 8a6 6 0 0 1 12 0c0 7 3 9 3 9H3s3-2 3-9"/><path d="M10.3 21a1.94 1.94 0 0 0 3.4 0"/>"#),
    ("Star", r#"<polygon points="12 2 15.09 8.26 22 9.27 17 14.14 18.18 21.02 12 17.77 5.82 21.02 7 14.14 2 9.27 8.91 8.26 12 2"/>"#),
    ("Heart", r#"<path d="M19 14c1.49-1.46 3-3.21 3-5.5A5.5 5.5 0 0 0 16.5 3c-1.76 0-3 .5-4.5 2-1.5-1.5-2.74-2-4.5-2A5.5 5.5 0 0 0 2 8.5c0 2.3 1.5 4.05 3 5.5l7 7Z"/>"#),
    ("Zap", r#"<polygon points="13 2 3 14 12 14 11 22 21 10 12 10 13 2"/>"#),
    ("Sparkles", r#"<path d="m12 3-1.9 5.8a2 2 0 0 1-1.3 1.3L3 12l5.8 1.9a2 2 0 0 1 1.3 1.3L12 21l1.9-5.8a2 2 0 0 1 1.3-1.3L21 12l-5.8-1.9a2 2 0 0 1-1.3-1.3Z"/>"#),
    ("Settings", r#"<circle cx="12" cy="12" r="3"/><path d="M19.4 15a1.65 1.65 0 0 0 .33 1.82l.06.06a2 2 0 1 1-2.83 2.83l-.06-.06a1.65 1.65 0 0 0-1.82-.33 1.65 1.65 0 0 0-1 1.51V21a2 2 0 1 1-4 0v-.09A1.65 1.65 0 0 0 9 19.4a1.65 1.65 0 0 0-1.82.33l-.06.06a2 2 0 1 1-2.83-2.83l.06-.06A1.65 1.65 0 0 0 4.68 15a1.65 1.65 0 0 0-1.51-1H3a2 2 0 1 1 0-4h.09A1.65 1.65 0 0 0 4.6 9a1.65 1.65 0 0 0-.33-1.82l-.06-.06a2 2 0 1 1 2.83-2.83l.06.06A1.65 1.65 0 0 0 9 4.68a1.65 1.65 0 0 0 1-1.51V3a2 2 0 1 1 4 0v.09a1.65 1.65 0 0 0 1 1.51 1.65 1.65 0 0 0 1.82-.33l.06-.06a2 2 0 1 1 2.83 2.83l-.06.06A1.65 1.65 0 0 0 19.4 9a1.65 1.65 0 0 0 1.51 1H21a2 2 0 1 1 0 4h-.09a1.65 1.65 0 0 0-1.51 1z"/>"#),
    ("User", r#"<path d="M19 21v-2a4 4 0 0 0-4-4H9a4 4 0 0 0-4 4v2"/><circle cx="12" cy="7" r="4"/>"#),
    ("Mail", r#"<rect width="20" height="16" x="2" y="4" rx="2"/><path d="m22 7-8.97 5.7a1.94 1.94 0 0 1-2.06 0L2 7"/>"#),
    ("Calendar", r#"<rect width="18" height="18" x="3" y="4" rx="2"/><line x1="16" x2="16" y1="2" y2="6"/><line x1="8" x2="8" y1="2" y2="6"/><line x1="3" x2="21" y1="10" y2="10"/>"#),
    ("Clock", r#"<circle cx="12" cy="12" r="10"/><polyline points="12 6 12 12 16 14"/>"#),
    ("Globe", r#"<circle cx="12" cy="12" r="10"/><path d="M12 2a14.5 14.5 0 0 0 0 20 14.5 14.5 0 0 0 0-20"/><path d="M2 12h20"/>"#),
    // social
    ("Github", r#"<path d="M15 22v-4a4.8 4.8 0 0 0-1-3.5c3 0 6-2 6-5.5.08-1.25-.27-2.48-1-3.5.28-1.15.28-2.35 0-3.5 0 0-1 0-3 1.5-2.64-.5-5.36-.5-8 0C6 2 5 2 5 2c-.3 1.15-.3 2.35 0 3.5A5.403 5.403 0 0 0 4 9c0 3.5 3 5.5 6 5.5-.39.49-.68 1.05-.85 1.65-.17.6-.22 1.23-.15 1.85v4"/><path d="M9 18c-4.51 2-5-2-7-2"/>"#),
    ("Twitter", r#"<path d="M22 4s-.7 2.1-2 3.4c1.6 10-9.4 17.3-18 11.6 2.2.1 4.4-.6 6-2C3 15.5.5 9.6 3 5c2.2 2.6 5.6 4.1 9 4-.9-4.2 4-6.6 7-3.8 1.1 0 3-1.2 3-1.2z"/>"#),
    ("Linkedin", r#"<path d="M16 8a6 6 0 0 1 6 6v7h-4v-7a2 2 0 0 0-2-2 2 2 0 0 0-2 2v7h-4v-7a6 6 0 0 1 6-6z"/><rect width="4" height="12" x="2" y="9"/><circle cx="4" cy="4" r="2"/>"#),
];

/// A resolved icon. Always renderable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Icon {
    /// Catalog key that was actually used
    pub name: &'static str,
    /// Inner SVG markup
    pub body: &'static str,
    /// Set when the lookup missed and the fallback glyph was returned
    pub requested: Option<String>,
}

impl Icon {
    pub fn is_fallback(&self) -> bool {
        self.requested.is_some()
    }

    /// Render standalone SVG markup.
    pub fn to_svg(&self, size: u32, class: Option<&str>) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" data-icon="{}""#,
            self.name
        );
        if let Some(req) = &self.requested {
            svg.push_str(&format!(r#" data-requested-icon="{}""#, escape_attr(req)));
        }
        if let Some(c) = class {
            svg.push_str(&format!(r#" class="{}""#, escape_attr(c)));
        }
        svg.push('>');
        svg.push_str(self.body);
        svg.push_str("</svg>");
        svg
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Name-to-markup mapping with a single fallback entry.
#[derive(Debug)]
pub struct IconCatalog {
    entries: BTreeMap<&'static str, &'static str>,
}

impl IconCatalog {
    /// The shared built-in catalog.
    pub fn builtin() -> &'static IconCatalog {
        static CATALOG: OnceLock<IconCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| IconCatalog {
            entries: BUILTIN_ICONS.iter().copied().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Resolve `name`, falling back to a tagged circle glyph on a miss.
    pub fn lookup(&self, name: &str) -> Icon {
        match self.entries.get_key_value(name) {
            Some((key, body)) => Icon {
                name: *key,
                body: *body,
                requested: None,
            },
            None => {
                warn!("unknown icon `{}`; rendering fallback glyph", name);
                Icon {
                    name: FALLBACK_NAME,
                    body: FALLBACK_BODY,
                    requested: Some(name.to_string()),
                }
            }
        }
    }

    /// Script defining `window.__rfIcons` inside the sandbox document.
    ///
    /// `React` is read lazily at render time since the runtime scripts may
    /// still be loading when this block executes.
    pub fn to_script(&self) -> String {
        let bodies = serde_json::to_string(&self.entries).unwrap_or_else(|_| "{}".to_string());
        ICON_RUNTIME
            .replace("__RF_ICON_BODIES__", &bodies)
            .replace(
                "__RF_ICON_FALLBACK__",
                &serde_json::to_string(FALLBACK_BODY).unwrap_or_else(|_| "\"\"".to_string()),
            )
    }
}

const ICON_RUNTIME: &str = r#"window.__rfIcons = (function () {
  var bodies = __RF_ICON_BODIES__;
  var fallback = __RF_ICON_FALLBACK__;
  var cache = {};
  function build(name, body, requested) {
    var Icon = function (props) {
      props = props || {};
      var size = props.size || 24;
      var attrs = {
        xmlns: 'http://www.w3.org/2000/svg',
        width: size,
        height: size,
        viewBox: '0 0 24 24',
        fill: 'none',
        stroke: props.color || 'currentColor',
        strokeWidth: props.strokeWidth || 2,
        strokeLinecap: 'round',
        strokeLinejoin: 'round',
        className: props.className,
        style: props.style,
        'data-icon': name,
        dangerouslySetInnerHTML: { __html: body }
      };
      if (requested) attrs['data-requested-icon'] = requested;
      return window.React.createElement('svg', attrs);
    };
    Icon.displayName = requested ? 'Fallback(' + requested + ')' : name;
    if (requested) Icon.requestedName = requested;
    return Icon;
  }
  function has(name) {
    return Object.prototype.hasOwnProperty.call(bodies, name);
  }
  return {
    has: has,
    names: function () { return Object.keys(bodies); },
    lookup: function (name) {
      var key = String(name);
      if (Object.prototype.hasOwnProperty.call(cache, key)) return cache[key];
      if (has(key)) {
        cache[key] = build(key, bodies[key], null);
      } else {
        if (typeof console !== 'undefined' && console.warn) {
          console.warn('[rfpreview] unknown icon "' + key + '", rendering fallback');
        }
        cache[key] = build('Fallback', fallback, key);
      }
      return cache[key];
    }
  };
})();
"#;
