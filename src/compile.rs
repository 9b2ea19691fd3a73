//! The one seam where component source becomes sandbox-executable program
//! text. All string surgery on admin code happens here or in [`crate::normalize`].

use crate::normalize::{is_identifier, normalize, IconImport};
use crate::{PreviewConfig, Result};
use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

/// React exports bound as plain identifiers, since the stripped
/// `import { useState } from 'react'` lines no longer provide them.
pub const REACT_BINDINGS: &[&str] = &[
    "useState",
    "useEffect",
    "useLayoutEffect",
    "useRef",
    "useMemo",
    "useCallback",
    "useReducer",
    "useContext",
    "useId",
    "useTransition",
    "createContext",
    "forwardRef",
    "memo",
    "Fragment",
];

/// Names made available to component code before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    /// React exports destructured from the global `React`
    pub react: Vec<String>,
    /// Icon packages resolved against the built-in catalog
    pub icon_packages: Vec<String>,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            react: REACT_BINDINGS.iter().map(|s| s.to_string()).collect(),
            icon_packages: vec!["lucide-react".to_string()],
        }
    }
}

impl Bindings {
    pub fn from_config(config: &PreviewConfig) -> Self {
        Self {
            icon_packages: config.icon_packages.clone(),
            ..Default::default()
        }
    }
}

/// A compiled component: program text for the in-sandbox transformer plus the
/// entry point it returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentFactory {
    /// Function mounted as the root component
    pub component: String,
    /// Binding prelude followed by the normalized source
    pub program: String,
    pub icon_imports: Vec<IconImport>,
    /// Every identifier the prelude declares
    pub bound: Vec<String>,
}

/// Compile admin source into a [`ComponentFactory`].
///
/// # Errors
/// Fails with [`crate::Error::NoComponentFunction`] when the source declares
/// no `function Name(` component.
pub fn compile(source: &str, bindings: &Bindings) -> Result<ComponentFactory> {
    let normalized = normalize(source, bindings.icon_packages.as_slice())?;
    let code = &normalized.code;

    let mut bound: Vec<String> = Vec::new();
    let mut prelude = String::new();

    let react: Vec<&str> = bindings
        .react
        .iter()
        .map(String::as_str)
        .filter(|name| is_identifier(name) && !declares(code, name))
        .collect();
    if !react.is_empty() {
        prelude.push_str(&format!("const {{ {} }} = React;\n", react.join(", ")));
        bound.extend(react.iter().map(|s| s.to_string()));
    }

    for icon in &normalized.icon_imports {
        if bound.contains(&icon.local) || declares(code, &icon.local) {
            warn!("icon alias `{}` collides with an existing binding; skipped", icon.local);
            continue;
        }
        let key = serde_json::to_string(&icon.imported)?;
        prelude.push_str(&format!("const {} = __rfIcons.lookup({});\n", icon.local, key));
        bound.push(icon.local.clone());
    }

    debug!(
        "compiled `{}` with {} bindings ({} icons)",
        normalized.component,
        bound.len(),
        normalized.icon_imports.len()
    );

    Ok(ComponentFactory {
        program: format!("{}{}", prelude, code),
        component: normalized.component,
        icon_imports: normalized.icon_imports,
        bound,
    })
}

/// Whether `code` declares `name` itself (declaration keyword or destructuring).
fn declares(code: &str, name: &str) -> bool {
    let escaped = regex::escape(name);
    let pattern = format!(
        r"(?:\b(?:const|let|var|function|class)\s+{0}\b)|(?:\b(?:const|let|var)\s*\{{[^}}]*\b{0}\b[^}}]*\}}\s*=)",
        escaped
    );
    Regex::new(&pattern).map(|re| re.is_match(code)).unwrap_or(false)
}
