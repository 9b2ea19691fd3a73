//! Source normalization: strips module syntax from admin-supplied component
//! text and identifies the function component the sandbox should mount.
//!
//! The isolated context has no module loader, so every `import` is removed and
//! `export` qualifiers are dropped. Icon-package imports are remembered so the
//! sandbox can bind each local alias to the built-in icon catalog instead.

use crate::{Error, Result};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One `{ imported as local }` specifier taken from an icon-package import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconImport {
    /// Name exported by the icon package (catalog key)
    pub imported: String,
    /// Binding name used by the component code
    pub local: String,
}

/// Source text ready to hand to the in-sandbox transformer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSource {
    /// Source with imports, directives and export qualifiers removed
    pub code: String,
    /// Name of the first declared function, mounted as the component
    pub component: String,
    /// Icon specifiers recorded before imports were stripped
    pub icon_imports: Vec<IconImport>,
}

fn named_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"import\s*(?:type\s+)?\{([^}]*)\}\s*from\s*['"]([^'"]+)['"]"#).unwrap()
    })
}

fn import_stmt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)(^|;)[ \t]*import[\s{*][^'"`;]*['"][^'"\n]+['"]"#).unwrap()
    })
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?m)(^|;)[ \t]*['"]use [a-z][a-z ]*['"]"#).unwrap())
}

fn export_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?m)(^|;)[ \t]*export\s*(?:type\s*)?(?:\{[^}]*\}|\*(?:\s*as\s+[A-Za-z_$][\w$]*)?)(?:\s*from\s*['"][^'"]+['"])?"#,
        )
        .unwrap()
    })
}

fn export_default_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)(^|;)[ \t]*export[ \t]+default[ \t]+[A-Za-z_$][\w$]*[ \t]*(;|$)"#).unwrap()
    })
}

fn export_qualifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?m)(^|;)([ \t]*)export[ \t]+(?:default[ \t]+)?"#).unwrap())
}

fn function_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)\s*(?:<[^<>()]*>)?\s*\("#).unwrap()
    })
}

/// Returns true when `name` is a plain JavaScript identifier.
pub fn is_identifier(name: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^[A-Za-z_$][\w$]*$"#).unwrap())
        .is_match(name)
}

/// Normalize raw component source.
///
/// `icon_packages` lists the module specifiers whose named imports resolve to
/// the built-in icon catalog (for example `lucide-react`).
///
/// # Errors
/// Returns [`Error::NoComponentFunction`] when no `function Name(` declaration
/// remains after stripping module syntax. Arrow-function components are not
/// recognized and fail here rather than rendering nothing.
pub fn normalize<S: AsRef<str>>(source: &str, icon_packages: &[S]) -> Result<NormalizedSource> {
    let icon_imports = collect_icon_imports(source, icon_packages);

    // statements may share a line; each match keeps its leading `;` and leaves
    // the trailing one behind as an empty statement
    let code = directive_re().replace_all(source, "${1}");
    let code = import_stmt_re().replace_all(&code, "${1}");
    let code = export_list_re().replace_all(&code, "${1}");
    let code = export_default_name_re().replace_all(&code, "${1}${2}");
    let code = export_qualifier_re().replace_all(&code, "${1}${2}").into_owned();

    let mut names = function_decl_re()
        .captures_iter(&code)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()));

    let component = names.next().ok_or_else(|| {
        Error::NoComponentFunction(
            "declare the component as `function Name(props) { ... }`; arrow functions and anonymous defaults are not supported"
                .to_string(),
        )
    })?;

    let ignored: Vec<String> = names.collect();
    if !ignored.is_empty() {
        debug!(
            "mounting `{}`; additional functions treated as helpers: {}",
            component,
            ignored.join(", ")
        );
    }

    Ok(NormalizedSource {
        code,
        component,
        icon_imports,
    })
}

fn collect_icon_imports<S: AsRef<str>>(source: &str, icon_packages: &[S]) -> Vec<IconImport> {
    let mut out: Vec<IconImport> = Vec::new();
    for caps in named_import_re().captures_iter(source) {
        let package = &caps[2];
        if !icon_packages.iter().any(|p| p.as_ref() == package) {
            continue;
        }
        for spec in caps[1].split(',') {
            let parts: Vec<&str> = spec.split_whitespace().collect();
            let (imported, local) = match parts.as_slice() {
                [] => continue,
                ["type", ..] => continue,
                [name] => (*name, *name),
                [name, "as", alias] => (*name, *alias),
                _ => {
                    log::warn!("ignoring malformed icon import specifier `{}`", spec.trim());
                    continue;
                }
            };
            if !is_identifier(imported) || !is_identifier(local) {
                log::warn!("ignoring icon import `{}`: not an identifier", spec.trim());
                continue;
            }
            if out.iter().any(|i| i.local == local) {
                continue;
            }
            out.push(IconImport {
                imported: imported.to_string(),
                local: local.to_string(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGES: &[&str] = &["lucide-react"];

    #[test]
    fn strips_imports_exports_and_directive() {
        let src = r#""use client";
import React, { useState } from 'react';
import { Zap, Star as MyStar } from "lucide-react";
import './styles.css';

export default function Hero({ title }) {
  const [n, setN] = useState(0);
  return <div><Zap /><MyStar />{title}{n}</div>;
}
"#;
        let out = normalize(src, PACKAGES).unwrap();
        assert_eq!(out.component, "Hero");
        assert!(!out.code.contains("import"));
        assert!(!out.code.contains("export"));
        assert!(!out.code.contains("use client"));
        assert!(out.code.contains("function Hero({ title })"));
        assert_eq!(
            out.icon_imports,
            vec![
                IconImport { imported: "Zap".into(), local: "Zap".into() },
                IconImport { imported: "Star".into(), local: "MyStar".into() },
            ]
        );
    }

    #[test]
    fn one_line_module_syntax_is_removed() {
        let src = "\"use client\"; import { Star } from 'lucide-react'; import React from 'react'; export default function A() { return <Star/> }";
        let out = normalize(src, PACKAGES).unwrap();
        assert_eq!(out.component, "A");
        assert!(!out.code.contains("use client"), "{}", out.code);
        assert!(!out.code.contains("import"), "{}", out.code);
        assert!(!out.code.contains("export"), "{}", out.code);
        assert!(out.code.contains("function A() { return <Star/> }"));
        assert_eq!(
            out.icon_imports,
            vec![IconImport { imported: "Star".into(), local: "Star".into() }]
        );
    }

    #[test]
    fn trailing_export_on_shared_line_is_removed() {
        let src = "function Card() { return null }; export default Card; export { Card };";
        let out = normalize(src, PACKAGES).unwrap();
        assert!(!out.code.contains("export"), "{}", out.code);
        assert!(out.code.starts_with("function Card() { return null }"));
    }

    #[test]
    fn multiline_import_is_removed() {
        let src = "import {\n  ArrowRight,\n  Check,\n} from 'lucide-react';\nfunction Cta() { return <ArrowRight />; }\n";
        let out = normalize(src, PACKAGES).unwrap();
        assert!(!out.code.contains("lucide"));
        assert_eq!(out.icon_imports.len(), 2);
        assert_eq!(out.component, "Cta");
    }

    #[test]
    fn trailing_default_export_is_removed() {
        let src = "function Card() { return <div/>; }\n\nexport default Card;\n";
        let out = normalize(src, PACKAGES).unwrap();
        assert!(!out.code.contains("export"));
        assert!(!out.code.contains("default"));
        assert_eq!(out.component, "Card");
    }

    #[test]
    fn export_lists_are_removed() {
        let src = "function A() { return null; }\nexport { A };\nexport * from './x';\n";
        let out = normalize(src, PACKAGES).unwrap();
        assert!(!out.code.contains("export"));
    }

    #[test]
    fn first_function_wins() {
        let src = "function Helper() { return 1; }\nexport default function Page() { return <Helper/>; }";
        let out = normalize(src, PACKAGES).unwrap();
        assert_eq!(out.component, "Helper");
    }

    #[test]
    fn arrow_component_fails() {
        let err = normalize("const X = () => <div/>", PACKAGES).unwrap_err();
        assert!(matches!(err, Error::NoComponentFunction(_)));
        assert!(err.to_string().contains("No component function found"));
    }

    #[test]
    fn anonymous_default_export_fails() {
        let err = normalize("export default function () { return null }", PACKAGES).unwrap_err();
        assert!(matches!(err, Error::NoComponentFunction(_)));
    }

    #[test]
    fn imports_from_other_packages_are_not_icons() {
        let src = "import { Star } from 'some-other-icons';\nfunction A() { return null }";
        let out = normalize(src, PACKAGES).unwrap();
        assert!(out.icon_imports.is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let src = "import { Star } from 'lucide-react';\nexport function Rating() { return <Star/>; }\nexport default Rating;\n";
        let once = normalize(src, PACKAGES).unwrap();
        let twice = normalize(&once.code, PACKAGES).unwrap();
        assert_eq!(once.code, twice.code);
        assert_eq!(once.component, twice.component);
    }

    #[test]
    fn clean_source_is_untouched() {
        let src = "function Badge() {\n  return <span>Hi</span>;\n}\n";
        let out = normalize(src, PACKAGES).unwrap();
        assert_eq!(out.code, src);
    }

    #[test]
    fn generic_function_is_recognized() {
        let out = normalize("function List<T>(props: { items: T[] }) { return null }", PACKAGES).unwrap();
        assert_eq!(out.component, "List");
    }

    #[test]
    fn identifier_check() {
        assert!(is_identifier("MyStar"));
        assert!(is_identifier("$icon_2"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("a-b"));
    }
}
