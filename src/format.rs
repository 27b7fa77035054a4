//! Line-oriented text output.
//!
//! Everything a tool returns is plain LF-separated text meant for an LLM, not
//! a machine-parseable schema. The contracts here are normative:
//!  - signature text: lower-case visibility first, modifiers in canonical
//!    order, return type, name, `, `-separated parameter list
//!  - location text: `<path>:<line>` with a 1-based line; the snippet
//!    variant appends ` - <trimmed line>`
//!  - compact listings are one line per entity; full listings add indented
//!    doc-summary and source-body sub-lines.

use crate::model::{MemberSymbol, Parameter, SymbolKind, TypeSymbol};
use crate::references::ReferenceHit;
use std::path::Path;

use crate::paths;

/// Transport form of a symbol: everything already stringified and relative,
/// lines 1-based. Built per query, never cached.
#[derive(Debug, Clone)]
pub struct SymbolResult {
    pub name: String,
    pub fqn: String,
    pub kind: &'static str,
    pub signature: String,
    pub path: String,
    pub line: usize,
    pub doc_summary: Option<String>,
    pub source_body: Option<String>,
}

/// Canonical method modifier order; anything else keeps declaration order
/// after these.
const METHOD_MODIFIER_ORDER: &[&str] = &["static", "async", "virtual", "override", "abstract", "sealed"];
const TYPE_MODIFIER_ORDER: &[&str] = &["abstract", "sealed", "static"];

fn ordered_modifiers(modifiers: &[String], canonical: &[&str]) -> Vec<String> {
    let accessibility = ["public", "private", "protected", "internal"];
    let mut out: Vec<String> = canonical
        .iter()
        .filter(|c| modifiers.iter().any(|m| m == *c))
        .map(|c| c.to_string())
        .collect();
    for m in modifiers {
        if accessibility.contains(&m.as_str()) {
            continue;
        }
        if !out.iter().any(|x| x == m) {
            out.push(m.clone());
        }
    }
    out
}

pub fn parameter_text(p: &Parameter) -> String {
    let mut out = String::new();
    for m in &p.modifiers {
        out.push_str(m);
        out.push(' ');
    }
    out.push_str(&p.ty);
    if !p.name.is_empty() {
        out.push(' ');
        out.push_str(&p.name);
    }
    if let Some(d) = &p.default_value {
        out.push_str(" = ");
        out.push_str(d);
    }
    out
}

pub fn parameter_list_text(params: &[Parameter]) -> String {
    let parts: Vec<String> = params.iter().map(parameter_text).collect();
    format!("({})", parts.join(", "))
}

fn type_parameter_suffix(type_parameters: &[String]) -> String {
    if type_parameters.is_empty() {
        String::new()
    } else {
        format!("<{}>", type_parameters.join(", "))
    }
}

/// `public static string Hello(string name, int times = 1)`
pub fn member_signature(member: &MemberSymbol) -> String {
    let mut parts: Vec<String> = vec![member.accessibility.to_lowercase()];
    parts.extend(ordered_modifiers(&member.modifiers, METHOD_MODIFIER_ORDER));

    match member.kind {
        SymbolKind::Method => {
            parts.push(member.ty.clone());
            parts.push(format!(
                "{}{}{}",
                member.name,
                type_parameter_suffix(&member.type_parameters),
                parameter_list_text(&member.parameters)
            ));
        }
        SymbolKind::Constructor => {
            parts.push(format!(
                "{}{}",
                member.name,
                parameter_list_text(&member.parameters)
            ));
        }
        SymbolKind::Property => {
            parts.push(member.ty.clone());
            let accessors = if member.accessors.is_empty() {
                "{ get; }".to_string()
            } else {
                format!(
                    "{{ {} }}",
                    member
                        .accessors
                        .iter()
                        .map(|a| format!("{a};"))
                        .collect::<Vec<_>>()
                        .join(" ")
                )
            };
            parts.push(format!("{} {}", member.name, accessors));
        }
        SymbolKind::Event => {
            parts.push("event".to_string());
            parts.push(member.ty.clone());
            parts.push(member.name.clone());
        }
        _ => {
            // fields, enum members
            if !member.ty.is_empty() {
                parts.push(member.ty.clone());
            }
            parts.push(member.name.clone());
        }
    }

    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

/// `public sealed class Greeter<T> : Base, IGreeter`
pub fn type_signature(ty: &TypeSymbol) -> String {
    let mut parts: Vec<String> = vec![ty.accessibility.to_lowercase()];
    parts.extend(ordered_modifiers(&ty.modifiers, TYPE_MODIFIER_ORDER));
    parts.push(ty.kind.as_str().to_string());
    parts.push(format!(
        "{}{}",
        ty.name,
        type_parameter_suffix(&ty.type_parameters)
    ));
    let mut out = parts.join(" ");
    if !ty.base_list.is_empty() {
        out.push_str(" : ");
        out.push_str(&ty.base_list.join(", "));
    }
    out
}

/// `src/Greeter.cs:12` — and with a snippet, `src/Greeter.cs:12 - code`.
pub fn location_with_snippet(path: &Path, base: &Path, line0: usize, snippet: &str) -> String {
    let loc = paths::location_text(path, base, line0);
    if snippet.is_empty() {
        loc
    } else {
        format!("{loc} - {}", snippet.trim())
    }
}

/// One line per symbol; full adds the doc summary and source body indented
/// beneath.
pub fn render_symbol_list(results: &[SymbolResult], full: bool) -> String {
    if results.is_empty() {
        return "(no symbols)\n".to_string();
    }
    let mut out = String::new();
    for r in results {
        out.push_str(&format!(
            "[{:<11}] {} [{}:{}]\n",
            r.kind, r.signature, r.path, r.line
        ));
        if full {
            if let Some(doc) = &r.doc_summary {
                out.push_str(&format!("    // {doc}\n"));
            }
            if let Some(body) = &r.source_body {
                for line in body.lines() {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
    out
}

pub fn render_reference_list(hits: &[ReferenceHit], base: &Path, full: bool) -> String {
    if hits.is_empty() {
        return "(no references)\n".to_string();
    }
    let mut out = format!("{} reference(s):\n", hits.len());
    for h in hits {
        out.push_str(&location_with_snippet(&h.path, base, h.line, &h.snippet));
        if let Some(sym) = &h.containing_symbol {
            out.push_str(&format!(" (in {sym})"));
        }
        out.push('\n');
        if full {
            for line in &h.context_before {
                out.push_str(&format!("      | {line}\n"));
            }
            out.push_str(&format!("  >>> | {}\n", h.snippet));
            for line in &h.context_after {
                out.push_str(&format!("      | {line}\n"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SymbolLocation;
    use std::path::PathBuf;

    fn loc() -> SymbolLocation {
        SymbolLocation {
            path: PathBuf::from("/r/A.cs"),
            line: 4,
            column: 0,
            start_byte: 0,
            end_byte: 0,
        }
    }

    fn method(modifiers: &[&str]) -> MemberSymbol {
        MemberSymbol {
            name: "Hello".into(),
            kind: SymbolKind::Method,
            accessibility: "public".into(),
            modifiers: modifiers.iter().map(|s| s.to_string()).collect(),
            ty: "string".into(),
            parameters: vec![
                Parameter {
                    name: "name".into(),
                    ty: "string".into(),
                    modifiers: vec![],
                    default_value: None,
                },
                Parameter {
                    name: "times".into(),
                    ty: "int".into(),
                    modifiers: vec![],
                    default_value: Some("1".into()),
                },
            ],
            type_parameters: vec![],
            accessors: vec![],
            attributes: vec![],
            doc_summary: None,
            location: loc(),
            body_span: None,
            param_list_span: None,
            expression_bodied: false,
        }
    }

    #[test]
    fn method_signature_orders_modifiers_canonically() {
        // Declaration order reversed on purpose.
        let sig = member_signature(&method(&["override", "async", "static"]));
        assert_eq!(
            sig,
            "public static async override string Hello(string name, int times = 1)"
        );
    }

    #[test]
    fn parameter_modifiers_and_defaults_render() {
        let p = Parameter {
            name: "value".into(),
            ty: "List<int>".into(),
            modifiers: vec!["ref".into()],
            default_value: None,
        };
        assert_eq!(parameter_text(&p), "ref List<int> value");
    }

    #[test]
    fn snippet_variant_appends_trimmed_line() {
        let s = location_with_snippet(
            Path::new("/r/A.cs"),
            Path::new("/r"),
            4,
            "  var x = 1;  ",
        );
        assert_eq!(s, "A.cs:5 - var x = 1;");
    }

    #[test]
    fn listing_is_one_line_per_entity_when_compact() {
        let results = vec![SymbolResult {
            name: "Hello".into(),
            fqn: "N.A.Hello".into(),
            kind: "method",
            signature: "public string Hello()".into(),
            path: "A.cs".into(),
            line: 5,
            doc_summary: Some("Says hello.".into()),
            source_body: None,
        }];
        let compact = render_symbol_list(&results, false);
        assert_eq!(compact.lines().count(), 1);
        let full = render_symbol_list(&results, true);
        assert!(full.contains("    // Says hello."));
    }
}
