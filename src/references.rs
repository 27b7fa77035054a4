//! Reference, caller, and usage tracking.
//!
//! Occurrences come from the syntax trees, not text search: identifier leaf
//! nodes are matched by name while comment and plain-string subtrees are
//! pruned wholesale, so documentation and string constants never produce
//! hits. Interpolated strings are walked — the expressions inside `$"{...}"`
//! are real references.

use std::path::PathBuf;
use tree_sitter::Node;

use crate::error::{Error, Result};
use crate::model::{node_text, Document, SymbolKind};
use crate::resolver;
use crate::workspace::{CancelToken, SolutionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefMode {
    All,
    Callers,
    Usages,
}

impl RefMode {
    pub fn parse(s: &str) -> Result<RefMode> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(RefMode::All),
            "callers" => Ok(RefMode::Callers),
            "usages" => Ok(RefMode::Usages),
            other => Err(Error::invalid_input(format!(
                "unknown reference mode `{other}` (expected all, callers, or usages)"
            ))),
        }
    }
}

/// One reference site. `line`/`column` are 0-based here; the formatter
/// renders them 1-based.
#[derive(Debug, Clone)]
pub struct ReferenceHit {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub snippet: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
    pub containing_symbol: Option<String>,
    pub project: String,
}

/// Find references to `symbol_name` across the solution.
///
/// `callers` mode requires a method-kind symbol and inspects invocation
/// callees only (a superset of call sites per the caller-finder contract);
/// `all` and `usages` count every identifier occurrence.
pub fn find_references(
    handle: &SolutionHandle,
    symbol_name: &str,
    containing_type: Option<&str>,
    project_scope: Option<&str>,
    full_detail: bool,
    mode: RefMode,
    cancel: &CancelToken,
) -> Result<Vec<ReferenceHit>> {
    // Resolve first: a missing or ambiguous name should fail the request, not
    // return an empty listing.
    let resolved = resolver::resolve_symbol(handle, symbol_name, containing_type)?;
    if mode == RefMode::Callers && resolved.kind() != SymbolKind::Method {
        return Err(Error::invalid_input(format!(
            "`{symbol_name}` is a {}, callers mode requires a method",
            resolved.kind().as_str()
        )));
    }

    let mut hits: Vec<ReferenceHit> = Vec::new();
    let mut seen: std::collections::HashSet<(String, usize, usize)> =
        std::collections::HashSet::new();

    for compilation in &handle.compilations {
        if let Some(scope) = project_scope {
            if compilation.project_name != scope {
                continue;
            }
        }
        cancel.check()?;

        for doc in &compilation.documents {
            // Fast pre-filter before walking the tree.
            if !doc.text.contains(symbol_name) {
                continue;
            }

            let nodes = match mode {
                RefMode::All | RefMode::Usages => identifier_occurrences(doc, symbol_name),
                RefMode::Callers => invocations_of(doc, symbol_name)
                    .into_iter()
                    .map(|(_, callee)| callee)
                    .collect(),
            };

            for node in nodes {
                let (line, column) = doc.line_col(node.start_byte());
                let key = (
                    doc.path.to_string_lossy().to_lowercase(),
                    line,
                    column,
                );
                if !seen.insert(key) {
                    continue;
                }

                let (context_before, context_after) = if full_detail {
                    context_window(doc, line, 2)
                } else {
                    (vec![], vec![])
                };

                hits.push(ReferenceHit {
                    path: doc.path.clone(),
                    line,
                    column,
                    snippet: doc.line_text(line).trim().to_string(),
                    context_before,
                    context_after,
                    containing_symbol: enclosing_symbol(node, &doc.text),
                    project: compilation.project_name.clone(),
                });
            }
        }
    }

    hits.sort_by(|a, b| (&a.path, a.line, a.column).cmp(&(&b.path, b.line, b.column)));
    Ok(hits)
}

/// Node kinds whose subtrees can never contain a semantic reference.
fn prunes_subtree(kind: &str) -> bool {
    kind == "comment"
        || matches!(
            kind,
            "string_literal" | "raw_string_literal" | "verbatim_string_literal" | "char_literal"
        )
}

/// All identifier leaf nodes spelling `name`, outside comments and plain
/// string literals.
pub fn identifier_occurrences<'t>(doc: &'t Document, name: &str) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    collect_identifiers(doc.root(), &doc.text, name, &mut out);
    out
}

fn collect_identifiers<'t>(node: Node<'t>, text: &str, name: &str, out: &mut Vec<Node<'t>>) {
    if prunes_subtree(node.kind()) {
        return;
    }
    if node.child_count() == 0 {
        if node.kind() == "identifier" && node_text(node, text) == name {
            out.push(node);
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_identifiers(child, text, name, out);
    }
}

/// Invocation expressions whose callee is `name`. Returns
/// `(invocation, callee-name-node)` pairs; the callee node carries the hit
/// position, the invocation node carries the argument list.
pub fn invocations_of<'t>(doc: &'t Document, name: &str) -> Vec<(Node<'t>, Node<'t>)> {
    let mut out = Vec::new();
    collect_invocations(doc.root(), &doc.text, name, &mut out);
    out
}

fn collect_invocations<'t>(
    node: Node<'t>,
    text: &str,
    name: &str,
    out: &mut Vec<(Node<'t>, Node<'t>)>,
) {
    if prunes_subtree(node.kind()) {
        return;
    }
    if node.kind() == "invocation_expression" {
        if let Some(callee) = callee_name_node(node) {
            if node_text(callee, text) == name {
                out.push((node, callee));
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_invocations(child, text, name, out);
    }
}

/// The name node of an invocation callee: `Foo(...)`, `x.Foo(...)`,
/// `x.Foo<T>(...)`, `x?.Foo(...)`.
fn callee_name_node(invocation: Node<'_>) -> Option<Node<'_>> {
    let function = invocation.child_by_field_name("function")?;
    name_of_callee_expr(function)
}

fn name_of_callee_expr(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "identifier" => Some(node),
        "generic_name" => node.named_child(0),
        "member_access_expression" | "member_binding_expression" => {
            let name = node.child_by_field_name("name")?;
            name_of_callee_expr(name)
        }
        _ => None,
    }
}

/// ±`n` trimmed lines around `line0` (excluding the hit line itself).
fn context_window(doc: &Document, line0: usize, n: usize) -> (Vec<String>, Vec<String>) {
    let start = line0.saturating_sub(n);
    let before = (start..line0)
        .map(|l| doc.line_text(l).trim_end().to_string())
        .collect();
    let total = doc.line_count();
    let end = (line0 + n + 1).min(total);
    let after = (line0 + 1..end)
        .map(|l| doc.line_text(l).trim_end().to_string())
        .collect();
    (before, after)
}

fn is_member_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "method_declaration"
            | "constructor_declaration"
            | "destructor_declaration"
            | "property_declaration"
            | "indexer_declaration"
            | "event_declaration"
            | "operator_declaration"
            | "field_declaration"
            | "event_field_declaration"
    )
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "struct_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "record_struct_declaration"
    )
}

/// Render the declaration enclosing `node` in minimally-qualified form:
/// `Type.Member`, nested types joined with dots, bare `Type` outside members.
pub fn enclosing_symbol(node: Node<'_>, text: &str) -> Option<String> {
    let mut member: Option<String> = None;
    let mut type_chain: Vec<String> = Vec::new();

    let mut current = node.parent();
    while let Some(n) = current {
        let kind = n.kind();
        if member.is_none() && type_chain.is_empty() && is_member_declaration(kind) {
            member = declaration_name(n, text);
        } else if is_type_declaration(kind) {
            if let Some(name) = declaration_name(n, text) {
                type_chain.push(name);
            }
        }
        current = n.parent();
    }

    if type_chain.is_empty() && member.is_none() {
        return None;
    }
    type_chain.reverse();
    let mut parts = type_chain;
    if let Some(m) = member {
        parts.push(m);
    }
    Some(parts.join("."))
}

fn declaration_name(node: Node<'_>, text: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(name, text).to_string());
    }
    // field/event-field declarations: first declarator name.
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "variable_declaration" {
            let mut inner = child.walk();
            for declarator in child.named_children(&mut inner) {
                if declarator.kind() == "variable_declarator" {
                    if let Some(n) = declarator
                        .child_by_field_name("name")
                        .or_else(|| declarator.named_child(0))
                    {
                        return Some(node_text(n, text).to_string());
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceManager;
    use tempfile::TempDir;

    fn solution(files: &[(&str, &str)]) -> (TempDir, std::sync::Arc<SolutionHandle>) {
        let tmp = TempDir::new().unwrap();
        let csproj = tmp.path().join("App.csproj");
        std::fs::write(&csproj, "<Project Sdk=\"Microsoft.NET.Sdk\"></Project>").unwrap();
        for (name, content) in files {
            std::fs::write(tmp.path().join(name), content).unwrap();
        }
        let ws = WorkspaceManager::new();
        let handle = ws.acquire(&csproj, &CancelToken::new()).unwrap();
        (tmp, handle)
    }

    const LIB: &str = r#"namespace N
{
    public class Greeter
    {
        public string Hello(string name) { return name; }
    }

    public class App
    {
        public void Run()
        {
            var g = new Greeter();
            // Hello in a comment is not a reference.
            var s = "Hello in a string is not a reference";
            g.Hello("world");
        }
    }
}
"#;

    #[test]
    fn comments_and_strings_are_pruned() {
        let (_tmp, handle) = solution(&[("Lib.cs", LIB)]);
        let hits = find_references(
            &handle,
            "Hello",
            None,
            None,
            false,
            RefMode::All,
            &CancelToken::new(),
        )
        .unwrap();
        // Declaration + one call site; not the comment, not the string.
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn callers_mode_returns_invocation_sites_only() {
        let (_tmp, handle) = solution(&[("Lib.cs", LIB)]);
        let hits = find_references(
            &handle,
            "Hello",
            None,
            None,
            true,
            RefMode::Callers,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].containing_symbol.as_deref(), Some("App.Run"));
        assert!(hits[0].snippet.contains("g.Hello"));
        assert!(!hits[0].context_before.is_empty());
    }

    #[test]
    fn callers_mode_rejects_non_methods() {
        let (_tmp, handle) = solution(&[("Lib.cs", LIB)]);
        let err = find_references(
            &handle,
            "Greeter",
            None,
            None,
            false,
            RefMode::Callers,
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn hits_sort_by_file_then_line() {
        let (_tmp, handle) = solution(&[
            ("A.cs", "namespace N { public class A { public void Ping() { } } }"),
            (
                "B.cs",
                "namespace N { public class B { void R(A a) { a.Ping(); a.Ping(); } } }",
            ),
        ]);
        let hits = find_references(
            &handle,
            "Ping",
            None,
            None,
            false,
            RefMode::All,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(hits.len(), 3);
        let mut sorted = hits.clone();
        sorted.sort_by(|a, b| (&a.path, a.line, a.column).cmp(&(&b.path, b.line, b.column)));
        assert_eq!(
            hits.iter().map(|h| (&h.path, h.line)).collect::<Vec<_>>(),
            sorted.iter().map(|h| (&h.path, h.line)).collect::<Vec<_>>()
        );
    }
}
