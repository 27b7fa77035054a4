//! Read-only query surface: symbol search, outlines, hierarchy walks,
//! project/diagnostic listings.
//!
//! Queries return empty listings rather than failing when nothing matches;
//! resolution-style operations (hierarchy, overrides) fail with the usual
//! kinds. Implicitly-declared symbols never surface.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::format::{self, SymbolResult};
use crate::model::{Compilation, Diagnostic, MemberSymbol, SymbolKind, TypeSymbol};
use crate::paths;
use crate::resolver::{self, TypeRef};
use crate::workspace::SolutionHandle;

// ─────────────────────────────────────────────────────────────────────────────
// Symbol search
// ─────────────────────────────────────────────────────────────────────────────

fn symbol_result_for_type(
    handle: &SolutionHandle,
    compilation: &Compilation,
    ty: &TypeSymbol,
    full: bool,
) -> SymbolResult {
    SymbolResult {
        name: ty.name.clone(),
        fqn: ty.fqn.clone(),
        kind: ty.kind.as_str(),
        signature: format::type_signature(ty),
        path: paths::display_relative(&ty.location.path, handle.dir()),
        line: ty.location.line + 1,
        doc_summary: ty.doc_summary.clone(),
        source_body: full.then(|| source_span(compilation, ty.location.start_byte, ty.location.end_byte, &ty.location.path)).flatten(),
    }
}

fn symbol_result_for_member(
    handle: &SolutionHandle,
    compilation: &Compilation,
    ty: &TypeSymbol,
    member: &MemberSymbol,
    full: bool,
) -> SymbolResult {
    SymbolResult {
        name: member.name.clone(),
        fqn: format!("{}.{}", ty.fqn, member.name),
        kind: member.kind.as_str(),
        signature: format::member_signature(member),
        path: paths::display_relative(&member.location.path, handle.dir()),
        line: member.location.line + 1,
        doc_summary: member.doc_summary.clone(),
        source_body: full
            .then(|| {
                source_span(
                    compilation,
                    member.location.start_byte,
                    member.location.end_byte,
                    &member.location.path,
                )
            })
            .flatten(),
    }
}

fn source_span(
    compilation: &Compilation,
    start: usize,
    end: usize,
    path: &Path,
) -> Option<String> {
    let doc = compilation.document(path)?;
    doc.text.get(start..end).map(str::to_string)
}

/// Case-insensitive substring search (or exact-name match) across every
/// compilation, deduplicated by `(fully qualified display, kind)`.
pub fn find_symbols(
    handle: &SolutionHandle,
    query: &str,
    kind: Option<SymbolKind>,
    exact: bool,
    full: bool,
) -> Vec<SymbolResult> {
    let needle = query.to_lowercase();
    let matches = |name: &str| {
        if exact {
            name == query
        } else {
            name.to_lowercase().contains(&needle)
        }
    };

    let mut seen: BTreeSet<(String, &'static str)> = BTreeSet::new();
    let mut out: Vec<SymbolResult> = Vec::new();

    for t in resolver::all_named_types(handle) {
        if t.ty.is_implicit() {
            continue;
        }
        if kind.map(|k| k == t.ty.kind).unwrap_or(true) && matches(&t.ty.name) {
            if seen.insert((t.ty.fqn.clone(), t.ty.kind.as_str())) {
                out.push(symbol_result_for_type(handle, t.compilation, t.ty, full));
            }
        }
        for member in t.ty.visible_members() {
            if !kind.map(|k| k == member.kind).unwrap_or(true) {
                continue;
            }
            if !matches(&member.name) {
                continue;
            }
            let fqn = format!("{}.{}", t.ty.fqn, member.name);
            if seen.insert((fqn, member.kind.as_str())) {
                out.push(symbol_result_for_member(
                    handle,
                    t.compilation,
                    t.ty,
                    member,
                    full,
                ));
            }
        }
    }

    out.sort_by(|a, b| (&a.path, a.line).cmp(&(&b.path, b.line)));
    out
}

/// Top-level type declarations of one file; `depth = 1` expands members.
pub fn file_symbols(
    handle: &SolutionHandle,
    file_path: &Path,
    depth: u8,
    full: bool,
) -> Result<Vec<SymbolResult>> {
    let (compilation, doc) = handle
        .document(file_path)
        .ok_or_else(|| Error::not_found(format!("document {}", file_path.display())))?;

    let mut out = Vec::new();
    for ty in &compilation.types {
        if ty.is_implicit() || !paths::eq_ignore_case(&ty.location.path, &doc.path) {
            continue;
        }
        out.push(symbol_result_for_type(handle, compilation, ty, full));
        if depth >= 1 {
            for member in ty.visible_members() {
                out.push(symbol_result_for_member(
                    handle,
                    compilation,
                    ty,
                    member,
                    full,
                ));
            }
        }
    }
    out.sort_by(|a, b| a.line.cmp(&b.line));
    Ok(out)
}

/// All members of a resolved type, compiler-generated entries excluded.
pub fn type_members(
    handle: &SolutionHandle,
    type_name: &str,
    full: bool,
) -> Result<Vec<SymbolResult>> {
    let t = resolver::resolve_type(handle, type_name)?;
    Ok(t.ty
        .visible_members()
        .map(|m| symbol_result_for_member(handle, t.compilation, t.ty, m, full))
        .collect())
}

/// Distinct namespaces containing source-defined types; the global namespace
/// is not listed.
pub fn list_namespaces(handle: &SolutionHandle) -> Vec<String> {
    let mut set: BTreeSet<String> = BTreeSet::new();
    for t in resolver::all_named_types(handle) {
        if !t.ty.is_implicit() && !t.ty.namespace.is_empty() {
            set.insert(t.ty.namespace.clone());
        }
    }
    set.into_iter().collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Hierarchy
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TypeHierarchy {
    pub name: String,
    pub kind: &'static str,
    /// Nearest first, universal root label last.
    pub base_types: Vec<String>,
    /// Transitive interface set, sorted.
    pub interfaces: Vec<String>,
}

fn is_universal_root(name: &str) -> bool {
    matches!(name, "object" | "Object" | "System.Object")
}

/// Strip a generic argument list from a base-list entry: `IHandler<int>` →
/// `IHandler`.
fn base_entry_name(entry: &str) -> &str {
    entry.split('<').next().unwrap_or(entry).trim()
}

fn lookup_type<'a>(handle: &'a SolutionHandle, name: &str) -> Option<TypeRef<'a>> {
    resolver::all_named_types(handle)
        .into_iter()
        .find(|t| t.ty.name == name || t.ty.fqn == name)
}

/// Metadata base entries (unresolvable in the solution) are classified by
/// the `I`-prefix convention: `IDisposable` is an interface, `Exception` a
/// base class.
fn looks_like_interface(name: &str) -> bool {
    let short = base_entry_name(name).rsplit('.').next().unwrap_or(name);
    let mut chars = short.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('I'), Some(c)) if c.is_ascii_uppercase()
    )
}

/// Split a type's base list into (base class, direct interfaces).
fn split_base_list<'a>(
    handle: &'a SolutionHandle,
    ty: &TypeSymbol,
) -> (Option<(String, Option<TypeRef<'a>>)>, Vec<String>) {
    let mut base_class = None;
    let mut interfaces = Vec::new();

    for (i, entry) in ty.base_list.iter().enumerate() {
        let name = base_entry_name(entry);
        if is_universal_root(name) {
            continue;
        }
        match lookup_type(handle, name) {
            Some(t) if t.ty.kind == SymbolKind::Interface => interfaces.push(t.ty.name.clone()),
            Some(t) => {
                if base_class.is_none() {
                    base_class = Some((t.ty.name.clone(), Some(t)));
                }
            }
            None => {
                // Only the first entry can be a class in C#; later entries
                // are interfaces by grammar.
                if i == 0 && !looks_like_interface(name) && ty.kind != SymbolKind::Interface {
                    base_class = Some((name.to_string(), None));
                } else {
                    interfaces.push(name.to_string());
                }
            }
        }
    }
    (base_class, interfaces)
}

/// Walk the base chain to just before the universal root, then append the
/// root label; collect the transitive interface set.
pub fn type_hierarchy(handle: &SolutionHandle, type_name: &str) -> Result<TypeHierarchy> {
    let start = resolver::resolve_type(handle, type_name)?;

    let mut base_types = Vec::new();
    let mut interfaces: BTreeSet<String> = BTreeSet::new();

    // Direct + inherited interfaces, following resolvable edges.
    let mut to_visit: Vec<TypeRef<'_>> = vec![start];
    let mut chain_cursor = Some(start);
    let mut hops = 0usize;
    while let Some(current) = chain_cursor.take() {
        // Defensive bound; source nesting is acyclic but base lists are text.
        hops += 1;
        if hops > 64 {
            break;
        }
        let (base, _ifaces) = split_base_list(handle, current.ty);
        if let Some((name, resolved)) = base {
            base_types.push(name);
            if let Some(next) = resolved {
                to_visit.push(next);
                chain_cursor = Some(next);
            }
        }
    }

    let mut iface_hops = 0usize;
    while let Some(current) = to_visit.pop() {
        iface_hops += 1;
        if iface_hops > 256 {
            break;
        }
        let (_, ifaces) = split_base_list(handle, current.ty);
        for name in ifaces {
            if interfaces.insert(name.clone()) {
                if let Some(t) = lookup_type(handle, &name) {
                    to_visit.push(t);
                }
            }
        }
    }

    if !matches!(start.ty.kind, SymbolKind::Interface | SymbolKind::Enum) {
        base_types.push("object".to_string());
    }

    Ok(TypeHierarchy {
        name: start.ty.name.clone(),
        kind: start.ty.kind.as_str(),
        base_types,
        interfaces: interfaces.into_iter().collect(),
    })
}

/// Transitive derived types of a class, or implementations of an interface.
pub fn find_derived_types(handle: &SolutionHandle, type_name: &str) -> Result<Vec<SymbolResult>> {
    let target = resolver::resolve_type(handle, type_name)?;
    match target.ty.kind {
        SymbolKind::Interface => {}
        SymbolKind::Class | SymbolKind::Record => {}
        other => {
            return Err(Error::invalid_input(format!(
                "`{type_name}` is a {}; derived-type walks need a class or interface",
                other.as_str()
            )))
        }
    }

    let mut result = Vec::new();
    let mut frontier: Vec<String> = vec![target.ty.name.clone()];
    let mut matched: BTreeSet<String> = BTreeSet::new();

    while let Some(current) = frontier.pop() {
        for t in resolver::all_named_types(handle) {
            if t.ty.is_implicit() {
                continue;
            }
            let inherits = t
                .ty
                .base_list
                .iter()
                .any(|e| base_entry_name(e) == current);
            if inherits && matched.insert(t.ty.fqn.clone()) {
                // Interface implementations are reported flat; class
                // hierarchies recurse so grandchildren appear too.
                if target.ty.kind != SymbolKind::Interface {
                    frontier.push(t.ty.name.clone());
                }
                result.push(symbol_result_for_type(handle, t.compilation, t.ty, false));
            }
        }
    }

    result.sort_by(|a, b| (&a.path, a.line).cmp(&(&b.path, b.line)));
    Ok(result)
}

/// Overrides of a virtual/abstract method in derived types.
pub fn find_overrides(
    handle: &SolutionHandle,
    type_name: &str,
    method_name: &str,
) -> Result<Vec<SymbolResult>> {
    let owner = resolver::resolve_type(handle, type_name)?;
    let target = owner
        .ty
        .methods()
        .find(|m| m.name == method_name)
        .ok_or_else(|| {
            Error::not_found(format!("method `{method_name}` on `{}`", owner.ty.fqn))
        })?;
    if !target.is_overridable() {
        return Err(Error::invalid_input(format!(
            "`{method_name}` is neither virtual, abstract, nor an override"
        )));
    }

    let derived = find_derived_types(handle, type_name)?;
    let mut out = Vec::new();
    for d in derived {
        if let Some(t) = lookup_type(handle, &d.fqn) {
            for m in t.ty.methods() {
                if m.name == method_name && m.modifiers.iter().any(|x| x == "override") {
                    out.push(symbol_result_for_member(handle, t.compilation, t.ty, m, false));
                }
            }
        }
    }
    out.sort_by(|a, b| (&a.path, a.line).cmp(&(&b.path, b.line)));
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Project listings & diagnostics
// ─────────────────────────────────────────────────────────────────────────────

pub fn list_projects(handle: &SolutionHandle) -> String {
    let solution_name = handle
        .layout
        .path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "solution".to_string());

    let mut out = format!(
        "{} ({} project{})\n",
        solution_name,
        handle.layout.projects.len(),
        if handle.layout.projects.len() == 1 { "" } else { "s" }
    );
    for p in &handle.layout.projects {
        out.push_str(&format!(
            "  {} [{} / {}] — {} source file{}\n",
            p.name,
            if p.target_framework.is_empty() { "?" } else { &p.target_framework },
            p.output_type,
            p.documents.len(),
            if p.documents.len() == 1 { "" } else { "s" }
        ));
    }
    out
}

pub fn project_info(handle: &SolutionHandle, project_name: &str) -> Result<String> {
    let p = handle.project(project_name)?;
    let mut out = String::new();
    out.push_str(&format!("Project: {}\n", p.name));
    out.push_str(&format!(
        "File: {}\n",
        paths::display_relative(&p.path, handle.dir())
    ));
    out.push_str(&format!(
        "Framework: {}\n",
        if p.target_framework.is_empty() { "(unspecified)" } else { &p.target_framework }
    ));
    out.push_str(&format!("Output type: {}\n", p.output_type));
    out.push_str(&format!("Source files: {}\n", p.documents.len()));
    if !p.project_references.is_empty() {
        out.push_str(&format!(
            "Project references: {}\n",
            p.project_references.join(", ")
        ));
    }
    if !p.package_references.is_empty() {
        out.push_str("Packages:\n");
        for pkg in &p.package_references {
            out.push_str(&format!("  {} {}\n", pkg.id, pkg.version));
        }
    }
    Ok(out)
}

pub fn source_files(handle: &SolutionHandle, project_name: Option<&str>) -> Result<String> {
    let projects: Vec<_> = match project_name {
        Some(name) => vec![handle.project(name)?],
        None => handle.layout.projects.iter().collect(),
    };
    let mut out = String::new();
    for p in projects {
        out.push_str(&format!("{}:\n", p.name));
        for d in &p.documents {
            out.push_str(&format!("  {}\n", paths::display_relative(d, handle.dir())));
        }
    }
    if out.is_empty() {
        out.push_str("(no source files)\n");
    }
    Ok(out)
}

/// Warning-or-higher diagnostics, errors first, then (file, line).
pub fn diagnostics(handle: &SolutionHandle, project_name: Option<&str>) -> Result<String> {
    let mut all: Vec<&Diagnostic> = Vec::new();
    for c in &handle.compilations {
        if let Some(name) = project_name {
            if c.project_name != name {
                continue;
            }
        }
        all.extend(c.diagnostics.iter());
    }
    if project_name.is_some() && all.is_empty() {
        // Verify the project exists so a typo is NotFound, not "clean".
        if let Some(name) = project_name {
            handle.project(name)?;
        }
    }

    all.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| (&a.path, a.line).cmp(&(&b.path, b.line)))
    });

    if all.is_empty() {
        return Ok("(no diagnostics)\n".to_string());
    }
    let mut out = format!("{} diagnostic(s):\n", all.len());
    for d in &all {
        out.push_str(&format!(
            "{} {}: {} [{}]\n",
            d.severity.as_str(),
            d.id,
            d.message,
            paths::location_text(&d.path, handle.dir(), d.line)
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{CancelToken, WorkspaceManager};
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

    #[test]
    fn exact_search_dedupes_by_display_and_kind() {
        let (_tmp, handle) = solution(&[(
            "G.cs",
            "namespace N { public class Greeter { public string Hello() { return \"\"; } } }",
        )]);
        let hits = find_symbols(&handle, "Hello", None, true, false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, "method");
        assert!(hits[0].signature.starts_with("public"));
        assert!(hits[0].line >= 1);
    }

    #[test]
    fn substring_search_is_case_insensitive() {
        let (_tmp, handle) = solution(&[(
            "G.cs",
            "namespace N { public class Greeter { } public class Regret { } }",
        )]);
        let hits = find_symbols(&handle, "greet", None, false, false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Greeter");
    }

    #[test]
    fn hierarchy_walks_to_object() {
        let (_tmp, handle) = solution(&[(
            "H.cs",
            "namespace N { public class B { } public class A : B { } }",
        )]);
        let h = type_hierarchy(&handle, "A").unwrap();
        assert_eq!(h.base_types, vec!["B".to_string(), "object".to_string()]);
        assert!(h.interfaces.is_empty());
    }

    #[test]
    fn hierarchy_collects_transitive_interfaces() {
        let (_tmp, handle) = solution(&[(
            "H.cs",
            "namespace N { public interface IBase { } public interface IDerived : IBase { } public class C : IDerived { } }",
        )]);
        let h = type_hierarchy(&handle, "C").unwrap();
        assert_eq!(h.interfaces, vec!["IBase".to_string(), "IDerived".to_string()]);
    }

    #[test]
    fn derived_types_distinguish_interface_and_class() {
        let (_tmp, handle) = solution(&[(
            "D.cs",
            "namespace N { public interface IShape { } public class Shape : IShape { } public class Circle : Shape { } public enum E { } }",
        )]);
        let impls = find_derived_types(&handle, "IShape").unwrap();
        assert_eq!(impls.len(), 1);
        let derived = find_derived_types(&handle, "Shape").unwrap();
        assert_eq!(derived.len(), 1);
        assert!(matches!(
            find_derived_types(&handle, "E"),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn overrides_require_overridable_target() {
        let (_tmp, handle) = solution(&[(
            "O.cs",
            "namespace N { public class Base { public virtual void M() { } public void P() { } } public class Kid : Base { public override void M() { } } }",
        )]);
        let o = find_overrides(&handle, "Base", "M").unwrap();
        assert_eq!(o.len(), 1);
        assert!(matches!(
            find_overrides(&handle, "Base", "P"),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn global_namespace_types_are_not_listed() {
        let (_tmp, handle) = solution(&[(
            "NS.cs",
            "public class Global { } namespace Inner.Deep { public class X { } }",
        )]);
        assert_eq!(list_namespaces(&handle), vec!["Inner.Deep".to_string()]);
    }

    #[test]
    fn empty_solution_lists_zero_projects() {
        let tmp = TempDir::new().unwrap();
        let sln = tmp.path().join("Empty.sln");
        std::fs::write(&sln, "Microsoft Visual Studio Solution File, Format Version 12.00\n").unwrap();
        let ws = WorkspaceManager::new();
        let handle = ws.acquire(&sln, &CancelToken::new()).unwrap();
        assert!(list_projects(&handle).contains("(0 projects)"));
        assert!(find_symbols(&handle, "x", None, false, false).is_empty());
    }
}
