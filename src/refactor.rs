//! Write operations: rename, extract-interface, implement-interface.
//!
//! All three are text splicers over the parsed model: spans come from the
//! syntax trees, replacements are applied within each file in descending
//! start-offset order, and the whole change set is published through the
//! workspace manager in one exclusive window (apply → optional file rename →
//! invalidate).

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tree_sitter::Node;

use crate::error::{Error, Result};
use crate::format;
use crate::model::{node_text, Document, MemberSymbol, SymbolKind, TypeSymbol};
use crate::paths;
use crate::references;
use crate::resolver::{self, Resolved};
use crate::workspace::{CancelToken, FileChange, FileRename, WorkspaceManager};

// ─────────────────────────────────────────────────────────────────────────────
// Shared splicing
// ─────────────────────────────────────────────────────────────────────────────

/// Replace `(start, end, text)` edits in descending start order so earlier
/// offsets stay valid. Overlapping edits keep the later (inner) one.
pub fn splice(original: &str, mut edits: Vec<(usize, usize, String)>) -> String {
    edits.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out = original.to_string();
    let mut last_start: Option<usize> = None;
    for (start, end, replacement) in edits.into_iter().rev() {
        if start > end || end > out.len() {
            continue;
        }
        if let Some(ls) = last_start {
            if end > ls {
                continue;
            }
        }
        out.replace_range(start..end, &replacement);
        last_start = Some(start);
    }
    out
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // One optional leading `@`, then letter-or-underscore, then word chars.
    RE.get_or_init(|| Regex::new(r"^@?[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

pub fn is_valid_identifier(name: &str) -> bool {
    identifier_re().is_match(name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Rename
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct RenameOptions {
    /// Also rewrite whole-word occurrences inside string literals and
    /// comments (XML-doc `cref` text included — doc comments are comments).
    pub include_strings_and_comments: bool,
}

/// Rename a symbol across every reference, renaming the declaring file too
/// when a type owns it. Returns a per-file summary.
pub fn rename(
    ws: &WorkspaceManager,
    path: &Path,
    symbol_name: &str,
    containing_type: Option<&str>,
    new_name: &str,
    options: RenameOptions,
    cancel: &CancelToken,
) -> Result<String> {
    if !is_valid_identifier(new_name) {
        return Err(Error::invalid_input(format!(
            "`{new_name}` is not a valid identifier"
        )));
    }

    let handle = ws.acquire(path, cancel)?;
    let resolved = resolver::resolve_symbol(&handle, symbol_name, containing_type)?;

    let renameable = match &resolved {
        Resolved::Type(t) => t.ty.kind.is_type(),
        Resolved::Member(m) => matches!(
            m.member.kind,
            SymbolKind::Method | SymbolKind::Property | SymbolKind::Field | SymbolKind::Event
        ),
    };
    if !renameable {
        return Err(Error::invalid_input(format!(
            "cannot rename a {}",
            resolved.kind().as_str()
        )));
    }
    let old_name = resolved.name().to_string();

    // A type whose file shares its name moves with it.
    let file_rename = match &resolved {
        Resolved::Type(t) => plan_file_rename(&t.ty.location.path, &old_name, new_name),
        Resolved::Member(_) => None,
    };

    cancel.check()?;

    // One pass per document: splice identifier occurrences (plus literal and
    // comment occurrences when asked).
    let mut changes: Vec<FileChange> = Vec::new();
    let mut changed_files: Vec<PathBuf> = Vec::new();
    for compilation in &handle.compilations {
        for doc in &compilation.documents {
            if !doc.text.contains(old_name.as_str()) {
                continue;
            }
            if changes.iter().any(|c| c.path == doc.path) {
                continue; // already spliced via an overlapping project
            }

            let mut edits: Vec<(usize, usize, String)> = references::identifier_occurrences(doc, &old_name)
                .into_iter()
                .map(|n| (n.start_byte(), n.end_byte(), new_name.to_string()))
                .collect();
            if options.include_strings_and_comments {
                edits.extend(literal_and_comment_edits(doc, &old_name, new_name));
            }
            if edits.is_empty() {
                continue;
            }

            let new_text = splice(&doc.text, edits);
            if new_text == doc.text {
                continue;
            }
            changed_files.push(doc.path.clone());
            changes.push(FileChange {
                path: doc.path.clone(),
                new_text,
            });
        }
    }

    if changes.is_empty() {
        return Ok(format!(
            "Rename `{old_name}` -> `{new_name}`: 0 changed files."
        ));
    }

    ws.apply(path, &changes, file_rename.as_ref(), cancel)?;

    let mut out = format!(
        "Rename `{old_name}` -> `{new_name}`: {} changed file{}.\n",
        changed_files.len(),
        if changed_files.len() == 1 { "" } else { "s" }
    );
    changed_files.sort();
    for f in &changed_files {
        let shown = paths::display_relative(f, handle.dir());
        match &file_rename {
            Some(r) if paths::eq_ignore_case(f, &r.from) => {
                out.push_str(&format!(
                    "  {shown} (renamed to {})\n",
                    paths::display_relative(&r.to, handle.dir())
                ));
            }
            _ => out.push_str(&format!("  {shown}\n")),
        }
    }
    Ok(out)
}

fn plan_file_rename(decl_path: &Path, old_name: &str, new_name: &str) -> Option<FileRename> {
    let stem = decl_path.file_stem()?.to_string_lossy();
    if !stem.eq_ignore_ascii_case(old_name) {
        return None;
    }
    let ext = decl_path.extension()?.to_string_lossy();
    let to = decl_path.with_file_name(format!("{new_name}.{ext}"));
    Some(FileRename {
        from: decl_path.to_path_buf(),
        to,
    })
}

/// Whole-word occurrences of `old` inside string literals and comments.
fn literal_and_comment_edits(
    doc: &Document,
    old: &str,
    new: &str,
) -> Vec<(usize, usize, String)> {
    let mut out = Vec::new();
    collect_literal_edits(doc.root(), doc, old, new, &mut out);
    out
}

fn collect_literal_edits(
    node: Node,
    doc: &Document,
    old: &str,
    new: &str,
    out: &mut Vec<(usize, usize, String)>,
) {
    let kind = node.kind();
    if kind == "comment"
        || matches!(
            kind,
            "string_literal" | "verbatim_string_literal" | "raw_string_literal" | "interpolated_string_text"
        )
    {
        let base = node.start_byte();
        let text = node_text(node, &doc.text);
        for (offset, _) in text.match_indices(old) {
            if !is_whole_word(text, offset, old.len()) {
                continue;
            }
            out.push((base + offset, base + offset + old.len(), new.to_string()));
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_literal_edits(child, doc, old, new, out);
    }
}

fn is_whole_word(text: &str, offset: usize, len: usize) -> bool {
    let is_word = |b: u8| b == b'_' || b.is_ascii_alphanumeric();
    let bytes = text.as_bytes();
    let before_ok = offset == 0 || !is_word(bytes[offset - 1]);
    let after_ok = offset + len >= bytes.len() || !is_word(bytes[offset + len]);
    before_ok && after_ok
}

// ─────────────────────────────────────────────────────────────────────────────
// Extract interface
// ─────────────────────────────────────────────────────────────────────────────

fn interface_member_line(member: &MemberSymbol) -> Option<String> {
    match member.kind {
        SymbolKind::Method => {
            let generics = if member.type_parameters.is_empty() {
                String::new()
            } else {
                format!("<{}>", member.type_parameters.join(", "))
            };
            Some(format!(
                "{} {}{}{};",
                member.ty,
                member.name,
                generics,
                format::parameter_list_text(&member.parameters)
            ))
        }
        SymbolKind::Property => {
            let accessors = if member.accessors.is_empty() {
                "get;".to_string()
            } else {
                member
                    .accessors
                    .iter()
                    .map(|a| format!("{a};"))
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            Some(format!("{} {} {{ {} }}", member.ty, member.name, accessors))
        }
        SymbolKind::Event => Some(format!("event {} {};", member.ty, member.name)),
        _ => None,
    }
}

fn extractable_members(ty: &TypeSymbol) -> Vec<&MemberSymbol> {
    ty.visible_members()
        .filter(|m| m.accessibility == "public" && !m.is_static())
        .filter(|m| {
            matches!(
                m.kind,
                SymbolKind::Method | SymbolKind::Property | SymbolKind::Event
            )
        })
        .collect()
}

fn render_interface(ty: &TypeSymbol, interface_name: &str, members: &[&MemberSymbol]) -> String {
    let mut out = String::new();
    let indent = if ty.namespace.is_empty() { "" } else { "    " };

    if !ty.namespace.is_empty() {
        out.push_str(&format!("namespace {}\n{{\n", ty.namespace));
    }
    out.push_str(&format!("{indent}public interface {interface_name}\n{indent}{{\n"));
    for m in members {
        if let Some(line) = interface_member_line(m) {
            out.push_str(&format!("{indent}    {line}\n"));
        }
    }
    out.push_str(&format!("{indent}}}\n"));
    if !ty.namespace.is_empty() {
        out.push_str("}\n");
    }
    out
}

/// Extract the public non-static surface of a class or struct into a new
/// interface. Preview by default; `apply` writes the interface file and adds
/// it to the type's base list.
pub fn extract_interface(
    ws: &WorkspaceManager,
    path: &Path,
    type_name: &str,
    interface_name: Option<&str>,
    apply: bool,
    cancel: &CancelToken,
) -> Result<String> {
    let handle = ws.acquire(path, cancel)?;
    let target = resolver::resolve_type(&handle, type_name)?;
    if !matches!(
        target.ty.kind,
        SymbolKind::Class | SymbolKind::Struct | SymbolKind::Record
    ) {
        return Err(Error::invalid_input(format!(
            "`{type_name}` is a {}; interface extraction needs a class or struct",
            target.ty.kind.as_str()
        )));
    }

    let members = extractable_members(target.ty);
    if members.is_empty() {
        return Err(Error::invalid_input(format!(
            "`{}` has no public non-static members to extract",
            target.ty.name
        )));
    }

    let default_name = format!("I{}", target.ty.name);
    let interface_name = interface_name.unwrap_or(&default_name);
    if !is_valid_identifier(interface_name) {
        return Err(Error::invalid_input(format!(
            "`{interface_name}` is not a valid identifier"
        )));
    }

    let text = render_interface(target.ty, interface_name, &members);
    if !apply {
        let mut out = format!("Preview of {interface_name} ({} members):\n\n", members.len());
        out.push_str(&text);
        return Ok(out);
    }

    cancel.check()?;

    // New file next to the class.
    let decl_path = &target.ty.location.path;
    let dir = decl_path.parent().unwrap_or_else(|| Path::new("."));
    let ext = decl_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cs".to_string());
    let interface_path = dir.join(format!("{interface_name}.{ext}"));

    // Base-list edit on the declaring document.
    let doc = target
        .compilation
        .document(decl_path)
        .ok_or_else(|| Error::not_found(format!("document {}", decl_path.display())))?;
    let edit = base_list_edit(doc, target.ty, interface_name)?;
    let class_text = splice(&doc.text, vec![edit]);

    let changes = vec![
        FileChange {
            path: interface_path.clone(),
            new_text: text,
        },
        FileChange {
            path: decl_path.clone(),
            new_text: class_text,
        },
    ];
    ws.apply(path, &changes, None, cancel)?;

    Ok(format!(
        "Extracted {interface_name} ({} members) to {}; {} now implements it.\n",
        members.len(),
        paths::display_relative(&interface_path, handle.dir()),
        target.ty.name
    ))
}

/// Locate the declaration node for `ty` in its document.
fn type_decl_node<'t>(doc: &'t Document, ty: &TypeSymbol) -> Option<Node<'t>> {
    let node = doc
        .root()
        .descendant_for_byte_range(ty.location.start_byte, ty.location.end_byte)?;
    let mut current = Some(node);
    while let Some(n) = current {
        if n.start_byte() == ty.location.start_byte && n.end_byte() == ty.location.end_byte {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Insert `interface_name` into the type's base list: a new `: X` clause when
/// none exists, `, X` appended otherwise.
fn base_list_edit(
    doc: &Document,
    ty: &TypeSymbol,
    interface_name: &str,
) -> Result<(usize, usize, String)> {
    let decl = type_decl_node(doc, ty)
        .ok_or_else(|| Error::analysis_failed("declaration node vanished from the parse tree"))?;

    let mut cursor = decl.walk();
    if let Some(bases) = decl
        .children(&mut cursor)
        .find(|c| c.kind() == "base_list")
    {
        let end = bases.end_byte();
        return Ok((end, end, format!(", {interface_name}")));
    }

    // No base list: insert after the name (and type-parameter list when
    // present).
    let anchor = decl
        .child_by_field_name("type_parameters")
        .or_else(|| decl.child_by_field_name("name"))
        .ok_or_else(|| Error::analysis_failed("type declaration without a name node"))?;
    let end = anchor.end_byte();
    Ok((end, end, format!(" : {interface_name}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Implement interface
// ─────────────────────────────────────────────────────────────────────────────

fn stub_for(member: &MemberSymbol, indent: &str) -> Option<String> {
    match member.kind {
        SymbolKind::Method => {
            let generics = if member.type_parameters.is_empty() {
                String::new()
            } else {
                format!("<{}>", member.type_parameters.join(", "))
            };
            Some(format!(
                "{indent}public {} {}{}{}\n{indent}{{\n{indent}    throw new NotImplementedException();\n{indent}}}",
                member.ty,
                member.name,
                generics,
                format::parameter_list_text(&member.parameters)
            ))
        }
        SymbolKind::Property => {
            let accessors: Vec<String> = if member.accessors.is_empty() {
                vec!["get => throw new NotImplementedException();".to_string()]
            } else {
                member
                    .accessors
                    .iter()
                    .map(|a| format!("{a} => throw new NotImplementedException();"))
                    .collect()
            };
            Some(format!(
                "{indent}public {} {} {{ {} }}",
                member.ty,
                member.name,
                accessors.join(" ")
            ))
        }
        SymbolKind::Event => Some(format!(
            "{indent}public event {} {};",
            member.ty, member.name
        )),
        _ => None,
    }
}

fn already_implements(ty: &TypeSymbol, member: &MemberSymbol) -> bool {
    ty.visible_members().any(|m| {
        m.name == member.name
            && m.kind == member.kind
            && (m.kind != SymbolKind::Method || m.parameters.len() == member.parameters.len())
    })
}

/// Add stubs for every unimplemented member of the class's declared
/// interfaces (or the single named one). One text insertion just before the
/// class's closing brace.
pub fn implement_interface(
    ws: &WorkspaceManager,
    path: &Path,
    type_name: &str,
    interface_name: Option<&str>,
    cancel: &CancelToken,
) -> Result<String> {
    let handle = ws.acquire(path, cancel)?;
    let target = resolver::resolve_type(&handle, type_name)?;
    if !matches!(target.ty.kind, SymbolKind::Class | SymbolKind::Struct | SymbolKind::Record) {
        return Err(Error::invalid_input(format!(
            "`{type_name}` is a {}; stubs can only be added to a class or struct",
            target.ty.kind.as_str()
        )));
    }

    // Declared interfaces, resolved within the solution.
    let mut declared: Vec<&TypeSymbol> = Vec::new();
    for entry in &target.ty.base_list {
        let name = entry.split('<').next().unwrap_or(entry).trim();
        for t in resolver::all_named_types(&handle) {
            if t.ty.kind == SymbolKind::Interface && (t.ty.name == name || t.ty.fqn == name) {
                declared.push(t.ty);
            }
        }
    }

    let selected: Vec<&TypeSymbol> = match interface_name {
        None => declared,
        Some(wanted) => {
            let found: Vec<&TypeSymbol> = declared
                .into_iter()
                .filter(|i| i.name == wanted || i.fqn == wanted)
                .collect();
            if found.is_empty() {
                return Err(Error::not_found(format!(
                    "interface `{wanted}` on `{}`'s base list",
                    target.ty.name
                )));
            }
            found
        }
    };
    if selected.is_empty() {
        return Err(Error::invalid_input(format!(
            "`{}` declares no interfaces known to the solution",
            target.ty.name
        )));
    }

    cancel.check()?;

    let doc = target
        .compilation
        .document(&target.ty.location.path)
        .ok_or_else(|| Error::not_found("declaring document"))?;
    let decl = type_decl_node(doc, target.ty)
        .ok_or_else(|| Error::analysis_failed("declaration node vanished from the parse tree"))?;
    let body = decl
        .child_by_field_name("body")
        .ok_or_else(|| Error::invalid_input(format!("`{}` has no body", target.ty.name)))?;

    // Indentation: one level deeper than the declaration line.
    let (_, decl_col) = doc.line_col(decl.start_byte());
    let indent = " ".repeat(decl_col + 4);

    let mut added: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut stubs: Vec<String> = Vec::new();
    for iface in &selected {
        for member in iface.visible_members() {
            if !matches!(
                member.kind,
                SymbolKind::Method | SymbolKind::Property | SymbolKind::Event
            ) {
                continue;
            }
            if already_implements(target.ty, member) {
                continue;
            }
            if let Some(stub) = stub_for(member, &indent) {
                stubs.push(stub);
                added
                    .entry(iface.name.clone())
                    .or_default()
                    .push(format::member_signature(member));
            }
        }
    }

    if stubs.is_empty() {
        return Ok(format!(
            "`{}` already implements every member of {}.\n",
            target.ty.name,
            selected
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    // Single insertion at the closing brace; no offset tracking needed.
    let close = body.end_byte() - 1;
    let insertion = format!("\n{}\n", stubs.join("\n\n"));
    let new_text = splice(&doc.text, vec![(close, close, insertion)]);

    ws.apply(
        path,
        &[FileChange {
            path: doc.path.clone(),
            new_text,
        }],
        None,
        cancel,
    )?;

    let mut out = format!("Added {} stub(s) to `{}`:\n", stubs.len(), target.ty.name);
    for (iface, sigs) in added {
        out.push_str(&format!("  from {iface}:\n"));
        for s in sigs {
            out.push_str(&format!("    {s}\n"));
        }
    }
    Ok(out)
}
