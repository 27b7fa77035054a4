//! Change-signature: add, remove, and reorder parameters, propagating to
//! every direct call site.
//!
//! Deliberately text-oriented: the trees locate parameter-list and
//! argument-list spans, replacements are spliced per file in descending
//! start-offset order, and the model is invalidated afterwards. Indirect
//! callers (delegate captures, reflection) are not updated; the summary
//! carries a fixed reminder instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

use crate::error::{Error, Result};
use crate::format;
use crate::model::{node_text, Document, Parameter};
use crate::paths;
use crate::references;
use crate::refactor::{is_valid_identifier, splice};
use crate::resolver;
use crate::workspace::{CancelToken, FileChange, SolutionHandle, WorkspaceManager};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter-spec parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Split on commas at angle-bracket/paren/bracket depth zero, so
/// `Dictionary<string, int> map, int n` yields two items.
pub fn split_top_level(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth_angle = 0i32;
    let mut depth_round = 0i32;
    let mut depth_square = 0i32;
    let mut current = String::new();

    for ch in input.chars() {
        match ch {
            '<' => depth_angle += 1,
            '>' => depth_angle -= 1,
            '(' => depth_round += 1,
            ')' => depth_round -= 1,
            '[' => depth_square += 1,
            ']' => depth_square -= 1,
            ',' if depth_angle == 0 && depth_round == 0 && depth_square == 0 => {
                out.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out.retain(|s| !s.is_empty());
    out
}

/// A parameter to add: `type name` with an optional `= default`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddedParameter {
    pub ty: String,
    pub name: String,
    pub default_value: Option<String>,
}

/// Parse one `type name [= default]` spec. The type may contain spaces and
/// commas inside angle brackets; the name is the last identifier before `=`.
pub fn parse_added_parameter(spec: &str) -> Result<AddedParameter> {
    let (decl, default_value) = match top_level_equals(spec) {
        Some(i) => (
            spec[..i].trim(),
            Some(spec[i + 1..].trim().to_string()).filter(|s| !s.is_empty()),
        ),
        None => (spec.trim(), None),
    };

    let (ty, name) = match decl.rsplit_once(char::is_whitespace) {
        Some((ty, name)) => (ty.trim(), name.trim()),
        None => {
            return Err(Error::invalid_input(format!(
                "parameter spec `{spec}` is not of the form `type name`"
            )))
        }
    };
    if ty.is_empty() || !is_valid_identifier(name) {
        return Err(Error::invalid_input(format!(
            "parameter spec `{spec}` is not of the form `type name`"
        )));
    }
    Ok(AddedParameter {
        ty: ty.to_string(),
        name: name.to_string(),
        default_value,
    })
}

/// Position of the first `=` outside brackets (and not part of `==`, `=>`,
/// `<=`, `>=`, `!=`).
fn top_level_equals(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'<' | b'(' | b'[' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] != b'=' => depth -= 1,
            b')' | b']' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { 0 };
                let next = bytes.get(i + 1).copied().unwrap_or(0);
                if prev != b'=' && prev != b'!' && prev != b'<' && prev != b'>' && next != b'=' && next != b'>' {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// The operation
// ─────────────────────────────────────────────────────────────────────────────

/// One slot in the new signature.
enum NewParam<'a> {
    Surviving(&'a Parameter),
    Added(&'a AddedParameter),
}

/// An argument at a call site, as written.
struct CallArg {
    text: String,
    /// Explicit `name:` when present.
    name: Option<String>,
}

pub fn change_signature(
    ws: &WorkspaceManager,
    path: &Path,
    method_name: &str,
    containing_type: Option<&str>,
    add_parameters: Option<&str>,
    remove_parameters: Option<&str>,
    reorder_parameters: Option<&str>,
    cancel: &CancelToken,
) -> Result<String> {
    let handle = ws.acquire(path, cancel)?;
    let method = resolver::resolve_method(&handle, method_name, containing_type)?;

    let old_params: Vec<&Parameter> = method.member.parameters.iter().collect();
    let old_names: Vec<&str> = old_params.iter().map(|p| p.name.as_str()).collect();
    let old_signature = format::member_signature(method.member);

    // Parse the three input lists.
    let added: Vec<AddedParameter> = match add_parameters {
        Some(s) => split_top_level(s)
            .iter()
            .map(|spec| parse_added_parameter(spec))
            .collect::<Result<_>>()?,
        None => vec![],
    };
    let removed: Vec<String> = remove_parameters
        .map(|s| s.split(',').map(|x| x.trim().to_string()).filter(|x| !x.is_empty()).collect())
        .unwrap_or_default();
    let reordered: Vec<String> = reorder_parameters
        .map(|s| s.split(',').map(|x| x.trim().to_string()).filter(|x| !x.is_empty()).collect())
        .unwrap_or_default();

    if added.is_empty() && removed.is_empty() && reordered.is_empty() {
        return Err(Error::invalid_input(
            "nothing to do: supply addParameters, removeParameters, or reorderParameters",
        ));
    }

    for name in &removed {
        if !old_names.contains(&name.as_str()) {
            return Err(Error::invalid_input(format!(
                "removeParameters names `{name}`, which `{method_name}` does not have"
            )));
        }
    }
    let surviving: Vec<&Parameter> = old_params
        .iter()
        .filter(|p| !removed.contains(&p.name))
        .copied()
        .collect();
    for name in &reordered {
        if !surviving.iter().any(|p| &p.name == name) {
            return Err(Error::invalid_input(format!(
                "reorderParameters names `{name}`, which is not a surviving parameter"
            )));
        }
    }

    // New order: reordered names first, remaining survivors in original
    // order, then additions.
    let mut new_order: Vec<NewParam<'_>> = Vec::new();
    for name in &reordered {
        if let Some(p) = surviving.iter().copied().find(|p| &p.name == name) {
            new_order.push(NewParam::Surviving(p));
        }
    }
    for p in surviving.iter().copied() {
        if !reordered.contains(&p.name) {
            new_order.push(NewParam::Surviving(p));
        }
    }
    for a in &added {
        new_order.push(NewParam::Added(a));
    }

    // Fresh declaration text.
    let decl_text: Vec<String> = new_order
        .iter()
        .map(|p| match p {
            NewParam::Surviving(p) => format::parameter_text(p),
            NewParam::Added(a) => match &a.default_value {
                Some(d) => format!("{} {} = {}", a.ty, a.name, d),
                None => format!("{} {}", a.ty, a.name),
            },
        })
        .collect();
    let new_param_list = format!("({})", decl_text.join(", "));

    let decl_span = method.member.param_list_span.ok_or_else(|| {
        Error::invalid_input(format!("`{method_name}` has no parameter list to change"))
    })?;
    let decl_path = method.member.location.path.clone();

    cancel.check()?;

    // Collect per-file edits: the declaration plus every direct invocation.
    let mut edits_by_file: BTreeMap<PathBuf, Vec<(usize, usize, String)>> = BTreeMap::new();
    edits_by_file
        .entry(decl_path.clone())
        .or_default()
        .push((decl_span.0, decl_span.1, new_param_list.clone()));

    let mut call_sites = 0usize;
    let mut touched_calls: Vec<String> = Vec::new();
    for compilation in &handle.compilations {
        cancel.check()?;
        for doc in &compilation.documents {
            if !doc.text.contains(method_name) {
                continue;
            }
            for (invocation, _callee) in references::invocations_of(doc, method_name) {
                let Some(arg_list) = invocation.child_by_field_name("arguments") else {
                    continue;
                };
                let args = parse_call_args(arg_list, doc);
                let new_args = remap_arguments(&args, &old_names, &new_order);
                let new_text = format!("({})", new_args.join(", "));
                let old_text = node_text(arg_list, &doc.text);
                if new_text == old_text {
                    continue;
                }
                let already = edits_by_file.entry(doc.path.clone()).or_default();
                // Skip duplicate spans seen through overlapping projects.
                if already
                    .iter()
                    .any(|(s, _, _)| *s == arg_list.start_byte())
                {
                    continue;
                }
                already.push((arg_list.start_byte(), arg_list.end_byte(), new_text));
                call_sites += 1;
                let (line, _) = doc.line_col(arg_list.start_byte());
                touched_calls.push(paths::location_text(&doc.path, handle.dir(), line));
            }
        }
    }

    // Splice each file once; `splice` applies in descending offset order so
    // a declaration and its in-file callers never invalidate each other.
    let mut changes: Vec<FileChange> = Vec::new();
    for (file, edits) in edits_by_file {
        let doc = find_document(&handle, &file)
            .ok_or_else(|| Error::analysis_failed("edited document vanished from the model"))?;
        let new_text = splice(&doc.text, edits);
        if new_text != doc.text {
            changes.push(FileChange {
                path: file,
                new_text,
            });
        }
    }

    ws.apply(path, &changes, None, cancel)?;

    let method_ref = match containing_type {
        Some(t) => format!("{t}.{method_name}"),
        None => method_name.to_string(),
    };
    let mut out = format!("Changed signature of `{method_ref}`.\n");
    out.push_str(&format!("  old: {old_signature}\n"));
    out.push_str(&format!(
        "  new: {} {}{}\n",
        method.member.ty, method.member.name, new_param_list
    ));
    out.push_str(&format!(
        "  declaration: {}\n",
        paths::display_relative(&decl_path, handle.dir())
    ));
    out.push_str(&format!("  call sites updated: {call_sites}\n"));
    for c in &touched_calls {
        out.push_str(&format!("    {c}\n"));
    }
    out.push_str("Note: delegate captures and reflection-based call sites are not updated.\n");
    Ok(out)
}

fn find_document<'a>(handle: &'a SolutionHandle, path: &Path) -> Option<&'a Document> {
    handle
        .compilations
        .iter()
        .find_map(|c| c.document(path))
}

fn parse_call_args(arg_list: Node, doc: &Document) -> Vec<CallArg> {
    let mut out = Vec::new();
    let mut cursor = arg_list.walk();
    for arg in arg_list.named_children(&mut cursor) {
        if arg.kind() != "argument" {
            continue;
        }
        let text = node_text(arg, &doc.text).trim().to_string();
        let mut name = None;
        let mut inner = arg.walk();
        for c in arg.named_children(&mut inner) {
            if c.kind() == "name_colon" {
                name = c
                    .named_child(0)
                    .map(|id| node_text(id, &doc.text).to_string());
            }
        }
        // Fall back to splitting `name:` textually when the grammar nests it
        // differently.
        if name.is_none() {
            if let Some((lhs, _)) = text.split_once(':') {
                let candidate = lhs.trim();
                if is_valid_identifier(candidate) && !text.trim_start().starts_with("::") {
                    name = Some(candidate.to_string());
                }
            }
        }
        out.push(CallArg { text, name });
    }
    out
}

/// Rewrite one argument list into the new parameter order.
///
/// Existing arguments map positionally or by explicit name; arguments of
/// removed parameters drop; added parameters without a default synthesize
/// `default(type)`; added parameters with a default contribute nothing (the
/// default applies at the call site).
fn remap_arguments(
    args: &[CallArg],
    old_names: &[&str],
    new_order: &[NewParam<'_>],
) -> Vec<String> {
    // parameter name -> argument text, as written. Arguments of removed
    // parameters simply never appear in `new_order` and drop out.
    let mut by_param: BTreeMap<&str, &CallArg> = BTreeMap::new();
    let mut positional_cursor = 0usize;
    for arg in args {
        match &arg.name {
            Some(name) => {
                if let Some(param) = old_names.iter().copied().find(|p| *p == name.as_str()) {
                    by_param.insert(param, arg);
                }
            }
            None => {
                if let Some(&param) = old_names.get(positional_cursor) {
                    by_param.insert(param, arg);
                }
                positional_cursor += 1;
            }
        }
    }

    let mut out = Vec::new();
    for slot in new_order {
        match slot {
            NewParam::Surviving(p) => {
                if let Some(arg) = by_param.get(p.name.as_str()) {
                    out.push(arg.text.clone());
                }
                // No argument: the parameter already had a default at the
                // declaration; the call keeps relying on it.
            }
            NewParam::Added(a) => {
                if a.default_value.is_none() {
                    out.push(format!("default({})", a.ty));
                }
            }
        }
    }
    out
}
