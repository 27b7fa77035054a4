//! The compiled semantic model.
//!
//! One [`Compilation`] per project: every document parsed with the
//! tree-sitter C# grammar, plus a flattened symbol table built from the
//! trees. Symbol construction happens once per load; all queries and
//! refactorings run over these records and only drop back to the syntax
//! trees for span-level work (references, metrics, signature edits).
//!
//! Lines and columns are 0-based everywhere in this module; the formatter
//! crosses to 1-based exactly once at output time.

use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::paths;
use crate::solution::ProjectLayout;

pub fn csharp_language() -> &'static Language {
    static LANG: OnceLock<Language> = OnceLock::new();
    LANG.get_or_init(|| tree_sitter_c_sharp::LANGUAGE.into())
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Class,
    Struct,
    Interface,
    Enum,
    Record,
    Delegate,
    Method,
    Constructor,
    Property,
    Field,
    Event,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Record => "record",
            SymbolKind::Delegate => "delegate",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Property => "property",
            SymbolKind::Field => "field",
            SymbolKind::Event => "event",
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Interface
                | SymbolKind::Enum
                | SymbolKind::Record
                | SymbolKind::Delegate
        )
    }

    /// Parse a caller-supplied kind filter. Accepts the same strings the
    /// formatter emits.
    pub fn parse(s: &str) -> Option<SymbolKind> {
        match s.to_ascii_lowercase().as_str() {
            "class" => Some(SymbolKind::Class),
            "struct" => Some(SymbolKind::Struct),
            "interface" => Some(SymbolKind::Interface),
            "enum" => Some(SymbolKind::Enum),
            "record" => Some(SymbolKind::Record),
            "delegate" => Some(SymbolKind::Delegate),
            "method" => Some(SymbolKind::Method),
            "constructor" => Some(SymbolKind::Constructor),
            "property" => Some(SymbolKind::Property),
            "field" => Some(SymbolKind::Field),
            "event" => Some(SymbolKind::Event),
            _ => None,
        }
    }
}

/// Declaration site. `line`/`column` are 0-based; the byte span covers the
/// whole declaration node (attributes excluded, header included).
#[derive(Debug, Clone)]
pub struct SymbolLocation {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: String,
    /// `ref` / `out` / `in` / `params` / `this`, in declaration order.
    pub modifiers: Vec<String>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MemberSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub accessibility: String,
    pub modifiers: Vec<String>,
    /// Return type for methods, declared type for properties/fields/events.
    /// Empty for constructors.
    pub ty: String,
    pub parameters: Vec<Parameter>,
    pub type_parameters: Vec<String>,
    /// `get` / `set` / `init` accessor names, properties only.
    pub accessors: Vec<String>,
    pub attributes: Vec<String>,
    pub doc_summary: Option<String>,
    pub location: SymbolLocation,
    /// Byte span of the body (block or expression body), when one exists.
    pub body_span: Option<(usize, usize)>,
    /// Byte span of the parameter list including parentheses, when present.
    pub param_list_span: Option<(usize, usize)>,
    /// Expression-bodied (`=>`) rather than block-bodied.
    pub expression_bodied: bool,
}

impl MemberSymbol {
    pub fn is_static(&self) -> bool {
        self.modifiers.iter().any(|m| m == "static")
    }

    pub fn is_overridable(&self) -> bool {
        self.modifiers
            .iter()
            .any(|m| m == "virtual" || m == "abstract" || m == "override")
    }

    /// Compiler-generated members carry angle-bracketed names.
    pub fn is_implicit(&self) -> bool {
        self.name.starts_with('<')
    }
}

#[derive(Debug, Clone)]
pub struct TypeSymbol {
    /// Short name, without namespace or generic arity suffix.
    pub name: String,
    /// Containing namespace display string, empty for the global namespace.
    pub namespace: String,
    /// `Namespace.Outer.Name` — the fully qualified display form.
    pub fqn: String,
    pub kind: SymbolKind,
    pub accessibility: String,
    pub modifiers: Vec<String>,
    /// Raw base-list entry texts, in declaration order.
    pub base_list: Vec<String>,
    pub type_parameters: Vec<String>,
    pub attributes: Vec<String>,
    pub doc_summary: Option<String>,
    pub location: SymbolLocation,
    pub members: Vec<MemberSymbol>,
    /// FQN of the enclosing type for nested declarations.
    pub containing_type: Option<String>,
}

impl TypeSymbol {
    pub fn is_implicit(&self) -> bool {
        self.name.starts_with('<')
    }

    /// Members minus compiler-generated entries.
    pub fn visible_members(&self) -> impl Iterator<Item = &MemberSymbol> {
        self.members.iter().filter(|m| !m.is_implicit())
    }

    pub fn methods(&self) -> impl Iterator<Item = &MemberSymbol> {
        self.visible_members()
            .filter(|m| m.kind == SymbolKind::Method)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    pub path: PathBuf,
    /// 0-based.
    pub line: usize,
}

/// One parsed source file. The tree is retained for span-level queries.
pub struct Document {
    pub path: PathBuf,
    pub text: String,
    pub tree: Tree,
    line_offsets: Vec<usize>,
}

impl Document {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// 0-based (line, column) of a byte offset.
    pub fn line_col(&self, byte: usize) -> (usize, usize) {
        let line = match self.line_offsets.binary_search(&byte) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line, byte - self.line_offsets[line])
    }

    /// Byte offset where `line0` starts; text length for out-of-range lines.
    pub fn line_start(&self, line0: usize) -> usize {
        self.line_offsets
            .get(line0)
            .copied()
            .unwrap_or(self.text.len())
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    /// Trimmed text of a 0-based line.
    pub fn line_text(&self, line0: usize) -> &str {
        let start = self.line_start(line0);
        let end = self.line_start(line0 + 1);
        self.text[start..end].trim_end_matches(['\n', '\r'])
    }
}

/// A fully parsed project: documents plus the flattened type table.
pub struct Compilation {
    pub project_name: String,
    pub project_root: PathBuf,
    pub documents: Vec<Document>,
    /// All named types, nested types included, in (file, line) order.
    pub types: Vec<TypeSymbol>,
    pub diagnostics: Vec<Diagnostic>,
    doc_index: HashMap<PathBuf, usize>,
}

impl Compilation {
    /// Parse every document of `layout` and build the symbol table.
    /// Unreadable files become warnings, not failures.
    pub fn build(layout: &ProjectLayout) -> Compilation {
        let parsed: Vec<Option<Document>> = layout
            .documents
            .par_iter()
            .map(|path| parse_document(path))
            .collect();

        let mut documents = Vec::new();
        let mut diagnostics = Vec::new();
        for (path, doc) in layout.documents.iter().zip(parsed) {
            match doc {
                Some(d) => documents.push(d),
                None => diagnostics.push(Diagnostic {
                    id: "SL0001".to_string(),
                    severity: Severity::Warning,
                    message: "file could not be read as UTF-8 source".to_string(),
                    path: path.clone(),
                    line: 0,
                }),
            }
        }

        let mut types = Vec::new();
        for doc in &documents {
            collect_document_symbols(doc, &mut types);
            collect_syntax_diagnostics(doc, &mut diagnostics);
        }
        types.sort_by(|a, b| {
            (&a.location.path, a.location.line).cmp(&(&b.location.path, b.location.line))
        });

        let doc_index = documents
            .iter()
            .enumerate()
            .map(|(i, d)| (d.path.clone(), i))
            .collect();

        Compilation {
            project_name: layout.name.clone(),
            project_root: layout.root.clone(),
            documents,
            types,
            diagnostics,
            doc_index,
        }
    }

    pub fn document(&self, path: &Path) -> Option<&Document> {
        if let Some(&i) = self.doc_index.get(path) {
            return Some(&self.documents[i]);
        }
        // Fall back to a case-insensitive sweep; path equality is
        // case-insensitive on the filesystems this tool targets.
        self.documents
            .iter()
            .find(|d| paths::eq_ignore_case(&d.path, path))
    }

    pub fn type_by_fqn(&self, fqn: &str) -> Option<&TypeSymbol> {
        self.types.iter().find(|t| t.fqn == fqn)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

fn parse_document(path: &Path) -> Option<Document> {
    let raw = std::fs::read(path).ok()?;
    if raw.contains(&0u8) {
        return None;
    }
    let text = String::from_utf8_lossy(&raw).into_owned();

    let mut parser = Parser::new();
    parser.set_language(csharp_language()).ok()?;
    let tree = parser.parse(&text, None)?;

    let mut line_offsets = vec![0usize];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            line_offsets.push(i + 1);
        }
    }

    Some(Document {
        path: path.to_path_buf(),
        text,
        tree,
        line_offsets,
    })
}

fn collect_syntax_diagnostics(doc: &Document, out: &mut Vec<Diagnostic>) {
    // Per-file cap: a truncated file can produce an ERROR node per line and
    // the listing is for humans.
    const MAX_PER_FILE: usize = 20;
    let mut count = 0usize;
    collect_error_nodes(doc.root(), doc, &mut count, MAX_PER_FILE, out);
}

fn collect_error_nodes(
    node: Node,
    doc: &Document,
    count: &mut usize,
    max: usize,
    out: &mut Vec<Diagnostic>,
) {
    if *count >= max {
        return;
    }
    if node.is_error() || node.is_missing() {
        let (line, _) = doc.line_col(node.start_byte());
        let message = if node.is_missing() {
            format!("syntax error: missing {}", node.kind())
        } else {
            let snippet: String = node_text(node, &doc.text).chars().take(40).collect();
            format!("syntax error near `{}`", snippet.trim())
        };
        out.push(Diagnostic {
            id: "SL0002".to_string(),
            severity: Severity::Error,
            message,
            path: doc.path.clone(),
            line,
        });
        *count += 1;
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(child, doc, count, max, out);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Symbol construction
// ─────────────────────────────────────────────────────────────────────────────

pub fn node_text<'a>(node: Node, text: &'a str) -> &'a str {
    &text[node.start_byte()..node.end_byte()]
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
            | "delegate_declaration"
    )
}

fn type_kind_of(kind: &str) -> SymbolKind {
    match kind {
        "class_declaration" => SymbolKind::Class,
        "struct_declaration" => SymbolKind::Struct,
        "interface_declaration" => SymbolKind::Interface,
        "enum_declaration" => SymbolKind::Enum,
        "record_declaration" | "record_struct_declaration" => SymbolKind::Record,
        _ => SymbolKind::Delegate,
    }
}

fn collect_document_symbols(doc: &Document, out: &mut Vec<TypeSymbol>) {
    walk_container(doc.root(), doc, "", out);
}

/// Recurse through namespace declarations collecting type declarations.
/// The namespace/type nesting tree is acyclic by construction, so plain
/// recursion terminates.
fn walk_container(node: Node, doc: &Document, ns: &str, out: &mut Vec<TypeSymbol>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "namespace_declaration" | "file_scoped_namespace_declaration" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, &doc.text).to_string())
                    .unwrap_or_default();
                let nested_ns = join_namespace(ns, &name);
                // Body may be a declaration_list or, for file-scoped
                // namespaces, the declarations trail as direct children.
                if let Some(body) = child.child_by_field_name("body") {
                    walk_container(body, doc, &nested_ns, out);
                } else {
                    walk_container(child, doc, &nested_ns, out);
                }
            }
            kind if is_type_declaration(kind) => {
                build_type(child, doc, ns, None, out);
            }
            // global statements / usings / attributes at file level: skip.
            _ => {}
        }
    }
}

fn join_namespace(outer: &str, inner: &str) -> String {
    if outer.is_empty() {
        inner.to_string()
    } else if inner.is_empty() {
        outer.to_string()
    } else {
        format!("{outer}.{inner}")
    }
}

fn build_type(
    node: Node,
    doc: &Document,
    ns: &str,
    containing: Option<&str>,
    out: &mut Vec<TypeSymbol>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, &doc.text).to_string();
    let kind = type_kind_of(node.kind());

    let fqn = match containing {
        Some(outer) => format!("{outer}.{name}"),
        None => join_namespace(ns, &name),
    };

    let modifiers = collect_modifiers(node, &doc.text);
    let accessibility = accessibility_of(&modifiers, if containing.is_some() { "private" } else { "internal" });

    let mut members = Vec::new();
    let mut nested: Vec<Node> = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for m in body.named_children(&mut cursor) {
            if is_type_declaration(m.kind()) {
                nested.push(m);
            } else if let Some(member) = build_member(m, doc, kind) {
                members.push(member);
            } else if m.kind() == "field_declaration" || m.kind() == "event_field_declaration" {
                members.extend(build_field_like(m, doc));
            }
        }
    }

    let (line, column) = doc.line_col(node.start_byte());
    out.push(TypeSymbol {
        name,
        namespace: ns.to_string(),
        fqn: fqn.clone(),
        kind,
        accessibility,
        modifiers,
        base_list: collect_base_list(node, &doc.text),
        type_parameters: collect_type_parameters(node, &doc.text),
        attributes: collect_attributes(node, &doc.text),
        doc_summary: doc_comment_before(node, doc),
        location: SymbolLocation {
            path: doc.path.clone(),
            line,
            column,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
        },
        members,
        containing_type: containing.map(str::to_string),
    });

    for n in nested {
        build_type(n, doc, ns, Some(&fqn), out);
    }
}

/// Build a non-field member. Fields and event-fields declare several symbols
/// per statement and go through [`build_field_like`] instead.
fn build_member(node: Node, doc: &Document, owner_kind: SymbolKind) -> Option<MemberSymbol> {
    let kind = match node.kind() {
        "method_declaration" => SymbolKind::Method,
        "constructor_declaration" => SymbolKind::Constructor,
        "property_declaration" | "indexer_declaration" => SymbolKind::Property,
        "event_declaration" => SymbolKind::Event,
        "enum_member_declaration" => SymbolKind::Field,
        // operators, destructors, and conversion operators are tracked for
        // spans but never surface in listings or interface extraction.
        _ => return None,
    };

    let name = match node.child_by_field_name("name") {
        Some(n) => node_text(n, &doc.text).to_string(),
        None if node.kind() == "indexer_declaration" => "this[]".to_string(),
        None => return None,
    };

    let modifiers = collect_modifiers(node, &doc.text);
    let default_access = if owner_kind == SymbolKind::Interface {
        "public"
    } else {
        "private"
    };
    let accessibility = accessibility_of(&modifiers, default_access);

    let ty = node
        .child_by_field_name("returns")
        .or_else(|| node.child_by_field_name("type"))
        .map(|n| node_text(n, &doc.text).to_string())
        .unwrap_or_default();

    let param_list = node.child_by_field_name("parameters");
    let parameters = param_list
        .map(|pl| collect_parameters(pl, &doc.text))
        .unwrap_or_default();

    let (body_span, expression_bodied) = body_span_of(node);

    let (line, column) = doc.line_col(node.start_byte());
    Some(MemberSymbol {
        name,
        kind,
        accessibility,
        modifiers,
        ty,
        parameters,
        type_parameters: collect_type_parameters(node, &doc.text),
        accessors: if kind == SymbolKind::Property {
            collect_accessors(node, &doc.text)
        } else {
            vec![]
        },
        attributes: collect_attributes(node, &doc.text),
        doc_summary: doc_comment_before(node, doc),
        location: SymbolLocation {
            path: doc.path.clone(),
            line,
            column,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
        },
        body_span,
        param_list_span: param_list.map(|pl| (pl.start_byte(), pl.end_byte())),
        expression_bodied,
    })
}

/// `field_declaration` / `event_field_declaration`: one symbol per declarator.
fn build_field_like(node: Node, doc: &Document) -> Vec<MemberSymbol> {
    let kind = if node.kind() == "event_field_declaration" {
        SymbolKind::Event
    } else {
        SymbolKind::Field
    };
    let modifiers = collect_modifiers(node, &doc.text);
    let accessibility = accessibility_of(&modifiers, "private");
    let attributes = collect_attributes(node, &doc.text);
    let doc_summary = doc_comment_before(node, doc);

    let Some(var_decl) = first_child_of_kind(node, "variable_declaration") else {
        return vec![];
    };
    let ty = var_decl
        .child_by_field_name("type")
        .map(|n| node_text(n, &doc.text).to_string())
        .unwrap_or_default();

    let mut out = Vec::new();
    let mut cursor = var_decl.walk();
    for declarator in var_decl.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator
            .child_by_field_name("name")
            .or_else(|| declarator.named_child(0))
        else {
            continue;
        };
        let (line, column) = doc.line_col(name_node.start_byte());
        out.push(MemberSymbol {
            name: node_text(name_node, &doc.text).to_string(),
            kind,
            accessibility: accessibility.clone(),
            modifiers: modifiers.clone(),
            ty: ty.clone(),
            parameters: vec![],
            type_parameters: vec![],
            accessors: vec![],
            attributes: attributes.clone(),
            doc_summary: doc_summary.clone(),
            location: SymbolLocation {
                path: doc.path.clone(),
                line,
                column,
                start_byte: node.start_byte(),
                end_byte: node.end_byte(),
            },
            body_span: None,
            param_list_span: None,
            expression_bodied: false,
        });
    }
    out
}

fn first_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let result = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    result
}

fn collect_modifiers(node: Node, text: &str) -> Vec<String> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| c.kind() == "modifier")
        .map(|c| node_text(c, text).to_string())
        .collect()
}

fn accessibility_of(modifiers: &[String], default: &str) -> String {
    let has = |m: &str| modifiers.iter().any(|x| x == m);
    if has("public") {
        "public".to_string()
    } else if has("protected") && has("internal") {
        "protected internal".to_string()
    } else if has("private") && has("protected") {
        "private protected".to_string()
    } else if has("protected") {
        "protected".to_string()
    } else if has("internal") {
        "internal".to_string()
    } else if has("private") {
        "private".to_string()
    } else {
        default.to_string()
    }
}

fn collect_base_list(node: Node, text: &str) -> Vec<String> {
    let Some(bases) = node
        .child_by_field_name("bases")
        .or_else(|| first_child_of_kind(node, "base_list"))
    else {
        return vec![];
    };
    let mut cursor = bases.walk();
    bases
        .named_children(&mut cursor)
        .filter(|c| !c.kind().contains("argument"))
        .map(|c| node_text(c, text).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn collect_type_parameters(node: Node, text: &str) -> Vec<String> {
    let Some(tp) = node
        .child_by_field_name("type_parameters")
        .or_else(|| first_child_of_kind(node, "type_parameter_list"))
    else {
        return vec![];
    };
    let mut cursor = tp.walk();
    tp.named_children(&mut cursor)
        .filter(|c| c.kind() == "type_parameter")
        .map(|c| {
            // A type_parameter may carry variance keywords and attributes;
            // the identifier child is the name.
            c.child_by_field_name("name")
                .map(|n| node_text(n, text).to_string())
                .unwrap_or_else(|| {
                    let mut inner = c.walk();
                    c.named_children(&mut inner)
                        .filter(|cc| cc.kind() == "identifier")
                        .last()
                        .map(|n| node_text(n, text).to_string())
                        .unwrap_or_else(|| node_text(c, text).to_string())
                })
        })
        .collect()
}

fn collect_attributes(node: Node, text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "attribute_list" {
            continue;
        }
        let mut inner = child.walk();
        for attr in child.named_children(&mut inner) {
            if attr.kind() != "attribute" {
                continue;
            }
            if let Some(name) = attr.child_by_field_name("name") {
                out.push(node_text(name, text).to_string());
            }
        }
    }
    out
}

fn collect_parameters(param_list: Node, text: &str) -> Vec<Parameter> {
    let mut out = Vec::new();
    let mut cursor = param_list.walk();
    for p in param_list.named_children(&mut cursor) {
        if p.kind() != "parameter" {
            continue;
        }
        let name = p
            .child_by_field_name("name")
            .map(|n| node_text(n, text).to_string())
            .unwrap_or_default();
        let ty = p
            .child_by_field_name("type")
            .map(|n| node_text(n, text).to_string())
            .unwrap_or_default();

        let mut modifiers = Vec::new();
        let mut default_value = None;
        let mut inner = p.walk();
        for c in p.children(&mut inner) {
            let t = node_text(c, text);
            if matches!(t, "ref" | "out" | "in" | "params" | "this" | "scoped") {
                modifiers.push(t.to_string());
            }
            if c.kind() == "equals_value_clause" {
                default_value = c
                    .named_child(0)
                    .map(|v| node_text(v, text).trim().to_string());
            }
        }

        out.push(Parameter {
            name,
            ty,
            modifiers,
            default_value,
        });
    }
    out
}

fn collect_accessors(node: Node, text: &str) -> Vec<String> {
    let Some(accessors) = node
        .child_by_field_name("accessors")
        .or_else(|| first_child_of_kind(node, "accessor_list"))
    else {
        // `int X => expr;` is a get-only property.
        if body_span_of(node).1 {
            return vec!["get".to_string()];
        }
        return vec![];
    };
    let mut out = Vec::new();
    let mut cursor = accessors.walk();
    for acc in accessors.named_children(&mut cursor) {
        if acc.kind() != "accessor_declaration" {
            continue;
        }
        let mut inner = acc.walk();
        for c in acc.children(&mut inner) {
            let t = node_text(c, text);
            if matches!(t, "get" | "set" | "init") {
                out.push(t.to_string());
            }
        }
    }
    out
}

/// (body span, expression-bodied). Works for methods, accessor-less
/// properties, and local functions.
fn body_span_of(node: Node) -> (Option<(usize, usize)>, bool) {
    if let Some(body) = node.child_by_field_name("body") {
        return (Some((body.start_byte(), body.end_byte())), false);
    }
    if let Some(arrow) = first_child_of_kind(node, "arrow_expression_clause") {
        return (Some((arrow.start_byte(), arrow.end_byte())), true);
    }
    (None, false)
}

/// Gather the `///` comment block immediately above a declaration and return
/// its `<summary>` text (or the stripped text when no summary tag exists).
fn doc_comment_before(node: Node, doc: &Document) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut prev = node.prev_sibling();
    // Attribute lists may sit between the doc block and the declaration.
    while let Some(p) = prev {
        match p.kind() {
            "attribute_list" => prev = p.prev_sibling(),
            "comment" => {
                let text = node_text(p, &doc.text).trim();
                if let Some(rest) = text.strip_prefix("///") {
                    lines.push(rest.trim().to_string());
                    prev = p.prev_sibling();
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let joined = lines.join(" ");

    // Prefer the <summary> payload; fall back to the whole block with tags
    // stripped.
    let summary = match (joined.find("<summary>"), joined.find("</summary>")) {
        (Some(s), Some(e)) if e > s => joined[s + "<summary>".len()..e].to_string(),
        _ => joined,
    };
    let stripped = strip_xml_tags(&summary).trim().to_string();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

fn strip_xml_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
