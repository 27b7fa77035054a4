//! Code-smell analysis: single-pass method-body metrics, structural checks
//! over the symbol table, and an optional semantic deep check (feature envy).
//!
//! All four body metrics come out of one traversal per method; any future
//! metric should extend [`MethodBodyMetrics`] rather than add a second walk.
//! The analyzer only reports — it never edits.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tree_sitter::Node;

use crate::error::{Error, Result};
use crate::model::{node_text, Compilation, Document, MemberSymbol, SymbolKind, TypeSymbol};
use crate::paths;
use crate::workspace::{CancelToken, SolutionHandle};

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SmellSeverity {
    Critical,
    Warning,
    Info,
}

impl SmellSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmellSeverity::Critical => "critical",
            SmellSeverity::Warning => "warning",
            SmellSeverity::Info => "info",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmellResult {
    pub smell: &'static str,
    /// Threshold text shown in the group header.
    pub threshold: &'static str,
    pub severity: SmellSeverity,
    pub symbol: String,
    pub detail: String,
    pub path: PathBuf,
    /// 0-based.
    pub line: usize,
}

/// Everything the body checks need, computed in one traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodBodyMetrics {
    pub line_count: usize,
    pub max_nesting_depth: usize,
    pub cyclomatic_complexity: usize,
    pub is_single_delegation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmellCategory {
    All,
    Complexity,
    Design,
    Inheritance,
}

impl SmellCategory {
    pub fn parse(s: &str) -> Result<SmellCategory> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(SmellCategory::All),
            "complexity" => Ok(SmellCategory::Complexity),
            "design" => Ok(SmellCategory::Design),
            "inheritance" => Ok(SmellCategory::Inheritance),
            other => Err(Error::invalid_input(format!(
                "unknown smell category `{other}` (expected all, complexity, design, or inheritance)"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared filters
// ─────────────────────────────────────────────────────────────────────────────

/// Attribute names that exempt a type from analysis: test frameworks,
/// serialization markers, API route markers, obsolete code. Fixed at build
/// time.
const EXCLUDED_ATTRIBUTES: &[&str] = &[
    "Fact",
    "Theory",
    "Test",
    "TestMethod",
    "TestClass",
    "TestFixture",
    "Serializable",
    "DataContract",
    "JsonSerializable",
    "ApiController",
    "Route",
    "Obsolete",
];

const ENTRY_POINT_TYPE: &str = "Program";

fn attribute_short_name(name: &str) -> &str {
    let short = name.rsplit('.').next().unwrap_or(name);
    short.strip_suffix("Attribute").unwrap_or(short)
}

pub fn has_excluded_attribute(ty: &TypeSymbol) -> bool {
    ty.attributes
        .iter()
        .any(|a| EXCLUDED_ATTRIBUTES.contains(&attribute_short_name(a)))
}

pub fn is_excluded_type(ty: &TypeSymbol) -> bool {
    if ty.is_implicit() {
        return true;
    }
    if matches!(
        ty.kind,
        SymbolKind::Enum | SymbolKind::Delegate | SymbolKind::Interface
    ) {
        return true;
    }
    if ty.name == ENTRY_POINT_TYPE {
        return true;
    }
    has_excluded_attribute(ty)
}

// ─────────────────────────────────────────────────────────────────────────────
// Single-pass body analysis
// ─────────────────────────────────────────────────────────────────────────────

fn is_nesting_kind(kind: &str) -> bool {
    matches!(
        kind,
        "if_statement"
            | "for_statement"
            | "for_each_statement"
            | "foreach_statement"
            | "while_statement"
            | "do_statement"
            | "switch_statement"
            | "try_statement"
    )
}

fn decision_weight(node: Node, text: &str) -> usize {
    match node.kind() {
        "if_statement" => 1,
        "case_switch_label" | "case_pattern_switch_label" => 1,
        "switch_expression_arm" => 1,
        "conditional_expression" => 1,
        "catch_clause" => 1,
        "binary_expression" => {
            let op = node
                .child_by_field_name("operator")
                .map(|o| node_text(o, text))
                .unwrap_or("");
            usize::from(matches!(op, "&&" | "||" | "??"))
        }
        _ => 0,
    }
}

/// Compute all four metrics in one walk of the method's body.
pub fn analyze_method_body(doc: &Document, member: &MemberSymbol) -> Option<MethodBodyMetrics> {
    let (start, end) = member.body_span?;
    let body = doc
        .root()
        .descendant_for_byte_range(start, end)
        .filter(|n| n.start_byte() == start && n.end_byte() == end)?;

    let line_count = if member.expression_bodied {
        1
    } else {
        let (first, _) = doc.line_col(start);
        let (last, _) = doc.line_col(end.saturating_sub(1).max(start));
        last - first + 1
    };

    let mut decisions = 0usize;
    let mut max_depth = 0usize;
    walk_metrics(body, &doc.text, 0, &mut decisions, &mut max_depth);

    Some(MethodBodyMetrics {
        line_count,
        max_nesting_depth: max_depth,
        cyclomatic_complexity: 1 + decisions,
        is_single_delegation: is_single_delegation(body),
    })
}

fn walk_metrics(node: Node, text: &str, depth: usize, decisions: &mut usize, max_depth: &mut usize) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        *decisions += decision_weight(child, text);
        let child_depth = if is_nesting_kind(child.kind()) {
            let d = depth + 1;
            if d > *max_depth {
                *max_depth = d;
            }
            d
        } else {
            depth
        };
        walk_metrics(child, text, child_depth, decisions, max_depth);
    }
}

/// A block of exactly one statement that is an invocation (bare or
/// returned).
fn is_single_delegation(body: Node) -> bool {
    if body.kind() != "block" {
        return false;
    }
    let mut cursor = body.walk();
    let statements: Vec<Node> = body.named_children(&mut cursor).collect();
    if statements.len() != 1 {
        return false;
    }
    let stmt = statements[0];
    match stmt.kind() {
        "expression_statement" => stmt
            .named_child(0)
            .map(|e| e.kind() == "invocation_expression")
            .unwrap_or(false),
        "return_statement" => stmt
            .named_child(0)
            .map(|e| e.kind() == "invocation_expression")
            .unwrap_or(false),
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// The analyzer
// ─────────────────────────────────────────────────────────────────────────────

struct Collector {
    category: SmellCategory,
    results: Vec<SmellResult>,
}

impl Collector {
    fn push(
        &mut self,
        category: SmellCategory,
        smell: &'static str,
        threshold: &'static str,
        severity: SmellSeverity,
        symbol: &str,
        detail: String,
        ty_path: &PathBuf,
        line: usize,
    ) {
        if self.category != SmellCategory::All && self.category != category {
            return;
        }
        self.results.push(SmellResult {
            smell,
            threshold,
            severity,
            symbol: symbol.to_string(),
            detail,
            path: ty_path.clone(),
            line,
        });
    }
}

pub fn find_code_smells(
    handle: &SolutionHandle,
    category: SmellCategory,
    project_name: Option<&str>,
    deep: bool,
    cancel: &CancelToken,
) -> Result<String> {
    if let Some(name) = project_name {
        handle.project(name)?;
    }

    let mut collector = Collector {
        category,
        results: Vec::new(),
    };

    // Dedup across compilations (overlapping project dirs).
    let mut seen_types: std::collections::HashSet<String> = std::collections::HashSet::new();

    for compilation in &handle.compilations {
        if let Some(name) = project_name {
            if compilation.project_name != name {
                continue;
            }
        }
        cancel.check()?;
        for ty in &compilation.types {
            if is_excluded_type(ty) {
                continue;
            }
            if !seen_types.insert(format!(
                "{}#{}",
                ty.fqn,
                ty.location.path.to_string_lossy().to_lowercase()
            )) {
                continue;
            }
            check_type(&mut collector, handle, compilation, ty, deep);
        }
    }

    Ok(render(&collector.results, handle))
}

fn check_type(
    collector: &mut Collector,
    handle: &SolutionHandle,
    compilation: &Compilation,
    ty: &TypeSymbol,
    deep: bool,
) {
    let doc = compilation.document(&ty.location.path);

    // ── Body metrics per ordinary method ─────────────────────────────────
    let mut delegating = 0usize;
    let mut measured = 0usize;
    for member in ty.methods() {
        let Some(doc) = doc else { break };
        let Some(metrics) = analyze_method_body(doc, member) else {
            continue;
        };
        measured += 1;
        if metrics.is_single_delegation {
            delegating += 1;
        }
        let symbol = format!("{}.{}", ty.name, member.name);
        let at = (&member.location.path, member.location.line);

        if metrics.line_count > 50 {
            let severity = if metrics.line_count > 100 {
                SmellSeverity::Critical
            } else {
                SmellSeverity::Warning
            };
            collector.push(
                SmellCategory::Complexity,
                "Long method",
                "> 50 lines warning, > 100 critical",
                severity,
                &symbol,
                format!("{} lines", metrics.line_count),
                at.0,
                at.1,
            );
        }
        if metrics.max_nesting_depth > 3 {
            let severity = if metrics.max_nesting_depth > 5 {
                SmellSeverity::Critical
            } else {
                SmellSeverity::Warning
            };
            collector.push(
                SmellCategory::Complexity,
                "Deep nesting",
                "> 3 levels warning, > 5 critical",
                severity,
                &symbol,
                format!("nesting depth {}", metrics.max_nesting_depth),
                at.0,
                at.1,
            );
        }
        if metrics.cyclomatic_complexity > 10 {
            let severity = if metrics.cyclomatic_complexity > 20 {
                SmellSeverity::Critical
            } else {
                SmellSeverity::Warning
            };
            collector.push(
                SmellCategory::Complexity,
                "High cyclomatic complexity",
                "> 10 warning, > 20 critical",
                severity,
                &symbol,
                format!("complexity {}", metrics.cyclomatic_complexity),
                at.0,
                at.1,
            );
        }

        if deep {
            if let Some(doc) = compilation.document(&member.location.path) {
                check_feature_envy(collector, doc, ty, member);
            }
        }
    }

    // ── Middle man ───────────────────────────────────────────────────────
    if measured >= 3 && delegating * 5 > measured * 4 {
        collector.push(
            SmellCategory::Design,
            "Middle man",
            ">= 3 methods with > 80% single delegations",
            SmellSeverity::Warning,
            &ty.name,
            format!("{delegating}/{measured} methods delegate"),
            &ty.location.path,
            ty.location.line,
        );
    }

    // ── Parameter lists ──────────────────────────────────────────────────
    let mut max_ctor_params = 0usize;
    for member in ty.visible_members() {
        match member.kind {
            SymbolKind::Method | SymbolKind::Constructor => {
                if member.kind == SymbolKind::Constructor {
                    max_ctor_params = max_ctor_params.max(member.parameters.len());
                }
                let n = member.parameters.len();
                if n > 5 {
                    let severity = if n > 8 {
                        SmellSeverity::Critical
                    } else {
                        SmellSeverity::Warning
                    };
                    collector.push(
                        SmellCategory::Complexity,
                        "Long parameter list",
                        "> 5 parameters warning, > 8 critical",
                        severity,
                        &format!("{}.{}", ty.name, member.name),
                        format!("{n} parameters"),
                        &member.location.path,
                        member.location.line,
                    );
                }
            }
            _ => {}
        }
    }
    if max_ctor_params > 5 {
        let severity = if max_ctor_params > 8 {
            SmellSeverity::Critical
        } else {
            SmellSeverity::Warning
        };
        collector.push(
            SmellCategory::Design,
            "Too many dependencies",
            "> 5 constructor parameters warning, > 8 critical",
            severity,
            &ty.name,
            format!("constructor takes {max_ctor_params} parameters"),
            &ty.location.path,
            ty.location.line,
        );
    }

    // ── Class size ───────────────────────────────────────────────────────
    let member_count = ty.visible_members().count();
    if member_count > 20 {
        let severity = if member_count > 40 {
            SmellSeverity::Critical
        } else {
            SmellSeverity::Warning
        };
        collector.push(
            SmellCategory::Design,
            "Large class",
            "> 20 members warning, > 40 critical",
            severity,
            &ty.name,
            format!("{member_count} members"),
            &ty.location.path,
            ty.location.line,
        );
    }

    // ── God class ────────────────────────────────────────────────────────
    let collaborator_count = distinct_collaborators(ty);
    if member_count > 20 && collaborator_count >= 5 {
        collector.push(
            SmellCategory::Design,
            "God class",
            "> 20 members and >= 5 collaborating types",
            SmellSeverity::Critical,
            &ty.name,
            format!("{member_count} members, {collaborator_count} collaborating types"),
            &ty.location.path,
            ty.location.line,
        );
    }

    // ── Data class ───────────────────────────────────────────────────────
    let method_count = ty.methods().count();
    let property_count = ty
        .visible_members()
        .filter(|m| m.kind == SymbolKind::Property)
        .count();
    if ty.kind != SymbolKind::Record && method_count == 0 && property_count >= 2 {
        collector.push(
            SmellCategory::Design,
            "Data class",
            "no methods and >= 2 properties",
            SmellSeverity::Info,
            &ty.name,
            format!("{property_count} properties, no behavior"),
            &ty.location.path,
            ty.location.line,
        );
    }

    // ── Inheritance ──────────────────────────────────────────────────────
    let depth = inheritance_depth(handle, ty);
    if depth > 3 {
        collector.push(
            SmellCategory::Inheritance,
            "Deep inheritance",
            "> 3 levels below the root",
            SmellSeverity::Warning,
            &ty.name,
            format!("chain depth {depth}"),
            &ty.location.path,
            ty.location.line,
        );
    }
    check_refused_bequest(collector, handle, ty);

    // ── Speculative generality ───────────────────────────────────────────
    check_speculative_generality(collector, ty);
}

/// Distinct non-primitive field/property types, the type itself excluded.
fn distinct_collaborators(ty: &TypeSymbol) -> usize {
    let mut set: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for member in ty.visible_members() {
        if !matches!(member.kind, SymbolKind::Field | SymbolKind::Property) {
            continue;
        }
        let name = core_type_name(&member.ty);
        if name.is_empty() || is_primitive(&name) || name == ty.name {
            continue;
        }
        set.insert(name);
    }
    set.len()
}

fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "bool" | "byte" | "sbyte" | "char" | "decimal" | "double" | "float" | "int" | "uint"
            | "long" | "ulong" | "short" | "ushort" | "string" | "object" | "void" | "var"
            | "dynamic" | "nint" | "nuint"
    )
}

/// `List<Widget>?[]` → `List`; `Acme.Widget` → `Widget`.
fn core_type_name(ty: &str) -> String {
    let base = ty
        .split('<')
        .next()
        .unwrap_or(ty)
        .trim_end_matches(['?', '[', ']'])
        .trim();
    base.rsplit('.').next().unwrap_or(base).to_string()
}

/// Chain depth through resolvable base classes, the universal root excluded.
fn inheritance_depth(handle: &SolutionHandle, ty: &TypeSymbol) -> usize {
    let mut depth = 0usize;
    let mut current = ty.fqn.clone();
    // Base lists are text; bound the walk defensively.
    for _ in 0..64 {
        let Some(base) = resolvable_base_class(handle, &current) else {
            break;
        };
        depth += 1;
        current = base;
    }
    depth
}

fn resolvable_base_class(handle: &SolutionHandle, fqn: &str) -> Option<String> {
    let ty = handle
        .compilations
        .iter()
        .find_map(|c| c.type_by_fqn(fqn))?;
    for entry in &ty.base_list {
        let name = entry.split('<').next().unwrap_or(entry).trim();
        for c in &handle.compilations {
            if let Some(base) = c
                .types
                .iter()
                .find(|t| (t.name == name || t.fqn == name) && t.kind != SymbolKind::Interface)
            {
                return Some(base.fqn.clone());
            }
        }
    }
    None
}

/// Derived type overriding almost none of a base's virtual surface. The
/// check fires whenever the override set is incomplete (the rate in the
/// detail is informational).
fn check_refused_bequest(collector: &mut Collector, handle: &SolutionHandle, ty: &TypeSymbol) {
    for entry in &ty.base_list {
        let name = entry.split('<').next().unwrap_or(entry).trim();
        let base = handle.compilations.iter().find_map(|c| {
            c.types
                .iter()
                .find(|t| t.name == name || t.fqn == name)
        });
        let Some(base) = base else { continue };

        let virtual_members: Vec<&MemberSymbol> = base
            .visible_members()
            .filter(|m| {
                base.kind == SymbolKind::Interface
                    || m.modifiers.iter().any(|x| x == "virtual" || x == "abstract")
            })
            .filter(|m| {
                matches!(
                    m.kind,
                    SymbolKind::Method | SymbolKind::Property | SymbolKind::Event
                )
            })
            .collect();
        if virtual_members.len() < 3 {
            continue;
        }

        let overridden = virtual_members
            .iter()
            .filter(|vm| ty.visible_members().any(|m| m.name == vm.name && m.kind == vm.kind))
            .count();
        if overridden < virtual_members.len() {
            let pct = overridden * 100 / virtual_members.len();
            collector.push(
                SmellCategory::Inheritance,
                "Refused bequest",
                ">= 3 inheritable members, low override rate",
                SmellSeverity::Warning,
                &ty.name,
                format!(
                    "overrides {overridden}/{} base members ({pct}%)",
                    virtual_members.len()
                ),
                &ty.location.path,
                ty.location.line,
            );
        }
    }
}

/// A type or method generic parameter absent from every member signature.
/// The signature scan is textual but word-bounded, so `T` inside
/// `List<T[]>` counts.
fn check_speculative_generality(collector: &mut Collector, ty: &TypeSymbol) {
    let appears_in = |param: &str, haystacks: &mut dyn Iterator<Item = String>| -> bool {
        for h in haystacks {
            if contains_word(&h, param) {
                return true;
            }
        }
        false
    };

    for param in &ty.type_parameters {
        let mut uses = ty.visible_members().flat_map(|m| {
            std::iter::once(m.ty.clone())
                .chain(m.parameters.iter().map(|p| p.ty.clone()))
        });
        if !appears_in(param, &mut uses) {
            collector.push(
                SmellCategory::Design,
                "Speculative generality",
                "type parameter unused in member signatures",
                SmellSeverity::Info,
                &ty.name,
                format!("type parameter `{param}` is never used"),
                &ty.location.path,
                ty.location.line,
            );
        }
    }

    for member in ty.methods() {
        for param in &member.type_parameters {
            let mut uses = std::iter::once(member.ty.clone())
                .chain(member.parameters.iter().map(|p| p.ty.clone()));
            if !appears_in(param, &mut uses) {
                collector.push(
                    SmellCategory::Design,
                    "Speculative generality",
                    "type parameter unused in member signatures",
                    SmellSeverity::Info,
                    &format!("{}.{}", ty.name, member.name),
                    format!("type parameter `{param}` is never used"),
                    &member.location.path,
                    member.location.line,
                );
            }
        }
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let bytes = haystack.as_bytes();
    let is_word = |b: u8| b == b'_' || b.is_ascii_alphanumeric();
    for (i, _) in haystack.match_indices(word) {
        let before_ok = i == 0 || !is_word(bytes[i - 1]);
        let after = i + word.len();
        let after_ok = after >= bytes.len() || !is_word(bytes[after]);
        if before_ok && after_ok {
            return true;
        }
    }
    false
}

// ─────────────────────────────────────────────────────────────────────────────
// Feature envy (deep)
// ─────────────────────────────────────────────────────────────────────────────

/// Group member accesses in a method body by the receiver's declared type:
/// an external type accessed strictly more often than the method's own,
/// with at least three accesses, is envy.
fn check_feature_envy(
    collector: &mut Collector,
    doc: &Document,
    ty: &TypeSymbol,
    member: &MemberSymbol,
) {
    let Some((start, end)) = member.body_span else {
        return;
    };
    let Some(body) = doc
        .root()
        .descendant_for_byte_range(start, end)
        .filter(|n| n.start_byte() == start && n.end_byte() == end)
    else {
        return;
    };

    // Identifier -> declared type, from fields, parameters, and body locals.
    let mut bindings: HashMap<String, String> = HashMap::new();
    for f in ty.visible_members() {
        if matches!(f.kind, SymbolKind::Field | SymbolKind::Property) {
            bindings.insert(f.name.clone(), core_type_name(&f.ty));
        }
    }
    for p in &member.parameters {
        bindings.insert(p.name.clone(), core_type_name(&p.ty));
    }
    collect_local_bindings(body, &doc.text, &mut bindings);

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    count_member_accesses(body, &doc.text, ty, &bindings, &mut counts);

    let own = counts.get(ty.name.as_str()).copied().unwrap_or(0);
    let Some((envied, &n)) = counts
        .iter()
        .filter(|(name, _)| name.as_str() != ty.name)
        .max_by_key(|(_, &n)| n)
    else {
        return;
    };
    if n > own && n >= 3 {
        collector.push(
            SmellCategory::Design,
            "Feature envy",
            "more accesses to another type than its own",
            SmellSeverity::Warning,
            &format!("{}.{}", ty.name, member.name),
            format!("{n} accesses to `{envied}` vs {own} to `{}`", ty.name),
            &member.location.path,
            member.location.line,
        );
    }
}

fn collect_local_bindings(node: Node, text: &str, bindings: &mut HashMap<String, String>) {
    if node.kind() == "variable_declaration" {
        let ty_text = node
            .child_by_field_name("type")
            .map(|t| node_text(t, text))
            .unwrap_or("");
        let core = core_type_name(ty_text);
        if !core.is_empty() && core != "var" {
            let mut cursor = node.walk();
            for d in node.named_children(&mut cursor) {
                if d.kind() == "variable_declarator" {
                    if let Some(name) = d.child_by_field_name("name").or_else(|| d.named_child(0)) {
                        bindings.insert(node_text(name, text).to_string(), core.clone());
                    }
                }
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_local_bindings(child, text, bindings);
    }
}

fn count_member_accesses(
    node: Node,
    text: &str,
    own: &TypeSymbol,
    bindings: &HashMap<String, String>,
    counts: &mut BTreeMap<String, usize>,
) {
    if node.kind() == "member_access_expression" {
        if let Some(receiver) = node.child_by_field_name("expression") {
            let target = match receiver.kind() {
                "this_expression" => Some(own.name.clone()),
                "identifier" => {
                    let name = node_text(receiver, text);
                    bindings
                        .get(name)
                        .cloned()
                        // An unbound capitalized identifier reads as a
                        // static access to that type.
                        .or_else(|| {
                            name.chars()
                                .next()
                                .filter(|c| c.is_ascii_uppercase())
                                .map(|_| name.to_string())
                        })
                }
                _ => None,
            };
            if let Some(t) = target {
                *counts.entry(t).or_insert(0) += 1;
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count_member_accesses(child, text, own, bindings, counts);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Critical first, then warnings, then info; inside a severity, grouped by
/// smell with its threshold in the header, entries ordered by symbol.
fn render(results: &[SmellResult], handle: &SolutionHandle) -> String {
    if results.is_empty() {
        return "No code smells found.\n".to_string();
    }

    let mut out = format!("{} finding(s):\n", results.len());
    for severity in [
        SmellSeverity::Critical,
        SmellSeverity::Warning,
        SmellSeverity::Info,
    ] {
        let in_severity: Vec<&SmellResult> =
            results.iter().filter(|r| r.severity == severity).collect();
        if in_severity.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "\n== {} ({}) ==\n",
            severity.as_str().to_uppercase(),
            in_severity.len()
        ));

        let mut by_smell: BTreeMap<&str, Vec<&SmellResult>> = BTreeMap::new();
        for r in in_severity {
            by_smell.entry(r.smell).or_default().push(r);
        }
        for (smell, mut entries) in by_smell {
            entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
            out.push_str(&format!("{smell} [{}]\n", entries[0].threshold));
            for e in entries {
                out.push_str(&format!(
                    "  {} ({}) [{}]\n",
                    e.symbol,
                    e.detail,
                    paths::location_text(&e.path, handle.dir(), e.line)
                ));
            }
        }
    }
    out
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

    fn metrics_of(source: &str, method: &str) -> MethodBodyMetrics {
        let (_tmp, handle) = solution(&[("M.cs", source)]);
        let c = &handle.compilations[0];
        let doc = &c.documents[0];
        let member = c
            .types
            .iter()
            .flat_map(|t| t.members.iter())
            .find(|m| m.name == method)
            .expect("method present");
        analyze_method_body(doc, member).expect("body metrics")
    }

    #[test]
    fn expression_bodied_ternary_is_complexity_two_one_line() {
        let m = metrics_of(
            "class C { int Pick(int a, int b) => a > b ? a : b; }",
            "Pick",
        );
        assert_eq!(m.line_count, 1);
        assert_eq!(m.cyclomatic_complexity, 2);
        assert_eq!(m.max_nesting_depth, 0);
    }

    #[test]
    fn nesting_and_decisions_count() {
        let src = r#"class C {
    void M(int x) {
        if (x > 0) {
            for (int i = 0; i < x; i++) {
                while (x > i) {
                    x--;
                }
            }
        }
    }
}"#;
        let m = metrics_of(src, "M");
        assert_eq!(m.max_nesting_depth, 3);
        // if + for-condition?? decisions: if only (for/while are nesting, not
        // decision nodes in this metric).
        assert_eq!(m.cyclomatic_complexity, 2);
        assert!(!m.is_single_delegation);
    }

    #[test]
    fn short_circuit_and_coalescing_raise_complexity() {
        let m = metrics_of(
            "class C { bool M(string s, bool a, bool b) { return (s ?? \"\").Length > 0 && a || b; } }",
            "M",
        );
        // 1 + (?? + && + ||) = 4
        assert_eq!(m.cyclomatic_complexity, 4);
    }

    #[test]
    fn single_delegation_detected() {
        let m = metrics_of(
            "class C { int M() { return Inner(); } int Inner() { return 1; } }",
            "M",
        );
        assert!(m.is_single_delegation);
        let m2 = metrics_of("class C { int M() { var x = 1; return x; } }", "M");
        assert!(!m2.is_single_delegation);
    }

    #[test]
    fn middle_man_flags_delegating_type() {
        let src = r#"class Middle {
    Inner inner;
    void A() { inner.A(); }
    void B() { inner.B(); }
    int Cc() { return inner.C(); }
}
class Inner { public void A() { } public void B() { } public int C() { return 1; } }
"#;
        let (_tmp, handle) = solution(&[("M.cs", src)]);
        let report = find_code_smells(
            &handle,
            SmellCategory::Design,
            None,
            false,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(report.contains("Middle man"), "{report}");
        assert!(report.contains("3/3 methods delegate"), "{report}");
    }

    #[test]
    fn refused_bequest_reports_override_rate() {
        let src = r#"namespace N {
    public interface IFace {
        void M1();
        void M2();
        void M3();
    }
    public class C : IFace {
        public void M1() { }
    }
}"#;
        let (_tmp, handle) = solution(&[("R.cs", src)]);
        let report = find_code_smells(
            &handle,
            SmellCategory::Inheritance,
            None,
            false,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(report.contains("Refused bequest"), "{report}");
        assert!(report.contains("overrides 1/3 base members (33%)"), "{report}");
    }

    #[test]
    fn data_class_excludes_records() {
        let src = "namespace N { public class Bag { public int A { get; set; } public int B { get; set; } } public record Pair(int X, int Y); }";
        let (_tmp, handle) = solution(&[("D.cs", src)]);
        let report = find_code_smells(
            &handle,
            SmellCategory::Design,
            None,
            false,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(report.contains("Data class"), "{report}");
        assert!(report.contains("Bag"), "{report}");
        assert!(!report.contains("Pair ("), "records are exempt: {report}");
    }

    #[test]
    fn speculative_generality_spots_unused_type_parameter() {
        let src = "namespace N { public class Box<T, U> { public T Value { get; set; } public void Clear() { } } }";
        let (_tmp, handle) = solution(&[("S.cs", src)]);
        let report = find_code_smells(
            &handle,
            SmellCategory::Design,
            None,
            false,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(report.contains("Speculative generality"), "{report}");
        assert!(report.contains("`U` is never used"), "{report}");
        assert!(!report.contains("`T` is never used"), "{report}");
    }

    #[test]
    fn excluded_attributes_and_interfaces_are_skipped() {
        let src = r#"namespace N {
    [Obsolete]
    public class Old { public int A { get; set; } public int B { get; set; } }
    public interface INever { void A(); void B(); }
}"#;
        let (_tmp, handle) = solution(&[("E.cs", src)]);
        let report = find_code_smells(
            &handle,
            SmellCategory::All,
            None,
            false,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report, "No code smells found.\n");
    }

    #[test]
    fn deep_mode_finds_feature_envy() {
        let src = r#"namespace N {
    public class Wallet { public int Coins; public int Notes; public int Total; }
    public class Auditor {
        int own;
        public int Sum(Wallet w) {
            own = 0;
            return w.Coins + w.Notes + w.Total;
        }
    }
}"#;
        let (_tmp, handle) = solution(&[("F.cs", src)]);
        let shallow = find_code_smells(&handle, SmellCategory::All, None, false, &CancelToken::new()).unwrap();
        assert!(!shallow.contains("Feature envy"), "{shallow}");
        let deep = find_code_smells(&handle, SmellCategory::All, None, true, &CancelToken::new()).unwrap();
        assert!(deep.contains("Feature envy"), "{deep}");
        assert!(deep.contains("Auditor.Sum"), "{deep}");
    }

    #[test]
    fn identical_runs_render_identically() {
        let src = "namespace N { public class Bag { public int A { get; set; } public int B { get; set; } } }";
        let (_tmp, handle) = solution(&[("I.cs", src)]);
        let a = find_code_smells(&handle, SmellCategory::All, None, true, &CancelToken::new()).unwrap();
        let b = find_code_smells(&handle, SmellCategory::All, None, true, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }
}
