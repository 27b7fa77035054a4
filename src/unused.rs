//! Report-only dead-code scan.
//!
//! Conservative by design: public symbols, entry points, and
//! attribute-exempted types are never reported, because callers outside the
//! solution (frameworks, reflection, package consumers) are invisible to
//! this analysis. A symbol is "unused" when no identifier occurrence exists
//! anywhere beyond its own declaration.

use crate::error::{Error, Result};
use crate::model::{MemberSymbol, SymbolKind, TypeSymbol};
use crate::paths;
use crate::references;
use crate::smells::has_excluded_attribute;
use crate::workspace::{CancelToken, SolutionHandle};

const ENTRY_POINT_TYPE: &str = "Program";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedScope {
    /// Everything non-public.
    All,
    /// `private` symbols only.
    Private,
    /// `internal` (and `private protected`) symbols only.
    Internal,
}

impl UnusedScope {
    pub fn parse(s: &str) -> Result<UnusedScope> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(UnusedScope::All),
            "private" => Ok(UnusedScope::Private),
            "internal" => Ok(UnusedScope::Internal),
            other => Err(Error::invalid_input(format!(
                "unknown scope `{other}` (expected all, private, or internal)"
            ))),
        }
    }

    fn admits(&self, accessibility: &str) -> bool {
        match self {
            UnusedScope::All => accessibility != "public",
            UnusedScope::Private => accessibility == "private",
            UnusedScope::Internal => {
                accessibility == "internal" || accessibility == "private protected"
            }
        }
    }
}

struct Candidate {
    kind: &'static str,
    display: String,
    name: String,
    path: std::path::PathBuf,
    line: usize,
    /// Number of identifier occurrences the declaration itself accounts for.
    declaration_occurrences: usize,
}

const ENTRY_POINT_METHOD: &str = "Main";

fn member_candidate(ty: &TypeSymbol, member: &MemberSymbol) -> Option<Candidate> {
    if member.is_implicit() || member.name == ENTRY_POINT_METHOD {
        return None;
    }
    if member.kind == SymbolKind::Constructor {
        // Constructors share the type's name; occurrence counting cannot
        // separate them from the type.
        return None;
    }
    Some(Candidate {
        kind: member.kind.as_str(),
        display: format!("{}.{}", ty.fqn, member.name),
        name: member.name.clone(),
        path: member.location.path.clone(),
        line: member.location.line,
        declaration_occurrences: 1,
    })
}

fn type_candidate(ty: &TypeSymbol) -> Candidate {
    // The declaration identifier plus one per constructor/destructor, which
    // repeat the type name.
    let ctor_mentions = ty
        .members
        .iter()
        .filter(|m| m.kind == SymbolKind::Constructor)
        .count();
    Candidate {
        kind: ty.kind.as_str(),
        display: ty.fqn.clone(),
        name: ty.name.clone(),
        path: ty.location.path.clone(),
        line: ty.location.line,
        declaration_occurrences: 1 + ctor_mentions,
    }
}

/// List symbols with no reference beyond their declaration.
pub fn find_unused_code(
    handle: &SolutionHandle,
    scope: UnusedScope,
    project_name: Option<&str>,
    cancel: &CancelToken,
) -> Result<String> {
    if let Some(name) = project_name {
        handle.project(name)?;
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for compilation in &handle.compilations {
        if let Some(name) = project_name {
            if compilation.project_name != name {
                continue;
            }
        }
        for ty in &compilation.types {
            if ty.is_implicit() || ty.name == ENTRY_POINT_TYPE || has_excluded_attribute(ty) {
                continue;
            }
            if !seen.insert(ty.fqn.clone()) {
                continue;
            }

            if scope.admits(&ty.accessibility) {
                candidates.push(type_candidate(ty));
            }
            for member in ty.visible_members() {
                if scope.admits(&member.accessibility) {
                    if let Some(c) = member_candidate(ty, member) {
                        candidates.push(c);
                    }
                }
            }
        }
    }

    // Count identifier occurrences per candidate name across the whole
    // solution (not just the scoped project: another project may use it).
    let mut unused: Vec<&Candidate> = Vec::new();
    for candidate in &candidates {
        cancel.check()?;
        let mut occurrences = 0usize;
        let mut counted: std::collections::HashSet<(String, usize, usize)> =
            std::collections::HashSet::new();
        'outer: for compilation in &handle.compilations {
            for doc in &compilation.documents {
                if !doc.text.contains(candidate.name.as_str()) {
                    continue;
                }
                for node in references::identifier_occurrences(doc, &candidate.name) {
                    let (line, col) = doc.line_col(node.start_byte());
                    if counted.insert((doc.path.to_string_lossy().to_lowercase(), line, col)) {
                        occurrences += 1;
                    }
                    if occurrences > candidate.declaration_occurrences {
                        break 'outer;
                    }
                }
            }
        }
        if occurrences <= candidate.declaration_occurrences {
            unused.push(candidate);
        }
    }

    let mut out = String::new();
    out.push_str("Unused-code report (conservative: public symbols and entry points are never listed;\nname-based matching treats any same-name mention as a use).\n");
    if unused.is_empty() {
        out.push_str("\nNo unused symbols found.\n");
        return Ok(out);
    }
    out.push_str(&format!("\n{} unused symbol(s):\n", unused.len()));
    unused.sort_by(|a, b| (&a.path, a.line).cmp(&(&b.path, b.line)));
    for c in unused {
        out.push_str(&format!(
            "  [{:<11}] {} [{}]\n",
            c.kind,
            c.display,
            paths::location_text(&c.path, handle.dir(), c.line)
        ));
    }
    Ok(out)
}
