//! Name resolution across the whole solution.
//!
//! Matching accepts either the short name or the fully qualified display
//! form. Identical entities seen through overlapping project directories are
//! deduplicated before the 0/1/N decision: zero matches is `NotFound`, two
//! or more distinct declarations is `Ambiguous` with every candidate listed.

use std::collections::HashSet;

use crate::error::{warn, Error, Result};
use crate::model::{Compilation, MemberSymbol, SymbolKind, TypeSymbol};
use crate::paths;
use crate::workspace::SolutionHandle;

/// A resolved type plus the compilation it came from.
#[derive(Clone, Copy)]
pub struct TypeRef<'a> {
    pub compilation: &'a Compilation,
    pub ty: &'a TypeSymbol,
}

/// A resolved member plus its containing type.
#[derive(Clone, Copy)]
pub struct MemberRef<'a> {
    pub compilation: &'a Compilation,
    pub ty: &'a TypeSymbol,
    pub member: &'a MemberSymbol,
}

pub enum Resolved<'a> {
    Type(TypeRef<'a>),
    Member(MemberRef<'a>),
}

impl<'a> Resolved<'a> {
    pub fn name(&self) -> &str {
        match self {
            Resolved::Type(t) => &t.ty.name,
            Resolved::Member(m) => &m.member.name,
        }
    }

    pub fn kind(&self) -> SymbolKind {
        match self {
            Resolved::Type(t) => t.ty.kind,
            Resolved::Member(m) => m.member.kind,
        }
    }
}

/// Every named type in every compilation, nested types included, identical
/// declarations deduplicated by (fqn, file, line).
pub fn all_named_types(handle: &SolutionHandle) -> Vec<TypeRef<'_>> {
    let mut seen: HashSet<(String, String, usize)> = HashSet::new();
    let mut out = Vec::new();
    for compilation in &handle.compilations {
        for ty in &compilation.types {
            let key = (
                ty.fqn.clone(),
                ty.location.path.to_string_lossy().to_lowercase(),
                ty.location.line,
            );
            if seen.insert(key) {
                out.push(TypeRef { compilation, ty });
            }
        }
    }
    out
}

fn type_matches(ty: &TypeSymbol, name: &str) -> bool {
    ty.name == name || ty.fqn == name
}

fn candidate_line(handle: &SolutionHandle, ty: &TypeSymbol) -> String {
    format!(
        "  {} [{}]",
        ty.fqn,
        paths::location_text(&ty.location.path, handle.dir(), ty.location.line)
    )
}

/// Resolve a type by short or fully qualified name.
pub fn resolve_type<'a>(handle: &'a SolutionHandle, name: &str) -> Result<TypeRef<'a>> {
    let matches: Vec<TypeRef<'a>> = all_named_types(handle)
        .into_iter()
        .filter(|t| type_matches(t.ty, name))
        .collect();

    match matches.len() {
        0 => Err(Error::not_found(format!("type `{name}`"))),
        1 => Ok(matches[0]),
        _ => Err(Error::Ambiguous {
            name: name.to_string(),
            candidates: matches
                .iter()
                .map(|t| candidate_line(handle, t.ty))
                .collect(),
        }),
    }
}

/// Resolve a type or member by name. With `containing_type` the search is the
/// first matching member of that type; without it, the whole solution.
pub fn resolve_symbol<'a>(
    handle: &'a SolutionHandle,
    name: &str,
    containing_type: Option<&str>,
) -> Result<Resolved<'a>> {
    if let Some(type_name) = containing_type {
        let owner = resolve_type(handle, type_name)?;
        let member = owner
            .ty
            .visible_members()
            .find(|m| m.name == name)
            .ok_or_else(|| {
                Error::not_found(format!("member `{name}` on type `{}`", owner.ty.fqn))
            })?;
        return Ok(Resolved::Member(MemberRef {
            compilation: owner.compilation,
            ty: owner.ty,
            member,
        }));
    }

    let mut type_hits: Vec<TypeRef<'a>> = Vec::new();
    let mut member_hits: Vec<MemberRef<'a>> = Vec::new();
    for t in all_named_types(handle) {
        if type_matches(t.ty, name) {
            type_hits.push(t);
        }
        for member in t.ty.visible_members() {
            // Constructors share the type's name; the type hit covers them.
            if member.kind == SymbolKind::Constructor {
                continue;
            }
            if member.name == name {
                member_hits.push(MemberRef {
                    compilation: t.compilation,
                    ty: t.ty,
                    member,
                });
            }
        }
    }

    let total = type_hits.len() + member_hits.len();
    match total {
        0 => Err(Error::not_found(format!("symbol `{name}`"))),
        1 => match type_hits.first() {
            Some(&t) => Ok(Resolved::Type(t)),
            None => Ok(Resolved::Member(member_hits[0])),
        },
        _ => {
            let mut candidates: Vec<String> = type_hits
                .iter()
                .map(|t| candidate_line(handle, t.ty))
                .collect();
            candidates.extend(member_hits.iter().map(|m| {
                format!(
                    "  {}.{} [{}]",
                    m.ty.fqn,
                    m.member.name,
                    paths::location_text(&m.member.location.path, handle.dir(), m.member.location.line)
                )
            }));
            Err(Error::Ambiguous {
                name: name.to_string(),
                candidates,
            })
        }
    }
}

/// Resolve a method. Several overloads are not an error: the first one wins
/// and a warning goes to the side channel.
pub fn resolve_method<'a>(
    handle: &'a SolutionHandle,
    name: &str,
    containing_type: Option<&str>,
) -> Result<MemberRef<'a>> {
    let mut hits: Vec<MemberRef<'a>> = Vec::new();

    if let Some(type_name) = containing_type {
        let owner = resolve_type(handle, type_name)?;
        for member in owner.ty.visible_members() {
            if member.name == name && member.kind == SymbolKind::Method {
                hits.push(MemberRef {
                    compilation: owner.compilation,
                    ty: owner.ty,
                    member,
                });
            }
        }
    } else {
        for t in all_named_types(handle) {
            for member in t.ty.visible_members() {
                if member.name == name && member.kind == SymbolKind::Method {
                    hits.push(MemberRef {
                        compilation: t.compilation,
                        ty: t.ty,
                        member,
                    });
                }
            }
        }
    }

    match hits.len() {
        0 => Err(Error::not_found(format!("method `{name}`"))),
        1 => Ok(hits[0]),
        n => {
            // Distinct containing types are a real ambiguity; same-type hits
            // are overloads and the first declaration wins.
            let distinct_types: HashSet<&str> =
                hits.iter().map(|m| m.ty.fqn.as_str()).collect();
            if distinct_types.len() > 1 {
                return Err(Error::Ambiguous {
                    name: name.to_string(),
                    candidates: hits
                        .iter()
                        .map(|m| {
                            format!(
                                "  {}.{} [{}]",
                                m.ty.fqn,
                                m.member.name,
                                paths::location_text(
                                    &m.member.location.path,
                                    handle.dir(),
                                    m.member.location.line
                                )
                            )
                        })
                        .collect(),
                });
            }
            warn(format!(
                "method `{name}` has {n} overloads; using the first declaration"
            ));
            Ok(hits[0])
        }
    }
}
