//! Solution and project loading.
//!
//! Handles the two entry-point shapes a request may name:
//!  - `.sln` solution files (plain-text project table)
//!  - a single SDK-style `.csproj`
//!
//! Produces a flat [`SolutionLayout`] of project descriptors. Project XML is
//! read with quick-xml; only the fields the rest of the engine consumes are
//! extracted (target framework, output type, package / project references).
//! Source documents are every `.cs` file under the project directory, found
//! with the same walker and exclusion idiom the scanner uses.

use anyhow::Context;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::paths;

#[derive(Debug, Clone)]
pub struct PackageReference {
    pub id: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Project name (csproj file stem).
    pub name: String,
    /// Absolute path to the `.csproj` file.
    pub path: PathBuf,
    /// Absolute project directory.
    pub root: PathBuf,
    /// `<TargetFramework>` (or the first of `<TargetFrameworks>`), empty if absent.
    pub target_framework: String,
    /// `<OutputType>`, defaulted to `Library` when absent (SDK default).
    pub output_type: String,
    /// Absolute paths of all `.cs` documents, sorted.
    pub documents: Vec<PathBuf>,
    /// Names of referenced projects (csproj stems).
    pub project_references: Vec<String>,
    pub package_references: Vec<PackageReference>,
}

#[derive(Debug, Clone)]
pub struct SolutionLayout {
    /// Normalized entry path (`.sln` or `.csproj`).
    pub path: PathBuf,
    /// Directory every displayed path is made relative to.
    pub dir: PathBuf,
    pub projects: Vec<ProjectLayout>,
}

/// Load the project graph for a solution or single-project entry point.
pub fn load_layout(entry: &Path) -> Result<SolutionLayout> {
    let entry = paths::normalize(entry);
    if !entry.exists() {
        return Err(Error::not_found(format!(
            "solution or project file {}",
            entry.display()
        )));
    }

    let ext = entry
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dir = entry
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let project_paths: Vec<PathBuf> = match ext.as_str() {
        "sln" => parse_sln_projects(&entry)?,
        "csproj" => vec![entry.clone()],
        _ => {
            return Err(Error::invalid_input(format!(
                "{} is neither a .sln nor a .csproj",
                entry.display()
            )))
        }
    };

    let mut projects = Vec::with_capacity(project_paths.len());
    for p in project_paths {
        projects.push(load_project(&p)?);
    }

    Ok(SolutionLayout {
        path: entry,
        dir,
        projects,
    })
}

fn sln_project_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Project("{GUID}") = "Name", "rel\path.csproj", "{GUID}"
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^Project\("\{[^}]+\}"\)\s*=\s*"([^"]+)",\s*"([^"]+)""#).unwrap()
    })
}

/// Parse the project table of a `.sln`. Non-csproj entries (solution folders,
/// shared projects) are skipped.
fn parse_sln_projects(sln: &Path) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(sln)
        .map_err(|e| Error::load_failed(sln, format!("reading solution: {e}")))?;
    let dir = sln.parent().unwrap_or_else(|| Path::new("."));

    let mut out = Vec::new();
    for cap in sln_project_re().captures_iter(&text) {
        let rel = cap[2].replace('\\', "/");
        if !rel.to_ascii_lowercase().ends_with(".csproj") {
            continue;
        }
        let abs = paths::absolutize(dir, Path::new(&rel));
        if !abs.exists() {
            return Err(Error::load_failed(
                sln,
                format!("solution references missing project {}", abs.display()),
            ));
        }
        out.push(abs);
    }

    if out.is_empty() {
        // A solution with zero projects is a legal, if empty, workspace.
        crate::error::warn(format!("{}: no project entries", sln.display()));
    }
    Ok(out)
}

/// Read one `.csproj` and discover its documents.
fn load_project(csproj: &Path) -> Result<ProjectLayout> {
    let name = csproj
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    let root = csproj
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let props = parse_csproj(csproj)
        .map_err(|e| Error::load_failed(csproj, format!("parsing project XML: {e}")))?;

    let documents = discover_documents(&root)
        .map_err(|e| Error::load_failed(csproj, format!("enumerating sources: {e}")))?;

    Ok(ProjectLayout {
        name,
        path: csproj.to_path_buf(),
        root,
        target_framework: props.target_framework,
        output_type: props.output_type,
        documents,
        project_references: props.project_references,
        package_references: props.package_references,
    })
}

#[derive(Default)]
struct CsprojProps {
    target_framework: String,
    output_type: String,
    project_references: Vec<String>,
    package_references: Vec<PackageReference>,
}

fn parse_csproj(csproj: &Path) -> anyhow::Result<CsprojProps> {
    let text = std::fs::read_to_string(csproj)
        .with_context(|| format!("reading {}", csproj.display()))?;

    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut props = CsprojProps::default();
    let mut element_stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                element_stack.push(tag);
            }
            Ok(Event::Empty(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match tag.as_str() {
                    "PackageReference" => {
                        let id = attr_value(e, "Include").unwrap_or_default();
                        let version = attr_value(e, "Version").unwrap_or_default();
                        if !id.is_empty() {
                            props.package_references.push(PackageReference { id, version });
                        }
                    }
                    "ProjectReference" => {
                        if let Some(include) = attr_value(e, "Include") {
                            let rel = include.replace('\\', "/");
                            if let Some(stem) = Path::new(&rel).file_stem() {
                                props
                                    .project_references
                                    .push(stem.to_string_lossy().into_owned());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref t)) => {
                let value = t.unescape().unwrap_or_default().trim().to_string();
                match element_stack.last().map(String::as_str) {
                    Some("TargetFramework") => props.target_framework = value,
                    Some("TargetFrameworks") => {
                        // Multi-target projects list frameworks `;`-separated;
                        // the engine only needs a representative one.
                        props.target_framework =
                            value.split(';').next().unwrap_or("").trim().to_string();
                    }
                    Some("OutputType") => props.output_type = value,
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                element_stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                anyhow::bail!(
                    "XML parse error at position {}: {e}",
                    reader.error_position()
                );
            }
            _ => {}
        }
    }

    if props.output_type.is_empty() {
        props.output_type = "Library".to_string();
    }
    Ok(props)
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Directory names never worth walking for sources or staleness checks.
fn source_walk_overrides(root: &Path) -> anyhow::Result<ignore::overrides::Override> {
    let mut ob = OverrideBuilder::new(root);
    for d in [".git", "bin", "obj", ".vs", "packages", "node_modules", "TestResults"] {
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }
    Ok(ob.build()?)
}

/// Every `.cs` file under `root`, honouring `.gitignore` and the hard
/// exclusion list, sorted for deterministic ordering.
pub fn discover_documents(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let overrides = source_walk_overrides(root)?;
    let walker = WalkBuilder::new(root)
        .standard_filters(true)
        .overrides(overrides)
        .build();

    let mut out = Vec::new();
    for item in walker {
        let Ok(dent) = item else { continue };
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = dent.into_path();
        let is_cs = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("cs"))
            .unwrap_or(false);
        if is_cs {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Latest modification time of any source, project, or solution file under
/// `dir`. Used by the staleness check; errors bubble so the caller can treat
/// an unreadable tree as stale.
pub fn latest_source_mtime(dir: &Path) -> anyhow::Result<SystemTime> {
    let overrides = source_walk_overrides(dir)?;
    let walker = WalkBuilder::new(dir)
        .standard_filters(true)
        .overrides(overrides)
        .build();

    let mut latest = SystemTime::UNIX_EPOCH;
    for item in walker {
        let dent = item?;
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let watched = dent
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_ascii_lowercase();
                e == "cs" || e == "csproj" || e == "sln"
            })
            .unwrap_or(false);
        if !watched {
            continue;
        }
        let modified = dent
            .metadata()
            .with_context(|| format!("stat {}", dent.path().display()))?
            .modified()?;
        if modified > latest {
            latest = modified;
        }
    }
    Ok(latest)
}
