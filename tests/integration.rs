//! Read-only queries against the committed fixture solution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sharplens::model::SymbolKind;
use sharplens::queries;
use sharplens::references::{self, RefMode};
use sharplens::smells::{self, SmellCategory};
use sharplens::source;
use sharplens::unused::{self, UnusedScope};
use sharplens::workspace::{CancelToken, SolutionHandle, WorkspaceManager};

fn fixture_solution() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("Demo.sln")
}

fn load() -> Arc<SolutionHandle> {
    let ws = WorkspaceManager::new();
    ws.acquire(&fixture_solution(), &CancelToken::new())
        .expect("fixture solution loads")
}

#[test]
fn solution_loads_both_projects() {
    let handle = load();
    let listing = queries::list_projects(&handle);
    assert!(listing.contains("(2 projects)"), "{listing}");
    assert!(listing.contains("Greetings"));
    assert!(listing.contains("App"));
    assert!(listing.contains("net8.0"));
}

#[test]
fn project_info_reports_references_and_packages() {
    let handle = load();
    let app = queries::project_info(&handle, "App").unwrap();
    assert!(app.contains("Output type: Exe"), "{app}");
    assert!(app.contains("Project references: Greetings"), "{app}");

    let lib = queries::project_info(&handle, "Greetings").unwrap();
    assert!(lib.contains("Newtonsoft.Json 13.0.3"), "{lib}");

    assert!(queries::project_info(&handle, "Nope").is_err());
}

// An exact-name search for a method declared once returns exactly one
// result with its signature and declaration line.
#[test]
fn find_symbols_exact_hello() {
    let handle = load();
    let hits = queries::find_symbols(&handle, "Hello", None, true, false);
    assert_eq!(hits.len(), 1);
    let hit = &hits[0];
    assert_eq!(hit.kind, "method");
    assert!(hit.signature.starts_with("public"), "{}", hit.signature);
    assert!(hit.path.ends_with("Greeter.cs"), "{}", hit.path);
    assert_eq!(hit.line, 16, "declaration line is 1-based");
    assert_eq!(hit.doc_summary.as_deref(), Some("Format a greeting for one person."));
}

#[test]
fn find_symbols_filters_by_kind() {
    let handle = load();
    let classes = queries::find_symbols(&handle, "re", Some(SymbolKind::Class), false, false);
    assert!(classes.iter().all(|r| r.kind == "class"));
    assert!(classes.iter().any(|r| r.name == "Greeter"));
    assert!(classes.iter().any(|r| r.name == "SpriteRenderer"));
}

// The base chain walks nearest-first and ends at the universal root.
#[test]
fn type_hierarchy_of_a() {
    let handle = load();
    let h = queries::type_hierarchy(&handle, "A").unwrap();
    assert_eq!(h.base_types, vec!["B".to_string(), "object".to_string()]);
    assert!(h.interfaces.is_empty());
}

#[test]
fn namespaces_are_sorted_and_global_free() {
    let handle = load();
    assert_eq!(
        queries::list_namespaces(&handle),
        vec!["Demo.App".to_string(), "Demo.Greetings".to_string()]
    );
}

#[test]
fn fixture_has_no_diagnostics() {
    let handle = load();
    let d = queries::diagnostics(&handle, None).unwrap();
    assert_eq!(d, "(no diagnostics)\n");
}

#[test]
fn callers_of_hello_sit_in_main() {
    let handle = load();
    let hits = references::find_references(
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
    assert!(hits[0].path.ends_with("Program.cs"));
    assert_eq!(hits[0].containing_symbol.as_deref(), Some("Program.Main"));
    assert_eq!(hits[0].project, "App");
}

#[test]
fn project_scope_filters_reference_hits() {
    let handle = load();
    let hits = references::find_references(
        &handle,
        "Hello",
        None,
        Some("Greetings"),
        false,
        RefMode::All,
        &CancelToken::new(),
    )
    .unwrap();
    assert!(hits.iter().all(|h| h.project == "Greetings"));
    assert_eq!(hits.len(), 1, "only the declaration lives in Greetings");
}

#[test]
fn file_symbols_expand_members_at_depth_one() {
    let handle = load();
    let types_only = queries::file_symbols(
        &handle,
        Path::new("Greetings/Greeter.cs"),
        0,
        false,
    )
    .unwrap();
    assert_eq!(types_only.len(), 1);

    let expanded = queries::file_symbols(
        &handle,
        Path::new("Greetings/Greeter.cs"),
        1,
        false,
    )
    .unwrap();
    assert!(expanded.iter().any(|r| r.name == "Hello"));
    assert!(expanded.iter().any(|r| r.name == "prefix"));
}

#[test]
fn overrides_and_derived_types_of_renderer() {
    let handle = load();
    let overrides = queries::find_overrides(&handle, "Renderer", "Draw").unwrap();
    assert_eq!(overrides.len(), 1);
    assert!(overrides[0].fqn.contains("SpriteRenderer"));

    let derived = queries::find_derived_types(&handle, "Renderer").unwrap();
    assert_eq!(derived.len(), 1);
}

// A derived type overriding one of three virtual base members is flagged
// with the actual override rate in the detail.
#[test]
fn refused_bequest_on_sprite_renderer() {
    let handle = load();
    let report = smells::find_code_smells(
        &handle,
        SmellCategory::Inheritance,
        None,
        false,
        &CancelToken::new(),
    )
    .unwrap();
    assert!(report.contains("Refused bequest"), "{report}");
    assert!(report.contains("SpriteRenderer"), "{report}");
    assert!(
        report.contains("overrides 1/3 base members (33%)"),
        "{report}"
    );
}

#[test]
fn smell_runs_are_deterministic() {
    let handle = load();
    let a = smells::find_code_smells(&handle, SmellCategory::All, None, true, &CancelToken::new())
        .unwrap();
    let b = smells::find_code_smells(&handle, SmellCategory::All, None, true, &CancelToken::new())
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn fixture_has_no_unused_private_code() {
    let handle = load();
    let report =
        unused::find_unused_code(&handle, UnusedScope::Private, None, &CancelToken::new()).unwrap();
    assert!(report.contains("No unused symbols found."), "{report}");
}

#[test]
fn symbol_source_returns_greeter_class() {
    let handle = load();
    let text = source::symbol_source(&handle, "Greeter", None).unwrap();
    assert!(text.starts_with("// class `Greeter`"), "{text}");
    assert!(text.contains("private readonly string prefix;"));
}

#[test]
fn file_content_windows_are_one_based() {
    let handle = load();
    let text = source::file_content(
        &handle,
        Path::new("Greetings/Greeter.cs"),
        Some(6),
        Some(6),
    )
    .unwrap();
    assert_eq!(text, "    6 |     public class Greeter\n");
}
