//! Line-delimited JSON-RPC 2.0 server over stdin/stdout.
//!
//! The protocol layer stays thin: `initialize`, `ping`, `tools/list`, and
//! `tools/call` plus empty `resources/list` / `prompts/list`. Tool payloads
//! are the plain-text results of the core modules; every failure renders as
//! a single `Error: <message>` content line with `isError: true`. Stdout
//! carries the protocol only — warnings go to stderr.

use anyhow::Result;
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::format;
use crate::model::SymbolKind;
use crate::queries;
use crate::refactor::{self, RenameOptions};
use crate::references::{self, RefMode};
use crate::signature;
use crate::smells::{self, SmellCategory};
use crate::source;
use crate::unused::{self, UnusedScope};
use crate::workspace::{CancelToken, WorkspaceManager};

pub struct ServerState {
    workspace: WorkspaceManager,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            workspace: WorkspaceManager::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument helpers
// ─────────────────────────────────────────────────────────────────────────────

fn required_str<'a>(args: &'a Value, key: &str) -> std::result::Result<&'a str, Error> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::invalid_input(format!("missing required argument `{key}`")))
}

fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn opt_bool(args: &Value, key: &str) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn opt_usize(args: &Value, key: &str) -> Option<usize> {
    args.get(key).and_then(|v| v.as_u64()).map(|n| n as usize)
}

fn solution_path(args: &Value) -> std::result::Result<PathBuf, Error> {
    required_str(args, "solutionPath").map(PathBuf::from)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool table
// ─────────────────────────────────────────────────────────────────────────────

struct ToolSpec {
    name: &'static str,
    description: &'static str,
    schema: fn() -> Value,
}

fn solution_schema(extra: &[(&str, &str, bool)]) -> Value {
    let mut props = serde_json::Map::new();
    props.insert(
        "solutionPath".to_string(),
        json!({"type": "string", "description": "Absolute path to the .sln or .csproj"}),
    );
    let mut required = vec![json!("solutionPath")];
    for (name, desc, req) in extra {
        props.insert((*name).to_string(), json!({"type": "string", "description": desc}));
        if *req {
            required.push(json!(name));
        }
    }
    json!({"type": "object", "properties": Value::Object(props), "required": required})
}

/// The dispatcher's hand-registered tool table; nothing is discovered at
/// runtime.
static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "listProjects",
        description: "List every project in the solution with framework, output type, and file count.",
        schema: || solution_schema(&[]),
    },
    ToolSpec {
        name: "projectInfo",
        description: "Details for one project: framework, output type, project and package references.",
        schema: || solution_schema(&[("projectName", "Project to describe", true)]),
    },
    ToolSpec {
        name: "listSourceFiles",
        description: "List source files, optionally for a single project.",
        schema: || solution_schema(&[("projectName", "Restrict to one project", false)]),
    },
    ToolSpec {
        name: "diagnostics",
        description: "Compiler-surface diagnostics (warning or higher), errors first.",
        schema: || solution_schema(&[("projectName", "Restrict to one project", false)]),
    },
    ToolSpec {
        name: "findSymbols",
        description: "Search symbols by name: case-insensitive substring by default, exact with exact=true. Optional kind filter (class, method, property, ...).",
        schema: || solution_schema(&[
            ("query", "Name or name fragment", true),
            ("kind", "Restrict to one symbol kind", false),
            ("exact", "true for exact-name match", false),
            ("detail", "compact (default) or full", false),
        ]),
    },
    ToolSpec {
        name: "fileSymbols",
        description: "Type declarations of one file; depth=1 expands members.",
        schema: || solution_schema(&[
            ("filePath", "Source file, absolute or solution-relative", true),
            ("depth", "0 = types only, 1 = with members", false),
            ("detail", "compact (default) or full", false),
        ]),
    },
    ToolSpec {
        name: "typeMembers",
        description: "All members of a type with signatures.",
        schema: || solution_schema(&[
            ("typeName", "Short or fully qualified type name", true),
            ("detail", "compact (default) or full", false),
        ]),
    },
    ToolSpec {
        name: "listNamespaces",
        description: "Distinct namespaces containing source-defined types.",
        schema: || solution_schema(&[]),
    },
    ToolSpec {
        name: "findDerivedTypes",
        description: "Implementations of an interface, or the transitive derived classes of a class.",
        schema: || solution_schema(&[("typeName", "Interface or class name", true)]),
    },
    ToolSpec {
        name: "typeHierarchy",
        description: "Base-type chain (nearest to object) and the transitive interface set.",
        schema: || solution_schema(&[("typeName", "Type to inspect", true)]),
    },
    ToolSpec {
        name: "findOverrides",
        description: "Overrides of a virtual or abstract method in derived types.",
        schema: || solution_schema(&[
            ("typeName", "Declaring type", true),
            ("methodName", "Virtual/abstract method", true),
        ]),
    },
    ToolSpec {
        name: "findReferences",
        description: "References to a symbol. mode=all|callers|usages; callers requires a method. detail=full adds two context lines around each hit.",
        schema: || solution_schema(&[
            ("symbolName", "Symbol to trace", true),
            ("containingType", "Disambiguate by declaring type", false),
            ("projectScope", "Drop hits outside this project", false),
            ("mode", "all (default), callers, or usages", false),
            ("detail", "compact (default) or full", false),
        ]),
    },
    ToolSpec {
        name: "symbolSource",
        description: "Full declaration source of a symbol with a file/line header.",
        schema: || solution_schema(&[
            ("symbolName", "Symbol to read", true),
            ("containingType", "Disambiguate by declaring type", false),
        ]),
    },
    ToolSpec {
        name: "fileContent",
        description: "Raw file content with 1-based line numbers; optional startLine/endLine window. Files over 5 MiB are rejected.",
        schema: || solution_schema(&[
            ("filePath", "File to read, absolute or solution-relative", true),
            ("startLine", "1-based first line", false),
            ("endLine", "1-based last line (inclusive)", false),
        ]),
    },
    ToolSpec {
        name: "rename",
        description: "Rename a type or member across all references; the declaring file moves with a renamed type. Optionally rewrites string/comment mentions.",
        schema: || solution_schema(&[
            ("symbolName", "Current name", true),
            ("newName", "New identifier", true),
            ("containingType", "Disambiguate by declaring type", false),
            ("renameInStrings", "Also rewrite string/comment mentions", false),
        ]),
    },
    ToolSpec {
        name: "extractInterface",
        description: "Generate an interface from a class's public non-static members. Preview unless apply=true.",
        schema: || solution_schema(&[
            ("typeName", "Class or struct", true),
            ("interfaceName", "Defaults to I{TypeName}", false),
            ("apply", "Write the interface file and base-list edit", false),
        ]),
    },
    ToolSpec {
        name: "implementInterface",
        description: "Add not-implemented stubs for missing interface members of a class.",
        schema: || solution_schema(&[
            ("typeName", "Class or struct", true),
            ("interfaceName", "One declared interface (default: all)", false),
        ]),
    },
    ToolSpec {
        name: "changeSignature",
        description: "Add, remove, or reorder parameters, updating the declaration and every direct call site. Added parameters may carry `= default` values.",
        schema: || solution_schema(&[
            ("methodName", "Method to change", true),
            ("containingType", "Disambiguate by declaring type", false),
            ("addParameters", "Comma-separated `type name [= default]` specs", false),
            ("removeParameters", "Comma-separated parameter names", false),
            ("reorderParameters", "Comma-separated surviving parameter names, new order first", false),
        ]),
    },
    ToolSpec {
        name: "findUnusedCode",
        description: "Report-only dead-code scan. scope=all|private|internal; public symbols are never listed.",
        schema: || solution_schema(&[
            ("scope", "all (default), private, or internal", false),
            ("projectName", "Restrict candidates to one project", false),
        ]),
    },
    ToolSpec {
        name: "findCodeSmells",
        description: "Code-smell report: body metrics, structural checks, and (deep=true) feature envy. category=all|complexity|design|inheritance.",
        schema: || solution_schema(&[
            ("category", "all (default), complexity, design, or inheritance", false),
            ("projectName", "Restrict to one project", false),
            ("deep", "Enable the semantic deep check", false),
        ]),
    },
];

impl ServerState {
    fn tool_list(&self, id: Value) -> Value {
        let tools: Vec<Value> = TOOLS
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": (t.schema)(),
                })
            })
            .collect();
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "tools": tools }
        })
    }

    fn tool_call(&mut self, id: Value, params: &Value) -> Value {
        let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        let ok = |text: String| {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{"type": "text", "text": text }], "isError": false }
            })
        };
        let err = |msg: String| {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{"type": "text", "text": format!("Error: {msg}") }], "isError": true }
            })
        };

        match self.dispatch(name, &args) {
            Ok(text) => ok(text),
            Err(e) => err(e.to_string()),
        }
    }

    /// Route one tool invocation into the core.
    fn dispatch(&mut self, name: &str, args: &Value) -> std::result::Result<String, Error> {
        crate::debug_log!("[sharplens] tool call: {name}");
        let cancel = CancelToken::new();
        let ws = &self.workspace;

        match name {
            "listProjects" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                Ok(queries::list_projects(&handle))
            }
            "projectInfo" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                queries::project_info(&handle, required_str(args, "projectName")?)
            }
            "listSourceFiles" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                queries::source_files(&handle, opt_str(args, "projectName"))
            }
            "diagnostics" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                queries::diagnostics(&handle, opt_str(args, "projectName"))
            }
            "findSymbols" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let kind = match opt_str(args, "kind") {
                    Some(k) => Some(SymbolKind::parse(k).ok_or_else(|| {
                        Error::invalid_input(format!("unknown symbol kind `{k}`"))
                    })?),
                    None => None,
                };
                let full = opt_str(args, "detail") == Some("full");
                let results = queries::find_symbols(
                    &handle,
                    required_str(args, "query")?,
                    kind,
                    opt_bool(args, "exact"),
                    full,
                );
                Ok(format::render_symbol_list(&results, full))
            }
            "fileSymbols" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let depth = opt_usize(args, "depth").unwrap_or(0).min(1) as u8;
                let full = opt_str(args, "detail") == Some("full");
                let results = queries::file_symbols(
                    &handle,
                    Path::new(required_str(args, "filePath")?),
                    depth,
                    full,
                )?;
                Ok(format::render_symbol_list(&results, full))
            }
            "typeMembers" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let full = opt_str(args, "detail") == Some("full");
                let results =
                    queries::type_members(&handle, required_str(args, "typeName")?, full)?;
                Ok(format::render_symbol_list(&results, full))
            }
            "listNamespaces" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let namespaces = queries::list_namespaces(&handle);
                if namespaces.is_empty() {
                    Ok("(no namespaces)\n".to_string())
                } else {
                    Ok(namespaces.join("\n") + "\n")
                }
            }
            "findDerivedTypes" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let results =
                    queries::find_derived_types(&handle, required_str(args, "typeName")?)?;
                Ok(format::render_symbol_list(&results, false))
            }
            "typeHierarchy" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let h = queries::type_hierarchy(&handle, required_str(args, "typeName")?)?;
                let mut out = format!("{} {}\n", h.kind, h.name);
                out.push_str(&format!("  base types: {}\n", if h.base_types.is_empty() { "(none)".to_string() } else { h.base_types.join(" -> ") }));
                out.push_str(&format!("  interfaces: {}\n", if h.interfaces.is_empty() { "(none)".to_string() } else { h.interfaces.join(", ") }));
                Ok(out)
            }
            "findOverrides" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let results = queries::find_overrides(
                    &handle,
                    required_str(args, "typeName")?,
                    required_str(args, "methodName")?,
                )?;
                Ok(format::render_symbol_list(&results, false))
            }
            "findReferences" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let mode = RefMode::parse(opt_str(args, "mode").unwrap_or("all"))?;
                let full = opt_str(args, "detail") == Some("full");
                let hits = references::find_references(
                    &handle,
                    required_str(args, "symbolName")?,
                    opt_str(args, "containingType"),
                    opt_str(args, "projectScope"),
                    full,
                    mode,
                    &cancel,
                )?;
                Ok(format::render_reference_list(&hits, handle.dir(), full))
            }
            "symbolSource" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                source::symbol_source(
                    &handle,
                    required_str(args, "symbolName")?,
                    opt_str(args, "containingType"),
                )
            }
            "fileContent" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                source::file_content(
                    &handle,
                    Path::new(required_str(args, "filePath")?),
                    opt_usize(args, "startLine"),
                    opt_usize(args, "endLine"),
                )
            }
            "rename" => refactor::rename(
                ws,
                &solution_path(args)?,
                required_str(args, "symbolName")?,
                opt_str(args, "containingType"),
                required_str(args, "newName")?,
                RenameOptions {
                    include_strings_and_comments: opt_bool(args, "renameInStrings"),
                },
                &cancel,
            ),
            "extractInterface" => refactor::extract_interface(
                ws,
                &solution_path(args)?,
                required_str(args, "typeName")?,
                opt_str(args, "interfaceName"),
                opt_bool(args, "apply"),
                &cancel,
            ),
            "implementInterface" => refactor::implement_interface(
                ws,
                &solution_path(args)?,
                required_str(args, "typeName")?,
                opt_str(args, "interfaceName"),
                &cancel,
            ),
            "changeSignature" => signature::change_signature(
                ws,
                &solution_path(args)?,
                required_str(args, "methodName")?,
                opt_str(args, "containingType"),
                opt_str(args, "addParameters"),
                opt_str(args, "removeParameters"),
                opt_str(args, "reorderParameters"),
                &cancel,
            ),
            "findUnusedCode" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let scope = UnusedScope::parse(opt_str(args, "scope").unwrap_or("all"))?;
                unused::find_unused_code(&handle, scope, opt_str(args, "projectName"), &cancel)
            }
            "findCodeSmells" => {
                let handle = ws.acquire(&solution_path(args)?, &cancel)?;
                let category = SmellCategory::parse(opt_str(args, "category").unwrap_or("all"))?;
                smells::find_code_smells(
                    &handle,
                    category,
                    opt_str(args, "projectName"),
                    opt_bool(args, "deep"),
                    &cancel,
                )
            }
            other => Err(Error::not_found(format!("tool `{other}`"))),
        }
    }
}

pub fn run_stdio_server() -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    let mut state = ServerState::default();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        // JSON-RPC notifications have no "id" field — don't respond.
        if msg.get("id").is_none() {
            continue;
        }

        let id = msg.get("id").cloned().unwrap_or(json!(null));
        let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("");

        let reply = match method {
            "initialize" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": msg.get("params").and_then(|p| p.get("protocolVersion")).cloned().unwrap_or(json!("2024-11-05")),
                    "capabilities": { "tools": { "listChanged": true } },
                    "serverInfo": { "name": "sharplens", "version": env!("CARGO_PKG_VERSION") }
                }
            }),
            "ping" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {}
            }),
            "tools/list" => state.tool_list(id),
            "tools/call" => {
                let params = msg.get("params").cloned().unwrap_or(json!({}));
                state.tool_call(id, &params)
            }
            // Return empty lists for resources/prompts — not implemented.
            "resources/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "resources": [] }
            }),
            "prompts/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "prompts": [] }
            }),
            _ => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {method}") }
            }),
        };

        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unknown_tool_renders_error_text() {
        let mut state = ServerState::default();
        let reply = state.tool_call(json!(1), &json!({"name": "nope", "arguments": {}}));
        assert_eq!(reply["result"]["isError"], json!(true));
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Error: "), "{text}");
    }

    #[test]
    fn missing_argument_is_invalid_input() {
        let mut state = ServerState::default();
        let reply = state.tool_call(json!(2), &json!({"name": "listProjects", "arguments": {}}));
        assert_eq!(reply["result"]["isError"], json!(true));
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("solutionPath"), "{text}");
    }

    #[test]
    fn find_symbols_round_trip() {
        let tmp = TempDir::new().unwrap();
        let csproj = tmp.path().join("App.csproj");
        std::fs::write(&csproj, "<Project Sdk=\"Microsoft.NET.Sdk\"></Project>").unwrap();
        std::fs::write(
            tmp.path().join("Greeter.cs"),
            "namespace N { public class Greeter { public string Hello() { return \"\"; } } }",
        )
        .unwrap();

        let mut state = ServerState::default();
        let reply = state.tool_call(
            json!(3),
            &json!({
                "name": "findSymbols",
                "arguments": {
                    "solutionPath": csproj.to_string_lossy(),
                    "query": "Hello",
                    "exact": true
                }
            }),
        );
        assert_eq!(reply["result"]["isError"], json!(false));
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Greeter.cs"), "{text}");
        assert!(text.contains("public string Hello()"), "{text}");
    }

    #[test]
    fn every_tool_has_a_schema() {
        let state = ServerState::default();
        let reply = state.tool_list(json!(4));
        let tools = reply["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), TOOLS.len());
        for t in tools {
            assert!(t["inputSchema"]["properties"]["solutionPath"].is_object());
        }
    }
}
