//! Mutation flows over a throwaway copy of the fixture solution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use sharplens::queries;
use sharplens::refactor::{self, RenameOptions};
use sharplens::signature;
use sharplens::source;
use sharplens::workspace::{CancelToken, WorkspaceManager};

fn copy_dir(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// Fresh scratch copy of the fixture solution.
fn scratch() -> (TempDir, PathBuf) {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures");
    let tmp = TempDir::new().unwrap();
    copy_dir(&fixtures, tmp.path());
    let sln = tmp.path().join("Demo.sln");
    (tmp, sln)
}

/// Snapshot of every source file's content under a directory.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, String> {
    let mut out = BTreeMap::new();
    for entry in walkdir(dir) {
        if entry.extension().map(|e| e == "cs").unwrap_or(false) {
            out.insert(entry.clone(), std::fs::read_to_string(&entry).unwrap());
        }
    }
    out
}

fn walkdir(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in std::fs::read_dir(&d).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                stack.push(entry.path());
            } else {
                out.push(entry.path());
            }
        }
    }
    out
}

// Rename propagates to the declaration and both call sites, and the summary
// names exactly the files that changed on disk.
#[test]
fn rename_join_to_combine() {
    let (tmp, sln) = scratch();
    let ws = WorkspaceManager::new();
    let cancel = CancelToken::new();

    let before = snapshot(tmp.path());
    let summary = refactor::rename(
        &ws,
        &sln,
        "Join",
        None,
        "Combine",
        RenameOptions::default(),
        &cancel,
    )
    .unwrap();

    assert!(summary.contains("2 changed files"), "{summary}");
    assert!(summary.contains("Messages.cs"), "{summary}");
    assert!(summary.contains("Program.cs"), "{summary}");

    // Summary files equal the files that actually differ on disk.
    let after = snapshot(tmp.path());
    let mut differing: Vec<PathBuf> = Vec::new();
    for (path, text) in &before {
        if after.get(path) != Some(text) {
            differing.push(path.clone());
        }
    }
    assert_eq!(differing.len(), 2, "{differing:?}");
    for path in &differing {
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(summary.contains(name.as_ref()), "{summary}");
    }

    // Sentinel re-queries through a fresh acquire.
    let handle = ws.acquire(&sln, &cancel).unwrap();
    assert!(queries::find_symbols(&handle, "Join", None, true, false).is_empty());
    assert_eq!(queries::find_symbols(&handle, "Combine", None, true, false).len(), 1);
}

#[test]
fn rename_type_moves_its_file() {
    let (tmp, sln) = scratch();
    let ws = WorkspaceManager::new();
    let summary = refactor::rename(
        &ws,
        &sln,
        "Greeter",
        None,
        "Welcomer",
        RenameOptions::default(),
        &CancelToken::new(),
    )
    .unwrap();
    assert!(summary.contains("renamed to"), "{summary}");
    assert!(!tmp.path().join("Greetings/Greeter.cs").exists());
    assert!(tmp.path().join("Greetings/Welcomer.cs").exists());

    let program = std::fs::read_to_string(tmp.path().join("App/Program.cs")).unwrap();
    assert!(program.contains("new Welcomer(\"Hello\")"), "{program}");
}

// Reordering parameters at a named-argument call site leaves the call text
// untouched: the names already bind correctly.
#[test]
fn change_signature_reorder_named_call_unchanged() {
    let (tmp, sln) = scratch();
    let ws = WorkspaceManager::new();
    let program_before = std::fs::read_to_string(tmp.path().join("App/Program.cs")).unwrap();

    signature::change_signature(
        &ws,
        &sln,
        "Send",
        Some("Messages"),
        None,
        None,
        Some("y,x"),
        &CancelToken::new(),
    )
    .unwrap();

    let messages = std::fs::read_to_string(tmp.path().join("App/Messages.cs")).unwrap();
    assert!(messages.contains("public static void Send(string y, int x)"), "{messages}");
    let program_after = std::fs::read_to_string(tmp.path().join("App/Program.cs")).unwrap();
    assert_eq!(program_before, program_after, "named args already match the new order");
}

// Invariant: adding only a defaulted parameter touches no non-declaration
// file.
#[test]
fn change_signature_default_add_leaves_call_sites() {
    let (tmp, sln) = scratch();
    let ws = WorkspaceManager::new();
    let program_before = std::fs::read_to_string(tmp.path().join("App/Program.cs")).unwrap();

    signature::change_signature(
        &ws,
        &sln,
        "Join",
        Some("Messages"),
        Some("int radix = 10"),
        None,
        None,
        &CancelToken::new(),
    )
    .unwrap();

    let messages = std::fs::read_to_string(tmp.path().join("App/Messages.cs")).unwrap();
    assert!(
        messages.contains("public static string Join(int a, int b, int radix = 10)"),
        "{messages}"
    );
    assert_eq!(
        program_before,
        std::fs::read_to_string(tmp.path().join("App/Program.cs")).unwrap()
    );
}

#[test]
fn change_signature_add_without_default_updates_calls() {
    let (tmp, sln) = scratch();
    let ws = WorkspaceManager::new();

    signature::change_signature(
        &ws,
        &sln,
        "Join",
        Some("Messages"),
        Some("string sep"),
        None,
        None,
        &CancelToken::new(),
    )
    .unwrap();

    let program = std::fs::read_to_string(tmp.path().join("App/Program.cs")).unwrap();
    assert!(program.contains("Messages.Join(1, 2, default(string))"), "{program}");
    assert!(program.contains("Messages.Join(3, 4, default(string))"), "{program}");
}

#[test]
fn extract_interface_apply_roundtrip() {
    let (tmp, sln) = scratch();
    let ws = WorkspaceManager::new();

    let summary = refactor::extract_interface(
        &ws,
        &sln,
        "Greeter",
        None,
        true,
        &CancelToken::new(),
    )
    .unwrap();
    assert!(summary.contains("IGreeter"), "{summary}");

    let iface = std::fs::read_to_string(tmp.path().join("Greetings/IGreeter.cs")).unwrap();
    assert!(iface.contains("namespace Demo.Greetings"), "{iface}");
    assert!(iface.contains("public interface IGreeter"), "{iface}");
    assert!(iface.contains("string Hello(string name);"), "{iface}");

    let class_text = std::fs::read_to_string(tmp.path().join("Greetings/Greeter.cs")).unwrap();
    assert!(class_text.contains("class Greeter : IGreeter"), "{class_text}");

    // The new solution state parses: the interface is a first-class type.
    let handle = ws.acquire(&sln, &CancelToken::new()).unwrap();
    let hits = queries::find_symbols(&handle, "IGreeter", None, true, false);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, "interface");
}

// Raw file reads refuse anything over the 5 MiB ceiling.
#[test]
fn oversized_file_content_fails() {
    let (tmp, sln) = scratch();
    std::fs::write(tmp.path().join("big.txt"), "x".repeat(6 * 1024 * 1024)).unwrap();

    let ws = WorkspaceManager::new();
    let handle = ws.acquire(&sln, &CancelToken::new()).unwrap();
    let err = source::file_content(&handle, Path::new("big.txt"), None, None).unwrap_err();
    assert!(matches!(err, sharplens::error::Error::TooLarge { .. }));
}

#[test]
fn staleness_reload_sees_out_of_band_edits() {
    let (tmp, sln) = scratch();
    // Zero window so the mtime scan runs on every acquire.
    let ws = WorkspaceManager::with_staleness_window(std::time::Duration::ZERO);
    let cancel = CancelToken::new();

    let h1 = ws.acquire(&sln, &cancel).unwrap();
    assert!(queries::find_symbols(&h1, "Freshly", None, true, false).is_empty());

    let extra = tmp.path().join("Greetings/Freshly.cs");
    std::fs::write(&extra, "namespace Demo.Greetings { public class Freshly { } }").unwrap();
    let f = std::fs::OpenOptions::new().append(true).open(&extra).unwrap();
    f.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(2))
        .unwrap();

    let h2 = ws.acquire(&sln, &cancel).unwrap();
    assert!(h2.generation > h1.generation);
    assert_eq!(queries::find_symbols(&h2, "Freshly", None, true, false).len(), 1);
}
