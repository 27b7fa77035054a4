//! Raw source access: full symbol bodies and numbered file windows.

use std::path::Path;

use crate::error::{Error, Result};
use crate::paths;
use crate::resolver::{self, Resolved};
use crate::workspace::SolutionHandle;

/// Hard ceiling for `file_content` reads.
pub const MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// Full declaration source of a symbol, with a header naming the span:
/// `// method `Hello` — src/Greeter.cs:L14-L17`.
pub fn symbol_source(
    handle: &SolutionHandle,
    symbol_name: &str,
    containing_type: Option<&str>,
) -> Result<String> {
    let resolved = resolver::resolve_symbol(handle, symbol_name, containing_type)?;
    let (kind, name, location, compilation) = match &resolved {
        Resolved::Type(t) => (t.ty.kind, &t.ty.name, &t.ty.location, t.compilation),
        Resolved::Member(m) => (m.member.kind, &m.member.name, &m.member.location, m.compilation),
    };

    let doc = compilation
        .document(&location.path)
        .ok_or_else(|| Error::not_found(format!("document {}", location.path.display())))?;
    let body = doc
        .text
        .get(location.start_byte..location.end_byte)
        .unwrap_or_default();

    let (start_line, _) = doc.line_col(location.start_byte);
    let (end_line, _) = doc.line_col(location.end_byte.saturating_sub(1).max(location.start_byte));

    Ok(format!(
        "// {} `{}` — {}:L{}-L{}\n{}",
        kind.as_str(),
        name,
        paths::display_relative(&location.path, handle.dir()),
        start_line + 1,
        end_line + 1,
        body
    ))
}

/// Read a file (optionally a 1-based inclusive line window) with each line
/// prefixed by its 1-based number. Files over the ceiling fail `TooLarge`.
pub fn file_content(
    handle: &SolutionHandle,
    file_path: &Path,
    start_line: Option<usize>,
    end_line: Option<usize>,
) -> Result<String> {
    let abs = paths::absolutize(handle.dir(), file_path);
    let meta = std::fs::metadata(&abs)
        .map_err(|_| Error::not_found(format!("file {}", abs.display())))?;
    if meta.len() > MAX_FILE_BYTES {
        return Err(Error::TooLarge {
            path: abs,
            size_bytes: meta.len(),
            max_bytes: MAX_FILE_BYTES,
        });
    }

    let text = std::fs::read_to_string(&abs)
        .map_err(|e| Error::load_failed(&abs, format!("reading file: {e}")))?;

    let start = start_line.unwrap_or(1);
    if start == 0 {
        return Err(Error::invalid_input("startLine is 1-based"));
    }
    let end = end_line.unwrap_or(usize::MAX);
    if end < start {
        return Err(Error::invalid_input(format!(
            "endLine {end} precedes startLine {start}"
        )));
    }

    let mut out = String::new();
    for (i, line) in text.lines().enumerate() {
        let n = i + 1;
        if n < start {
            continue;
        }
        if n > end {
            break;
        }
        out.push_str(&format!("{n:>5} | {line}\n"));
    }
    if out.is_empty() {
        out.push_str("(empty range)\n");
    }
    Ok(out)
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

    #[test]
    fn symbol_source_has_span_header() {
        let (_tmp, handle) = solution(&[(
            "G.cs",
            "namespace N {\n    public class G {\n        public void M()\n        {\n        }\n    }\n}\n",
        )]);
        let s = symbol_source(&handle, "M", None).unwrap();
        assert!(s.starts_with("// method `M` — G.cs:L3-L5"), "got: {s}");
        assert!(s.contains("public void M()"));
    }

    #[test]
    fn file_content_numbers_lines_one_based() {
        let (_tmp, handle) = solution(&[("F.cs", "class A { }\nclass B { }\nclass C { }\n")]);
        let all = file_content(&handle, Path::new("F.cs"), None, None).unwrap();
        assert!(all.starts_with("    1 | class A { }"));
        let window = file_content(&handle, Path::new("F.cs"), Some(2), Some(2)).unwrap();
        assert_eq!(window, "    2 | class B { }\n");
    }

    #[test]
    fn oversized_file_fails_too_large() {
        let tmp = TempDir::new().unwrap();
        let csproj = tmp.path().join("App.csproj");
        std::fs::write(&csproj, "<Project></Project>").unwrap();
        // 6 MiB of padding.
        let big = "x".repeat(6 * 1024 * 1024);
        std::fs::write(tmp.path().join("big.txt"), big).unwrap();
        let ws = WorkspaceManager::new();
        let handle = ws.acquire(&csproj, &CancelToken::new()).unwrap();
        match file_content(&handle, Path::new("big.txt"), None, None) {
            Err(Error::TooLarge { size_bytes, .. }) => assert_eq!(size_bytes, 6 * 1024 * 1024),
            other => panic!("expected TooLarge, got {:?}", other.err()),
        }
    }
}
