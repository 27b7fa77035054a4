//! Path canonicalization and relative display.
//!
//! Every location that leaves the core goes through `display_relative`:
//! relative to the solution directory when the file lives under it, absolute
//! otherwise, always with the host OS separator.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: resolve `.` and `..` components, keep the
/// result absolute when the input is. Does not touch the filesystem, so
/// paths to not-yet-created files normalize too.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Join `path` to `base` when relative, then normalize.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Case-insensitive path equality (component-wise). The host filesystems this
/// tool targets treat `Foo.cs` and `foo.cs` as the same entry.
pub fn eq_ignore_case(a: &Path, b: &Path) -> bool {
    let na = normalize(a);
    let nb = normalize(b);
    let ca: Vec<String> = na
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect();
    let cb: Vec<String> = nb
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect();
    ca == cb
}

/// Render `path` relative to `base` when `base` is a strict prefix
/// (case-insensitive), absolute otherwise. Output uses the host separator.
pub fn display_relative(path: &Path, base: &Path) -> String {
    let path = normalize(path);
    let base = normalize(base);

    if let Some(rel) = strip_prefix_ignore_case(&path, &base) {
        if rel.as_os_str().is_empty() {
            return path.to_string_lossy().into_owned();
        }
        return rel.to_string_lossy().into_owned();
    }
    path.to_string_lossy().into_owned()
}

fn strip_prefix_ignore_case(path: &Path, base: &Path) -> Option<PathBuf> {
    let mut path_iter = path.components();
    for base_comp in base.components() {
        let path_comp = path_iter.next()?;
        let a = base_comp.as_os_str().to_string_lossy().to_lowercase();
        let b = path_comp.as_os_str().to_string_lossy().to_lowercase();
        if a != b {
            return None;
        }
    }
    Some(path_iter.as_path().to_path_buf())
}

/// `<path>:<line>` with a 1-based line. The single point where internal
/// 0-based lines cross to the external form.
pub fn location_text(path: &Path, base: &Path, line0: usize) -> String {
    format!("{}:{}", display_relative(path, base), line0 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d.cs")),
            PathBuf::from("/a/c/d.cs")
        );
    }

    #[test]
    fn relative_when_under_base() {
        let base = Path::new("/repo/Demo");
        let p = Path::new("/repo/Demo/src/Greeter.cs");
        let shown = display_relative(p, base);
        assert_eq!(shown, format!("src{}Greeter.cs", std::path::MAIN_SEPARATOR));
    }

    #[test]
    fn absolute_when_outside_base() {
        let base = Path::new("/repo/Demo");
        let p = Path::new("/elsewhere/Greeter.cs");
        assert_eq!(display_relative(p, base), "/elsewhere/Greeter.cs");
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        let base = Path::new("/Repo/demo");
        let p = Path::new("/repo/Demo/Greeter.cs");
        assert_eq!(display_relative(p, base), "Greeter.cs");
        assert!(eq_ignore_case(
            Path::new("/repo/Demo/GREETER.cs"),
            Path::new("/repo/demo/greeter.cs")
        ));
    }

    #[test]
    fn location_text_is_one_based() {
        let base = Path::new("/r");
        assert_eq!(location_text(Path::new("/r/a.cs"), base, 0), "a.cs:1");
    }
}
