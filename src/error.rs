use std::path::PathBuf;

/// User-visible failure kinds. Every tool handler funnels into one of these
/// seven variants; the dispatcher renders them as a single `Error: <message>`
/// line. Internal plumbing uses `anyhow` and converts at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("ambiguous name `{name}` ({} candidates):\n{}", candidates.len(), candidates.join("\n"))]
    Ambiguous {
        name: String,
        /// One `  <display> [<path>]` line per distinct match.
        candidates: Vec<String>,
    },

    #[error("failed to load {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("workspace rejected the change set: {reason}")]
    ConflictFailed { reason: String },

    #[error("analysis failed: {reason}")]
    AnalysisFailed { reason: String },

    #[error("file too large ({size_bytes} bytes, max {max_bytes}): {}", path.display())]
    TooLarge {
        path: PathBuf,
        size_bytes: u64,
        max_bytes: u64,
    },
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn load_failed(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::LoadFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn analysis_failed(reason: impl std::fmt::Display) -> Self {
        Error::AnalysisFailed {
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Emit a non-fatal warning on the side channel. Warnings never fail a
/// request; stdout stays reserved for the protocol stream.
pub fn warn(msg: impl std::fmt::Display) {
    eprintln!("[sharplens] WARN: {msg}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_message_lists_candidates() {
        let e = Error::Ambiguous {
            name: "Widget".into(),
            candidates: vec![
                "  Acme.Widget [src/Widget.cs]".into(),
                "  Acme.Legacy.Widget [legacy/Widget.cs]".into(),
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("2 candidates"));
        assert!(msg.contains("Acme.Legacy.Widget"));
    }

    #[test]
    fn too_large_names_both_sizes() {
        let e = Error::TooLarge {
            path: PathBuf::from("big.txt"),
            size_bytes: 6 * 1024 * 1024,
            max_bytes: 5 * 1024 * 1024,
        };
        assert!(e.to_string().contains("6291456"));
        assert!(e.to_string().contains("5242880"));
    }
}
