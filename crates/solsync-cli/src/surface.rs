//! Editor surface backed by a source file on disk.

use std::path::{Path, PathBuf};

use solsync_core::capture::{EditorSurface, SurfaceError, SurfaceResult};

/// Presents a file as the editor's input element. The language comes from
/// an explicit override or the file extension.
#[derive(Debug, Clone)]
pub struct FileSurface {
    path: PathBuf,
    language: Option<String>,
}

impl FileSurface {
    pub fn new(path: impl Into<PathBuf>, language: Option<String>) -> Self {
        let path = path.into();
        let language = language
            .filter(|value| !value.trim().is_empty())
            .or_else(|| extension_token(&path));
        Self { path, language }
    }
}

impl EditorSurface for FileSurface {
    fn input_surface_text(&self) -> SurfaceResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(SurfaceError::new(format!(
                "failed to read {}: {error}",
                self.path.display()
            ))),
        }
    }

    fn model_language(&self) -> SurfaceResult<Option<String>> {
        Ok(self.language.clone())
    }
}

/// The extension doubles as a language token; the core synonym table already
/// knows most of them (`py`, `cc`, `rs`, ...).
fn extension_token(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let token = match extension.as_str() {
        "hpp" | "hh" => "cpp",
        "h" => "c",
        "mjs" | "cjs" => "javascript",
        other => other,
    };
    Some(token.to_string())
}
