use std::path::Path;

/// One unit of annotated source: a display name for diagnostics plus the
/// text itself. Units come from disk, stdin, or embedded declarations;
/// only the name tells them apart.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub contents: String,
}

impl SourceFile {
    /// A unit loaded from disk; the path becomes the display name.
    pub fn from_path(path: &Path, contents: String) -> Self {
        Self {
            name: path.display().to_string(),
            contents,
        }
    }

    /// A unit with no backing file: stdin, embedded library
    /// declarations, test fixtures.
    pub fn inline<S: Into<String>>(name: &str, contents: S) -> Self {
        Self {
            name: name.to_string(),
            contents: contents.into(),
        }
    }
}
