//! Source files and locations.

use std::fmt;

/// Handle of a registered source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(u16);

/// A position inside a registered source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: FileId,
    pub line: u32,
    pub column: u32,
}

/// Owns the table of source file names and formats locations.
#[derive(Debug, Default)]
pub struct SourceManager {
    files: Vec<String>,
}

impl SourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file name and returns its handle. Registering the same
    /// name twice returns the first handle.
    pub fn add_file(&mut self, name: &str) -> FileId {
        if let Some(pos) = self.files.iter().position(|f| f == name) {
            return FileId(pos as u16);
        }
        self.files.push(name.to_string());
        FileId((self.files.len() - 1) as u16)
    }

    #[must_use]
    pub fn file_name(&self, file: FileId) -> &str {
        &self.files[file.0 as usize]
    }

    /// Renders a location as `file:line:column`.
    #[must_use]
    pub fn format_loc(&self, loc: SourceLocation) -> String {
        format!(
            "{}:{}:{}",
            self.file_name(loc.file),
            loc.line,
            loc.column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_registration_is_idempotent() {
        let mut sm = SourceManager::new();
        let a = sm.add_file("main.c");
        let b = sm.add_file("util.c");
        let a2 = sm.add_file("main.c");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(sm.file_name(b), "util.c");
    }

    #[test]
    fn location_formatting() {
        let mut sm = SourceManager::new();
        let f = sm.add_file("main.c");
        let loc = SourceLocation {
            file: f,
            line: 12,
            column: 3,
        };
        assert_eq!(sm.format_loc(loc), "main.c:12:3");
    }
}
