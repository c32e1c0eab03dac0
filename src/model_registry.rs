//! Case-insensitive model name -> id mapping, merged from a default IDE
//! file and any number of level-specific IDE/DAT overlays.

use indexmap::IndexMap;
use std::path::Path;

/// Merged, case-insensitive model name -> id table.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    by_name: IndexMap<String, i32>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` for `id`. A later registration silently overrides
    /// an earlier one for the same name, matching the IDE/DAT "last file
    /// wins" overlay semantics level-specific files rely on.
    pub fn register(&mut self, name: &str, id: i32) {
        self.by_name.insert(name.to_ascii_uppercase(), id);
    }

    pub fn resolve(&self, name: &str) -> Option<i32> {
        self.by_name.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Merges an IDE/DAT-style whitespace/comma-delimited text file:
    /// `id, modelname, txdname, ...` per line (trailing fields ignored),
    /// `#`-prefixed lines are comments.
    pub fn merge_ide_text(&mut self, contents: &str) {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.eq_ignore_ascii_case("end") {
                continue;
            }
            let mut fields = line.split(|c: char| c == ',' || c.is_whitespace()).filter(|f| !f.is_empty());
            let Some(id_field) = fields.next() else { continue };
            let Some(name_field) = fields.next() else { continue };
            if let Ok(id) = id_field.parse::<i32>() {
                self.register(name_field, id);
            }
        }
    }

    pub fn merge_ide_file(&mut self, path: &Path) -> std::io::Result<()> {
        let contents = std::fs::read_to_string(path)?;
        self.merge_ide_text(&contents);
        Ok(())
    }
}
