//! Parsed zip container structure

use std::collections::HashMap;

use super::entry::ZipEntry;

/// Central directory of a zip archive
#[derive(Debug, Default)]
pub struct ZipArchive {
    /// All entries in central directory order
    pub entries: Vec<ZipEntry>,
    /// Name to entry index mapping for fast lookup
    pub path_index: HashMap<String, usize>,
}

impl ZipArchive {
    /// Build an archive from its entries
    pub fn from_entries(entries: Vec<ZipEntry>) -> Self {
        let path_index = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.name.clone(), idx))
            .collect();

        Self { entries, path_index }
    }

    /// Get number of files (non-directories)
    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_directory()).count()
    }

    /// Get number of directories
    pub fn directory_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_directory()).count()
    }

    /// Get an entry by name
    pub fn get(&self, name: &str) -> Option<&ZipEntry> {
        self.path_index.get(name).map(|idx| &self.entries[*idx])
    }

    /// Check if name exists in archive
    pub fn contains(&self, name: &str) -> bool {
        self.path_index.contains_key(name)
    }
}
