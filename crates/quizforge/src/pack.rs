//! Where quiz packages come from.
//!
//! Sessions are created with a `pack_id`. The server resolves it through a
//! [`PackLibrary`] and never parses pack archives itself.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use quizforge_content::Package;

use crate::QuizforgeError;

/// Resolves pack ids to ready-to-play packages.
pub trait PackLibrary: Send + Sync + 'static {
    fn get(&self, pack_id: &str) -> Option<Arc<Package>>;
}

/// A [`PackLibrary`] held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPackLibrary {
    packs: HashMap<String, Arc<Package>>,
}

impl MemoryPackLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a package under `pack_id`, replacing any previous one.
    pub fn insert(&mut self, pack_id: impl Into<String>, package: Package) {
        self.packs.insert(pack_id.into(), Arc::new(package));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_pack(mut self, pack_id: impl Into<String>, package: Package) -> Self {
        self.insert(pack_id, package);
        self
    }

    /// Loads every `*.json` file in `dir`. The file stem is the pack id.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, QuizforgeError> {
        let mut library = Self::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(pack_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)?;
            let package = Package::from_json(&text)?;
            tracing::info!(
                pack_id,
                name = %package.name,
                questions = package.question_count(),
                "pack loaded"
            );
            library.insert(pack_id, package);
        }
        Ok(library)
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.packs.keys().map(String::as_str)
    }
}

impl PackLibrary for MemoryPackLibrary {
    fn get(&self, pack_id: &str) -> Option<Arc<Package>> {
        self.packs.get(pack_id).cloned()
    }
}
