//! Canonical file sources.
//!
//! Patched files start from, and revert to, the host's own bytes. A
//! [`DefaultSource`] is where those bytes come from: a directory of extracted
//! game files ([`FsDefaultSource`]), an in-memory table ([`MemoryDefaultSource`]),
//! or anything the embedder reads through the host's file API.

use crate::config::MetaConfig;
use crate::error::{Error, MutexResultExt, Result};
use crate::imc::{ImcData, ImcEntry, ImcSelector};
use crate::path::GamePath;
use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::sync::RwLock;

/// Read access to the host's unmodified files.
///
/// Implementations must be `Send + Sync`: stores read defaults while host
/// threads dispatch loads.
pub trait DefaultSource: Send + Sync {
    /// Return the canonical bytes of `path`.
    fn read_file(&self, path: &GamePath) -> Result<Vec<u8>>;

    /// Return the canonical entry `selector` addresses inside `path`.
    fn read_default(&self, path: &GamePath, selector: &ImcSelector) -> Result<ImcEntry> {
        let data = ImcData::decode(&self.read_file(path)?)?;
        data.entry(path, selector)
    }
}

/// Reads canonical files from an extracted game data directory.
///
/// ```text
/// root/
///   chara/
///     equipment/
///       e0001/
///         e0001.imc
/// ```
pub struct FsDefaultSource {
    root: Utf8PathBuf,
}

impl FsDefaultSource {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// Build a source from [`MetaConfig::data_root`].
    pub fn from_config(config: &MetaConfig) -> Result<Self> {
        let root = config.data_root.clone().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "dataRoot is not configured",
            ))
        })?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Utf8PathBuf {
        &self.root
    }
}

impl DefaultSource for FsDefaultSource {
    fn read_file(&self, path: &GamePath) -> Result<Vec<u8>> {
        let full = self.root.join(path.as_str());
        tracing::trace!("Reading canonical file {}", full);
        Ok(std::fs::read(full.as_std_path())?)
    }
}

/// Canonical files held in memory.
#[derive(Default)]
pub struct MemoryDefaultSource {
    files: RwLock<HashMap<GamePath, Vec<u8>>>,
}

impl MemoryDefaultSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the canonical bytes of `path`, returning the previous bytes.
    pub fn insert(&self, path: GamePath, bytes: Vec<u8>) -> Result<Option<Vec<u8>>> {
        Ok(self.files.write().mutex_err()?.insert(path, bytes))
    }

    pub fn remove(&self, path: &GamePath) -> Result<Option<Vec<u8>>> {
        Ok(self.files.write().mutex_err()?.remove(path))
    }
}

impl DefaultSource for MemoryDefaultSource {
    fn read_file(&self, path: &GamePath) -> Result<Vec<u8>> {
        self.files
            .read()
            .mutex_err()?
            .get(path)
            .cloned()
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no canonical file for {}", path),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imc::EquipSlot;
    use tempfile::tempdir;

    fn sample_table() -> ImcData {
        let mut data = ImcData::new(2, 0b11111);
        for (i, entry) in data.entries.iter_mut().enumerate() {
            entry.material_id = i as u8;
        }
        data
    }

    #[test]
    fn test_memory_read_default() {
        let source = MemoryDefaultSource::new();
        let selector = ImcSelector::equipment(1, 2, EquipSlot::Hands);
        let path = selector.game_path();
        source
            .insert(path.clone(), sample_table().encode().unwrap())
            .unwrap();

        let entry = source.read_default(&path, &selector).unwrap();
        // variant 2, third part
        assert_eq!(entry.material_id, 2 * 5 + 2);
    }

    #[test]
    fn test_memory_missing_file() {
        let source = MemoryDefaultSource::new();
        let path = GamePath::new("chara/missing.imc").unwrap();
        assert!(source.read_file(&path).is_err());
    }

    #[test]
    fn test_read_default_out_of_range() {
        let source = MemoryDefaultSource::new();
        let selector = ImcSelector::equipment(1, 7, EquipSlot::Head);
        let path = selector.game_path();
        source
            .insert(path.clone(), sample_table().encode().unwrap())
            .unwrap();

        let err = source.read_default(&path, &selector).unwrap_err();
        assert!(matches!(err, Error::RejectedEdit { .. }));
    }

    #[test]
    fn test_fs_source_reads_under_root() {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let selector = ImcSelector::equipment(1, 1, EquipSlot::Head);
        let path = selector.game_path();

        let full = root.join(path.as_str());
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, sample_table().encode().unwrap()).unwrap();

        let source = FsDefaultSource::new(root);
        assert_eq!(source.read_default(&path, &selector).unwrap().material_id, 5);
    }

    #[test]
    fn test_fs_source_from_config_requires_root() {
        assert!(FsDefaultSource::from_config(&MetaConfig::default()).is_err());
    }
}
