//! The in-memory patched copy of one IMC table.

use crate::error::{Error, Result};
use crate::imc::{ImcData, ImcEntry, ImcSelector};
use crate::path::GamePath;
use crate::source::DefaultSource;
use xxhash_rust::xxh3::xxh3_64;

/// A patched IMC table owned by one collection's store.
///
/// The file starts as a decoded copy of the host's canonical bytes. Edits mutate
/// it in place and mark it dirty ("changed since last served"). The load hook
/// serves its bytes and clears the flag, so each accepted edit is observed by at
/// least one subsequent load.
#[derive(Debug, Clone)]
pub struct ImcFile {
    path: GamePath,
    data: ImcData,
    changes_since_load: bool,
    verify_encoding: bool,
}

impl ImcFile {
    /// Load the canonical table for `path`.
    pub fn load(path: GamePath, source: &dyn DefaultSource) -> Result<Self> {
        let bytes = source.read_file(&path)?;
        Self::from_bytes(path, &bytes)
    }

    pub fn from_bytes(path: GamePath, bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            path,
            data: ImcData::decode(bytes)?,
            changes_since_load: false,
            verify_encoding: true,
        })
    }

    pub fn with_verify_encoding(mut self, verify: bool) -> Self {
        self.verify_encoding = verify;
        self
    }

    pub fn path(&self) -> &GamePath {
        &self.path
    }

    pub fn data(&self) -> &ImcData {
        &self.data
    }

    pub fn entry(&self, selector: &ImcSelector) -> Result<ImcEntry> {
        self.data.entry(&self.path, selector)
    }

    /// Overwrite the entry `selector` addresses.
    ///
    /// Fails with [`Error::RejectedEdit`] when the selector is out of range or the
    /// entry does not fit its packed fields; nothing is mutated in that case.
    /// Fails with [`Error::ApplyFault`] when the patched table does not encode
    /// back cleanly; the previous entry is restored.
    pub fn apply(&mut self, selector: &ImcSelector, entry: ImcEntry) -> Result<()> {
        let index = self.data.locate(&self.path, selector)?;
        entry.validate().map_err(|reason| Error::RejectedEdit {
            path: self.path.clone(),
            selector: *selector,
            reason,
        })?;

        let previous = std::mem::replace(&mut self.data.entries[index], entry);
        if self.verify_encoding {
            if let Err(reason) = self.verify_entry(index, entry) {
                self.data.entries[index] = previous;
                return Err(Error::ApplyFault {
                    path: self.path.clone(),
                    reason,
                });
            }
        }

        self.changes_since_load = true;
        Ok(())
    }

    fn verify_entry(&self, index: usize, expected: ImcEntry) -> std::result::Result<(), String> {
        let bytes = self.data.encode().map_err(|e| e.to_string())?;
        let decoded = ImcData::decode(&bytes).map_err(|e| e.to_string())?;
        match decoded.entries.get(index) {
            Some(entry) if *entry == expected => Ok(()),
            Some(entry) => Err(format!(
                "entry {} reads back as {:?}, expected {:?}",
                index, entry, expected
            )),
            None => Err(format!("entry {} missing after re-encode", index)),
        }
    }

    /// Discard all edits and restore the canonical content. Clears the dirty flag.
    ///
    /// On error the current content is kept.
    pub fn reset(&mut self, source: &dyn DefaultSource) -> Result<()> {
        let bytes = source.read_file(&self.path)?;
        self.data = ImcData::decode(&bytes)?;
        self.changes_since_load = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.changes_since_load
    }

    /// Read and clear the dirty flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.changes_since_load)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.data.encode()
    }

    /// xxHash3 of the encoded table.
    pub fn fingerprint(&self) -> Result<u64> {
        Ok(xxh3_64(&self.to_bytes()?))
    }

    /// Consume the file. No further operations are possible on it.
    pub fn release(self) {
        tracing::trace!("Releasing patched file {}", self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imc::EquipSlot;
    use crate::source::MemoryDefaultSource;

    fn setup() -> (MemoryDefaultSource, GamePath) {
        let source = MemoryDefaultSource::new();
        let path = ImcSelector::equipment(1, 0, EquipSlot::Head).game_path();
        source
            .insert(path.clone(), ImcData::new(3, 0b11111).encode().unwrap())
            .unwrap();
        (source, path)
    }

    fn entry(material_id: u8) -> ImcEntry {
        ImcEntry {
            material_id,
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_sets_dirty_once() {
        let (source, path) = setup();
        let mut file = ImcFile::load(path, &source).unwrap();
        let selector = ImcSelector::equipment(1, 3, EquipSlot::Head);

        assert!(!file.is_dirty());
        file.apply(&selector, entry(7)).unwrap();
        assert!(file.consume_dirty());
        assert!(!file.consume_dirty());
        assert_eq!(file.entry(&selector).unwrap().material_id, 7);
    }

    #[test]
    fn test_apply_out_of_range_is_rejected() {
        let (source, path) = setup();
        let mut file = ImcFile::load(path, &source).unwrap();
        let before = file.to_bytes().unwrap();

        let err = file
            .apply(&ImcSelector::equipment(1, 4, EquipSlot::Head), entry(1))
            .unwrap_err();
        assert!(matches!(err, Error::RejectedEdit { .. }));

        let err = file
            .apply(&ImcSelector::equipment(1, 1, EquipSlot::Ears), entry(1))
            .unwrap_err();
        assert!(matches!(err, Error::RejectedEdit { .. }));

        assert!(!file.is_dirty());
        assert_eq!(file.to_bytes().unwrap(), before);
    }

    #[test]
    fn test_apply_invalid_payload_is_rejected() {
        let (source, path) = setup();
        let mut file = ImcFile::load(path, &source).unwrap();
        let selector = ImcSelector::equipment(1, 1, EquipSlot::Body);
        let bad = ImcEntry {
            attribute_mask: 0x7FF,
            ..Default::default()
        };

        assert!(matches!(
            file.apply(&selector, bad),
            Err(Error::RejectedEdit { .. })
        ));
        assert_eq!(file.entry(&selector).unwrap(), ImcEntry::default());
        assert!(!file.is_dirty());
    }

    #[test]
    fn test_serialized_bytes_decode_to_same_entry() {
        let (source, path) = setup();
        let mut file = ImcFile::load(path.clone(), &source).unwrap();
        let selector = ImcSelector::equipment(1, 2, EquipSlot::Legs);
        let patched = ImcEntry {
            material_id: 3,
            decal_id: 1,
            attribute_mask: 0x2A1,
            sound_id: 9,
            vfx_id: 4,
            material_animation_id: 2,
        };
        file.apply(&selector, patched).unwrap();

        let reread = ImcFile::from_bytes(path, &file.to_bytes().unwrap()).unwrap();
        assert_eq!(reread.entry(&selector).unwrap(), patched);
    }

    #[test]
    fn test_reset_restores_canonical() {
        let (source, path) = setup();
        let mut file = ImcFile::load(path, &source).unwrap();
        let canonical = file.fingerprint().unwrap();

        file.apply(&ImcSelector::equipment(1, 1, EquipSlot::Feet), entry(5))
            .unwrap();
        assert_ne!(file.fingerprint().unwrap(), canonical);

        file.reset(&source).unwrap();
        assert_eq!(file.fingerprint().unwrap(), canonical);
        assert!(!file.is_dirty());
    }

    #[test]
    fn test_reset_failure_keeps_content() {
        let (source, path) = setup();
        let mut file = ImcFile::load(path.clone(), &source).unwrap();
        let selector = ImcSelector::equipment(1, 1, EquipSlot::Feet);
        file.apply(&selector, entry(5)).unwrap();

        source.remove(&path).unwrap();
        assert!(file.reset(&source).is_err());
        assert_eq!(file.entry(&selector).unwrap().material_id, 5);
    }

    #[test]
    fn test_release_leaves_canonical_untouched() {
        let (source, path) = setup();
        let canonical = source.read_file(&path).unwrap();
        let mut file = ImcFile::load(path.clone(), &source).unwrap();
        file.apply(&ImcSelector::equipment(1, 1, EquipSlot::Body), entry(9))
            .unwrap();

        file.release();

        assert_eq!(source.read_file(&path).unwrap(), canonical);
    }
}
