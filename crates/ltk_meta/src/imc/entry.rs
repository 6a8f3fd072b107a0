//! Binary layout of IMC variant tables.

use crate::error::{Error, Result};
use crate::imc::ImcSelector;
use crate::path::GamePath;
use binrw::{binrw, BinRead, BinWrite};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Largest attribute mask that fits the packed 10-bit field.
pub const ATTRIBUTE_MASK_MAX: u16 = 0x3FF;

/// Largest sound id that fits the packed 6-bit field.
pub const SOUND_ID_MAX: u8 = 0x3F;

/// Size of one encoded entry in bytes.
pub const ENTRY_SIZE: usize = 6;

/// Size of the header (`count` + `part_mask`).
pub const HEADER_SIZE: usize = 4;

fn pack_attribute_and_sound(attribute_mask: u16, sound_id: u8) -> u16 {
    (attribute_mask & ATTRIBUTE_MASK_MAX) | (((sound_id & SOUND_ID_MAX) as u16) << 10)
}

/// One part's entry for one variant.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImcEntry {
    pub material_id: u8,
    pub decal_id: u8,

    #[br(temp)]
    #[bw(calc = pack_attribute_and_sound(*attribute_mask, *sound_id))]
    attribute_and_sound: u16,

    #[br(calc = attribute_and_sound & ATTRIBUTE_MASK_MAX)]
    #[bw(ignore)]
    pub attribute_mask: u16,

    #[br(calc = (attribute_and_sound >> 10) as u8)]
    #[bw(ignore)]
    pub sound_id: u8,

    pub vfx_id: u8,
    pub material_animation_id: u8,
}

impl ImcEntry {
    /// Check that every field fits its packed representation.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.attribute_mask > ATTRIBUTE_MASK_MAX {
            return Err(format!(
                "attribute mask {:#x} exceeds {:#x}",
                self.attribute_mask, ATTRIBUTE_MASK_MAX
            ));
        }
        if self.sound_id > SOUND_ID_MAX {
            return Err(format!(
                "sound id {} exceeds {}",
                self.sound_id, SOUND_ID_MAX
            ));
        }
        Ok(())
    }
}

/// Number of entries a table with this header holds.
pub fn entry_count(count: u16, part_mask: u16) -> usize {
    (count as usize + 1) * part_mask.count_ones() as usize
}

/// Decoded IMC variant table.
///
/// Block 0 is the default variant, block `v` is variant `v`. Each block holds one
/// entry per set bit in `part_mask`, in ascending bit order.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImcData {
    /// Number of non-default variants.
    pub count: u16,

    #[br(assert(part_mask != 0, "IMC part mask is empty"))]
    pub part_mask: u16,

    #[br(count = entry_count(count, part_mask))]
    pub entries: Vec<ImcEntry>,
}

impl ImcData {
    /// Build a zeroed table.
    pub fn new(count: u16, part_mask: u16) -> Self {
        Self {
            count,
            part_mask,
            entries: vec![ImcEntry::default(); entry_count(count, part_mask)],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self::read(&mut Cursor::new(bytes))?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(
            HEADER_SIZE + self.entries.len() * ENTRY_SIZE,
        ));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    pub fn part_count(&self) -> usize {
        self.part_mask.count_ones() as usize
    }

    /// Index of the entry for `variant` and part bit `bit`, if the table has one.
    pub fn entry_index(&self, variant: u16, bit: u8) -> Option<usize> {
        if variant > self.count || bit >= 16 || self.part_mask & (1 << bit) == 0 {
            return None;
        }
        let part = (self.part_mask & ((1u16 << bit) - 1)).count_ones() as usize;
        Some(variant as usize * self.part_count() + part)
    }

    /// Resolve a selector to an entry index, or explain why it is out of range.
    pub fn locate(&self, path: &GamePath, selector: &ImcSelector) -> Result<usize> {
        let reject = |reason: String| Error::RejectedEdit {
            path: path.clone(),
            selector: *selector,
            reason,
        };

        let bit = selector.part_bit().ok_or_else(|| {
            reject(format!(
                "slot {:?} is not valid for {:?}",
                selector.slot, selector.object_type
            ))
        })?;
        if selector.variant > self.count {
            return Err(reject(format!(
                "variant {} is out of range (file has {})",
                selector.variant, self.count
            )));
        }
        self.entry_index(selector.variant, bit).ok_or_else(|| {
            reject(format!(
                "part {} is not present in mask {:#06x}",
                bit, self.part_mask
            ))
        })
    }

    pub fn entry(&self, path: &GamePath, selector: &ImcSelector) -> Result<ImcEntry> {
        let index = self.locate(path, selector)?;
        Ok(self.entries[index])
    }
}
