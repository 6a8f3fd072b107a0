//! IMC variant tables: binary layout, selectors, edit records and the patched file.

mod entry;
mod file;
mod manipulation;
mod selector;

pub use entry::{
    entry_count, ImcData, ImcEntry, ATTRIBUTE_MASK_MAX, ENTRY_SIZE, HEADER_SIZE, SOUND_ID_MAX,
};
pub use file::ImcFile;
pub(crate) use manipulation::add_or_replace;
pub use manipulation::ImcManipulation;
pub use selector::{EquipSlot, ImcSelector, ObjectType};
