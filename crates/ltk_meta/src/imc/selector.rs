//! Selectors address one entry of one IMC table.

use crate::path::GamePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of object an IMC table belongs to. Determines the table's game path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    Equipment,
    Accessory,
    Weapon,
    Monster,
    DemiHuman,
}

/// Equipment slot of an entry. Only a subset is valid for each [`ObjectType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipSlot {
    Head,
    Body,
    Hands,
    Legs,
    Feet,
    Ears,
    Neck,
    Wrists,
    RFinger,
    LFinger,
    MainHand,
    OffHand,
    Unknown,
}

/// Composite key of a manipulation: which table, which variant, which part.
///
/// Deserialized selectors are always [`normalized`](Self::normalized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SelectorRecord")]
pub struct ImcSelector {
    pub object_type: ObjectType,
    pub primary_id: u16,
    pub secondary_id: u16,
    pub variant: u16,
    pub slot: EquipSlot,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectorRecord {
    object_type: ObjectType,
    primary_id: u16,
    #[serde(default)]
    secondary_id: u16,
    variant: u16,
    slot: EquipSlot,
}

impl From<SelectorRecord> for ImcSelector {
    fn from(record: SelectorRecord) -> Self {
        Self {
            object_type: record.object_type,
            primary_id: record.primary_id,
            secondary_id: record.secondary_id,
            variant: record.variant,
            slot: record.slot,
        }
        .normalized()
    }
}

impl ImcSelector {
    pub fn equipment(primary_id: u16, variant: u16, slot: EquipSlot) -> Self {
        Self {
            object_type: ObjectType::Equipment,
            primary_id,
            secondary_id: 0,
            variant,
            slot,
        }
    }

    pub fn accessory(primary_id: u16, variant: u16, slot: EquipSlot) -> Self {
        Self {
            object_type: ObjectType::Accessory,
            primary_id,
            secondary_id: 0,
            variant,
            slot,
        }
    }

    pub fn weapon(primary_id: u16, secondary_id: u16, variant: u16) -> Self {
        Self {
            object_type: ObjectType::Weapon,
            primary_id,
            secondary_id,
            variant,
            slot: EquipSlot::MainHand,
        }
    }

    pub fn monster(primary_id: u16, secondary_id: u16, variant: u16) -> Self {
        Self {
            object_type: ObjectType::Monster,
            primary_id,
            secondary_id,
            variant,
            slot: EquipSlot::Unknown,
        }
    }

    /// Canonical form of this selector.
    ///
    /// Equipment and accessory tables are addressed by primary id alone, so
    /// their secondary id is zeroed. Weapon tables hold a single part, so an
    /// off-hand slot becomes [`EquipSlot::MainHand`]. Two selectors address the
    /// same entry exactly when their normalized forms are equal.
    pub fn normalized(self) -> Self {
        match self.object_type {
            ObjectType::Equipment | ObjectType::Accessory => Self {
                secondary_id: 0,
                ..self
            },
            ObjectType::Weapon if self.slot == EquipSlot::OffHand => Self {
                slot: EquipSlot::MainHand,
                ..self
            },
            _ => self,
        }
    }

    /// Bit of the part mask this selector's slot occupies, if the slot is valid
    /// for the object type.
    pub fn part_bit(&self) -> Option<u8> {
        use EquipSlot::*;
        match (self.object_type, self.slot) {
            (ObjectType::Equipment | ObjectType::DemiHuman, slot) => match slot {
                Head => Some(0),
                Body => Some(1),
                Hands => Some(2),
                Legs => Some(3),
                Feet => Some(4),
                _ => None,
            },
            (ObjectType::Accessory, slot) => match slot {
                Ears => Some(0),
                Neck => Some(1),
                Wrists => Some(2),
                RFinger => Some(3),
                LFinger => Some(4),
                _ => None,
            },
            (ObjectType::Weapon, MainHand | OffHand) => Some(0),
            (ObjectType::Monster, Unknown) => Some(0),
            _ => None,
        }
    }

    /// Game path of the table this selector edits.
    pub fn game_path(&self) -> GamePath {
        let p = self.primary_id;
        let s = self.secondary_id;
        let path = match self.object_type {
            ObjectType::Equipment => format!("chara/equipment/e{p:04}/e{p:04}.imc"),
            ObjectType::Accessory => format!("chara/accessory/a{p:04}/a{p:04}.imc"),
            ObjectType::Weapon => format!("chara/weapon/w{p:04}/obj/body/b{s:04}/b{s:04}.imc"),
            ObjectType::Monster => format!("chara/monster/m{p:04}/obj/body/b{s:04}/b{s:04}.imc"),
            ObjectType::DemiHuman => {
                format!("chara/demihuman/d{p:04}/obj/equipment/e{s:04}/e{s:04}.imc")
            }
        };
        GamePath::from_normalized(path)
    }
}

impl fmt::Display for ImcSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:04}/{:04} variant {} {:?}",
            self.object_type, self.primary_id, self.secondary_id, self.variant, self.slot
        )
    }
}
