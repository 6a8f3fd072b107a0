use crate::imc::{ImcEntry, ImcSelector};
use crate::path::GamePath;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// One selector-addressed edit to an IMC table.
///
/// Equality and hashing only look at the normalized
/// [`selector`](Self::selector): two records targeting the same entry are "the
/// same manipulation" with possibly different payloads, which is what gives the
/// live set its replace-in-place semantics.
///
/// ```json
/// {
///   "objectType": "Equipment",
///   "primaryId": 1,
///   "variant": 3,
///   "slot": "Head",
///   "entry": { "materialId": 4, "decalId": 0, "attributeMask": 0, "soundId": 0,
///              "vfxId": 0, "materialAnimationId": 0 }
/// }
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImcManipulation {
    #[serde(flatten)]
    pub selector: ImcSelector,
    pub entry: ImcEntry,
}

impl ImcManipulation {
    pub fn new(selector: ImcSelector, entry: ImcEntry) -> Self {
        Self {
            selector: selector.normalized(),
            entry,
        }
    }

    /// Same record with its selector in canonical form.
    pub fn normalized(self) -> Self {
        Self::new(self.selector, self.entry)
    }

    /// Same selector, different payload.
    pub fn with_entry(self, entry: ImcEntry) -> Self {
        Self { entry, ..self }
    }

    pub fn game_path(&self) -> GamePath {
        self.selector.game_path()
    }
}

impl PartialEq for ImcManipulation {
    fn eq(&self, other: &Self) -> bool {
        self.selector.normalized() == other.selector.normalized()
    }
}

impl Eq for ImcManipulation {}

impl Hash for ImcManipulation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.selector.normalized().hash(state);
    }
}

/// Insert `manip`, replacing a record with the same selector in place.
///
/// Returns the replaced record, if any.
pub(crate) fn add_or_replace(
    list: &mut Vec<ImcManipulation>,
    manip: ImcManipulation,
) -> Option<ImcManipulation> {
    match list.iter_mut().find(|m| **m == manip) {
        Some(slot) => Some(std::mem::replace(slot, manip)),
        None => {
            list.push(manip);
            None
        }
    }
}
