//! Logical game paths and the virtual paths that route loads to a collection.
//!
//! A [`GamePath`] is the host's own address for an asset. A [`VirtualPath`] is
//! the synthetic string a collection registers in place of the game path:
//!
//! ```text
//! |{collection}_{generation}|{game path}
//! ```
//!
//! The host's virtual-file layer caches by that string, so the generation is
//! part of it: an override cached under an earlier generation can never be
//! confused with the current one.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest game path the host accepts.
pub const MAX_GAME_PATH_LEN: usize = 260;

/// Separator framing the collection segment of a virtual path.
pub const VIRTUAL_PATH_DELIMITER: char = '|';

/// Normalized logical asset path (lowercase, forward slashes, no leading `/`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GamePath(String);

impl GamePath {
    /// Normalize and validate a logical path.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        let normalized = raw.replace('\\', "/").to_ascii_lowercase();
        let normalized = normalized.trim_start_matches('/');

        let reason = if normalized.is_empty() {
            Some("path is empty")
        } else if normalized.len() > MAX_GAME_PATH_LEN {
            Some("path is too long")
        } else if normalized.contains(VIRTUAL_PATH_DELIMITER) {
            Some("path contains the virtual path delimiter")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidGamePath {
                path: raw.to_string(),
                reason,
            }),
            None => Ok(Self(normalized.to_string())),
        }
    }

    /// Wrap a path that is already normalized (generated by this crate).
    pub(crate) fn from_normalized(path: String) -> Self {
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GamePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<GamePath> for String {
    fn from(value: GamePath) -> Self {
        value.0
    }
}

/// Check that a collection name can be embedded in a virtual path.
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(VIRTUAL_PATH_DELIMITER) {
        return Err(Error::InvalidCollectionName(name.to_string()));
    }
    Ok(())
}

/// A game path bound to one collection state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPath {
    pub collection: String,
    pub generation: u64,
    pub path: GamePath,
}

impl VirtualPath {
    pub fn new(collection: impl Into<String>, generation: u64, path: GamePath) -> Self {
        Self {
            collection: collection.into(),
            generation,
            path,
        }
    }

    /// Parse a string produced by [`VirtualPath`]'s `Display` impl.
    ///
    /// The collection segment is split on its *last* underscore, so collection
    /// names containing underscores round-trip.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidVirtualPath(raw.to_string());

        let rest = raw.strip_prefix(VIRTUAL_PATH_DELIMITER).ok_or_else(invalid)?;
        let (segment, path) = rest.split_once(VIRTUAL_PATH_DELIMITER).ok_or_else(invalid)?;
        let (collection, generation) = segment.rsplit_once('_').ok_or_else(invalid)?;

        if collection.is_empty() {
            return Err(invalid());
        }
        let generation = generation.parse::<u64>().map_err(|_| invalid())?;
        let path = GamePath::new(path)?;

        Ok(Self {
            collection: collection.to_string(),
            generation,
            path,
        })
    }

    /// Whether `raw` looks like a virtual path at all.
    pub fn is_virtual(raw: &str) -> bool {
        raw.starts_with(VIRTUAL_PATH_DELIMITER)
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{d}{}_{}{d}{}",
            self.collection,
            self.generation,
            self.path,
            d = VIRTUAL_PATH_DELIMITER
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_path_normalizes() {
        let path = GamePath::new("\\Chara\\Equipment\\e0001\\e0001.IMC").unwrap();
        assert_eq!(path.as_str(), "chara/equipment/e0001/e0001.imc");
    }

    #[test]
    fn test_game_path_rejects_delimiter() {
        assert!(GamePath::new("chara/a|b.imc").is_err());
    }

    #[test]
    fn test_game_path_rejects_empty() {
        assert!(GamePath::new("").is_err());
        assert!(GamePath::new("///").is_err());
    }

    #[test]
    fn test_game_path_rejects_too_long() {
        let long = "a".repeat(MAX_GAME_PATH_LEN + 1);
        assert!(GamePath::new(long).is_err());
    }

    #[test]
    fn test_virtual_path_format() {
        let path = GamePath::new("chara/equipment/e0001/e0001.imc").unwrap();
        let vpath = VirtualPath::new("Default", 3, path);
        assert_eq!(
            vpath.to_string(),
            "|Default_3|chara/equipment/e0001/e0001.imc"
        );
    }

    #[test]
    fn test_virtual_path_parse_underscored_name() {
        let parsed = VirtualPath::parse("|my_cool_set_12|chara/x.imc").unwrap();
        assert_eq!(parsed.collection, "my_cool_set");
        assert_eq!(parsed.generation, 12);
        assert_eq!(parsed.path.as_str(), "chara/x.imc");
    }

    #[test]
    fn test_virtual_path_parse_rejects_malformed() {
        assert!(VirtualPath::parse("chara/x.imc").is_err());
        assert!(VirtualPath::parse("|nounderscore|chara/x.imc").is_err());
        assert!(VirtualPath::parse("|name_x|chara/x.imc").is_err());
        assert!(VirtualPath::parse("|_4|chara/x.imc").is_err());
        assert!(VirtualPath::parse("|name_4").is_err());
    }

    #[test]
    fn test_generations_never_collide() {
        let path = GamePath::new("chara/x.imc").unwrap();
        let a = VirtualPath::new("Default", 1, path.clone());
        let b = VirtualPath::new("Default", 2, path);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_collection_name_validation() {
        assert!(validate_collection_name("Default").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("a|b").is_err());
    }

    #[test]
    fn test_game_path_serde_transparent() {
        let path: GamePath = serde_json::from_str("\"Chara/X.imc\"").unwrap();
        assert_eq!(path.as_str(), "chara/x.imc");
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"chara/x.imc\"");
    }
}
