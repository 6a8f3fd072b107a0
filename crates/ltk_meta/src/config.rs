//! Engine configuration persisted as JSON.
//!
//! ```json
//! {
//!   "verifyEncoding": true,
//!   "traceHookDispatch": false,
//!   "dataRoot": "C:/game/sqpack-extracted"
//! }
//! ```

use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaConfig {
    /// Re-encode and re-decode every patched file after an edit and refuse the
    /// edit if the result does not read back.
    pub verify_encoding: bool,

    /// Log every pass-through decision of the load hook at `trace` level.
    pub trace_hook_dispatch: bool,

    /// Root of the extracted game files used by
    /// [`FsDefaultSource`](crate::source::FsDefaultSource).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_root: Option<Utf8PathBuf>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            verify_encoding: true,
            trace_hook_dispatch: false,
            data_root: None,
        }
    }
}

impl MetaConfig {
    /// Load a config file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist and `Err` if it exists but
    /// cannot be parsed. Missing keys take their default values.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Save the config, creating parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_default_config() {
        let config = MetaConfig::default();
        assert!(config.verify_encoding);
        assert!(!config.trace_hook_dispatch);
        assert!(config.data_root.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("nested/meta.json")).unwrap();

        let config = MetaConfig {
            verify_encoding: false,
            trace_hook_dispatch: true,
            data_root: Some(Utf8PathBuf::from("/game/data")),
        };
        config.save(&path).unwrap();

        let loaded = MetaConfig::load(&path).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_nonexistent() {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("missing.json")).unwrap();
        assert!(MetaConfig::load(&path).unwrap().is_none());
    }

    #[test]
    fn test_load_partial_uses_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(br#"{ "traceHookDispatch": true }"#).unwrap();
        temp.flush().unwrap();

        let path = Utf8Path::from_path(temp.path()).unwrap();
        let loaded = MetaConfig::load(path).unwrap().unwrap();
        assert!(loaded.verify_encoding);
        assert!(loaded.trace_hook_dispatch);
    }

    #[test]
    fn test_load_invalid_json() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"{ invalid json }").unwrap();
        temp.flush().unwrap();

        let path = Utf8Path::from_path(temp.path()).unwrap();
        assert!(MetaConfig::load(path).is_err());
    }

    #[test]
    fn test_serialization_format() {
        let json = serde_json::to_string(&MetaConfig::default()).unwrap();
        assert!(json.contains("\"verifyEncoding\":true"));
        assert!(json.contains("\"traceHookDispatch\":false"));
        assert!(!json.contains("dataRoot"));
    }
}
