//! Repository configuration: the minimal hand-rolled INI `config` file
//! (`[section]\nkey = value`) and the `format` file recording which
//! on-disk object encoding a repository was created with.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::AvcError;

/// The object-store write format a repository defaults new writes to.
/// Readers always auto-detect regardless of this setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionFormat {
    ZlibV1,
    ZstdV2,
}

impl CompressionFormat {
    fn as_u32(self) -> u32 {
        match self {
            CompressionFormat::ZlibV1 => 1,
            CompressionFormat::ZstdV2 => 2,
        }
    }

    fn from_u32(v: u32) -> Result<Self, AvcError> {
        match v {
            1 => Ok(CompressionFormat::ZlibV1),
            2 => Ok(CompressionFormat::ZstdV2),
            other => Err(AvcError::FormatUnsupported(format!("compression={other}"))),
        }
    }
}

/// The repository-root `format` file: `{version, compression}`. Absence
/// means a pre-`format`-file repository, which is treated as v1/zlib.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoFormat {
    pub version: u32,
    pub compression: CompressionFormat,
}

impl Default for RepoFormat {
    fn default() -> Self {
        RepoFormat {
            version: 1,
            compression: CompressionFormat::ZlibV1,
        }
    }
}

impl RepoFormat {
    /// New repositories default to Zstandard; only pre-existing
    /// `format`-less repositories fall back to zlib via `Default`.
    pub fn new_repository_default() -> Self {
        RepoFormat {
            version: 1,
            compression: CompressionFormat::ZstdV2,
        }
    }

    pub fn load(path: &Path) -> Result<Self, AvcError> {
        if !path.exists() {
            return Ok(RepoFormat::default());
        }
        let text = fs::read_to_string(path)?;
        let mut version = None;
        let mut compression = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| AvcError::FormatUnsupported(line.to_string()))?;
            match key.trim() {
                "version" => {
                    version = Some(
                        value
                            .trim()
                            .parse::<u32>()
                            .map_err(|_| AvcError::FormatUnsupported(line.to_string()))?,
                    );
                }
                "compression" => {
                    compression = Some(
                        value
                            .trim()
                            .parse::<u32>()
                            .map_err(|_| AvcError::FormatUnsupported(line.to_string()))?,
                    );
                }
                other => return Err(AvcError::FormatUnsupported(other.to_string())),
            }
        }
        let version = version.ok_or_else(|| AvcError::FormatUnsupported("missing version".to_string()))?;
        let compression = CompressionFormat::from_u32(
            compression.ok_or_else(|| AvcError::FormatUnsupported("missing compression".to_string()))?,
        )?;
        Ok(RepoFormat { version, compression })
    }

    pub fn save(&self, path: &Path) -> Result<(), AvcError> {
        let text = format!("version = {}\ncompression = {}\n", self.version, self.compression.as_u32());
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// A minimal `[section]\nkey = value` INI document, enough to cover the
/// repository `config` file's single `[core]` section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Config {
    pub fn default_core() -> Self {
        let mut sections = BTreeMap::new();
        let mut core = BTreeMap::new();
        core.insert("repositoryformatversion".to_string(), "0".to_string());
        core.insert("bare".to_string(), "false".to_string());
        sections.insert("core".to_string(), core);
        Config { sections }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn load(path: &Path) -> Result<Self, AvcError> {
        let text = fs::read_to_string(path)?;
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current = String::new();
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = name.trim().to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| AvcError::InvalidArgument(format!("malformed config line `{raw_line}`")))?;
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Config { sections })
    }

    pub fn save(&self, path: &Path) -> Result<(), AvcError> {
        let mut text = String::new();
        for (section, entries) in &self.sections {
            text.push('[');
            text.push_str(section);
            text.push_str("]\n");
            for (key, value) in entries {
                text.push_str(&format!("\t{key} = {value}\n"));
            }
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_format_file_defaults_to_v1_zlib() {
        let dir = tempdir().unwrap();
        let format = RepoFormat::load(&dir.path().join("format")).unwrap();
        assert_eq!(format, RepoFormat::default());
    }

    #[test]
    fn format_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("format");
        let format = RepoFormat::new_repository_default();
        format.save(&path).unwrap();
        let reloaded = RepoFormat::load(&path).unwrap();
        assert_eq!(reloaded, format);
    }

    #[test]
    fn config_round_trips_through_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        let mut config = Config::default_core();
        config.set("core", "compression", "zstd");
        config.save(&path).unwrap();
        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.get("core", "compression"), Some("zstd"));
        assert_eq!(reloaded.get("core", "bare"), Some("false"));
    }
}
