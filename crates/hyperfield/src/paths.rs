use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "HYPERFIELD_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "HYPERFIELD_DATA_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Hyperfield";
const APPLICATION: &str = "hyperfield";
const CONFIG_FILE: &str = "hyperfield.toml";
const PACK_DIR: &str = "fragments";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_override = env_override(ENV_CONFIG_DIR);
        let data_override = env_override(ENV_DATA_DIR);
        if let (Some(config_dir), Some(data_dir)) = (&config_override, &data_override) {
            return Ok(Self::from_raw(config_dir.clone(), data_dir.clone()));
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: config_override.unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            data_dir: data_override.unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
        })
    }

    pub fn from_raw(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Directories scanned for fragment packs, user config first.
    pub fn pack_roots(&self) -> Vec<PathBuf> {
        vec![self.config_dir.join(PACK_DIR), self.data_dir.join(PACK_DIR)]
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_roots_prefer_config_dir() {
        let paths = AppPaths::from_raw(PathBuf::from("/cfg"), PathBuf::from("/data"));
        assert_eq!(paths.config_file(), PathBuf::from("/cfg/hyperfield.toml"));
        assert_eq!(
            paths.pack_roots(),
            vec![PathBuf::from("/cfg/fragments"), PathBuf::from("/data/fragments")]
        );
    }
}
