use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};
use crate::ops::DEFAULT_BUFFER_SIZE;

/// backup defaults stored in a toml file, layered under CLI flags
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// compress archives unless overridden on the command line
    #[serde(default)]
    pub compress: bool,
    /// buffer size for file body copies, in bytes
    #[serde(default = "default_copy_buffer")]
    pub copy_buffer: usize,
}

fn default_copy_buffer() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compress: false,
            copy_buffer: DEFAULT_BUFFER_SIZE,
        }
    }
}
