use crate::policy::{BlobPolicy, DEFAULT_MAX_INLINE_LENGTH, DEFAULT_MAX_SINKABLE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TreedocConfig {
    pub database: Option<String>,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[policy]` section. Signed so that negative values reach validation
/// instead of failing to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub max_inline_length: i64,
    pub max_sinkable_size: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_inline_length: DEFAULT_MAX_INLINE_LENGTH as i64,
            max_sinkable_size: DEFAULT_MAX_SINKABLE_SIZE as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl TreedocConfig {
    /// Blob policy from the `[policy]` section, with optional overrides
    pub fn to_policy(&self, max_inline_length: Option<i64>, max_sinkable_size: Option<i64>) -> crate::Result<BlobPolicy> {
        BlobPolicy::from_signed(
            max_inline_length.unwrap_or(self.policy.max_inline_length),
            max_sinkable_size.unwrap_or(self.policy.max_sinkable_size),
        )
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("treedoc.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".treedoc").join("artifacts.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<TreedocConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: TreedocConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &TreedocConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
