pub mod ingest;
pub mod query;
pub mod script;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::model::RuleDatabase;
use crate::util::read_json_value;

pub(crate) fn default_db_path(cache_root: &Path) -> PathBuf {
    cache_root.join("rules.json")
}

pub(crate) fn script_cache_path(cache_root: &Path) -> PathBuf {
    cache_root.join("scripts.sqlite")
}

pub(crate) fn manifest_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("manifests")
}

pub(crate) fn load_database(
    cache_root: &Path,
    db_path: Option<&PathBuf>,
) -> Result<RuleDatabase> {
    let path = db_path
        .cloned()
        .unwrap_or_else(|| default_db_path(cache_root));
    let value = read_json_value(&path)?;
    RuleDatabase::from_value(&value)
        .with_context(|| format!("failed to load rule database from {}", path.display()))
}
