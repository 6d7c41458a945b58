use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$FATURA_HOME`, or `~/.fatura`.
pub fn fatura_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("FATURA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".fatura"))
}

pub fn ensure_fatura_home() -> Result<PathBuf> {
    let dir = fatura_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn default_dictionary_path() -> Result<PathBuf> {
    Ok(fatura_home()?.join("categorias.json"))
}
