use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use fatura_core::{DEFAULT_FALLBACK, MatchPolicy, NormalizeOptions};
use fatura_finance::{DEFAULT_CATEGORY_COLUMN, DEFAULT_OUTPUT_SUFFIX};
use fatura_ingest::SourceProfile;

use crate::state::{default_dictionary_path, ensure_fatura_home, fatura_home};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dictionary: DictionarySection,
    pub normalize: NormalizeOptions,
    pub classifier: ClassifierSection,
    pub remote: RemoteSection,
    pub output: OutputSection,
    /// Extra statement formats; a name matching a built-in replaces it.
    pub sources: Vec<SourceProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionarySection {
    /// Defaults to `<fatura home>/categorias.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub fallback: String,
}

impl Default for DictionarySection {
    fn default() -> Self {
        Self {
            path: None,
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    pub policy: MatchPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub enabled: bool,
    /// "gemini", "openai" or "anthropic".
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            base_url: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            temperature: 0.0,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub column: String,
    pub suffix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            column: DEFAULT_CATEGORY_COLUMN.to_string(),
            suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            dir: None,
        }
    }
}

impl Config {
    pub fn dictionary_path(&self) -> Result<PathBuf> {
        match &self.dictionary.path {
            Some(p) => Ok(p.clone()),
            None => default_dictionary_path(),
        }
    }

    /// Configured sources first, then built-ins not overridden by name.
    pub fn sources(&self) -> Vec<SourceProfile> {
        let mut out = self.sources.clone();
        for builtin in SourceProfile::builtins() {
            if !out.iter().any(|s| s.name.eq_ignore_ascii_case(&builtin.name)) {
                out.push(builtin);
            }
        }
        out
    }

    pub fn source(&self, name: &str) -> Option<SourceProfile> {
        self.sources()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

pub fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config.toml")
}

pub fn config_path() -> Result<PathBuf> {
    Ok(fatura_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s).with_context(|| format!("in {}", p.display()))
}

pub fn save_config(cfg: &Config) -> Result<()> {
    ensure_fatura_home()?;
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.dictionary.fallback, "outros");
        assert_eq!(cfg.output.suffix, "_classificado");
        assert_eq!(cfg.remote.timeout_secs, 20);
        assert!(cfg.normalize.collapse_non_alpha);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            r#"
            [classifier]
            policy = "prefix"

            [remote]
            enabled = true
            provider = "openai"
            model = "gpt-4o-mini"
            api_key_env = "OPENAI_API_KEY"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.classifier.policy, MatchPolicy::Prefix);
        assert!(cfg.remote.enabled);
        assert_eq!(cfg.remote.temperature, 0.0);
        assert_eq!(cfg.output.column, "categoria");
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        assert_eq!(parse_config(&s).unwrap(), Config::default());
    }

    #[test]
    fn test_configured_source_overrides_builtin() {
        let cfg = parse_config(
            r#"
            [[sources]]
            name = "inter"
            delimiter = ";"
            description_column = "Historico"
            amount_column = "Valor"
            decimal_comma = true

            [[sources]]
            name = "Nubank"
            description_column = "descricao"
            amount_column = "valor"
            "#,
        )
        .unwrap();

        let inter = cfg.source("INTER").unwrap();
        assert_eq!(inter.delimiter, ';');
        assert!(inter.decimal_comma);

        assert_eq!(cfg.source("nubank").unwrap().description_column, "descricao");
        assert_eq!(cfg.source("amex"), Some(SourceProfile::amex()));
        assert_eq!(cfg.sources().len(), 4);
        assert!(cfg.source("itau").is_none());
    }

    #[test]
    fn test_bad_policy_is_rejected() {
        assert!(parse_config("[classifier]\npolicy = \"fuzzy\"\n").is_err());
    }
}
