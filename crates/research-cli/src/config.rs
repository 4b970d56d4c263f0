//! `research.toml` loading

use anyhow::Context;
use research_core::PipelineConfig;
use research_providers::{ArxivConfig, ReasonerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File looked up in the working directory when `--config` is not given
pub(crate) const DEFAULT_CONFIG_FILE: &str = "research.toml";

/// Whole CLI configuration; every table is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    pub(crate) pipeline: PipelineConfig,
    pub(crate) reasoner: ReasonerConfig,
    pub(crate) arxiv: ArxivConfig,
}

impl CliConfig {
    /// Parse from TOML text and validate the pipeline section
    pub(crate) fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("invalid configuration file")?;
        config
            .pipeline
            .validate()
            .context("invalid [pipeline] configuration")?;
        Ok(config)
    }

    /// Load from `path`, or from `research.toml` if present, or defaults;
    /// then apply `RESEARCH_*` environment overrides
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::read(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.pipeline = config
            .pipeline
            .apply_env_overrides()
            .context("invalid RESEARCH_* environment override")?;
        Ok(config)
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = CliConfig::from_toml_str("").unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn tables_override_their_fields() {
        let config = CliConfig::from_toml_str(
            r#"
            [pipeline]
            max_sub_questions = 4

            [reasoner]
            base_url = "http://localhost:11434/v1"
            model = "llama3"

            [arxiv]
            min_interval_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.max_sub_questions, 4);
        assert_eq!(config.reasoner.model, "llama3");
        assert_eq!(config.reasoner.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.arxiv.min_interval_ms, 0);
        assert_eq!(config.arxiv.base_url, ArxivConfig::default().base_url);
    }

    #[test]
    fn invalid_pipeline_values_are_rejected() {
        assert!(CliConfig::from_toml_str("[pipeline]\nevidence_top_k = 0").is_err());
    }

    #[test]
    fn explicit_path_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reasoner]\nmodel = \"gpt-4o\"").unwrap();

        let config = CliConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.reasoner.model, "gpt-4o");
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = CliConfig::load(Some(Path::new("/no/such/research.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }
}
