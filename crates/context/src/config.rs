use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resolver_type::ResourceResolverType;

/// Default configuration file name, without extension
const DEFAULT_CONFIG_FILE: &str = "sling-mock";
const ENV_PREFIX: &str = "SLING_MOCK";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ContextConfig {
    /// Resource resolver flavour for new contexts
    #[serde(default)]
    pub resource_resolver_type: ResourceResolverType,

    /// Run modes the settings service starts with
    #[serde(default)]
    pub run_modes: Vec<String>,

    /// Properties handed to the resource resolver factory
    #[serde(default)]
    pub resource_resolver_factory_activator_props: Map<String, Value>,
}

impl ContextConfig {
    /// Load configuration from multiple sources in order of priority:
    /// 1. Configuration file (sling-mock.toml, sling-mock.yaml, sling-mock.json), optional
    /// 2. Environment variables (prefixed with SLING_MOCK_)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load_with(File::with_name(path))
    }

    fn load_with<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .add_source(file)
            // SLING_MOCK_RUN_MODES=author,local
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("run_modes"),
            )
            .build()?;

        let context_config: Self = config.try_deserialize()?;

        context_config.validate()?;

        Ok(context_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for run_mode in &self.run_modes {
            if run_mode.is_empty() {
                return Err(ConfigError::Message("Run modes cannot be empty".to_string()));
            }
            if run_mode.contains(|c: char| c == ',' || c.is_whitespace()) {
                return Err(ConfigError::Message(format!(
                    "Run mode contains a separator or whitespace: {run_mode:?}"
                )));
            }
        }

        if self
            .resource_resolver_factory_activator_props
            .keys()
            .any(|key| key.is_empty())
        {
            return Err(ConfigError::Message(
                "Resource resolver factory activator property names cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(toml: &str) -> Result<ContextConfig, ConfigError> {
        let config: ContextConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").expect("empty config is valid");

        assert_eq!(
            config.resource_resolver_type,
            ResourceResolverType::ResourceResolverMock
        );
        assert!(config.run_modes.is_empty());
        assert!(config.resource_resolver_factory_activator_props.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            resource_resolver_type = "JCR_MOCK"
            run_modes = ["author", "local"]

            [resource_resolver_factory_activator_props]
            optimize_alias_resolution = false
            "#,
        )
        .expect("config is valid");

        assert_eq!(config.resource_resolver_type, ResourceResolverType::JcrMock);
        assert_eq!(config.run_modes, vec!["author", "local"]);
        assert_eq!(
            config
                .resource_resolver_factory_activator_props
                .get("optimize_alias_resolution"),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn test_unknown_resolver_type_is_rejected() {
        let result = parse(r#"resource_resolver_type = "JCR_OAK""#);

        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_run_modes_are_rejected() {
        for run_modes in [r#"[""]"#, r#"["author,publish"]"#, r#"["a b"]"#] {
            let result = parse(&format!("run_modes = {run_modes}"));
            assert!(
                matches!(result, Err(ConfigError::Message(_))),
                "{run_modes} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_default_file_is_not_an_error() {
        // no sling-mock.* file in the crate directory
        let config = ContextConfig::load().expect("defaults load");

        assert!(config.validate().is_ok());
    }
}
