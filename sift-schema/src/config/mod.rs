//! Configuration file parsing for `sift.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};

/// Main configuration structure for `sift.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiftConfig {
    /// Pagination defaults.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Filtering defaults.
    #[serde(default)]
    pub filtering: FilteringConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl SiftConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        tracing::debug!(path = %path.display(), "loading sift config");
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })?;
        config.check()?;
        Ok(config)
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(pagination) = overrides.pagination {
                if let Some(size) = pagination.default_page_size {
                    self.pagination.default_page_size = Some(size);
                }
                if let Some(max) = pagination.max_page_size {
                    self.pagination.max_page_size = Some(max);
                }
            }
            if let Some(filtering) = overrides.filtering {
                if let Some(combinator) = filtering.default_combinator {
                    self.filtering.default_combinator = combinator;
                }
            }
        }
        self
    }

    fn check(&self) -> SchemaResult<()> {
        let p = &self.pagination;
        if p.default_page_size == Some(0) || p.max_page_size == Some(0) {
            return Err(SchemaError::config("page sizes must be positive"));
        }
        if let (Some(default), Some(max)) = (p.default_page_size, p.max_page_size) {
            if default > max {
                return Err(SchemaError::config(format!(
                    "default_page_size ({default}) exceeds max_page_size ({max})"
                )));
            }
        }
        if p.page_param == p.page_size_param {
            return Err(SchemaError::config(
                "page_param and page_size_param must differ",
            ));
        }
        Ok(())
    }
}

/// Pagination configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PaginationConfig {
    /// Page size used when neither the filter nor the input provide one.
    pub default_page_size: Option<u64>,

    /// Largest page size a request may ask for.
    pub max_page_size: Option<u64>,

    /// Input key holding the page number.
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Input key holding the page size.
    #[serde(default = "default_page_size_param")]
    pub page_size_param: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: None,
            max_page_size: None,
            page_param: default_page_param(),
            page_size_param: default_page_size_param(),
        }
    }
}

fn default_page_param() -> String { "page".to_string() }
fn default_page_size_param() -> String { "page_size".to_string() }

/// Filtering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilteringConfig {
    /// Combinator joining sibling field predicates.
    #[serde(default)]
    pub default_combinator: CombinatorKind,

    /// Input key that overrides the configured ordering.
    #[serde(default = "default_order_by_param")]
    pub order_by_param: String,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            default_combinator: CombinatorKind::And,
            order_by_param: default_order_by_param(),
        }
    }
}

fn default_order_by_param() -> String { "order_by".to_string() }

/// Boolean combinator named in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinatorKind {
    /// Logical AND.
    #[default]
    And,
    /// Logical OR.
    Or,
}

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Pagination overrides.
    pub pagination: Option<PaginationOverride>,

    /// Filtering overrides.
    pub filtering: Option<FilteringOverride>,
}

/// Pagination configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PaginationOverride {
    /// Override default_page_size.
    pub default_page_size: Option<u64>,

    /// Override max_page_size.
    pub max_page_size: Option<u64>,
}

/// Filtering configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilteringOverride {
    /// Override default_combinator.
    pub default_combinator: Option<CombinatorKind>,
}

/// Expand environment variables in the format `${VAR_NAME}`.
///
/// Unset variables are left as written.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
