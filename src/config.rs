//! Parser configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings shared by every render a [`crate::WikiParser`] performs.
///
/// ```
/// use wiki_markup::ParserConfig;
///
/// let config = ParserConfig::from_yaml_str("default_locale: de\nmax_depth: 4\n").unwrap();
/// assert_eq!(config.default_locale, "de");
/// assert_eq!(config.max_depth, 4);
/// assert_eq!(config.heading_id_prefix, "w_");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Locale tried when an exact-locale lookup misses.
    pub default_locale: String,
    /// Maximum nesting of template and include expansions.
    pub max_depth: usize,
    /// Shape of internal link targets. `{locale}` and `{slug}` are replaced.
    pub article_url: String,
    /// Prefix for generated heading ids.
    pub heading_id_prefix: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_locale: "en-US".to_string(),
            max_depth: 8,
            article_url: "/{locale}/kb/{slug}".to_string(),
            heading_id_prefix: "w_".to_string(),
        }
    }
}

impl ParserConfig {
    /// Parse a YAML config. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: ParserConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Return a copy with a different fallback locale.
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_locale.trim().is_empty() {
            return Err(ConfigError::EmptyLocale);
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if !self.article_url.contains("{slug}") {
            return Err(ConfigError::ArticleUrl(self.article_url.clone()));
        }
        Ok(())
    }

    /// Build the href for an article title in `locale`.
    pub fn article_href(&self, title: &str, locale: &str) -> String {
        let slug = title.trim().replace(' ', "+");
        self.article_url
            .replace("{locale}", locale)
            .replace("{slug}", &slug)
    }
}
