//! Diagnostics collected during a render, and the errors returned when
//! loading configuration or store fixtures.
//!
//! A render never fails: problems are repaired or replaced by an inline
//! message on the spot, and reported here so callers can surface them.

use std::fmt;

use serde::Serialize;

/// Severity of a render diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A template, include, video or image reference did not resolve.
    ReferenceNotFound,
    /// Unbalanced or unknown tag syntax that the balancer repaired.
    MalformedMarkup,
    /// A template or include chain referenced itself or nested too deeply.
    RecursionLimitExceeded,
}

/// A problem found and recovered from while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, DiagnosticKind::ReferenceNotFound, message)
    }

    pub fn recursion(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, DiagnosticKind::RecursionLimitExceeded, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, DiagnosticKind::MalformedMarkup, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}", self.message)
    }
}

/// Errors from loading a [`crate::config::ParserConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("default locale must not be empty")]
    EmptyLocale,

    #[error("max_depth must be at least 1")]
    ZeroDepth,

    #[error("article_url must contain a {{slug}} placeholder: {0:?}")]
    ArticleUrl(String),
}

/// Errors from loading a [`crate::store::MemoryStore`] fixture.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid store JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate document {title:?} in locale {locale:?}")]
    DuplicateDocument { title: String, locale: String },
}
