//! Render configuration.
//!
//! ```
//! use office_templates::template::{OnError, RenderOptions};
//!
//! let options = RenderOptions::from_yaml_str("strict: true\non_error: fail-fast\n").unwrap();
//! assert!(options.strict);
//! assert_eq!(options.on_error, OnError::FailFast);
//! assert_eq!(options.value_markers, ("{{".to_string(), "}}".to_string()));
//! ```

use super::filters::FilterEnv;
use super::format::{self, Locale};
use super::scanner::Markers;
use super::value::Viewer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse options: {0}")]
    Parse(String),

    #[error("invalid options: {0}")]
    Invalid(String),
}

/// What to do with recoverable issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnError {
    /// Record issues in the report and keep rendering.
    #[default]
    Collect,
    /// Abort on the first issue.
    FailFast,
}

/// A shared [`Viewer`]; two handles are equal when they point at the same viewer.
#[derive(Clone)]
pub struct ViewerHandle(Arc<dyn Viewer>);

impl fmt::Debug for ViewerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ViewerHandle").field(&self.0).finish()
    }
}

impl PartialEq for ViewerHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Options for one render pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Missing context paths abort instead of rendering blank.
    pub strict: bool,
    /// Opening and closing value markers.
    pub value_markers: (String, String),
    /// Character placed inside the value markers' outer characters to form
    /// block tags (`{%` and `%}` by default).
    pub block_tag_prefix: char,
    /// Default locale for `number` and `date` filters.
    pub locale: Option<String>,
    pub on_error: OnError,
    /// Separator used when a sequence is substituted as text.
    pub list_delimiter: String,
    /// Permission check for context objects. Set in code only.
    #[serde(skip)]
    pub viewer: Option<ViewerHandle>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            value_markers: ("{{".to_string(), "}}".to_string()),
            block_tag_prefix: '%',
            locale: None,
            on_error: OnError::Collect,
            list_delimiter: ", ".to_string(),
            viewer: None,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_markers(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.value_markers = (open.into(), close.into());
        self
    }

    pub fn with_block_tag_prefix(mut self, prefix: char) -> Self {
        self.block_tag_prefix = prefix;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_list_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.list_delimiter = delimiter.into();
        self
    }

    /// Hide objects `viewer` may not see.
    pub fn with_viewer(mut self, viewer: impl Viewer + 'static) -> Self {
        self.viewer = Some(ViewerHandle(Arc::new(viewer)));
        self
    }

    pub fn viewer(&self) -> Option<&dyn Viewer> {
        self.viewer.as_ref().map(|handle| &*handle.0)
    }

    /// Parse options from YAML; absent keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let options: Self =
            serde_saphyr::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_saphyr::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check marker and locale settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (open, close) = &self.value_markers;
        if open.trim().is_empty() || close.trim().is_empty() {
            return Err(ConfigError::Invalid("value markers must not be empty".to_string()));
        }
        if open == close {
            return Err(ConfigError::Invalid(format!(
                "opening and closing markers must differ, both are '{}'",
                open
            )));
        }
        if self.block_tag_prefix.is_whitespace() {
            return Err(ConfigError::Invalid("block tag prefix must be visible".to_string()));
        }
        let markers = self.markers();
        if markers.block_open == markers.value_open || markers.block_close == markers.value_close {
            return Err(ConfigError::Invalid(format!(
                "block tag prefix '{}' makes block tags identical to value markers",
                self.block_tag_prefix
            )));
        }
        if let Some(tag) = &self.locale
            && format::find_locale(tag).is_none()
        {
            return Err(ConfigError::Invalid(format!("unknown locale '{}'", tag)));
        }
        Ok(())
    }

    pub fn markers(&self) -> Markers {
        Markers::new(&self.value_markers.0, &self.value_markers.1, self.block_tag_prefix)
    }

    pub(crate) fn resolved_locale(&self) -> &'static Locale {
        self.locale
            .as_deref()
            .and_then(format::find_locale)
            .unwrap_or(&format::C_LOCALE)
    }

    pub(crate) fn filter_env(&self) -> FilterEnv<'_> {
        FilterEnv {
            locale: self.resolved_locale(),
            delimiter: &self.list_delimiter,
        }
    }
}
