/// Error types for template rendering.
use super::options::ConfigError;
use super::report::{Issue, IssueKind, Location};
use crate::ooxml::error::OoxmlError;
use thiserror::Error;

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that stop a render pass, or one loop iteration of it.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Malformed placeholder syntax
    #[error("parse error at {location}: {message} in '{raw}'")]
    Parse {
        message: String,
        raw: String,
        location: Location,
    },

    /// Block tag without its counterpart at the same level
    #[error("unmatched block tag '{raw}' at {location}: {message}")]
    UnmatchedBlock {
        message: String,
        raw: String,
        location: Location,
    },

    /// Context path that does not resolve (strict mode or fail-fast)
    #[error("cannot resolve placeholder at {location} in '{raw}': {message}")]
    Resolution {
        message: String,
        raw: String,
        location: Location,
    },

    /// Filter name not in the registry
    #[error("unknown filter '{name}' at {location} in '{raw}'")]
    UnknownFilter {
        name: String,
        raw: String,
        location: Location,
    },

    /// Filter applied to a value of the wrong shape (fail-fast)
    #[error("filter failed at {location} in '{raw}': {message}")]
    FilterApplication {
        message: String,
        raw: String,
        location: Location,
    },

    /// Invalid render options
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Package or XML error
    #[error("document error: {0}")]
    Document(#[from] OoxmlError),
}

impl RenderError {
    /// Errors that may abort a single loop iteration instead of the whole render.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::Resolution { .. } | RenderError::FilterApplication { .. }
        )
    }

    /// Placeholder text the error refers to, if any.
    pub fn raw(&self) -> Option<&str> {
        match self {
            RenderError::Parse { raw, .. }
            | RenderError::UnmatchedBlock { raw, .. }
            | RenderError::Resolution { raw, .. }
            | RenderError::UnknownFilter { raw, .. }
            | RenderError::FilterApplication { raw, .. } => Some(raw),
            RenderError::Config(_) | RenderError::Document(_) => None,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            RenderError::Parse { location, .. }
            | RenderError::UnmatchedBlock { location, .. }
            | RenderError::Resolution { location, .. }
            | RenderError::UnknownFilter { location, .. }
            | RenderError::FilterApplication { location, .. } => Some(location),
            RenderError::Config(_) | RenderError::Document(_) => None,
        }
    }
}

impl From<Issue> for RenderError {
    fn from(issue: Issue) -> Self {
        match issue.kind {
            IssueKind::FilterApplication => RenderError::FilterApplication {
                message: issue.message,
                raw: issue.raw,
                location: issue.location,
            },
            IssueKind::MissingValue
            | IssueKind::NotIterable
            | IssueKind::AbortedIteration
            | IssueKind::PermissionDenied => {
                RenderError::Resolution {
                    message: issue.message,
                    raw: issue.raw,
                    location: issue.location,
                }
            },
        }
    }
}

impl From<crate::common::xml::XmlError> for RenderError {
    fn from(err: crate::common::xml::XmlError) -> Self {
        RenderError::Document(err.into())
    }
}

impl From<crate::ooxml::opc::OpcError> for RenderError {
    fn from(err: crate::ooxml::opc::OpcError) -> Self {
        RenderError::Document(err.into())
    }
}
