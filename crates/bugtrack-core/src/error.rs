//! Error types for `bugtrack-core`.
//!
//! A single tagged error covers every layer. Each variant reports an
//! [`ErrorKind`], and layered failures keep their cause as `source`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::Service;

/// Boxed cause carried by wrapping variants.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse error category, stable across layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidId,
    NotFound,
    Create,
    Update,
    Delete,
    InvalidProvider,
    UnsupportedService,
    Crawl,
    Index,
    Push,
    Validation,
    Config,
    Storage,
    Io,
    Json,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidId => "invalid_id",
            Self::NotFound => "not_found",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::InvalidProvider => "invalid_provider",
            Self::UnsupportedService => "unsupported_service",
            Self::Crawl => "crawl",
            Self::Index => "index",
            Self::Push => "push",
            Self::Validation => "validation",
            Self::Config => "config",
            Self::Storage => "storage",
            Self::Io => "io",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary error type for bugtrack operations.
#[derive(Error, Debug)]
pub enum BugError {
    // === Bug Errors ===
    /// The bug key could not be parsed.
    #[error("Invalid bug id: '{id}'")]
    InvalidId { id: String },

    /// No bug with this key.
    #[error("Bug not found: {id}")]
    BugNotFound { id: i64 },

    /// No test cycle for this triple.
    #[error("Test cycle not found: {provider}/{project}/{cycle_id}")]
    CycleNotFound {
        provider: String,
        project: String,
        cycle_id: String,
    },

    /// Creating an entity failed.
    #[error("Create failed: {reason}")]
    Create {
        reason: String,
        #[source]
        source: Option<Cause>,
    },

    /// Updating a bug failed.
    #[error("Update of bug {id} failed: {source}")]
    Update {
        id: i64,
        #[source]
        source: Cause,
    },

    /// Deleting a bug failed.
    #[error("Delete of bug {id} failed: {source}")]
    Delete {
        id: i64,
        #[source]
        source: Cause,
    },

    // === Dispatch Errors ===
    /// Provider name is not registered.
    #[error("Invalid provider: '{provider}'")]
    InvalidProvider { provider: String },

    /// Provider has no handler for the requested service.
    #[error("Provider '{provider}' does not support service '{service}'")]
    UnsupportedService { provider: String, service: String },

    /// A provider service failed; `service` picks the kind.
    #[error("{service} failed for provider '{provider}': {source}")]
    Service {
        provider: String,
        service: Service,
        #[source]
        source: Cause,
    },

    // === Validation Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Multiple validation errors occurred.
    #[error("Validation errors: {}", join_errors(.errors))]
    ValidationErrors { errors: Vec<ValidationError> },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    /// No `.bugs` workspace was found.
    #[error("Not initialized: run 'bt init' first")]
    NotInitialized,

    // === Storage Errors ===
    /// Backing store failure.
    #[error("Storage error: {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: Cause,
    },

    /// JSONL line could not be parsed.
    #[error("JSONL parse error in {path} at line {line}: {reason}")]
    JsonlParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single field validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl BugError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidId { .. } => ErrorKind::InvalidId,
            Self::BugNotFound { .. } | Self::CycleNotFound { .. } => ErrorKind::NotFound,
            Self::Create { .. } => ErrorKind::Create,
            Self::Update { .. } => ErrorKind::Update,
            Self::Delete { .. } => ErrorKind::Delete,
            Self::InvalidProvider { .. } => ErrorKind::InvalidProvider,
            Self::UnsupportedService { .. } => ErrorKind::UnsupportedService,
            Self::Service { service, .. } => match service {
                Service::Crawl => ErrorKind::Crawl,
                Service::Index => ErrorKind::Index,
                Service::Push => ErrorKind::Push,
            },
            Self::Validation { .. } | Self::ValidationErrors { .. } => ErrorKind::Validation,
            Self::Config(_) | Self::NotInitialized => ErrorKind::Config,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::JsonlParse { .. } | Self::Json(_) => ErrorKind::Json,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Walk `source` links and report the innermost kind, so a wrapped
    /// storage failure is still recognised as one.
    #[must_use]
    pub fn root_kind(&self) -> ErrorKind {
        let mut current: &(dyn std::error::Error + 'static) = self;
        let mut kind = self.kind();
        while let Some(next) = current.source() {
            if let Some(inner) = next.downcast_ref::<Self>() {
                kind = inner.kind();
            }
            current = next;
        }
        kind
    }

    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn from_validation_errors(errors: Vec<ValidationError>) -> Self {
        if errors.len() == 1 {
            let err = &errors[0];
            Self::Validation {
                field: err.field.clone(),
                reason: err.message.clone(),
            }
        } else {
            Self::ValidationErrors { errors }
        }
    }

    #[must_use]
    pub fn create(reason: impl Into<String>) -> Self {
        Self::Create {
            reason: reason.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn create_from(reason: impl Into<String>, source: impl Into<Cause>) -> Self {
        Self::Create {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    #[must_use]
    pub fn storage(context: impl Into<String>, source: impl Into<Cause>) -> Self {
        Self::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Wrap a failure raised while running `service` for `provider`.
    #[must_use]
    pub fn service(provider: impl Into<String>, service: Service, source: Self) -> Self {
        Self::Service {
            provider: provider.into(),
            service,
            source: Box::new(source),
        }
    }
}

/// Result type using `BugError`.
pub type Result<T> = std::result::Result<T, BugError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_for_service_errors() {
        let inner = BugError::storage("insert bug", std::io::Error::other("locked"));
        let err = BugError::service("issuetracker", Service::Crawl, inner);
        assert_eq!(err.kind(), ErrorKind::Crawl);
        assert_eq!(err.root_kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_display_messages() {
        let err = BugError::InvalidProvider {
            provider: "jira".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid provider: 'jira'");

        let err = BugError::UnsupportedService {
            provider: "datastore".to_string(),
            service: "sync".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Provider 'datastore' does not support service 'sync'"
        );
    }

    #[test]
    fn test_from_validation_errors() {
        let single = BugError::from_validation_errors(vec![ValidationError::new("title", "too long")]);
        assert!(matches!(single, BugError::Validation { .. }));

        let many = BugError::from_validation_errors(vec![
            ValidationError::new("title", "cannot be empty"),
            ValidationError::new("project", "too long"),
        ]);
        assert_eq!(
            many.to_string(),
            "Validation errors: title: cannot be empty; project: too long"
        );
        assert_eq!(many.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_update_keeps_cause() {
        use std::error::Error as _;

        let err = BugError::Update {
            id: 7,
            source: Box::new(BugError::validation("title", "cannot be empty")),
        };
        assert_eq!(err.kind(), ErrorKind::Update);
        assert_eq!(err.root_kind(), ErrorKind::Validation);
        assert!(err.source().is_some());
    }
}
