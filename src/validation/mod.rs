//! Validation helpers for bugtrack.
//!
//! These routines check entity fields before they reach storage and
//! return structured validation errors without touching the database.

use bugtrack_core::error::{BugError, ValidationError};
use bugtrack_core::model::{Bug, TestCycle};
use bugtrack_core::util::decompose_url;

pub const MAX_TITLE_LEN: usize = 500;
pub const MAX_PROJECT_LEN: usize = 200;

/// Validates bug fields and invariants.
pub struct BugValidator;

impl BugValidator {
    /// Validate a bug and return all validation errors found.
    ///
    /// # Errors
    ///
    /// Returns a `Vec<ValidationError>` if any validation rules are violated.
    pub fn validate(bug: &Bug) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        // Title: Required, max 500 chars.
        if bug.title.trim().is_empty() {
            errors.push(ValidationError::new("title", "cannot be empty"));
        }
        if bug.title.chars().count() > MAX_TITLE_LEN {
            errors.push(ValidationError::new("title", "exceeds 500 characters"));
        }

        if bug.project.chars().count() > MAX_PROJECT_LEN {
            errors.push(ValidationError::new("project", "exceeds 200 characters"));
        }

        // Provider key: optional, but never blank or padded.
        if let Some(bug_id) = bug.bug_id.as_ref() {
            if bug_id.trim().is_empty() {
                errors.push(ValidationError::new("bug_id", "cannot be blank"));
            } else if bug_id.chars().any(char::is_whitespace) {
                errors.push(ValidationError::new("bug_id", "cannot contain whitespace"));
            }
        }

        if let Some(url) = bug.url.as_ref() {
            if let Err(err) = decompose_url(url) {
                errors.push(ValidationError::new("url", strip_field(&err)));
            }
        }

        if bug.metadata.keys().any(|key| key.trim().is_empty()) {
            errors.push(ValidationError::new("metadata", "keys cannot be empty"));
        }

        if bug.modified < bug.added {
            errors.push(ValidationError::new("modified", "cannot be before added"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding the errors into a single `BugError`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `ValidationErrors` on failure.
    pub fn check(bug: &Bug) -> Result<(), BugError> {
        Self::validate(bug).map_err(BugError::from_validation_errors)
    }
}

/// Validates test cycle identity fields.
pub struct CycleValidator;

impl CycleValidator {
    /// Validate a test cycle.
    ///
    /// Project and cycle id become path segments on the request router, so
    /// neither may contain `/`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `ValidationErrors` on failure.
    pub fn check(cycle: &TestCycle) -> Result<(), BugError> {
        let mut errors = Vec::new();

        for (field, value) in [("project", &cycle.project), ("cycle_id", &cycle.cycle_id)] {
            if value.trim().is_empty() {
                errors.push(ValidationError::new(field, "cannot be empty"));
            } else if value.contains('/') {
                errors.push(ValidationError::new(field, "cannot contain '/'"));
            }
        }

        if cycle.project.chars().count() > MAX_PROJECT_LEN {
            errors.push(ValidationError::new("project", "exceeds 200 characters"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BugError::from_validation_errors(errors))
        }
    }
}

fn strip_field(err: &BugError) -> String {
    match err {
        BugError::Validation { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}
