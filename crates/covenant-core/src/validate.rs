//! Request validation.
//!
//! Deserialization checks that a merged request has the right structure.
//! [`Validate`] is the hook for everything else (ranges, formats, cross-field
//! rules) and reports problems per field.

use serde::{Deserialize, Serialize};

/// Validation hook run on a request after it has been merged and deserialized.
///
/// The default implementation accepts every value, so types with no extra
/// rules only need an empty `impl`.
///
/// # Example
///
/// ```
/// use covenant_core::{FieldIssues, Validate};
///
/// struct Signup {
///     email: String,
/// }
///
/// impl Validate for Signup {
///     fn validate(&self) -> Result<(), FieldIssues> {
///         let mut issues = FieldIssues::new();
///         if !self.email.contains('@') {
///             issues.add("email", "must be an email address");
///         }
///         issues.into_result()
///     }
/// }
///
/// assert!(Signup { email: "nope".into() }.validate().is_err());
/// ```
pub trait Validate {
    /// Checks the value, returning per-field issues on failure.
    fn validate(&self) -> Result<(), FieldIssues> {
        Ok(())
    }
}

/// A single validation problem attached to a field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Dotted path of the offending field (e.g. `address.zip`).
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

/// An ordered list of field validation problems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldIssues {
    issues: Vec<FieldIssue>,
}

impl FieldIssues {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an issue for `path`.
    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Returns `true` if no issues were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns the number of recorded issues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Iterates over the recorded issues.
    pub fn iter(&self) -> impl Iterator<Item = &FieldIssue> {
        self.issues.iter()
    }

    /// `Ok(())` when empty, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldIssues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .issues
            .iter()
            .map(|issue| format!("{}: {}", issue.path, issue.message))
            .collect();
        write!(f, "{}", rendered.join(", "))
    }
}

impl std::error::Error for FieldIssues {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        assert!(FieldIssues::new().into_result().is_ok());

        let mut issues = FieldIssues::new();
        issues.add("email", "required");
        let err = issues.into_result().unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_keeps_insertion_order() {
        let mut issues = FieldIssues::new();
        issues.add("b", "second");
        issues.add("a", "first");
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["b", "a"]);
    }

    #[test]
    fn test_serializes_as_list() {
        let mut issues = FieldIssues::new();
        issues.add("name", "too long");
        let json = serde_json::to_value(&issues).unwrap();
        assert_eq!(json, serde_json::json!([{"path": "name", "message": "too long"}]));
    }

    #[test]
    fn test_display() {
        let mut issues = FieldIssues::new();
        issues.add("name", "too long");
        issues.add("email", "invalid");
        assert_eq!(issues.to_string(), "name: too long, email: invalid");
    }
}
