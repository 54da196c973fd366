use std::fmt;

use thiserror::Error;

/// Separator between subject segments.
pub const SEPARATOR: char = '.';

/// Errors produced while validating or parsing subjects.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubjectError {
    /// The token is empty.
    #[error("subject token must not be empty")]
    EmptyToken,

    /// A segment of the subject is empty.
    #[error("subject {0:?} contains an empty segment")]
    EmptySegment(String),

    /// The token contains a separator, wildcard or whitespace.
    #[error("subject token {0:?} must not contain '.', '*', '>' or whitespace")]
    InvalidToken(String),

    /// The subject has too few segments to name a method.
    #[error("subject {0:?} must have at least two segments")]
    TooFewSegments(String),
}

/// Checks that `token` can be used as a single subject segment.
///
/// # Errors
///
/// Returns an error if the token is empty or contains a separator, a wildcard or whitespace.
pub fn validate_token(token: &str) -> Result<(), SubjectError> {
    if token.is_empty() {
        return Err(SubjectError::EmptyToken);
    }

    if token
        .chars()
        .any(|c| c == SEPARATOR || c == '*' || c == '>' || c.is_whitespace())
    {
        return Err(SubjectError::InvalidToken(token.to_string()));
    }

    Ok(())
}

/// The subject a method of a service is invoked on.
#[must_use]
pub fn method_subject(service: &str, method: &str) -> String {
    format!("{service}{SEPARATOR}{method}")
}

/// The wildcard subject covering every method of a service.
#[must_use]
pub fn service_wildcard(service: &str) -> String {
    format!("{service}{SEPARATOR}>")
}

/// A concrete subject split into its namespace and method name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSubject {
    namespace: String,
    method: String,
}

impl MethodSubject {
    /// Parses a subject of the form `<namespace>.<method>`.
    ///
    /// The namespace may itself span several segments; the method is always the final one.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject has fewer than two segments or any segment is empty.
    pub fn parse(subject: &str) -> Result<Self, SubjectError> {
        let Some((namespace, method)) = subject.rsplit_once(SEPARATOR) else {
            return Err(SubjectError::TooFewSegments(subject.to_string()));
        };

        if method.is_empty() || namespace.split(SEPARATOR).any(str::is_empty) {
            return Err(SubjectError::EmptySegment(subject.to_string()));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            method: method.to_string(),
        })
    }

    /// Everything before the final separator.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The final segment.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for MethodSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.namespace, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_subject() {
        let subject = MethodSubject::parse("math.add").unwrap();
        assert_eq!(subject.namespace(), "math");
        assert_eq!(subject.method(), "add");
        assert_eq!(subject.to_string(), "math.add");
    }

    #[test]
    fn test_parse_takes_last_segment() {
        let subject = MethodSubject::parse("math.v2.add").unwrap();
        assert_eq!(subject.namespace(), "math.v2");
        assert_eq!(subject.method(), "add");
    }

    #[test]
    fn test_parse_rejects_single_segment() {
        assert_eq!(
            MethodSubject::parse("math"),
            Err(SubjectError::TooFewSegments("math".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        for subject in ["math.", ".add", "math..add"] {
            assert_eq!(
                MethodSubject::parse(subject),
                Err(SubjectError::EmptySegment(subject.to_string())),
                "{subject}"
            );
        }
    }

    #[test]
    fn test_validate_token() {
        assert!(validate_token("math").is_ok());
        assert!(validate_token("snake_case-and-dash").is_ok());
        assert_eq!(validate_token(""), Err(SubjectError::EmptyToken));

        for token in ["a.b", "a*", ">", "with space", "tab\t"] {
            assert_eq!(
                validate_token(token),
                Err(SubjectError::InvalidToken(token.to_string()))
            );
        }
    }

    #[test]
    fn test_subject_builders() {
        assert_eq!(method_subject("math", "add"), "math.add");
        assert_eq!(service_wildcard("math"), "math.>");
    }
}
