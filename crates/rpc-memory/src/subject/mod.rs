/// Checks if a subject matches a subscription pattern.
///
/// Supports NATS-style wildcards:
/// - `*` matches exactly one token
/// - `>` matches one or more trailing tokens
#[must_use]
pub fn subject_matches_pattern(subject: &str, pattern: &str) -> bool {
    let mut subject_tokens = subject.split('.');
    let mut pattern_tokens = pattern.split('.').peekable();

    while let Some(pattern_token) = pattern_tokens.next() {
        if pattern_token == ">" && pattern_tokens.peek().is_none() {
            return subject_tokens.next().is_some();
        }

        match subject_tokens.next() {
            Some(subject_token) if pattern_token == "*" || pattern_token == subject_token => {}
            _ => return false,
        }
    }

    subject_tokens.next().is_none()
}

/// Whether the subject is concrete, i.e. can be published to.
#[must_use]
pub fn is_publishable(subject: &str) -> bool {
    !subject.is_empty()
        && subject
            .split('.')
            .all(|token| !token.is_empty() && token != "*" && token != ">")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(subject_matches_pattern("math.add", "math.add"));
        assert!(!subject_matches_pattern("math.add", "math.sub"));
        assert!(!subject_matches_pattern("math.add", "math"));
        assert!(!subject_matches_pattern("math", "math.add"));
    }

    #[test]
    fn test_single_token_wildcard() {
        assert!(subject_matches_pattern("math.add", "math.*"));
        assert!(subject_matches_pattern("math.add", "*.add"));
        assert!(!subject_matches_pattern("math.v2.add", "math.*"));
        assert!(!subject_matches_pattern("math", "math.*"));
    }

    #[test]
    fn test_greedy_wildcard() {
        assert!(subject_matches_pattern("math.add", "math.>"));
        assert!(subject_matches_pattern("math.v2.add", "math.>"));
        assert!(subject_matches_pattern("math.v2.add", ">"));
        assert!(!subject_matches_pattern("math", "math.>"));
        assert!(!subject_matches_pattern("other.add", "math.>"));
    }

    #[test]
    fn test_is_publishable() {
        assert!(is_publishable("math.add"));
        assert!(!is_publishable("math.*"));
        assert!(!is_publishable("math.>"));
        assert!(!is_publishable("math..add"));
        assert!(!is_publishable(""));
    }
}
