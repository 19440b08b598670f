use std::fmt;

/// Machine-readable error codes for caller-side decision making.
///
/// Every failure surfaced by the engine maps to exactly one code so callers
/// (and log pipelines) can branch without parsing message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    EmptyQuery,
    ConfigInvalid,
    IndexUnavailable,
    StoreUnavailable,
    RetrievalFailed,
    UnderMinimum,
    RuleResolution,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::EmptyQuery => "E1001",
            Self::ConfigInvalid => "E1002",
            Self::IndexUnavailable => "E2001",
            Self::StoreUnavailable => "E2002",
            Self::RetrievalFailed => "E2003",
            Self::UnderMinimum => "E3001",
            Self::RuleResolution => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyQuery => "Query embedding is empty or degenerate",
            Self::ConfigInvalid => "Retrieval configuration is invalid",
            Self::IndexUnavailable => "Similarity index unreachable",
            Self::StoreUnavailable => "Knowledge graph store unreachable",
            Self::RetrievalFailed => "Retrieval failed with no fallback available",
            Self::UnderMinimum => "Result set below configured minimum",
            Self::RuleResolution => "Mandatory boost rule target not resolvable",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::EmptyQuery => Some("Re-embed the query; zero vectors are not searchable."),
            Self::ConfigInvalid => Some("Fix the [retrieval] section and reload."),
            Self::IndexUnavailable => Some("Check the similarity index service and retry."),
            Self::StoreUnavailable => Some("Check the knowledge graph store and retry."),
            Self::RetrievalFailed => {
                Some("Index is down and the query carried no literal identifiers to fall back on.")
            }
            Self::UnderMinimum => None,
            Self::RuleResolution => {
                Some("Re-ingest the rule's target nodes or remove the stale rule.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 8] = [
        ErrorCode::EmptyQuery,
        ErrorCode::ConfigInvalid,
        ErrorCode::IndexUnavailable,
        ErrorCode::StoreUnavailable,
        ErrorCode::RetrievalFailed,
        ErrorCode::UnderMinimum,
        ErrorCode::RuleResolution,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let id = code.code();
            assert_eq!(id.len(), 5);
            assert!(id.starts_with('E'));
            assert!(id.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn messages_are_nonempty() {
        for code in ALL {
            assert!(!code.message().is_empty());
        }
    }
}
