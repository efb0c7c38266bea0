//! Output patterns used to inspect command output

use regex::Regex;

/// Lines a linter prints for warnings and errors (`warning:`, `error[E0308]:`)
pub const DEFAULT_DIAGNOSTIC_PATTERN: &str = r"^\s*(warning|error)(\[[^\]]+\])?:";

/// semantic-release reports `Published release 1.2.3 on default channel`
pub const DEFAULT_PUBLISHED_PATTERN: &str = r"Published release v?(\d+\.\d+\.\d+[^\s]*)";

/// Pattern for matching command output (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum ConditionPattern {
    /// Simple string contains match
    Simple(String),
    /// Regular expression match
    Regex(Regex),
}

impl ConditionPattern {
    /// Compile a pattern, as a regex when `use_regex` is set
    pub fn new(pattern: &str, use_regex: bool) -> Result<Self, regex::Error> {
        if use_regex {
            Ok(ConditionPattern::Regex(Regex::new(pattern)?))
        } else {
            Ok(ConditionPattern::Simple(pattern.to_string()))
        }
    }

    /// Default pattern for lint diagnostics
    pub fn diagnostics() -> Self {
        Self::builtin(DEFAULT_DIAGNOSTIC_PATTERN)
    }

    /// Default pattern for a published release
    pub fn published_release() -> Self {
        Self::builtin(DEFAULT_PUBLISHED_PATTERN)
    }

    fn builtin(pattern: &str) -> Self {
        Regex::new(pattern)
            .map(ConditionPattern::Regex)
            .unwrap_or_else(|_| ConditionPattern::Simple(pattern.to_string()))
    }

    /// Check if the pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ConditionPattern::Simple(pattern) => text.contains(pattern),
            ConditionPattern::Regex(regex) => regex.is_match(text),
        }
    }

    /// First capture group of a regex pattern
    pub fn capture(&self, text: &str) -> Option<String> {
        match self {
            ConditionPattern::Simple(_) => None,
            ConditionPattern::Regex(regex) => regex
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        }
    }

    pub fn display(&self) -> String {
        match self {
            ConditionPattern::Simple(s) => s.clone(),
            ConditionPattern::Regex(r) => format!("[regex: {}]", r.as_str()),
        }
    }
}
