//! Small shared predicates: dummy secrets and shell-style name globs.

use regex::Regex;

use crate::errors::ModelError;

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod tests;

/// A dummy secret is a value of only asterisks, as written by import for
/// redacted values. Dummy secrets are never resolved and never written.
pub fn is_dummy_secret(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c == '*')
}

/// A secret reference has the `<provider>:<key-path>` shape; everything
/// else is treated as an already resolved plaintext value.
pub fn is_secret_reference(value: &str) -> bool {
    value
        .split_once(':')
        .is_some_and(|(provider, key)| !provider.is_empty() && !key.is_empty())
}

/// Translates a shell-style glob (`*`, `?`) over repository names into an
/// anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, ModelError> {
    let mut translated = String::with_capacity(pattern.len() + 4);
    translated.push('^');
    for c in pattern.chars() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            c => translated.push_str(&regex::escape(&c.to_string())),
        }
    }
    translated.push('$');
    Ok(Regex::new(&translated)?)
}

/// Whether any of the given names matches the glob pattern.
pub fn glob_matches_any(pattern: &str, names: &[String]) -> Result<bool, ModelError> {
    let regex = glob_to_regex(pattern)?;
    Ok(names.iter().any(|name| regex.is_match(name)))
}
