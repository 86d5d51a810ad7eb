use std::collections::BTreeMap;

use log::trace;

/// A snapshot of environment variables. Lookups treat an empty value the same as an absent one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    vars: BTreeMap<String, String>,
}

impl Env {
    /// Captures the environment of the current process. Variables whose name or value is not
    /// valid unicode are skipped.
    pub fn from_os() -> Self {
        std::env::vars_os()
            .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                (name, _) => {
                    trace!("skipping non-unicode environment variable {name:?}");
                    None
                }
            })
            .collect()
    }

    /// Returns the value of `name`, or an empty string if it is not set.
    pub fn get(&self, name: &str) -> &str {
        self.get_or(name, "")
    }

    /// Returns the value of `name`, or `default` if it is not set or empty.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.vars.get(name) {
            Some(value) if !value.is_empty() => value.as_str(),
            _ => default,
        }
    }

    /// Returns true if `name` is set to exactly `true`.
    pub fn is_true(&self, name: &str) -> bool {
        self.get(name) == "true"
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Env {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_use_defaults() {
        let env: Env = [("A", "1"), ("EMPTY", "")].into_iter().collect();
        assert_eq!(env.get("A"), "1");
        assert_eq!(env.get("B"), "");
        assert_eq!(env.get_or("B", "fallback"), "fallback");
        assert_eq!(env.get_or("EMPTY", "fallback"), "fallback");
        assert_eq!(env.get_or("A", "fallback"), "1");
    }

    #[test]
    fn is_true_is_strict() {
        let env = Env::default()
            .with("YES", "true")
            .with("UPPER", "TRUE")
            .with("ONE", "1");
        assert!(env.is_true("YES"));
        assert!(!env.is_true("UPPER"));
        assert!(!env.is_true("ONE"));
        assert!(!env.is_true("MISSING"));
    }

    #[test]
    fn iteration_is_sorted() {
        let env: Env = [("B", "2"), ("A", "1")].into_iter().collect();
        assert_eq!(env.iter().collect::<Vec<_>>(), [("A", "1"), ("B", "2")]);
    }

    #[test]
    fn from_os_sees_process_environment() {
        // PATH is set for any reasonable test runner.
        assert!(!Env::from_os().get("PATH").is_empty());
    }
}
