//! Secret values handed only to the stages that consume them

use std::collections::HashMap;
use std::fmt;

/// Secret environment values, redacted from debug output
#[derive(Clone, Default)]
pub struct Secrets {
    values: HashMap<String, String>,
}

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve each name through `lookup` (usually the process environment)
    pub fn from_lookup<'a, I, F>(names: I, lookup: F) -> Self
    where
        I: IntoIterator<Item = &'a String>,
        F: Fn(&str) -> Option<String>,
    {
        let values = names
            .into_iter()
            .filter_map(|name| lookup(name).map(|value| (name.clone(), value)))
            .collect();
        Self { values }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Value of a secret, treating empty strings as unset
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Secrets").field("names", &names).finish()
    }
}
