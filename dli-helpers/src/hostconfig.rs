//! Per-host settings: one default, with overrides for specific hosts (or any other key).

use std::collections::HashMap;

/// Values keyed by hostname or any other string; lookups fall back to the default.
#[derive(Debug, Clone)]
pub struct Overrides<T> {
    default: T,
    values: HashMap<String, T>,
}

impl<T> Overrides<T> {
    pub fn new(default: T) -> Self {
        Self {
            default,
            values: HashMap::new(),
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: T) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> &T {
        self.values.get(key).unwrap_or(&self.default)
    }

    /// Value for the machine this runs on.
    pub fn for_this_host(&self) -> &T {
        self.get(&hostname())
    }
}

/// `default` unless `key` has an entry in `overrides`.
pub fn by_key<T: Clone>(key: &str, default: T, overrides: &[(&str, T)]) -> T {
    overrides
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or(default)
}

/// `by_key` with this machine's hostname as the key.
pub fn by_hostname<T: Clone>(default: T, overrides: &[(&str, T)]) -> T {
    by_key(&hostname(), default, overrides)
}

pub fn hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_key_falls_back_to_default() {
        let overrides = [("laundry", 17), ("garage", 4)];
        assert_eq!(by_key("garage", 1, &overrides), 4);
        assert_eq!(by_key("kitchen", 1, &overrides), 1);
        assert_eq!(by_key("kitchen", 1, &[]), 1);
    }

    #[test]
    fn by_hostname_uses_local_host() {
        let me = hostname();
        assert_eq!(by_hostname("default", &[(me.as_str(), "mine")]), "mine");
        assert_eq!(by_hostname("default", &[("surely-not-this-host", "theirs")]), "default");
    }

    #[test]
    fn overrides_map() {
        let pins = Overrides::new(5).set("laundry", 12).set("porch", 3);
        assert_eq!(*pins.get("laundry"), 12);
        assert_eq!(*pins.get("porch"), 3);
        assert_eq!(*pins.get("attic"), 5);

        let here = Overrides::new("default").set(hostname(), "here");
        assert_eq!(*here.for_this_host(), "here");
    }
}
