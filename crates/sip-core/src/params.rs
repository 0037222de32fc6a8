//! Ordered, percent-decoded `name -> value` maps, used by both SIP-URIs
//! (parameters and headers) and by header field parameters (Via, Contact,
//! ...). Insertion order is preserved; lookups fold the name to lower-case
//! since SIP parameter names are case-insensitive.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered multimap-free `name -> value` association list. A parameter
/// present without a value (e.g. `;lr`) stores `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params(Vec<(String, Option<String>)>);

impl Params {
    pub fn new() -> Self {
        Params(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Insert or overwrite `name`, preserving its original position if it
    /// already existed.
    pub fn set(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        let lower = name.to_ascii_lowercase();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&lower)) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    pub fn push(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Option<String>> {
        let idx = self.0.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(idx).1)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.0 {
            write!(f, ";{name}")?;
            if let Some(v) = value {
                write!(f, "={v}")?;
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Option<String>)> for Params {
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order_and_is_case_insensitive() {
        let mut p = Params::new();
        p.set("Transport", Some("tcp".to_string()));
        p.set("lr", None);
        assert_eq!(p.get("TRANSPORT"), Some(Some("tcp")));
        assert_eq!(p.get("lr"), Some(None));
        assert_eq!(p.to_string(), ";Transport=tcp;lr");
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut p = Params::new();
        p.set("a", Some("1".to_string()));
        p.set("b", Some("2".to_string()));
        p.set("a", Some("3".to_string()));
        assert_eq!(p.to_string(), ";a=3;b=2");
    }
}
