//! The ordered, multi-valued header map backing every [`Message`](super::message::Message)
//! (spec §3 HeaderTable, §4.3 component C3).
//!
//! Headers repeated across wire lines concatenate into one ordered value
//! sequence per name; insertion order of first appearance is preserved
//! across names. Every `*_front` / `*_back` operation preserves the
//! relative order of the values that remain, and a header whose value list
//! becomes empty after a pop collapses its key entirely.

use serde::{Deserialize, Serialize};

use crate::types::header_name::HeaderName;
use crate::types::header_value::HeaderValue;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderTable {
    entries: Vec<(HeaderName, Vec<HeaderValue>)>,
}

impl HeaderTable {
    pub fn new() -> Self {
        HeaderTable { entries: Vec::new() }
    }

    fn index_of(&self, name: &HeaderName) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    pub fn has_header(&self, name: &HeaderName) -> bool {
        self.index_of(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &HeaderName> {
        self.entries.iter().map(|(n, _)| n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &[HeaderValue])> {
        self.entries.iter().map(|(n, v)| (n, v.as_slice()))
    }

    /// All values under `name`, in wire order; empty if absent.
    pub fn values(&self, name: &HeaderName) -> &[HeaderValue] {
        self.index_of(name).map(|i| self.entries[i].1.as_slice()).unwrap_or(&[])
    }

    /// Insert `name=value` only if the header is entirely absent; no-op
    /// otherwise.
    pub fn put_new(&mut self, name: HeaderName, value: HeaderValue) {
        if !self.has_header(&name) {
            self.entries.push((name, vec![value]));
        }
    }

    /// As [`put_new`](Self::put_new), but the value is produced lazily so
    /// callers avoid computing it when the header is already present.
    pub fn put_new_lazy(&mut self, name: HeaderName, make_value: impl FnOnce() -> HeaderValue) {
        if !self.has_header(&name) {
            self.entries.push((name, vec![make_value()]));
        }
    }

    /// Prepend `value` to `name`'s value list, creating the header if
    /// absent.
    pub fn put_front(&mut self, name: HeaderName, value: HeaderValue) {
        match self.index_of(&name) {
            Some(i) => self.entries[i].1.insert(0, value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Append `value` to `name`'s value list, creating the header if
    /// absent.
    pub fn put_back(&mut self, name: HeaderName, value: HeaderValue) {
        match self.index_of(&name) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Remove every value under `name`, collapsing its key.
    pub fn drop(&mut self, name: &HeaderName) {
        if let Some(i) = self.index_of(name) {
            self.entries.remove(i);
        }
    }

    /// Remove the first value under `name`; collapses the key if it was
    /// the only value.
    pub fn delete_front(&mut self, name: &HeaderName) -> Option<HeaderValue> {
        let i = self.index_of(name)?;
        let values = &mut self.entries[i].1;
        if values.is_empty() {
            return None;
        }
        let v = values.remove(0);
        if values.is_empty() {
            self.entries.remove(i);
        }
        Some(v)
    }

    /// Remove the last value under `name`; collapses the key if it was the
    /// only value.
    pub fn delete_back(&mut self, name: &HeaderName) -> Option<HeaderValue> {
        let i = self.index_of(name)?;
        let values = &mut self.entries[i].1;
        let v = values.pop()?;
        if values.is_empty() {
            self.entries.remove(i);
        }
        Some(v)
    }

    /// Alias for [`delete_front`](Self::delete_front): the conventional
    /// single-value deletion.
    pub fn delete(&mut self, name: &HeaderName) -> Option<HeaderValue> {
        self.delete_front(name)
    }

    pub fn fetch_front(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.values(name).first()
    }

    pub fn fetch_back(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.values(name).last()
    }

    pub fn fetch(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.fetch_front(name)
    }

    /// The bang-suffixed accessor from the source dialect: `Some` becomes
    /// `Ok`, absence becomes `Err`.
    pub fn fetch_result(&self, name: &HeaderName) -> crate::error::Result<&HeaderValue> {
        self.fetch(name)
            .ok_or_else(|| crate::error::Error::Other(format!("missing header: {name}")))
    }

    pub fn get<'a>(&'a self, name: &HeaderName, default: &'a HeaderValue) -> &'a HeaderValue {
        self.fetch(name).unwrap_or(default)
    }

    /// Replace every value under `name` by mapping `f` over the existing
    /// list; no-op if absent.
    pub fn update(&mut self, name: &HeaderName, f: impl FnOnce(&[HeaderValue]) -> Vec<HeaderValue>) {
        if let Some(i) = self.index_of(name) {
            self.entries[i].1 = f(&self.entries[i].1);
        }
    }

    pub fn update_front(&mut self, name: &HeaderName, f: impl FnOnce(&HeaderValue) -> HeaderValue) {
        if let Some(i) = self.index_of(name) {
            if let Some(first) = self.entries[i].1.first_mut() {
                *first = f(first);
            }
        }
    }

    pub fn update_back(&mut self, name: &HeaderName, f: impl FnOnce(&HeaderValue) -> HeaderValue) {
        if let Some(i) = self.index_of(name) {
            if let Some(last) = self.entries[i].1.last_mut() {
                *last = f(last);
            }
        }
    }

    pub fn pop_front(&mut self, name: &HeaderName) -> Option<HeaderValue> {
        self.delete_front(name)
    }

    pub fn pop_back(&mut self, name: &HeaderName) -> Option<HeaderValue> {
        self.delete_back(name)
    }

    /// Apply `f` to the front value, returning whatever `f` returns
    /// alongside the header's state after the update; `f` returning `None`
    /// deletes the value as [`delete_front`](Self::delete_front) would.
    pub fn get_and_update_front<R>(
        &mut self,
        name: &HeaderName,
        f: impl FnOnce(Option<&HeaderValue>) -> (R, Option<HeaderValue>),
    ) -> R {
        let current = self.fetch_front(name).cloned();
        let (ret, new_value) = f(current.as_ref());
        match new_value {
            Some(v) => {
                if self.has_header(name) {
                    self.update_front(name, move |_| v.clone());
                } else {
                    self.put_front(name.clone(), v);
                }
            }
            None => {
                self.delete_front(name);
            }
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> HeaderValue {
        HeaderValue::SingleToken(s.to_string())
    }

    #[test]
    fn put_back_preserves_insertion_order() {
        let mut t = HeaderTable::new();
        t.put_back(HeaderName::Route, token("a"));
        t.put_back(HeaderName::Route, token("b"));
        t.put_back(HeaderName::Route, token("c"));
        assert_eq!(t.values(&HeaderName::Route), &[token("a"), token("b"), token("c")]);
    }

    #[test]
    fn put_front_only_repositions_the_new_element() {
        let mut t = HeaderTable::new();
        t.put_back(HeaderName::Route, token("a"));
        t.put_back(HeaderName::Route, token("b"));
        t.put_front(HeaderName::Route, token("z"));
        assert_eq!(t.values(&HeaderName::Route), &[token("z"), token("a"), token("b")]);
    }

    #[test]
    fn empty_value_list_collapses_the_key() {
        let mut t = HeaderTable::new();
        t.put_back(HeaderName::Subject, token("only"));
        assert!(t.has_header(&HeaderName::Subject));
        t.delete_front(&HeaderName::Subject);
        assert!(!t.has_header(&HeaderName::Subject));
    }

    #[test]
    fn put_new_is_a_no_op_when_present() {
        let mut t = HeaderTable::new();
        t.put_new(HeaderName::Subject, token("first"));
        t.put_new(HeaderName::Subject, token("second"));
        assert_eq!(t.values(&HeaderName::Subject), &[token("first")]);
    }

    #[test]
    fn fetch_result_errs_on_absence() {
        let t = HeaderTable::new();
        assert!(t.fetch_result(&HeaderName::CallId).is_err());
    }
}
