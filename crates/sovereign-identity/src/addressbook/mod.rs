//! Address book: identities indexed by key attributes.
//!
//! Every key of every added identity is entered into each registered
//! index under that key's value for the indexed attribute. The `pub`
//! index (unique, permanent) and the `fingerprint` index (unique) always
//! start out registered; more can be added at any time.
//!
//! The book borrows the identities it indexes. Owners are compared by
//! reference, so two separately loaded copies of the same identity are
//! different owners.

use std::collections::{BTreeMap, HashMap};
use std::ptr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical;
use crate::error::{IdentityError, Result};
use crate::identity::Identity;
use crate::keys::{Key, FINGERPRINT_FIELD, PUB_FIELD};

/// Definition of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Key attribute to index, e.g. `label` or `networkName`.
    pub name: String,
    /// At most one owner per value.
    pub unique: bool,
}

impl IndexSpec {
    pub fn unique(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unique: true,
        }
    }

    pub fn non_unique(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unique: false,
        }
    }
}

/// A key and the identity that holds it.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    pub key: &'a Key,
    pub identity: &'a Identity,
}

struct Index<'a> {
    unique: bool,
    entries: HashMap<String, Vec<Entry<'a>>>,
}

impl<'a> Index<'a> {
    fn new(unique: bool) -> Self {
        Self {
            unique,
            entries: HashMap::new(),
        }
    }

    /// The owner already filed under `value` that is not `identity`.
    fn conflicting_owner(&self, value: &str, identity: &Identity) -> bool {
        self.unique
            && self
                .entries
                .get(value)
                .and_then(|entries| entries.first())
                .is_some_and(|e| !ptr::eq(e.identity, identity))
    }

    fn insert(&mut self, value: String, entry: Entry<'a>) {
        let slot = self.entries.entry(value).or_default();
        if self.unique {
            slot.clear();
            slot.push(entry);
        } else if !slot.iter().any(|e| ptr::eq(e.key, entry.key)) {
            slot.push(entry);
        }
    }

    fn remove_owner(&mut self, value: &str, identity: &Identity) {
        self.remove_where(value, |e| ptr::eq(e.identity, identity));
    }

    /// Drop `entry` (same key held by the same identity) from `value`.
    fn remove_entry(&mut self, value: &str, entry: Entry<'_>) {
        self.remove_where(value, |e| {
            ptr::eq(e.identity, entry.identity) && ptr::eq(e.key, entry.key)
        });
    }

    fn remove_where(&mut self, value: &str, matches: impl Fn(&Entry<'a>) -> bool) {
        if let Some(slot) = self.entries.get_mut(value) {
            slot.retain(|e| !matches(e));
            if slot.is_empty() {
                self.entries.remove(value);
            }
        }
    }
}

/// Value of `key` under the index `name`, as an index string.
fn index_value(key: &Key, name: &str) -> Option<String> {
    match key.attribute(name)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(canonical::to_canonical_string(&other)),
    }
}

/// Multi-index store over borrowed identities.
pub struct AddressBook<'a> {
    indices: BTreeMap<String, Index<'a>>,
    /// Added identities in insertion order, for backfilling new indices.
    members: Vec<&'a Identity>,
}

impl<'a> AddressBook<'a> {
    /// An empty book with the `pub` and `fingerprint` indices.
    pub fn new() -> Self {
        let mut indices = BTreeMap::new();
        indices.insert(PUB_FIELD.to_string(), Index::new(true));
        indices.insert(FINGERPRINT_FIELD.to_string(), Index::new(true));
        Self {
            indices,
            members: Vec::new(),
        }
    }

    /// Add every key of `identity` to every index.
    ///
    /// Unless `replace` is set, fails with `DuplicateIndexValue` when a
    /// unique index already files one of the key values under another
    /// identity; nothing is changed in that case. With `replace`, keys of
    /// other identities sharing a public value are unfiled from every
    /// index, and identities left holding no filed key are dropped.
    /// Returns whether the book's size grew.
    pub fn add(&mut self, identity: &'a Identity, replace: bool) -> Result<bool> {
        let before = self.size();

        if !replace {
            for key in identity.all_keys() {
                for (name, index) in &self.indices {
                    let Some(value) = index_value(key, name) else {
                        continue;
                    };
                    if index.conflicting_owner(&value, identity) {
                        return Err(IdentityError::DuplicateIndexValue {
                            index: name.clone(),
                            value,
                        });
                    }
                }
            }
        }

        let displaced = self.displaced_by(identity);
        for entry in &displaced {
            self.unfile(*entry);
        }

        for key in identity.all_keys() {
            let entry = Entry { key, identity };
            for (name, index) in self.indices.iter_mut() {
                if let Some(value) = index_value(key, name) {
                    index.insert(value, entry);
                }
            }
        }
        if !self.members.iter().any(|m| ptr::eq(*m, identity)) {
            self.members.push(identity);
        }
        if !displaced.is_empty() {
            let pub_index = self.indices.get(PUB_FIELD);
            self.members.retain(|member| {
                pub_index.is_some_and(|index| {
                    index
                        .entries
                        .values()
                        .flatten()
                        .any(|e| ptr::eq(e.identity, *member))
                })
            });
            log::debug!("replaced {} keys held by other identities", displaced.len());
        }

        Ok(self.size() > before)
    }

    /// Entries of other identities filed under the public values of
    /// `identity`'s keys.
    fn displaced_by(&self, identity: &Identity) -> Vec<Entry<'a>> {
        let Some(pub_index) = self.indices.get(PUB_FIELD) else {
            return Vec::new();
        };
        identity
            .all_keys()
            .iter()
            .filter_map(|key| pub_index.entries.get(key.value()))
            .flatten()
            .filter(|e| !ptr::eq(e.identity, identity))
            .copied()
            .collect()
    }

    /// Remove one filed key from every index.
    fn unfile(&mut self, entry: Entry<'a>) {
        for (name, index) in self.indices.iter_mut() {
            if let Some(value) = index_value(entry.key, name) {
                index.remove_entry(&value, entry);
            }
        }
    }

    /// Remove every key of `identity` from every index. Returns whether
    /// the book's size shrank.
    pub fn remove(&mut self, identity: &Identity) -> bool {
        let before = self.size();
        for key in identity.all_keys() {
            for (name, index) in self.indices.iter_mut() {
                if let Some(value) = index_value(key, name) {
                    index.remove_owner(&value, identity);
                }
            }
        }
        self.members.retain(|m| !ptr::eq(*m, identity));
        self.size() < before
    }

    /// Number of entries in the `pub` index, i.e. keys, not identities.
    pub fn size(&self) -> usize {
        self.indices
            .get(PUB_FIELD)
            .map_or(0, |index| index.entries.values().map(Vec::len).sum())
    }

    // ── Indices ──────────────────────────────────────────────────────────────

    /// Register an index and fill it from the identities already present.
    ///
    /// Fails with `InvalidIndex` if the name is taken, or with
    /// `DuplicateIndexValue` if existing keys collide under a unique
    /// index; the book is unchanged on failure.
    pub fn add_index(&mut self, spec: IndexSpec) -> Result<()> {
        if self.indices.contains_key(&spec.name) {
            return Err(IdentityError::InvalidIndex(format!(
                "index {} already exists",
                spec.name
            )));
        }

        let mut index = Index::new(spec.unique);
        for &identity in &self.members {
            for key in identity.all_keys() {
                if !self.files_key(key, identity) {
                    continue;
                }
                let Some(value) = index_value(key, &spec.name) else {
                    continue;
                };
                if index.conflicting_owner(&value, identity) {
                    return Err(IdentityError::DuplicateIndexValue {
                        index: spec.name,
                        value,
                    });
                }
                index.insert(value, Entry { key, identity });
            }
        }

        log::debug!(
            "registered index {} (unique: {}, {} values)",
            spec.name,
            spec.unique,
            index.entries.len()
        );
        self.indices.insert(spec.name, index);
        Ok(())
    }

    /// Whether `key` is currently filed under `identity` in `pub`.
    fn files_key(&self, key: &Key, identity: &Identity) -> bool {
        self.indices
            .get(PUB_FIELD)
            .and_then(|index| index.entries.get(key.value()))
            .is_some_and(|entries| entries.iter().any(|e| ptr::eq(e.identity, identity)))
    }

    /// Drop an index. The `pub` index cannot be removed.
    pub fn remove_index(&mut self, name: &str) -> Result<bool> {
        if name == PUB_FIELD {
            return Err(IdentityError::InvalidIndex(
                "the pub index cannot be removed".into(),
            ));
        }
        Ok(self.indices.remove(name).is_some())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// Registered indices, by name.
    pub fn indices(&self) -> Vec<IndexSpec> {
        self.indices
            .iter()
            .map(|(name, index)| IndexSpec {
                name: name.clone(),
                unique: index.unique,
            })
            .collect()
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// The first entry filed under `value` in `index`.
    pub fn lookup(&self, index: &str, value: &str) -> Result<Option<Entry<'a>>> {
        Ok(self.lookup_all(index, value)?.first().copied())
    }

    /// Every entry filed under `value` in `index`, in insertion order.
    pub fn lookup_all(&self, index: &str, value: &str) -> Result<&[Entry<'a>]> {
        let index = self
            .indices
            .get(index)
            .ok_or_else(|| IdentityError::InvalidIndex(format!("no index named {index}")))?;
        Ok(index.entries.get(value).map_or(&[], Vec::as_slice))
    }

    pub fn by_pub(&self, value: &str) -> Option<Entry<'a>> {
        self.lookup(PUB_FIELD, value).ok().flatten()
    }

    /// Absent if the `fingerprint` index was removed.
    pub fn by_fingerprint(&self, fingerprint: &str) -> Option<Entry<'a>> {
        self.lookup(FINGERPRINT_FIELD, fingerprint).ok().flatten()
    }
}

impl Default for AddressBook<'_> {
    fn default() -> Self {
        Self::new()
    }
}
