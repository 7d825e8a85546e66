//! Signature trees.
//!
//! A signed document carries signatures on individual sub-records (for an
//! identity, on each key record) instead of once over the whole document.
//! Every signature covers the canonical form of the entire document with
//! all signature fields stripped, and is checked with the key described by
//! the record that carried it.
//!
//! [`split`] separates a document into its unsigned content and a tree of
//! signatures aligned to the same paths; [`verify_tree`] checks that tree
//! against the unsigned content; [`join`] puts the two back together.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::canonical;
use crate::config::SIG_FIELD;
use crate::error::{IdentityError, Result};
use crate::keys::Key;

/// One step of a path into a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Signatures laid out along the paths of the records they were found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureTree {
    /// The record at this path carried this signature.
    Signed(String),
    /// The record at this path carried a `_sig` that is not a string.
    /// It never verifies and is restored verbatim by [`join`].
    Malformed(Value),
    /// Signed records somewhere below this path.
    Branch(BTreeMap<Segment, SignatureTree>),
}

impl SignatureTree {
    /// A tree with no signatures.
    pub fn empty() -> Self {
        Self::Branch(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Branch(children) if children.is_empty())
    }

    /// Number of signatures in the tree.
    pub fn count(&self) -> usize {
        match self {
            Self::Signed(_) | Self::Malformed(_) => 1,
            Self::Branch(children) => children.values().map(Self::count).sum(),
        }
    }
}

fn invalid(path: &[Segment]) -> IdentityError {
    IdentityError::InvalidSignature {
        path: render_path(path),
    }
}

fn render_path(path: &[Segment]) -> String {
    let mut out = String::from("$");
    for segment in path {
        out.push_str(&segment.to_string());
    }
    out
}

// ── Split ────────────────────────────────────────────────────────────────────

/// Separate `document` into unsigned content and its signature tree.
///
/// Any object below the root carrying `_sig` is a signed record: its
/// signature goes into the tree and the record, minus `_sig`, stays in the
/// content. A `_sig` that is not a string is kept as a malformed leaf so
/// verification rejects it. Objects and arrays that are not signed are
/// walked.
pub fn split(document: &Value) -> (Value, SignatureTree) {
    match document {
        Value::Object(map) => {
            let mut unsigned = Map::new();
            let mut children = BTreeMap::new();
            for (name, value) in map {
                let (content, tree) = split_child(value);
                unsigned.insert(name.clone(), content);
                if !tree.is_empty() {
                    children.insert(Segment::Field(name.clone()), tree);
                }
            }
            (Value::Object(unsigned), SignatureTree::Branch(children))
        }
        Value::Array(items) => {
            let mut unsigned = Vec::with_capacity(items.len());
            let mut children = BTreeMap::new();
            for (i, value) in items.iter().enumerate() {
                let (content, tree) = split_child(value);
                unsigned.push(content);
                if !tree.is_empty() {
                    children.insert(Segment::Index(i), tree);
                }
            }
            (Value::Array(unsigned), SignatureTree::Branch(children))
        }
        other => (other.clone(), SignatureTree::empty()),
    }
}

fn split_child(value: &Value) -> (Value, SignatureTree) {
    if let Value::Object(map) = value {
        if let Some(sig) = map.get(SIG_FIELD) {
            let mut unsigned = map.clone();
            unsigned.remove(SIG_FIELD);
            let leaf = match sig {
                Value::String(sig) => SignatureTree::Signed(sig.clone()),
                other => SignatureTree::Malformed(other.clone()),
            };
            return (Value::Object(unsigned), leaf);
        }
    }
    split(value)
}

// ── Verify ───────────────────────────────────────────────────────────────────

/// Verify every signature in `tree` against `unsigned`.
///
/// Each signature must verify over the canonical form of the whole of
/// `unsigned`, using the key parsed from the record at the signature's
/// path. Stops at the first failure, naming its path.
pub fn verify_tree(unsigned: &Value, tree: &SignatureTree) -> Result<()> {
    let message = canonical::to_canonical_string(unsigned);
    let mut path = Vec::new();
    verify_node(unsigned, tree, message.as_bytes(), &mut path)
}

fn verify_node(
    node: &Value,
    tree: &SignatureTree,
    message: &[u8],
    path: &mut Vec<Segment>,
) -> Result<()> {
    match tree {
        SignatureTree::Signed(sig) => {
            let key = Key::from_record(node).map_err(|e| {
                log::debug!("unusable key record at {}: {e}", render_path(path));
                invalid(path)
            })?;
            if !key.verify(message, sig) {
                return Err(invalid(path));
            }
            Ok(())
        }
        SignatureTree::Malformed(sig) => {
            log::debug!("non-string signature {sig} at {}", render_path(path));
            Err(invalid(path))
        }
        SignatureTree::Branch(children) => {
            for (segment, subtree) in children {
                let child = match (segment, node) {
                    (Segment::Field(name), Value::Object(map)) => map.get(name),
                    (Segment::Index(i), Value::Array(items)) => items.get(*i),
                    _ => None,
                };
                path.push(segment.clone());
                let Some(child) = child else {
                    return Err(invalid(path));
                };
                verify_node(child, subtree, message, path)?;
                path.pop();
            }
            Ok(())
        }
    }
}

// ── Join ─────────────────────────────────────────────────────────────────────

/// Reattach the signatures in `tree` to `unsigned`.
///
/// Paths that do not exist in `unsigned`, or that do not lead to an
/// object, are skipped.
pub fn join(unsigned: &Value, tree: &SignatureTree) -> Value {
    let mut out = unsigned.clone();
    join_into(&mut out, tree);
    out
}

fn join_into(node: &mut Value, tree: &SignatureTree) {
    match tree {
        SignatureTree::Signed(sig) => {
            if let Value::Object(map) = node {
                map.insert(SIG_FIELD.into(), Value::String(sig.clone()));
            }
        }
        SignatureTree::Malformed(sig) => {
            if let Value::Object(map) = node {
                map.insert(SIG_FIELD.into(), sig.clone());
            }
        }
        SignatureTree::Branch(children) => {
            for (segment, subtree) in children {
                let child = match (segment, &mut *node) {
                    (Segment::Field(name), Value::Object(map)) => map.get_mut(name),
                    (Segment::Index(i), Value::Array(items)) => items.get_mut(*i),
                    _ => None,
                };
                if let Some(child) = child {
                    join_into(child, subtree);
                }
            }
        }
    }
}
