//! Handle Table - per-packet object references
//!
//! A response describes objects once in `refs` and points at them from the
//! body with `{"ref": n}`. The table is rebuilt for every packet and borrows
//! from it, so handles can never leak across messages.

use ahash::{AHashMap, AHashSet};
use serde_json::{Map, Value};

use crate::types::Handle;

/// Default bound on nested ref expansion
pub const DEFAULT_MAX_REF_DEPTH: usize = 8;

#[derive(Debug, Default)]
pub struct HandleTable<'a> {
    entries: AHashMap<Handle, &'a Value>,
}

impl<'a> HandleTable<'a> {
    /// Index every ref that carries an integer `handle`
    pub fn from_refs(refs: &'a [Value]) -> Self {
        let mut entries = AHashMap::with_capacity(refs.len());
        for r in refs {
            // refs without a handle are legal and simply unreachable
            if let Some(handle) = r.get("handle").and_then(Value::as_i64) {
                entries.insert(handle, r);
            }
        }
        Self { entries }
    }

    pub fn get(&self, handle: Handle) -> Option<&'a Value> {
        self.entries.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deep-resolve `{"ref": n}` pointers in `value`
    ///
    /// A bare pointer is replaced by its target. An object that carries `ref`
    /// next to other fields (a property descriptor) keeps its fields and gets
    /// the target under `value`. Unknown refs are left untouched.
    ///
    /// Each target that itself points at other handles is expanded once per
    /// call; later pointers to it stay raw. Leaf targets are inlined
    /// everywhere. `max_depth` caps nesting on top of that.
    pub fn resolve(&self, value: &Value, max_depth: usize) -> Value {
        let mut expanded = AHashSet::new();
        self.resolve_at(value, max_depth, &mut expanded)
    }

    fn resolve_at(&self, value: &Value, depth: usize, expanded: &mut AHashSet<Handle>) -> Value {
        match value {
            Value::Object(map) => {
                let target = map
                    .get("ref")
                    .and_then(Value::as_i64)
                    .and_then(|h| self.get(h).map(|target| (h, target)));

                let Some((handle, target)) = target else {
                    return self.resolve_fields(map, depth, expanded);
                };

                let resolved = if !has_pointers(target) {
                    Some(target.clone())
                } else if depth == 0 || !expanded.insert(handle) {
                    None
                } else {
                    Some(self.resolve_at(target, depth - 1, expanded))
                };

                if map.len() == 1 {
                    return resolved.unwrap_or_else(|| value.clone());
                }

                let mut fields = self.resolve_fields(map, depth, expanded);
                if let (Some(resolved), Value::Object(fields)) = (resolved, &mut fields) {
                    fields.entry("value").or_insert(resolved);
                }
                fields
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_at(v, depth, expanded))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_fields(
        &self,
        map: &Map<String, Value>,
        depth: usize,
        expanded: &mut AHashSet<Handle>,
    ) -> Value {
        let resolved: Map<String, Value> = map
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_at(v, depth, expanded)))
            .collect();
        Value::Object(resolved)
    }
}

/// True when `value` contains any `{"ref": n}`-carrying object
fn has_pointers(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.get("ref").is_some_and(Value::is_i64) || map.values().any(has_pointers)
        }
        Value::Array(items) => items.iter().any(has_pointers),
        _ => false,
    }
}
