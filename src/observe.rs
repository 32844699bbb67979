//! The reactive object graph.
//!
//! `instrument` converts a plain value into a tree of slots, each pairing a
//! current value with its dependency set. Instrumentation is recursive and
//! happens once: keys that appear in an object after it was instrumented are
//! not reactive (a documented limitation of the model, kept deliberately).
//! Values assigned through the write path are themselves instrumented, so a
//! freshly assigned nested object is reactive from that point on.

use std::collections::BTreeMap;

use crate::dep::{Dep, WatcherId};
use crate::value::{loosely_equals, Value};

/// One step of a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seg {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

/// A reactive property: current value plus its dependency set.
///
/// A slot owns exactly one `Dep` for its entire lifetime; overwriting the
/// value never replaces the dependency set.
#[derive(Debug)]
pub struct Slot {
    pub(crate) value: ReactiveValue,
    pub(crate) dep: Dep,
}

impl Slot {
    fn new(value: ReactiveValue) -> Self {
        Self {
            value,
            dep: Dep::new(),
        }
    }

    /// The slot's current value.
    #[must_use]
    pub fn value(&self) -> &ReactiveValue {
        &self.value
    }

    /// The slot's dependency set.
    #[must_use]
    pub fn dep(&self) -> &Dep {
        &self.dep
    }
}

/// An instrumented value: containers hold slots, scalars stay leaves.
///
/// Array indices are instrumented like object keys, matching the source
/// model's enumeration over every own property.
#[derive(Debug)]
pub enum ReactiveValue {
    /// A scalar (or anything non-container) with no nested slots.
    Leaf(Value),
    /// An instrumented object: one slot per key.
    Object(BTreeMap<String, Slot>),
    /// An instrumented array: one slot per index.
    Array(Vec<Slot>),
}

/// Outcome of a reactive write.
#[derive(Debug)]
pub(crate) enum WriteOutcome {
    /// The value changed; these subscribers must be notified.
    Changed(Vec<WatcherId>),
    /// Incoming value was loosely equal to the current one: silent no-op.
    Unchanged,
    /// No slot exists at the path: silent no-op (never an error).
    Missing,
}

impl ReactiveValue {
    /// Recursively instruments a plain value.
    #[must_use]
    pub fn instrument(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Slot::new(Self::instrument(v))))
                    .collect(),
            ),
            Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(|v| Slot::new(Self::instrument(v)))
                    .collect(),
            ),
            other => Self::Leaf(other),
        }
    }

    /// Converts the instrumented tree back into a plain value.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        match self {
            Self::Leaf(v) => v.clone(),
            Self::Object(slots) => Value::Object(
                slots
                    .iter()
                    .map(|(k, s)| (k.clone(), s.value.snapshot()))
                    .collect(),
            ),
            Self::Array(slots) => {
                Value::Array(slots.iter().map(|s| s.value.snapshot()).collect())
            }
        }
    }

    /// Child slot lookup for one path step.
    #[must_use]
    pub fn child(&self, seg: &Seg) -> Option<&Slot> {
        match (self, seg) {
            (Self::Object(slots), Seg::Key(k)) => slots.get(k),
            (Self::Array(slots), Seg::Index(i)) => slots.get(*i),
            _ => None,
        }
    }

    pub(crate) fn child_mut(&mut self, seg: &Seg) -> Option<&mut Slot> {
        match (self, seg) {
            (Self::Object(slots), Seg::Key(k)) => slots.get_mut(k),
            (Self::Array(slots), Seg::Index(i)) => slots.get_mut(*i),
            _ => None,
        }
    }

    /// Descends a whole path to the slot it names.
    pub(crate) fn slot_at_mut(&mut self, path: &[Seg]) -> Option<&mut Slot> {
        let (first, rest) = path.split_first()?;
        let slot = self.child_mut(first)?;
        if rest.is_empty() {
            Some(slot)
        } else {
            slot.value.slot_at_mut(rest)
        }
    }

    /// True when the current value of this node is loosely equal to the
    /// incoming plain value. Only leaf scalars can compare equal; a write of
    /// an array or object always counts as a change (identity semantics).
    fn loosely_equals_plain(&self, incoming: &Value) -> bool {
        match self {
            Self::Leaf(current) => loosely_equals(current, incoming),
            Self::Object(_) | Self::Array(_) => false,
        }
    }

    /// Removes a watcher handle from every dependency set in the tree.
    pub(crate) fn remove_subscriber(&mut self, id: WatcherId) {
        match self {
            Self::Leaf(_) => {}
            Self::Object(slots) => {
                for slot in slots.values_mut() {
                    slot.dep.remove(id);
                    slot.value.remove_subscriber(id);
                }
            }
            Self::Array(slots) => {
                for slot in slots.iter_mut() {
                    slot.dep.remove(id);
                    slot.value.remove_subscriber(id);
                }
            }
        }
    }
}

/// Reactive write: navigate to the slot, suppress loosely equal values,
/// otherwise instrument and store the incoming value and collect the slot's
/// subscribers for notification.
///
/// Navigation itself registers nothing; dependency registration only happens
/// through evaluation reads.
pub(crate) fn write(root: &mut ReactiveValue, path: &[Seg], incoming: Value) -> WriteOutcome {
    let Some(slot) = root.slot_at_mut(path) else {
        return WriteOutcome::Missing;
    };
    if slot.value.loosely_equals_plain(&incoming) {
        return WriteOutcome::Unchanged;
    }
    slot.value = ReactiveValue::instrument(incoming);
    WriteOutcome::Changed(slot.dep.subscribers())
}

/// Parses an external write/read path: dot segments plus `[0]`, `['k']`,
/// and `["k"]` indices. Returns `None` for anything malformed.
#[must_use]
pub fn parse_path(path: &str) -> Option<Vec<Seg>> {
    let mut segs = Vec::new();
    let bytes = path.as_bytes();
    let mut i = 0;
    let mut expect_segment = true;
    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                if expect_segment {
                    return None;
                }
                expect_segment = true;
                i += 1;
            }
            b'[' => {
                if expect_segment && !segs.is_empty() {
                    return None;
                }
                let close = path[i..].find(']')? + i;
                let inner = &path[i + 1..close];
                if inner.is_empty() {
                    return None;
                }
                let seg = if (inner.starts_with('\'') && inner.ends_with('\'') && inner.len() >= 2)
                    || (inner.starts_with('"') && inner.ends_with('"') && inner.len() >= 2)
                {
                    Seg::Key(inner[1..inner.len() - 1].to_string())
                } else {
                    Seg::Index(inner.parse::<usize>().ok()?)
                };
                segs.push(seg);
                expect_segment = false;
                i = close + 1;
            }
            _ => {
                if !expect_segment {
                    return None;
                }
                let start = i;
                while i < bytes.len() && bytes[i] != b'.' && bytes[i] != b'[' {
                    i += 1;
                }
                let ident = &path[start..i];
                if ident.is_empty() {
                    return None;
                }
                segs.push(Seg::Key(ident.to_string()));
                expect_segment = false;
            }
        }
    }
    if expect_segment || segs.is_empty() {
        return None;
    }
    Some(segs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_tree() -> ReactiveValue {
        let value = Value::from(serde_json::json!({
            "a": 1,
            "b": {"c": 2},
            "items": [10, {"x": 20}]
        }));
        ReactiveValue::instrument(value)
    }

    #[test]
    fn test_instrument_and_snapshot_round_trip() {
        let tree = scope_tree();
        let snap: serde_json::Value = tree.snapshot().into();
        assert_eq!(
            snap,
            serde_json::json!({"a": 1, "b": {"c": 2}, "items": [10, {"x": 20}]})
        );
    }

    #[test]
    fn test_array_indices_are_slots() {
        let tree = scope_tree();
        let items = tree.child(&Seg::Key("items".into())).unwrap();
        assert!(items.value().child(&Seg::Index(1)).is_some());
        assert!(items.value().child(&Seg::Index(2)).is_none());
    }

    #[test]
    fn test_write_changes_value() {
        let mut tree = scope_tree();
        let path = vec![Seg::Key("b".into()), Seg::Key("c".into())];
        match write(&mut tree, &path, Value::Number(3.0)) {
            WriteOutcome::Changed(subs) => assert!(subs.is_empty()),
            other => panic!("expected change, got {other:?}"),
        }
        let snap: serde_json::Value = tree.snapshot().into();
        assert_eq!(snap["b"]["c"], serde_json::json!(3));
    }

    #[test]
    fn test_equal_write_is_suppressed() {
        let mut tree = scope_tree();
        let path = vec![Seg::Key("a".into())];
        assert!(matches!(
            write(&mut tree, &path, Value::Number(1.0)),
            WriteOutcome::Unchanged
        ));
        // Loose equality: "1" == 1 suppresses too.
        assert!(matches!(
            write(&mut tree, &path, Value::from("1")),
            WriteOutcome::Unchanged
        ));
    }

    #[test]
    fn test_composite_write_always_changes() {
        let mut tree = scope_tree();
        let path = vec![Seg::Key("b".into())];
        let incoming = Value::from(serde_json::json!({"c": 2}));
        assert!(matches!(
            write(&mut tree, &path, incoming),
            WriteOutcome::Changed(_)
        ));
    }

    #[test]
    fn test_assigned_object_is_instrumented() {
        let mut tree = scope_tree();
        let path = vec![Seg::Key("b".into())];
        write(&mut tree, &path, Value::from(serde_json::json!({"d": 9})));
        let inner = vec![Seg::Key("b".into()), Seg::Key("d".into())];
        assert!(tree.slot_at_mut(&inner).is_some());
    }

    #[test]
    fn test_missing_path_is_silent() {
        let mut tree = scope_tree();
        let path = vec![Seg::Key("nope".into()), Seg::Key("x".into())];
        assert!(matches!(
            write(&mut tree, &path, Value::Number(1.0)),
            WriteOutcome::Missing
        ));
    }

    #[test]
    fn test_write_keeps_dep() {
        let mut tree = scope_tree();
        let path = vec![Seg::Key("a".into())];
        tree.slot_at_mut(&path).unwrap().dep.add(WatcherId(1));
        match write(&mut tree, &path, Value::Number(2.0)) {
            WriteOutcome::Changed(subs) => assert_eq!(subs, vec![WatcherId(1)]),
            other => panic!("expected change, got {other:?}"),
        }
        // The dep survives the overwrite.
        assert!(tree.slot_at_mut(&path).unwrap().dep.contains(WatcherId(1)));
    }

    #[test]
    fn test_remove_subscriber_recurses() {
        let mut tree = scope_tree();
        let shallow = vec![Seg::Key("a".into())];
        let deep = vec![Seg::Key("b".into()), Seg::Key("c".into())];
        tree.slot_at_mut(&shallow).unwrap().dep.add(WatcherId(4));
        tree.slot_at_mut(&deep).unwrap().dep.add(WatcherId(4));
        tree.remove_subscriber(WatcherId(4));
        assert!(tree.slot_at_mut(&shallow).unwrap().dep.is_empty());
        assert!(tree.slot_at_mut(&deep).unwrap().dep.is_empty());
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("a.b"),
            Some(vec![Seg::Key("a".into()), Seg::Key("b".into())])
        );
        assert_eq!(
            parse_path("items[0]"),
            Some(vec![Seg::Key("items".into()), Seg::Index(0)])
        );
        assert_eq!(
            parse_path("m['k'].v"),
            Some(vec![
                Seg::Key("m".into()),
                Seg::Key("k".into()),
                Seg::Key("v".into())
            ])
        );
        assert_eq!(parse_path(""), None);
        assert_eq!(parse_path("a."), None);
        assert_eq!(parse_path(".a"), None);
        assert_eq!(parse_path("a[b]"), None);
    }
}
