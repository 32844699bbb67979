//! The reactive scope: a shared handle over an instrumented data tree plus
//! the watcher arena and evaluation-context stack.
//!
//! All mutation flows through [`Scope::set`], which suppresses no-op writes,
//! collects the written slot's subscribers, and re-evaluates each affected
//! watcher. Callbacks run with no runtime borrow held, so they may freely
//! call back into the same scope (nested `set`, `watch`, `unwatch`).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::dep::WatcherId;
use crate::expr::{compile, Accessor};
use crate::observe::{parse_path, write, ReactiveValue, Seg, WriteOutcome};
use crate::value::{strictly_equals, Value};
use crate::watcher::{Callback, Watcher};

/// Shared handle to one reactive runtime. Cloning produces another handle to
/// the same scope; the runtime is single-threaded.
#[derive(Debug, Clone)]
pub struct Scope {
    inner: Rc<RefCell<RuntimeInner>>,
}

/// Runtime state behind the handle.
pub(crate) struct RuntimeInner {
    pub(crate) root: ReactiveValue,
    watchers: BTreeMap<WatcherId, Watcher>,
    /// Evaluation-context stack: while non-empty, slot reads register the
    /// top watcher in the slot's dependency set.
    context: Vec<WatcherId>,
    next_id: u64,
}

impl std::fmt::Debug for RuntimeInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeInner")
            .field("watchers", &self.watchers.len())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl RuntimeInner {
    fn new(root: ReactiveValue) -> Self {
        RuntimeInner {
            root,
            watchers: BTreeMap::new(),
            context: Vec::new(),
            next_id: 0,
        }
    }

    fn allocate_id(&mut self) -> WatcherId {
        let id = WatcherId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Resolves `path` to a slot; when a watcher is on the context stack,
    /// subscribes it to that slot. Returns whether the slot exists.
    pub(crate) fn touch(&mut self, path: &[Seg]) -> bool {
        let active = self.context.last().copied();
        match self.root.slot_at_mut(path) {
            Some(slot) => {
                if let Some(id) = active {
                    slot.dep.add(id);
                }
                true
            }
            None => false,
        }
    }

    /// Read-only walk to the reactive value at `path`; the empty path is the
    /// root itself.
    pub(crate) fn value_at(&self, path: &[Seg]) -> Option<&ReactiveValue> {
        let mut current = &self.root;
        for seg in path {
            current = &current.child(seg)?.value;
        }
        Some(current)
    }

    fn evaluate(&mut self, accessor: &Accessor, as_watcher: Option<WatcherId>) -> Value {
        if let Some(id) = as_watcher {
            self.context.push(id);
        }
        let value = accessor.eval_inner(self);
        if as_watcher.is_some() {
            self.context.pop();
        }
        value
    }
}

impl Scope {
    /// Instruments a JSON document as a reactive scope. Only objects can be
    /// scope roots; anything else yields `None`.
    pub fn observe(json: serde_json::Value) -> Option<Scope> {
        Scope::observe_value(json.into())
    }

    /// [`Scope::observe`] for an already-converted [`Value`].
    pub fn observe_value(value: Value) -> Option<Scope> {
        if !matches!(value, Value::Object(_)) {
            return None;
        }
        let root = ReactiveValue::instrument(value);
        Some(Scope {
            inner: Rc::new(RefCell::new(RuntimeInner::new(root))),
        })
    }

    /// A plain-data copy of the whole scope.
    pub fn snapshot(&self) -> Value {
        self.inner.borrow().root.snapshot()
    }

    /// Reads the value at a dotted/bracketed path, without subscribing
    /// anything. Missing or unparseable paths read as `Undefined`.
    pub fn get(&self, path: &str) -> Value {
        let Some(segments) = parse_path(path) else {
            return Value::Undefined;
        };
        self.inner
            .borrow()
            .value_at(&segments)
            .map_or(Value::Undefined, ReactiveValue::snapshot)
    }

    /// Writes the value at a path and notifies the slot's subscribers.
    ///
    /// Returns `false` when the path does not resolve to an instrumented
    /// slot; such writes store nothing. A write that leaves a scalar slot
    /// loosely equal to its current value is accepted but suppressed (no
    /// notification). Replacing an object or array always notifies, and the
    /// incoming subtree is instrumented in place.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> bool {
        let Some(segments) = parse_path(path) else {
            return false;
        };
        let outcome = {
            let mut rt = self.inner.borrow_mut();
            write(&mut rt.root, &segments, value.into())
        };
        match outcome {
            WriteOutcome::Changed(subscribers) => {
                for id in subscribers {
                    update_watcher(&self.inner, id);
                }
                true
            }
            WriteOutcome::Unchanged => true,
            WriteOutcome::Missing => false,
        }
    }

    /// Evaluates a binding expression against the scope once, without
    /// subscribing. Unparseable expressions evaluate to `Undefined`.
    pub fn eval(&self, expression: &str) -> Value {
        self.eval_compiled(&compile(expression))
    }

    /// Evaluates a pre-compiled accessor against the scope.
    pub fn eval_compiled(&self, accessor: &Accessor) -> Value {
        self.inner.borrow_mut().evaluate(accessor, None)
    }

    /// Registers a watcher on a binding expression.
    ///
    /// The expression is evaluated immediately to seed the watcher's
    /// dependencies and baseline value; the callback is NOT invoked for this
    /// initial evaluation. It fires afterwards as `(new_value, old_value)`
    /// whenever a write changes the expression's value.
    pub fn watch(
        &self,
        expression: &str,
        callback: impl FnMut(&Value, &Value) + 'static,
    ) -> WatcherId {
        let accessor = compile(expression);
        let mut rt = self.inner.borrow_mut();
        let id = rt.allocate_id();
        let initial = rt.evaluate(&accessor, Some(id));
        let watcher = Watcher::new(id, expression, accessor, Box::new(callback) as Callback, initial);
        rt.watchers.insert(id, watcher);
        id
    }

    /// Tears a watcher down: removes it from the arena and unsubscribes it
    /// from every dependency set in the tree. Returns whether it was live.
    pub fn unwatch(&self, id: WatcherId) -> bool {
        let mut rt = self.inner.borrow_mut();
        let rt = &mut *rt;
        if rt.watchers.remove(&id).is_none() {
            return false;
        }
        rt.root.remove_subscriber(id);
        true
    }

    /// Number of live watchers.
    pub fn watcher_count(&self) -> usize {
        self.inner.borrow().watchers.len()
    }

    /// The source expression of a live watcher.
    pub fn expression(&self, id: WatcherId) -> Option<String> {
        self.inner
            .borrow()
            .watchers
            .get(&id)
            .map(|w| w.expression.clone())
    }

    /// The value a live watcher last observed.
    pub fn watcher_value(&self, id: WatcherId) -> Option<Value> {
        self.inner
            .borrow()
            .watchers
            .get(&id)
            .map(|w| w.last_value.clone())
    }
}

/// Re-evaluates one watcher after a dependency write and fires its callback
/// on change.
///
/// Borrow discipline: the runtime is borrowed in short spans (clone the
/// accessor; evaluate; diff and take the callback out of the arena) and
/// released before the callback runs, so callbacks can nest scope calls. A
/// watcher removed mid-notification by an earlier callback is skipped.
fn update_watcher(inner: &Rc<RefCell<RuntimeInner>>, id: WatcherId) {
    let accessor = {
        let rt = inner.borrow();
        match rt.watchers.get(&id) {
            Some(w) => w.accessor.clone(),
            None => return,
        }
    };
    let new_value = inner.borrow_mut().evaluate(&accessor, Some(id));
    let taken = {
        let mut rt = inner.borrow_mut();
        let Some(w) = rt.watchers.get_mut(&id) else {
            return;
        };
        // Strict comparison, and composites never compare equal, so any
        // write that re-produces an object or array still fires.
        if strictly_equals(&new_value, &w.last_value) {
            None
        } else {
            let old = std::mem::replace(&mut w.last_value, new_value.clone());
            w.callback.take().map(|cb| (cb, old))
        }
    };
    if let Some((mut cb, old)) = taken {
        cb(&new_value, &old);
        let mut rt = inner.borrow_mut();
        if let Some(w) = rt.watchers.get_mut(&id) {
            if w.callback.is_none() {
                w.callback = Some(cb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn scope(json: serde_json::Value) -> Scope {
        Scope::observe(json).unwrap()
    }

    #[test]
    fn test_observe_rejects_non_objects() {
        assert!(Scope::observe(json!([1, 2, 3])).is_none());
        assert!(Scope::observe(json!(42)).is_none());
        assert!(Scope::observe(json!(null)).is_none());
        assert!(Scope::observe(json!({})).is_some());
    }

    #[test]
    fn test_get_set_roundtrip() {
        let s = scope(json!({"a": {"b": 1}}));
        assert_eq!(s.get("a.b"), Value::Number(1.0));
        assert!(s.set("a.b", 5.0));
        assert_eq!(s.get("a.b"), Value::Number(5.0));
        assert_eq!(s.get("a.missing"), Value::Undefined);
        assert!(!s.set("a.missing", 1.0));
        assert_eq!(s.get("a.missing"), Value::Undefined);
    }

    #[test]
    fn test_eval_expressions() {
        let s = scope(json!({"a": 7, "b": 3, "name": "ada"}));
        assert_eq!(s.eval("a + b"), Value::Number(10.0));
        assert_eq!(s.eval("a > b && name"), Value::String("ada".to_string()));
        assert_eq!(s.eval("Math.max(a, b, 2)"), Value::Number(7.0));
        assert_eq!(s.eval("'foo.bar' + a"), Value::String("foo.bar7".to_string()));
        assert_eq!(s.eval("nope"), Value::Undefined);
        assert_eq!(s.eval("a +"), Value::Undefined);
    }

    #[test]
    fn test_watch_fires_once_per_change() {
        let s = scope(json!({"a": 7, "b": 3}));
        let calls = Rc::new(Cell::new(0u32));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (c, v) = (calls.clone(), seen.clone());
        s.watch("a + b", move |new, old| {
            c.set(c.get() + 1);
            v.borrow_mut().push((new.clone(), old.clone()));
        });
        // Construction alone never fires.
        assert_eq!(calls.get(), 0);
        assert!(s.set("a", 8.0));
        assert_eq!(calls.get(), 1);
        assert_eq!(
            seen.borrow()[0],
            (Value::Number(11.0), Value::Number(10.0))
        );
        // Loosely-equal rewrite is suppressed.
        assert!(s.set("a", 8.0));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_watch_suppressed_when_result_unchanged() {
        // Dependency changes but the expression's value does not.
        let s = scope(json!({"a": 2, "b": 4}));
        let calls = Rc::new(Cell::new(0u32));
        let c = calls.clone();
        s.watch("a < b", move |_, _| c.set(c.get() + 1));
        assert!(s.set("a", 3.0));
        assert_eq!(calls.get(), 0);
        assert!(s.set("a", 9.0));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unwatch_tears_down() {
        let s = scope(json!({"a": 1}));
        let calls = Rc::new(Cell::new(0u32));
        let c = calls.clone();
        let id = s.watch("a", move |_, _| c.set(c.get() + 1));
        assert_eq!(s.watcher_count(), 1);
        assert_eq!(s.expression(id).as_deref(), Some("a"));
        assert!(s.unwatch(id));
        assert!(!s.unwatch(id));
        assert_eq!(s.watcher_count(), 0);
        assert!(s.set("a", 2.0));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_reassigned_object_stays_reactive() {
        let s = scope(json!({"user": {"name": "ada"}}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let v = seen.clone();
        s.watch("user.name", move |new, _| v.borrow_mut().push(new.clone()));
        assert!(s.set("user", Value::from(json!({"name": "grace"}))));
        assert_eq!(seen.borrow().last(), Some(&Value::String("grace".to_string())));
        // The fresh subtree is itself instrumented.
        assert!(s.set("user.name", "linus"));
        assert_eq!(seen.borrow().last(), Some(&Value::String("linus".to_string())));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_nested_set_from_callback() {
        let s = scope(json!({"a": 1, "echo": 0}));
        let s2 = s.clone();
        s.watch("a", move |new, _| {
            let n = new.to_number() * 10.0;
            s2.set("echo", n);
        });
        assert!(s.set("a", 4.0));
        assert_eq!(s.get("echo"), Value::Number(40.0));
    }

    #[test]
    fn test_callback_can_unwatch_itself() {
        let s = scope(json!({"a": 0}));
        let calls = Rc::new(Cell::new(0u32));
        let c = calls.clone();
        let s2 = s.clone();
        let id = Rc::new(Cell::new(WatcherId(0)));
        let id2 = id.clone();
        let handle = s.watch("a", move |_, _| {
            c.set(c.get() + 1);
            s2.unwatch(id2.get());
        });
        id.set(handle);
        s.set("a", 1.0);
        s.set("a", 2.0);
        assert_eq!(calls.get(), 1);
        assert_eq!(s.watcher_count(), 0);
    }

    #[test]
    fn test_two_watchers_notified_in_registration_order() {
        let s = scope(json!({"a": 1}));
        let order = Rc::new(RefCell::new(Vec::new()));
        let (o1, o2) = (order.clone(), order.clone());
        s.watch("a", move |_, _| o1.borrow_mut().push("first"));
        s.watch("a + 1", move |_, _| o2.borrow_mut().push("second"));
        s.set("a", 2.0);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_array_index_reactivity() {
        let s = scope(json!({"items": [10, 20, 30]}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let v = seen.clone();
        s.watch("items[1]", move |new, _| v.borrow_mut().push(new.clone()));
        assert_eq!(s.eval("items.length"), Value::Number(3.0));
        assert!(s.set("items[1]", 25.0));
        assert_eq!(*seen.borrow(), vec![Value::Number(25.0)]);
        // Out-of-range index is not an instrumented slot.
        assert!(!s.set("items[9]", 1.0));
    }
}
