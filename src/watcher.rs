//! Watcher records: one compiled expression, its change callback, and the
//! value it last produced.

use std::fmt;

use crate::dep::WatcherId;
use crate::expr::Accessor;
use crate::value::Value;

/// Change callback: `(new_value, old_value)`.
pub(crate) type Callback = Box<dyn FnMut(&Value, &Value)>;

/// One live subscription in the runtime's watcher arena.
pub(crate) struct Watcher {
    pub(crate) id: WatcherId,
    pub(crate) expression: String,
    pub(crate) accessor: Accessor,
    /// Taken out of the arena while the callback runs so no runtime borrow
    /// is held across user code; `None` also while running, which makes a
    /// watcher non-reentrant for its own notifications.
    pub(crate) callback: Option<Callback>,
    pub(crate) last_value: Value,
}

impl Watcher {
    pub(crate) fn new(
        id: WatcherId,
        expression: &str,
        accessor: Accessor,
        callback: Callback,
        initial: Value,
    ) -> Self {
        Watcher {
            id,
            expression: expression.to_string(),
            accessor,
            callback: Some(callback),
            last_value: initial,
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id)
            .field("expression", &self.expression)
            .field("last_value", &self.last_value)
            .field("callback", &self.callback.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
