//! # Filament - Fine-Grained Reactive State
//!
//! Filament instruments a plain JSON document into a reactive scope: every
//! property gets its own dependency set, binding expressions compile into
//! reusable accessors, and watchers re-fire automatically when a write
//! changes the value an expression produces.
//!
//! ## Core Concepts
//!
//! - **Scope**: a shared handle over one instrumented data tree
//! - **Accessor**: a compiled binding expression, a dotted fast path or a
//!   parsed AST
//! - **Watcher**: a subscription pairing an accessor with a change callback
//! - **Dep**: the per-slot set of watcher handles to notify on change
//!
//! ## Usage
//!
//! ```rust
//! use filament::{Scope, Value};
//! use serde_json::json;
//!
//! let scope = Scope::observe(json!({"a": 7, "b": 3})).unwrap();
//! assert_eq!(scope.eval("a + b"), Value::Number(10.0));
//!
//! let id = scope.watch("a + b", |new, old| {
//!     println!("{old} -> {new}");
//! });
//! scope.set("a", 8.0);
//! scope.unwatch(id);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod dep;
pub mod error;
pub mod expr;
pub mod observe;
pub mod scope;
pub mod value;

mod watcher;

// Re-export primary types at crate root for convenience
pub use dep::{Dep, WatcherId};
pub use error::{ParseError, ParseResult};
pub use expr::{compile, try_compile, Accessor};
pub use observe::{parse_path, ReactiveValue, Seg, Slot};
pub use scope::Scope;
pub use value::{loosely_equals, strictly_equals, Value};
