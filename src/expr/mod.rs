//! Expression compiler.
//!
//! Binding expressions are compiled once into an [`Accessor`] and evaluated
//! many times against a scope. Compilation takes one of two routes:
//!
//! - a plain dotted path (`user.address.city`) becomes a pre-split segment
//!   list resolved by direct traversal, skipping the parser entirely;
//! - anything else is tokenized and parsed into an AST that the interpreter
//!   walks on every evaluation.
//!
//! [`compile`] is total and maps unparseable input to an accessor that always
//! yields `Undefined`; [`try_compile`] surfaces the [`ParseError`] instead.

use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ParseError, ParseResult};
use crate::scope::RuntimeInner;
use crate::value::Value;

mod ast;
mod eval;
mod globals;
mod parser;
mod token;

use ast::Expr;

/// A compiled binding expression, ready for repeated evaluation.
///
/// Cloning is cheap; the parsed form is shared.
#[derive(Debug, Clone)]
pub struct Accessor {
    kind: Rc<AccessorKind>,
}

#[derive(Debug)]
enum AccessorKind {
    /// Unparseable source; always evaluates to `Undefined`.
    Noop,
    /// Dotted-identifier fast path, segments pre-split.
    Path(Vec<String>),
    /// Full parsed expression.
    Parsed(Expr),
}

impl Accessor {
    fn new(kind: AccessorKind) -> Self {
        Accessor { kind: Rc::new(kind) }
    }

    /// True when compilation failed and evaluation is a constant `Undefined`.
    pub fn is_noop(&self) -> bool {
        matches!(*self.kind, AccessorKind::Noop)
    }

    pub(crate) fn eval_inner(&self, rt: &mut RuntimeInner) -> Value {
        match &*self.kind {
            AccessorKind::Noop => Value::Undefined,
            AccessorKind::Path(segments) => eval::read_simple_path(rt, segments),
            AccessorKind::Parsed(expr) => eval::eval_expr(expr, rt),
        }
    }
}

/// Compiles a binding expression. Never fails: source that does not parse
/// yields a noop accessor evaluating to `Undefined`.
pub fn compile(src: &str) -> Accessor {
    match try_compile(src) {
        Ok(accessor) => accessor,
        Err(_) => Accessor::new(AccessorKind::Noop),
    }
}

/// Compiles a binding expression, reporting parse failures.
pub fn try_compile(src: &str) -> ParseResult<Accessor> {
    if src.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    if let Some(segments) = as_simple_path(src) {
        return Ok(Accessor::new(AccessorKind::Path(segments)));
    }
    let expr = parser::parse(src)?;
    Ok(Accessor::new(AccessorKind::Parsed(expr)))
}

fn simple_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_$][0-9A-Za-z_$]*(?:\.[A-Za-z_$][0-9A-Za-z_$]*)*$")
            .unwrap_or_else(|e| unreachable!("simple path pattern is valid: {e}"))
    })
}

/// Recognizes the dotted-path fast path. Paths whose head is a whitelisted
/// global (`this`, `Math`, literal keywords, builtin functions) must go
/// through the parser so the whitelist applies.
fn as_simple_path(src: &str) -> Option<Vec<String>> {
    let trimmed = src.trim();
    if !simple_path_regex().is_match(trimmed) {
        return None;
    }
    let segments: Vec<String> = trimmed.split('.').map(str::to_string).collect();
    if ast::lookup_global(&segments[0]).is_some() {
        return None;
    }
    // `typeof`, `void` and `new` are keywords to the tokenizer, never names.
    if matches!(segments[0].as_str(), "typeof" | "void" | "new") {
        return None;
    }
    Some(segments)
}
