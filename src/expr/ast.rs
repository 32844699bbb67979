//! Expression AST.
//!
//! A small tagged-variant tree: literals, scope identifiers, member and
//! index access, unary and binary operators, call expressions, object and
//! array literals, and template strings. Whitelisted globals are resolved at
//! parse time into `Expr::Global`, so evaluation never confuses them with
//! scope lookups.

use crate::value::Value;

/// A parsed expression node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// A literal value (numbers, strings, keywords like `true` or `NaN`).
    Literal(Value),
    /// A bare identifier resolved against the scope root.
    Ident(String),
    /// A whitelisted global, never resolved through the scope.
    Global(Global),
    /// Dot access: `object.property`.
    Member {
        object: Box<Expr>,
        property: String,
    },
    /// Bracket access with a computed index: `object[index]`.
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    /// Prefix operator.
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Infix operator. `&&` and `||` short-circuit during evaluation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Call expression: `callee(args...)`.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Constructor call: `new callee(args...)`.
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Object literal. Keys are plain data, never scope reads.
    ObjectLit(Vec<(String, Expr)>),
    /// Array literal.
    ArrayLit(Vec<Expr>),
    /// Backtick template with `${}` interpolations.
    Template(Vec<TemplatePart>),
}

/// One segment of a template string.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplatePart {
    /// Literal text between interpolations.
    Text(String),
    /// An interpolated expression.
    Expr(Box<Expr>),
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Plus,
    Not,
    TypeOf,
    Void,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// Whitelisted globals available to every expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Global {
    /// `this`: the scope root itself.
    This,
    /// The `Math` namespace.
    Math,
    /// The `Date` namespace (also callable).
    Date,
    /// A directly callable builtin function.
    Func(BuiltinFn),
}

/// Builtin functions reachable from the whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuiltinFn {
    IsNan,
    IsFinite,
    ParseInt,
    ParseFloat,
    EncodeUri,
    EncodeUriComponent,
    DecodeUri,
    DecodeUriComponent,
    // Math.*
    MathAbs,
    MathCeil,
    MathFloor,
    MathRound,
    MathTrunc,
    MathSqrt,
    MathSign,
    MathPow,
    MathMin,
    MathMax,
    // Date.*
    DateNow,
}

/// Maps a root identifier to its whitelisted meaning, if any.
///
/// Only root identifiers go through this table; member properties and object
/// keys are never whitelist-checked, so `a.Math` stays a plain property
/// read.
pub(crate) fn lookup_global(name: &str) -> Option<Expr> {
    let expr = match name {
        "true" => Expr::Literal(Value::Bool(true)),
        "false" => Expr::Literal(Value::Bool(false)),
        "null" => Expr::Literal(Value::Null),
        "undefined" => Expr::Literal(Value::Undefined),
        "Infinity" => Expr::Literal(Value::Number(f64::INFINITY)),
        "NaN" => Expr::Literal(Value::Number(f64::NAN)),
        "this" => Expr::Global(Global::This),
        "Math" => Expr::Global(Global::Math),
        "Date" => Expr::Global(Global::Date),
        "isNaN" => Expr::Global(Global::Func(BuiltinFn::IsNan)),
        "isFinite" => Expr::Global(Global::Func(BuiltinFn::IsFinite)),
        "parseInt" => Expr::Global(Global::Func(BuiltinFn::ParseInt)),
        "parseFloat" => Expr::Global(Global::Func(BuiltinFn::ParseFloat)),
        "encodeURI" => Expr::Global(Global::Func(BuiltinFn::EncodeUri)),
        "encodeURIComponent" => Expr::Global(Global::Func(BuiltinFn::EncodeUriComponent)),
        "decodeURI" => Expr::Global(Global::Func(BuiltinFn::DecodeUri)),
        "decodeURIComponent" => Expr::Global(Global::Func(BuiltinFn::DecodeUriComponent)),
        _ => return None,
    };
    Some(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelist_hits() {
        assert!(matches!(
            lookup_global("Math"),
            Some(Expr::Global(Global::Math))
        ));
        assert!(matches!(
            lookup_global("parseInt"),
            Some(Expr::Global(Global::Func(BuiltinFn::ParseInt)))
        ));
        assert!(matches!(lookup_global("null"), Some(Expr::Literal(Value::Null))));
        match lookup_global("NaN") {
            Some(Expr::Literal(Value::Number(n))) => assert!(n.is_nan()),
            other => panic!("expected NaN literal, got {other:?}"),
        }
    }

    #[test]
    fn test_ordinary_identifiers_miss() {
        assert!(lookup_global("a").is_none());
        assert!(lookup_global("math").is_none());
        assert!(lookup_global("scope").is_none());
    }
}
