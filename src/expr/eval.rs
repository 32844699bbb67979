//! Expression interpreter.
//!
//! Evaluation is total: missing properties, bad operands, and calls of
//! non-functions all produce `Undefined` instead of raising. While a watcher
//! is on the evaluation-context stack, every reactive slot the interpreter
//! steps into registers that watcher in the slot's dependency set; outside
//! any watcher the same walk reads without subscribing.

use crate::observe::{ReactiveValue, Seg};
use crate::scope::RuntimeInner;
use crate::value::{loosely_equals, strictly_equals, Value};

use super::ast::{BinaryOp, Expr, Global, TemplatePart, UnaryOp};
use super::globals::{call_builtin, date_now_ms, math_member, MathMember};

/// Intermediate result: either a plain value or a reference into the
/// reactive tree (kept as a path so no borrow is held across sub-evaluation).
enum Operand {
    Val(Value),
    Node(Vec<Seg>),
    Math,
    Date,
    Func(super::ast::BuiltinFn),
}

/// Evaluates a parsed expression to a value.
pub(crate) fn eval_expr(expr: &Expr, rt: &mut RuntimeInner) -> Value {
    let op = resolve(expr, rt);
    deref(rt, op)
}

/// Evaluates a fast-path accessor: a pre-split dotted path resolved against
/// the scope root, with the same lookup semantics as the general evaluator.
pub(crate) fn read_simple_path(rt: &mut RuntimeInner, segments: &[String]) -> Value {
    let Some((first, rest)) = segments.split_first() else {
        return Value::Undefined;
    };
    let mut op = ident_operand(rt, first);
    for seg in rest {
        op = member_access(rt, op, seg);
    }
    deref(rt, op)
}

fn resolve(expr: &Expr, rt: &mut RuntimeInner) -> Operand {
    match expr {
        Expr::Literal(v) => Operand::Val(v.clone()),
        Expr::Ident(name) => ident_operand(rt, name),
        Expr::Global(Global::This) => Operand::Node(Vec::new()),
        Expr::Global(Global::Math) => Operand::Math,
        Expr::Global(Global::Date) => Operand::Date,
        Expr::Global(Global::Func(f)) => Operand::Func(*f),
        Expr::Member { object, property } => {
            let obj = resolve(object, rt);
            member_access(rt, obj, property)
        }
        Expr::Index { object, index } => {
            let obj = resolve(object, rt);
            let idx = eval_expr(index, rt);
            index_access(rt, obj, &idx)
        }
        Expr::Unary { op, operand } => Operand::Val(unary(*op, operand, rt)),
        Expr::Binary { op, lhs, rhs } => Operand::Val(binary(*op, lhs, rhs, rt)),
        Expr::Call { callee, args } | Expr::New { callee, args } => {
            let target = resolve(callee, rt);
            // Arguments always evaluate, even for a doomed call, so their
            // dependency reads still register.
            let argv: Vec<Value> = args.iter().map(|a| eval_expr(a, rt)).collect();
            match target {
                Operand::Func(f) => Operand::Val(call_builtin(f, &argv)),
                // Date as a function or constructor: current time.
                Operand::Date => Operand::Val(Value::Number(date_now_ms())),
                _ => Operand::Val(Value::Undefined),
            }
        }
        Expr::ObjectLit(entries) => {
            let map = entries
                .iter()
                .map(|(k, v)| (k.clone(), eval_expr(v, rt)))
                .collect();
            Operand::Val(Value::Object(map))
        }
        Expr::ArrayLit(items) => {
            Operand::Val(Value::Array(items.iter().map(|i| eval_expr(i, rt)).collect()))
        }
        Expr::Template(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    TemplatePart::Text(text) => out.push_str(text),
                    TemplatePart::Expr(inner) => {
                        out.push_str(&eval_expr(inner, rt).to_string());
                    }
                }
            }
            Operand::Val(Value::String(out))
        }
    }
}

/// Root identifier resolution: a scope read. Missing names are `Undefined`
/// and register nothing.
fn ident_operand(rt: &mut RuntimeInner, name: &str) -> Operand {
    let path = vec![Seg::Key(name.to_string())];
    if rt.touch(&path) {
        Operand::Node(path)
    } else {
        Operand::Val(Value::Undefined)
    }
}

fn member_access(rt: &mut RuntimeInner, obj: Operand, property: &str) -> Operand {
    match obj {
        Operand::Node(path) => {
            let mut child = path.clone();
            child.push(Seg::Key(property.to_string()));
            if rt.touch(&child) {
                return Operand::Node(child);
            }
            // Synthetic, non-reactive reads.
            match rt.value_at(&path) {
                Some(ReactiveValue::Array(slots)) if property == "length" => {
                    Operand::Val(Value::Number(slots.len() as f64))
                }
                Some(ReactiveValue::Leaf(Value::String(s))) if property == "length" => {
                    Operand::Val(Value::Number(s.chars().count() as f64))
                }
                _ => Operand::Val(Value::Undefined),
            }
        }
        Operand::Math => match math_member(property) {
            MathMember::Const(v) => Operand::Val(Value::Number(v)),
            MathMember::Func(f) => Operand::Func(f),
            MathMember::Missing => Operand::Val(Value::Undefined),
        },
        Operand::Date => {
            if property == "now" {
                Operand::Func(super::ast::BuiltinFn::DateNow)
            } else {
                Operand::Val(Value::Undefined)
            }
        }
        Operand::Func(_) => Operand::Val(Value::Undefined),
        Operand::Val(Value::Object(map)) => {
            Operand::Val(map.get(property).cloned().unwrap_or(Value::Undefined))
        }
        Operand::Val(Value::Array(items)) if property == "length" => {
            Operand::Val(Value::Number(items.len() as f64))
        }
        Operand::Val(Value::String(s)) if property == "length" => {
            Operand::Val(Value::Number(s.chars().count() as f64))
        }
        Operand::Val(_) => Operand::Val(Value::Undefined),
    }
}

fn index_access(rt: &mut RuntimeInner, obj: Operand, idx: &Value) -> Operand {
    match obj {
        Operand::Node(path) => {
            let seg = match rt.value_at(&path) {
                Some(ReactiveValue::Object(_)) => Some(Seg::Key(idx.to_string())),
                Some(ReactiveValue::Array(slots)) => {
                    let n = idx.to_number();
                    if n.fract() == 0.0 && n >= 0.0 && n.is_finite() {
                        Some(Seg::Index(n as usize))
                    } else if idx.as_str() == Some("length") {
                        return Operand::Val(Value::Number(slots.len() as f64));
                    } else {
                        None
                    }
                }
                Some(ReactiveValue::Leaf(Value::String(s))) => {
                    return Operand::Val(string_index(s, idx));
                }
                _ => None,
            };
            match seg {
                Some(seg) => {
                    let mut child = path;
                    child.push(seg);
                    if rt.touch(&child) {
                        Operand::Node(child)
                    } else {
                        Operand::Val(Value::Undefined)
                    }
                }
                None => Operand::Val(Value::Undefined),
            }
        }
        Operand::Math | Operand::Date => member_access(rt, obj, &idx.to_string()),
        Operand::Func(_) => Operand::Val(Value::Undefined),
        Operand::Val(Value::Object(map)) => Operand::Val(
            map.get(&idx.to_string()).cloned().unwrap_or(Value::Undefined),
        ),
        Operand::Val(Value::Array(items)) => {
            let n = idx.to_number();
            if n.fract() == 0.0 && n >= 0.0 && n.is_finite() {
                Operand::Val(items.get(n as usize).cloned().unwrap_or(Value::Undefined))
            } else if idx.as_str() == Some("length") {
                Operand::Val(Value::Number(items.len() as f64))
            } else {
                Operand::Val(Value::Undefined)
            }
        }
        Operand::Val(Value::String(s)) => Operand::Val(string_index(&s, idx)),
        Operand::Val(_) => Operand::Val(Value::Undefined),
    }
}

fn string_index(s: &str, idx: &Value) -> Value {
    if idx.as_str() == Some("length") {
        return Value::Number(s.chars().count() as f64);
    }
    let n = idx.to_number();
    if n.fract() == 0.0 && n >= 0.0 && n.is_finite() {
        s.chars()
            .nth(n as usize)
            .map_or(Value::Undefined, |c| Value::String(c.to_string()))
    } else {
        Value::Undefined
    }
}

fn deref(rt: &RuntimeInner, op: Operand) -> Value {
    match op {
        Operand::Val(v) => v,
        Operand::Node(path) => rt
            .value_at(&path)
            .map_or(Value::Undefined, ReactiveValue::snapshot),
        // Namespaces and builtins have no value representation.
        Operand::Math | Operand::Date | Operand::Func(_) => Value::Undefined,
    }
}

fn unary(op: UnaryOp, operand: &Expr, rt: &mut RuntimeInner) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!eval_expr(operand, rt).is_truthy()),
        UnaryOp::Neg => Value::Number(-eval_expr(operand, rt).to_number()),
        UnaryOp::Plus => Value::Number(eval_expr(operand, rt).to_number()),
        UnaryOp::Void => {
            // Evaluates for effect (dependency registration), yields nothing.
            let _ = eval_expr(operand, rt);
            Value::Undefined
        }
        UnaryOp::TypeOf => {
            let resolved = resolve(operand, rt);
            let name = match resolved {
                Operand::Math => "object",
                Operand::Date | Operand::Func(_) => "function",
                other => match deref(rt, other) {
                    Value::Undefined => "undefined",
                    Value::Null | Value::Array(_) | Value::Object(_) => "object",
                    Value::Bool(_) => "boolean",
                    Value::Number(_) => "number",
                    Value::String(_) => "string",
                },
            };
            Value::String(name.to_string())
        }
    }
}

fn binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, rt: &mut RuntimeInner) -> Value {
    // Short-circuit operators yield operand values, not booleans.
    match op {
        BinaryOp::And => {
            let left = eval_expr(lhs, rt);
            if left.is_truthy() {
                return eval_expr(rhs, rt);
            }
            return left;
        }
        BinaryOp::Or => {
            let left = eval_expr(lhs, rt);
            if left.is_truthy() {
                return left;
            }
            return eval_expr(rhs, rt);
        }
        _ => {}
    }

    let a = eval_expr(lhs, rt);
    let b = eval_expr(rhs, rt);
    match op {
        BinaryOp::Add => add(&a, &b),
        BinaryOp::Sub => Value::Number(a.to_number() - b.to_number()),
        BinaryOp::Mul => Value::Number(a.to_number() * b.to_number()),
        BinaryOp::Div => Value::Number(a.to_number() / b.to_number()),
        BinaryOp::Rem => Value::Number(a.to_number() % b.to_number()),
        BinaryOp::LooseEq => Value::Bool(loosely_equals(&a, &b)),
        BinaryOp::LooseNe => Value::Bool(!loosely_equals(&a, &b)),
        BinaryOp::StrictEq => Value::Bool(strictly_equals(&a, &b)),
        BinaryOp::StrictNe => Value::Bool(!strictly_equals(&a, &b)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => relational(op, &a, &b),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// `+` concatenates when either operand is string-like (strings, arrays,
/// and objects coerce to strings); otherwise numeric addition.
fn add(a: &Value, b: &Value) -> Value {
    let stringy = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if stringy(a) || stringy(b) {
        Value::String(format!("{a}{b}"))
    } else {
        Value::Number(a.to_number() + b.to_number())
    }
}

fn relational(op: BinaryOp, a: &Value, b: &Value) -> Value {
    let ord = match (a, b) {
        (Value::String(x), Value::String(y)) => x.partial_cmp(y),
        _ => a.to_number().partial_cmp(&b.to_number()),
    };
    let Some(ord) = ord else {
        // NaN on either side: every relational comparison is false.
        return Value::Bool(false);
    };
    let result = match op {
        BinaryOp::Lt => ord.is_lt(),
        BinaryOp::LtEq => ord.is_le(),
        BinaryOp::Gt => ord.is_gt(),
        BinaryOp::GtEq => ord.is_ge(),
        _ => false,
    };
    Value::Bool(result)
}
