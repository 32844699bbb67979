//! Builtin globals available to every expression.
//!
//! These back the whitelist: `Math` constants and functions, `Date.now`,
//! numeric parsing, and URI escaping. All of them are total; anything
//! malformed yields `Undefined` rather than an error.

use chrono::Utc;

use crate::value::Value;

use super::ast::BuiltinFn;

/// Resolution of a property on the `Math` namespace.
pub(crate) enum MathMember {
    Const(f64),
    Func(BuiltinFn),
    Missing,
}

pub(crate) fn math_member(name: &str) -> MathMember {
    let constant = match name {
        "PI" => std::f64::consts::PI,
        "E" => std::f64::consts::E,
        "LN2" => std::f64::consts::LN_2,
        "LN10" => std::f64::consts::LN_10,
        "LOG2E" => std::f64::consts::LOG2_E,
        "LOG10E" => std::f64::consts::LOG10_E,
        "SQRT2" => std::f64::consts::SQRT_2,
        "SQRT1_2" => std::f64::consts::FRAC_1_SQRT_2,
        _ => {
            let func = match name {
                "abs" => BuiltinFn::MathAbs,
                "ceil" => BuiltinFn::MathCeil,
                "floor" => BuiltinFn::MathFloor,
                "round" => BuiltinFn::MathRound,
                "trunc" => BuiltinFn::MathTrunc,
                "sqrt" => BuiltinFn::MathSqrt,
                "sign" => BuiltinFn::MathSign,
                "pow" => BuiltinFn::MathPow,
                "min" => BuiltinFn::MathMin,
                "max" => BuiltinFn::MathMax,
                _ => return MathMember::Missing,
            };
            return MathMember::Func(func);
        }
    };
    MathMember::Const(constant)
}

/// Current wall-clock time in epoch milliseconds (`Date.now()`, and the
/// value a `Date` construction evaluates to in this value model).
pub(crate) fn date_now_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}

/// Applies a builtin to already-evaluated arguments.
pub(crate) fn call_builtin(func: BuiltinFn, args: &[Value]) -> Value {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    let num = |i: usize| arg(i).to_number();

    match func {
        BuiltinFn::IsNan => Value::Bool(num(0).is_nan()),
        BuiltinFn::IsFinite => Value::Bool(num(0).is_finite()),
        BuiltinFn::ParseInt => {
            let radix = args.get(1).map(Value::to_number);
            Value::Number(parse_int(&arg(0).to_string(), radix))
        }
        BuiltinFn::ParseFloat => Value::Number(parse_float(&arg(0).to_string())),
        BuiltinFn::EncodeUri => Value::String(percent_encode(&arg(0).to_string(), true)),
        BuiltinFn::EncodeUriComponent => {
            Value::String(percent_encode(&arg(0).to_string(), false))
        }
        BuiltinFn::DecodeUri | BuiltinFn::DecodeUriComponent => {
            percent_decode(&arg(0).to_string()).map_or(Value::Undefined, Value::String)
        }
        BuiltinFn::MathAbs => Value::Number(num(0).abs()),
        BuiltinFn::MathCeil => Value::Number(num(0).ceil()),
        BuiltinFn::MathFloor => Value::Number(num(0).floor()),
        // Halfway cases round toward positive infinity.
        BuiltinFn::MathRound => Value::Number((num(0) + 0.5).floor()),
        BuiltinFn::MathTrunc => Value::Number(num(0).trunc()),
        BuiltinFn::MathSqrt => Value::Number(num(0).sqrt()),
        BuiltinFn::MathSign => {
            let n = num(0);
            Value::Number(if n.is_nan() || n == 0.0 { n } else { n.signum() })
        }
        BuiltinFn::MathPow => Value::Number(num(0).powf(num(1))),
        BuiltinFn::MathMin => {
            let mut best = f64::INFINITY;
            for v in args {
                let n = v.to_number();
                if n.is_nan() {
                    return Value::Number(f64::NAN);
                }
                best = best.min(n);
            }
            Value::Number(best)
        }
        BuiltinFn::MathMax => {
            let mut best = f64::NEG_INFINITY;
            for v in args {
                let n = v.to_number();
                if n.is_nan() {
                    return Value::Number(f64::NAN);
                }
                best = best.max(n);
            }
            Value::Number(best)
        }
        BuiltinFn::DateNow => Value::Number(date_now_ms()),
    }
}

/// `parseInt` semantics: leading whitespace and sign, optional `0x` prefix,
/// then as many digits as the radix admits. No digits is NaN.
fn parse_int(s: &str, radix: Option<f64>) -> f64 {
    let mut t = s.trim_start();
    let mut sign = 1.0;
    if let Some(rest) = t.strip_prefix('-') {
        sign = -1.0;
        t = rest;
    } else if let Some(rest) = t.strip_prefix('+') {
        t = rest;
    }

    let mut radix = match radix {
        None => 0u32,
        Some(r) if r.is_nan() || r == 0.0 => 0,
        Some(r) => {
            let r = r as i64;
            if !(2..=36).contains(&r) {
                return f64::NAN;
            }
            r as u32
        }
    };

    if radix == 16 || radix == 0 {
        if let Some(rest) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
            t = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }

    let mut acc: Option<f64> = None;
    for ch in t.chars() {
        let Some(digit) = ch.to_digit(radix) else {
            break;
        };
        acc = Some(acc.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
    }
    acc.map_or(f64::NAN, |v| sign * v)
}

/// `parseFloat`: parse the longest numeric prefix; NaN if none.
fn parse_float(s: &str) -> f64 {
    let t = s.trim_start();
    if t.starts_with("Infinity") || t.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if t.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }

    let bytes = t.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let b = bytes[end];
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => {
                // Only take the exponent if digits follow it.
                let mut ahead = end + 1;
                if ahead < bytes.len() && matches!(bytes[ahead], b'+' | b'-') {
                    ahead += 1;
                }
                if ahead < bytes.len() && bytes[ahead].is_ascii_digit() {
                    seen_exp = true;
                    end = ahead;
                } else {
                    break;
                }
            }
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return f64::NAN;
    }
    t[..end].parse::<f64>().unwrap_or(f64::NAN)
}

fn is_uri_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

fn is_uri_reserved(b: u8) -> bool {
    matches!(
        b,
        b';' | b'/' | b'?' | b':' | b'@' | b'&' | b'=' | b'+' | b'$' | b',' | b'#'
    )
}

/// Percent-encodes UTF-8 bytes. `keep_reserved` selects `encodeURI`
/// behavior (URI delimiters pass through) over `encodeURIComponent`.
fn percent_encode(s: &str, keep_reserved: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if is_uri_unreserved(b) || (keep_reserved && is_uri_reserved(b)) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Percent-decodes into UTF-8. Malformed sequences yield `None`; the caller
/// maps that to `Undefined` instead of raising.
fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_constants() {
        match math_member("PI") {
            MathMember::Const(v) => assert_eq!(v, std::f64::consts::PI),
            _ => panic!("PI should be a constant"),
        }
        assert!(matches!(math_member("max"), MathMember::Func(BuiltinFn::MathMax)));
        assert!(matches!(math_member("nope"), MathMember::Missing));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", None), 42.0);
        assert_eq!(parse_int("  -7", None), -7.0);
        assert_eq!(parse_int("0x1f", None), 31.0);
        assert_eq!(parse_int("ff", Some(16.0)), 255.0);
        assert_eq!(parse_int("101", Some(2.0)), 5.0);
        assert!(parse_int("px", None).is_nan());
        assert!(parse_int("10", Some(1.0)).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.5rem"), 3.5);
        assert_eq!(parse_float("  -2e3x"), -2000.0);
        assert_eq!(parse_float("Infinity and beyond"), f64::INFINITY);
        assert!(parse_float("rem").is_nan());
        // `1e` without exponent digits stops before the `e`.
        assert_eq!(parse_float("1e"), 1.0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(call_builtin(BuiltinFn::MathRound, &[Value::Number(2.5)]), Value::Number(3.0));
        assert_eq!(
            call_builtin(BuiltinFn::MathRound, &[Value::Number(-2.5)]),
            Value::Number(-2.0)
        );
    }

    #[test]
    fn test_min_max() {
        let args = [Value::Number(3.0), Value::Number(1.0), Value::Number(2.0)];
        assert_eq!(call_builtin(BuiltinFn::MathMin, &args), Value::Number(1.0));
        assert_eq!(call_builtin(BuiltinFn::MathMax, &args), Value::Number(3.0));
        assert_eq!(call_builtin(BuiltinFn::MathMax, &[]), Value::Number(f64::NEG_INFINITY));
        let with_nan = [Value::Number(1.0), Value::Undefined];
        match call_builtin(BuiltinFn::MathMax, &with_nan) {
            Value::Number(n) => assert!(n.is_nan()),
            other => panic!("expected NaN, got {other:?}"),
        }
    }

    #[test]
    fn test_uri_round_trip() {
        let original = "a b/c?d=é";
        let component = percent_encode(original, false);
        assert_eq!(component, "a%20b%2Fc%3Fd%3D%C3%A9");
        assert_eq!(percent_decode(&component).as_deref(), Some(original));

        let uri = percent_encode(original, true);
        assert_eq!(uri, "a%20b/c?d=%C3%A9");
    }

    #[test]
    fn test_percent_decode_malformed() {
        assert_eq!(percent_decode("%zz"), None);
        assert_eq!(percent_decode("%e9"), None); // lone latin-1 byte, not UTF-8
        assert_eq!(percent_decode("%4"), None);
    }
}
