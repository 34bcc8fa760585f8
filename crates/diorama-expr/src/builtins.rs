//! Built-in constructors, math helpers and color helpers.
//!
//! These form the bottom layer of every [`Context`](crate::Context) and are
//! always present regardless of what the host binds on top.

use std::collections::BTreeMap;
use std::f64::consts;

use crate::error::{ErrorKind, EvalResult};
use crate::value::{Color, Euler, Value, Vector2, Vector3};

/// A callable built into the language.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Builtin {
    // Constructors
    Vector2,
    Vector3,
    Euler,
    Color,
    // Math namespace
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Abs,
    Floor,
    Ceil,
    Round,
    Sqrt,
    Pow,
    Min,
    Max,
    Exp,
    Log,
    Sign,
    // Globals
    DegToRad,
    RadToDeg,
    Clamp,
    Lerp,
    Number,
    String,
    Boolean,
    IsNaN,
    ParseFloat,
    ParseInt,
    Hsl,
}

const MATH_FUNCTIONS: &[Builtin] = &[
    Builtin::Sin,
    Builtin::Cos,
    Builtin::Tan,
    Builtin::Asin,
    Builtin::Acos,
    Builtin::Atan,
    Builtin::Atan2,
    Builtin::Abs,
    Builtin::Floor,
    Builtin::Ceil,
    Builtin::Round,
    Builtin::Sqrt,
    Builtin::Pow,
    Builtin::Min,
    Builtin::Max,
    Builtin::Exp,
    Builtin::Log,
    Builtin::Sign,
];

const GLOBAL_FUNCTIONS: &[Builtin] = &[
    Builtin::Vector2,
    Builtin::Vector3,
    Builtin::Euler,
    Builtin::Color,
    Builtin::DegToRad,
    Builtin::RadToDeg,
    Builtin::Clamp,
    Builtin::Lerp,
    Builtin::Number,
    Builtin::String,
    Builtin::Boolean,
    Builtin::IsNaN,
    Builtin::ParseFloat,
    Builtin::ParseInt,
    Builtin::Hsl,
];

impl Builtin {
    /// Name as it appears in expressions (without the `Math.` prefix).
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Vector2 => "Vector2",
            Builtin::Vector3 => "Vector3",
            Builtin::Euler => "Euler",
            Builtin::Color => "Color",
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Tan => "tan",
            Builtin::Asin => "asin",
            Builtin::Acos => "acos",
            Builtin::Atan => "atan",
            Builtin::Atan2 => "atan2",
            Builtin::Abs => "abs",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
            Builtin::Round => "round",
            Builtin::Sqrt => "sqrt",
            Builtin::Pow => "pow",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Exp => "exp",
            Builtin::Log => "log",
            Builtin::Sign => "sign",
            Builtin::DegToRad => "degToRad",
            Builtin::RadToDeg => "radToDeg",
            Builtin::Clamp => "clamp",
            Builtin::Lerp => "lerp",
            Builtin::Number => "Number",
            Builtin::String => "String",
            Builtin::Boolean => "Boolean",
            Builtin::IsNaN => "isNaN",
            Builtin::ParseFloat => "parseFloat",
            Builtin::ParseInt => "parseInt",
            Builtin::Hsl => "hsl",
        }
    }

    /// Whether `new X(...)` is allowed.
    pub fn is_constructor(self) -> bool {
        matches!(
            self,
            Builtin::Vector2 | Builtin::Vector3 | Builtin::Euler | Builtin::Color
        )
    }

    pub fn call(self, args: &[Value]) -> EvalResult<Value> {
        match self {
            Builtin::Vector2 => {
                let [x, y] = numbers_or_zero::<2>(self, args)?;
                Ok(Value::Vector2(Vector2::new(x, y)))
            }
            Builtin::Vector3 => {
                let [x, y, z] = numbers_or_zero::<3>(self, args)?;
                Ok(Value::Vector3(Vector3::new(x, y, z)))
            }
            Builtin::Euler => {
                let [x, y, z] = numbers_or_zero::<3>(self, args)?;
                Ok(Value::Euler(Euler::new(x, y, z)))
            }
            Builtin::Color => construct_color(args),
            Builtin::Sin => unary(self, args, f64::sin),
            Builtin::Cos => unary(self, args, f64::cos),
            Builtin::Tan => unary(self, args, f64::tan),
            Builtin::Asin => unary(self, args, f64::asin),
            Builtin::Acos => unary(self, args, f64::acos),
            Builtin::Atan => unary(self, args, f64::atan),
            Builtin::Abs => unary(self, args, f64::abs),
            Builtin::Floor => unary(self, args, f64::floor),
            Builtin::Ceil => unary(self, args, f64::ceil),
            // JavaScript rounds .5 towards +∞.
            Builtin::Round => unary(self, args, |n| (n + 0.5).floor()),
            Builtin::Sqrt => unary(self, args, f64::sqrt),
            Builtin::Exp => unary(self, args, f64::exp),
            Builtin::Log => unary(self, args, f64::ln),
            Builtin::Sign => unary(self, args, |n| {
                if n.is_nan() || n == 0.0 { n } else { n.signum() }
            }),
            Builtin::DegToRad => unary(self, args, f64::to_radians),
            Builtin::RadToDeg => unary(self, args, f64::to_degrees),
            Builtin::Atan2 => {
                let [y, x] = exact::<2>(self, args)?;
                Ok(Value::Number(y.atan2(x)))
            }
            Builtin::Pow => {
                let [b, e] = exact::<2>(self, args)?;
                Ok(Value::Number(b.powf(e)))
            }
            Builtin::Min => fold(args, f64::INFINITY, f64::min),
            Builtin::Max => fold(args, f64::NEG_INFINITY, f64::max),
            Builtin::Clamp => {
                let [v, lo, hi] = exact::<3>(self, args)?;
                Ok(Value::Number(v.max(lo).min(hi)))
            }
            Builtin::Lerp => {
                let [a, b, t] = exact::<3>(self, args)?;
                Ok(Value::Number(a + (b - a) * t))
            }
            Builtin::Number => match args.first() {
                None => Ok(Value::Number(0.0)),
                Some(v) => v.coerce_number().map(Value::Number),
            },
            Builtin::String => Ok(Value::Str(
                args.first().map(|v| v.to_string()).unwrap_or_default(),
            )),
            Builtin::Boolean => Ok(Value::Bool(args.first().is_some_and(Value::truthy))),
            Builtin::IsNaN => {
                let n = args.first().map(Value::coerce_number).transpose()?;
                Ok(Value::Bool(n.is_none_or(f64::is_nan)))
            }
            Builtin::ParseFloat => Ok(Value::Number(
                args.first().map(|v| parse_float_prefix(&v.to_string())).unwrap_or(f64::NAN),
            )),
            Builtin::ParseInt => Ok(Value::Number(
                args.first()
                    .map(|v| parse_float_prefix(&v.to_string()).trunc())
                    .unwrap_or(f64::NAN),
            )),
            Builtin::Hsl => {
                let [h, s, l] = exact::<3>(self, args)?;
                Ok(Value::Color(hsl_to_rgb(h, s, l)))
            }
        }
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────

fn arity_err<T>(f: Builtin, expected: impl Into<String>, got: usize) -> EvalResult<T> {
    Err(ErrorKind::Arity { function: f.name().to_string(), expected: expected.into(), got })
}

fn number_arg(f: Builtin, v: &Value) -> EvalResult<f64> {
    match v {
        Value::Number(n) => Ok(*n),
        other => other.coerce_number().map_err(|_| {
            ErrorKind::Type(format!("{} expects numbers, got {}", f.name(), other.type_name()))
        }),
    }
}

fn exact<const N: usize>(f: Builtin, args: &[Value]) -> EvalResult<[f64; N]> {
    if args.len() != N {
        return arity_err(f, N.to_string(), args.len());
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = number_arg(f, arg)?;
    }
    Ok(out)
}

/// Constructor-style: missing trailing arguments default to zero.
fn numbers_or_zero<const N: usize>(f: Builtin, args: &[Value]) -> EvalResult<[f64; N]> {
    if args.len() > N {
        return arity_err(f, format!("at most {N}"), args.len());
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = number_arg(f, arg)?;
    }
    Ok(out)
}

fn unary(f: Builtin, args: &[Value], op: impl Fn(f64) -> f64) -> EvalResult<Value> {
    let [n] = exact::<1>(f, args)?;
    Ok(Value::Number(op(n)))
}

fn fold(args: &[Value], init: f64, op: fn(f64, f64) -> f64) -> EvalResult<Value> {
    let mut acc = init;
    for arg in args {
        let n = arg.coerce_number()?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        acc = op(acc, n);
    }
    Ok(Value::Number(acc))
}

fn construct_color(args: &[Value]) -> EvalResult<Value> {
    match args {
        [] => Ok(Value::Color(Color::WHITE)),
        [Value::Color(c)] => Ok(Value::Color(*c)),
        [Value::Str(s)] => Color::from_hex(s)
            .map(Value::Color)
            .ok_or_else(|| ErrorKind::Invalid(format!("invalid color string {s:?}"))),
        [Value::Number(n)] => Ok(Value::Color(Color::from_packed(*n as u32))),
        [_, _, _] | [_, _, _, _] => {
            let mut c = [1.0; 4];
            for (slot, arg) in c.iter_mut().zip(args) {
                *slot = number_arg(Builtin::Color, arg)?;
            }
            Ok(Value::Color(Color::new(c[0], c[1], c[2], c[3])))
        }
        other => arity_err(Builtin::Color, "0, 1, 3 or 4", other.len()),
    }
}

fn parse_float_prefix(s: &str) -> f64 {
    let t = s.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in t.char_indices() {
        match c {
            '0'..='9' => end = i + 1,
            '.' if !seen_dot => seen_dot = true,
            '-' | '+' if i == 0 => {}
            _ => break,
        }
    }
    t[..end].parse::<f64>().unwrap_or(f64::NAN)
}

/// `h` in `[0, 1]` turns, `s` and `l` in `[0, 1]`.
fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Color {
    let h = h.rem_euclid(1.0);
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    if s == 0.0 {
        return Color::new(l, l, l, 1.0);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |t: f64| {
        let t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    Color::new(channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0), 1.0)
}

// ── Binding table ─────────────────────────────────────────────────────────

/// The always-present bottom layer: `Math`, constructors and global helpers.
pub fn builtin_bindings() -> BTreeMap<String, Value> {
    let mut math = BTreeMap::new();
    math.insert("PI".to_string(), Value::Number(consts::PI));
    math.insert("E".to_string(), Value::Number(consts::E));
    for f in MATH_FUNCTIONS {
        math.insert(f.name().to_string(), Value::Function(*f));
    }

    let mut out = BTreeMap::new();
    out.insert("Math".to_string(), Value::Object(math));
    out.insert("NaN".to_string(), Value::Number(f64::NAN));
    out.insert("Infinity".to_string(), Value::Number(f64::INFINITY));
    for f in GLOBAL_FUNCTIONS {
        out.insert(f.name().to_string(), Value::Function(*f));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::format_number;

    #[test]
    fn vector_constructor_defaults_missing_to_zero() {
        let v = Builtin::Vector3.call(&[Value::Number(1.0)]).unwrap();
        assert_eq!(v, Value::Vector3(Vector3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn vector_constructor_rejects_extra_args() {
        let err = Builtin::Vector2
            .call(&[Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)])
            .unwrap_err();
        assert!(matches!(err, ErrorKind::Arity { .. }));
    }

    #[test]
    fn color_from_hex_string() {
        let c = Builtin::Color.call(&[Value::from("#ff0000")]).unwrap();
        assert_eq!(c, Value::Color(Color::new(1.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn round_half_goes_up() {
        assert_eq!(Builtin::Round.call(&[Value::Number(2.5)]).unwrap(), Value::Number(3.0));
        assert_eq!(Builtin::Round.call(&[Value::Number(-2.5)]).unwrap(), Value::Number(-2.0));
    }

    #[test]
    fn hsl_primary_red() {
        assert_eq!(hsl_to_rgb(0.0, 1.0, 0.5).to_hex(), "#ff0000");
    }

    #[test]
    fn parse_float_reads_numeric_prefix() {
        assert_eq!(parse_float_prefix("21.5 °C"), 21.5);
        assert!(parse_float_prefix("abc").is_nan());
    }

    #[test]
    fn string_of_integer_has_no_fraction() {
        assert_eq!(format_number(2000.0), "2000");
    }
}
