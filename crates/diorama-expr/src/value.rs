use std::collections::BTreeMap;
use std::fmt;

use crate::builtins::Builtin;
use crate::error::{type_err, ErrorKind, EvalResult};
use crate::lexer::parse_hex_color;

// ── Geometry values ───────────────────────────────────────────────────────

/// 2D vector; also used for sizes (`width` / `height` alias `x` / `y`).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v, z: v }
    }
}

/// Euler rotation in radians, applied in XYZ order.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Euler {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Euler {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Straight-alpha RGBA color, channels in `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    #[inline]
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            a: a.clamp(0.0, 1.0),
        }
    }

    #[inline]
    pub fn from_rgba8([r, g, b, a]: [u8; 4]) -> Self {
        Self {
            r: f64::from(r) / 255.0,
            g: f64::from(g) / 255.0,
            b: f64::from(b) / 255.0,
            a: f64::from(a) / 255.0,
        }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` (the `#` is optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        parse_hex_color(hex).map(Self::from_rgba8)
    }

    /// `0xRRGGBB` packed integer, as used by many 3D toolkits.
    pub fn from_packed(v: u32) -> Self {
        Self::from_rgba8([(v >> 16) as u8, (v >> 8) as u8, v as u8, 255])
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Lowercase `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

// ── Value ─────────────────────────────────────────────────────────────────

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Vector2(Vector2),
    Vector3(Vector3),
    Euler(Euler),
    Color(Color),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Function(Builtin),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Vector2(_) => "Vector2",
            Value::Vector3(_) => "Vector3",
            Value::Euler(_) => "Euler",
            Value::Color(_) => "Color",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// JavaScript truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Loose numeric coercion (`"21.5"` → 21.5, `true` → 1, `null` → 0).
    ///
    /// Returns NaN for strings that do not parse, like JavaScript's `Number()`.
    pub fn coerce_number(&self) -> EvalResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Null => Ok(0.0),
            Value::Str(s) => {
                let t = s.trim();
                if t.is_empty() {
                    Ok(0.0)
                } else {
                    Ok(t.parse::<f64>().unwrap_or(f64::NAN))
                }
            }
            other => type_err(format!("cannot convert {} to number", other.type_name())),
        }
    }

    /// Reads `self.name`.
    ///
    /// Missing object keys yield `null`; members of primitives that do not
    /// exist are a type error.
    pub fn member(&self, name: &str) -> EvalResult<Value> {
        let num = |n: f64| Ok(Value::Number(n));
        match (self, name) {
            (Value::Vector2(v), "x" | "width") => num(v.x),
            (Value::Vector2(v), "y" | "height") => num(v.y),
            (Value::Vector3(v), "x") => num(v.x),
            (Value::Vector3(v), "y") => num(v.y),
            (Value::Vector3(v), "z") => num(v.z),
            (Value::Euler(e), "x") => num(e.x),
            (Value::Euler(e), "y") => num(e.y),
            (Value::Euler(e), "z") => num(e.z),
            (Value::Color(c), "r") => num(c.r),
            (Value::Color(c), "g") => num(c.g),
            (Value::Color(c), "b") => num(c.b),
            (Value::Color(c), "a") => num(c.a),
            (Value::Str(s), "length") => num(s.chars().count() as f64),
            (Value::Array(items), "length") => num(items.len() as f64),
            (Value::Object(map), key) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
            (Value::Null, key) => type_err(format!("cannot read property '{key}' of null")),
            (other, key) => type_err(format!(
                "cannot read property '{key}' of {}",
                other.type_name()
            )),
        }
    }

    /// Reads `self[index]`.
    pub fn index(&self, index: &Value) -> EvalResult<Value> {
        match (self, index) {
            (Value::Array(items), Value::Number(n)) => {
                Ok(array_slot(*n).and_then(|i| items.get(i)).cloned().unwrap_or(Value::Null))
            }
            (Value::Str(s), Value::Number(n)) => Ok(array_slot(*n)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .unwrap_or(Value::Null)),
            (Value::Object(map), key) => {
                let key = key.to_string();
                Ok(map.get(&key).cloned().unwrap_or(Value::Null))
            }
            (_, Value::Str(key)) => self.member(key),
            (other, idx) => type_err(format!(
                "cannot index {} with {}",
                other.type_name(),
                idx.type_name()
            )),
        }
    }
}

fn array_slot(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

/// Formats a number the way JavaScript's `String(n)` does for common cases.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Vector2(v) => write!(f, "Vector2({}, {})", format_number(v.x), format_number(v.y)),
            Value::Vector3(v) => write!(
                f,
                "Vector3({}, {}, {})",
                format_number(v.x),
                format_number(v.y),
                format_number(v.z)
            ),
            Value::Euler(e) => write!(
                f,
                "Euler({}, {}, {})",
                format_number(e.x),
                format_number(e.y),
                format_number(e.z)
            ),
            Value::Color(c) => f.write_str(&c.to_hex()),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(b) => write!(f, "function {}", b.name()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vector3> for Value {
    fn from(v: Vector3) -> Self {
        Value::Vector3(v)
    }
}

impl From<Euler> for Value {
    fn from(v: Euler) -> Self {
        Value::Euler(v)
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Value::Color(v)
    }
}

// ── Typed extraction ──────────────────────────────────────────────────────

/// Conversion from an evaluated [`Value`] into a property type.
///
/// A mismatch is reported as [`ErrorKind::Type`] naming the expected type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ErrorKind>;
}

fn expected<T>(what: &str, got: &Value) -> Result<T, ErrorKind> {
    type_err(format!("expected {what}, got {} `{got}`", got.type_name()))
}

fn numbers<const N: usize>(items: &[Value]) -> Option<[f64; N]> {
    if items.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        match item {
            Value::Number(n) => *slot = *n,
            _ => return None,
        }
    }
    Some(out)
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        Ok(value)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match &value {
            Value::Number(n) => Ok(*n),
            Value::Str(s) => match s.trim().parse::<f64>() {
                Ok(n) => Ok(n),
                Err(_) => expected("number", &value),
            },
            _ => expected("number", &value),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        f64::from_value(value).map(|n| n as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        Ok(value.truthy())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Str(s) => Ok(s),
            Value::Number(_) | Value::Bool(_) => Ok(value.to_string()),
            other => expected("string", &other),
        }
    }
}

impl FromValue for Vector2 {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match &value {
            Value::Vector2(v) => Ok(*v),
            Value::Array(items) => match numbers::<2>(items) {
                Some([x, y]) => Ok(Vector2::new(x, y)),
                None => expected("Vector2", &value),
            },
            _ => expected("Vector2", &value),
        }
    }
}

impl FromValue for Vector3 {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match &value {
            Value::Vector3(v) => Ok(*v),
            Value::Array(items) => match numbers::<3>(items) {
                Some([x, y, z]) => Ok(Vector3::new(x, y, z)),
                None => expected("Vector3", &value),
            },
            _ => expected("Vector3", &value),
        }
    }
}

impl FromValue for Euler {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match &value {
            Value::Euler(e) => Ok(*e),
            Value::Vector3(v) => Ok(Euler::new(v.x, v.y, v.z)),
            Value::Array(items) => match numbers::<3>(items) {
                Some([x, y, z]) => Ok(Euler::new(x, y, z)),
                None => expected("Euler", &value),
            },
            _ => expected("Euler", &value),
        }
    }
}

impl FromValue for Color {
    fn from_value(value: Value) -> Result<Self, ErrorKind> {
        match &value {
            Value::Color(c) => Ok(*c),
            Value::Str(s) => match Color::from_hex(s) {
                Some(c) => Ok(c),
                None => expected("color", &value),
            },
            Value::Number(n) if *n >= 0.0 && *n <= f64::from(0xff_ffff_u32) => {
                Ok(Color::from_packed(*n as u32))
            }
            _ => expected("color", &value),
        }
    }
}
