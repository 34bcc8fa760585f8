//! Lexer, parser, and evaluator for **Diorama property expressions**.
//!
//! Every object property in a scene configuration is a short expression
//! (`new Vector3(0, 2, 0)`, `sensor.sun.elevation > 0 ? 2000 : 0`, `#ffcc00`)
//! evaluated against a layered [`Context`]. Trees are not retained: each
//! evaluation re-parses the text.
//!
//! This crate is intentionally dependency-free so it can be consumed by
//! editors and linters without pulling in any engine or async code.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ast`] | `Expr`, `UnaryOp`, `BinaryOp` |
//! | [`builtins`] | `Builtin`, `Math` namespace, constructors |
//! | [`context`] | `Context` (persistent binding layers) |
//! | [`error`] | `ParseError`, `ErrorKind`, `EvaluationError` |
//! | [`eval`] | `Evaluator`, `evaluate` |
//! | [`lexer`] | `Lexer`, `Token` |
//! | [`parser`] | `parse_str` entry point |
//! | [`value`] | `Value`, `Vector2`, `Vector3`, `Euler`, `Color`, `FromValue` |
//!
//! # Quick start
//!
//! ```rust
//! use diorama_expr::{Context, Evaluator, Value};
//!
//! let ctx = Context::new().with_value("sensor.sun.elevation", Value::Number(12.0));
//! let ev = Evaluator::new(ctx);
//!
//! let intensity: f64 = ev.evaluate_as("sensor.sun.elevation > 0 ? 2000 : 0").unwrap();
//! assert_eq!(intensity, 2000.0);
//! ```

pub mod ast;
pub mod builtins;
pub mod context;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use context::Context;
pub use error::{ErrorKind, EvaluationError, ParseError};
pub use eval::{evaluate, Evaluator};
pub use parser::parse_str;
pub use value::{Color, Euler, FromValue, Value, Vector2, Vector3};


#[cfg(test)]
mod eval_tests {
    use super::*;

    fn eval(src: &str) -> Value {
        evaluate(src, &Context::new()).unwrap()
    }

    fn num(src: &str) -> f64 {
        match eval(src) {
            Value::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    // ── math ─────────────────────────────────────────────────────────────

    #[test]
    fn math_functions() {
        assert_eq!(num("Math.abs(-3)"), 3.0);
        assert_eq!(num("Math.max(1, 5, 3)"), 5.0);
        assert_eq!(num("Math.min()"), f64::INFINITY);
        assert_eq!(num("Math.pow(2, 10)"), 1024.0);
        assert!((num("Math.sin(Math.PI / 2)") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn helpers() {
        assert!((num("degToRad(180)") - std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(num("clamp(5, 0, 1)"), 1.0);
        assert_eq!(num("lerp(0, 10, 0.25)"), 2.5);
        assert_eq!(num("parseInt('42px')"), 42.0);
        assert_eq!(eval("isNaN('abc')"), Value::Bool(true));
    }

    #[test]
    fn wrong_arity_is_reported() {
        let err = evaluate("Math.pow(2)", &Context::new()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Arity { got: 1, .. }));
    }

    // ── members ──────────────────────────────────────────────────────────

    #[test]
    fn vector_members() {
        assert_eq!(num("new Vector3(1, 2, 3).z"), 3.0);
        assert_eq!(num("new Vector2(400, 300).width"), 400.0);
        assert_eq!(num("#ff0000.r"), 1.0);
    }

    #[test]
    fn lengths() {
        assert_eq!(num("'abc'.length"), 3.0);
        assert_eq!(num("[1, 2].length"), 2.0);
    }

    #[test]
    fn missing_object_key_is_null() {
        assert_eq!(eval("{ a: 1 }.b"), Value::Null);
    }

    #[test]
    fn member_of_null_is_type_error() {
        let err = evaluate("null.x", &Context::new()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Type(_)));
    }

    // ── display ──────────────────────────────────────────────────────────

    #[test]
    fn error_display_includes_expression() {
        let err = evaluate("nope", &Context::new()).unwrap_err();
        assert_eq!(err.to_string(), "nope is not defined in expression `nope`");
    }
}
