use std::collections::BTreeMap;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::context::Context;
use crate::error::{type_err, ErrorKind, EvalResult, EvaluationError};
use crate::parser::parse_str;
use crate::value::{Euler, FromValue, Value, Vector2, Vector3};

// ── Evaluator ─────────────────────────────────────────────────────────────

/// Evaluates expression strings against a fixed [`Context`].
///
/// Cloning is cheap (the context is `Rc`-shared). Evaluation never mutates the
/// context, so the same text against the same evaluator always yields the
/// same result.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    context: Context,
}

impl Evaluator {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns a new evaluator whose context has `key` bound on top.
    pub fn with_context_value(&self, key: impl Into<String>, value: Value) -> Evaluator {
        Evaluator { context: self.context.with_value(key, value) }
    }

    pub fn evaluate(&self, expression: &str) -> Result<Value, EvaluationError> {
        evaluate(expression, &self.context)
    }

    /// Evaluates and converts to `T`; a conversion failure is reported as an
    /// [`EvaluationError`] carrying the expression text.
    pub fn evaluate_as<T: FromValue>(&self, expression: &str) -> Result<T, EvaluationError> {
        let value = self.evaluate(expression)?;
        T::from_value(value).map_err(|kind| EvaluationError::new(kind, expression))
    }
}

/// Parses and evaluates `expression` against `context`.
pub fn evaluate(expression: &str, context: &Context) -> Result<Value, EvaluationError> {
    let expr = parse_str(expression)
        .map_err(|e| EvaluationError::new(ErrorKind::Syntax(e), expression))?;
    eval_expr(&expr, context).map_err(|kind| EvaluationError::new(kind, expression))
}

// ── Tree walk ─────────────────────────────────────────────────────────────

fn eval_expr(expr: &Expr, ctx: &Context) -> EvalResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(_) | Expr::Member(..) if expr.path_segments().is_some() => {
            let segments = expr.path_segments().unwrap_or_default();
            ctx.resolve_path(&segments)
                .unwrap_or_else(|| Err(ErrorKind::Undefined(segments.join("."))))
        }
        Expr::Ident(name) => Err(ErrorKind::Undefined(name.clone())),
        Expr::Member(object, name) => eval_expr(object, ctx)?.member(name),
        Expr::Index(object, index) => {
            let object = eval_expr(object, ctx)?;
            let index = eval_expr(index, ctx)?;
            object.index(&index)
        }
        Expr::Array(items) => items
            .iter()
            .map(|item| eval_expr(item, ctx))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),
        Expr::Object(entries) => {
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                map.insert(key.clone(), eval_expr(value, ctx)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Unary(op, operand) => unary(*op, eval_expr(operand, ctx)?),
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            if l.truthy() { eval_expr(rhs, ctx) } else { Ok(l) }
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            if l.truthy() { Ok(l) } else { eval_expr(rhs, ctx) }
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            binary(*op, l, r)
        }
        Expr::Conditional(cond, then, otherwise) => {
            if eval_expr(cond, ctx)?.truthy() {
                eval_expr(then, ctx)
            } else {
                eval_expr(otherwise, ctx)
            }
        }
        Expr::Call(callee, args) => {
            let f = eval_expr(callee, ctx)?;
            let args = eval_args(args, ctx)?;
            match f {
                Value::Function(b) => b.call(&args),
                other => type_err(format!("{} is not a function", other.type_name())),
            }
        }
        Expr::New(callee, args) => {
            let f = eval_expr(callee, ctx)?;
            let args = eval_args(args, ctx)?;
            match f {
                Value::Function(b) if b.is_constructor() => b.call(&args),
                Value::Function(b) => type_err(format!("{} is not a constructor", b.name())),
                other => type_err(format!("{} is not a constructor", other.type_name())),
            }
        }
    }
}

fn eval_args(args: &[Expr], ctx: &Context) -> EvalResult<Vec<Value>> {
    args.iter().map(|a| eval_expr(a, ctx)).collect()
}

// ── Operators ─────────────────────────────────────────────────────────────

fn unary(op: UnaryOp, v: Value) -> EvalResult<Value> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy())),
        (UnaryOp::Neg, Value::Vector2(a)) => Ok(Value::Vector2(Vector2::new(-a.x, -a.y))),
        (UnaryOp::Neg, Value::Vector3(a)) => Ok(Value::Vector3(Vector3::new(-a.x, -a.y, -a.z))),
        (UnaryOp::Neg, Value::Euler(a)) => Ok(Value::Euler(Euler::new(-a.x, -a.y, -a.z))),
        (UnaryOp::Neg, v) => Ok(Value::Number(-v.coerce_number()?)),
        (UnaryOp::Plus, v) => Ok(Value::Number(v.coerce_number()?)),
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => add(l, r),
        BinaryOp::Sub => arith(op, l, r, |a, b| a - b),
        BinaryOp::Mul => arith(op, l, r, |a, b| a * b),
        BinaryOp::Div => arith(op, l, r, |a, b| a / b),
        BinaryOp::Rem => arith(op, l, r, |a, b| a % b),
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(&l, &r))),
        BinaryOp::NotEq => Ok(Value::Bool(!loose_eq(&l, &r))),
        BinaryOp::StrictEq => Ok(Value::Bool(l == r)),
        BinaryOp::StrictNotEq => Ok(Value::Bool(l != r)),
        BinaryOp::Lt => compare(l, r, |o| o.is_lt()),
        BinaryOp::Le => compare(l, r, |o| o.is_le()),
        BinaryOp::Gt => compare(l, r, |o| o.is_gt()),
        BinaryOp::Ge => compare(l, r, |o| o.is_ge()),
        // Short-circuit operators are handled in `eval_expr`.
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators short-circuit"),
    }
}

fn add(l: Value, r: Value) -> EvalResult<Value> {
    match (&l, &r) {
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{l}{r}"))),
        _ => arith(BinaryOp::Add, l, r, |a, b| a + b),
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        _ => "%",
    }
}

/// Numeric and component-wise vector arithmetic.
///
/// Vectors combine with the same vector kind under `+ -`, and with numbers
/// under `* /` (plus `num * vec`).
fn arith(op: BinaryOp, l: Value, r: Value, f: fn(f64, f64) -> f64) -> EvalResult<Value> {
    let additive = matches!(op, BinaryOp::Add | BinaryOp::Sub);
    let scaling = matches!(op, BinaryOp::Mul | BinaryOp::Div);
    match (l, r) {
        (Value::Vector2(a), Value::Vector2(b)) if additive => {
            Ok(Value::Vector2(Vector2::new(f(a.x, b.x), f(a.y, b.y))))
        }
        (Value::Vector3(a), Value::Vector3(b)) if additive => {
            Ok(Value::Vector3(Vector3::new(f(a.x, b.x), f(a.y, b.y), f(a.z, b.z))))
        }
        (Value::Euler(a), Value::Euler(b)) if additive => {
            Ok(Value::Euler(Euler::new(f(a.x, b.x), f(a.y, b.y), f(a.z, b.z))))
        }
        (Value::Vector2(a), Value::Number(n)) if scaling => {
            Ok(Value::Vector2(Vector2::new(f(a.x, n), f(a.y, n))))
        }
        (Value::Vector3(a), Value::Number(n)) if scaling => {
            Ok(Value::Vector3(Vector3::new(f(a.x, n), f(a.y, n), f(a.z, n))))
        }
        (Value::Euler(a), Value::Number(n)) if scaling => {
            Ok(Value::Euler(Euler::new(f(a.x, n), f(a.y, n), f(a.z, n))))
        }
        (Value::Number(n), Value::Vector2(a)) if op == BinaryOp::Mul => {
            Ok(Value::Vector2(Vector2::new(n * a.x, n * a.y)))
        }
        (Value::Number(n), Value::Vector3(a)) if op == BinaryOp::Mul => {
            Ok(Value::Vector3(Vector3::new(n * a.x, n * a.y, n * a.z)))
        }
        (Value::Number(n), Value::Euler(a)) if op == BinaryOp::Mul => {
            Ok(Value::Euler(Euler::new(n * a.x, n * a.y, n * a.z)))
        }
        (l @ (Value::Vector2(_) | Value::Vector3(_) | Value::Euler(_)), r)
        | (l, r @ (Value::Vector2(_) | Value::Vector3(_) | Value::Euler(_))) => type_err(format!(
            "unsupported operands for {}: {} and {}",
            op_symbol(op),
            l.type_name(),
            r.type_name()
        )),
        (l, r) => Ok(Value::Number(f(l.coerce_number()?, r.coerce_number()?))),
    }
}

fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Str(_)) => r.coerce_number().is_ok_and(|b| *a == b),
        (Value::Str(_), Value::Number(b)) => l.coerce_number().is_ok_and(|a| a == *b),
        (Value::Bool(b), other) | (other, Value::Bool(b)) if !matches!(other, Value::Bool(_)) => {
            loose_eq(&Value::Number(if *b { 1.0 } else { 0.0 }), other)
        }
        _ => l == r,
    }
}

fn compare(l: Value, r: Value, test: fn(std::cmp::Ordering) -> bool) -> EvalResult<Value> {
    let ordering = match (&l, &r) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => l.coerce_number()?.partial_cmp(&r.coerce_number()?),
    };
    // NaN compares false both ways.
    Ok(Value::Bool(ordering.is_some_and(test)))
}
