use crate::value::Value;

// ── Operators ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

// ── Expr ──────────────────────────────────────────────────────────────────

/// Parsed expression tree.
///
/// Trees are built per evaluation and dropped afterwards; nothing caches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    New(Box<Expr>, Vec<Expr>),
}

impl Expr {
    /// Returns the dotted segments if this is a plain `a.b.c` identifier chain.
    ///
    /// ```text
    /// sensor.kitchen.temperature  ->  ["sensor", "kitchen", "temperature"]
    /// foo().bar                   ->  None
    /// ```
    pub fn path_segments(&self) -> Option<Vec<&str>> {
        match self {
            Expr::Ident(name) => Some(vec![name.as_str()]),
            Expr::Member(object, name) => {
                let mut segs = object.path_segments()?;
                segs.push(name.as_str());
                Some(segs)
            }
            _ => None,
        }
    }
}
