use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenWithPos};
use crate::value::{Color, Value};

// ── Parser ────────────────────────────────────────────────────────────────

/// Recursive-descent parser with JavaScript operator precedence.
///
/// Precedence, lowest first: `?:`, `||`, `&&`, equality, relational,
/// additive, multiplicative, unary, postfix (`.` `[]` `()`).
pub struct Parser {
    tokens: Vec<TokenWithPos>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<TokenWithPos>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current_col(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.col)
            .unwrap_or(1)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos)
            .map(|t| t.token.clone())
            .unwrap_or(Token::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg, self.current_col())
    }

    fn expect_token(&mut self, expected: &Token) -> Result<(), ParseError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, got {:?}", expected, self.peek())))
        }
    }

    // ── Program ───────────────────────────────────────────────────────────

    /// Parses a single expression, optionally prefixed by `return`.
    pub fn parse_program(&mut self) -> Result<Expr, ParseError> {
        self.eat(&Token::Return);
        if self.peek() == &Token::Eof {
            return Err(self.err("empty expression"));
        }
        let expr = self.parse_expr()?;
        if self.peek() != &Token::Eof {
            return Err(self.err(format!("unexpected {:?} after expression", self.peek())));
        }
        Ok(expr)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.parse_expr()?;
        self.expect_token(&Token::Colon)?;
        let otherwise = self.parse_expr()?;
        Ok(Expr::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                Token::EqEqEq => BinaryOp::StrictEq,
                Token::NotEqEq => BinaryOp::StrictNotEq,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    // ── Postfix ───────────────────────────────────────────────────────────

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.peek() == &Token::New {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = self.expect_property_name()?;
                    expr = Expr::Member(Box::new(expr), name);
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect_token(&Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Token::LParen => {
                    let args = self.parse_args()?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `new Ctor(args)` / `new Ns.Ctor(args)`; the argument list is optional.
    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        self.advance(); // consume `new`
        let mut callee = match self.advance() {
            Token::Ident(name) => Expr::Ident(name),
            tok => return Err(self.err(format!("expected constructor name after 'new', got {tok:?}"))),
        };
        while self.eat(&Token::Dot) {
            let name = self.expect_property_name()?;
            callee = Expr::Member(Box::new(callee), name);
        }
        let args = if self.peek() == &Token::LParen {
            self.parse_args()?
        } else {
            Vec::new()
        };
        Ok(Expr::New(Box::new(callee), args))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect_token(&Token::LParen)?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect_token(&Token::Comma)?;
        }
    }

    /// Property names after `.` may be keywords (`obj.new`, `state.null`).
    fn expect_property_name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            Token::True => Ok("true".into()),
            Token::False => Ok("false".into()),
            Token::Null => Ok("null".into()),
            Token::New => Ok("new".into()),
            Token::Return => Ok("return".into()),
            tok => Err(self.err(format!("expected property name, got {tok:?}"))),
        }
    }

    // ── Primary ───────────────────────────────────────────────────────────

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let col = self.current_col();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Color(c) => Ok(Expr::Literal(Value::Color(Color::from_rgba8(c)))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect_token(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.parse_array(),
            Token::LBrace => self.parse_object(),
            Token::Eof => Err(ParseError::new("unexpected end of expression", col)),
            tok => Err(ParseError::new(format!("expected a value, got {tok:?}"), col)),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&Token::RBracket) {
                return Ok(Expr::Array(items));
            }
            items.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                self.expect_token(&Token::RBracket)?;
                return Ok(Expr::Array(items));
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(Expr::Object(entries));
            }
            let key = match self.advance() {
                Token::Ident(s) | Token::Str(s) => s,
                Token::Number(n) => Value::Number(n).to_string(),
                tok => return Err(self.err(format!("expected object key, got {tok:?}"))),
            };
            self.expect_token(&Token::Colon)?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect_token(&Token::RBrace)?;
                return Ok(Expr::Object(entries));
            }
        }
    }
}

// ── Public parse entry point ──────────────────────────────────────────────

/// Parse an expression string into an [`Expr`] tree.
pub fn parse_str(src: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).parse_program()
}
