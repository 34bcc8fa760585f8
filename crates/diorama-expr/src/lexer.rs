use crate::error::ParseError;

// ── Token ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Ident(String),
    Str(String),
    Number(f64),
    /// Color literal: `[r, g, b, a]` straight-alpha bytes as parsed from `#rgb`,
    /// `#rrggbb` or `#rrggbbaa`.
    Color([u8; 4]),
    // Keywords
    True,
    False,
    Null,
    New,
    Return,
    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Question,
    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    // Sentinel
    Eof,
}

/// A token plus the 1-based column where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithPos {
    pub token: Token,
    pub col: usize,
}

// ── Lexer ─────────────────────────────────────────────────────────────────

pub struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    col: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src, pos: 0, col: 1 }
    }

    pub fn tokenize(mut self) -> Result<Vec<TokenWithPos>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let col = self.col;
            let token = self.next_token()?;
            let eof = token == Token::Eof;
            tokens.push(TokenWithPos { token, col });
            if eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        self.col += 1;
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg, self.col)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            if self.src[self.pos..].starts_with("//") {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.advance();
                }
            } else if self.src[self.pos..].starts_with("/*") {
                self.advance();
                self.advance();
                loop {
                    if self.src[self.pos..].starts_with("*/") {
                        self.advance();
                        self.advance();
                        break;
                    }
                    if self.advance().is_none() {
                        break; // unterminated; the next token reports EOF
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let ch = match self.peek() {
            None => return Ok(Token::Eof),
            Some(c) => c,
        };

        let tok = match ch {
            '(' => { self.advance(); Token::LParen }
            ')' => { self.advance(); Token::RParen }
            '[' => { self.advance(); Token::LBracket }
            ']' => { self.advance(); Token::RBracket }
            '{' => { self.advance(); Token::LBrace }
            '}' => { self.advance(); Token::RBrace }
            ',' => { self.advance(); Token::Comma }
            ':' => { self.advance(); Token::Colon }
            '?' => { self.advance(); Token::Question }
            '+' => { self.advance(); Token::Plus }
            '-' => { self.advance(); Token::Minus }
            '*' => { self.advance(); Token::Star }
            '/' => { self.advance(); Token::Slash }
            '%' => { self.advance(); Token::Percent }
            ';' => {
                // A trailing statement terminator is tolerated.
                self.advance();
                self.skip_whitespace_and_comments();
                if self.peek().is_some() {
                    return Err(self.err("only a single expression is allowed"));
                }
                Token::Eof
            }
            '!' => {
                self.advance();
                if self.eat('=') {
                    if self.eat('=') { Token::NotEqEq } else { Token::NotEq }
                } else {
                    Token::Bang
                }
            }
            '=' => {
                self.advance();
                if !self.eat('=') {
                    return Err(self.err("assignment is not supported in expressions"));
                }
                if self.eat('=') { Token::EqEqEq } else { Token::EqEq }
            }
            '<' => {
                self.advance();
                if self.eat('=') { Token::Le } else { Token::Lt }
            }
            '>' => {
                self.advance();
                if self.eat('=') { Token::Ge } else { Token::Gt }
            }
            '&' => {
                self.advance();
                if !self.eat('&') {
                    return Err(self.err("bitwise '&' is not supported, use '&&'"));
                }
                Token::AndAnd
            }
            '|' => {
                self.advance();
                if !self.eat('|') {
                    return Err(self.err("bitwise '|' is not supported, use '||'"));
                }
                Token::OrOr
            }
            '.' => {
                if matches!(self.peek_second(), Some(c) if c.is_ascii_digit()) {
                    self.lex_number()?
                } else {
                    self.advance();
                    Token::Dot
                }
            }
            '"' | '\'' => self.lex_string(ch)?,
            '#' => self.lex_color()?,
            c if c.is_ascii_digit() => self.lex_number()?,
            c if c.is_alphabetic() || c == '_' || c == '$' => self.lex_ident_or_keyword(),
            other => return Err(self.err(format!("unexpected character {other:?}"))),
        };
        Ok(tok)
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, ParseError> {
        self.advance(); // consume opening quote
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(self.err("unterminated string literal")),
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => return Err(self.err("unterminated escape sequence")),
                },
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }

    fn lex_color(&mut self) -> Result<Token, ParseError> {
        self.advance(); // consume `#`
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            self.advance();
        }
        let hex = &self.src[start..self.pos];
        parse_hex_color(hex)
            .map(Token::Color)
            .ok_or_else(|| {
                self.err(format!(
                    "color literal must be #rgb, #rrggbb or #rrggbbaa, got {} digits",
                    hex.len()
                ))
            })
    }

    fn lex_number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let s = &self.src[start..self.pos];
        s.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.err(format!("invalid number {s:?}")))
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '$') {
            self.advance();
        }
        let word = &self.src[start..self.pos];
        match word {
            "true" => Token::True,
            "false" => Token::False,
            "null" | "undefined" => Token::Null,
            "new" => Token::New,
            "return" => Token::Return,
            _ => Token::Ident(word.to_string()),
        }
    }
}

/// Parses the digits of a hex color (without `#`) into straight-alpha RGBA bytes.
///
/// Accepts 3 (`rgb`), 6 (`rrggbb`) or 8 (`rrggbbaa`) hex digits.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 4]> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let d = c.to_digit(16)? as u8;
                out[i] = d * 16 + d;
            }
            Some(out)
        }
        6 => Some([byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, 255]),
        8 => Some([
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            byte(&hex[6..8])?,
        ]),
        _ => None,
    }
}
