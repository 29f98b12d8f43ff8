//! Lexer: scans source text into tokens in a single linear pass.

use crate::error::ScriptError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Str(String),
    // keywords
    Fn,
    Let,
    If,
    Else,
    While,
    Return,
    Break,
    Continue,
    True,
    False,
    Nil,
    And,
    Or,
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Dot,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

pub struct Lexer<'a> {
    chunk_name: &'a str,
    bytes: &'a [u8],
    i: usize,
    line: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(chunk_name: &'a str, input: &'a str) -> Self {
        Self {
            chunk_name,
            bytes: input.as_bytes(),
            i: 0,
            line: 1,
            tokens: Vec::with_capacity(input.len() / 4 + 8),
        }
    }

    pub fn lex(mut self) -> Result<Vec<Token>, ScriptError> {
        while self.i < self.bytes.len() {
            let c = self.bytes[self.i];
            match c {
                b' ' | b'\t' | b'\r' => self.i += 1,
                b'\n' => {
                    self.line += 1;
                    self.i += 1;
                }
                b'#' => {
                    while self.i < self.bytes.len() && self.bytes[self.i] != b'\n' {
                        self.i += 1;
                    }
                }
                b'(' => self.push1(TokenKind::LParen),
                b')' => self.push1(TokenKind::RParen),
                b'{' => self.push1(TokenKind::LBrace),
                b'}' => self.push1(TokenKind::RBrace),
                b',' => self.push1(TokenKind::Comma),
                b';' => self.push1(TokenKind::Semi),
                b'.' => self.push1(TokenKind::Dot),
                b'+' => self.push1(TokenKind::Plus),
                b'-' => self.push1(TokenKind::Minus),
                b'*' => self.push1(TokenKind::Star),
                b'/' => self.push1(TokenKind::Slash),
                b'%' => self.push1(TokenKind::Percent),
                b'=' => self.push_cmp(TokenKind::Assign, TokenKind::EqEq),
                b'<' => self.push_cmp(TokenKind::Lt, TokenKind::Le),
                b'>' => self.push_cmp(TokenKind::Gt, TokenKind::Ge),
                b'!' => self.push_cmp(TokenKind::Bang, TokenKind::NotEq),
                b'"' => self.lex_string()?,
                b'0'..=b'9' => self.lex_int()?,
                c if c == b'_' || c.is_ascii_alphabetic() => self.lex_ident(),
                other => {
                    return Err(self.err(&format!(
                        "unexpected character '{}'",
                        (other as char).escape_default()
                    )));
                }
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
        });
        Ok(self.tokens)
    }

    fn err(&self, msg: &str) -> ScriptError {
        ScriptError::compile(self.chunk_name, self.line, msg)
    }

    fn push1(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
        self.i += 1;
    }

    /// Single-char token, or the two-char form when followed by '='.
    fn push_cmp(&mut self, single: TokenKind, with_eq: TokenKind) {
        let kind = if self.bytes.get(self.i + 1) == Some(&b'=') {
            self.i += 1;
            with_eq
        } else {
            single
        };
        self.push1(kind);
    }

    fn lex_int(&mut self) -> Result<(), ScriptError> {
        let start = self.i;
        while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
            self.i += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.i]).unwrap_or("");
        let value: i64 = text
            .parse()
            .map_err(|_| self.err("integer literal out of range"))?;
        self.tokens.push(Token {
            kind: TokenKind::Int(value),
            line: self.line,
        });
        Ok(())
    }

    fn lex_string(&mut self) -> Result<(), ScriptError> {
        let line = self.line;
        self.i += 1; // opening quote
        let mut out = String::new();
        loop {
            let Some(&c) = self.bytes.get(self.i) else {
                return Err(ScriptError::compile(
                    self.chunk_name,
                    line,
                    "unterminated string",
                ));
            };
            self.i += 1;
            match c {
                b'"' => break,
                b'\n' => {
                    return Err(ScriptError::compile(
                        self.chunk_name,
                        line,
                        "unterminated string",
                    ));
                }
                b'\\' => {
                    let Some(&esc) = self.bytes.get(self.i) else {
                        return Err(ScriptError::compile(
                            self.chunk_name,
                            line,
                            "unterminated string",
                        ));
                    };
                    self.i += 1;
                    match esc {
                        b'n' => out.push('\n'),
                        b't' => out.push('\t'),
                        b'\\' => out.push('\\'),
                        b'"' => out.push('"'),
                        other => {
                            return Err(self.err(&format!(
                                "invalid escape '\\{}'",
                                other as char
                            )));
                        }
                    }
                }
                _ => {
                    // re-scan the char at utf8 granularity
                    let start = self.i - 1;
                    let mut end = self.i;
                    while end < self.bytes.len() && (self.bytes[end] & 0xc0) == 0x80 {
                        end += 1;
                    }
                    match std::str::from_utf8(&self.bytes[start..end]) {
                        Ok(s) => out.push_str(s),
                        Err(_) => return Err(self.err("invalid utf-8 in string")),
                    }
                    self.i = end;
                }
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::Str(out),
            line,
        });
        Ok(())
    }

    fn lex_ident(&mut self) {
        let start = self.i;
        while self.i < self.bytes.len() {
            let c = self.bytes[self.i];
            if c == b'_' || c.is_ascii_alphanumeric() {
                self.i += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.i]).unwrap_or("");
        let kind = match text {
            "fn" => TokenKind::Fn,
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            _ => TokenKind::Ident(text.to_string()),
        };
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }
}
