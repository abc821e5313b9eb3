use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Def,
    Extern,
    Ident(String),
    Number(f64),
    /// A run of digits and dots that is not a valid decimal, e.g. `1.2.3`
    MalformedNumber(String),
    Punct(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),
            Token::Def => write!(f, "'def'"),
            Token::Extern => write!(f, "'extern'"),
            Token::Ident(ident) => write!(f, "identifier '{}'", ident),
            Token::Number(num) => write!(f, "number {}", num),
            Token::MalformedNumber(text) => write!(f, "malformed number '{}'", text),
            Token::Punct(c) => write!(f, "'{}'", c),
        }
    }
}

lazy_static! {
    static ref IGNORE_RE: Regex = Regex::new(r"^(?:\s+|#[^\n]*)*").unwrap();
    static ref TOKEN_RE: Regex = Regex::new(
        &[
            r"^(?P<ident>[A-Za-z][A-Za-z0-9]*)",
            r"^(?P<number>[0-9.]+)",
            r"^(?P<punct>.)",
        ]
        .join("|")
    )
    .unwrap();
}

/// Pulls tokens out of a source string one at a time.
///
/// The only state carried between calls is the read position, so once the
/// input is exhausted every further call keeps returning [`Token::Eof`].
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    fn skip_ignored(&mut self) {
        if let Some(m) = IGNORE_RE.find(&self.input[self.pos..]) {
            self.pos += m.end();
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_ignored();

        let cap = match TOKEN_RE.captures(&self.input[self.pos..]) {
            Some(cap) => cap,
            None => return Token::Eof,
        };
        self.pos += cap[0].len();

        if let Some(ident) = cap.name("ident") {
            match ident.as_str() {
                "def" => Token::Def,
                "extern" => Token::Extern,
                other => Token::Ident(other.to_string()),
            }
        } else if let Some(number) = cap.name("number") {
            match number.as_str().parse() {
                Ok(num) => Token::Number(num),
                Err(_) => Token::MalformedNumber(number.as_str().to_string()),
            }
        } else if let Some(punct) = cap.name("punct") {
            punct.as_str().chars().next().map_or(Token::Eof, Token::Punct)
        } else {
            Token::Eof
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.next_token() {
            Token::Eof => None,
            tok => Some(tok),
        }
    }
}
