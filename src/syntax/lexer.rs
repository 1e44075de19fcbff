//! Lexer for Java-like brace-language sources

use crate::error::{Result, TrieError};
use crate::index::types::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Literal,
    /// Operators and separators
    Op,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// First character
    pub start: Position,
    /// Last character (inclusive)
    pub end: Position,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }
}

const KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "package", "private", "protected", "public", "return", "short", "static",
    "strictfp", "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try",
    "void", "volatile", "while", "true", "false", "null", "var",
];

/// Longest operators first
const OPERATORS: &[&str] = &[
    ">>>=", "<<=", ">>=", ">>>", "...", "->", "::", "++", "--", "&&", "||", "==", "!=", "<=",
    ">=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "(", ")", "{", "}", "[",
    "]", ";", ",", ".", "@", "=", ">", "<", "!", "~", "?", ":", "+", "-", "*", "/", "&", "|",
    "^", "%",
];

struct Cursor {
    chars: Vec<char>,
    idx: usize,
    line: i32,
    column: i32,
}

impl Cursor {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            idx: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Consume one char, returning the position it occupied
    fn bump(&mut self) -> Option<(char, Position)> {
        let c = self.peek()?;
        let at = self.position();
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some((c, at))
    }

    fn error(&self, at: Position, message: &str) -> TrieError {
        TrieError::Syntax {
            line: at.line,
            column: at.column,
            message: message.to_string(),
        }
    }
}

/// Split `src` into tokens, dropping whitespace and comments
pub fn lex(src: &str) -> Result<Vec<Token>> {
    let mut cur = Cursor::new(src);
    let mut tokens = Vec::new();

    while let Some(c) = cur.peek() {
        let start = cur.position();

        if c.is_whitespace() {
            cur.bump();
            continue;
        }

        if cur.starts_with("//") {
            while let Some(c) = cur.peek() {
                if c == '\n' {
                    break;
                }
                cur.bump();
            }
            continue;
        }

        if cur.starts_with("/*") {
            cur.bump();
            cur.bump();
            loop {
                if cur.starts_with("*/") {
                    cur.bump();
                    cur.bump();
                    break;
                }
                if cur.bump().is_none() {
                    return Err(cur.error(start, "unterminated comment"));
                }
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let mut text = String::new();
            let mut end = start;
            while let Some(c) = cur.peek() {
                if !(c.is_alphanumeric() || c == '_' || c == '$') {
                    break;
                }
                if let Some((c, at)) = cur.bump() {
                    text.push(c);
                    end = at;
                }
            }
            let kind = if KEYWORDS.contains(&text.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            };
            tokens.push(Token { kind, text, start, end });
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && cur.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            tokens.push(lex_number(&mut cur, start));
            continue;
        }

        if cur.starts_with("\"\"\"") {
            tokens.push(lex_text_block(&mut cur, start)?);
            continue;
        }

        if c == '"' || c == '\'' {
            tokens.push(lex_quoted(&mut cur, start, c)?);
            continue;
        }

        let Some(op) = OPERATORS.iter().find(|op| cur.starts_with(op)) else {
            return Err(cur.error(start, &format!("unexpected character {:?}", c)));
        };
        let mut end = start;
        for _ in 0..op.len() {
            if let Some((_, at)) = cur.bump() {
                end = at;
            }
        }
        tokens.push(Token {
            kind: TokenKind::Op,
            text: op.to_string(),
            start,
            end,
        });
    }

    Ok(tokens)
}

fn lex_number(cur: &mut Cursor, start: Position) -> Token {
    let mut text = String::new();
    let mut end = start;
    while let Some(c) = cur.peek() {
        let exponent_sign = (c == '+' || c == '-')
            && text
                .chars()
                .last()
                .is_some_and(|p| matches!(p, 'e' | 'E' | 'p' | 'P'))
            && !text.starts_with("0x")
            && !text.starts_with("0X");
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign) {
            break;
        }
        // Second dot ends the literal
        if c == '.' && text.contains('.') {
            break;
        }
        if let Some((c, at)) = cur.bump() {
            text.push(c);
            end = at;
        }
    }
    Token {
        kind: TokenKind::Literal,
        text,
        start,
        end,
    }
}

fn lex_quoted(cur: &mut Cursor, start: Position, quote: char) -> Result<Token> {
    let mut text = String::new();
    if let Some((c, _)) = cur.bump() {
        text.push(c);
    }
    let end = loop {
        let Some((c, at)) = cur.bump() else {
            return Err(cur.error(start, "unterminated literal"));
        };
        if c == '\n' {
            return Err(cur.error(start, "unterminated literal"));
        }
        text.push(c);
        if c == '\\' {
            let Some((escaped, _)) = cur.bump() else {
                return Err(cur.error(start, "unterminated literal"));
            };
            text.push(escaped);
            continue;
        }
        if c == quote {
            break at;
        }
    };
    Ok(Token {
        kind: TokenKind::Literal,
        text,
        start,
        end,
    })
}

fn lex_text_block(cur: &mut Cursor, start: Position) -> Result<Token> {
    let mut text = String::new();
    let mut end = start;
    for _ in 0..3 {
        if let Some((c, _)) = cur.bump() {
            text.push(c);
        }
    }
    loop {
        if cur.starts_with("\"\"\"") {
            for _ in 0..3 {
                if let Some((c, at)) = cur.bump() {
                    text.push(c);
                    end = at;
                }
            }
            break;
        }
        let Some((c, at)) = cur.bump() else {
            return Err(cur.error(start, "unterminated text block"));
        };
        text.push(c);
        end = at;
        if c == '\\' {
            if let Some((escaped, at)) = cur.bump() {
                text.push(escaped);
                end = at;
            }
        }
    }
    Ok(Token {
        kind: TokenKind::Literal,
        text,
        start,
        end,
    })
}
