//! Statement extraction and normalization
//!
//! Finds method, constructor and initializer bodies in a token stream, then
//! walks their statements with a small recursive-descent parser. Every
//! statement (nested ones included) becomes a label sequence
//! `[Kind, token, token, ...]` spanning its whole source text, together with
//! its source range and the range of the enclosing method.

use crate::error::{Result, TrieError};
use crate::index::types::Position;
use crate::syntax::lexer::{Token, TokenKind, lex};
use rustc_hash::FxHashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmtKind {
    Assert,
    Block,
    Break,
    Continue,
    Do,
    Empty,
    ExplicitConstructorInvocation,
    Expression,
    ForEach,
    For,
    If,
    Labeled,
    LocalClassDeclaration,
    Return,
    Switch,
    Synchronized,
    Throw,
    Try,
    While,
    Yield,
}

impl StmtKind {
    pub fn label(&self) -> &'static str {
        match self {
            StmtKind::Assert => "AssertStmt",
            StmtKind::Block => "BlockStmt",
            StmtKind::Break => "BreakStmt",
            StmtKind::Continue => "ContinueStmt",
            StmtKind::Do => "DoStmt",
            StmtKind::Empty => "EmptyStmt",
            StmtKind::ExplicitConstructorInvocation => "ExplicitConstructorInvocationStmt",
            StmtKind::Expression => "ExpressionStmt",
            StmtKind::ForEach => "ForEachStmt",
            StmtKind::For => "ForStmt",
            StmtKind::If => "IfStmt",
            StmtKind::Labeled => "LabeledStmt",
            StmtKind::LocalClassDeclaration => "LocalClassDeclarationStmt",
            StmtKind::Return => "ReturnStmt",
            StmtKind::Switch => "SwitchStmt",
            StmtKind::Synchronized => "SynchronizedStmt",
            StmtKind::Throw => "ThrowStmt",
            StmtKind::Try => "TryStmt",
            StmtKind::While => "WhileStmt",
            StmtKind::Yield => "YieldStmt",
        }
    }
}

impl fmt::Display for StmtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalization switches
#[derive(Debug, Clone, Copy)]
pub struct SyntaxOptions {
    /// Replace local identifiers with `$0, $1, ...`
    pub rename_identifiers: bool,
}

impl Default for SyntaxOptions {
    fn default() -> Self {
        Self {
            rename_identifiers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StmtKind,
    pub labels: Vec<String>,
    pub start: Position,
    pub end: Position,
    pub method_start: Position,
    pub method_end: Position,
}

/// Statements of one source file
#[derive(Debug, Default)]
pub struct FileStatements {
    pub statements: Vec<Statement>,
    /// `(prev, next)` indices into `statements` for consecutive statements
    pub next: Vec<(usize, usize)>,
}

/// A parsed statement before normalization: token range `[first, last]`
#[derive(Debug, Clone, Copy)]
struct Span {
    kind: StmtKind,
    first: usize,
    last: usize,
}

/// Deepest statement nesting accepted before a file is rejected
const MAX_NESTING: usize = 256;

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
    spans: Vec<Span>,
    pairs: Vec<(usize, usize)>,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token], pos: usize) -> Self {
        Self {
            tokens,
            pos,
            depth: 0,
            spans: Vec::new(),
            pairs: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn at_op(&self, op: &str) -> bool {
        self.peek().is_some_and(|t| t.is_op(op))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn error(&self, message: impl Into<String>) -> TrieError {
        let at = match self.peek().or_else(|| self.tokens.last()) {
            Some(token) => token.start,
            None => Position::new(1, 1),
        };
        TrieError::Syntax {
            line: at.line,
            column: at.column,
            message: message.into(),
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<usize> {
        if self.at_op(op) {
            self.pos += 1;
            Ok(self.pos - 1)
        } else {
            Err(self.error(format!("expected `{}`", op)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<usize> {
        if self.at_keyword(keyword) {
            self.pos += 1;
            Ok(self.pos - 1)
        } else {
            Err(self.error(format!("expected `{}`", keyword)))
        }
    }

    /// Skip a balanced `open ... close` group starting at the current token;
    /// returns the index of the closing token
    fn skip_group(&mut self, open: &str, close: &str) -> Result<usize> {
        self.expect_op(open)?;
        let mut depth = 1usize;
        while let Some(token) = self.peek() {
            self.pos += 1;
            if token.is_op(open) {
                depth += 1;
            } else if token.is_op(close) {
                depth -= 1;
                if depth == 0 {
                    return Ok(self.pos - 1);
                }
            }
        }
        Err(self.error(format!("unbalanced `{}`", open)))
    }

    /// Consume tokens up to and including a `;` outside any bracket
    fn skip_to_semicolon(&mut self) -> Result<usize> {
        let mut depth = 0i32;
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::Op {
                match token.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth -= 1;
                        if depth < 0 {
                            return Err(self.error("expected `;`"));
                        }
                    }
                    ";" if depth == 0 => {
                        self.pos += 1;
                        return Ok(self.pos - 1);
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
        Err(self.error("expected `;`"))
    }

    fn push(&mut self, kind: StmtKind, first: usize, last: usize) -> usize {
        self.spans.push(Span { kind, first, last });
        self.spans.len() - 1
    }

    /// Statements up to the `}` closing the block whose `{` was consumed
    fn block_body(&mut self) -> Result<usize> {
        let mut prev = None;
        loop {
            match self.peek() {
                None => return Err(self.error("unclosed block")),
                Some(token) if token.is_op("}") => {
                    self.pos += 1;
                    return Ok(self.pos - 1);
                }
                Some(_) => {
                    let stmt = self.statement()?;
                    self.link(&mut prev, stmt);
                }
            }
        }
    }

    fn link(&mut self, prev: &mut Option<usize>, stmt: usize) {
        if let Some(p) = prev.replace(stmt) {
            self.pairs.push((p, stmt));
        }
    }

    fn block(&mut self) -> Result<usize> {
        let first = self.expect_op("{")?;
        let last = self.block_body()?;
        Ok(self.push(StmtKind::Block, first, last))
    }

    fn statement(&mut self) -> Result<usize> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("statement nesting too deep"));
        }
        self.depth += 1;
        let result = self.nested_statement();
        self.depth -= 1;
        result
    }

    fn nested_statement(&mut self) -> Result<usize> {
        let first = self.pos;
        let Some(token) = self.peek() else {
            return Err(self.error("expected statement"));
        };

        if token.kind == TokenKind::Op {
            return match token.text.as_str() {
                "{" => self.block(),
                ";" => {
                    self.pos += 1;
                    Ok(self.push(StmtKind::Empty, first, first))
                }
                _ => self.simple(StmtKind::Expression, first),
            };
        }

        match token.text.as_str() {
            "if" if token.kind == TokenKind::Keyword => {
                self.pos += 1;
                self.skip_group("(", ")")?;
                self.statement()?;
                if self.at_keyword("else") {
                    self.pos += 1;
                    self.statement()?;
                }
                Ok(self.push(StmtKind::If, first, self.pos - 1))
            }
            "while" if token.kind == TokenKind::Keyword => {
                self.pos += 1;
                self.skip_group("(", ")")?;
                self.statement()?;
                Ok(self.push(StmtKind::While, first, self.pos - 1))
            }
            "do" if token.kind == TokenKind::Keyword => {
                self.pos += 1;
                self.statement()?;
                self.expect_keyword("while")?;
                self.skip_group("(", ")")?;
                let last = self.expect_op(";")?;
                Ok(self.push(StmtKind::Do, first, last))
            }
            "for" if token.kind == TokenKind::Keyword => {
                self.pos += 1;
                let open = self.pos;
                let close = self.skip_group("(", ")")?;
                let kind = if self.is_foreach_header(open, close) {
                    StmtKind::ForEach
                } else {
                    StmtKind::For
                };
                self.statement()?;
                Ok(self.push(kind, first, self.pos - 1))
            }
            "try" if token.kind == TokenKind::Keyword => {
                self.pos += 1;
                if self.at_op("(") {
                    self.skip_group("(", ")")?;
                }
                self.block()?;
                while self.at_keyword("catch") {
                    self.pos += 1;
                    self.skip_group("(", ")")?;
                    self.block()?;
                }
                if self.at_keyword("finally") {
                    self.pos += 1;
                    self.block()?;
                }
                Ok(self.push(StmtKind::Try, first, self.pos - 1))
            }
            "switch" if token.kind == TokenKind::Keyword => {
                self.pos += 1;
                self.skip_group("(", ")")?;
                let last = self.switch_body()?;
                Ok(self.push(StmtKind::Switch, first, last))
            }
            "synchronized" if token.kind == TokenKind::Keyword => {
                self.pos += 1;
                self.skip_group("(", ")")?;
                self.block()?;
                Ok(self.push(StmtKind::Synchronized, first, self.pos - 1))
            }
            "return" if token.kind == TokenKind::Keyword => self.simple(StmtKind::Return, first),
            "throw" if token.kind == TokenKind::Keyword => self.simple(StmtKind::Throw, first),
            "break" if token.kind == TokenKind::Keyword => self.simple(StmtKind::Break, first),
            "continue" if token.kind == TokenKind::Keyword => self.simple(StmtKind::Continue, first),
            "assert" if token.kind == TokenKind::Keyword => self.simple(StmtKind::Assert, first),
            "this" | "super"
                if token.kind == TokenKind::Keyword && self.peek_at(1).is_some_and(|t| t.is_op("(")) =>
            {
                self.simple(StmtKind::ExplicitConstructorInvocation, first)
            }
            "yield" if token.kind == TokenKind::Ident && self.starts_yield() => {
                self.simple(StmtKind::Yield, first)
            }
            _ if token.kind == TokenKind::Ident && self.peek_at(1).is_some_and(|t| t.is_op(":")) => {
                self.pos += 2;
                self.statement()?;
                Ok(self.push(StmtKind::Labeled, first, self.pos - 1))
            }
            _ if self.starts_local_class() => {
                while !self.at_op("{") {
                    if self.peek().is_none() {
                        return Err(self.error("expected class body"));
                    }
                    if self.at_op("(") {
                        self.skip_group("(", ")")?;
                    } else {
                        self.pos += 1;
                    }
                }
                let last = self.skip_group("{", "}")?;
                Ok(self.push(StmtKind::LocalClassDeclaration, first, last))
            }
            _ => self.simple(StmtKind::Expression, first),
        }
    }

    /// A statement ending at the next top-level `;`
    fn simple(&mut self, kind: StmtKind, first: usize) -> Result<usize> {
        let last = self.skip_to_semicolon()?;
        Ok(self.push(kind, first, last))
    }

    fn is_foreach_header(&self, open: usize, close: usize) -> bool {
        let mut depth = 0i32;
        for token in &self.tokens[open + 1..close] {
            if token.kind != TokenKind::Op {
                continue;
            }
            match token.text.as_str() {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth -= 1,
                ";" if depth == 0 => return false,
                ":" if depth == 0 => return true,
                _ => {}
            }
        }
        false
    }

    fn starts_yield(&self) -> bool {
        match self.peek_at(1) {
            Some(next) => match next.kind {
                TokenKind::Ident | TokenKind::Keyword | TokenKind::Literal => true,
                TokenKind::Op => matches!(next.text.as_str(), "(" | "-" | "!" | "~" | "+"),
            },
            None => false,
        }
    }

    fn starts_local_class(&self) -> bool {
        let mut i = self.pos;
        while let Some(token) = self.tokens.get(i) {
            match (token.kind, token.text.as_str()) {
                (TokenKind::Keyword, "final" | "abstract" | "static" | "strictfp") => i += 1,
                (TokenKind::Op, "@") => {
                    // Annotation name, then optional arguments
                    i += 2;
                    if self.tokens.get(i).is_some_and(|t| t.is_op("(")) {
                        let mut depth = 0i32;
                        while let Some(t) = self.tokens.get(i) {
                            i += 1;
                            if t.is_op("(") {
                                depth += 1;
                            } else if t.is_op(")") {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                        }
                    }
                }
                (TokenKind::Keyword, "class" | "interface" | "enum") => return true,
                (TokenKind::Ident, "record") => {
                    return self.tokens.get(i + 1).is_some_and(|t| t.kind == TokenKind::Ident)
                        && self.tokens.get(i + 2).is_some_and(|t| t.is_op("(") || t.is_op("<"));
                }
                _ => return false,
            }
        }
        false
    }

    /// `{ case ...: stmts  default -> stmt }`; returns the index of the closing `}`
    fn switch_body(&mut self) -> Result<usize> {
        self.expect_op("{")?;
        loop {
            match self.peek() {
                None => return Err(self.error("unclosed switch")),
                Some(token) if token.is_op("}") => {
                    self.pos += 1;
                    return Ok(self.pos - 1);
                }
                Some(token) if token.is_keyword("case") || token.is_keyword("default") => {
                    if self.switch_label()? {
                        self.statement()?;
                    } else {
                        let mut prev = None;
                        while let Some(token) = self.peek() {
                            if token.is_op("}") || token.is_keyword("case") || token.is_keyword("default") {
                                break;
                            }
                            let stmt = self.statement()?;
                            self.link(&mut prev, stmt);
                        }
                    }
                }
                Some(_) => return Err(self.error("expected `case` or `default`")),
            }
        }
    }

    /// Consume a switch label; true for the arrow form
    fn switch_label(&mut self) -> Result<bool> {
        self.pos += 1;
        let mut depth = 0i32;
        while let Some(token) = self.peek() {
            self.pos += 1;
            if token.kind != TokenKind::Op {
                continue;
            }
            match token.text.as_str() {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth -= 1,
                ":" if depth == 0 => return Ok(false),
                "->" if depth == 0 => return Ok(true),
                _ => {}
            }
        }
        Err(self.error("unterminated switch label"))
    }
}

/// Normalize the tokens of one statement into labels
fn normalize(kind: StmtKind, tokens: &[Token], options: SyntaxOptions) -> Vec<String> {
    let mut labels = Vec::with_capacity(tokens.len() + 1);
    labels.push(kind.label().to_string());

    let mut names: FxHashMap<&str, usize> = FxHashMap::default();
    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Ident || !options.rename_identifiers || keeps_name(tokens, i) {
            labels.push(token.text.clone());
            continue;
        }
        let next = names.len();
        let id = *names.entry(token.text.as_str()).or_insert(next);
        labels.push(format!("${}", id));
    }
    labels
}

/// Method names, member selections and type-like names stay verbatim
fn keeps_name(tokens: &[Token], i: usize) -> bool {
    let followed_by_call = tokens.get(i + 1).is_some_and(|t| t.is_op("("));
    let selected = i > 0 && (tokens[i - 1].is_op(".") || tokens[i - 1].is_op("::"));
    let type_like = tokens[i].text.chars().next().is_some_and(char::is_uppercase);
    followed_by_call || selected || type_like
}

fn spans_to_statements(
    tokens: &[Token],
    spans: &[Span],
    method: (Position, Position),
    options: SyntaxOptions,
    out: &mut Vec<Statement>,
) {
    for span in spans {
        let slice = &tokens[span.first..=span.last];
        out.push(Statement {
            kind: span.kind,
            labels: normalize(span.kind, slice, options),
            start: tokens[span.first].start,
            end: tokens[span.last].end,
            method_start: method.0,
            method_end: method.1,
        });
    }
}

/// What an opening brace at member level introduces
#[derive(Debug, PartialEq, Eq)]
enum Opener {
    TypeBody,
    Body,
    Initializer,
}

/// Extract every statement of a source file
pub fn extract(tokens: &[Token], options: SyntaxOptions) -> Result<FileStatements> {
    let mut result = FileStatements::default();
    // true for type bodies (members expected), false for skipped groups
    let mut scopes: Vec<bool> = Vec::new();
    let mut decl_start = 0usize;
    let mut paren_depth = 0i32;
    let mut i = 0usize;

    while i < tokens.len() {
        let token = &tokens[i];
        let at_member_level = scopes.last().copied().unwrap_or(true);

        if !at_member_level {
            if token.is_op("{") {
                scopes.push(false);
            } else if token.is_op("}") {
                scopes.pop();
            }
            i += 1;
            continue;
        }

        if token.kind == TokenKind::Op {
            match token.text.as_str() {
                "(" => paren_depth += 1,
                ")" => paren_depth -= 1,
                ";" if paren_depth == 0 => decl_start = i + 1,
                "}" if paren_depth == 0 => {
                    scopes.pop();
                    decl_start = i + 1;
                }
                "{" if paren_depth == 0 => match classify_opener(&tokens[decl_start..i]) {
                    Opener::TypeBody => {
                        scopes.push(true);
                        decl_start = i + 1;
                    }
                    Opener::Initializer => scopes.push(false),
                    Opener::Body => {
                        let mut parser = Parser::new(tokens, i + 1);
                        let close = parser.block_body()?;
                        let method_start = tokens.get(decl_start).map_or(token.start, |t| t.start);
                        let method = (method_start, tokens[close].end);

                        let offset = result.statements.len();
                        spans_to_statements(tokens, &parser.spans, method, options, &mut result.statements);
                        result
                            .next
                            .extend(parser.pairs.iter().map(|&(a, b)| (a + offset, b + offset)));

                        i = close + 1;
                        decl_start = i;
                        continue;
                    }
                },
                _ => {}
            }
        }
        i += 1;
    }

    Ok(result)
}

fn classify_opener(decl: &[Token]) -> Opener {
    if decl.iter().any(|t| t.is_op("=")) {
        return Opener::Initializer;
    }
    let declares_type = decl.iter().enumerate().any(|(i, t)| {
        t.is_keyword("class")
            || t.is_keyword("interface")
            || t.is_keyword("enum")
            || (t.kind == TokenKind::Ident
                && t.text == "record"
                && decl.get(i + 1).is_some_and(|n| n.kind == TokenKind::Ident))
    });
    if declares_type {
        Opener::TypeBody
    } else {
        Opener::Body
    }
}

/// Lex and extract a whole source file
pub fn parse_source(src: &str, options: SyntaxOptions) -> Result<FileStatements> {
    let tokens = lex(src)?;
    extract(&tokens, options)
}

/// Label sequences of the top-level statements of a code snippet
pub fn parse_query(code: &str, options: SyntaxOptions) -> Result<Vec<Vec<String>>> {
    let tokens = lex(code)?;
    let mut parser = Parser::new(&tokens, 0);
    let mut top = Vec::new();
    while parser.peek().is_some() {
        top.push(parser.statement()?);
    }
    Ok(top
        .into_iter()
        .map(|idx| {
            let span = parser.spans[idx];
            normalize(span.kind, &tokens[span.first..=span.last], options)
        })
        .collect())
}
