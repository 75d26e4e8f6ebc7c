//! Recursive-descent parser for the block grammar.
//!
//! ```text
//! document  := statement*
//! statement := key op value
//! value     := block | scalar+
//! block     := '{' statement* '}' | '{' scalar* '}'
//! ```
//!
//! Several scalars after an operator form an implicit array; the run ends
//! at the first scalar that is itself followed by an operator, since that
//! one keys the next statement.
//!
//! A malformed top-level entry is reported as a [`ParseError`] and skipped
//! with brace balancing; parsing resumes at the next top-level statement so
//! siblings in the same file survive. Blocks nested deeper than
//! [`MAX_NESTING`] are a [`ParseErrorKind::TooDeep`] error for their entry.

use crate::lexer::{LexError, Operator, Token, TokenKind, TokenValue, tokenize};
use crate::value::{ParseValue, Scalar, Statement, format_number};
use crate::variables::VariableTable;

/// Deepest block nesting accepted within one top-level entry.
pub const MAX_NESTING: usize = 256;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: TokenKind,
    },

    #[error("expected {expected}, found end of input")]
    UnexpectedEof { expected: &'static str },

    #[error("block mixes keyed statements and bare values")]
    MixedBlock,

    #[error("blocks nested deeper than {limit}")]
    TooDeep { limit: usize },
}

/// A structural error at an approximate token offset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line} (token {offset}): {kind}")]
pub struct ParseError {
    /// Index into the token stream where the error was detected.
    pub offset: usize,
    pub line: u32,
    pub kind: ParseErrorKind,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A parsed file: surviving top-level statements plus everything that went
/// wrong on the way.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub statements: Vec<Statement>,
    pub parse_errors: Vec<ParseError>,
    pub lex_error: Option<LexError>,
}

impl Document {
    pub fn is_clean(&self) -> bool {
        self.parse_errors.is_empty() && self.lex_error.is_none()
    }

    /// Variables declared anywhere at the top level of this document.
    pub fn variables(&self) -> VariableTable {
        VariableTable::from_statements(&self.statements)
    }

    /// Top-level statements that are not variable declarations.
    pub fn entries(&self) -> impl Iterator<Item = &Statement> {
        self.statements
            .iter()
            .filter(|s| !s.is_variable_declaration())
    }
}

/// Tokenize and parse a whole source text.
pub fn parse_document(src: &str) -> Document {
    let lexed = tokenize(src);
    let (statements, parse_errors) = parse_tokens(&lexed.tokens);
    Document {
        statements,
        parse_errors,
        lex_error: lexed.error,
    }
}

/// Parse an already tokenized (comment-free) stream.
pub fn parse_tokens(tokens: &[Token]) -> (Vec<Statement>, Vec<ParseError>) {
    Parser::new(tokens).parse_all()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Blocks currently open.
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn current_line(&self) -> u32 {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            offset: self.pos,
            line: self.current_line(),
            kind,
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            Some(token) => self.error(ParseErrorKind::UnexpectedToken {
                expected,
                found: token.kind(),
            }),
            None => self.error(ParseErrorKind::UnexpectedEof { expected }),
        }
    }

    fn parse_all(mut self) -> (Vec<Statement>, Vec<ParseError>) {
        let mut statements = Vec::new();
        let mut errors = Vec::new();

        while self.pos < self.tokens.len() {
            let start = self.pos;
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    tracing::debug!(
                        line = e.line,
                        offset = e.offset,
                        "skipping malformed entry: {}",
                        e.kind
                    );
                    errors.push(e);
                    self.recover(start);
                }
            }
        }

        (statements, errors)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let offset = self.pos;
        let Some(key_token) = self.peek() else {
            return Err(self.unexpected("statement key"));
        };
        let key = match &key_token.value {
            TokenValue::Ident(s) | TokenValue::Str(s) => s.clone(),
            TokenValue::Variable(name) => format!("@{name}"),
            TokenValue::Number(n) => format_number(*n),
            TokenValue::Bool(true) => "yes".to_string(),
            TokenValue::Bool(false) => "no".to_string(),
            _ => return Err(self.unexpected("statement key")),
        };
        self.advance();

        let op = match self.peek().and_then(Token::operator) {
            Some(op) => {
                self.advance();
                op
            }
            None => return Err(self.unexpected("'=' or comparison operator")),
        };

        let value = self.parse_value()?;
        Ok(Statement {
            key,
            op,
            value,
            line: key_token.line,
            offset,
        })
    }

    fn parse_value(&mut self) -> Result<ParseValue, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("value"));
        };
        if token.value == TokenValue::LBrace {
            if self.depth >= MAX_NESTING {
                return Err(self.error(ParseErrorKind::TooDeep { limit: MAX_NESTING }));
            }
            self.advance();
            self.depth += 1;
            let block = self.parse_block();
            self.depth -= 1;
            return block;
        }

        let Some(first) = scalar_of(token) else {
            return Err(self.unexpected("value"));
        };
        self.advance();

        let mut rest = Vec::new();
        while let Some(token) = self.peek() {
            if self.peek_at(1).is_some_and(|next| next.operator().is_some()) {
                break;
            }
            let Some(scalar) = scalar_of(token) else {
                break;
            };
            self.advance();
            rest.push(scalar);
        }

        if rest.is_empty() {
            Ok(ParseValue::Scalar(first))
        } else {
            rest.insert(0, first);
            Ok(ParseValue::Array(rest))
        }
    }

    /// Parse block contents after the opening brace, through the closing one.
    fn parse_block(&mut self) -> Result<ParseValue, ParseError> {
        let mut statements = Vec::new();
        let mut items = Vec::new();

        loop {
            let Some(token) = self.peek() else {
                return Err(self.unexpected("'}'"));
            };
            if token.value == TokenValue::RBrace {
                self.advance();
                break;
            }

            let keyed = self
                .peek_at(1)
                .is_some_and(|next| next.operator().is_some());
            if keyed {
                statements.push(self.parse_statement()?);
            } else if let Some(scalar) = scalar_of(token) {
                self.advance();
                items.push(scalar);
            } else {
                return Err(self.unexpected("statement or value"));
            }

            if !statements.is_empty() && !items.is_empty() {
                return Err(self.error(ParseErrorKind::MixedBlock));
            }
        }

        if items.is_empty() {
            Ok(ParseValue::Block(statements))
        } else {
            Ok(ParseValue::Array(items))
        }
    }

    /// Skip the broken top-level entry that started at `start`: its key, the
    /// operator and a whole balanced block if one opens there.
    fn recover(&mut self, start: usize) {
        self.pos = start;
        let Some(first) = self.peek() else {
            return;
        };

        if first.value == TokenValue::LBrace {
            self.skip_balanced();
            return;
        }

        self.advance();
        if self.peek().and_then(Token::operator).is_none() {
            return;
        }
        self.advance();

        match self.peek() {
            Some(t) if t.value == TokenValue::LBrace => self.skip_balanced(),
            Some(t) if t.is_scalar() => {
                self.advance();
            }
            _ => {}
        }
    }

    /// Skip from an opening brace to just past its matching close brace, or
    /// to the end of input.
    fn skip_balanced(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.advance() {
            match token.value {
                TokenValue::LBrace => depth += 1,
                TokenValue::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }
}

fn scalar_of(token: &Token) -> Option<Scalar> {
    match &token.value {
        TokenValue::Str(s) => Some(Scalar::String(s.clone())),
        TokenValue::Number(n) => Some(Scalar::Number(*n)),
        TokenValue::Ident(s) => Some(Scalar::Identifier(s.clone())),
        TokenValue::Variable(name) => Some(Scalar::Variable(name.clone())),
        TokenValue::Bool(b) => Some(Scalar::Boolean(*b)),
        _ => None,
    }
}

/// `true` when `op` assigns rather than compares.
pub fn is_assignment(op: Operator) -> bool {
    op == Operator::Assign
}
