//! Tokenizer for the block-structured script format.
//!
//! Produces a flat stream of [`Token`]s with byte spans and line numbers.
//! [`Lexer`] yields every token including comments; [`tokenize`] filters
//! comments and stops at the first [`LexError`], keeping everything lexed
//! before it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// Assignment and comparison operators. Comparisons only appear inside
/// trigger-like blocks, which the record builder keeps opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Assign => "=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a token, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    String,
    Number,
    Identifier,
    Variable,
    Boolean,
    LBrace,
    RBrace,
    Equals,
    Operator,
    Comment,
    EndOfInput,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Identifier => "identifier",
            TokenKind::Variable => "variable",
            TokenKind::Boolean => "boolean",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Equals => "'='",
            TokenKind::Operator => "comparison operator",
            TokenKind::Comment => "comment",
            TokenKind::EndOfInput => "end of input",
        };
        f.write_str(name)
    }
}

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// Quoted string with escapes decoded.
    Str(String),
    Number(f64),
    Ident(String),
    /// Variable reference, stored without the leading `@`.
    Variable(String),
    Bool(bool),
    LBrace,
    RBrace,
    Op(Operator),
    /// Comment text after the `#`.
    Comment(String),
}

/// A single token with its byte span in the source and 1-based line.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: TokenValue,
    pub span: Range<usize>,
    pub line: u32,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match &self.value {
            TokenValue::Str(_) => TokenKind::String,
            TokenValue::Number(_) => TokenKind::Number,
            TokenValue::Ident(_) => TokenKind::Identifier,
            TokenValue::Variable(_) => TokenKind::Variable,
            TokenValue::Bool(_) => TokenKind::Boolean,
            TokenValue::LBrace => TokenKind::LBrace,
            TokenValue::RBrace => TokenKind::RBrace,
            TokenValue::Op(Operator::Assign) => TokenKind::Equals,
            TokenValue::Op(_) => TokenKind::Operator,
            TokenValue::Comment(_) => TokenKind::Comment,
        }
    }

    /// The raw source text this token was lexed from.
    pub fn raw<'a>(&self, src: &'a str) -> &'a str {
        src.get(self.span.clone()).unwrap_or("")
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.value,
            TokenValue::Str(_)
                | TokenValue::Number(_)
                | TokenValue::Ident(_)
                | TokenValue::Variable(_)
                | TokenValue::Bool(_)
        )
    }

    pub fn operator(&self) -> Option<Operator> {
        match self.value {
            TokenValue::Op(op) => Some(op),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Tokenizer failure. Fatal for the rest of the file only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string starting at line {line} (byte {offset})")]
    UnterminatedString { offset: usize, line: u32 },

    #[error("illegal character {ch:?} at line {line} (byte {offset})")]
    IllegalCharacter { ch: char, offset: usize, line: u32 },
}

impl LexError {
    pub fn line(&self) -> u32 {
        match self {
            LexError::UnterminatedString { line, .. } | LexError::IllegalCharacter { line, .. } => {
                *line
            }
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            LexError::UnterminatedString { offset, .. }
            | LexError::IllegalCharacter { offset, .. } => *offset,
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

const BOM: char = '\u{feff}';

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Streaming tokenizer. Yields `Err` once and then stops.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        let pos = if src.starts_with(BOM) { BOM.len_utf8() } else { 0 };
        Self {
            src,
            pos,
            line: 1,
            failed: false,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || c == BOM {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, value: TokenValue, start: usize, line: u32) -> Token {
        Token {
            value,
            span: start..self.pos,
            line,
        }
    }

    fn lex_comment(&mut self, start: usize, line: u32) -> Token {
        // Skip '#'.
        self.bump();
        let text_start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
        let text = self.src[text_start..self.pos].trim().to_string();
        self.token(TokenValue::Comment(text), start, line)
    }

    fn lex_string(&mut self, start: usize, line: u32) -> Result<Token, LexError> {
        // Skip opening quote.
        self.bump();
        let mut decoded = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedString {
                        offset: start,
                        line,
                    });
                }
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('"') => decoded.push('"'),
                    Some('\\') => decoded.push('\\'),
                    Some('\n') | None => {
                        return Err(LexError::UnterminatedString {
                            offset: start,
                            line,
                        });
                    }
                    Some(other) => {
                        decoded.push('\\');
                        decoded.push(other);
                    }
                },
                Some(c) => decoded.push(c),
            }
        }
        Ok(self.token(TokenValue::Str(decoded), start, line))
    }

    fn lex_word(&mut self, start: usize, line: u32) -> Token {
        while let Some(c) = self.peek_char() {
            if is_word_char(c) {
                self.bump();
            } else {
                break;
            }
        }
        let raw = &self.src[start..self.pos];
        let value = match raw {
            "yes" => TokenValue::Bool(true),
            "no" => TokenValue::Bool(false),
            _ => match parse_number(raw) {
                Some(n) => TokenValue::Number(n),
                None => TokenValue::Ident(raw.to_string()),
            },
        };
        self.token(value, start, line)
    }

    fn lex_variable(&mut self, start: usize, line: u32) -> Result<Token, LexError> {
        // Skip '@'.
        self.bump();
        let name_start = self.pos;
        while let Some(c) = self.peek_char() {
            if is_word_char(c) {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == name_start {
            return Err(LexError::IllegalCharacter {
                ch: '@',
                offset: start,
                line,
            });
        }
        let name = self.src[name_start..self.pos].to_string();
        Ok(self.token(TokenValue::Variable(name), start, line))
    }

    fn lex_operator(&mut self, first: char, start: usize, line: u32) -> Result<Token, LexError> {
        self.bump();
        let followed_by_eq = self.peek_char() == Some('=');
        let op = match (first, followed_by_eq) {
            ('=', true) => Operator::Equal,
            ('=', false) => Operator::Assign,
            ('<', true) => Operator::LessEqual,
            ('<', false) => Operator::Less,
            ('>', true) => Operator::GreaterEqual,
            ('>', false) => Operator::Greater,
            ('!', true) => Operator::NotEqual,
            _ => {
                return Err(LexError::IllegalCharacter {
                    ch: first,
                    offset: start,
                    line,
                });
            }
        };
        if followed_by_eq {
            self.bump();
        }
        Ok(self.token(TokenValue::Op(op), start, line))
    }

    fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        self.skip_whitespace();
        let start = self.pos;
        let line = self.line;
        let c = self.peek_char()?;

        let result = match c {
            '#' => Ok(self.lex_comment(start, line)),
            '"' => self.lex_string(start, line),
            '{' => {
                self.bump();
                Ok(self.token(TokenValue::LBrace, start, line))
            }
            '}' => {
                self.bump();
                Ok(self.token(TokenValue::RBrace, start, line))
            }
            '@' => self.lex_variable(start, line),
            '=' | '<' | '>' | '!' => self.lex_operator(c, start, line),
            c if is_word_char(c) => Ok(self.lex_word(start, line)),
            '+' if self.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                // Leading '+' on a number; drop it from the word.
                self.bump();
                let mut token = self.lex_word(start + 1, line);
                token.span = start..self.pos;
                Ok(token)
            }
            other => Err(LexError::IllegalCharacter {
                ch: other,
                offset: start,
                line,
            }),
        };
        Some(result)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_token()?;
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}

/// Parse a bare word as a number. Only words that start like a number
/// qualify, so `inf`, `nan` and `e5` stay identifiers.
fn parse_number(raw: &str) -> Option<f64> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let first = digits.chars().next()?;
    if !(first.is_ascii_digit() || (first == '.' && digits.len() > 1)) {
        return None;
    }
    raw.parse::<f64>().ok().filter(|n| n.is_finite())
}

// ---------------------------------------------------------------------------
// Batch tokenization
// ---------------------------------------------------------------------------

/// Result of tokenizing a whole file: every token before the first error,
/// comments removed, plus the error if one occurred.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub error: Option<LexError>,
}

pub fn tokenize(src: &str) -> Lexed {
    let mut lexed = Lexed::default();
    for item in Lexer::new(src) {
        match item {
            Ok(token) if token.kind() == TokenKind::Comment => {}
            Ok(token) => lexed.tokens.push(token),
            Err(e) => {
                lexed.error = Some(e);
                break;
            }
        }
    }
    lexed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(src: &str) -> Vec<TokenValue> {
        tokenize(src).tokens.into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn tokenizes_simple_statement() {
        assert_eq!(
            values("area = physics"),
            vec![
                TokenValue::Ident("area".into()),
                TokenValue::Op(Operator::Assign),
                TokenValue::Ident("physics".into()),
            ]
        );
    }

    #[test]
    fn numbers_signed_and_decimal() {
        assert_eq!(
            values("-5 1.25 +3 .5"),
            vec![
                TokenValue::Number(-5.0),
                TokenValue::Number(1.25),
                TokenValue::Number(3.0),
                TokenValue::Number(0.5),
            ]
        );
    }

    #[test]
    fn dotted_dates_and_names_stay_identifiers() {
        assert_eq!(
            values("2200.1.1 tech_lasers_1 inf"),
            vec![
                TokenValue::Ident("2200.1.1".into()),
                TokenValue::Ident("tech_lasers_1".into()),
                TokenValue::Ident("inf".into()),
            ]
        );
    }

    #[test]
    fn keywords_and_variables() {
        assert_eq!(
            values("is_rare = yes start_tech = no cost = @tier1cost2"),
            vec![
                TokenValue::Ident("is_rare".into()),
                TokenValue::Op(Operator::Assign),
                TokenValue::Bool(true),
                TokenValue::Ident("start_tech".into()),
                TokenValue::Op(Operator::Assign),
                TokenValue::Bool(false),
                TokenValue::Ident("cost".into()),
                TokenValue::Op(Operator::Assign),
                TokenValue::Variable("tier1cost2".into()),
            ]
        );
    }

    #[test]
    fn comparison_operators() {
        assert_eq!(
            values("a < 1 b >= 2 c != 3 d == 4"),
            vec![
                TokenValue::Ident("a".into()),
                TokenValue::Op(Operator::Less),
                TokenValue::Number(1.0),
                TokenValue::Ident("b".into()),
                TokenValue::Op(Operator::GreaterEqual),
                TokenValue::Number(2.0),
                TokenValue::Ident("c".into()),
                TokenValue::Op(Operator::NotEqual),
                TokenValue::Number(3.0),
                TokenValue::Ident("d".into()),
                TokenValue::Op(Operator::Equal),
                TokenValue::Number(4.0),
            ]
        );
    }

    #[test]
    fn string_escapes_decoded() {
        let lexed = tokenize(r#"name = "say \"hi\" \\ ok""#);
        assert!(lexed.error.is_none());
        assert_eq!(
            lexed.tokens[2].value,
            TokenValue::Str(r#"say "hi" \ ok"#.into())
        );
    }

    #[test]
    fn braces_inside_strings_are_not_structure() {
        let kinds: Vec<TokenKind> = tokenize(r#"x = { "a}b{" }"#)
            .tokens
            .iter()
            .map(Token::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::LBrace,
                TokenKind::String,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn comments_are_filtered() {
        let src = "# header\na = 1 # trailing\n# another\nb = 2";
        assert_eq!(values(src).len(), 6);

        let with_comments: Vec<TokenKind> =
            Lexer::new(src).map(|t| t.unwrap().kind()).collect();
        assert_eq!(
            with_comments
                .iter()
                .filter(|k| **k == TokenKind::Comment)
                .count(),
            3
        );
    }

    #[test]
    fn bom_is_skipped() {
        let src = "\u{feff}a = 1";
        let lexed = tokenize(src);
        assert!(lexed.error.is_none());
        assert_eq!(lexed.tokens[0].value, TokenValue::Ident("a".into()));
        assert_eq!(lexed.tokens[0].raw(src), "a");
    }

    #[test]
    fn line_numbers_tracked() {
        let lexed = tokenize("a = 1\n\nb = {\n}\n");
        let lines: Vec<u32> = lexed.tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 1, 1, 3, 3, 3, 4]);
    }

    #[test]
    fn unterminated_string_keeps_prior_tokens() {
        let lexed = tokenize("a = 1\nb = \"oops\nc = 2");
        assert_eq!(lexed.tokens.len(), 5);
        assert_eq!(
            lexed.error,
            Some(LexError::UnterminatedString { offset: 10, line: 2 })
        );
    }

    #[test]
    fn unterminated_string_at_eof() {
        let lexed = tokenize("a = \"never closed");
        assert!(matches!(
            lexed.error,
            Some(LexError::UnterminatedString { line: 1, .. })
        ));
    }

    #[test]
    fn illegal_character_reported() {
        let lexed = tokenize("a = 1\nb = [2]");
        assert_eq!(lexed.tokens.len(), 5);
        assert_eq!(
            lexed.error,
            Some(LexError::IllegalCharacter {
                ch: '[',
                offset: 10,
                line: 2
            })
        );
    }

    #[test]
    fn bare_at_sign_is_illegal() {
        let lexed = tokenize("a = @ b");
        assert!(matches!(
            lexed.error,
            Some(LexError::IllegalCharacter { ch: '@', .. })
        ));
    }

    #[test]
    fn lexer_stops_after_error() {
        let items: Vec<_> = Lexer::new("a ; b c").collect();
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }

    #[test]
    fn lex_error_display() {
        let e = LexError::IllegalCharacter {
            ch: '[',
            offset: 4,
            line: 7,
        };
        let msg = format!("{e}");
        assert!(msg.contains("'['"));
        assert!(msg.contains("line 7"));
    }
}
