//! Techtree Script -- tokenizer and parser for the nested-block technology
//! definition language.
//!
//! ```text
//! @tier1cost1 = 480
//!
//! tech_lasers_1 = {
//!     area = physics
//!     tier = 1
//!     cost = @tier1cost1
//!     category = { particles }
//!     prerequisites = { "tech_physics_lab_1" }
//! }
//! ```
//!
//! # Pipeline
//!
//! 1. [`lexer::tokenize`] -- text to [`lexer::Token`]s, comments dropped.
//! 2. [`parser::parse_document`] -- tokens to a [`parser::Document`] of
//!    [`value::Statement`]s, with entry-level error recovery.
//! 3. [`variables::VariableTable`] -- whole-document `@variable`
//!    declarations, layered over shared tables by
//!    [`variables::VariableScope`].
//!
//! Everything here is a pure function of one file's text.

pub mod lexer;
pub mod parser;
pub mod value;
pub mod variables;

pub use lexer::{LexError, Operator, Token, TokenKind, TokenValue, tokenize};
pub use parser::{Document, ParseError, ParseErrorKind, parse_document};
pub use value::{ParseValue, Scalar, Statement};
pub use variables::{VariableScope, VariableTable};
