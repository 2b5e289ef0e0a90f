//! Assembler front-end and file utilities for eQASM programs.
//!
//! Turns eQASM source text into the instruction list consumed by
//! `cactus_core::Processor::upload_program`, and reads the raw data-memory
//! images that can be preloaded before a run. Lexical errors are fatal and
//! abort a parse; syntax errors are collected per line so that one bad line
//! does not hide the diagnostics of the rest of the file.

use thiserror::Error;

/// Tokenizer for eQASM source text.
///
/// Produces a restartable stream of line/column tagged tokens from
/// lower-cased source. Integer literals are decoded and register sigils
/// (`r`, `s`, `t`, `q`, `f`) are split from their index at lex time.
pub mod lexer;

/// Recursive-descent parser for the eQASM grammar.
///
/// Expands pseudo-instructions, attaches labels to the instruction that
/// follows them and recovers from syntax errors at line granularity.
pub mod parser;

/// File loading utilities for program sources, listings and memory images.
pub mod loader;

pub use parser::{ParseOutcome, parse};

/// Fatal lexical errors. A parse that hits one produces no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("line {line}, column {col}: illegal character '{ch}'")]
    IllegalCharacter { ch: char, line: usize, col: usize },

    #[error("line {line}, column {col}: literal '{text}' does not fit in 64 bits")]
    IntegerOverflow { text: String, line: usize, col: usize },
}

/// A recoverable syntax diagnostic for one source line.
///
/// The parser skips the rest of the offending line and continues, so a
/// source can yield several of these. Any diagnostic marks the whole
/// parse as failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}, found {found}")]
pub struct SyntaxError {
    pub line: usize,
    /// The offending token as written, or `end of input`.
    pub found: String,
    pub message: String,
}
