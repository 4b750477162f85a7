#![allow(clippy::len_without_is_empty)]

use std::{error::Error, fmt, hash::Hash};

use glrgrammar::Span;
use num_traits::{PrimInt, Unsigned};

/// The trait every token source handed to a parser must implement. Lexers take their input in one
/// go: they can then hand out substrings of that input and line/column numbers for a [Span].
pub trait Lexer<'input, StorageT: Hash + PrimInt + Unsigned> {
    /// Iterate over all the lexemes in this lexer. The iterator may or may not stop after the
    /// first [LexError] it yields: parsers stop consuming lexemes as soon as they see one.
    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = Result<Lexeme<StorageT>, LexError>> + 'a>;

    /// Return the user input associated with a [Span].
    ///
    /// The [Span] must be well formed: its start/end byte indexes must be valid UTF-8 character
    /// indexes and its end must not exceed the input's length. If these requirements are not
    /// respected this function may panic or return unexpected portions of the input.
    fn span_str(&self, span: Span) -> &'input str;

    /// Return `((start line, start column), (end line, end column))` for `span`. Lines and
    /// columns are both 1-based, and columns count *characters*, not bytes.
    fn line_col(&self, span: Span) -> ((usize, usize), (usize, usize));
}

/// A lexeme represents a segment of the user's input that conforms to a known terminal.
///
/// Lexemes created by error recovery are "faulty": they have the terminal an error recoverer
/// decided should have been present, but no real input backs them (their length is usually 0).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Lexeme<StorageT> {
    start: usize,
    len: usize,
    faulty: bool,
    tok_id: StorageT,
}

impl<StorageT: Copy> Lexeme<StorageT> {
    /// Create a new lexeme with ID `tok_id`, a starting position in the input `start`, and length
    /// `len`.
    pub fn new(tok_id: StorageT, start: usize, len: usize) -> Self {
        Lexeme {
            start,
            len,
            faulty: false,
            tok_id,
        }
    }

    /// Create a new faulty lexeme with ID `tok_id` and a starting position in the input `start`.
    pub fn new_faulty(tok_id: StorageT, start: usize, len: usize) -> Self {
        Lexeme {
            start,
            len,
            faulty: true,
            tok_id,
        }
    }

    /// The token ID (i.e. the index of this lexeme's terminal).
    pub fn tok_id(&self) -> StorageT {
        self.tok_id
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.start + self.len)
    }

    /// Returns `true` if this lexeme is the result of error recovery.
    pub fn faulty(&self) -> bool {
        self.faulty
    }
}

impl<StorageT: Copy> fmt::Display for Lexeme<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let span = self.span();
        write!(f, "Lexeme[{}..{}]", span.start(), span.end())
    }
}

/// A lexing error: no terminal matches the input at `span`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LexError {
    span: Span,
}

impl LexError {
    pub fn new(span: Span) -> Self {
        LexError { span }
    }

    /// Return the span associated with this error.
    pub fn span(&self) -> Span {
        self.span
    }
}

impl Error for LexError {}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Couldn't lex input starting at byte {}", self.span.start())
    }
}
