#![allow(clippy::new_without_default)]
#![forbid(unsafe_code)]

//! `glrlex` is a simple lexer driven by the terminal definitions of a [glrgrammar::Grammar]. Each
//! terminal with a pattern becomes a lexing rule; the input is split into the longest matches of
//! those rules, with terminals declared earlier winning ties. Matches of the grammar's separator
//! terminal are skipped.
//!
//! ```
//! use glrgrammar::GrammarBuilder;
//! use glrlex::GrammarLexer;
//! use glrpar::Lexer;
//!
//! let grm = GrammarBuilder::<u32>::new("sum")
//!     .terminal("+", "\\+")
//!     .terminal("id", "[a-z]+")
//!     .terminal("ws", "[ \\t\\n]+")
//!     .rule("E", &["E", "+", "id"])
//!     .rule("E", &["id"])
//!     .axiom("E")
//!     .separator("ws")
//!     .build()
//!     .unwrap();
//! let lexerdef = GrammarLexer::from_grammar(&grm).unwrap();
//! let lexer = lexerdef.lexer("a + bc");
//! let toks = lexer
//!     .iter()
//!     .map(|l| lexer.span_str(l.unwrap().span()))
//!     .collect::<Vec<_>>();
//! assert_eq!(toks, vec!["a", "+", "bc"]);
//! ```

mod lexer;

pub use crate::lexer::{
    GrammarLexer, LexBuildError, LexBuildErrorKind, MatchingLexer, TerminalRule,
};
