#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![forbid(unsafe_code)]

//! `glrpar` provides the parsing runtimes for state tables built by `glrtable`.
//!
//! Two runtimes share one entry point, [RTParserBuilder]:
//!
//!   * [RTParserBuilder::parse] is a deterministic LR parser. It builds a single parse tree of
//!     [Node]s, calling semantic actions as rules are reduced, and can recover from syntax errors
//!     (see [RecoveryKind]). If a table cell holds several actions the first is taken.
//!   * [RTParserBuilder::parse_generalized] is a right nulled GLR parser. It follows every action
//!     of every cell and returns a [Forest] of all the derivations of the input.
//!
//! Both runtimes read their input through the [Lexer] trait. A typical use looks as follows:
//!
//! ```text
//! let grm = GrammarBuilder::<u32>::new("sum")
//!     .terminal("+", "\\+")
//!     .terminal("id", "[a-z]+")
//!     .rule("E", &["E", "+", "E"])
//!     .rule("E", &["id"])
//!     .axiom("E")
//!     .build()?;
//! let (_, stable, _) = glrtable::from_grammar(&grm, Method::RNGLALR1)?;
//! let lexer = GrammarLexer::from_grammar(&grm)?.lexer("a+b+c");
//! let forest = RTParserBuilder::new(&grm, &stable).parse_generalized(&lexer)?;
//! assert_eq!(forest.count_trees(), Some(2));
//! ```
//!
//! Trees are shaped by the tree actions of the grammar: dropped symbols are left out, a promoted
//! symbol replaces the head of its rule, virtual symbols become leaves, and the variables that
//! repetitions generate are spliced into their parents.

mod glr;
pub mod lex_api;
mod panic;
pub mod parser;
mod repair;
pub mod sppf;
#[cfg(test)]
mod test_utils;

pub use crate::{
    glr::GlrParseError,
    lex_api::{LexError, Lexeme, Lexer},
    parser::{
        LexParseError, Node, ParseError, ParseRepair, RTParserBuilder, RecoveryKind,
        SemanticActionFn,
    },
    sppf::{Family, Forest, SppfIdx, SppfNode},
};
