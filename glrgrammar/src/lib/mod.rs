#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! The grammar model consumed by the LR and generalized LR automaton builders.
//!
//! A [Grammar] is built in memory through a [GrammarBuilder]: loading grammars from source files
//! is somebody else's job. The terminology used throughout is:
//!
//!   * A *terminal* is a symbol matched from the input. Terminal `0` is always epsilon (`ε`),
//!     terminal `1` is always the end marker (`$`).
//!   * A *variable* is a nonterminal. Each variable owns one or more *rules*.
//!   * A *rule* maps a variable (its *head*) to a body: an ordered sequence of body elements.
//!     Body elements are grammar symbols (each with a [TreeAction]), virtual symbols, or semantic
//!     action attachment points. Only the grammar symbols take part in parsing.
//!   * The *axiom* is the variable from which parsing starts. Every grammar is augmented with a
//!     fresh variable `^` and the rule `^ -> Axiom $`.
//!
//! For example:
//!
//! ```
//! use glrgrammar::GrammarBuilder;
//!
//! let grm = GrammarBuilder::<u32>::new("Expr")
//!     .terminal("+", "\\+")
//!     .terminal("id", "[a-z]+")
//!     .rule("E", &["E", "+^", "E"])
//!     .rule("E", &["id"])
//!     .axiom("E")
//!     .build()
//!     .unwrap();
//! assert_eq!(usize::from(grm.rules_len()), 3);
//! ```
//!
//! glrgrammar makes the following guarantees about grammars:
//!
//!   * Rules are numbered from `0` to `rules_len() - 1`; the augmented start rule is always the
//!     last rule.
//!   * Variables are numbered from `0` to `variables_len() - 1`; the augmented start variable is
//!     always the last variable.
//!   * Terminals are numbered from `0` to `terminals_len() - 1`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod builder;
pub mod firsts;
mod grammar;
mod idxnewtype;
pub mod newlinecache;
pub mod span;

pub use crate::builder::{GrammarBuilder, GrammarError, GrammarErrorKind};
pub use crate::firsts::GrammarFirsts;
pub use crate::grammar::{BodyElement, Grammar, Rule, Terminal};
pub use crate::idxnewtype::{AIdx, CIdx, RIdx, SIdx, TIdx, VIdx, VtIdx};
pub use crate::newlinecache::NewlineCache;
pub use crate::span::Span;

/// The name of the epsilon terminal.
pub const EPSILON_NAME: &str = "ε";
/// The name of the end marker terminal.
pub const DOLLAR_NAME: &str = "$";
/// The name given to the augmented start variable (suffixed with `^` until unique).
pub const START_NAME: &str = "^";

/// A grammar symbol proper: the things items advance over and automaton edges are labelled
/// with.
#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol<StorageT> {
    Variable(VIdx<StorageT>),
    Terminal(TIdx<StorageT>),
}

/// How a body element, or a generated head, shapes the tree built when its rule is reduced.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TreeAction {
    /// Keep the child as is.
    None,
    /// The child takes the place of its parent; the parent's other children become its children.
    Promote,
    /// The child is removed from the tree.
    Drop,
    /// The node is replaced by its children in its own parent. Only used on heads.
    Replace,
}
