#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! Builds LR(0), LR(1), LALR(1), LR(*) and RNGLR automata from a [glrgrammar::Grammar].
//!
//! Construction is a two stage process. First a [StateGraph] (the characteristic automaton:
//! states are sets of items, edges are labelled with grammar symbols) is built. Second, the
//! reductions of each state are inferred by one of several strategies (see [reductions]), with
//! every conflict the strategy detects being recorded in a [Report]. If no conflict is fatal for
//! the chosen [Method], a [StateTable] is exported for use by a parser runtime.

use std::{fmt, hash::Hash};

use glrgrammar::{Grammar, GrammarFirsts};
use log::{debug, info};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod conflicts;
mod itemset;
mod lalr;
mod lr;
pub mod reductions;
mod stategraph;
pub mod statetable;

pub use crate::conflicts::{Conflict, ConflictKind, Item, Report};
pub use crate::itemset::Itemset;
pub use crate::stategraph::StateGraph;
pub use crate::statetable::{Action, Production, ProductionOp, StateTable, StateTableError};

pub type StIdxStorageT = u32;

/// StIdx is a wrapper for a state index. Its internal type is `StIdxStorageT`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StIdx(StIdxStorageT);

impl From<StIdxStorageT> for StIdx {
    fn from(v: StIdxStorageT) -> Self {
        StIdx(v)
    }
}

impl From<usize> for StIdx {
    fn from(v: usize) -> Self {
        match StIdxStorageT::try_from(v) {
            Ok(v) => StIdx(v),
            Err(_) => panic!("Overflow"),
        }
    }
}

impl From<StIdx> for usize {
    fn from(st: StIdx) -> Self {
        st.0 as usize
    }
}

impl From<StIdx> for StIdxStorageT {
    fn from(st: StIdx) -> Self {
        st.0
    }
}

impl fmt::Display for StIdx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The parsing methods an automaton can be built for. Each method fixes both the kind of state
/// graph and the reduction strategy used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    /// LR(0): reductions ignore lookahead. Every conflict is fatal.
    LR0,
    /// Canonical LR(1). Every conflict is fatal.
    LR1,
    /// LALR(1): the LR(0) graph with LR(1) lookaheads. Every conflict is fatal.
    LALR1,
    /// LR(*): canonical LR(1) states whose conflicting actions are all kept. The deterministic
    /// parser picks between them by trying each on the next few lexemes.
    LRStar,
    /// Generalized parsing over canonical LR(1) states. Conflicts are informational.
    GLR1,
    /// Generalized parsing over LALR(1) states. Conflicts are informational.
    GLALR1,
    /// Right-nulled generalized parsing over canonical LR(1) states.
    RNGLR1,
    /// Right-nulled generalized parsing over LALR(1) states.
    RNGLALR1,
}

impl Method {
    /// Is this method's automaton meant for the generalized parser?
    pub fn is_generalized(self) -> bool {
        !matches!(
            self,
            Method::LR0 | Method::LR1 | Method::LALR1 | Method::LRStar
        )
    }

    /// Does this method produce right-nulled reductions?
    pub fn is_right_nulled(self) -> bool {
        matches!(self, Method::RNGLR1 | Method::RNGLALR1)
    }
}

/// Build the state graph for `grm` the way `method` requires.
pub fn build_stategraph<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: &GrammarFirsts<StorageT>,
    method: Method,
) -> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    match method {
        Method::LR0 => lr::lr0_stategraph(grm),
        Method::LR1 | Method::LRStar | Method::GLR1 | Method::RNGLR1 => {
            lr::lr1_stategraph(grm, firsts)
        }
        Method::LALR1 | Method::GLALR1 | Method::RNGLALR1 => lalr::lalr1_stategraph(grm, firsts),
    }
}

/// Build the automaton for `grm` using `method`, returning its state graph, its exported state
/// table, and the report of every conflict found. If any conflict is fatal for `method`, no table
/// is exported and the report is returned inside the error instead.
#[allow(clippy::type_complexity)]
pub fn from_grammar<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    method: Method,
) -> Result<
    (StateGraph<StorageT>, StateTable<StorageT>, Report<StorageT>),
    StateTableError<StorageT>,
>
where
    usize: AsPrimitive<StorageT>,
{
    let firsts = GrammarFirsts::new(grm);
    let mut sg = build_stategraph(grm, &firsts, method);
    let report = reductions::build_reductions(grm, &firsts, &mut sg, method);
    info!(
        "{}: built {:?} automaton with {} states and {} edges ({} conflicts)",
        grm.name(),
        method,
        usize::from(sg.all_states_len()),
        sg.all_edges_len(),
        report.conflicts().len()
    );
    for c in report.conflicts() {
        debug!("{}", c.pp(grm));
    }
    if report.is_fatal() {
        return Err(StateTableError { report });
    }
    let st = StateTable::new(grm, &firsts, &sg);
    Ok((sg, st, report))
}
