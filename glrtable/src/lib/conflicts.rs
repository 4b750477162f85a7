use std::{fmt, hash::Hash};

use glrgrammar::{Grammar, RIdx, SIdx, Symbol, TIdx};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::StIdx;

/// The kinds of problem that can be found in an automaton's states.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConflictKind {
    /// A state can both shift and reduce on the same lookahead.
    ShiftReduce,
    /// A state can reduce by more than one rule on the same lookahead.
    ReduceReduce,
    /// A state shifts a contextual terminal outside of that terminal's context.
    ContextualTerminal,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ConflictKind::ShiftReduce => "Shift/Reduce conflict",
            ConflictKind::ReduceReduce => "Reduce/Reduce conflict",
            ConflictKind::ContextualTerminal => "Contextual terminal outside of its context",
        };
        write!(f, "{}", s)
    }
}

/// An item involved in a conflict: a rule, a position in its body, and the item's lookaheads
/// (empty for LR(0) items).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Item<StorageT> {
    ridx: RIdx<StorageT>,
    dot: SIdx<StorageT>,
    lookaheads: Vec<TIdx<StorageT>>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Item<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new(
        grm: &Grammar<StorageT>,
        ridx: RIdx<StorageT>,
        dot: SIdx<StorageT>,
        ctx: &Vob,
    ) -> Self {
        let lookaheads = ctx
            .iter_set_bits(..)
            .filter(|&bidx| bidx < usize::from(grm.terminals_len()))
            .map(|bidx| TIdx(bidx.as_()))
            .collect();
        Item {
            ridx,
            dot,
            lookaheads,
        }
    }

    pub fn ridx(&self) -> RIdx<StorageT> {
        self.ridx
    }

    pub fn dot(&self) -> SIdx<StorageT> {
        self.dot
    }

    pub fn lookaheads(&self) -> &[TIdx<StorageT>] {
        &self.lookaheads
    }

    /// The symbol after this item's dot, or `None` if this is a reduce item.
    pub fn next_symbol(&self, grm: &Grammar<StorageT>) -> Option<Symbol<StorageT>> {
        grm.rule(self.ridx)
            .symbols()
            .get(usize::from(self.dot))
            .cloned()
    }

    /// Pretty print this item e.g. `[E -> E . '+' E, {'+', '$'}]`.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let las = self
            .lookaheads
            .iter()
            .map(|&tidx| format!("'{}'", grm.terminal_name(tidx)))
            .collect::<Vec<_>>();
        format!(
            "[{}, {{{}}}]",
            grm.pp_rule(self.ridx, Some(usize::from(self.dot))),
            las.join(", ")
        )
    }
}

/// A conflict in one state on one lookahead. All the items involved in conflicts of the same kind
/// on the same lookahead in the same state are accumulated in one `Conflict`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Conflict<StorageT> {
    stidx: StIdx,
    kind: ConflictKind,
    lookahead: TIdx<StorageT>,
    items: Vec<Item<StorageT>>,
    fatal: bool,
}

impl<StorageT: 'static + PrimInt + Unsigned> Conflict<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new(
        stidx: StIdx,
        kind: ConflictKind,
        lookahead: TIdx<StorageT>,
        fatal: bool,
    ) -> Self {
        Conflict {
            stidx,
            kind,
            lookahead,
            items: Vec::new(),
            fatal,
        }
    }

    /// Add `item` to this conflict if it isn't already part of it.
    pub(crate) fn add_item(&mut self, item: Item<StorageT>) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }

    pub fn stidx(&self) -> StIdx {
        self.stidx
    }

    pub fn kind(&self) -> ConflictKind {
        self.kind
    }

    pub fn lookahead(&self) -> TIdx<StorageT> {
        self.lookahead
    }

    pub fn items(&self) -> &[Item<StorageT>] {
        &self.items
    }

    /// Does this conflict prevent a state table from being built?
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let mut s = format!(
            "{} in state {} on '{}':",
            self.kind,
            self.stidx,
            grm.terminal_name(self.lookahead)
        );
        for item in &self.items {
            s.push_str("\n  ");
            s.push_str(&item.pp(grm));
        }
        s
    }
}

/// Everything found while inferring the reductions of an automaton's states.
#[derive(Clone, Debug)]
pub struct Report<StorageT> {
    conflicts: Vec<Conflict<StorageT>>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Report<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new(conflicts: Vec<Conflict<StorageT>>) -> Self {
        Report { conflicts }
    }

    /// All conflicts, ordered by state.
    pub fn conflicts(&self) -> &[Conflict<StorageT>] {
        &self.conflicts
    }

    /// The conflicts of state `stidx`.
    pub fn state_conflicts(&self, stidx: StIdx) -> impl Iterator<Item = &Conflict<StorageT>> {
        self.conflicts.iter().filter(move |c| c.stidx == stidx)
    }

    /// How many conflicts of kind `kind` are there?
    pub fn count(&self, kind: ConflictKind) -> usize {
        self.conflicts.iter().filter(|c| c.kind == kind).count()
    }

    /// Is any conflict fatal?
    pub fn is_fatal(&self) -> bool {
        self.conflicts.iter().any(|c| c.fatal)
    }

    /// Pretty print every conflict.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        self.conflicts
            .iter()
            .map(|c| c.pp(grm))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<StorageT: fmt::Debug> fmt::Display for Conflict<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} in state {} on terminal {:?}",
            self.kind, self.stidx, self.lookahead
        )
    }
}
