//! Reduction strategies. Given a state graph, a strategy decides on which lookaheads each state
//! reduces, and by which rules. Conflicts found along the way are recorded rather than aborting
//! construction so that grammar authors see all of them at once: whether a conflict is fatal
//! depends on the strategy.

use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use glrgrammar::{firsts::falses, Grammar, GrammarFirsts, RIdx, SIdx, Symbol, TIdx};
use indexmap::IndexMap;
use log::debug;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vob::Vob;

use crate::{
    conflicts::{Conflict, ConflictKind, Item, Report},
    stategraph::StateGraph,
    Method, StIdx,
};

/// A reduction of a state: on `lookahead`, reduce the first `len` symbols of rule `ridx`. `len`
/// is less than the rule's body length only for right-nulled reductions, whose remaining body
/// symbols all derive the empty string.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reduction<StorageT> {
    pub lookahead: TIdx<StorageT>,
    pub ridx: RIdx<StorageT>,
    pub len: usize,
}

/// A strategy for inferring the reductions of a single state.
pub trait StateReductions<StorageT: 'static + Hash + PrimInt + Unsigned>
where
    usize: AsPrimitive<StorageT>,
{
    /// Are conflicts found by this strategy non-fatal? Tolerant strategies keep every
    /// conflicting action so that a generalized parser can explore all of them.
    fn tolerant(&self) -> bool;

    /// Add the reductions of state `stidx` to `collector`.
    fn reductions(
        &self,
        grm: &Grammar<StorageT>,
        firsts: &GrammarFirsts<StorageT>,
        sg: &StateGraph<StorageT>,
        stidx: StIdx,
        collector: &mut ReductionCollector<StorageT>,
    );
}

/// LR(0) reductions: every reduce item reduces on every terminal. The start rule only "reduces"
/// on epsilon, i.e. once the end marker has been shifted.
pub struct Lr0Reductions;

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateReductions<StorageT> for Lr0Reductions
where
    usize: AsPrimitive<StorageT>,
{
    fn tolerant(&self) -> bool {
        false
    }

    fn reductions(
        &self,
        grm: &Grammar<StorageT>,
        _: &GrammarFirsts<StorageT>,
        sg: &StateGraph<StorageT>,
        stidx: StIdx,
        collector: &mut ReductionCollector<StorageT>,
    ) {
        for &(ridx, dot) in sg.closed_state(stidx).items.keys() {
            if usize::from(dot) < grm.rule(ridx).symbols_len() {
                continue;
            }
            if ridx == grm.start_rule() {
                collector.add(grm.epsilon_idx(), ridx, usize::from(dot));
            } else {
                for tidx in grm.iter_tidxs().filter(|&t| t != grm.epsilon_idx()) {
                    collector.add(tidx, ridx, usize::from(dot));
                }
            }
        }
    }
}

/// Add a reduction for every reduce item on each of its lookaheads.
fn lr1_reductions<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    sg: &StateGraph<StorageT>,
    stidx: StIdx,
    collector: &mut ReductionCollector<StorageT>,
) where
    usize: AsPrimitive<StorageT>,
{
    for (&(ridx, dot), ctx) in &sg.closed_state(stidx).items {
        if usize::from(dot) == grm.rule(ridx).symbols_len() {
            for bidx in ctx.iter_set_bits(..) {
                collector.add(TIdx(bidx.as_()), ridx, usize::from(dot));
            }
        }
    }
}

/// LR(1) reductions (also used for LALR(1) graphs): reduce items reduce on their lookaheads.
pub struct Lr1Reductions;

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateReductions<StorageT> for Lr1Reductions
where
    usize: AsPrimitive<StorageT>,
{
    fn tolerant(&self) -> bool {
        false
    }

    fn reductions(
        &self,
        grm: &Grammar<StorageT>,
        _: &GrammarFirsts<StorageT>,
        sg: &StateGraph<StorageT>,
        stidx: StIdx,
        collector: &mut ReductionCollector<StorageT>,
    ) {
        lr1_reductions(grm, sg, stidx, collector);
    }
}

/// GLR reductions: as [Lr1Reductions], but conflicts are informational and every conflicting
/// action is kept. Also used by LR(*), whose parser decides between the actions at run time.
pub struct GlrReductions;

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateReductions<StorageT> for GlrReductions
where
    usize: AsPrimitive<StorageT>,
{
    fn tolerant(&self) -> bool {
        true
    }

    fn reductions(
        &self,
        grm: &Grammar<StorageT>,
        _: &GrammarFirsts<StorageT>,
        sg: &StateGraph<StorageT>,
        stidx: StIdx,
        collector: &mut ReductionCollector<StorageT>,
    ) {
        lr1_reductions(grm, sg, stidx, collector);
    }
}

/// RNGLR reductions: as [GlrReductions], plus a right-nulled reduction of length `dot` for every
/// item `A -> α . β` whose suffix `β` is non-empty and nullable.
pub struct RnglrReductions;

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateReductions<StorageT> for RnglrReductions
where
    usize: AsPrimitive<StorageT>,
{
    fn tolerant(&self) -> bool {
        true
    }

    fn reductions(
        &self,
        grm: &Grammar<StorageT>,
        firsts: &GrammarFirsts<StorageT>,
        sg: &StateGraph<StorageT>,
        stidx: StIdx,
        collector: &mut ReductionCollector<StorageT>,
    ) {
        lr1_reductions(grm, sg, stidx, collector);
        for (&(ridx, dot), ctx) in &sg.closed_state(stidx).items {
            let symbols = grm.rule(ridx).symbols();
            if usize::from(dot) < symbols.len()
                && firsts.is_suffix_nullable(&symbols[usize::from(dot)..])
            {
                for bidx in ctx.iter_set_bits(..) {
                    collector.add(TIdx(bidx.as_()), ridx, usize::from(dot));
                }
            }
        }
    }
}

/// Accumulates the reductions of one state, checking each new reduction against the state's
/// shifts and the reductions already added.
pub struct ReductionCollector<'a, StorageT: Eq + Hash> {
    grm: &'a Grammar<StorageT>,
    sg: &'a StateGraph<StorageT>,
    stidx: StIdx,
    tolerant: bool,
    reductions: Vec<Reduction<StorageT>>,
    conflicts: Vec<Conflict<StorageT>>,
}

impl<'a, StorageT: 'static + Hash + PrimInt + Unsigned> ReductionCollector<'a, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn new(
        grm: &'a Grammar<StorageT>,
        sg: &'a StateGraph<StorageT>,
        stidx: StIdx,
        tolerant: bool,
    ) -> Self {
        ReductionCollector {
            grm,
            sg,
            stidx,
            tolerant,
            reductions: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// The conflict item for the reduction of the first `len` symbols of `ridx`.
    fn item(&self, ridx: RIdx<StorageT>, len: usize) -> Item<StorageT> {
        let dot = SIdx(len.as_());
        let st = self.sg.closed_state(self.stidx);
        match st.items.get(&(ridx, dot)) {
            Some(ctx) => Item::new(self.grm, ridx, dot, ctx),
            None => Item::new(self.grm, ridx, dot, &Vob::new()),
        }
    }

    /// Record a conflict of `kind` on `lookahead` involving `items`, merging it with an existing
    /// conflict of the same kind on the same lookahead.
    fn raise(&mut self, kind: ConflictKind, lookahead: TIdx<StorageT>, items: Vec<Item<StorageT>>) {
        let fatal = !self.tolerant || kind == ConflictKind::ContextualTerminal;
        let i = match self
            .conflicts
            .iter()
            .position(|c| c.kind() == kind && c.lookahead() == lookahead)
        {
            Some(i) => i,
            None => {
                self.conflicts
                    .push(Conflict::new(self.stidx, kind, lookahead, fatal));
                self.conflicts.len() - 1
            }
        };
        for item in items {
            self.conflicts[i].add_item(item);
        }
    }

    /// Add a reduction of the first `len` symbols of `ridx` on `lookahead`.
    pub fn add(&mut self, lookahead: TIdx<StorageT>, ridx: RIdx<StorageT>, len: usize) {
        let red = Reduction {
            lookahead,
            ridx,
            len,
        };
        if self.reductions.contains(&red) {
            return;
        }

        if self
            .sg
            .edge(self.stidx, Symbol::Terminal(lookahead))
            .is_some()
        {
            let mut items = self
                .sg
                .closed_state(self.stidx)
                .items
                .iter()
                .filter(|(k, _)| {
                    let (s_ridx, s_dot) = **k;
                    self.grm.rule(s_ridx).symbols().get(usize::from(s_dot))
                        == Some(&Symbol::Terminal(lookahead))
                })
                .map(|(&(s_ridx, s_dot), ctx)| Item::new(self.grm, s_ridx, s_dot, ctx))
                .collect::<Vec<_>>();
            items.push(self.item(ridx, len));
            self.raise(ConflictKind::ShiftReduce, lookahead, items);
            if !self.tolerant {
                return;
            }
        }

        let others = self
            .reductions
            .iter()
            .filter(|r| r.lookahead == lookahead)
            .map(|r| (r.ridx, r.len))
            .collect::<Vec<_>>();
        if !others.is_empty() {
            let mut items = others
                .into_iter()
                .map(|(o_ridx, o_len)| self.item(o_ridx, o_len))
                .collect::<Vec<_>>();
            items.push(self.item(ridx, len));
            self.raise(ConflictKind::ReduceReduce, lookahead, items);
            if !self.tolerant {
                return;
            }
        }

        self.reductions.push(red);
    }
}

/// For every item of every state, the lexical contexts the item is inside of: an item is inside
/// context `c` if its rule opens `c`, or if it was reached (by a goto, or by closure) from an
/// item inside `c`.
fn item_contexts<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    sg: &StateGraph<StorageT>,
) -> Vec<IndexMap<(RIdx<StorageT>, SIdx<StorageT>), Vob, BuildHasherDefault<FnvHasher>>>
where
    usize: AsPrimitive<StorageT>,
{
    let ctxs_len = grm.contexts_len();
    let mut ctxs = sg
        .iter_stidxs()
        .map(|stidx| {
            sg.closed_state(stidx)
                .items
                .keys()
                .map(|&(ridx, dot)| {
                    let mut v = falses(ctxs_len);
                    if let Some(cidx) = grm.rule(ridx).context() {
                        v.set(usize::from(cidx), true);
                    }
                    ((ridx, dot), v)
                })
                .collect::<IndexMap<_, _, BuildHasherDefault<FnvHasher>>>()
        })
        .collect::<Vec<_>>();
    if ctxs_len <= 1 {
        return ctxs;
    }

    let mut changed = true;
    while changed {
        changed = false;
        for stidx in sg.iter_stidxs() {
            let st = usize::from(stidx);
            for &(ridx, dot) in sg.closed_state(stidx).items.keys() {
                let v = ctxs[st][&(ridx, dot)].clone();
                if v.iter_set_bits(..).next().is_none() {
                    continue;
                }
                let sym = match grm.rule(ridx).symbols().get(usize::from(dot)) {
                    Some(sym) => *sym,
                    None => continue,
                };
                if let Some(target) = sg.edge(stidx, sym) {
                    let next = (ridx, SIdx((usize::from(dot) + 1).as_()));
                    if let Some(t_v) = ctxs[usize::from(target)].get_mut(&next) {
                        changed |= t_v.or(&v);
                    }
                }
                if let Symbol::Variable(vidx) = sym {
                    for &c_ridx in grm.var_rules(vidx) {
                        if let Some(c_v) = ctxs[st].get_mut(&(c_ridx, SIdx(StorageT::zero()))) {
                            changed |= c_v.or(&v);
                        }
                    }
                }
            }
        }
    }
    ctxs
}

/// Check that every contextual terminal shifted by a state is shifted from an item inside that
/// terminal's context.
fn check_contexts<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    sg: &StateGraph<StorageT>,
    collectors: &mut [ReductionCollector<StorageT>],
) where
    usize: AsPrimitive<StorageT>,
{
    if grm.contexts_len() <= 1 {
        return;
    }
    let ctxs = item_contexts(grm, sg);
    for (stidx, collector) in sg.iter_stidxs().zip(collectors.iter_mut()) {
        for sym in sg.edges(stidx).keys() {
            let tidx = match *sym {
                Symbol::Terminal(tidx) => tidx,
                Symbol::Variable(_) => continue,
            };
            let cidx = match grm.terminal(tidx).context() {
                Some(cidx) => cidx,
                None => continue,
            };
            let mut bad = Vec::new();
            for (&(ridx, dot), ctx) in &sg.closed_state(stidx).items {
                if grm.rule(ridx).symbols().get(usize::from(dot)) == Some(sym)
                    && !ctxs[usize::from(stidx)][&(ridx, dot)][usize::from(cidx)]
                {
                    bad.push(Item::new(grm, ridx, dot, ctx));
                }
            }
            if !bad.is_empty() {
                collector.raise(ConflictKind::ContextualTerminal, tidx, bad);
            }
        }
    }
}

/// Infer the reductions of every state of `sg` using the strategy `method` requires, storing
/// them in `sg`, and return the resulting report.
pub(crate) fn build_reductions<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: &GrammarFirsts<StorageT>,
    sg: &mut StateGraph<StorageT>,
    method: Method,
) -> Report<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    let strategy: Box<dyn StateReductions<StorageT>> = match method {
        Method::LR0 => Box::new(Lr0Reductions),
        Method::LR1 | Method::LALR1 => Box::new(Lr1Reductions),
        Method::LRStar | Method::GLR1 | Method::GLALR1 => Box::new(GlrReductions),
        Method::RNGLR1 | Method::RNGLALR1 => Box::new(RnglrReductions),
    };
    let results = {
        let sg_ref: &StateGraph<StorageT> = sg;
        let mut collectors = sg_ref
            .iter_stidxs()
            .map(|stidx| {
                let mut collector =
                    ReductionCollector::new(grm, sg_ref, stidx, strategy.tolerant());
                strategy.reductions(grm, firsts, sg_ref, stidx, &mut collector);
                collector
            })
            .collect::<Vec<_>>();
        check_contexts(grm, sg_ref, &mut collectors);
        collectors
            .into_iter()
            .map(|c| (c.stidx, c.reductions, c.conflicts))
            .collect::<Vec<_>>()
    };
    let mut conflicts = Vec::new();
    for (stidx, reductions, mut st_conflicts) in results {
        if !st_conflicts.is_empty() {
            debug!(
                "State {} has {} conflict(s)",
                stidx,
                st_conflicts.len()
            );
        }
        sg.set_reductions(stidx, reductions);
        conflicts.append(&mut st_conflicts);
    }
    Report::new(conflicts)
}

#[cfg(test)]
mod test {
    use super::{build_reductions, Reduction};
    use crate::{build_stategraph, ConflictKind, Method, StIdx};
    use glrgrammar::{Grammar, GrammarBuilder, GrammarFirsts, Symbol};

    fn reductions_on(
        grm: &Grammar<u32>,
        method: Method,
    ) -> (crate::StateGraph<u32>, crate::Report<u32>) {
        let firsts = GrammarFirsts::new(grm);
        let mut sg = build_stategraph(grm, &firsts, method);
        let report = build_reductions(grm, &firsts, &mut sg, method);
        (sg, report)
    }

    #[test]
    fn lr0_reduces_on_every_terminal() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .rule("S", &["a"])
            .axiom("S")
            .build()
            .unwrap();
        let (sg, report) = reductions_on(&grm, Method::LR0);
        assert!(report.conflicts().is_empty());
        let sa = sg
            .edge(sg.start_state(), Symbol::Terminal(grm.terminal_idx("a").unwrap()))
            .unwrap();
        // `$` and `a`, but never epsilon.
        assert_eq!(sg.reductions(sa).len(), 2);
        assert!(sg
            .reductions(sa)
            .iter()
            .all(|r| r.lookahead != grm.epsilon_idx() && r.len == 1));
    }

    #[test]
    fn reduce_reduce() {
        // S -> A 'x' | B 'x'; A -> 'a'; B -> 'a';
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .terminal("x", "x")
            .rule("S", &["A", "x"])
            .rule("S", &["B", "x"])
            .rule("A", &["a"])
            .rule("B", &["a"])
            .axiom("S")
            .build()
            .unwrap();
        let (sg, report) = reductions_on(&grm, Method::LALR1);
        assert_eq!(report.count(ConflictKind::ReduceReduce), 1);
        assert!(report.is_fatal());
        let c = &report.conflicts()[0];
        assert_eq!(c.lookahead(), grm.terminal_idx("x").unwrap());
        assert_eq!(c.items().len(), 2);
        // The first reduction wins; the conflicting one is not kept.
        assert_eq!(sg.reductions(c.stidx()).len(), 1);

        let (sg, report) = reductions_on(&grm, Method::GLALR1);
        assert!(!report.is_fatal());
        let c = &report.conflicts()[0];
        assert_eq!(sg.reductions(c.stidx()).len(), 2);
        assert_eq!(
            report.pp(&grm),
            format!(
                "Reduce/Reduce conflict in state {} on 'x':\n  [A -> 'a' ., {{'x'}}]\n  [B -> 'a' ., {{'x'}}]",
                c.stidx()
            )
        );
    }

    #[test]
    fn conflicts_accumulate() {
        // Three rules all reducing `'a'` on `$`.
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .rule("S", &["A"])
            .rule("S", &["B"])
            .rule("S", &["C"])
            .rule("A", &["a"])
            .rule("B", &["a"])
            .rule("C", &["a"])
            .axiom("S")
            .build()
            .unwrap();
        let (_, report) = reductions_on(&grm, Method::GLR1);
        assert_eq!(report.conflicts().len(), 1);
        assert_eq!(report.conflicts()[0].items().len(), 3);
    }

    #[test]
    fn right_nulled_reductions() {
        // S -> 'a' N N; N -> 'n' | ;
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .terminal("n", "n")
            .rule("S", &["a", "N", "N"])
            .rule("N", &["n"])
            .rule("N", &[])
            .axiom("S")
            .build()
            .unwrap();
        let s_rule = grm.var_rules(grm.axiom())[0];
        let dollar = grm.dollar_idx();
        for m in [Method::RNGLR1, Method::RNGLALR1] {
            let (sg, _) = reductions_on(&grm, m);
            let sa = sg
                .edge(sg.start_state(), Symbol::Terminal(grm.terminal_idx("a").unwrap()))
                .unwrap();
            assert!(sg.reductions(sa).contains(&Reduction {
                lookahead: dollar,
                ridx: s_rule,
                len: 1
            }));
            let sn = sg
                .edge(sa, Symbol::Variable(grm.variable_idx("N").unwrap()))
                .unwrap();
            assert!(sg.reductions(sn).contains(&Reduction {
                lookahead: dollar,
                ridx: s_rule,
                len: 2
            }));
        }
        let (sg, _) = reductions_on(&grm, Method::GLR1);
        let sa = sg
            .edge(sg.start_state(), Symbol::Terminal(grm.terminal_idx("a").unwrap()))
            .unwrap();
        assert!(sg.reductions(sa).iter().all(|r| r.ridx != s_rule));
    }

    #[test]
    fn contextual_terminals() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("id", "[a-z]+")
            .contextual_terminal("get", "get", "accessor")
            .terminal("{", "\\{")
            .terminal("}", "\\}")
            .rule("S", &["id", "P"])
            .contextual_rule("P", "accessor", &["{", "A", "}"])
            .rule("A", &["get"])
            .axiom("S")
            .build()
            .unwrap();
        for m in [Method::LALR1, Method::GLR1, Method::RNGLALR1] {
            let (_, report) = reductions_on(&grm, m);
            assert!(report.conflicts().is_empty());
        }

        // `get` used outside of `accessor`.
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("id", "[a-z]+")
            .contextual_terminal("get", "get", "accessor")
            .rule("S", &["id", "get"])
            .axiom("S")
            .build()
            .unwrap();
        for m in [Method::LALR1, Method::GLR1, Method::RNGLALR1] {
            let (_, report) = reductions_on(&grm, m);
            assert_eq!(report.count(ConflictKind::ContextualTerminal), 1);
            assert!(report.is_fatal());
        }
        assert_eq!(StIdx::from(0usize), StIdx::from(0u32));
    }
}
