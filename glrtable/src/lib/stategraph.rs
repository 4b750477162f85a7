use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use glrgrammar::{Grammar, Symbol, TIdx};
use indexmap::IndexMap;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{itemset::Itemset, reductions::Reduction, StIdx, StIdxStorageT};

pub(crate) type Edges<StorageT> = IndexMap<Symbol<StorageT>, StIdx, BuildHasherDefault<FnvHasher>>;

/// The characteristic automaton of a grammar.
#[derive(Debug)]
pub struct StateGraph<StorageT: Eq + Hash> {
    /// A vector of `(core_states, closed_states)` tuples.
    states: Vec<(Itemset<StorageT>, Itemset<StorageT>)>,
    start_state: StIdx,
    /// For each state in `states`, edges is a map from symbols to state offsets, in the order
    /// the edges were discovered.
    edges: Vec<Edges<StorageT>>,
    /// For each state in `states`, the reductions inferred for it. Empty until a reduction
    /// strategy has been run over the graph.
    reductions: Vec<Vec<Reduction<StorageT>>>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new(
        states: Vec<(Itemset<StorageT>, Itemset<StorageT>)>,
        start_state: StIdx,
        edges: Vec<Edges<StorageT>>,
    ) -> Self {
        // states.len() needs to fit into StIdxStorageT; however we don't need to worry about
        // edges.len() (which merely needs to fit in a usize)
        assert!(StIdxStorageT::try_from(states.len()).is_ok());
        let reductions = vec![Vec::new(); states.len()];
        StateGraph {
            states,
            start_state,
            edges,
            reductions,
        }
    }

    /// Return this state graph's start state.
    pub fn start_state(&self) -> StIdx {
        self.start_state
    }

    /// Return an iterator which produces (in order from `0..self.all_states_len()`) all this
    /// graph's valid `StIdx`s.
    pub fn iter_stidxs(&self) -> impl Iterator<Item = StIdx> {
        // We can use as safely, because we know that we're only generating integers from
        // 0..self.states.len() which we've already checked fits within StIdxStorageT.
        (0..self.states.len()).map(|x| StIdx::from(x as StIdxStorageT))
    }

    /// Return the itemset for closed state `stidx`. Panics if `stidx` doesn't exist.
    pub fn closed_state(&self, stidx: StIdx) -> &Itemset<StorageT> {
        &self.states[usize::from(stidx)].1
    }

    /// Return the itemset for core state `stidx`. Panics if `stidx` doesn't exist.
    pub fn core_state(&self, stidx: StIdx) -> &Itemset<StorageT> {
        &self.states[usize::from(stidx)].0
    }

    /// How many states does this `StateGraph` contain? NB: By definition the `StateGraph` contains
    /// the same number of core and closed states.
    pub fn all_states_len(&self) -> StIdx {
        StIdx::from(self.states.len())
    }

    /// Return the state pointed to by `sym` from `stidx` or `None` otherwise.
    pub fn edge(&self, stidx: StIdx, sym: Symbol<StorageT>) -> Option<StIdx> {
        self.edges
            .get(usize::from(stidx))
            .and_then(|x| x.get(&sym))
            .cloned()
    }

    /// Return the edges for state `stidx`. Panics if `stidx` doesn't exist.
    pub fn edges(&self, stidx: StIdx) -> &IndexMap<Symbol<StorageT>, StIdx, BuildHasherDefault<FnvHasher>> {
        &self.edges[usize::from(stidx)]
    }

    /// How many edges does this `StateGraph` contain?
    pub fn all_edges_len(&self) -> usize {
        self.edges.iter().fold(0, |a, x| a + x.len())
    }

    /// Return the reductions of state `stidx`. Panics if `stidx` doesn't exist.
    pub fn reductions(&self, stidx: StIdx) -> &[Reduction<StorageT>] {
        &self.reductions[usize::from(stidx)]
    }

    pub(crate) fn set_reductions(&mut self, stidx: StIdx, reductions: Vec<Reduction<StorageT>>) {
        self.reductions[usize::from(stidx)] = reductions;
    }

    /// Pretty print this stategraph as a `String`. If `core_states` is set to true, only the core
    /// states are pretty printed; if set to false, all states (including non-core states) are
    /// pretty printed.
    pub fn pp(&self, grm: &Grammar<StorageT>, core_states: bool) -> String {
        fn num_digits(i: StIdx) -> usize {
            usize::from(i).to_string().len()
        }

        fn fmt_sym<StorageT: 'static + PrimInt + Unsigned>(
            grm: &Grammar<StorageT>,
            sym: Symbol<StorageT>,
        ) -> String
        where
            usize: AsPrimitive<StorageT>,
        {
            match sym {
                Symbol::Variable(vidx) => grm.variable_name(vidx).to_string(),
                Symbol::Terminal(tidx) => format!("'{}'", grm.terminal_name(tidx)),
            }
        }

        let mut o = String::new();
        for (stidx, (core_st, closed_st)) in self.iter_stidxs().zip(self.states.iter()) {
            if stidx != self.start_state {
                o.push('\n');
            }
            {
                let padding = num_digits(self.all_states_len()) - num_digits(stidx);
                o.push_str(&format!("{}:{}", stidx, " ".repeat(padding)));
            }

            let st = if core_states { core_st } else { closed_st };
            for (i, (&(ridx, dot), ctx)) in st.items.iter().enumerate() {
                let padding = if i == 0 {
                    0
                } else {
                    o.push_str("\n "); // Extra space to compensate for ":" printed above
                    num_digits(self.all_states_len())
                };
                o.push_str(&format!(
                    "{} [{}, {{",
                    " ".repeat(padding),
                    grm.pp_rule(ridx, Some(usize::from(dot)))
                ));
                let las = ctx
                    .iter_set_bits(..)
                    .filter(|&bidx| bidx < usize::from(grm.terminals_len()))
                    .map(|bidx| format!("'{}'", grm.terminal_name(TIdx(bidx.as_()))))
                    .collect::<Vec<_>>();
                o.push_str(&las.join(", "));
                o.push_str("}]");
            }
            for (esym, e_stidx) in self.edges(stidx).iter() {
                o.push_str(&format!(
                    "\n{}{} -> {}",
                    " ".repeat(num_digits(self.all_states_len()) + 2),
                    fmt_sym(grm, *esym),
                    usize::from(*e_stidx)
                ));
            }
        }
        o
    }

    /// Return a pretty printed version of the core states, and all edges.
    pub fn pp_core_states(&self, grm: &Grammar<StorageT>) -> String {
        self.pp(grm, true)
    }

    /// Return a pretty printed version of the closed states, and all edges.
    pub fn pp_closed_states(&self, grm: &Grammar<StorageT>) -> String {
        self.pp(grm, false)
    }
}

#[cfg(test)]
use glrgrammar::SIdx;

#[cfg(test)]
pub(crate) fn state_exists<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    is: &Itemset<StorageT>,
    var: &str,
    rule_off: usize,
    dot: SIdx<StorageT>,
    la: Vec<&str>,
) where
    usize: AsPrimitive<StorageT>,
{
    let ridx = grm.var_rules(grm.variable_idx(var).unwrap())[rule_off];
    let ctx = &is.items[&(ridx, dot)];
    for tidx in grm.iter_tidxs() {
        let bit = ctx[usize::from(tidx)];
        let name = grm.terminal_name(tidx);
        if la.contains(&name) {
            if !bit {
                panic!(
                    "bit for terminal {}, dot {} is not set in rule {} of {} when it should be",
                    name,
                    usize::from(dot),
                    rule_off,
                    var
                );
            }
        } else if bit {
            panic!(
                "bit for terminal {}, dot {} is set in rule {} of {} when it shouldn't be",
                name,
                usize::from(dot),
                rule_off,
                var
            );
        }
    }
}
