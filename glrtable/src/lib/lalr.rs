use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use glrgrammar::{firsts::falses, Grammar, GrammarFirsts, RIdx, SIdx};
use indexmap::IndexMap;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{
    itemset::{Ctx, Itemset},
    lr::lr0_stategraph,
    stategraph::StateGraph,
    StIdx,
};

// LALR(1) lookaheads are computed over the LR(0) graph with the "spontaneous generation and
// propagation" method from the Dragon book (section 4.7.5). Each kernel item is closed on its
// own with a dummy lookahead `#`: every lookahead other than `#` in the closure is generated
// spontaneously for the kernel items reached by the closure's gotos, and `#` itself means
// "whatever the originating kernel item ends up with", i.e. a propagation link.

type Kernel<StorageT> = (RIdx<StorageT>, SIdx<StorageT>);
type Lookaheads<StorageT> = IndexMap<Kernel<StorageT>, Ctx, BuildHasherDefault<FnvHasher>>;

/// Create the LALR(1) `StateGraph` of `grm`.
pub(crate) fn lalr1_stategraph<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: &GrammarFirsts<StorageT>,
) -> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    let lr0 = lr0_stategraph(grm);
    let terms_len = usize::from(grm.terminals_len());
    let dummy = terms_len;

    let mut lookaheads: Vec<Lookaheads<StorageT>> = lr0
        .iter_stidxs()
        .map(|stidx| {
            lr0.core_state(stidx)
                .items
                .keys()
                .map(|&k| (k, falses(terms_len)))
                .collect()
        })
        .collect();
    lookaheads[usize::from(lr0.start_state())]
        [&(grm.start_rule(), SIdx(StorageT::zero()))]
        .set(usize::from(grm.epsilon_idx()), true);

    // Propagation links: lookaheads flow from `(state, kernel item)` to `(state, kernel item)`.
    let mut links: Vec<((StIdx, Kernel<StorageT>), (StIdx, Kernel<StorageT>))> = Vec::new();
    let mut dummy_ctx: Vob = falses(terms_len + 1);
    dummy_ctx.set(dummy, true);
    for stidx in lr0.iter_stidxs() {
        for &kernel in lr0.core_state(stidx).items.keys() {
            let mut is = Itemset::new();
            is.add(kernel.0, kernel.1, &dummy_ctx);
            let cl = is.close(grm, firsts);
            for (&(ridx, dot), la) in &cl.items {
                let sym = match Itemset::next_symbol(grm, ridx, dot) {
                    Some(sym) => sym,
                    None => continue,
                };
                // Every symbol after a dot in a closed LR(0) state has an edge.
                let target = match lr0.edge(stidx, sym) {
                    Some(t) => t,
                    None => continue,
                };
                let target_kernel = (ridx, SIdx((usize::from(dot) + 1).as_()));
                let target_la = &mut lookaheads[usize::from(target)][&target_kernel];
                for bidx in la.iter_set_bits(..terms_len) {
                    target_la.set(bidx, true);
                }
                if la[dummy] {
                    links.push(((stidx, kernel), (target, target_kernel)));
                }
            }
        }
    }

    // Propagate to a fixed point.
    let mut changed = true;
    while changed {
        changed = false;
        for ((from_st, from_k), (to_st, to_k)) in &links {
            let src = lookaheads[usize::from(*from_st)][from_k].clone();
            if lookaheads[usize::from(*to_st)][to_k].or(&src) {
                changed = true;
            }
        }
    }

    let mut states = Vec::with_capacity(usize::from(lr0.all_states_len()));
    let mut edges = Vec::with_capacity(usize::from(lr0.all_states_len()));
    for (stidx, las) in lr0.iter_stidxs().zip(lookaheads) {
        let mut core = Itemset::new();
        for ((ridx, dot), ctx) in las {
            core.add(ridx, dot, &ctx);
        }
        let closed = core.close(grm, firsts);
        states.push((core, closed));
        edges.push(lr0.edges(stidx).clone());
    }
    StateGraph::new(states, lr0.start_state(), edges)
}

#[cfg(test)]
mod test {
    use super::lalr1_stategraph;
    use crate::{lr::lr1_stategraph, stategraph::state_exists};
    use glrgrammar::{GrammarBuilder, GrammarFirsts, SIdx, Symbol};

    // The classic grammar which is LALR(1) but not SLR(1).
    #[test]
    fn test_dragon_lalr() {
        let grm = GrammarBuilder::<u32>::new("dragon")
            .terminal("=", "=")
            .terminal("*", "\\*")
            .terminal("id", "[a-z]+")
            .rule("S", &["L", "=", "R"])
            .rule("S", &["R"])
            .rule("L", &["*", "R"])
            .rule("L", &["id"])
            .rule("R", &["L"])
            .axiom("S")
            .build()
            .unwrap();
        let firsts = GrammarFirsts::new(&grm);
        let sg = lalr1_stategraph(&grm, &firsts);
        assert_eq!(usize::from(sg.all_states_len()), 10);
        assert_eq!(
            usize::from(lr1_stategraph(&grm, &firsts).all_states_len()),
            14
        );

        let s0 = sg.start_state();
        let sl = sg.edge(s0, Symbol::Variable(grm.variable_idx("L").unwrap())).unwrap();
        // S -> L . '=' R and R -> L . : the reduction of R is only valid at the end of input.
        state_exists(&grm, sg.core_state(sl), "S", 0, SIdx(1), vec!["$"]);
        state_exists(&grm, sg.core_state(sl), "R", 0, SIdx(1), vec!["$"]);

        let sid = sg.edge(s0, Symbol::Terminal(grm.terminal_idx("id").unwrap())).unwrap();
        state_exists(&grm, sg.core_state(sid), "L", 1, SIdx(1), vec!["$", "="]);
        let sstar = sg.edge(s0, Symbol::Terminal(grm.terminal_idx("*").unwrap())).unwrap();
        state_exists(&grm, sg.closed_state(sstar), "R", 0, SIdx(0), vec!["$", "="]);
    }
}
