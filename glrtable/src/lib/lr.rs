use std::hash::Hash;

use glrgrammar::{firsts::falses, Grammar, GrammarFirsts, SIdx, Symbol};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{
    itemset::Itemset,
    stategraph::{Edges, StateGraph},
    StIdx,
};

// Canonical LR state graphs. States are only ever shared when their kernels are identical
// (including lookaheads), so no state is ever revisited once processed: the list of core states
// doubles as the todo list.

/// How the kernels of a graph's states are closed.
#[derive(Clone, Copy)]
enum Closure {
    /// Items carry no lookaheads.
    LR0,
    /// Items carry LR(1) lookaheads.
    LR1,
}

/// Create the LR(0) `StateGraph` of `grm`. All items in the graph have empty contexts.
pub(crate) fn lr0_stategraph<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
) -> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    let mut state0 = Itemset::new();
    state0.add(grm.start_rule(), SIdx(StorageT::zero()), &Vob::new());
    stategraph(grm, None, state0, Closure::LR0)
}

/// Create the canonical LR(1) `StateGraph` of `grm`. The start item's lookahead is epsilon.
pub(crate) fn lr1_stategraph<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: &GrammarFirsts<StorageT>,
) -> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    let mut state0 = Itemset::new();
    let mut ctx = falses(usize::from(grm.terminals_len()));
    ctx.set(usize::from(grm.epsilon_idx()), true);
    state0.add(grm.start_rule(), SIdx(StorageT::zero()), &ctx);
    stategraph(grm, Some(firsts), state0, Closure::LR1)
}

fn stategraph<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: Option<&GrammarFirsts<StorageT>>,
    state0: Itemset<StorageT>,
    closure: Closure,
) -> StateGraph<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    let close = |is: &Itemset<StorageT>| match (closure, firsts) {
        (Closure::LR1, Some(firsts)) => is.close(grm, firsts),
        _ => is.close_lr0(grm),
    };

    let mut core_states = vec![state0];
    let mut closed_states: Vec<Itemset<StorageT>> = Vec::new();
    let mut edges: Vec<Edges<StorageT>> = vec![Edges::default()];

    // A state's kernel is entirely made up of items whose dot has just passed the symbol the
    // state was reached by, so only states reached by the same symbol can ever be equal.
    let mut cnd_var_states: Vec<Vec<StIdx>> = vec![Vec::new(); usize::from(grm.variables_len())];
    let mut cnd_term_states: Vec<Vec<StIdx>> =
        vec![Vec::new(); usize::from(grm.terminals_len())];
    let mut new_states = Vec::new();

    let mut state_i = 0;
    while state_i < core_states.len() {
        let cl_state = close(&core_states[state_i]);
        {
            // Edges are created in the order their symbols first appear after a dot.
            let mut seen = Vec::new();
            for &(ridx, dot) in cl_state.items.keys() {
                let sym = match Itemset::next_symbol(grm, ridx, dot) {
                    Some(sym) => sym,
                    None => continue,
                };
                if seen.contains(&sym) {
                    continue;
                }
                seen.push(sym);
                new_states.push((sym, cl_state.goto(grm, &sym)));
            }
        }
        closed_states.push(cl_state);

        'a: for (sym, nstate) in new_states.drain(..) {
            let cnd_states = match sym {
                Symbol::Variable(vidx) => &mut cnd_var_states[usize::from(vidx)],
                Symbol::Terminal(tidx) => &mut cnd_term_states[usize::from(tidx)],
            };
            for &cnd in cnd_states.iter() {
                if core_states[usize::from(cnd)] == nstate {
                    edges[state_i].insert(sym, cnd);
                    continue 'a;
                }
            }
            let stidx = StIdx::from(core_states.len());
            cnd_states.push(stidx);
            edges[state_i].insert(sym, stidx);
            edges.push(Edges::default());
            core_states.push(nstate);
        }
        state_i += 1;
    }

    StateGraph::new(
        core_states.into_iter().zip(closed_states).collect(),
        StIdx::from(0usize),
        edges,
    )
}

#[cfg(test)]
mod test {
    use super::{lr0_stategraph, lr1_stategraph};
    use glrgrammar::{GrammarBuilder, GrammarFirsts, Symbol};

    #[test]
    fn test_every_goto_has_an_edge() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .terminal("b", "b")
            .rule("S", &["A", "S"])
            .rule("S", &[])
            .rule("A", &["a", "A", "b"])
            .rule("A", &["a"])
            .axiom("S")
            .build()
            .unwrap();
        let firsts = GrammarFirsts::new(&grm);
        for sg in [lr0_stategraph(&grm), lr1_stategraph(&grm, &firsts)] {
            for stidx in sg.iter_stidxs() {
                for &(ridx, dot) in sg.closed_state(stidx).items.keys() {
                    if let Some(sym) = grm.rule(ridx).symbols().get(usize::from(dot)) {
                        let target = sg.edge(stidx, *sym).unwrap();
                        assert!(sg
                            .core_state(target)
                            .items
                            .contains_key(&(ridx, glrgrammar::SIdx(dot.0 + 1))));
                    }
                }
                assert_eq!(
                    sg.edges(stidx).len(),
                    sg.edges(stidx).keys().collect::<std::collections::HashSet<_>>().len()
                );
            }
            let s0 = sg.start_state();
            assert!(sg.edge(s0, Symbol::Variable(grm.axiom())).is_some());
        }
    }
}
