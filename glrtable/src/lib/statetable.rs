use std::{error::Error, fmt, hash::Hash};

use glrgrammar::{
    AIdx, BodyElement, Grammar, GrammarFirsts, RIdx, Symbol, TIdx, TreeAction, VIdx, VtIdx,
};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sparsevec::SparseVec;

use crate::{conflicts::Report, stategraph::StateGraph, StIdx};

/// Returned by [from_grammar](crate::from_grammar) when at least one conflict is fatal for the
/// requested method. The full report, including non-fatal conflicts, is carried along.
#[derive(Debug)]
pub struct StateTableError<StorageT> {
    pub report: Report<StorageT>,
}

impl<StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned> Error
    for StateTableError<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
}

impl<StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned> fmt::Display
    for StateTableError<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fatal = self
            .report
            .conflicts()
            .iter()
            .filter(|c| c.is_fatal())
            .collect::<Vec<_>>();
        write!(f, "{} fatal conflict(s):", fatal.len())?;
        for c in fatal {
            write!(f, "\n{}", c)?;
        }
        Ok(())
    }
}

/// One action of a state table cell.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Action<StorageT> {
    /// Shift to state X in the statetable.
    Shift(StIdx),
    /// Reduce the first `len` symbols of rule `ridx`.
    Reduce { ridx: RIdx<StorageT>, len: usize },
    /// Accept this input.
    Accept,
}

/// How a reduction of a rule builds its tree node, in body order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProductionOp<StorageT> {
    /// Take the next child popped for a grammar symbol, applying the action to it.
    Pop(TreeAction),
    /// Insert a virtual node, applying the action to it.
    Virtual(VtIdx<StorageT>, TreeAction),
    /// Run a semantic action on the children built so far.
    SemanticAction(AIdx<StorageT>),
}

/// The reduction data of one rule.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Production<StorageT> {
    pub head: VIdx<StorageT>,
    pub head_action: TreeAction,
    /// How many grammar symbols the rule's body has.
    pub symbols_len: usize,
    pub ops: Vec<ProductionOp<StorageT>>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Production<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn new(grm: &Grammar<StorageT>, ridx: RIdx<StorageT>) -> Self {
        let rule = grm.rule(ridx);
        let ops = rule
            .elements()
            .iter()
            .map(|e| match *e {
                BodyElement::Symbol { action, .. } => ProductionOp::Pop(action),
                BodyElement::Virtual { vtidx, action } => ProductionOp::Virtual(vtidx, action),
                BodyElement::SemanticAction(aidx) => ProductionOp::SemanticAction(aidx),
            })
            .collect();
        Production {
            head: rule.head(),
            head_action: rule.head_action(),
            symbols_len: rule.symbols_len(),
            ops,
        }
    }
}

/// The exported automaton: everything a parser runtime needs, and nothing else.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateTable<StorageT> {
    /// Each distinct non-empty action cell. Cells are shared between all the (state, terminal)
    /// pairs with identical actions.
    cells: Vec<Vec<Action<StorageT>>>,
    /// For each (state, terminal), `cell index + 1`, or 0 for an error cell.
    action_cells: SparseVec<usize>,
    /// For each (state, variable), `target state + 1`, or 0 if there is no goto.
    gotos: SparseVec<usize>,
    productions: Vec<Production<StorageT>>,
    nullable_rules: Vec<Option<RIdx<StorageT>>>,
    expected: Vec<Vec<TIdx<StorageT>>>,
    right_nulled: bool,
    terms_len: usize,
    states_len: usize,
    start_state: StIdx,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StateTable<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Export `sg`, whose reductions must already have been built.
    pub(crate) fn new(
        grm: &Grammar<StorageT>,
        firsts: &GrammarFirsts<StorageT>,
        sg: &StateGraph<StorageT>,
    ) -> Self {
        let terms_len = usize::from(grm.terminals_len());
        let vars_len = usize::from(grm.variables_len());
        let states_len = usize::from(sg.all_states_len());

        let mut cells: Vec<Vec<Action<StorageT>>> = Vec::new();
        let mut action_cells = vec![0; states_len * terms_len];
        let mut gotos = vec![0; states_len * vars_len];
        let mut expected = Vec::with_capacity(states_len);
        let mut right_nulled = false;
        for stidx in sg.iter_stidxs() {
            let mut row: Vec<Vec<Action<StorageT>>> = vec![Vec::new(); terms_len];
            for (sym, target) in sg.edges(stidx) {
                match *sym {
                    Symbol::Terminal(tidx) => row[usize::from(tidx)].push(Action::Shift(*target)),
                    Symbol::Variable(vidx) => {
                        gotos[usize::from(stidx) * vars_len + usize::from(vidx)] =
                            usize::from(*target) + 1;
                    }
                }
            }
            for red in sg.reductions(stidx) {
                right_nulled |= red.len < grm.rule(red.ridx).symbols().len();
                let action = if red.ridx == grm.start_rule() {
                    Action::Accept
                } else {
                    Action::Reduce {
                        ridx: red.ridx,
                        len: red.len,
                    }
                };
                row[usize::from(red.lookahead)].push(action);
            }
            let mut st_expected = Vec::new();
            for (tidx, cell) in row.into_iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                st_expected.push(TIdx(tidx.as_()));
                let cidx = match cells.iter().position(|c| *c == cell) {
                    Some(cidx) => cidx,
                    None => {
                        cells.push(cell);
                        cells.len() - 1
                    }
                };
                action_cells[usize::from(stidx) * terms_len + tidx] = cidx + 1;
            }
            expected.push(st_expected);
        }

        StateTable {
            cells,
            action_cells: SparseVec::<usize>::from(&action_cells, 0, terms_len),
            gotos: SparseVec::<usize>::from(&gotos, 0, vars_len),
            productions: grm.iter_ridxs().map(|ridx| Production::new(grm, ridx)).collect(),
            nullable_rules: grm.iter_vidxs().map(|vidx| firsts.nullable_rule(vidx)).collect(),
            expected,
            right_nulled,
            terms_len,
            states_len,
            start_state: sg.start_state(),
        }
    }

    /// The actions of state `stidx` on terminal `tidx`. An empty slice is a syntax error.
    pub fn actions(&self, stidx: StIdx, tidx: TIdx<StorageT>) -> &[Action<StorageT>] {
        match self
            .action_cells
            .get(usize::from(stidx), usize::from(tidx))
        {
            Some(c) if c > 0 => &self.cells[c - 1],
            _ => &[],
        }
    }

    /// The first action of state `stidx` on terminal `tidx`, if there is one. For tables without
    /// conflicts this is the only action.
    pub fn action(&self, stidx: StIdx, tidx: TIdx<StorageT>) -> Option<Action<StorageT>> {
        self.actions(stidx, tidx).first().cloned()
    }

    /// Does any reduction of this table pop fewer symbols than its rule has (i.e. was it built by
    /// a right nulled method for a grammar with nullable rule suffixes)?
    pub fn is_right_nulled(&self) -> bool {
        self.right_nulled
    }

    /// The state to go to after reducing to `vidx` with `stidx` on top of the stack.
    pub fn goto(&self, stidx: StIdx, vidx: VIdx<StorageT>) -> Option<StIdx> {
        match self.gotos.get(usize::from(stidx), usize::from(vidx)) {
            Some(s) if s > 0 => Some(StIdx::from(s - 1)),
            _ => None,
        }
    }

    /// The terminals state `stidx` has at least one action for.
    pub fn state_expected(&self, stidx: StIdx) -> &[TIdx<StorageT>] {
        &self.expected[usize::from(stidx)]
    }

    pub fn production(&self, ridx: RIdx<StorageT>) -> &Production<StorageT> {
        &self.productions[usize::from(ridx)]
    }

    /// If `vidx` is nullable, the rule from which its epsilon tree is built.
    pub fn nullable_rule(&self, vidx: VIdx<StorageT>) -> Option<RIdx<StorageT>> {
        self.nullable_rules[usize::from(vidx)]
    }

    pub fn start_state(&self) -> StIdx {
        self.start_state
    }

    pub fn states_len(&self) -> StIdx {
        StIdx::from(self.states_len)
    }

    pub fn terms_len(&self) -> usize {
        self.terms_len
    }

    /// Does every cell hold at most one action?
    pub fn is_deterministic(&self) -> bool {
        self.cells.iter().all(|c| c.len() <= 1)
    }
}

#[cfg(test)]
mod test {
    use super::{Action, ProductionOp};
    use crate::{from_grammar, Method, StIdx};
    use glrgrammar::{GrammarBuilder, Symbol, TreeAction};

    #[test]
    fn test_statetable() {
        // Taken from p19 of www.cs.umd.edu/~mvz/cmsc430-s07/M10lr.pdf
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("-", "-")
            .terminal("*", "\\*")
            .terminal("x", "x")
            .rule("Expr", &["Term", "-", "Expr"])
            .rule("Expr", &["Term"])
            .rule("Term", &["Factor", "*", "Term"])
            .rule("Term", &["Factor"])
            .rule("Factor", &["x"])
            .axiom("Expr")
            .build()
            .unwrap();
        let (sg, st, report) = from_grammar(&grm, Method::LALR1).unwrap();
        assert!(report.conflicts().is_empty());
        assert!(st.is_deterministic());
        assert_eq!(st.states_len(), sg.all_states_len());

        let s0 = st.start_state();
        let x = grm.terminal_idx("x").unwrap();
        let minus = grm.terminal_idx("-").unwrap();
        let times = grm.terminal_idx("*").unwrap();
        let dollar = grm.dollar_idx();
        let s_x = match st.action(s0, x) {
            Some(Action::Shift(s)) => s,
            _ => panic!(),
        };
        assert_eq!(Some(s_x), sg.edge(s0, Symbol::Terminal(x)));
        let factor = grm.var_rules(grm.variable_idx("Factor").unwrap())[0];
        for t in [minus, times, dollar] {
            assert_eq!(
                st.action(s_x, t),
                Some(Action::Reduce {
                    ridx: factor,
                    len: 1
                })
            );
        }
        assert_eq!(st.action(s_x, x), None);
        assert_eq!(st.state_expected(s_x), &[dollar, minus, times]);

        let s_expr = st.goto(s0, grm.axiom()).unwrap();
        let s_end = match st.action(s_expr, dollar) {
            Some(Action::Shift(s)) => s,
            _ => panic!(),
        };
        assert_eq!(st.action(s_end, grm.epsilon_idx()), Some(Action::Accept));
        assert_eq!(st.goto(s_x, grm.axiom()), None);
        assert_eq!(st.nullable_rule(grm.axiom()), None);
        assert!(usize::from(st.states_len()) > usize::from(StIdx::from(0usize)));
    }

    #[test]
    fn productions() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("+", "\\+")
            .terminal("id", "[a-z]+")
            .rule("E", &["E", "+^", "E", "@sum", "{add}"])
            .rule("E", &["id"])
            .rule("L", &["E*"])
            .axiom("L")
            .build()
            .unwrap();
        let (_, st, _) = from_grammar(&grm, Method::GLR1).unwrap();
        let p = st.production(grm.var_rules(grm.variable_idx("E").unwrap())[0]);
        assert_eq!(p.symbols_len, 3);
        assert_eq!(p.head_action, TreeAction::None);
        assert_eq!(
            p.ops,
            vec![
                ProductionOp::Pop(TreeAction::None),
                ProductionOp::Pop(TreeAction::Promote),
                ProductionOp::Pop(TreeAction::None),
                ProductionOp::Virtual(glrgrammar::VtIdx(0), TreeAction::None),
                ProductionOp::SemanticAction(glrgrammar::AIdx(0)),
            ]
        );
        let star = grm.variable_idx("E*").unwrap();
        let p = st.production(grm.var_rules(star)[0]);
        assert_eq!(p.head_action, TreeAction::Replace);
        assert_eq!(st.nullable_rule(star), Some(grm.var_rules(star)[0]));
        assert_eq!(
            st.nullable_rule(grm.variable_idx("L").unwrap()),
            Some(grm.var_rules(grm.variable_idx("L").unwrap())[0])
        );
    }

    #[test]
    fn multi_action_cells() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("+", "\\+")
            .terminal("id", "[a-z]+")
            .rule("E", &["E", "+", "E"])
            .rule("E", &["id"])
            .axiom("E")
            .build()
            .unwrap();
        let (_, st, report) = from_grammar(&grm, Method::GLALR1).unwrap();
        let c = &report.conflicts()[0];
        let actions = st.actions(c.stidx(), c.lookahead());
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], Action::Shift(_)));
        assert!(matches!(actions[1], Action::Reduce { len: 3, .. }));
    }

    #[test]
    fn right_nulled_tables() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .rule("S", &["A", "A"])
            .rule("A", &["a"])
            .rule("A", &[])
            .axiom("S")
            .build()
            .unwrap();
        for m in [Method::RNGLR1, Method::RNGLALR1] {
            let (_, st, _) = from_grammar(&grm, m).unwrap();
            assert!(st.is_right_nulled());
        }
        for m in [Method::GLR1, Method::GLALR1] {
            let (_, st, _) = from_grammar(&grm, m).unwrap();
            assert!(!st.is_right_nulled());
        }

        // Without nullable suffixes there is nothing to right null.
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .rule("S", &["a", "S"])
            .rule("S", &["a"])
            .axiom("S")
            .build()
            .unwrap();
        let (_, st, _) = from_grammar(&grm, Method::RNGLR1).unwrap();
        assert!(!st.is_right_nulled());
    }
}
