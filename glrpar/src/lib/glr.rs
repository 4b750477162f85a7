//! A right nulled generalized LR (RNGLR) parser (Scott and Johnstone, "Right nulled GLR
//! parsers", TOPLAS 2006).
//!
//! The parse stack is a graph structured stack (GSS) whose nodes are grouped into generations:
//! generation `i` holds the stacks alive after `i` lexemes have been shifted. Edges point from a
//! node towards the bottom of the stack and are labelled with the forest node of the symbol
//! between the two. Each generation is built in two phases: the reducer applies every pending
//! reduction (which can add nodes to the current generation) and then the shifter consumes the
//! next lexeme, creating the next generation.
//!
//! With right nulled tables, a reduction can happen before the nullable suffix of its rule has
//! been recognised: the missing children are the shared empty derivations of the suffix's
//! variables. Ordinary tables are parsed too, at the cost of revisiting the reductions of the
//! current generation whenever an empty reduction adds an edge below one of its nodes
//! (Nozohoor-Farshi's correction of Tomita's algorithm).

use std::{collections::HashMap, error::Error, fmt, hash::Hash};

use glrgrammar::{Grammar, RIdx, Symbol, TIdx, VIdx};
use glrtable::{Action, StIdx, StateTable};
use log::{debug, trace};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    lex_api::{LexError, Lexeme},
    parser::eof_lexeme,
    sppf::{Family, Forest, SppfIdx, SppfNode},
};

/// The ways a generalized parse can fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GlrParseError<StorageT> {
    /// No stack could consume this lexeme.
    Unrecoverable(Lexeme<StorageT>),
    Lex(LexError),
}

impl<StorageT: Copy + fmt::Debug> Error for GlrParseError<StorageT> {}

impl<StorageT: Copy + fmt::Debug> fmt::Display for GlrParseError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GlrParseError::Unrecoverable(l) => write!(f, "Unrecoverable syntax error at {}", l),
            GlrParseError::Lex(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl<StorageT> From<LexError> for GlrParseError<StorageT> {
    fn from(err: LexError) -> Self {
        GlrParseError::Lex(err)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
struct GssIdx(usize);

#[derive(Debug)]
struct GssNode {
    stidx: StIdx,
    generation: usize,
    /// Edges towards the bottom of the stack, labelled with forest nodes.
    edges: Vec<(GssIdx, SppfIdx)>,
}

#[derive(Debug)]
struct Gss {
    nodes: Vec<GssNode>,
    /// The nodes of the current generation, by state.
    head: HashMap<StIdx, GssIdx>,
}

impl Gss {
    fn new() -> Self {
        Gss {
            nodes: Vec::new(),
            head: HashMap::new(),
        }
    }

    fn add_node(&mut self, stidx: StIdx, generation: usize) -> GssIdx {
        let idx = GssIdx(self.nodes.len());
        self.nodes.push(GssNode {
            stidx,
            generation,
            edges: Vec::new(),
        });
        self.head.insert(stidx, idx);
        idx
    }

    fn has_edge(&self, from: GssIdx, to: GssIdx) -> bool {
        self.nodes[from.0].edges.iter().any(|&(t, _)| t == to)
    }

    fn add_edge(&mut self, from: GssIdx, to: GssIdx, label: SppfIdx) {
        self.nodes[from.0].edges.push((to, label));
    }

    /// Every path of `len` edges starting at `from`: the node the path ends at and the path's
    /// labels, in the order they were walked.
    fn paths(&self, from: GssIdx, len: usize) -> Vec<(GssIdx, Vec<SppfIdx>)> {
        let mut paths = vec![(from, Vec::with_capacity(len))];
        for _ in 0..len {
            let mut next = Vec::new();
            for (n, labels) in paths {
                for &(to, label) in &self.nodes[n.0].edges {
                    let mut labels = labels.clone();
                    labels.push(label);
                    next.push((to, labels));
                }
            }
            paths = next;
        }
        paths
    }
}

/// A pending reduction of `ridx`, popping `len` symbols. If `label` is set, `node` is the node
/// below the edge labelled `label` (the last child of the reduction); otherwise the reduction
/// pops every path of `len` edges starting at `node`.
#[derive(Debug)]
struct Reduction<StorageT> {
    node: GssIdx,
    ridx: RIdx<StorageT>,
    len: usize,
    label: Option<SppfIdx>,
}

/// A pending shift from `node` to a new node in state `goto`.
#[derive(Debug)]
struct Shift {
    node: GssIdx,
    goto: StIdx,
}

struct GlrParser<'a, 'b, StorageT: 'static + Eq + Hash> {
    grm: &'a Grammar<StorageT>,
    stable: &'a StateTable<StorageT>,
    lexemes: &'b [Lexeme<StorageT>],
    gss: Gss,
    forest: Forest<StorageT>,
    reductions: Vec<Reduction<StorageT>>,
    shifts: Vec<Shift>,
    right_nulled: bool,
    /// The generation being built.
    generation: usize,
    /// Forest nodes created in the current generation, keyed by their variable and the
    /// generation they start at.
    recent: HashMap<(VIdx<StorageT>, usize), SppfIdx>,
    /// The shared empty derivation of each nullable variable, built on demand.
    epsilons: Vec<Option<SppfIdx>>,
}

/// Parse `lexemes`, returning a forest of every derivation of the input from the grammar's
/// axiom. `stable` may contain any number of actions per cell.
pub(crate) fn parse<StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    stable: &StateTable<StorageT>,
    lexemes: &[Lexeme<StorageT>],
) -> Result<Forest<StorageT>, GlrParseError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    let psr = GlrParser {
        grm,
        stable,
        lexemes,
        gss: Gss::new(),
        forest: Forest::new(),
        reductions: Vec::new(),
        shifts: Vec::new(),
        right_nulled: stable.is_right_nulled(),
        generation: 0,
        recent: HashMap::new(),
        epsilons: vec![None; usize::from(grm.variables_len())],
    };
    psr.parse()
}

impl<'a, 'b, StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned>
    GlrParser<'a, 'b, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn parse(mut self) -> Result<Forest<StorageT>, GlrParseError<StorageT>> {
        let ll = self.lexemes.len();
        let v0 = self.gss.add_node(self.stable.start_state(), 0);
        let la_tidx = self.tidx(0);
        for &a in self.stable.actions(self.stable.start_state(), la_tidx) {
            match a {
                Action::Shift(goto) => self.shifts.push(Shift { node: v0, goto }),
                Action::Reduce { ridx, len: 0 } => self.reductions.push(Reduction {
                    node: v0,
                    ridx,
                    len: 0,
                    label: None,
                }),
                _ => (),
            }
        }

        // The end marker is shifted like any other lexeme, after which the only action left is
        // to accept.
        for i in 0..=ll {
            self.generation = i;
            self.recent.clear();
            let la_tidx = self.tidx(i);
            while let Some(r) = self.reductions.pop() {
                self.reduce(la_tidx, r);
            }
            trace!(
                "Generation {}: {} stack heads, {} shifts",
                i,
                self.gss.head.len(),
                self.shifts.len()
            );
            if self.shifts.is_empty() {
                let lexeme = eof_lexeme(self.grm, self.lexemes, i);
                debug!("Unrecoverable syntax error at {}", lexeme);
                return Err(GlrParseError::Unrecoverable(lexeme));
            }
            self.shift(i);
        }

        self.generation = ll + 1;
        self.recent.clear();
        let la_tidx = self.tidx(ll + 1);
        while let Some(r) = self.reductions.pop() {
            self.reduce(la_tidx, r);
        }
        let accepted = self.gss.head.iter().find_map(|(&stidx, &w)| {
            self.stable
                .actions(stidx, la_tidx)
                .iter()
                .any(|a| matches!(a, Action::Accept))
                .then_some(w)
        });
        // The accepting node's only path to the bottom of the stack is the end marker followed
        // by the axiom.
        let root = accepted.and_then(|w| {
            self.gss
                .paths(w, 2)
                .into_iter()
                .find(|(n, _)| *n == v0)
                .map(|(_, labels)| labels[1])
        });
        match root {
            Some(r) => {
                self.forest.set_root(r);
                debug!(
                    "Accepted input of {} lexemes: {} stack nodes, {} forest nodes",
                    ll,
                    self.gss.nodes.len(),
                    self.forest.nodes_len()
                );
                Ok(self.forest)
            }
            None => Err(GlrParseError::Unrecoverable(eof_lexeme(
                self.grm,
                self.lexemes,
                ll,
            ))),
        }
    }

    /// The terminal at position `i` of the input: the end marker after the last lexeme and
    /// epsilon after that.
    fn tidx(&self, i: usize) -> TIdx<StorageT> {
        let ll = self.lexemes.len();
        if i < ll {
            TIdx(self.lexemes[i].tok_id())
        } else if i == ll {
            self.grm.dollar_idx()
        } else {
            self.grm.epsilon_idx()
        }
    }

    fn reduce(&mut self, la_tidx: TIdx<StorageT>, r: Reduction<StorageT>) {
        let Reduction {
            node: v,
            ridx,
            len: m,
            label,
        } = r;
        let grm = self.grm;
        let head = self.stable.production(ridx).head;
        let walk = if label.is_some() { m - 1 } else { m };
        for (u, path_labels) in self.gss.paths(v, walk) {
            let u_stidx = self.gss.nodes[u.0].stidx;
            let l = match self.stable.goto(u_stidx, head) {
                Some(l) => l,
                None => {
                    debug_assert!(false, "no goto from state {} on {:?}", u_stidx, head);
                    continue;
                }
            };
            let u_generation = self.gss.nodes[u.0].generation;
            // Reductions that start in the current generation derive the empty string, which
            // every variable shares.
            let z = if u_generation == self.generation {
                self.epsilon(head)
            } else {
                let key = (head, u_generation);
                match self.recent.get(&key) {
                    Some(&z) => z,
                    None => {
                        let z = self.forest.add_node(SppfNode::Nonterm { vidx: head });
                        self.recent.insert(key, z);
                        z
                    }
                }
            };

            // Right nulled tables have already reduced whatever an empty edge could be popped by.
            let pop_empty = m != 0 || !self.right_nulled;
            match self.gss.head.get(&l) {
                Some(&w) => {
                    if !self.gss.has_edge(w, u) {
                        self.gss.add_edge(w, u, z);
                        if pop_empty {
                            self.queue_reductions(l, la_tidx, u, z);
                        }
                        if !self.right_nulled {
                            self.requeue_reductions(la_tidx);
                        }
                    }
                }
                None => {
                    let w = self.gss.add_node(l, self.generation);
                    self.gss.add_edge(w, u, z);
                    self.queue_new_node(w, l, la_tidx);
                    if pop_empty {
                        self.queue_reductions(l, la_tidx, u, z);
                    }
                }
            }

            let mut children = path_labels.into_iter().rev().collect::<Vec<_>>();
            children.extend(label);
            for sym in &grm.rule(ridx).symbols()[m..] {
                if let Symbol::Variable(vidx) = *sym {
                    children.push(self.epsilon(vidx));
                }
            }
            self.forest.add_family(z, Family { ridx, children });
        }
    }

    fn shift(&mut self, i: usize) {
        let lexeme = eof_lexeme(self.grm, self.lexemes, i);
        let z = self.forest.add_node(SppfNode::Term { lexeme });
        let la_tidx = self.tidx(i + 1);
        self.gss.head.clear();
        for Shift { node: v, goto: k } in std::mem::take(&mut self.shifts) {
            match self.gss.head.get(&k) {
                Some(&w) => self.gss.add_edge(w, v, z),
                None => {
                    let w = self.gss.add_node(k, i + 1);
                    self.gss.add_edge(w, v, z);
                    self.queue_new_node(w, k, la_tidx);
                }
            }
            self.queue_reductions(k, la_tidx, v, z);
        }
    }

    /// Queue the shifts and empty reductions of the new node `w` in state `stidx`.
    fn queue_new_node(&mut self, w: GssIdx, stidx: StIdx, la_tidx: TIdx<StorageT>) {
        for &a in self.stable.actions(stidx, la_tidx) {
            match a {
                Action::Shift(goto) => self.shifts.push(Shift { node: w, goto }),
                Action::Reduce { ridx, len: 0 } => self.reductions.push(Reduction {
                    node: w,
                    ridx,
                    len: 0,
                    label: None,
                }),
                _ => (),
            }
        }
    }

    /// Queue the non-empty reductions of state `stidx` whose last popped edge is the one labelled
    /// `label` above `u`.
    fn queue_reductions(
        &mut self,
        stidx: StIdx,
        la_tidx: TIdx<StorageT>,
        u: GssIdx,
        label: SppfIdx,
    ) {
        for &a in self.stable.actions(stidx, la_tidx) {
            if let Action::Reduce { ridx, len } = a {
                if len > 0 {
                    self.reductions.push(Reduction {
                        node: u,
                        ridx,
                        len,
                        label: Some(label),
                    });
                }
            }
        }
    }

    /// Queue, from every node of the current generation, the reductions popping more than one
    /// edge. A new edge below a node of this generation extends the paths of the nodes stacked on
    /// it by empty reductions. Reductions already done find their edges in place and only add
    /// families the forest already has.
    fn requeue_reductions(&mut self, la_tidx: TIdx<StorageT>) {
        let heads = self
            .gss
            .head
            .iter()
            .map(|(&stidx, &x)| (stidx, x))
            .collect::<Vec<_>>();
        for (stidx, x) in heads {
            for &a in self.stable.actions(stidx, la_tidx) {
                if let Action::Reduce { ridx, len } = a {
                    if len > 1 {
                        self.reductions.push(Reduction {
                            node: x,
                            ridx,
                            len,
                            label: None,
                        });
                    }
                }
            }
        }
    }

    /// The forest node of the empty derivation of `vidx`.
    fn epsilon(&mut self, vidx: VIdx<StorageT>) -> SppfIdx {
        if let Some(idx) = self.epsilons[usize::from(vidx)] {
            return idx;
        }
        let idx = self.forest.add_node(SppfNode::Nonterm { vidx });
        self.epsilons[usize::from(vidx)] = Some(idx);
        match self.stable.nullable_rule(vidx) {
            Some(ridx) => {
                let grm = self.grm;
                let children = grm
                    .rule(ridx)
                    .symbols()
                    .iter()
                    .filter_map(|sym| match *sym {
                        Symbol::Variable(v) => Some(self.epsilon(v)),
                        Symbol::Terminal(_) => None,
                    })
                    .collect();
                self.forest.add_family(idx, Family { ridx, children });
            }
            None => debug_assert!(false, "{} is not nullable", self.grm.variable_name(vidx)),
        }
        idx
    }
}

#[cfg(test)]
mod test {
    use glrgrammar::{Grammar, GrammarBuilder, Span};
    use glrtable::Method;

    use super::*;
    use crate::{
        parser::{test::table, RTParserBuilder},
        test_utils::SmallLexer,
    };

    fn glr_parse(
        grm: &Grammar<u32>,
        method: Method,
        input: &str,
    ) -> Result<Forest<u32>, GlrParseError<u32>> {
        let stable = table(grm, method);
        RTParserBuilder::new(grm, &stable).parse_generalized(&SmallLexer::new(grm, input))
    }

    fn sum_grammar() -> Grammar<u32> {
        GrammarBuilder::new("sum")
            .terminal("+", "\\+")
            .terminal("id", "[a-z]")
            .rule("E", &["E", "+", "E"])
            .rule("E", &["id"])
            .axiom("E")
            .build()
            .unwrap()
    }

    #[test]
    fn ambiguous_sums() {
        let grm = sum_grammar();
        for method in [Method::GLR1, Method::GLALR1, Method::RNGLR1, Method::RNGLALR1] {
            let forest = glr_parse(&grm, method, "a").unwrap();
            assert_eq!(forest.count_trees(), Some(1));
            assert!(!forest.is_ambiguous());

            let forest = glr_parse(&grm, method, "a+b").unwrap();
            assert_eq!(forest.count_trees(), Some(1));

            let forest = glr_parse(&grm, method, "a+b+c").unwrap();
            assert!(forest.is_ambiguous());
            assert_eq!(forest.count_trees(), Some(2));
            assert_eq!(forest.families(forest.root()).count(), 2);

            let forest = glr_parse(&grm, method, "a+b+c+d").unwrap();
            assert_eq!(forest.count_trees(), Some(5));
            let stable = table(&grm, method);
            let mut trees = forest
                .trees(&grm, &stable)
                .map(|t| {
                    let leaves = t.leaves().iter().map(|l| l.span()).collect::<Vec<_>>();
                    assert_eq!(leaves, (0..7).map(|i| Span::new(i, i + 1)).collect::<Vec<_>>());
                    t.pp(&grm, "a+b+c+d")
                })
                .collect::<Vec<_>>();
            assert_eq!(trees.len(), 5);
            trees.sort();
            trees.dedup();
            assert_eq!(trees.len(), 5);
        }
    }

    #[test]
    fn first_tree_yield() {
        let grm = sum_grammar();
        let stable = table(&grm, Method::GLALR1);
        let input = "a+b+c+d";
        let forest = RTParserBuilder::new(&grm, &stable)
            .parse_generalized(&SmallLexer::new(&grm, input))
            .unwrap();
        let pt = forest.first_tree(&grm, &stable);
        let leaves = pt.leaves().iter().map(|l| l.span()).collect::<Vec<_>>();
        assert_eq!(leaves, (0..7).map(|i| Span::new(i, i + 1)).collect::<Vec<_>>());
    }

    #[test]
    fn first_tree_follows_family_order() {
        // "a" is both `S(A(a))` and `S(B(C(a)))`.
        let grm = GrammarBuilder::new("t")
            .terminal("a", "a")
            .rule("S", &["A"])
            .rule("S", &["B"])
            .rule("A", &["a"])
            .rule("B", &["C"])
            .rule("C", &["a"])
            .axiom("S")
            .build()
            .unwrap();
        let s_a = grm.var_rules(grm.variable_idx("S").unwrap())[0];
        for method in [Method::GLR1, Method::GLALR1, Method::RNGLR1, Method::RNGLALR1] {
            let stable = table(&grm, method);
            let forest = glr_parse(&grm, method, "a").unwrap();
            assert_eq!(forest.count_trees(), Some(2));
            let trees = forest
                .trees(&grm, &stable)
                .map(|t| t.pp(&grm, "a"))
                .collect::<Vec<_>>();
            let first = forest.families(forest.root()).next().unwrap().ridx;
            let (short, long) = ("S\n A\n  a a\n", "S\n B\n  C\n   a a\n");
            if first == s_a {
                assert_eq!(trees, vec![short, long]);
            } else {
                assert_eq!(trees, vec![long, short]);
            }
            assert_eq!(forest.first_tree(&grm, &stable).pp(&grm, "a"), trees[0]);
        }
    }

    #[test]
    fn right_nulled_forests() {
        // S -> b S A | ε; A -> ε
        let grm = GrammarBuilder::new("gamma2")
            .terminal("b", "b")
            .rule("S", &["b", "S", "A"])
            .rule("S", &[])
            .rule("A", &[])
            .axiom("S")
            .build()
            .unwrap();
        for method in [Method::GLR1, Method::GLALR1, Method::RNGLR1, Method::RNGLALR1] {
            let stable = table(&grm, method);
            let forest = RTParserBuilder::new(&grm, &stable)
                .parse_generalized(&SmallLexer::new(&grm, "bb"))
                .unwrap();
            assert!(!forest.is_ambiguous());
            assert_eq!(forest.count_trees(), Some(1));
            assert_eq!(
                forest.first_tree(&grm, &stable).pp(&grm, "bb"),
                "S\n b b\n S\n  b b\n  S\n  A\n A\n"
            );

            let forest = RTParserBuilder::new(&grm, &stable)
                .parse_generalized(&SmallLexer::new(&grm, ""))
                .unwrap();
            assert_eq!(forest.count_trees(), Some(1));
            assert_eq!(forest.first_tree(&grm, &stable).pp(&grm, ""), "S\n");
        }
    }

    #[test]
    fn nullable_ambiguity() {
        // "ab" is either `a N(b) N()` or `a N() N(b)`.
        let grm = GrammarBuilder::new("t")
            .terminal("a", "a")
            .terminal("b", "b")
            .rule("S", &["a", "N", "N"])
            .rule("N", &["b"])
            .rule("N", &["M", "M"])
            .rule("M", &[])
            .axiom("S")
            .build()
            .unwrap();
        for method in [Method::GLR1, Method::GLALR1, Method::RNGLR1, Method::RNGLALR1] {
            let forest = glr_parse(&grm, method, "a").unwrap();
            assert_eq!(forest.count_trees(), Some(1));
            let forest = glr_parse(&grm, method, "ab").unwrap();
            assert!(forest.is_ambiguous());
            assert_eq!(forest.count_trees(), Some(2));
            let forest = glr_parse(&grm, method, "abb").unwrap();
            assert_eq!(forest.count_trees(), Some(1));
            assert!(matches!(
                glr_parse(&grm, method, "abbb"),
                Err(GlrParseError::Unrecoverable(_))
            ));
        }
    }

    #[test]
    fn empty_reductions_below_reductions() {
        // The stack node reached by reducing the second `A` to nothing is below the reduction of
        // `S`, and so is the node reached by reducing the first one.
        let grm = GrammarBuilder::new("t")
            .terminal("a", "a")
            .rule("S", &["A", "A"])
            .rule("A", &["a"])
            .rule("A", &[])
            .axiom("S")
            .build()
            .unwrap();
        for method in [Method::GLR1, Method::GLALR1, Method::RNGLR1, Method::RNGLALR1] {
            let stable = table(&grm, method);
            let forest = glr_parse(&grm, method, "").unwrap();
            assert_eq!(forest.count_trees(), Some(1));
            assert_eq!(forest.first_tree(&grm, &stable).pp(&grm, ""), "S\n A\n A\n");

            let forest = glr_parse(&grm, method, "a").unwrap();
            assert!(forest.is_ambiguous());
            assert_eq!(forest.count_trees(), Some(2));
            let mut trees = forest
                .trees(&grm, &stable)
                .map(|t| t.pp(&grm, "a"))
                .collect::<Vec<_>>();
            trees.sort();
            assert_eq!(
                trees,
                vec!["S\n A\n  a a\n A\n", "S\n A\n A\n  a a\n"]
            );

            let forest = glr_parse(&grm, method, "aa").unwrap();
            assert_eq!(forest.count_trees(), Some(1));
            assert!(matches!(
                glr_parse(&grm, method, "aaa"),
                Err(GlrParseError::Unrecoverable(_))
            ));
        }
    }

    #[test]
    fn empty_derivations_are_shared() {
        // Both rules of `S` derive the empty string.
        let grm = GrammarBuilder::new("t")
            .terminal("a", "a")
            .rule("S", &["A", "A"])
            .rule("S", &[])
            .rule("A", &["a"])
            .rule("A", &[])
            .axiom("S")
            .build()
            .unwrap();
        for method in [Method::GLR1, Method::GLALR1, Method::RNGLR1, Method::RNGLALR1] {
            let forest = glr_parse(&grm, method, "").unwrap();
            assert_eq!(forest.count_trees(), Some(2));
            let forest = glr_parse(&grm, method, "a").unwrap();
            assert_eq!(forest.count_trees(), Some(2));
        }
    }

    #[test]
    fn tree_actions_apply() {
        let grm = GrammarBuilder::new("t")
            .terminal("[", "\\[")
            .terminal("]", "\\]")
            .terminal("x", "x")
            .rule("S", &["List"])
            .rule("List", &["[!", "x*", "@items", "]!"])
            .axiom("S")
            .build()
            .unwrap();
        let stable = table(&grm, Method::GLALR1);
        let forest = RTParserBuilder::new(&grm, &stable)
            .parse_generalized(&SmallLexer::new(&grm, "[xxx]"))
            .unwrap();
        assert_eq!(forest.count_trees(), Some(1));
        assert_eq!(
            forest.first_tree(&grm, &stable).pp(&grm, "[xxx]"),
            "S\n List\n  x x\n  x x\n  x x\n  @items\n"
        );
    }

    #[test]
    fn syntax_errors() {
        let grm = sum_grammar();
        match glr_parse(&grm, Method::GLR1, "a++b") {
            Err(GlrParseError::Unrecoverable(l)) => assert_eq!(l.span(), Span::new(2, 3)),
            _ => panic!(),
        }
        // Running out of input is reported at the end marker.
        match glr_parse(&grm, Method::GLR1, "a+") {
            Err(GlrParseError::Unrecoverable(l)) => {
                assert_eq!(l.tok_id(), grm.dollar_idx().as_storaget());
                assert_eq!(l.span(), Span::new(2, 2));
            }
            _ => panic!(),
        }
        match glr_parse(&grm, Method::GLR1, "") {
            Err(GlrParseError::Unrecoverable(l)) => assert_eq!(l.span(), Span::new(0, 0)),
            _ => panic!(),
        }
        match glr_parse(&grm, Method::GLR1, "a#") {
            Err(GlrParseError::Lex(e)) => assert_eq!(e.span(), Span::new(1, 2)),
            _ => panic!(),
        }
    }
}
