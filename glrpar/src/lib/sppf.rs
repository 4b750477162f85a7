//! Shared packed parse forests, the result of generalized parsing.
//!
//! A forest is a graph of [SppfNode]s. Each variable node has one or more [Family]s: alternative
//! lists of children, each resulting from reducing one rule. A node with more than one family is
//! an ambiguity. Cycles are possible when the grammar has cyclic derivations (e.g. `S -> S`).

use std::{fmt::Debug, hash::Hash, iter};

use cactus::Cactus;
use glrgrammar::{Grammar, RIdx, VIdx};
use glrtable::StateTable;
use indexmap::IndexSet;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    lex_api::Lexeme,
    parser::{shape, Node},
};

/// The index of a node in a [Forest].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SppfIdx(pub usize);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SppfNode<StorageT> {
    /// A lexeme consumed by the parser.
    Term { lexeme: Lexeme<StorageT> },
    /// A variable deriving a (possibly empty) run of lexemes.
    Nonterm { vidx: VIdx<StorageT> },
}

/// One way of deriving a variable node: the rule reduced and one child per symbol of its body.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Family<StorageT> {
    pub ridx: RIdx<StorageT>,
    pub children: Vec<SppfIdx>,
}

#[derive(Debug)]
pub struct Forest<StorageT> {
    nodes: Vec<SppfNode<StorageT>>,
    families: Vec<IndexSet<Family<StorageT>>>,
    root: SppfIdx,
}

#[derive(Clone, Copy, PartialEq)]
enum Colour {
    White,
    Grey,
    Black,
}

impl<StorageT: 'static + Debug + Hash + PrimInt + Unsigned> Forest<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub(crate) fn new() -> Self {
        Forest {
            nodes: Vec::new(),
            families: Vec::new(),
            root: SppfIdx(0),
        }
    }

    pub(crate) fn add_node(&mut self, node: SppfNode<StorageT>) -> SppfIdx {
        self.nodes.push(node);
        self.families.push(IndexSet::new());
        SppfIdx(self.nodes.len() - 1)
    }

    /// Add a family to `idx`. Returns `false` if `idx` already had an identical family.
    pub(crate) fn add_family(&mut self, idx: SppfIdx, family: Family<StorageT>) -> bool {
        debug_assert!(matches!(self.nodes[idx.0], SppfNode::Nonterm { .. }));
        self.families[idx.0].insert(family)
    }

    pub(crate) fn set_root(&mut self, idx: SppfIdx) {
        self.root = idx;
    }

    /// The node deriving the whole input from the grammar's axiom.
    pub fn root(&self) -> SppfIdx {
        self.root
    }

    pub fn node(&self, idx: SppfIdx) -> &SppfNode<StorageT> {
        &self.nodes[idx.0]
    }

    /// The families of `idx`, in the order they were discovered. Terminal nodes have none.
    pub fn families(&self, idx: SppfIdx) -> impl Iterator<Item = &Family<StorageT>> {
        self.families[idx.0].iter()
    }

    /// How many nodes does this forest contain? This includes nodes built during parsing which
    /// turned out not to be reachable from the root.
    pub fn nodes_len(&self) -> usize {
        self.nodes.len()
    }

    /// The indices of every node reachable from the root, in depth first order.
    pub fn reachable(&self) -> Vec<SppfIdx> {
        let mut seen = vec![false; self.nodes.len()];
        let mut todo = vec![self.root];
        let mut out = Vec::new();
        while let Some(idx) = todo.pop() {
            if seen[idx.0] {
                continue;
            }
            seen[idx.0] = true;
            out.push(idx);
            for f in self.families[idx.0].iter().rev() {
                todo.extend(f.children.iter().rev());
            }
        }
        out
    }

    /// Does the input have more than one derivation?
    pub fn is_ambiguous(&self) -> bool {
        self.reachable()
            .into_iter()
            .any(|idx| self.families[idx.0].len() > 1)
    }

    /// Count the distinct derivation trees in this forest. Returns `None` if there are infinitely
    /// many (i.e. the forest is cyclic) or if the count overflows a `usize`.
    pub fn count_trees(&self) -> Option<usize> {
        let mut colours = vec![Colour::White; self.nodes.len()];
        let mut counts = vec![0; self.nodes.len()];
        self.count_from(self.root, &mut colours, &mut counts)
    }

    fn count_from(
        &self,
        idx: SppfIdx,
        colours: &mut [Colour],
        counts: &mut [usize],
    ) -> Option<usize> {
        match colours[idx.0] {
            Colour::Black => return Some(counts[idx.0]),
            Colour::Grey => return None,
            Colour::White => (),
        }
        if let SppfNode::Term { .. } = self.nodes[idx.0] {
            colours[idx.0] = Colour::Black;
            counts[idx.0] = 1;
            return Some(1);
        }
        colours[idx.0] = Colour::Grey;
        let mut total = 0usize;
        for f in &self.families[idx.0] {
            let mut prod = 1usize;
            for &c in &f.children {
                prod = prod.checked_mul(self.count_from(c, colours, counts)?)?;
            }
            total = total.checked_add(prod)?;
        }
        colours[idx.0] = Colour::Black;
        counts[idx.0] = total;
        Some(total)
    }

    /// Extract one parse tree from the forest, applying the grammar's tree actions. Each node
    /// takes its first family, unless that would make the node its own descendant, in which case
    /// the next family is tried. A node whose families all lead back to an ancestor falls back to
    /// its smallest finite derivation.
    pub fn first_tree(
        &self,
        grm: &Grammar<StorageT>,
        stable: &StateTable<StorageT>,
    ) -> Node<StorageT> {
        let ranks = self.ranks();
        let mut on_path = vec![false; self.nodes.len()];
        self.tree_from(grm, stable, &ranks, &mut on_path, self.root)
    }

    /// Every parse tree of the forest, with the grammar's tree actions applied, in family order.
    /// Trees in which a node is its own descendant are skipped, so a cyclic forest yields
    /// finitely many trees.
    pub fn trees<'a>(
        &'a self,
        grm: &'a Grammar<StorageT>,
        stable: &'a StateTable<StorageT>,
    ) -> impl Iterator<Item = Node<StorageT>> + 'a {
        self.trees_from(grm, stable, self.root, Cactus::new())
    }

    fn trees_from<'a>(
        &'a self,
        grm: &'a Grammar<StorageT>,
        stable: &'a StateTable<StorageT>,
        idx: SppfIdx,
        path: Cactus<SppfIdx>,
    ) -> Box<dyn Iterator<Item = Node<StorageT>> + 'a> {
        match self.nodes[idx.0] {
            SppfNode::Term { lexeme } => Box::new(iter::once(Node::Term {
                lexeme,
                nodes: Vec::new(),
            })),
            SppfNode::Nonterm { .. } => {
                if path.vals().any(|&p| p == idx) {
                    return Box::new(iter::empty());
                }
                let path = path.child(idx);
                Box::new(self.families[idx.0].iter().flat_map(move |f| {
                    self.combinations(grm, stable, &f.children, path.clone())
                        .map(move |children| shape(grm, stable, f.ridx, children, None))
                }))
            }
        }
    }

    /// Every way of picking one tree for each of `children`.
    fn combinations<'a>(
        &'a self,
        grm: &'a Grammar<StorageT>,
        stable: &'a StateTable<StorageT>,
        children: &'a [SppfIdx],
        path: Cactus<SppfIdx>,
    ) -> Box<dyn Iterator<Item = Vec<Node<StorageT>>> + 'a> {
        match children.split_first() {
            None => Box::new(iter::once(Vec::new())),
            Some((&first, rest)) => Box::new(
                self.trees_from(grm, stable, first, path.clone())
                    .flat_map(move |t| {
                        self.combinations(grm, stable, rest, path.clone())
                            .map(move |mut ts| {
                                ts.insert(0, t.clone());
                                ts
                            })
                    }),
            ),
        }
    }

    /// The height of the smallest finite derivation of each node (`None` if it has none).
    fn ranks(&self) -> Vec<Option<usize>> {
        let mut ranks = self
            .nodes
            .iter()
            .map(|n| match n {
                SppfNode::Term { .. } => Some(0),
                SppfNode::Nonterm { .. } => None,
            })
            .collect::<Vec<_>>();
        let mut changed = true;
        while changed {
            changed = false;
            for idx in 0..self.nodes.len() {
                let best = self.families[idx]
                    .iter()
                    .filter_map(|f| {
                        f.children
                            .iter()
                            .try_fold(0, |m, c| ranks[c.0].map(|r| m.max(r)))
                            .map(|m| m + 1)
                    })
                    .min();
                if let Some(b) = best {
                    if ranks[idx].map_or(true, |r| b < r) {
                        ranks[idx] = Some(b);
                        changed = true;
                    }
                }
            }
        }
        ranks
    }

    /// The tree of `idx` taking, at every node, the first family none of whose children is on
    /// the path from the root.
    fn tree_from(
        &self,
        grm: &Grammar<StorageT>,
        stable: &StateTable<StorageT>,
        ranks: &[Option<usize>],
        on_path: &mut [bool],
        idx: SppfIdx,
    ) -> Node<StorageT> {
        if let SppfNode::Term { lexeme } = self.nodes[idx.0] {
            return Node::Term {
                lexeme,
                nodes: Vec::new(),
            };
        }
        on_path[idx.0] = true;
        let family = self.families[idx.0].iter().find(|f| {
            f.children
                .iter()
                .all(|c| ranks[c.0].is_some() && !on_path[c.0])
        });
        let node = match family {
            Some(f) => {
                let children = f
                    .children
                    .iter()
                    .map(|&c| self.tree_from(grm, stable, ranks, on_path, c))
                    .collect();
                shape(grm, stable, f.ridx, children, None)
            }
            None => self.ranked_tree(grm, stable, ranks, idx),
        };
        on_path[idx.0] = false;
        node
    }

    /// The smallest finite tree of `idx`.
    fn ranked_tree(
        &self,
        grm: &Grammar<StorageT>,
        stable: &StateTable<StorageT>,
        ranks: &[Option<usize>],
        idx: SppfIdx,
    ) -> Node<StorageT> {
        match self.nodes[idx.0] {
            SppfNode::Term { lexeme } => Node::Term {
                lexeme,
                nodes: Vec::new(),
            },
            SppfNode::Nonterm { vidx } => {
                let rank = ranks[idx.0];
                // Ranks strictly decrease along the chosen families, so this terminates.
                let family = self.families[idx.0].iter().find(|f| {
                    f.children
                        .iter()
                        .all(|c| matches!((ranks[c.0], rank), (Some(cr), Some(r)) if cr < r))
                });
                match family {
                    Some(f) => {
                        let children = f
                            .children
                            .iter()
                            .map(|&c| self.ranked_tree(grm, stable, ranks, c))
                            .collect();
                        shape(grm, stable, f.ridx, children, None)
                    }
                    None => Node::Nonterm {
                        vidx,
                        nodes: Vec::new(),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use glrgrammar::GrammarBuilder;
    use glrtable::{from_grammar, Method};

    use super::*;

    #[test]
    fn families_are_deduplicated() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .rule("S", &["S", "S"])
            .rule("S", &["a"])
            .axiom("S")
            .build()
            .unwrap();
        let (_, stable, _) = from_grammar(&grm, Method::GLR1).unwrap();
        let s = grm.variable_idx("S").unwrap();
        let (r_ss, r_a) = (grm.var_rules(s)[0], grm.var_rules(s)[1]);
        let a = grm.terminal_idx("a").unwrap().as_storaget();

        let mut forest = Forest::new();
        let a0 = forest.add_node(SppfNode::Term {
            lexeme: Lexeme::new(a, 0, 1),
        });
        let a1 = forest.add_node(SppfNode::Term {
            lexeme: Lexeme::new(a, 1, 1),
        });
        let s0 = forest.add_node(SppfNode::Nonterm { vidx: s });
        let s1 = forest.add_node(SppfNode::Nonterm { vidx: s });
        let root = forest.add_node(SppfNode::Nonterm { vidx: s });
        assert!(forest.add_family(
            s0,
            Family {
                ridx: r_a,
                children: vec![a0],
            }
        ));
        assert!(forest.add_family(
            s1,
            Family {
                ridx: r_a,
                children: vec![a1],
            }
        ));
        assert!(forest.add_family(
            root,
            Family {
                ridx: r_ss,
                children: vec![s0, s1],
            }
        ));
        assert!(!forest.add_family(
            root,
            Family {
                ridx: r_ss,
                children: vec![s0, s1],
            }
        ));
        forest.set_root(root);

        assert_eq!(forest.families(root).count(), 1);
        assert!(!forest.is_ambiguous());
        assert_eq!(forest.count_trees(), Some(1));
        assert_eq!(forest.reachable(), vec![root, s0, a0, s1, a1]);
        assert_eq!(
            forest.first_tree(&grm, &stable).pp(&grm, "aa"),
            "S\n S\n  a a\n S\n  a a\n"
        );
    }

    #[test]
    fn cyclic_forests() {
        // S -> S | a: the node for "a" can be wrapped in any number of S's.
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .rule("S", &["S"])
            .rule("S", &["a"])
            .axiom("S")
            .build()
            .unwrap();
        let (_, stable, _) = from_grammar(&grm, Method::GLR1).unwrap();
        let s = grm.variable_idx("S").unwrap();
        let (r_s, r_a) = (grm.var_rules(s)[0], grm.var_rules(s)[1]);
        let a = grm.terminal_idx("a").unwrap();

        let mut forest = Forest::new();
        let a0 = forest.add_node(SppfNode::Term {
            lexeme: Lexeme::new(a.as_storaget(), 0, 1),
        });
        let root = forest.add_node(SppfNode::Nonterm { vidx: s });
        forest.add_family(
            root,
            Family {
                ridx: r_s,
                children: vec![root],
            }
        );
        forest.add_family(
            root,
            Family {
                ridx: r_a,
                children: vec![a0],
            }
        );
        forest.set_root(root);

        assert!(forest.is_ambiguous());
        assert_eq!(forest.count_trees(), None);
        assert_eq!(forest.first_tree(&grm, &stable).pp(&grm, "a"), "S\n a a\n");
        let trees = forest
            .trees(&grm, &stable)
            .map(|t| t.pp(&grm, "a"))
            .collect::<Vec<_>>();
        assert_eq!(trees, vec!["S\n a a\n"]);
    }

    #[test]
    fn first_family_wins() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .rule("S", &["A"])
            .rule("S", &["B"])
            .rule("A", &["a"])
            .rule("B", &["C"])
            .rule("C", &["a"])
            .axiom("S")
            .build()
            .unwrap();
        let (_, stable, _) = from_grammar(&grm, Method::GLR1).unwrap();
        let rule = |n: &str, i: usize| grm.var_rules(grm.variable_idx(n).unwrap())[i];
        let vidx = |n: &str| grm.variable_idx(n).unwrap();
        let a = grm.terminal_idx("a").unwrap().as_storaget();

        let mut forest = Forest::new();
        let a0 = forest.add_node(SppfNode::Term {
            lexeme: Lexeme::new(a, 0, 1),
        });
        let c = forest.add_node(SppfNode::Nonterm { vidx: vidx("C") });
        let b = forest.add_node(SppfNode::Nonterm { vidx: vidx("B") });
        let a_node = forest.add_node(SppfNode::Nonterm { vidx: vidx("A") });
        let root = forest.add_node(SppfNode::Nonterm { vidx: vidx("S") });
        forest.add_family(
            c,
            Family {
                ridx: rule("C", 0),
                children: vec![a0],
            },
        );
        forest.add_family(
            b,
            Family {
                ridx: rule("B", 0),
                children: vec![c],
            },
        );
        forest.add_family(
            a_node,
            Family {
                ridx: rule("A", 0),
                children: vec![a0],
            },
        );
        // The deeper derivation is found first.
        forest.add_family(
            root,
            Family {
                ridx: rule("S", 1),
                children: vec![b],
            },
        );
        forest.add_family(
            root,
            Family {
                ridx: rule("S", 0),
                children: vec![a_node],
            },
        );
        forest.set_root(root);

        assert_eq!(forest.count_trees(), Some(2));
        assert_eq!(
            forest.first_tree(&grm, &stable).pp(&grm, "a"),
            "S\n B\n  C\n   a a\n"
        );
        let trees = forest
            .trees(&grm, &stable)
            .map(|t| t.pp(&grm, "a"))
            .collect::<Vec<_>>();
        assert_eq!(trees, vec!["S\n B\n  C\n   a a\n", "S\n A\n  a a\n"]);
    }
}
