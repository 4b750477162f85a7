use std::hash::{BuildHasherDefault, Hash};

use fnv::FnvHasher;
use glrgrammar::{firsts::falses, Grammar, GrammarFirsts, RIdx, SIdx, Symbol, TIdx};
use indexmap::{map::Entry, IndexMap};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

/// The type of "context" (also known as "lookaheads")
pub type Ctx = Vob;

/// A set of items. Each key is a `(rule, dot)` pair; its context is the set of lookahead
/// terminals attached to it. LR(0) items have an empty context. Items are kept in discovery
/// order so that state numbering is deterministic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Itemset<StorageT: Eq + Hash> {
    pub items: IndexMap<(RIdx<StorageT>, SIdx<StorageT>), Ctx, BuildHasherDefault<FnvHasher>>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> Itemset<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create a blank Itemset.
    pub fn new() -> Self {
        Itemset {
            items: IndexMap::with_hasher(BuildHasherDefault::<FnvHasher>::default()),
        }
    }

    /// Add an item `(ridx, dot)` with context `ctx` to this itemset. Lookaheads are merged onto
    /// an existing item with the same `(ridx, dot)`. Returns true if this led to any changes in
    /// the itemset.
    pub fn add(&mut self, ridx: RIdx<StorageT>, dot: SIdx<StorageT>, ctx: &Ctx) -> bool {
        match self.items.entry((ridx, dot)) {
            Entry::Occupied(mut e) => e.get_mut().or(ctx),
            Entry::Vacant(e) => {
                e.insert(ctx.clone());
                true
            }
        }
    }

    /// The symbol after the dot of item `(ridx, dot)`, or `None` if it is a reduce item.
    pub fn next_symbol(
        grm: &Grammar<StorageT>,
        ridx: RIdx<StorageT>,
        dot: SIdx<StorageT>,
    ) -> Option<Symbol<StorageT>> {
        grm.rule(ridx).symbols().get(usize::from(dot)).cloned()
    }

    /// Create a new itemset which is a closed version of `self`, computing LR(1) lookaheads.
    pub fn close(&self, grm: &Grammar<StorageT>, firsts: &GrammarFirsts<StorageT>) -> Self {
        let mut new_is = self.clone();
        // The todo set is the keys of `self` followed by any rule whose `(ridx, 0)` item was
        // added or had its context grown. The latter is a bitfield since the dot is always 0.
        let mut keys_iter = self.items.keys();
        let mut zero_todos = falses(usize::from(grm.rules_len()));
        let ctx_len = self
            .items
            .values()
            .next()
            .map(|c| c.len())
            .unwrap_or_else(|| usize::from(grm.terminals_len()));
        let mut new_ctx = falses(ctx_len);
        loop {
            let (ridx, dot) = match keys_iter.next() {
                Some(&k) => k,
                None => match zero_todos.iter_set_bits(..).next() {
                    Some(i) => {
                        zero_todos.set(i, false);
                        (RIdx(i.as_()), SIdx(StorageT::zero()))
                    }
                    None => break,
                },
            };
            let symbols = grm.rule(ridx).symbols();
            if let Some(&Symbol::Variable(vidx)) = symbols.get(usize::from(dot)) {
                new_ctx.set_all(false);
                if firsts.suffix_firsts(&symbols[usize::from(dot) + 1..], &mut new_ctx) {
                    new_ctx.or(&new_is.items[&(ridx, dot)]);
                }
                for &ref_ridx in grm.var_rules(vidx) {
                    if new_is.add(ref_ridx, SIdx(StorageT::zero()), &new_ctx) {
                        zero_todos.set(usize::from(ref_ridx), true);
                    }
                }
            }
        }
        new_is
    }

    /// Create a new itemset which is a closed version of `self`, ignoring lookaheads entirely.
    pub fn close_lr0(&self, grm: &Grammar<StorageT>) -> Self {
        let mut new_is = self.clone();
        let empty = Vob::new();
        let mut todo = self.items.keys().cloned().collect::<Vec<_>>();
        while let Some((ridx, dot)) = todo.pop() {
            if let Some(Symbol::Variable(vidx)) = Itemset::next_symbol(grm, ridx, dot) {
                for &ref_ridx in grm.var_rules(vidx) {
                    if !new_is.items.contains_key(&(ref_ridx, SIdx(StorageT::zero()))) {
                        new_is.add(ref_ridx, SIdx(StorageT::zero()), &empty);
                        todo.push((ref_ridx, SIdx(StorageT::zero())));
                    }
                }
            }
        }
        new_is
    }

    /// Create a new Itemset based on calculating the goto of `sym` on the current Itemset.
    pub fn goto(&self, grm: &Grammar<StorageT>, sym: &Symbol<StorageT>) -> Self {
        let mut newis = Itemset::new();
        for (&(ridx, dot), ctx) in &self.items {
            if Itemset::next_symbol(grm, ridx, dot).as_ref() == Some(sym) {
                newis.add(ridx, SIdx((usize::from(dot) + 1).as_()), ctx);
            }
        }
        newis
    }

    /// Does `ctx` of item `(ridx, dot)` contain `tidx`?
    pub fn has_lookahead(
        &self,
        ridx: RIdx<StorageT>,
        dot: SIdx<StorageT>,
        tidx: TIdx<StorageT>,
    ) -> bool {
        self.items
            .get(&(ridx, dot))
            .and_then(|ctx| ctx.get(usize::from(tidx)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod test {
    use super::Itemset;
    use crate::stategraph::state_exists;
    use glrgrammar::{firsts::falses, GrammarBuilder, GrammarFirsts, SIdx, Symbol};

    fn dragon() -> glrgrammar::Grammar<u32> {
        // From http://binarysculpting.com/2012/02/04/computing-lr1-closure/
        GrammarBuilder::new("dragon")
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
            .unwrap()
    }

    #[test]
    fn test_dragon_grammar() {
        let grm = dragon();
        let firsts = GrammarFirsts::new(&grm);
        let mut is = Itemset::new();
        let mut la = falses(usize::from(grm.terminals_len()));
        la.set(usize::from(grm.epsilon_idx()), true);
        is.add(grm.start_rule(), SIdx(0), &la);
        let cls_is = is.close(&grm, &firsts);
        assert_eq!(cls_is.items.len(), 6);
        state_exists(&grm, &cls_is, "^", 0, SIdx(0), vec!["ε"]);
        state_exists(&grm, &cls_is, "S", 0, SIdx(0), vec!["$"]);
        state_exists(&grm, &cls_is, "S", 1, SIdx(0), vec!["$"]);
        state_exists(&grm, &cls_is, "L", 0, SIdx(0), vec!["$", "="]);
        state_exists(&grm, &cls_is, "L", 1, SIdx(0), vec!["$", "="]);
        state_exists(&grm, &cls_is, "R", 0, SIdx(0), vec!["$"]);
    }

    #[test]
    fn test_closure_idempotent() {
        let grm = dragon();
        let firsts = GrammarFirsts::new(&grm);
        let mut is = Itemset::new();
        let mut la = falses(usize::from(grm.terminals_len()));
        la.set(usize::from(grm.epsilon_idx()), true);
        is.add(grm.start_rule(), SIdx(0), &la);
        let once = is.close(&grm, &firsts);
        assert_eq!(once.close(&grm, &firsts), once);
        let lr0 = is.close_lr0(&grm);
        assert_eq!(lr0.items.len(), 6);
        assert_eq!(lr0.close_lr0(&grm), lr0);
    }

    #[test]
    fn test_goto() {
        let grm = dragon();
        let firsts = GrammarFirsts::new(&grm);
        let mut is = Itemset::new();
        let mut la = falses(usize::from(grm.terminals_len()));
        la.set(usize::from(grm.epsilon_idx()), true);
        is.add(grm.start_rule(), SIdx(0), &la);
        let cls_is = is.close(&grm, &firsts);

        // S -> L . '=' R and R -> L . share a goto on L.
        let goto_l = cls_is.goto(&grm, &Symbol::Variable(grm.variable_idx("L").unwrap()));
        assert_eq!(goto_l.items.len(), 2);
        state_exists(&grm, &goto_l, "S", 0, SIdx(1), vec!["$"]);
        state_exists(&grm, &goto_l, "R", 0, SIdx(1), vec!["$"]);

        let goto_star = cls_is.goto(&grm, &Symbol::Terminal(grm.terminal_idx("*").unwrap()));
        let cls_star = goto_star.close(&grm, &firsts);
        assert_eq!(cls_star.items.len(), 4);
        state_exists(&grm, &cls_star, "L", 0, SIdx(1), vec!["$", "="]);
        state_exists(&grm, &cls_star, "R", 0, SIdx(0), vec!["$", "="]);
        assert!(cls_star.has_lookahead(
            grm.var_rules(grm.variable_idx("L").unwrap())[1],
            SIdx(0),
            grm.terminal_idx("=").unwrap()
        ));
    }

    #[test]
    fn test_nullable_suffix_inherits_context() {
        // S -> A B; A -> 'a'; B -> 'b' | ;
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("a", "a")
            .terminal("b", "b")
            .terminal("c", "c")
            .rule("S", &["A", "B"])
            .rule("A", &["a"])
            .rule("B", &["b"])
            .rule("B", &[])
            .axiom("S")
            .build()
            .unwrap();
        let firsts = GrammarFirsts::new(&grm);
        let mut is = Itemset::new();
        let mut la = falses(usize::from(grm.terminals_len()));
        la.set(usize::from(grm.epsilon_idx()), true);
        is.add(grm.start_rule(), SIdx(0), &la);
        let cls_is = is.close(&grm, &firsts);
        // A is followed by a nullable B, so it also sees S's lookahead.
        state_exists(&grm, &cls_is, "A", 0, SIdx(0), vec!["b", "$"]);
    }
}
