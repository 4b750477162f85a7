use std::marker::PhantomData;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{Grammar, RIdx, Symbol, TIdx, VIdx};

/// `GrammarFirsts` stores the FIRST set of every variable, and which variables are nullable.
/// Epsilon is never stored in a FIRST set: nullability is tracked separately. For example,
/// given:
///
/// ```text
///   S -> A 'b';
///   A -> 'a' | ;
/// ```
///
/// `FIRST(S) = {a, b}`, `FIRST(A) = {a}`, and only `A` is nullable.
#[derive(Debug)]
pub struct GrammarFirsts<StorageT> {
    firsts: Vec<Vob>,
    nullables: Vob,
    /// For each nullable variable, a rule from which its empty derivation can be built without
    /// going round a cycle.
    nullable_rules: Vec<Option<RIdx<StorageT>>>,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> GrammarFirsts<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Generates and returns the firsts set for the given grammar.
    pub fn new(grm: &Grammar<StorageT>) -> Self {
        let vars_len = usize::from(grm.variables_len());
        let mut firsts = GrammarFirsts {
            firsts: vec![falses(usize::from(grm.terminals_len())); vars_len],
            nullables: falses(vars_len),
            nullable_rules: vec![None; vars_len],
            phantom: PhantomData,
        };

        // Iterate to a fixed point. Nullability is discovered in dependency order: the first time
        // a rule makes its head nullable, every variable in its body was already known to be
        // nullable, so that rule is a suitable, acyclic, witness.
        loop {
            let mut changed = false;
            for ridx in grm.iter_ridxs() {
                let rule = grm.rule(ridx);
                let head = rule.head();
                let mut nullable = true;
                for sym in rule.symbols() {
                    match *sym {
                        Symbol::Terminal(tidx) => {
                            if !firsts.set(head, tidx) {
                                changed = true;
                            }
                            nullable = false;
                            break;
                        }
                        Symbol::Variable(vidx) => {
                            if vidx != head {
                                // Can't borrow two elements of firsts mutably at once.
                                let other = firsts.firsts[usize::from(vidx)].clone();
                                if firsts.firsts[usize::from(head)].or(&other) {
                                    changed = true;
                                }
                            }
                            if !firsts.is_nullable(vidx) {
                                nullable = false;
                                break;
                            }
                        }
                    }
                }
                if nullable && !firsts.is_nullable(head) {
                    firsts.nullables.set(usize::from(head), true);
                    firsts.nullable_rules[usize::from(head)] = Some(ridx);
                    changed = true;
                }
            }
            if !changed {
                return firsts;
            }
        }
    }

    /// Return all the firsts for variable `vidx`.
    pub fn firsts(&self, vidx: VIdx<StorageT>) -> &Vob {
        &self.firsts[usize::from(vidx)]
    }

    /// Returns true if the terminal `tidx` is in the first set for variable `vidx`.
    pub fn is_set(&self, vidx: VIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        self.firsts[usize::from(vidx)][usize::from(tidx)]
    }

    /// Returns true if `vidx` derives the empty string.
    pub fn is_nullable(&self, vidx: VIdx<StorageT>) -> bool {
        self.nullables[usize::from(vidx)]
    }

    /// If `vidx` is nullable, return the rule from which its empty derivation is built.
    pub fn nullable_rule(&self, vidx: VIdx<StorageT>) -> Option<RIdx<StorageT>> {
        self.nullable_rules[usize::from(vidx)]
    }

    /// Ensures that the firsts bit for terminal `tidx` variable `vidx` is set. Returns true if it
    /// was already set, or false otherwise.
    pub fn set(&mut self, vidx: VIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        let r = &mut self.firsts[usize::from(vidx)];
        if r[usize::from(tidx)] {
            true
        } else {
            r.set(usize::from(tidx), true);
            false
        }
    }

    /// Compute FIRST of `symbols`, ORing it into `into`. Returns true if `symbols` is nullable
    /// (including when it is empty).
    pub fn suffix_firsts(&self, symbols: &[Symbol<StorageT>], into: &mut Vob) -> bool {
        for sym in symbols {
            match *sym {
                Symbol::Terminal(tidx) => {
                    into.set(usize::from(tidx), true);
                    return false;
                }
                Symbol::Variable(vidx) => {
                    for tidx in self.firsts[usize::from(vidx)].iter_set_bits(..) {
                        into.set(tidx, true);
                    }
                    if !self.is_nullable(vidx) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Is every symbol in `symbols` nullable?
    pub fn is_suffix_nullable(&self, symbols: &[Symbol<StorageT>]) -> bool {
        symbols.iter().all(|sym| match *sym {
            Symbol::Terminal(_) => false,
            Symbol::Variable(vidx) => self.is_nullable(vidx),
        })
    }
}

/// A bit vector of `len` unset bits.
pub fn falses(len: usize) -> Vob {
    (0..len).map(|_| false).collect()
}
