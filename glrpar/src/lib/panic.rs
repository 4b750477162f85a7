use std::{fmt::Debug, hash::Hash};

use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::parser::{PStack, ParseRepair, Parser, Recoverer, TStack};

struct Panic;

pub(crate) fn recoverer<StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    _: &Parser<StorageT>,
) -> Box<dyn Recoverer<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    Box::new(Panic)
}

impl<StorageT: 'static + Debug + Hash + PrimInt + Unsigned> Recoverer<StorageT> for Panic
where
    usize: AsPrimitive<StorageT>,
{
    fn recover(
        &self,
        parser: &Parser<StorageT>,
        in_laidx: usize,
        pstack: &mut PStack,
        tstack: &mut TStack<StorageT>,
    ) -> (usize, Vec<Vec<ParseRepair<StorageT>>>) {
        // Based on the recoverer in Holub's "Compiler Design in C", p.348: skip input until some
        // state on the stack has an action for the lookahead, then pop the states above it.
        //
        // The user often can't emulate what this does to their input: if a state lower down the
        // stack accepts the lexeme at `in_laidx`, the repair sequence is empty.
        for laidx in in_laidx..=parser.lexemes.len() {
            let la_tidx = parser.next_tidx(laidx);
            let found = pstack
                .iter()
                .rposition(|&stidx| !parser.stable.actions(stidx, la_tidx).is_empty());
            if let Some(st_i) = found {
                pstack.truncate(st_i + 1);
                tstack.truncate(st_i);
                let rprs = (in_laidx..laidx)
                    .map(|j| ParseRepair::Delete(parser.next_lexeme(j)))
                    .collect();
                return (laidx, vec![rprs]);
            }
        }
        (in_laidx, vec![])
    }
}
