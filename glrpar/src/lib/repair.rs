use std::{fmt::Debug, hash::Hash};

use cactus::Cactus;
use glrtable::StIdx;
use log::debug;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    lex_api::Lexeme,
    parser::{PStack, ParseRepair, Parser, Recoverer, TStack},
};

/// How many lexemes after a repair must parse for the repair to be accepted.
const PARSE_AT_LEAST: usize = 3;

struct Repair;

pub(crate) fn recoverer<StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    _: &Parser<StorageT>,
) -> Box<dyn Recoverer<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    Box::new(Repair)
}

impl<StorageT: 'static + Debug + Hash + PrimInt + Unsigned> Recoverer<StorageT> for Repair
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
        // Candidate repairs are a single deletion of the erroneous lexeme or a single insertion
        // of a terminal the current state expects. A candidate is kept if the parser can then
        // consume the next PARSE_AT_LEAST lexemes (or reach the end of the input) without error.
        let ll = parser.lexemes.len();
        let cstack = pstack
            .iter()
            .fold(Cactus::new(), |c: Cactus<StIdx>, &stidx| c.child(stidx));
        let mut repairs = Vec::new();

        if in_laidx < ll {
            let end = (in_laidx + 1 + PARSE_AT_LEAST).min(ll + 1);
            if parser.lr_cactus(None, in_laidx + 1, end, cstack.clone()) {
                repairs.push(vec![ParseRepair::Delete(parser.next_lexeme(in_laidx))]);
            }
        }

        let stidx = *pstack.last().unwrap();
        let start = parser.next_lexeme(in_laidx).span().start();
        let end = (in_laidx + PARSE_AT_LEAST).min(ll + 1);
        for &tidx in parser.stable.state_expected(stidx) {
            if tidx == parser.grm.epsilon_idx() || tidx == parser.grm.dollar_idx() {
                continue;
            }
            let prefix = Lexeme::new_faulty(tidx.as_storaget(), start, 0);
            if parser.lr_cactus(Some(prefix), in_laidx, end, cstack.clone()) {
                repairs.push(vec![ParseRepair::Insert(tidx)]);
            }
        }

        let laidx = match repairs.first().and_then(|rs| rs.first()) {
            Some(ParseRepair::Delete(_)) => in_laidx + 1,
            Some(&ParseRepair::Insert(tidx)) => {
                debug!("Repairing by inserting terminal {:?}", tidx);
                let prefix = Lexeme::new_faulty(tidx.as_storaget(), start, 0);
                parser.lr_upto(Some(prefix), in_laidx, in_laidx, pstack, tstack)
            }
            None => in_laidx,
        };
        (laidx, repairs)
    }
}

