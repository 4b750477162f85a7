// Each index type is a thin wrapper around the grammar's storage type. Conversion to `usize` is
// infallible on every platform we support; conversion back goes through `AsPrimitive`.

use std::mem::size_of;

use num_traits::{self, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature="serde", derive(Serialize, Deserialize))]
        pub struct $n<T>(pub T);

        impl<T: PrimInt + Unsigned> From<$n<T>> for usize {
            fn from(st: $n<T>) -> Self {
                debug_assert!(size_of::<usize>() >= size_of::<T>());
                // Every unsigned storage type we accept is at most usize wide.
                num_traits::cast(st.0).unwrap_or(usize::MAX)
            }
        }

        impl<T: PrimInt + Unsigned> $n<T> {
            pub fn as_storaget(&self) -> T {
                self.0
            }
        }
    }
}

IdxNewtype!(
    /// The index of a variable (a nonterminal) in a [Grammar](crate::Grammar).
    VIdx);
IdxNewtype!(
    /// The index of a rule. A variable with two alternatives owns two rules.
    RIdx);
IdxNewtype!(
    /// A position within the parsing view of a rule body. When used in an item it is the dot
    /// position, so it ranges from `0` to the body length inclusive.
    SIdx);
IdxNewtype!(
    /// The index of a terminal. Index `0` is always epsilon and index `1` is always the end
    /// marker.
    TIdx);
IdxNewtype!(
    /// The index of a virtual symbol.
    VtIdx);
IdxNewtype!(
    /// The index of a semantic action attachment point.
    AIdx);
IdxNewtype!(
    /// The index of a lexical context. Index `0` is the default context.
    CIdx);
