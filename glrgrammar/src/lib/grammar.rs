use std::fmt::Write;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{AIdx, CIdx, RIdx, Symbol, TIdx, TreeAction, VIdx, VtIdx};

/// A terminal symbol. The lexical side of a terminal (its `pattern`) is opaque to the automaton
/// builders: it is only carried along for whichever token source is paired with the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Terminal<StorageT> {
    pub(crate) name: String,
    pub(crate) pattern: Option<String>,
    pub(crate) context: Option<CIdx<StorageT>>,
}

impl<StorageT: Copy> Terminal<StorageT> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The regular expression matching this terminal, if it has one. Epsilon and the end marker
    /// never have a pattern.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// The lexical context in which this terminal may be matched, or `None` if it can be matched
    /// anywhere.
    pub fn context(&self) -> Option<CIdx<StorageT>> {
        self.context
    }
}

/// One element of a rule body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyElement<StorageT> {
    /// A grammar symbol, together with how its subtree is treated when the rule is reduced.
    Symbol {
        symbol: Symbol<StorageT>,
        action: TreeAction,
    },
    /// A virtual symbol: inserted into the tree, never matched from the input.
    Virtual {
        vtidx: VtIdx<StorageT>,
        action: TreeAction,
    },
    /// The point at which a semantic action is invoked.
    SemanticAction(AIdx<StorageT>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule<StorageT> {
    pub(crate) head: VIdx<StorageT>,
    pub(crate) elements: Vec<BodyElement<StorageT>>,
    /// The parsing view of `elements`: only the grammar symbols, in order.
    pub(crate) symbols: Vec<Symbol<StorageT>>,
    pub(crate) head_action: TreeAction,
    pub(crate) generated: bool,
    pub(crate) context: Option<CIdx<StorageT>>,
}

impl<StorageT: Copy> Rule<StorageT> {
    pub fn head(&self) -> VIdx<StorageT> {
        self.head
    }

    pub fn elements(&self) -> &[BodyElement<StorageT>] {
        &self.elements
    }

    /// The grammar symbols of this rule's body: what items advance over.
    pub fn symbols(&self) -> &[Symbol<StorageT>] {
        &self.symbols
    }

    pub fn symbols_len(&self) -> usize {
        self.symbols.len()
    }

    /// How the node built for this rule is treated by its parent. Only generated rules have a
    /// head action other than [TreeAction::None].
    pub fn head_action(&self) -> TreeAction {
        self.head_action
    }

    /// Was this rule generated by the grammar builder (e.g. for a repetition) rather than
    /// written by the user?
    pub fn generated(&self) -> bool {
        self.generated
    }

    /// The lexical context this rule opens, if any.
    pub fn context(&self) -> Option<CIdx<StorageT>> {
        self.context
    }
}

/// A fully resolved grammar. See [GrammarBuilder](crate::GrammarBuilder) for how to create one.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grammar<StorageT = u32> {
    pub(crate) name: String,
    pub(crate) terminals: Vec<Terminal<StorageT>>,
    pub(crate) variables: Vec<String>,
    pub(crate) virtuals: Vec<String>,
    pub(crate) actions: Vec<String>,
    /// Context names. Index 0 is the default context and has the empty name.
    pub(crate) contexts: Vec<String>,
    pub(crate) rules: Vec<Rule<StorageT>>,
    /// The rules owned by each variable, in declaration order.
    pub(crate) var_rules: Vec<Vec<RIdx<StorageT>>>,
    pub(crate) axiom: VIdx<StorageT>,
    pub(crate) start_var: VIdx<StorageT>,
    pub(crate) start_rule: RIdx<StorageT>,
    pub(crate) separator: Option<TIdx<StorageT>>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Grammar<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How many terminals does this grammar have (including epsilon and the end marker)?
    pub fn terminals_len(&self) -> TIdx<StorageT> {
        TIdx(self.terminals.len().as_())
    }

    /// How many variables does this grammar have (including the augmented start variable)?
    pub fn variables_len(&self) -> VIdx<StorageT> {
        VIdx(self.variables.len().as_())
    }

    /// How many rules does this grammar have (including the augmented start rule)?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        RIdx(self.rules.len().as_())
    }

    pub fn virtuals_len(&self) -> usize {
        self.virtuals.len()
    }

    pub fn actions_len(&self) -> usize {
        self.actions.len()
    }

    pub fn contexts_len(&self) -> usize {
        self.contexts.len()
    }

    pub fn iter_tidxs(&self) -> impl Iterator<Item = TIdx<StorageT>> {
        (0..self.terminals.len()).map(|x| TIdx(x.as_()))
    }

    pub fn iter_vidxs(&self) -> impl Iterator<Item = VIdx<StorageT>> {
        (0..self.variables.len()).map(|x| VIdx(x.as_()))
    }

    pub fn iter_ridxs(&self) -> impl Iterator<Item = RIdx<StorageT>> {
        (0..self.rules.len()).map(|x| RIdx(x.as_()))
    }

    /// The epsilon terminal. Always index 0.
    pub fn epsilon_idx(&self) -> TIdx<StorageT> {
        TIdx(StorageT::zero())
    }

    /// The end marker terminal. Always index 1.
    pub fn dollar_idx(&self) -> TIdx<StorageT> {
        TIdx(StorageT::one())
    }

    /// The user's start variable.
    pub fn axiom(&self) -> VIdx<StorageT> {
        self.axiom
    }

    /// The augmented start variable `^`.
    pub fn start_var(&self) -> VIdx<StorageT> {
        self.start_var
    }

    /// The augmented start rule `^ -> Axiom $`.
    pub fn start_rule(&self) -> RIdx<StorageT> {
        self.start_rule
    }

    /// The terminal a token source should silently skip, if any.
    pub fn separator(&self) -> Option<TIdx<StorageT>> {
        self.separator
    }

    pub fn terminal(&self, tidx: TIdx<StorageT>) -> &Terminal<StorageT> {
        &self.terminals[usize::from(tidx)]
    }

    pub fn terminal_name(&self, tidx: TIdx<StorageT>) -> &str {
        &self.terminals[usize::from(tidx)].name
    }

    pub fn terminal_idx(&self, n: &str) -> Option<TIdx<StorageT>> {
        self.terminals
            .iter()
            .position(|t| t.name == n)
            .map(|i| TIdx(i.as_()))
    }

    pub fn variable_name(&self, vidx: VIdx<StorageT>) -> &str {
        &self.variables[usize::from(vidx)]
    }

    pub fn variable_idx(&self, n: &str) -> Option<VIdx<StorageT>> {
        self.variables
            .iter()
            .position(|v| v == n)
            .map(|i| VIdx(i.as_()))
    }

    pub fn virtual_name(&self, vtidx: VtIdx<StorageT>) -> &str {
        &self.virtuals[usize::from(vtidx)]
    }

    pub fn action_name(&self, aidx: AIdx<StorageT>) -> &str {
        &self.actions[usize::from(aidx)]
    }

    pub fn action_idx(&self, n: &str) -> Option<AIdx<StorageT>> {
        self.actions
            .iter()
            .position(|a| a == n)
            .map(|i| AIdx(i.as_()))
    }

    pub fn context_name(&self, cidx: CIdx<StorageT>) -> &str {
        &self.contexts[usize::from(cidx)]
    }

    pub fn context_idx(&self, n: &str) -> Option<CIdx<StorageT>> {
        self.contexts
            .iter()
            .position(|c| c == n)
            .map(|i| CIdx(i.as_()))
    }

    pub fn rule(&self, ridx: RIdx<StorageT>) -> &Rule<StorageT> {
        &self.rules[usize::from(ridx)]
    }

    pub fn rule_head(&self, ridx: RIdx<StorageT>) -> VIdx<StorageT> {
        self.rules[usize::from(ridx)].head
    }

    /// The rules whose head is `vidx`.
    pub fn var_rules(&self, vidx: VIdx<StorageT>) -> &[RIdx<StorageT>] {
        &self.var_rules[usize::from(vidx)]
    }

    /// Is `vidx` a variable introduced by the builder rather than the user?
    pub fn is_generated(&self, vidx: VIdx<StorageT>) -> bool {
        vidx == self.start_var
            || self.var_rules[usize::from(vidx)]
                .iter()
                .all(|&ridx| self.rule(ridx).generated)
    }

    pub fn symbol_name(&self, sym: Symbol<StorageT>) -> &str {
        match sym {
            Symbol::Variable(vidx) => self.variable_name(vidx),
            Symbol::Terminal(tidx) => self.terminal_name(tidx),
        }
    }

    /// Pretty print rule `ridx`, placing a dot before the symbol at position `dot` if it is
    /// `Some`. Virtuals and semantic actions are not shown.
    pub fn pp_rule(&self, ridx: RIdx<StorageT>, dot: Option<usize>) -> String {
        let rule = self.rule(ridx);
        let mut s = String::new();
        write!(s, "{} ->", self.variable_name(rule.head)).ok();
        for (i, sym) in rule.symbols.iter().enumerate() {
            if dot == Some(i) {
                s.push_str(" .");
            }
            match *sym {
                Symbol::Terminal(tidx) => write!(s, " '{}'", self.terminal_name(tidx)).ok(),
                Symbol::Variable(vidx) => write!(s, " {}", self.variable_name(vidx)).ok(),
            };
        }
        if dot == Some(rule.symbols.len()) {
            s.push_str(" .");
        }
        s
    }
}
