use std::{
    cmp,
    error::Error,
    fmt::{self, Debug, Display},
    hash::Hash,
    mem,
};

use cactus::Cactus;
use glrgrammar::{AIdx, Grammar, RIdx, Symbol, TIdx, TreeAction, VIdx, VtIdx};
use glrtable::{Action, ProductionOp, StIdx, StateTable};
use log::debug;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    glr::{self, GlrParseError},
    lex_api::{LexError, Lexeme, Lexer},
    panic, repair,
    sppf::Forest,
};

/// A node in a parse tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Node<StorageT> {
    /// A terminal. A terminal only has children if it was promoted by a tree action.
    Term {
        lexeme: Lexeme<StorageT>,
        nodes: Vec<Node<StorageT>>,
    },
    /// A variable.
    Nonterm {
        vidx: VIdx<StorageT>,
        nodes: Vec<Node<StorageT>>,
    },
    /// A virtual symbol inserted by a rule.
    Virtual {
        vtidx: VtIdx<StorageT>,
        nodes: Vec<Node<StorageT>>,
    },
}

impl<StorageT: 'static + PrimInt + Unsigned> Node<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// This node's children.
    pub fn nodes(&self) -> &[Node<StorageT>] {
        match self {
            Node::Term { nodes, .. } | Node::Nonterm { nodes, .. } | Node::Virtual { nodes, .. } => {
                nodes
            }
        }
    }

    fn nodes_mut(&mut self) -> &mut Vec<Node<StorageT>> {
        match self {
            Node::Term { nodes, .. } | Node::Nonterm { nodes, .. } | Node::Virtual { nodes, .. } => {
                nodes
            }
        }
    }

    /// Return a pretty-printed version of this node.
    pub fn pp(&self, grm: &Grammar<StorageT>, input: &str) -> String {
        let mut st = vec![(0, self)]; // Stack of (indent level, node) pairs
        let mut s = String::new();
        while let Some((indent, e)) = st.pop() {
            for _ in 0..indent {
                s.push(' ');
            }
            match e {
                Node::Term { lexeme, .. } => {
                    let tn = grm.terminal_name(TIdx(lexeme.tok_id()));
                    let span = lexeme.span();
                    let lt = &input[span.start()..span.end()];
                    s.push_str(&format!("{} {}\n", tn, lt));
                }
                Node::Nonterm { vidx, .. } => {
                    s.push_str(&format!("{}\n", grm.variable_name(*vidx)));
                }
                Node::Virtual { vtidx, .. } => {
                    s.push_str(&format!("@{}\n", grm.virtual_name(*vtidx)));
                }
            }
            for x in e.nodes().iter().rev() {
                st.push((indent + 1, x));
            }
        }
        s
    }

    /// The lexemes of every terminal in this tree, in input order.
    pub fn leaves(&self) -> Vec<Lexeme<StorageT>> {
        let mut st = vec![self];
        let mut lexemes = Vec::new();
        while let Some(e) = st.pop() {
            if let Node::Term { lexeme, .. } = e {
                lexemes.push(*lexeme);
            }
            st.extend(e.nodes().iter().rev());
        }
        // Promotion can put a terminal above nodes that precede it in the input.
        lexemes.sort_by_key(|l| l.span().start());
        lexemes
    }
}

/// A semantic action callback: it is passed the action, the head of the rule being reduced, and
/// the children built for the rule so far.
pub type SemanticActionFn<'a, StorageT> =
    dyn Fn(AIdx<StorageT>, VIdx<StorageT>, &[Node<StorageT>]) + 'a;

/// Is `vidx` spliced into its parents rather than given its own node?
fn is_replaced<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    stable: &StateTable<StorageT>,
    vidx: VIdx<StorageT>,
) -> bool
where
    usize: AsPrimitive<StorageT>,
{
    grm.var_rules(vidx)
        .first()
        .map_or(false, |&ridx| {
            stable.production(ridx).head_action == TreeAction::Replace
        })
}

/// Build the node for a reduction of `ridx`, given one child per grammar symbol of the rule's
/// body, applying the rule's tree actions and calling its semantic actions.
pub(crate) fn shape<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    stable: &StateTable<StorageT>,
    ridx: RIdx<StorageT>,
    children: Vec<Node<StorageT>>,
    actions: Option<&SemanticActionFn<StorageT>>,
) -> Node<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    let prod = stable.production(ridx);
    debug_assert_eq!(children.len(), prod.symbols_len);
    let mut children = children.into_iter();
    let mut nodes = Vec::with_capacity(prod.ops.len());
    // The node which will take the place of the rule's head, if any.
    let mut promoted: Option<Node<StorageT>> = None;
    for op in &prod.ops {
        let (mut node, action) = match *op {
            ProductionOp::Pop(action) => match children.next() {
                Some(n) => (n, action),
                None => break,
            },
            ProductionOp::Virtual(vtidx, action) => (
                Node::Virtual {
                    vtidx,
                    nodes: Vec::new(),
                },
                action,
            ),
            ProductionOp::SemanticAction(aidx) => {
                if let Some(f) = actions {
                    f(aidx, prod.head, &nodes);
                }
                continue;
            }
        };
        match action {
            TreeAction::Drop => (),
            TreeAction::Promote => {
                let promoted_nodes = mem::take(node.nodes_mut());
                if let Some(mut old) = promoted.take() {
                    // The previously promoted node becomes the first child of the new one.
                    *old.nodes_mut() = mem::take(&mut nodes);
                    nodes.push(old);
                }
                nodes.extend(promoted_nodes);
                promoted = Some(node);
            }
            TreeAction::None | TreeAction::Replace => match node {
                Node::Nonterm { vidx, nodes: sub } if is_replaced(grm, stable, vidx) => {
                    nodes.extend(sub)
                }
                _ => nodes.push(node),
            },
        }
    }
    match promoted {
        Some(mut p) => {
            *p.nodes_mut() = nodes;
            p
        }
        None => Node::Nonterm {
            vidx: prod.head,
            nodes,
        },
    }
}

/// Build the tree of the empty derivation of the nullable variable `vidx`.
pub(crate) fn epsilon_tree<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    stable: &StateTable<StorageT>,
    vidx: VIdx<StorageT>,
    actions: Option<&SemanticActionFn<StorageT>>,
) -> Node<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    match stable.nullable_rule(vidx) {
        Some(ridx) => {
            let children = grm
                .rule(ridx)
                .symbols()
                .iter()
                .filter_map(|sym| match *sym {
                    Symbol::Variable(v) => Some(epsilon_tree(grm, stable, v, actions)),
                    Symbol::Terminal(_) => None,
                })
                .collect();
            shape(grm, stable, ridx, children, actions)
        }
        None => {
            debug_assert!(false, "{} is not nullable", grm.variable_name(vidx));
            Node::Nonterm {
                vidx,
                nodes: Vec::new(),
            }
        }
    }
}

/// How many lexemes a cell with several actions tries each action on before choosing one.
const DECIDER_LOOKAHEAD: usize = 4;
/// How many actions [Parser::lr_cactus] may take, across every branch it explores.
const EXPLORE_BUDGET: usize = 10_000;

pub(crate) type PStack = Vec<StIdx>; // Parse stack
pub(crate) type TStack<StorageT> = Vec<Node<StorageT>>; // Parse tree stack

pub(crate) struct Parser<'a, 'b, StorageT: 'static + Eq + Hash> {
    pub(crate) rcvry_kind: RecoveryKind,
    pub(crate) grm: &'a Grammar<StorageT>,
    pub(crate) stable: &'a StateTable<StorageT>,
    pub(crate) lexemes: &'b [Lexeme<StorageT>],
    actions: Option<&'a SemanticActionFn<'a, StorageT>>,
    max_error_count: usize,
    max_stack_size: usize,
}

impl<'a, 'b, StorageT: 'static + Debug + Hash + PrimInt + Unsigned> Parser<'a, 'b, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn parse(
        builder: &RTParserBuilder<'a, StorageT>,
        lexemes: &'b [Lexeme<StorageT>],
    ) -> Result<Node<StorageT>, (Option<Node<StorageT>>, Vec<ParseError<StorageT>>)> {
        let psr = Parser {
            rcvry_kind: builder.recoverer,
            grm: builder.grm,
            stable: builder.stable,
            lexemes,
            actions: builder.actions,
            max_error_count: builder.max_error_count,
            max_stack_size: builder.max_stack_size,
        };
        let mut pstack = vec![builder.stable.start_state()];
        let mut tstack: Vec<Node<StorageT>> = Vec::new();
        let mut errors: Vec<ParseError<StorageT>> = Vec::new();
        let accpt = psr.lr(0, &mut pstack, &mut tstack, &mut errors);
        // On acceptance the tree stack holds the axiom's tree and the end marker.
        match (accpt, errors.is_empty()) {
            (true, true) => match tstack.drain(..).next() {
                Some(n) => Ok(n),
                None => Err((None, errors)),
            },
            (true, false) => Err((tstack.drain(..).next(), errors)),
            (false, _) => Err((None, errors)),
        }
    }

    /// Start parsing text at `laidx`. Parsing continues as long as possible (assuming that any
    /// errors encountered can be recovered from), returning `true` if the parse reached an accept
    /// state (possibly after making repairs) or `false` otherwise.
    fn lr(
        &self,
        mut laidx: usize,
        pstack: &mut PStack,
        tstack: &mut TStack<StorageT>,
        errors: &mut Vec<ParseError<StorageT>>,
    ) -> bool {
        let recoverer: Option<Box<dyn Recoverer<StorageT>>> = match self.rcvry_kind {
            RecoveryKind::Repair => Some(repair::recoverer(self)),
            RecoveryKind::Panic => Some(panic::recoverer(self)),
            RecoveryKind::None => None,
        };
        // After an error, how deep the parse stack is allowed to grow.
        let mut max_depth: Option<usize> = None;
        loop {
            debug_assert_eq!(pstack.len(), tstack.len() + 1);
            if let Some(d) = max_depth {
                if pstack.len() > d {
                    debug!("Parse stack exceeded {} entries after an error", d);
                    return false;
                }
            }
            let stidx = *pstack.last().unwrap();
            let la_tidx = self.next_tidx(laidx);

            match self.decide(None, laidx, pstack) {
                Some(Action::Reduce { ridx, len }) => {
                    self.reduce(ridx, len, pstack, Some(tstack));
                }
                Some(Action::Shift(state_id)) => {
                    tstack.push(Node::Term {
                        lexeme: self.next_lexeme(laidx),
                        nodes: Vec::new(),
                    });
                    pstack.push(state_id);
                    laidx += 1;
                }
                Some(Action::Accept) => {
                    debug_assert_eq!(la_tidx, self.grm.epsilon_idx());
                    return true;
                }
                None => {
                    let la_lexeme = self.next_lexeme(laidx);
                    debug!("Syntax error in state {} at {}", stidx, la_lexeme);
                    let rcvr = match recoverer {
                        Some(ref r) => r,
                        None => {
                            errors.push(ParseError {
                                stidx,
                                lexeme: la_lexeme,
                                repairs: vec![],
                            });
                            return false;
                        }
                    };
                    let (new_laidx, repairs) = rcvr.recover(self, laidx, pstack, tstack);
                    let keep_going = !repairs.is_empty();
                    errors.push(ParseError {
                        stidx,
                        lexeme: la_lexeme,
                        repairs,
                    });
                    if !keep_going {
                        debug!("No recovery found");
                        return false;
                    }
                    if errors.len() >= self.max_error_count {
                        debug!("Giving up after {} errors", errors.len());
                        return false;
                    }
                    laidx = new_laidx;
                    max_depth = Some(pstack.len() + self.max_stack_size);
                }
            }
        }
    }

    /// Reduce the top `len` entries of `pstack` (and, if it is not `None`, `tstack`) by `ridx`
    /// and push the goto state. If `len` is less than the rule's length (a right-nulled
    /// reduction), the remaining children are empty derivations.
    pub(crate) fn reduce(
        &self,
        ridx: RIdx<StorageT>,
        len: usize,
        pstack: &mut PStack,
        tstack: Option<&mut TStack<StorageT>>,
    ) {
        let pop_idx = pstack.len() - len;
        if let Some(tstack) = tstack {
            let mut nodes = tstack.drain(pop_idx - 1..).collect::<Vec<Node<StorageT>>>();
            for sym in &self.grm.rule(ridx).symbols()[len..] {
                if let Symbol::Variable(vidx) = *sym {
                    nodes.push(epsilon_tree(self.grm, self.stable, vidx, self.actions));
                }
            }
            tstack.push(shape(self.grm, self.stable, ridx, nodes, self.actions));
        }

        pstack.truncate(pop_idx);
        let prior = *pstack.last().unwrap();
        let head = self.stable.production(ridx).head;
        pstack.push(self.stable.goto(prior, head).unwrap());
    }

    /// Parse `prefix` (if it is not `None`) followed by the lexemes from `laidx` up to (but
    /// excluding) `end_laidx`, mutating `pstack` and `tstack` as parsing occurs. Returns the
    /// index of the lexeme it parsed up to (by definition `<= end_laidx`: it can be less if an
    /// error is encountered). Does not do any form of error recovery.
    pub(crate) fn lr_upto(
        &self,
        mut prefix: Option<Lexeme<StorageT>>,
        mut laidx: usize,
        end_laidx: usize,
        pstack: &mut PStack,
        tstack: &mut TStack<StorageT>,
    ) -> usize {
        while prefix.is_some() || laidx < end_laidx {
            match self.decide(prefix, laidx, pstack) {
                Some(Action::Reduce { ridx, len }) => {
                    self.reduce(ridx, len, pstack, Some(tstack));
                }
                Some(Action::Shift(state_id)) => {
                    let lexeme = match prefix.take() {
                        Some(l) => l,
                        None => {
                            laidx += 1;
                            self.next_lexeme(laidx - 1)
                        }
                    };
                    tstack.push(Node::Term {
                        lexeme,
                        nodes: Vec::new(),
                    });
                    pstack.push(state_id);
                }
                Some(Action::Accept) | None => break,
            }
        }
        laidx
    }

    /// The action to take with `pstack` when the next lexeme is `prefix` (if it is not `None`)
    /// or the lexeme at `laidx`. In a cell with several actions (LR(*) tables), each action is
    /// tried on the next [DECIDER_LOOKAHEAD] lexemes, and the first one which does not lead to a
    /// syntax error is taken. If every action fails, the first is taken, so that the error is
    /// reported where the cell's first action leads.
    pub(crate) fn decide(
        &self,
        prefix: Option<Lexeme<StorageT>>,
        laidx: usize,
        pstack: &PStack,
    ) -> Option<Action<StorageT>> {
        let stidx = *pstack.last()?;
        let la_tidx = match prefix {
            Some(l) => TIdx(l.tok_id()),
            None => self.next_tidx(laidx),
        };
        let actions = self.stable.actions(stidx, la_tidx);
        if actions.len() < 2 {
            return actions.first().cloned();
        }
        let end_laidx = cmp::min(laidx + DECIDER_LOOKAHEAD, self.lexemes.len() + 2);
        let cstack = pstack
            .iter()
            .fold(Cactus::new(), |cstack, &s| cstack.child(s));
        let mut budget = EXPLORE_BUDGET;
        for &a in actions {
            let viable = match self.step(a, prefix, laidx, cstack.clone()) {
                Step::Accept => true,
                Step::Continue(prefix, laidx, cstack) => {
                    self.explore(prefix, laidx, end_laidx, cstack, &mut budget)
                }
                Step::Fail => false,
            };
            if viable {
                debug!("State {} chose {:?} of {} actions", stidx, a, actions.len());
                return Some(a);
            }
        }
        debug!("No action of state {} survives lookahead", stidx);
        actions.first().cloned()
    }

    /// As [Parser::lr_upto], but on a persistent stack and without building a tree. Returns
    /// `true` if `end_laidx` or an accept state was reached without error. Where a cell has
    /// several actions, each is explored in turn until one succeeds.
    pub(crate) fn lr_cactus(
        &self,
        prefix: Option<Lexeme<StorageT>>,
        laidx: usize,
        end_laidx: usize,
        pstack: Cactus<StIdx>,
    ) -> bool {
        let mut budget = EXPLORE_BUDGET;
        self.explore(prefix, laidx, end_laidx, pstack, &mut budget)
    }

    fn explore(
        &self,
        mut prefix: Option<Lexeme<StorageT>>,
        mut laidx: usize,
        end_laidx: usize,
        mut pstack: Cactus<StIdx>,
        budget: &mut usize,
    ) -> bool {
        while prefix.is_some() || laidx < end_laidx {
            if *budget == 0 {
                return false;
            }
            *budget -= 1;
            let stidx = match pstack.val() {
                Some(s) => *s,
                None => return false,
            };
            let la_tidx = match prefix {
                Some(l) => TIdx(l.tok_id()),
                None => self.next_tidx(laidx),
            };

            let actions = self.stable.actions(stidx, la_tidx);
            if actions.len() > 1 {
                return actions.iter().any(|&a| {
                    match self.step(a, prefix, laidx, pstack.clone()) {
                        Step::Accept => true,
                        Step::Continue(prefix, laidx, pstack) => {
                            self.explore(prefix, laidx, end_laidx, pstack, budget)
                        }
                        Step::Fail => false,
                    }
                });
            }
            match actions.first() {
                Some(&a) => match self.step(a, prefix, laidx, pstack) {
                    Step::Accept => return true,
                    Step::Continue(p, l, c) => {
                        prefix = p;
                        laidx = l;
                        pstack = c;
                    }
                    Step::Fail => return false,
                },
                None => return false,
            }
        }
        true
    }

    /// Apply `action` to the persistent stack `pstack`.
    fn step(
        &self,
        action: Action<StorageT>,
        mut prefix: Option<Lexeme<StorageT>>,
        mut laidx: usize,
        mut pstack: Cactus<StIdx>,
    ) -> Step<StorageT> {
        match action {
            Action::Reduce { ridx, len } => {
                for _ in 0..len {
                    pstack = match pstack.parent() {
                        Some(p) => p,
                        None => return Step::Fail,
                    };
                }
                let prior = match pstack.val() {
                    Some(s) => *s,
                    None => return Step::Fail,
                };
                match self.stable.goto(prior, self.stable.production(ridx).head) {
                    Some(s) => pstack = pstack.child(s),
                    None => return Step::Fail,
                }
            }
            Action::Shift(state_id) => {
                if prefix.take().is_none() {
                    laidx += 1;
                }
                pstack = pstack.child(state_id);
            }
            Action::Accept => return Step::Accept,
        }
        Step::Continue(prefix, laidx, pstack)
    }

    /// Return a `Lexeme` for the next lexeme (if `laidx` is at or beyond `self.lexemes.len()`
    /// this will be a lexeme constructed to look as if it contains the end marker).
    pub(crate) fn next_lexeme(&self, laidx: usize) -> Lexeme<StorageT> {
        eof_lexeme(self.grm, self.lexemes, laidx)
    }

    /// Return the `TIdx` of the next lexeme: the end marker just past the last lexeme, and
    /// epsilon after that.
    pub(crate) fn next_tidx(&self, laidx: usize) -> TIdx<StorageT> {
        let ll = self.lexemes.len();
        if laidx < ll {
            TIdx(self.lexemes[laidx].tok_id())
        } else if laidx == ll {
            self.grm.dollar_idx()
        } else {
            self.grm.epsilon_idx()
        }
    }
}

/// The outcome of applying one action to a persistent stack.
enum Step<StorageT> {
    Accept,
    /// The remaining prefix, the next lexeme's index and the new stack.
    Continue(Option<Lexeme<StorageT>>, usize, Cactus<StIdx>),
    Fail,
}

/// Return the lexeme at `laidx` or, past the end of `lexemes`, a zero length end marker lexeme
/// positioned just after the last lexeme.
pub(crate) fn eof_lexeme<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    lexemes: &[Lexeme<StorageT>],
    laidx: usize,
) -> Lexeme<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    match lexemes.get(laidx) {
        Some(l) => *l,
        None => {
            let last_la_end = lexemes.last().map_or(0, |l| l.span().end());
            Lexeme::new(grm.dollar_idx().as_storaget(), last_la_end, 0)
        }
    }
}

pub(crate) trait Recoverer<StorageT: 'static + Debug + Hash + PrimInt + Unsigned> {
    /// Try to recover from a syntax error at `laidx`, mutating `pstack` and `tstack`. Returns
    /// the lexeme index at which parsing should resume, and the repair sequences found (the first
    /// of which has been applied). No repair sequences means recovery failed.
    fn recover(
        &self,
        parser: &Parser<StorageT>,
        laidx: usize,
        pstack: &mut PStack,
        tstack: &mut TStack<StorageT>,
    ) -> (usize, Vec<Vec<ParseRepair<StorageT>>>);
}

/// What recovery algorithm should be used when a syntax error is encountered?
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecoveryKind {
    /// Insert or delete one lexeme, checking that the next few lexemes then parse.
    Repair,
    /// Discard lexemes, and states from the parse stack, until some state can parse a lexeme.
    Panic,
    /// Don't use error recovery: return as soon as the first syntax error is encountered.
    None,
}

/// A lexing or parsing error. Although the two are quite distinct in terms of what can be
/// reported to users, both can (at least conceptually) occur at any point of the intertwined
/// lexing/parsing process.
#[derive(Debug)]
pub enum LexParseError<StorageT> {
    LexError(LexError),
    /// Parsing errors, and the tree built after recovering from them if parsing reached the end
    /// of the input.
    ParseError(Option<Node<StorageT>>, Vec<ParseError<StorageT>>),
}

impl<StorageT: Copy + Debug> Error for LexParseError<StorageT> {}

impl<StorageT: Copy + Debug> fmt::Display for LexParseError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LexParseError::LexError(ref e) => Display::fmt(e, f),
            LexParseError::ParseError(_, ref errs) => {
                write!(f, "{} parse error(s)", errs.len())?;
                for e in errs {
                    write!(f, "\n{}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl<StorageT> From<LexError> for LexParseError<StorageT> {
    fn from(err: LexError) -> LexParseError<StorageT> {
        LexParseError::LexError(err)
    }
}

impl<StorageT> From<(Option<Node<StorageT>>, Vec<ParseError<StorageT>>)>
    for LexParseError<StorageT>
{
    fn from(err: (Option<Node<StorageT>>, Vec<ParseError<StorageT>>)) -> LexParseError<StorageT> {
        LexParseError::ParseError(err.0, err.1)
    }
}

/// Create and configure parsers for a grammar and its state table.
pub struct RTParserBuilder<'a, StorageT: 'static + Eq + Hash> {
    grm: &'a Grammar<StorageT>,
    stable: &'a StateTable<StorageT>,
    recoverer: RecoveryKind,
    max_error_count: usize,
    max_stack_size: usize,
    actions: Option<&'a SemanticActionFn<'a, StorageT>>,
}

impl<'a, StorageT: 'static + Debug + Hash + PrimInt + Unsigned> RTParserBuilder<'a, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create a builder from a grammar and a state table built from it.
    pub fn new(grm: &'a Grammar<StorageT>, stable: &'a StateTable<StorageT>) -> Self {
        RTParserBuilder {
            grm,
            stable,
            recoverer: RecoveryKind::Repair,
            max_error_count: 100,
            max_stack_size: 100,
            actions: None,
        }
    }

    /// Set the recoverer for this parser to `rk`. Defaults to `RecoveryKind::Repair`.
    pub fn recoverer(mut self, rk: RecoveryKind) -> Self {
        self.recoverer = rk;
        self
    }

    /// Stop parsing once `n` syntax errors have been reported. Defaults to 100.
    pub fn max_error_count(mut self, n: usize) -> Self {
        self.max_error_count = n;
        self
    }

    /// After recovering from a syntax error, stop parsing if the parse stack grows more than `n`
    /// entries deeper than it was after recovery. Defaults to 100.
    pub fn max_stack_size(mut self, n: usize) -> Self {
        self.max_stack_size = n;
        self
    }

    /// Call `f` for each semantic action reached by a reduction of the deterministic parser.
    pub fn semantic_actions(mut self, f: &'a SemanticActionFn<'a, StorageT>) -> Self {
        self.actions = Some(f);
        self
    }

    /// Parse input with the deterministic parser. On success return a parse tree. On failure,
    /// return a `LexParseError`: a `LexError` means that no parse tree was produced; a
    /// `ParseError` may (if its first element is `Some(...)`) return a parse tree (with parts
    /// filled in by this builder's recoverer).
    ///
    /// If the state table has cells with more than one action (e.g. an LR(*) table), the first
    /// action which survives the next few lexemes is taken.
    pub fn parse(
        &self,
        lexer: &dyn Lexer<'_, StorageT>,
    ) -> Result<Node<StorageT>, LexParseError<StorageT>> {
        let lexemes = lexer.iter().collect::<Result<Vec<_>, _>>()?;
        Ok(Parser::parse(self, &lexemes)?)
    }

    /// Parse input with the generalized parser, returning a forest of every parse of the input.
    /// There is no error recovery: the first syntax error ends parsing. Semantic actions are not
    /// called.
    pub fn parse_generalized(
        &self,
        lexer: &dyn Lexer<'_, StorageT>,
    ) -> Result<Forest<StorageT>, GlrParseError<StorageT>> {
        let lexemes = lexer.iter().collect::<Result<Vec<_>, _>>()?;
        glr::parse(self.grm, self.stable, &lexemes)
    }
}

/// After a parse error is encountered, the parser attempts to find a way of recovering. Each entry
/// in the sequence of repairs is represented by a `ParseRepair`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParseRepair<StorageT> {
    /// Insert a terminal.
    Insert(TIdx<StorageT>),
    /// Delete a lexeme.
    Delete(Lexeme<StorageT>),
}

/// Records a single parse error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError<StorageT> {
    stidx: StIdx,
    lexeme: Lexeme<StorageT>,
    repairs: Vec<Vec<ParseRepair<StorageT>>>,
}

impl<StorageT: Copy + Debug> Display for ParseError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Parse error in state {} at {}", self.stidx, self.lexeme)
    }
}

impl<StorageT: Copy + Debug> Error for ParseError<StorageT> {}

impl<StorageT: 'static + PrimInt + Unsigned> ParseError<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Return the state table index where this error was detected.
    pub fn stidx(&self) -> StIdx {
        self.stidx
    }

    /// Return the lexeme where this error was detected.
    pub fn lexeme(&self) -> &Lexeme<StorageT> {
        &self.lexeme
    }

    /// Return the repairs found that would fix this error. Note that there are infinite number of
    /// possible repairs for any error, so this is by definition a (finite) subset.
    pub fn repairs(&self) -> &[Vec<ParseRepair<StorageT>>] {
        &self.repairs
    }

    /// Pretty print this error as a message for users, e.g.:
    ///
    /// ```text
    /// Parsing error at line 1 column 5. Repair sequences found:
    ///    1: Delete +
    ///    2: Insert INT
    /// ```
    pub fn pp(&self, lexer: &dyn Lexer<'_, StorageT>, grm: &Grammar<StorageT>) -> String
    where
        StorageT: Hash,
    {
        let ((line, col), _) = lexer.line_col(self.lexeme.span());
        let mut out = format!("Parsing error at line {} column {}.", line, col);
        if self.repairs.is_empty() {
            out.push_str(" No repair sequences found.");
            return out;
        }
        out.push_str(" Repair sequences found:");
        for (i, rs) in self.repairs.iter().enumerate() {
            let rs = rs
                .iter()
                .map(|r| match r {
                    ParseRepair::Insert(tidx) => format!("Insert {}", grm.terminal_name(*tidx)),
                    ParseRepair::Delete(l) => format!("Delete {}", lexer.span_str(l.span())),
                })
                .collect::<Vec<_>>();
            out.push_str(&format!("\n   {}: {}", i + 1, rs.join(", ")));
        }
        out
    }
}
