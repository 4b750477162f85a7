use std::{error::Error, fmt, marker::PhantomData};

use indexmap::IndexMap;
use log::debug;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{
    grammar::{BodyElement, Grammar, Rule, Terminal},
    AIdx, CIdx, RIdx, Symbol, TIdx, TreeAction, VIdx, VtIdx, DOLLAR_NAME, EPSILON_NAME,
    START_NAME,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind {
    /// A rule body refers to a name that is neither a terminal nor a variable.
    UnknownSymbol,
    /// A terminal was declared twice (or clashes with epsilon or the end marker).
    DuplicateTerminal,
    /// A name is used both as a terminal and as a variable.
    DuplicateSymbol,
    /// No axiom was given.
    NoAxiom,
    /// The axiom is not a variable.
    InvalidAxiom,
    /// The separator is not a declared terminal.
    InvalidSeparator,
    /// A repetition was applied to something other than a grammar symbol.
    InvalidRepetition,
    /// The grammar has more symbols or rules than its storage type can index.
    TooManySymbols,
}

/// An error found while resolving a grammar. `name` is the offending name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError {
    pub kind: GrammarErrorKind,
    pub name: String,
}

impl GrammarError {
    fn new(kind: GrammarErrorKind, name: &str) -> Self {
        GrammarError {
            kind,
            name: name.to_owned(),
        }
    }
}

impl Error for GrammarError {}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self.kind {
            GrammarErrorKind::UnknownSymbol => "Unknown symbol",
            GrammarErrorKind::DuplicateTerminal => "Duplicate terminal",
            GrammarErrorKind::DuplicateSymbol => "Name used as both terminal and variable",
            GrammarErrorKind::NoAxiom => "No axiom specified",
            GrammarErrorKind::InvalidAxiom => "Axiom is not a variable",
            GrammarErrorKind::InvalidSeparator => "Separator is not a terminal",
            GrammarErrorKind::InvalidRepetition => "Only grammar symbols can be repeated",
            GrammarErrorKind::TooManySymbols => "Too many symbols for the storage type",
        };
        if self.name.is_empty() {
            write!(f, "{}", s)
        } else {
            write!(f, "{} '{}'", s, self.name)
        }
    }
}

/// Builds a [Grammar] from names. This is the interface through which a grammar loader hands a
/// resolved grammar to the automaton builders.
///
/// Rule bodies are lists of element strings:
///
///   * `name`: a terminal or variable. A trailing `^` promotes it (e.g. `+^`), a trailing `!`
///     drops it (e.g. `;!`).
///   * `name*` / `name+`: zero-or-more / one-or-more repetitions of `name`. These generate a
///     fresh variable whose nodes are spliced into their parent.
///   * `@name`: a virtual symbol (which may itself carry `^` or `!`).
///   * `{name}`: a semantic action attachment point.
///
/// A single character is always taken literally, so a terminal named `+` is written `+`.
pub struct GrammarBuilder<StorageT = u32> {
    name: String,
    terminals: Vec<(String, Option<String>, Option<String>)>,
    rules: Vec<(String, Vec<String>, Option<String>)>,
    axiom: Option<String>,
    separator: Option<String>,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> GrammarBuilder<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new(name: &str) -> Self {
        GrammarBuilder {
            name: name.to_owned(),
            terminals: Vec::new(),
            rules: Vec::new(),
            axiom: None,
            separator: None,
            phantom: PhantomData,
        }
    }

    /// Declare a terminal matched by the regular expression `pattern`.
    pub fn terminal(mut self, name: &str, pattern: &str) -> Self {
        self.terminals
            .push((name.to_owned(), Some(pattern.to_owned()), None));
        self
    }

    /// Declare a terminal which may only be matched when `context` is open.
    pub fn contextual_terminal(mut self, name: &str, pattern: &str, context: &str) -> Self {
        self.terminals.push((
            name.to_owned(),
            Some(pattern.to_owned()),
            Some(context.to_owned()),
        ));
        self
    }

    pub fn rule(mut self, head: &str, body: &[&str]) -> Self {
        self.rules.push((
            head.to_owned(),
            body.iter().map(|s| (*s).to_owned()).collect(),
            None,
        ));
        self
    }

    /// Add a rule whose body is parsed with `context` open.
    pub fn contextual_rule(mut self, head: &str, context: &str, body: &[&str]) -> Self {
        self.rules.push((
            head.to_owned(),
            body.iter().map(|s| (*s).to_owned()).collect(),
            Some(context.to_owned()),
        ));
        self
    }

    pub fn axiom(mut self, name: &str) -> Self {
        self.axiom = Some(name.to_owned());
        self
    }

    /// Set the terminal which token sources should skip (typically whitespace).
    pub fn separator(mut self, name: &str) -> Self {
        self.separator = Some(name.to_owned());
        self
    }

    pub fn build(&self) -> Result<Grammar<StorageT>, GrammarError> {
        let mut contexts = vec![String::new()];
        let mut terminals = vec![
            Terminal {
                name: EPSILON_NAME.to_owned(),
                pattern: None,
                context: None,
            },
            Terminal {
                name: DOLLAR_NAME.to_owned(),
                pattern: None,
                context: None,
            },
        ];
        for (n, pattern, ctx) in &self.terminals {
            if terminals.iter().any(|t| &t.name == n) {
                return Err(GrammarError::new(GrammarErrorKind::DuplicateTerminal, n));
            }
            terminals.push(Terminal {
                name: n.clone(),
                pattern: pattern.clone(),
                context: ctx.as_ref().map(|c| CIdx(intern(&mut contexts, c).as_())),
            });
        }

        let mut variables = Vec::new();
        for (head, _, _) in &self.rules {
            if terminals.iter().any(|t| &t.name == head) {
                return Err(GrammarError::new(GrammarErrorKind::DuplicateSymbol, head));
            }
            if !variables.contains(head) {
                variables.push(head.clone());
            }
        }

        let mut rsv = Resolver {
            terminals: &terminals,
            variables,
            virtuals: Vec::new(),
            actions: Vec::new(),
            repetitions: IndexMap::new(),
            generated_rules: Vec::new(),
        };
        let mut rules = Vec::with_capacity(self.rules.len());
        for (head, body, ctx) in &self.rules {
            let mut elements = Vec::with_capacity(body.len());
            for e in body {
                elements.push(rsv.element(e)?);
            }
            let head = rsv.variable(head).ok_or_else(|| {
                GrammarError::new(GrammarErrorKind::UnknownSymbol, head)
            })?;
            let mut rule = new_rule(head, elements, false);
            rule.context = ctx.as_ref().map(|c| CIdx(intern(&mut contexts, c).as_()));
            rules.push(rule);
        }
        let Resolver {
            mut variables,
            virtuals,
            actions,
            generated_rules,
            ..
        } = rsv;
        rules.extend(generated_rules);

        let axiom = match self.axiom {
            None => return Err(GrammarError::new(GrammarErrorKind::NoAxiom, "")),
            Some(ref n) => match variables.iter().position(|v| v == n) {
                Some(i) => VIdx(i.as_()),
                None => return Err(GrammarError::new(GrammarErrorKind::InvalidAxiom, n)),
            },
        };
        let separator = match self.separator {
            None => None,
            Some(ref n) => match terminals.iter().position(|t| &t.name == n) {
                Some(i) if i > 1 => Some(TIdx(i.as_())),
                _ => return Err(GrammarError::new(GrammarErrorKind::InvalidSeparator, n)),
            },
        };

        let mut start_name = START_NAME.to_owned();
        while variables.contains(&start_name) {
            start_name.push_str(START_NAME);
        }
        let start_var = VIdx(variables.len().as_());
        variables.push(start_name);
        let start_rule = RIdx(rules.len().as_());
        rules.push(new_rule(
            start_var,
            vec![
                BodyElement::Symbol {
                    symbol: Symbol::Variable(axiom),
                    action: TreeAction::None,
                },
                BodyElement::Symbol {
                    symbol: Symbol::Terminal(TIdx(StorageT::one())),
                    action: TreeAction::None,
                },
            ],
            true,
        ));

        let max = num_traits::cast::<StorageT, usize>(StorageT::max_value()).unwrap_or(usize::MAX);
        if [
            terminals.len(),
            variables.len(),
            rules.len(),
            virtuals.len(),
            actions.len(),
            contexts.len(),
        ]
        .iter()
        .any(|&l| l > max)
        {
            return Err(GrammarError::new(GrammarErrorKind::TooManySymbols, ""));
        }

        let mut var_rules = vec![Vec::new(); variables.len()];
        for (i, r) in rules.iter().enumerate() {
            var_rules[usize::from(r.head)].push(RIdx(i.as_()));
        }

        debug!(
            "Grammar '{}': {} terminals, {} variables, {} rules",
            self.name,
            terminals.len(),
            variables.len(),
            rules.len()
        );
        Ok(Grammar {
            name: self.name.clone(),
            terminals,
            variables,
            virtuals,
            actions,
            contexts,
            rules,
            var_rules,
            axiom,
            start_var,
            start_rule,
            separator,
        })
    }
}

fn intern(v: &mut Vec<String>, n: &str) -> usize {
    match v.iter().position(|x| x == n) {
        Some(i) => i,
        None => {
            v.push(n.to_owned());
            v.len() - 1
        }
    }
}

fn new_rule<StorageT: Copy>(
    head: VIdx<StorageT>,
    elements: Vec<BodyElement<StorageT>>,
    generated: bool,
) -> Rule<StorageT> {
    let symbols = elements
        .iter()
        .filter_map(|e| match *e {
            BodyElement::Symbol { symbol, .. } => Some(symbol),
            _ => None,
        })
        .collect();
    Rule {
        head,
        elements,
        symbols,
        head_action: if generated {
            TreeAction::Replace
        } else {
            TreeAction::None
        },
        generated,
        context: None,
    }
}

/// Split a trailing tree action marker off `s`.
fn split_action(s: &str) -> (&str, TreeAction) {
    if s.chars().count() > 1 {
        if let Some(n) = s.strip_suffix('^') {
            return (n, TreeAction::Promote);
        }
        if let Some(n) = s.strip_suffix('!') {
            return (n, TreeAction::Drop);
        }
    }
    (s, TreeAction::None)
}

struct Resolver<'a, StorageT> {
    terminals: &'a [Terminal<StorageT>],
    variables: Vec<String>,
    virtuals: Vec<String>,
    actions: Vec<String>,
    /// Generated variables, keyed by the element string that created them, so that `x*` used
    /// twice yields one variable.
    repetitions: IndexMap<String, VIdx<StorageT>>,
    generated_rules: Vec<Rule<StorageT>>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Resolver<'_, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn variable(&self, n: &str) -> Option<VIdx<StorageT>> {
        self.variables
            .iter()
            .position(|v| v == n)
            .map(|i| VIdx(i.as_()))
    }

    fn element(&mut self, s: &str) -> Result<BodyElement<StorageT>, GrammarError> {
        let len = s.chars().count();
        if len > 2 && s.starts_with('{') && s.ends_with('}') {
            let aidx = intern(&mut self.actions, &s[1..s.len() - 1]);
            return Ok(BodyElement::SemanticAction(AIdx(aidx.as_())));
        }
        if len > 1 && s.starts_with('@') {
            let (n, action) = split_action(&s[1..]);
            let vtidx = intern(&mut self.virtuals, n);
            return Ok(BodyElement::Virtual {
                vtidx: VtIdx(vtidx.as_()),
                action,
            });
        }
        if len > 1 && (s.ends_with('*') || s.ends_with('+')) {
            return self.repetition(s);
        }
        let (n, action) = split_action(s);
        let symbol = if let Some(i) = self.terminals.iter().position(|t| t.name == n) {
            Symbol::Terminal(TIdx(i.as_()))
        } else if let Some(vidx) = self.variable(n) {
            Symbol::Variable(vidx)
        } else {
            return Err(GrammarError::new(GrammarErrorKind::UnknownSymbol, n));
        };
        if symbol == Symbol::Terminal(TIdx(StorageT::zero())) {
            // Epsilon is spelt as an empty body.
            return Err(GrammarError::new(GrammarErrorKind::UnknownSymbol, n));
        }
        Ok(BodyElement::Symbol { symbol, action })
    }

    /// Generate `G -> ε | G x` (for `x*`) or `G -> x | G x` (for `x+`).
    fn repetition(&mut self, s: &str) -> Result<BodyElement<StorageT>, GrammarError> {
        let gen_vidx = match self.repetitions.get(s) {
            Some(&vidx) => vidx,
            None => {
                let inner = self.element(&s[..s.len() - 1])?;
                if !matches!(inner, BodyElement::Symbol { .. }) {
                    return Err(GrammarError::new(GrammarErrorKind::InvalidRepetition, s));
                }
                let mut name = s.to_owned();
                while self.variables.contains(&name) || self.terminals.iter().any(|t| t.name == name)
                {
                    name.push('\'');
                }
                let vidx = VIdx(self.variables.len().as_());
                self.variables.push(name);
                self.repetitions.insert(s.to_owned(), vidx);
                let recursive = BodyElement::Symbol {
                    symbol: Symbol::Variable(vidx),
                    action: TreeAction::None,
                };
                let base = if s.ends_with('*') {
                    vec![]
                } else {
                    vec![inner]
                };
                self.generated_rules.push(new_rule(vidx, base, true));
                self.generated_rules
                    .push(new_rule(vidx, vec![recursive, inner], true));
                vidx
            }
        };
        Ok(BodyElement::Symbol {
            symbol: Symbol::Variable(gen_vidx),
            action: TreeAction::None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn repetitions() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("x", "x")
            .rule("test", &["x*"])
            .rule("more", &["x+", "x*"])
            .axiom("test")
            .build()
            .unwrap();
        // test, more, x*, x+, ^
        assert_eq!(usize::from(grm.variables_len()), 5);
        let star = grm.variable_idx("x*").unwrap();
        assert!(grm.is_generated(star));
        let rules = grm.var_rules(star);
        assert_eq!(rules.len(), 2);
        assert_eq!(grm.rule(rules[0]).symbols_len(), 0);
        assert_eq!(grm.rule(rules[1]).symbols_len(), 2);
        assert_eq!(grm.rule(rules[1]).head_action(), TreeAction::Replace);
        let plus = grm.variable_idx("x+").unwrap();
        assert_eq!(grm.rule(grm.var_rules(plus)[0]).symbols_len(), 1);
        assert_eq!(grm.pp_rule(grm.var_rules(plus)[1], None), "x+ -> x+ 'x'");
    }

    #[test]
    fn errors() {
        let e = GrammarBuilder::<u32>::new("t")
            .terminal("x", "x")
            .rule("S", &["y"])
            .axiom("S")
            .build()
            .unwrap_err();
        assert_eq!(e.kind, GrammarErrorKind::UnknownSymbol);
        assert_eq!(e.to_string(), "Unknown symbol 'y'");

        let e = GrammarBuilder::<u32>::new("t")
            .terminal("x", "x")
            .terminal("x", "y")
            .rule("S", &["x"])
            .axiom("S")
            .build()
            .unwrap_err();
        assert_eq!(e.kind, GrammarErrorKind::DuplicateTerminal);

        let e = GrammarBuilder::<u32>::new("t")
            .terminal("x", "x")
            .rule("S", &["x"])
            .build()
            .unwrap_err();
        assert_eq!(e.kind, GrammarErrorKind::NoAxiom);

        let e = GrammarBuilder::<u32>::new("t")
            .terminal("x", "x")
            .rule("S", &["x"])
            .axiom("x")
            .build()
            .unwrap_err();
        assert_eq!(e.kind, GrammarErrorKind::InvalidAxiom);

        let e = GrammarBuilder::<u32>::new("t")
            .terminal("x", "x")
            .rule("S", &["{a}*"])
            .axiom("S")
            .build()
            .unwrap_err();
        assert_eq!(e.kind, GrammarErrorKind::InvalidRepetition);

        let e = GrammarBuilder::<u32>::new("t")
            .terminal("x", "x")
            .rule("S", &["x"])
            .axiom("S")
            .separator("$")
            .build()
            .unwrap_err();
        assert_eq!(e.kind, GrammarErrorKind::InvalidSeparator);
    }

    #[test]
    fn too_many_symbols() {
        let mut b = GrammarBuilder::<u8>::new("t");
        for i in 0..300 {
            b = b.terminal(&format!("t{}", i), "a");
        }
        let e = b.rule("S", &["t0"]).axiom("S").build().unwrap_err();
        assert_eq!(e.kind, GrammarErrorKind::TooManySymbols);
    }

    #[test]
    fn contexts() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("x", "x")
            .contextual_terminal("kw", "k", "inner")
            .contextual_rule("S", "inner", &["x", "kw"])
            .axiom("S")
            .build()
            .unwrap();
        let ctx = grm.context_idx("inner").unwrap();
        assert_eq!(usize::from(ctx), 1);
        assert_eq!(grm.terminal(grm.terminal_idx("kw").unwrap()).context(), Some(ctx));
        assert_eq!(grm.terminal(grm.terminal_idx("x").unwrap()).context(), None);
        assert_eq!(grm.rule(grm.var_rules(grm.axiom())[0]).context(), Some(ctx));
    }
}
