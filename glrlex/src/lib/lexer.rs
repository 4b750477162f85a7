use std::{error::Error, fmt, hash::Hash, slice::Iter};

use glrgrammar::{Grammar, NewlineCache, Span, TIdx};
use glrpar::{LexError, Lexeme, Lexer};
use log::debug;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use regex::{Regex, RegexBuilder};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LexBuildErrorKind {
    /// A terminal's pattern is not a valid regular expression.
    InvalidRegex,
}

/// An error found while turning a grammar's terminals into lexing rules.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LexBuildError {
    pub kind: LexBuildErrorKind,
    /// The terminal at fault.
    pub name: String,
    /// The regex library's description of the problem.
    pub msg: String,
}

impl Error for LexBuildError {}

impl fmt::Display for LexBuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            LexBuildErrorKind::InvalidRegex => {
                write!(f, "Invalid pattern for terminal '{}': {}", self.name, self.msg)
            }
        }
    }
}

/// A lexing rule: a terminal and the compiled form of its pattern.
#[derive(Debug)]
pub struct TerminalRule<StorageT> {
    pub tok_id: StorageT,
    pub name: String,
    pub re_str: String,
    re: Regex,
}

impl<StorageT> TerminalRule<StorageT> {
    fn new(tok_id: StorageT, name: &str, re_str: &str) -> Result<Self, regex::Error> {
        // Anchored, so that a match always starts at the current position.
        let re = RegexBuilder::new(&format!("\\A(?:{})", re_str))
            .multi_line(true)
            .dot_matches_new_line(true)
            .build()?;
        Ok(TerminalRule {
            tok_id,
            name: name.to_owned(),
            re_str: re_str.to_owned(),
            re,
        })
    }
}

/// The lexing rules of a grammar.
#[derive(Debug)]
pub struct GrammarLexer<StorageT> {
    rules: Vec<TerminalRule<StorageT>>,
    separator: Option<StorageT>,
}

impl<StorageT: 'static + Copy + Eq + Hash + PrimInt + Unsigned> GrammarLexer<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Build lexing rules from every terminal of `grm` which has a pattern, in declaration order.
    /// Terminals without a pattern (which always includes epsilon and the end marker) are never
    /// matched.
    pub fn from_grammar(grm: &Grammar<StorageT>) -> Result<Self, LexBuildError> {
        let mut rules = Vec::new();
        for tidx in grm.iter_tidxs() {
            let term = grm.terminal(tidx);
            if let Some(p) = term.pattern() {
                let rule = TerminalRule::new(tidx.as_storaget(), term.name(), p).map_err(|e| {
                    LexBuildError {
                        kind: LexBuildErrorKind::InvalidRegex,
                        name: term.name().to_owned(),
                        msg: e.to_string(),
                    }
                })?;
                rules.push(rule);
            }
        }
        debug!("{}: {} lexing rules", grm.name(), rules.len());
        Ok(GrammarLexer {
            rules,
            separator: grm.separator().map(|t: TIdx<StorageT>| t.as_storaget()),
        })
    }

    pub fn iter_rules(&self) -> Iter<'_, TerminalRule<StorageT>> {
        self.rules.iter()
    }

    pub fn rule_by_name(&self, n: &str) -> Option<&TerminalRule<StorageT>> {
        self.rules.iter().find(|r| r.name == n)
    }

    /// Return a lexer for the string `s`.
    pub fn lexer<'lexer, 'input: 'lexer>(
        &'lexer self,
        s: &'input str,
    ) -> MatchingLexer<'lexer, 'input, StorageT> {
        MatchingLexer::new(self, s)
    }
}

/// The lexemes of one input. Lexing happens up front and stops at the first error.
pub struct MatchingLexer<'lexer, 'input: 'lexer, StorageT> {
    lexerdef: &'lexer GrammarLexer<StorageT>,
    s: &'input str,
    lexemes: Vec<Result<Lexeme<StorageT>, LexError>>,
    newlines: NewlineCache,
}

impl<'lexer, 'input: 'lexer, StorageT: 'static + Copy + Eq + Hash + PrimInt + Unsigned>
    MatchingLexer<'lexer, 'input, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn new(lexerdef: &'lexer GrammarLexer<StorageT>, s: &'input str) -> Self {
        let mut lexemes = Vec::new();
        let mut i = 0;
        while i < s.len() {
            let mut longest = 0; // Length of the longest match
            let mut longest_ridx = 0; // Only valid if longest != 0
            for (ridx, r) in lexerdef.rules.iter().enumerate() {
                if let Some(m) = r.re.find(&s[i..]) {
                    // Using ">" means an earlier rule beats a later one matching the same length.
                    if m.end() > longest {
                        longest = m.end();
                        longest_ridx = ridx;
                    }
                }
            }
            if longest == 0 {
                let len = s[i..].chars().next().map_or(0, |c| c.len_utf8());
                debug!("No terminal matches input at byte {}", i);
                lexemes.push(Err(LexError::new(Span::new(i, i + len))));
                break;
            }
            let tok_id = lexerdef.rules[longest_ridx].tok_id;
            if Some(tok_id) != lexerdef.separator {
                lexemes.push(Ok(Lexeme::new(tok_id, i, longest)));
            }
            i += longest;
        }
        MatchingLexer {
            lexerdef,
            s,
            lexemes,
            newlines: NewlineCache::new(s),
        }
    }

    /// The rules this lexer was built from.
    pub fn lexerdef(&self) -> &'lexer GrammarLexer<StorageT> {
        self.lexerdef
    }
}

impl<'lexer, 'input: 'lexer, StorageT: 'static + Copy + Eq + Hash + PrimInt + Unsigned>
    Lexer<'input, StorageT> for MatchingLexer<'lexer, 'input, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = Result<Lexeme<StorageT>, LexError>> + 'a> {
        Box::new(self.lexemes.iter().cloned())
    }

    fn span_str(&self, span: Span) -> &'input str {
        if span.end() > self.s.len() {
            panic!(
                "Span {:?} exceeds known input length {}",
                span,
                self.s.len()
            );
        }
        &self.s[span.start()..span.end()]
    }

    fn line_col(&self, span: Span) -> ((usize, usize), (usize, usize)) {
        let lc = |byte| {
            self.newlines
                .byte_to_line_and_col(self.s, byte)
                .unwrap_or_else(|| panic!("Span {:?} is not a valid span of the input", span))
        };
        (lc(span.start()), lc(span.end()))
    }
}

#[cfg(test)]
mod test {
    use glrgrammar::GrammarBuilder;

    use super::*;

    fn grammar() -> Grammar<u32> {
        GrammarBuilder::new("t")
            .terminal("if", "if")
            .terminal("id", "[a-z]+")
            .terminal("int", "[0-9]+")
            .terminal("ws", "[ \\t\\n]+")
            .rule("S", &["id"])
            .rule("S", &["if"])
            .rule("S", &["int"])
            .axiom("S")
            .separator("ws")
            .build()
            .unwrap()
    }

    fn lex(lexerdef: &GrammarLexer<u32>, s: &str) -> Vec<(String, String)> {
        let lexer = lexerdef.lexer(s);
        lexer
            .iter()
            .map(|r| {
                let l = r.unwrap();
                let name = &lexerdef
                    .iter_rules()
                    .find(|r| r.tok_id == l.tok_id())
                    .unwrap()
                    .name;
                (name.clone(), lexer.span_str(l.span()).to_owned())
            })
            .collect()
    }

    #[test]
    fn longest_match_and_ties() {
        let grm = grammar();
        let lexerdef = GrammarLexer::from_grammar(&grm).unwrap();
        assert_eq!(lexerdef.iter_rules().count(), 4);
        assert_eq!(
            lex(&lexerdef, "if iffy 12"),
            vec![
                ("if".to_owned(), "if".to_owned()),
                ("id".to_owned(), "iffy".to_owned()),
                ("int".to_owned(), "12".to_owned())
            ]
        );
    }

    #[test]
    fn tok_ids_are_terminal_indices() {
        let grm = grammar();
        let lexerdef = GrammarLexer::from_grammar(&grm).unwrap();
        for n in ["if", "id", "int", "ws"] {
            assert_eq!(
                lexerdef.rule_by_name(n).unwrap().tok_id,
                grm.terminal_idx(n).unwrap().as_storaget()
            );
        }
        assert!(lexerdef.rule_by_name("$").is_none());
    }

    #[test]
    fn lex_errors() {
        let grm = grammar();
        let lexerdef = GrammarLexer::from_grammar(&grm).unwrap();
        let lexer = lexerdef.lexer("ab\n λ cd");
        let lexemes = lexer.iter().collect::<Vec<_>>();
        assert_eq!(lexemes.len(), 2);
        assert!(lexemes[0].is_ok());
        let e = lexemes[1].unwrap_err();
        assert_eq!(e.span(), Span::new(4, 6));
        assert_eq!(lexer.line_col(e.span()), ((2, 2), (2, 3)));
    }

    #[test]
    fn invalid_patterns() {
        let grm = GrammarBuilder::<u32>::new("t")
            .terminal("bad", "[a-")
            .rule("S", &["bad"])
            .axiom("S")
            .build()
            .unwrap();
        let e = GrammarLexer::from_grammar(&grm).unwrap_err();
        assert_eq!(e.kind, LexBuildErrorKind::InvalidRegex);
        assert_eq!(e.name, "bad");
    }
}
