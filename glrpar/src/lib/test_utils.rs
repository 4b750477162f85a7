use glrgrammar::{Grammar, NewlineCache, Span};
use regex::Regex;

use crate::lex_api::{LexError, Lexeme, Lexer};

/// A minimal lexer for tests: whitespace is skipped, and the longest match of a terminal's
/// pattern wins, with earlier terminals winning ties. Lexing stops at the first error.
pub(crate) struct SmallLexer<'input> {
    s: &'input str,
    lexemes: Vec<Result<Lexeme<u32>, LexError>>,
    newlines: NewlineCache,
}

impl<'input> SmallLexer<'input> {
    pub(crate) fn new(grm: &Grammar<u32>, s: &'input str) -> Self {
        let rules = grm
            .iter_tidxs()
            .filter_map(|tidx| {
                grm.terminal(tidx).pattern().map(|p| {
                    (
                        tidx.as_storaget(),
                        Regex::new(&format!("\\A(?:{})", p)).unwrap(),
                    )
                })
            })
            .collect::<Vec<_>>();
        let mut lexemes = Vec::new();
        let mut i = 0;
        while i < s.len() {
            let rest = &s[i..];
            let trimmed = rest.trim_start();
            if trimmed.len() < rest.len() {
                i += rest.len() - trimmed.len();
                continue;
            }
            let mut longest: Option<(u32, usize)> = None;
            for (tok_id, re) in &rules {
                if let Some(m) = re.find(rest) {
                    if m.end() > 0 && longest.map_or(true, |(_, l)| m.end() > l) {
                        longest = Some((*tok_id, m.end()));
                    }
                }
            }
            match longest {
                Some((tok_id, len)) => {
                    lexemes.push(Ok(Lexeme::new(tok_id, i, len)));
                    i += len;
                }
                None => {
                    let len = rest.chars().next().map_or(1, |c| c.len_utf8());
                    lexemes.push(Err(LexError::new(Span::new(i, i + len))));
                    break;
                }
            }
        }
        SmallLexer {
            s,
            lexemes,
            newlines: NewlineCache::new(s),
        }
    }
}

impl<'input> Lexer<'input, u32> for SmallLexer<'input> {
    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item = Result<Lexeme<u32>, LexError>> + 'a> {
        Box::new(self.lexemes.iter().cloned())
    }

    fn span_str(&self, span: Span) -> &'input str {
        &self.s[span.start()..span.end()]
    }

    fn line_col(&self, span: Span) -> ((usize, usize), (usize, usize)) {
        (
            self.newlines
                .byte_to_line_and_col(self.s, span.start())
                .unwrap(),
            self.newlines
                .byte_to_line_and_col(self.s, span.end())
                .unwrap(),
        )
    }
}
