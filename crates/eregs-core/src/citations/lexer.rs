//! Tokenizer for citation text.
//!
//! The lexer never fails: anything it does not recognise becomes
//! [`Tok::Other`]. Spans come out of chumsky as char indices and are mapped
//! to byte offsets before leaving this module.

use std::ops::Range;

use chumsky::prelude::*;

const MAX_MARKER_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Tok {
    /// `§` or `§§`
    SectionSign,
    Number(String),
    /// Parenthesised marker with the parentheses stripped: `(b)` → `b`.
    Marker(String),
    Word(String),
    Dot,
    Dash,
    Comma,
    Other(char),
    /// Whitespace between two tokens. Only [`spaced`] produces it.
    Space,
}

/// A token with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lexeme {
    pub tok: Tok,
    pub start: usize,
    pub end: usize,
}

impl Lexeme {
    /// No whitespace between `self` and `next`.
    pub fn touches(&self, next: &Lexeme) -> bool {
        self.end == next.start
    }
}

fn lexer() -> impl Parser<char, Vec<(Tok, Range<usize>)>, Error = Simple<char>> {
    let section = just('§').repeated().at_least(1).to(Tok::SectionSign);

    let number = filter(|c: &char| c.is_ascii_digit())
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(Tok::Number);

    let marker = just('(')
        .ignore_then(
            filter(|c: &char| c.is_ascii_alphanumeric())
                .repeated()
                .at_least(1)
                .collect::<String>()
                .try_map(|raw: String, span| {
                    if raw.len() <= MAX_MARKER_LEN {
                        Ok(raw)
                    } else {
                        Err(Simple::custom(span, "not a paragraph marker"))
                    }
                }),
        )
        .then_ignore(just(')'))
        .map(Tok::Marker);

    let word = filter(|c: &char| c.is_alphabetic())
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(Tok::Word);

    let punct = choice((
        just('.').to(Tok::Dot),
        just('-').to(Tok::Dash),
        just('\u{2013}').to(Tok::Dash),
        just(',').to(Tok::Comma),
    ));

    let other = any().map(Tok::Other);

    choice((section, marker, number, word, punct, other))
        .map_with_span(|tok, span| (tok, span))
        .padded()
        .repeated()
        .then_ignore(end())
}

/// Tokenize `text`, reporting byte spans.
pub(crate) fn lex(text: &str) -> Vec<Lexeme> {
    let Ok(tokens) = lexer().parse(text) else {
        return Vec::new();
    };
    let byte_at: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    let to_byte = |ci: usize| byte_at.get(ci).copied().unwrap_or(text.len());
    tokens
        .into_iter()
        .map(|(tok, span)| Lexeme {
            tok,
            start: to_byte(span.start),
            end: to_byte(span.end),
        })
        .collect()
}

/// Token stream for the phrase grammar: every lexeme, with a [`Tok::Space`]
/// spanning the gap wherever two neighbours do not touch.
pub(crate) fn spaced(lexemes: &[Lexeme]) -> Vec<(Tok, Range<usize>)> {
    let mut out = Vec::with_capacity(lexemes.len() * 2);
    for (i, lexeme) in lexemes.iter().enumerate() {
        if i > 0 && !lexemes[i - 1].touches(lexeme) {
            out.push((Tok::Space, lexemes[i - 1].end..lexeme.start));
        }
        out.push((lexeme.tok.clone(), lexeme.start..lexeme.end));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(text: &str) -> Vec<Tok> {
        lex(text).into_iter().map(|l| l.tok).collect()
    }

    #[test]
    fn section_with_markers() {
        assert_eq!(
            toks("§ 1005.7(b)(1)"),
            vec![
                Tok::SectionSign,
                Tok::Number("1005".into()),
                Tok::Dot,
                Tok::Number("7".into()),
                Tok::Marker("b".into()),
                Tok::Marker("1".into()),
            ]
        );
    }

    #[test]
    fn spans_are_bytes() {
        let text = "§ 1005.7(b)";
        let lexemes = lex(text);
        // '§' is two bytes in UTF-8.
        assert_eq!(lexemes[0].start, 0);
        assert_eq!(lexemes[0].end, 2);
        assert_eq!(&text[lexemes[1].start..lexemes[1].end], "1005");
        assert_eq!(&text[lexemes[4].start..lexemes[4].end], "(b)");
    }

    #[test]
    fn long_parenthetical_is_not_a_marker() {
        let tokens = toks("(reserved)");
        assert_eq!(tokens[0], Tok::Other('('));
        assert_eq!(tokens[1], Tok::Word("reserved".into()));
    }

    #[test]
    fn unknown_characters_survive() {
        let tokens = toks("a; b");
        assert_eq!(
            tokens,
            vec![
                Tok::Word("a".into()),
                Tok::Other(';'),
                Tok::Word("b".into())
            ]
        );
    }

    #[test]
    fn touching_tokens() {
        let lexemes = lex("1005.7 (b)");
        assert!(lexemes[0].touches(&lexemes[1]));
        assert!(!lexemes[2].touches(&lexemes[3]));
    }

    #[test]
    fn gaps_become_space_tokens() {
        let tokens = spaced(&lex("§ 1005.7  (b)"));
        let kinds: Vec<&Tok> = tokens.iter().map(|(t, _)| t).collect();
        assert_eq!(
            kinds,
            vec![
                &Tok::SectionSign,
                &Tok::Space,
                &Tok::Number("1005".into()),
                &Tok::Dot,
                &Tok::Number("7".into()),
                &Tok::Space,
                &Tok::Marker("b".into()),
            ]
        );
        assert_eq!(tokens[5].1, 9..11);
    }
}
