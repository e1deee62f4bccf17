//! Citations to other parts of the same regulation.
//!
//! Recognised phrases:
//!
//! - `§ 1005.7(b)(1), (2) and (3)`, `§§ 1005.7 through 1005.9`,
//!   `section 1005.7`
//! - `12 CFR 1005.7(b)`, `12 CFR part 1005`
//! - `paragraph (a)(1)(i)(A)`, `paragraphs (b)(1) through (b)(5)`,
//!   `paragraph (c)(2) introductory text`, `paragraph (b) of § 1005.8`
//! - `appendix A`, `appendix A-5(r)`, `Appendix A to part 1005`
//! - `comment 3(b)(1)-1.v`
//! - bare `1005.7(b)` once a part is in context

use std::iter::once;
use std::ops::Range;

use chumsky::Stream;
use chumsky::prelude::*;
use serde::{Deserialize, Serialize};

use super::lexer::{Tok, lex, spaced};
use crate::label::{Label, MAX_COMMENT_LEVELS};
use crate::markers::{MarkerType, PARAGRAPH_LEVELS};

type Span = Range<usize>;

/// One citation inside a larger phrase.
///
/// `start..end` is the tightest span naming this label; `full_start..full_end`
/// is the whole phrase it came from. Offsets are bytes into the input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphCitation {
    pub start: usize,
    pub end: usize,
    pub full_start: usize,
    pub full_end: usize,
    pub label: Label,
}

/// Find every internal citation in `text`. `initial_label` supplies the
/// part, section and paragraph context for relative references.
pub fn internal_citations(text: &str, initial_label: &Label) -> Vec<ParagraphCitation> {
    let tokens = spaced(&lex(text));
    let grammar = phrase();
    let eoi = text.len()..text.len();

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < tokens.len() {
        if tokens[pos].0 == Tok::Space {
            pos += 1;
            continue;
        }
        let after_dot = tokens[..pos]
            .iter()
            .rev()
            .find(|(tok, _)| *tok != Tok::Space)
            .is_some_and(|(tok, _)| *tok == Tok::Dot);
        let stream = Stream::from_iter(eoi.clone(), tokens[pos..].iter().cloned());
        let found = grammar.parse(stream).ok().and_then(|(parsed, full)| {
            let end = full.end;
            resolve(parsed, full, initial_label, after_dot).map(|citations| (citations, end))
        });
        match found {
            Some((mut citations, end)) => {
                out.append(&mut citations);
                pos += tokens[pos..]
                    .partition_point(|(_, span)| span.start < end)
                    .max(1);
            }
            None => pos += 1,
        }
    }
    remove_contained(out)
}

/// Drop any citation whose span sits strictly inside another's.
pub fn remove_contained(citations: Vec<ParagraphCitation>) -> Vec<ParagraphCitation> {
    let spans: Vec<(usize, usize)> = citations.iter().map(|c| (c.start, c.end)).collect();
    citations
        .into_iter()
        .filter(|c| {
            !spans.iter().any(|&(s, e)| {
                s <= c.start && c.end <= e && (s, e) != (c.start, c.end)
            })
        })
        .collect()
}

// ── Syntax ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joiner {
    List,
    Through,
}

/// Touching markers: `(b)(1)(i)`.
#[derive(Debug, Clone)]
struct Run {
    markers: Vec<String>,
    span: Span,
}

/// A list entry before label resolution.
#[derive(Debug, Clone)]
enum Item {
    Section {
        part: String,
        section: String,
        markers: Vec<String>,
        span: Span,
    },
    Markers(Run),
}

impl Item {
    fn span(&self) -> Span {
        match self {
            Item::Section { span, .. } | Item::Markers(Run { span, .. }) => span.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct AppendixRef {
    letter: String,
    /// `5` and `[r]` in `A-5(r)`.
    section: Option<(String, Vec<String>)>,
    span: Span,
}

#[derive(Debug, Clone)]
struct CommentRef {
    section: String,
    markers: Vec<String>,
    levels: Vec<String>,
    span: Span,
}

/// What the grammar recognised, still relative to the context.
#[derive(Debug, Clone)]
enum Phrase {
    /// `§ 1005.7(b), (c)`, `section 1005.7`, `12 CFR 1005.7`.
    Sections(Vec<(Joiner, Item)>),
    /// `1005.7(b)` with nothing in front.
    Bare(Vec<(Joiner, Item)>),
    /// `12 CFR part 1005`.
    CfrPart { part: String, span: Span },
    Paragraphs {
        runs: Vec<(Joiner, Run)>,
        /// `of § 1005.8`
        of_section: Option<(String, String)>,
    },
    Appendices {
        refs: Vec<AppendixRef>,
        to_part: Option<String>,
    },
    Comments(Vec<CommentRef>),
}

fn words(any_of: &'static [&'static str]) -> impl Parser<Tok, (), Error = Simple<Tok>> + Clone {
    filter(move |tok: &Tok| {
        matches!(tok, Tok::Word(w) if any_of.iter().any(|x| w.eq_ignore_ascii_case(x)))
    })
    .ignored()
}

/// Optional whitespace.
fn gap() -> impl Parser<Tok, (), Error = Simple<Tok>> + Clone {
    just(Tok::Space).or_not().ignored()
}

fn number() -> impl Parser<Tok, String, Error = Simple<Tok>> + Clone {
    select! { Tok::Number(n) => n }
}

fn marker() -> impl Parser<Tok, String, Error = Simple<Tok>> + Clone {
    select! { Tok::Marker(m) => m }
}

/// `1005.7` with no whitespace around the dot.
fn part_section() -> impl Parser<Tok, (String, String), Error = Simple<Tok>> + Clone {
    number().then_ignore(just(Tok::Dot)).then(number())
}

fn run() -> impl Parser<Tok, Run, Error = Simple<Tok>> + Clone {
    marker()
        .repeated()
        .at_least(1)
        .map_with_span(|markers, span| Run { markers, span })
}

/// `1005.7(b)(1)`; the first marker must touch the section number.
fn section_item() -> impl Parser<Tok, Item, Error = Simple<Tok>> + Clone {
    part_section()
        .then(marker().repeated())
        .map_with_span(|((part, section), markers), span| Item::Section {
            part,
            section,
            markers,
            span,
        })
}

/// `, ` / ` and ` / `, or ` / ` through ` between list entries. Any
/// `through` in the run makes it a range.
fn joiner() -> impl Parser<Tok, Joiner, Error = Simple<Tok>> + Clone {
    let piece = choice((
        just(Tok::Comma).to(Joiner::List),
        words(&["and", "or"]).to(Joiner::List),
        words(&["through"]).to(Joiner::Through),
    ));
    gap()
        .ignore_then(piece)
        .repeated()
        .at_least(1)
        .then_ignore(gap())
        .map(|pieces| {
            if pieces.contains(&Joiner::Through) {
                Joiner::Through
            } else {
                Joiner::List
            }
        })
}

/// A section, then more sections or marker groups.
fn section_list() -> impl Parser<Tok, Vec<(Joiner, Item)>, Error = Simple<Tok>> + Clone {
    let next = section_item().or(run().map(Item::Markers));
    section_item()
        .then(joiner().then(next).repeated())
        .map(|(first, rest)| once((Joiner::List, first)).chain(rest).collect())
}

/// `12 CFR 1005.7(b)` or `12 CFR part 1005`.
fn cfr_phrase() -> impl Parser<Tok, Phrase, Error = Simple<Tok>> + Clone {
    let cfr = filter(|tok: &Tok| matches!(tok, Tok::Word(w) if w == "CFR"));
    let whole_part = number().map_with_span(|part, span| Phrase::CfrPart { part, span });
    number()
        .then(gap())
        .then(cfr)
        .then(gap())
        .then(words(&["part", "parts"]).then(gap()).or_not())
        .ignore_then(section_list().map(Phrase::Sections).or(whole_part))
}

/// `§ 1005.7(b)`, `§§ 1005.7 and 1005.8`, `section 1005.7`.
fn section_phrase() -> impl Parser<Tok, Phrase, Error = Simple<Tok>> + Clone {
    just(Tok::SectionSign)
        .ignored()
        .or(words(&["section", "sections"]))
        .then(gap())
        .ignore_then(section_list())
        .map(Phrase::Sections)
}

/// `paragraph (b)(1)`, `paragraphs (a), (b), and (c) of this section`.
fn paragraph_phrase() -> impl Parser<Tok, Phrase, Error = Simple<Tok>> + Clone {
    let qualifier = gap()
        .then(words(&["introductory"]))
        .then(gap())
        .then(words(&["text"]))
        .ignored()
        .or(gap().then(words(&["heading"])).ignored());
    let this_section = words(&["this"])
        .then(gap())
        .then(words(&["section", "paragraph"]))
        .to(None);
    let other_section = just(Tok::SectionSign)
        .ignored()
        .or(words(&["section"]))
        .then(gap())
        .or_not()
        .ignore_then(part_section())
        .map(Some);
    let of_clause = gap()
        .then(words(&["of"]))
        .then(gap())
        .ignore_then(this_section.or(other_section));

    words(&["paragraph", "paragraphs"])
        .then(gap())
        .ignore_then(run().then(joiner().then(run()).repeated()))
        .then_ignore(qualifier.or_not())
        .then(of_clause.or_not())
        .map(|((first, rest), of_section)| Phrase::Paragraphs {
            runs: once((Joiner::List, first)).chain(rest).collect(),
            of_section: of_section.flatten(),
        })
}

/// `appendix A`, `Appendix A-5(r)`, `appendices A and B to part 1005`.
fn appendix_phrase() -> impl Parser<Tok, Phrase, Error = Simple<Tok>> + Clone {
    let letter = select! { Tok::Word(w) if is_appendix_letter(&w) => w };
    let reference = letter
        .then(
            just(Tok::Dash)
                .ignore_then(number())
                .then(marker().repeated())
                .or_not(),
        )
        .map_with_span(|(letter, section), span| AppendixRef {
            letter,
            section,
            span,
        });
    let to_part = gap()
        .then(words(&["to"]))
        .then(gap())
        .then(words(&["part"]))
        .then(gap())
        .ignore_then(number());

    words(&["appendix", "appendices"])
        .then(gap())
        .ignore_then(
            reference
                .clone()
                .then(joiner().ignore_then(reference).repeated()),
        )
        .then(to_part.or_not())
        .map(|((first, rest), to_part)| Phrase::Appendices {
            refs: once(first).chain(rest).collect(),
            to_part,
        })
}

/// `comment 3(b)(1)-1.v`, `comments 3(b)-1 and 3(b)-2`.
fn comment_phrase() -> impl Parser<Tok, Phrase, Error = Simple<Tok>> + Clone {
    let level = select! {
        Tok::Word(w) if w.len() <= 5 => w,
        Tok::Number(n) if n.len() <= 5 => n,
    };
    let reference = number()
        .then(marker().repeated())
        .then_ignore(just(Tok::Dash))
        .then(number())
        .then(
            just(Tok::Dot)
                .ignore_then(level)
                .repeated()
                .at_most(MAX_COMMENT_LEVELS - 1),
        )
        .map_with_span(|(((section, markers), first), rest), span| CommentRef {
            section,
            markers,
            levels: once(first).chain(rest).collect(),
            span,
        });

    words(&["comment", "comments"])
        .then(gap())
        .ignore_then(
            reference
                .clone()
                .then(joiner().ignore_then(reference).repeated()),
        )
        .map(|(first, rest)| Phrase::Comments(once(first).chain(rest).collect()))
}

/// Any citation phrase, with the span of the whole phrase.
fn phrase() -> impl Parser<Tok, (Phrase, Span), Error = Simple<Tok>> + Clone {
    choice((
        cfr_phrase(),
        section_phrase(),
        paragraph_phrase(),
        appendix_phrase(),
        comment_phrase(),
        section_list().map(Phrase::Bare),
    ))
    .map_with_span(|parsed, span| (parsed, span))
}

// ── Resolution ──

fn citation(label: Label, span: Span, full: &Span) -> ParagraphCitation {
    ParagraphCitation {
        start: span.start,
        end: span.end,
        full_start: full.start,
        full_end: full.end,
        label,
    }
}

/// Turn a parsed phrase into citations. `None` when the phrase only makes
/// sense with context the caller does not have.
fn resolve(
    parsed: Phrase,
    full: Span,
    initial: &Label,
    after_dot: bool,
) -> Option<Vec<ParagraphCitation>> {
    match parsed {
        Phrase::Sections(items) => Some(resolve_list(items, &full)),
        Phrase::Bare(items) => {
            // Only fires when the part matches the context or a marker
            // follows; `3.5` is a number, not a section.
            if after_dot {
                return None;
            }
            let Some((_, Item::Section { part, markers, .. })) = items.first() else {
                return None;
            };
            let same_part = initial.part.as_deref() == Some(part.as_str());
            if markers.is_empty() && !same_part {
                return None;
            }
            Some(resolve_list(items, &full))
        }
        Phrase::CfrPart { part, span } => {
            let label = Label {
                part: Some(part),
                ..Label::default()
            };
            Some(vec![citation(label, span, &full)])
        }
        Phrase::Paragraphs { runs, of_section } => {
            let context = match of_section {
                Some((part, section)) => Label::section(&part, &section),
                None => initial.clone(),
            };
            let citations = resolve_paragraphs(runs, &context, &full);
            if citations.iter().any(|c| c.label.part.is_none()) {
                return None;
            }
            Some(citations)
        }
        Phrase::Appendices { refs, to_part } => {
            let part = to_part.or_else(|| initial.part.clone())?;
            Some(
                refs.into_iter()
                    .map(|r| {
                        let mut label = Label {
                            part: Some(part.clone()),
                            appendix: Some(r.letter),
                            ..Label::default()
                        };
                        if let Some((section, paragraphs)) = r.section {
                            label.appendix_section = Some(section);
                            label.paragraphs = paragraphs;
                        }
                        citation(label, r.span, &full)
                    })
                    .collect(),
            )
        }
        Phrase::Comments(refs) => {
            let part = initial.part.clone()?;
            Some(
                refs.into_iter()
                    .map(|r| {
                        let mut label =
                            Label::section(&part, &r.section).with_paragraphs_at(0, &r.markers);
                        label.comment = true;
                        label.comment_levels = r.levels;
                        citation(label, r.span, &full)
                    })
                    .collect(),
            )
        }
    }
}

/// Turn a section-led list into labels. Bare marker groups attach to the
/// most recent label; `through` expands to every intermediate label.
fn resolve_list(items: Vec<(Joiner, Item)>, full: &Span) -> Vec<ParagraphCitation> {
    let mut out = Vec::new();
    let mut prev: Option<Label> = None;
    for (joiner, item) in items {
        let span = item.span();
        let label = match item {
            Item::Section {
                part,
                section,
                markers,
                ..
            } => Label::section(&part, &section).with_paragraphs_at(0, &markers),
            Item::Markers(Run { markers, .. }) => match &prev {
                Some(p) => {
                    let level = continuation_level(&p.paragraphs, &markers);
                    p.with_paragraphs_at(level, &markers)
                }
                None => continue,
            },
        };
        if joiner == Joiner::Through
            && let Some(p) = &prev
        {
            for mid in expand_through(p, &label) {
                out.push(citation(mid, span.clone(), full));
            }
        }
        out.push(citation(label.clone(), span, full));
        prev = Some(label);
    }
    out
}

/// Marker groups relative to `context`: the first is placed by what the
/// context already has, later ones continue from the group before.
fn resolve_paragraphs(
    runs: Vec<(Joiner, Run)>,
    context: &Label,
    full: &Span,
) -> Vec<ParagraphCitation> {
    let mut out = Vec::new();
    let mut prev: Option<Label> = None;
    for (joiner, Run { markers, span }) in runs {
        let label = match &prev {
            None => {
                let level = first_group_level(context, &markers);
                context.with_paragraphs_at(level, &markers)
            }
            Some(p) => {
                let level = continuation_level(&p.paragraphs, &markers);
                p.with_paragraphs_at(level, &markers)
            }
        };
        if joiner == Joiner::Through
            && let Some(p) = &prev
        {
            for mid in expand_through(p, &label) {
                out.push(citation(mid, span.clone(), full));
            }
        }
        out.push(citation(label.clone(), span, full));
        prev = Some(label);
    }
    out
}

fn is_appendix_letter(w: &str) -> bool {
    !w.is_empty() && w.len() <= 2 && w.chars().all(|c| c.is_ascii_uppercase())
}

/// Paragraph levels (0 = p1) whose family contains `marker`.
fn levels_for(marker: &str) -> Vec<usize> {
    (0..PARAGRAPH_LEVELS.len())
        .filter(|&l| {
            let t = PARAGRAPH_LEVELS[l];
            !t.is_emphasized() && t.index_of(marker).is_some()
        })
        .collect()
}

/// Does `markers` fit consecutive levels starting at `level`?
fn fits_from(level: usize, markers: &[String]) -> bool {
    markers.iter().enumerate().all(|(k, m)| {
        PARAGRAPH_LEVELS
            .get(level + k)
            .is_some_and(|t| t.index_of(m).is_some())
    })
}

/// Level for the first marker group of a relative citation: the deepest
/// level that fits the group and whose parent exists in the context.
fn first_group_level(context: &Label, markers: &[String]) -> usize {
    let Some(first) = markers.first() else {
        return 0;
    };
    let depth = context.paragraphs.len();
    let fitting: Vec<usize> = levels_for(first)
        .into_iter()
        .filter(|&l| fits_from(l, markers))
        .collect();
    fitting
        .iter()
        .copied()
        .filter(|&l| l <= depth)
        .max()
        .or_else(|| fitting.first().copied())
        .unwrap_or(0)
}

/// Level for a marker group that continues a list after `prev`.
///
/// Prefers the deepest level where the group reads as a later sibling of
/// what `prev` has there (or restates it, for multi-marker groups); falls
/// back to a first child one level deeper.
fn continuation_level(prev: &[String], markers: &[String]) -> usize {
    let Some(first) = markers.first() else {
        return prev.len();
    };
    let mut best = None;
    for level in levels_for(first) {
        if !fits_from(level, markers) {
            continue;
        }
        let family: MarkerType = PARAGRAPH_LEVELS[level];
        let Some(new_idx) = family.index_of(first) else {
            continue;
        };
        match prev.get(level).and_then(|p| family.index_of(p)) {
            Some(old_idx) if new_idx > old_idx || (new_idx == old_idx && markers.len() > 1) => {
                best = Some(level);
            }
            None if level == prev.len() && new_idx == 0 => {
                best.get_or_insert(level);
            }
            _ => {}
        }
    }
    best.or_else(|| levels_for(first).into_iter().find(|&l| l <= prev.len()))
        .unwrap_or(0)
}

/// Labels strictly between `from` and `to` for a `through` range.
pub fn expand_through(from: &Label, to: &Label) -> Vec<Label> {
    let same_base = from.part == to.part
        && from.section == to.section
        && from.appendix == to.appendix
        && from.appendix_section == to.appendix_section;

    if from.paragraphs.is_empty() && to.paragraphs.is_empty() {
        // Section ranges: § 1005.7 through 1005.9.
        if from.part != to.part || from.appendix.is_some() {
            return Vec::new();
        }
        let (Some(a), Some(b)) = (
            from.section.as_deref().and_then(|s| s.parse::<u32>().ok()),
            to.section.as_deref().and_then(|s| s.parse::<u32>().ok()),
        ) else {
            return Vec::new();
        };
        return (a + 1..b).map(|n| from.with_section(&n.to_string())).collect();
    }

    let depth = from.paragraphs.len();
    if !same_base
        || depth == 0
        || depth != to.paragraphs.len()
        || from.paragraphs[..depth - 1] != to.paragraphs[..depth - 1]
    {
        return Vec::new();
    }
    let (first, last) = (&from.paragraphs[depth - 1], &to.paragraphs[depth - 1]);
    let family = std::iter::once(PARAGRAPH_LEVELS[(depth - 1).min(5)])
        .chain(PARAGRAPH_LEVELS)
        .find(|t| t.index_of(first).is_some() && t.index_of(last).is_some());
    let Some(family) = family else {
        return Vec::new();
    };
    let (Some(a), Some(b)) = (family.index_of(first), family.index_of(last)) else {
        return Vec::new();
    };
    family.sequence()[(a + 1).min(b)..b]
        .iter()
        .map(|m| from.with_paragraphs_at(depth - 1, std::slice::from_ref(m)))
        .collect()
}
