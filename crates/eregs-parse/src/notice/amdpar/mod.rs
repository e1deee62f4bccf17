//! Amendatory instructions (`<AMDPAR>`) to amendments.
//!
//! The token stream from [`lexer::tokenize`] is rewritten in passes:
//! passive verbs are moved ahead of their targets, contexts that are
//! really targets are promoted, `and` is dropped, targets inherit the
//! rolling context, `through` ranges are expanded, and finally each verb
//! is paired with the targets that follow it.

pub mod lexer;
pub mod tokens;

use eregs_core::markers::MarkerType;
use eregs_core::{INTERP, SUBPART};
use tracing::{debug, warn};

pub use tokens::{Action, Amendment, Field, Target, Token};

/// Amendments described by one amendatory paragraph within `part`.
pub fn parse_amdpar(text: &str, part: &str) -> Vec<Amendment> {
    let tokens = lexer::tokenize(text);
    let tokens = switch_passive(tokens);
    let tokens = context_to_paragraph(tokens);
    let tokens = and_token_resolution(tokens);
    let initial = Target {
        part: Some(part.to_string()),
        ..Target::default()
    };
    let steps = expand_through(compress_context(tokens, initial));
    let amendments = make_amendments(steps);
    debug!(count = amendments.len(), text = %text, "parsed amendatory paragraph");
    amendments
}

// ── Token passes ──

/// Move each passive verb ahead of the targets it follows.
pub fn switch_passive(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut run_start = 0;
    for token in tokens {
        let Token::Verb {
            action,
            active: false,
        } = token
        else {
            let is_verb = token.is_verb();
            out.push(token);
            if is_verb {
                run_start = out.len();
            }
            continue;
        };
        let run = &out[run_start..];
        let at = run
            .iter()
            .position(|t| matches!(t, Token::Paragraph(_)))
            .or_else(|| {
                run.iter()
                    .rposition(|t| matches!(t, Token::Context { certain: false, .. }))
            })
            .map(|i| run_start + i)
            .unwrap_or_else(|| {
                out.iter()
                    .rposition(Token::is_verb)
                    .map_or(out.len(), |i| i + 1)
            });
        out.insert(at, Token::verb(action, true));
        run_start = out.len();
    }
    out
}

/// A loose context after a verb with no paragraph of its own is the
/// verb's target (`revise § 1005.7`, `add subpart C`).
pub fn context_to_paragraph(tokens: Vec<Token>) -> Vec<Token> {
    let mut seen_verb = false;
    let mut out = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        if token.is_verb() {
            seen_verb = true;
        }
        let promote = match token {
            Token::Context {
                certain: false,
                target,
            } if seen_verb && !target.is_bare() => !tokens[i + 1..]
                .iter()
                .find(|t| !matches!(t, Token::And | Token::As))
                .is_some_and(|t| matches!(t, Token::Paragraph(_))),
            _ => false,
        };
        match token {
            Token::Context { target, .. } if promote => {
                out.push(Token::Paragraph(target.clone()));
            }
            other => out.push(other.clone()),
        }
    }
    out
}

/// `and` carries no meaning once passives are resolved.
pub fn and_token_resolution(tokens: Vec<Token>) -> Vec<Token> {
    tokens.into_iter().filter(|t| *t != Token::And).collect()
}

// ── Context resolution ──

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Verb(Action),
    Target(Target),
    As,
    Through,
}

/// Level at which a marker chain starting with `marker` attaches below
/// the context's `base` paragraphs: the closest fit among continuing a
/// sibling sequence and opening a first child.
fn start_level(base: &[String], marker: &str) -> usize {
    let mut best: Option<(usize, usize)> = None;
    for family in MarkerType::plain_candidates(marker) {
        let (Some(level), Some(idx)) = (family.paragraph_level(), family.index_of(marker)) else {
            continue;
        };
        let cost = match base.get(level) {
            Some(existing) => match family.index_of(existing) {
                Some(prev) => idx.abs_diff(prev + 1),
                None => continue,
            },
            None if level == base.len() => idx,
            None => continue,
        };
        if best.is_none_or(|(c, l)| cost < c || (cost == c && level > l)) {
            best = Some((cost, level));
        }
    }
    best.map_or(base.len(), |(_, level)| level)
}

/// Fill what `target` leaves unset from `context`.
pub fn resolve(context: &Target, target: &Target) -> Target {
    let mut out = Target {
        part: target.part.clone().or_else(|| context.part.clone()),
        comment: target.comment || context.comment,
        comment_levels: target.comment_levels.clone(),
        field: target.field,
        anchored: true,
        ..Target::default()
    };
    let base: &[String] = if target.section.is_some() {
        out.section = target.section.clone();
        &[]
    } else if target.appendix.is_some() {
        out.appendix = target.appendix.clone();
        &[]
    } else if target.subpart.is_some() {
        out.subpart = target.subpart.clone();
        &[]
    } else {
        out.section = context.section.clone();
        out.appendix = context.appendix.clone();
        out.subpart = context.subpart.clone();
        &context.paragraphs
    };
    out.paragraphs = match target.paragraphs.first() {
        None if target.section.is_some() || target.appendix.is_some() || target.subpart.is_some() => {
            Vec::new()
        }
        None => base.to_vec(),
        Some(_) if target.anchored => target.paragraphs.clone(),
        Some(first) => {
            let level = start_level(base, first);
            let mut paragraphs = base[..level.min(base.len())].to_vec();
            paragraphs.extend(target.paragraphs.iter().cloned());
            paragraphs
        }
    };
    out
}

/// The node label a resolved target addresses.
pub fn target_label(target: &Target) -> Vec<String> {
    let mut label: Vec<String> = target.part.iter().cloned().collect();
    if let Some(section) = &target.section {
        label.push(section.clone());
    } else if let Some(appendix) = &target.appendix {
        label.push(appendix.clone());
    } else if let Some(subpart) = &target.subpart
        && !target.comment
    {
        label.push(SUBPART.to_string());
        label.push(subpart.clone());
        return label;
    }
    label.extend(target.paragraphs.iter().cloned());
    if target.comment {
        label.push(INTERP.to_string());
        label.extend(target.comment_levels.iter().cloned());
    }
    label
}

/// Resolve every target against the rolling context.
pub fn compress_context(tokens: Vec<Token>, initial: Target) -> Vec<Step> {
    let mut context = initial;
    let mut steps = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            Token::Context { target, .. } => {
                context = resolve(&context, &target);
                context.field = None;
            }
            Token::Paragraph(target) => {
                let resolved = resolve(&context, &target);
                context = resolved.clone();
                context.field = None;
                context.comment_levels.clear();
                steps.push(Step::Target(resolved));
            }
            Token::Verb { action, .. } => steps.push(Step::Verb(action)),
            Token::As => steps.push(Step::As),
            Token::Through => steps.push(Step::Through),
            Token::And => {}
        }
    }
    steps
}

/// Markers strictly between `from` and `to` in their shared family.
fn between(from: &str, to: &str) -> Vec<String> {
    MarkerType::plain_candidates(from)
        .into_iter()
        .filter_map(|t| {
            let (a, b) = (t.index_of(from)?, t.index_of(to)?);
            (a < b).then(|| t.sequence()[a + 1..b].to_vec())
        })
        .next()
        .unwrap_or_default()
}

/// `(b) through (e)` becomes `(b), (c), (d), (e)`.
pub fn expand_through(steps: Vec<Step>) -> Vec<Step> {
    let mut out: Vec<Step> = Vec::with_capacity(steps.len());
    let mut iter = steps.into_iter().peekable();
    while let Some(step) = iter.next() {
        if step != Step::Through {
            out.push(step);
            continue;
        }
        let (Some(Step::Target(from)), Some(Step::Target(to))) = (out.last(), iter.peek()) else {
            continue;
        };
        let (Some(last_from), Some(last_to)) = (from.paragraphs.last(), to.paragraphs.last()) else {
            continue;
        };
        let same_parent = from.paragraphs.len() == to.paragraphs.len()
            && from.paragraphs[..from.paragraphs.len() - 1]
                == to.paragraphs[..to.paragraphs.len() - 1];
        if !same_parent {
            continue;
        }
        let template = from.clone();
        for marker in between(last_from, last_to) {
            let mut filled = template.clone();
            if let Some(last) = filled.paragraphs.last_mut() {
                *last = marker;
            }
            out.push(Step::Target(filled));
        }
    }
    out
}

// ── Amendments ──

fn flush_moves(
    sources: &mut Vec<Vec<String>>,
    destinations: &mut Vec<Vec<String>>,
    out: &mut Vec<Amendment>,
) {
    let pairs: Vec<(Vec<String>, Vec<String>)> = if destinations.is_empty() {
        sources
            .chunks(2)
            .filter_map(|c| Some((c.first()?.clone(), c.get(1)?.clone())))
            .collect()
    } else {
        sources.iter().cloned().zip(destinations.iter().cloned()).collect()
    };
    if sources.len() != destinations.len() && !destinations.is_empty() {
        warn!(
            sources = sources.len(),
            destinations = destinations.len(),
            "redesignation lists differ in length"
        );
    }
    for (from, to) in pairs {
        let mut amendment = Amendment::new(Action::Move, from);
        amendment.destination = Some(to);
        out.push(amendment);
    }
    sources.clear();
    destinations.clear();
}

/// Pair each verb with the targets after it.
pub fn make_amendments(steps: Vec<Step>) -> Vec<Amendment> {
    let mut out = Vec::new();
    let mut action: Option<Action> = None;
    let mut sources: Vec<Vec<String>> = Vec::new();
    let mut destinations: Vec<Vec<String>> = Vec::new();
    let mut after_as = false;

    for step in steps {
        match step {
            Step::Verb(next) => {
                if action == Some(Action::Move) {
                    flush_moves(&mut sources, &mut destinations, &mut out);
                }
                action = Some(next);
                after_as = false;
            }
            Step::As => after_as = true,
            Step::Through => {}
            Step::Target(target) => {
                let label = target_label(&target);
                match action {
                    None => debug!(label = %label.join("-"), "target before any verb"),
                    Some(Action::Move) if after_as => destinations.push(label),
                    Some(Action::Move) => sources.push(label),
                    Some(action) => {
                        let mut amendment = Amendment::new(action, label);
                        amendment.field = target.field;
                        out.push(amendment);
                    }
                }
            }
        }
    }
    if action == Some(Action::Move) {
        flush_moves(&mut sources, &mut destinations, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(amendments: &[Amendment]) -> Vec<(Action, String)> {
        amendments.iter().map(|a| (a.action, a.label_id())).collect()
    }

    #[test]
    fn revise_paragraph_in_section() {
        let amendments = parse_amdpar("In § 1005.7, revise paragraph (b)(2) to read as follows:", "1005");
        assert_eq!(labels(&amendments), vec![(Action::Put, "1005-7-b-2".into())]);
    }

    #[test]
    fn passive_list() {
        let amendments = parse_amdpar(
            "Section 1005.7 is amended by revising paragraphs (b)(1), (2), and (c).",
            "1005",
        );
        assert_eq!(
            labels(&amendments),
            vec![
                (Action::Put, "1005-7-b-1".into()),
                (Action::Put, "1005-7-b-2".into()),
                (Action::Put, "1005-7-c".into()),
            ]
        );
    }

    #[test]
    fn removed_and_reserved() {
        let amendments = parse_amdpar("In § 1005.9, paragraph (c) is removed and reserved.", "1005");
        assert_eq!(labels(&amendments), vec![(Action::Reserve, "1005-9-c".into())]);
    }

    #[test]
    fn mixed_passives() {
        let amendments = parse_amdpar(
            "In § 1005.9, paragraph (b) is revised and paragraph (d) is added.",
            "1005",
        );
        assert_eq!(
            labels(&amendments),
            vec![(Action::Put, "1005-9-b".into()), (Action::Post, "1005-9-d".into())]
        );
    }

    #[test]
    fn whole_section_and_subpart() {
        let amendments = parse_amdpar("Revise § 1005.3 and add subpart C.", "1005");
        assert_eq!(
            labels(&amendments),
            vec![
                (Action::Put, "1005-3".into()),
                (Action::Post, "1005-Subpart-C".into()),
            ]
        );
    }

    #[test]
    fn through_ranges() {
        let amendments = parse_amdpar("In § 1005.4, remove paragraphs (b) through (e).", "1005");
        assert_eq!(
            labels(&amendments).into_iter().map(|(_, l)| l).collect::<Vec<_>>(),
            vec!["1005-4-b", "1005-4-c", "1005-4-d", "1005-4-e"]
        );
    }

    #[test]
    fn redesignation() {
        let amendments = parse_amdpar(
            "In § 1005.2, redesignate paragraphs (b) and (c) as paragraphs (c) and (d).",
            "1005",
        );
        let moves: Vec<(String, String)> = amendments
            .iter()
            .map(|a| (a.label_id(), a.destination.clone().unwrap_or_default().join("-")))
            .collect();
        assert_eq!(
            moves,
            vec![
                ("1005-2-b".to_string(), "1005-2-c".to_string()),
                ("1005-2-c".to_string(), "1005-2-d".to_string()),
            ]
        );
    }

    #[test]
    fn heading_field() {
        let amendments = parse_amdpar("Revise the heading of § 1005.3.", "1005");
        assert_eq!(amendments[0].label_id(), "1005-3");
        assert_eq!(amendments[0].field, Some(Field::Heading));
    }

    #[test]
    fn roman_after_ints_is_a_child() {
        let context = Target {
            part: Some("1005".into()),
            section: Some("7".into()),
            paragraphs: vec!["b".into(), "1".into()],
            ..Target::default()
        };
        let resolved = resolve(&context, &Target::paragraphs(&["i"]));
        assert_eq!(target_label(&resolved).join("-"), "1005-7-b-1-i");
        let sibling = resolve(&context, &Target::paragraphs(&["c"]));
        assert_eq!(target_label(&sibling).join("-"), "1005-7-c");
    }

    #[test]
    fn comments_in_supplement() {
        let amendments = parse_amdpar(
            "In Supplement I to part 1005, under Section 7(b), revise comment 7(b)-1.",
            "1005",
        );
        assert_eq!(labels(&amendments), vec![(Action::Put, "1005-7-b-Interp-1".into())]);
    }
}
