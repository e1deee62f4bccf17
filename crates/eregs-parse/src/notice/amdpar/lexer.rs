//! Scanner for amendatory instructions.
//!
//! Every lexicon pattern is matched over the whole sentence; overlapping
//! hits are resolved leftmost-longest and everything between hits is
//! ignored prose.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::tokens::{Action, Field, Target, Token};

const MARKERS: &str = r"((?:\([A-Za-z0-9]{1,5}\))*)";
const PREP: &str = r"(?:\b(in|to|under|of|for)\s+)?";

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([A-Za-z0-9]{1,5})\)").expect("static regex"));

type Build = fn(&Captures<'_>) -> Token;

struct Rule {
    regex: Regex,
    build: Build,
}

fn rule(pattern: &str, build: Build) -> Rule {
    Rule {
        regex: Regex::new(&format!("(?i){pattern}")).expect("static regex"),
        build,
    }
}

fn markers(caps: &Captures<'_>, group: usize) -> Vec<String> {
    caps.get(group)
        .map(|m| {
            MARKER
                .captures_iter(m.as_str())
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn field(raw: Option<regex::Match<'_>>) -> Option<Field> {
    let raw = raw?.as_str().to_lowercase();
    if raw.contains("introductory") {
        Some(Field::Text)
    } else {
        Some(Field::Heading)
    }
}

fn certain(caps: &Captures<'_>, group: usize) -> bool {
    caps.get(group).is_some()
}

fn section_token(caps: &Captures<'_>, prep: Option<usize>, first: usize) -> Token {
    let mut target = Target::section(Some(&caps[first]), &caps[first + 1]);
    target.paragraphs = markers(caps, first + 2);
    target.field = field(caps.get(first + 3));
    let is_certain = prep.is_some_and(|g| certain(caps, g));
    if is_certain || (target.paragraphs.is_empty() && target.field.is_none()) {
        Token::Context {
            target,
            certain: is_certain,
        }
    } else {
        Token::Paragraph(target)
    }
}

fn verb(caps: &Captures<'_>) -> Token {
    let word = caps[2].to_lowercase();
    let action = match word.get(..3).unwrap_or_default() {
        "rev" | "cor" => Action::Put,
        "add" | "ins" => Action::Post,
        "rem" | "del" => Action::Delete,
        "red" => Action::Move,
        "res" => Action::Reserve,
        _ => Action::Keep,
    };
    Token::verb(action, caps.get(1).is_none())
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(r"\bsupplement\s+i\s+to\s+part\s+(\d+)", |c| {
            Token::Context {
                target: Target {
                    part: Some(c[1].to_string()),
                    comment: true,
                    ..Target::default()
                },
                certain: true,
            }
        }),
        rule(
            &format!(r"\bcomments?\s+(\d+[a-z]?){MARKERS}-(\d+)(?:\.([ivxl]+))?"),
            |c| {
                let mut target = Target::section(None, &c[1]);
                target.paragraphs = markers(c, 2);
                target.comment = true;
                target.comment_levels.push(c[3].to_string());
                if let Some(sub) = c.get(4) {
                    target.comment_levels.push(sub.as_str().to_string());
                }
                Token::Paragraph(target)
            },
        ),
        rule(
            r"\b(?:under\s+)?(?:paragraph|section)\s+(\d+[a-z]?)((?:\([A-Za-z0-9]{1,5}\))+)",
            |c| {
                let mut target = Target::section(None, &c[1]);
                target.paragraphs = markers(c, 2);
                target.comment = true;
                Token::Context {
                    target,
                    certain: true,
                }
            },
        ),
        rule(
            &format!(
                r"{PREP}(?:the\s+)?(?:(heading|introductory\s+text)\s+(?:of|for|to)\s+)?(?:§§?|sections?\b)\s*(\d+)\.(\d+[a-z]?){MARKERS}(?:\s+(introductory\s+text|heading|subject\s+heading))?"
            ),
            |c| {
                let mut token = section_token(c, Some(1), 3);
                if let Token::Paragraph(target) | Token::Context { target, .. } = &mut token
                    && target.field.is_none()
                {
                    target.field = field(c.get(2));
                }
                match token {
                    Token::Context { target, certain } if target.field.is_some() && !certain => {
                        Token::Paragraph(target)
                    }
                    other => other,
                }
            },
        ),
        rule(
            &format!(r"\b(\d+)\.(\d+[a-z]?){MARKERS}(?:\s+(introductory\s+text|heading))?"),
            |c| section_token(c, None, 1),
        ),
        rule(
            r"(?:\bparagraphs?\s+)?((?:\([A-Za-z0-9]{1,5}\))+)(?:\s+(introductory\s+text|heading|subject\s+heading))?(?:\s+of\s+(?:this\s+section|§\s*(\d+)\.(\d+[a-z]?)))?",
            |c| {
                let mut target = match (c.get(3), c.get(4)) {
                    (Some(part), Some(section)) => {
                        Target::section(Some(part.as_str()), section.as_str())
                    }
                    _ => Target::default(),
                };
                target.paragraphs = markers(c, 1);
                target.field = field(c.get(2));
                Token::Paragraph(target)
            },
        ),
        rule(&format!(r"\b{PREP}subpart\s+([A-Z])\b"), |c| Token::Context {
            target: Target {
                subpart: Some(c[2].to_uppercase()),
                ..Target::default()
            },
            certain: certain(c, 1),
        }),
        rule(
            &format!(r"\b{PREP}appendix\s+([A-Z]{{1,2}})\b(?:\s+to\s+part\s+(\d+))?"),
            |c| Token::Context {
                target: Target {
                    part: c.get(3).map(|m| m.as_str().to_string()),
                    appendix: Some(c[2].to_uppercase()),
                    anchored: true,
                    ..Target::default()
                },
                certain: certain(c, 1),
            },
        ),
        rule(&format!(r"\b{PREP}part\s+(\d+)\b"), |c| Token::Context {
            target: Target {
                part: Some(c[2].to_string()),
                ..Target::default()
            },
            certain: certain(c, 1),
        }),
        rule(
            r"\b(?:(is|are|was|were|be|been)\s+(?:hereby\s+)?)?(revise[sd]?|revising|correct(?:s|ed|ing)?|add(?:s|ed|ing)?|insert(?:s|ed|ing)?|remove[sd]?|removing|delete[sd]?|deleting|redesignate[sd]?|redesignating|reserve[sd]?|reserving|republish(?:es|ed|ing)?)\b",
            verb,
        ),
        rule(r"\band\b", |_| Token::And),
        rule(r"\bas\b", |_| Token::As),
        rule(r"\bthrough\b", |_| Token::Through),
    ]
});

/// Tokens of one amendatory paragraph, in reading order.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut hits: Vec<(usize, usize, Token, bool)> = Vec::new();
    for rule in RULES.iter() {
        for caps in rule.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.is_empty() {
                continue;
            }
            let past = whole.as_str().to_lowercase().ends_with("ed");
            hits.push((whole.start(), whole.end(), (rule.build)(&caps), past));
        }
    }
    hits.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut tokens: Vec<(Token, bool)> = Vec::new();
    let mut end = 0;
    for (start, stop, token, past) in hits {
        if start < end {
            continue;
        }
        end = stop;
        tokens.push((token, past));
    }
    propagate_passive(tokens)
}

/// `is removed and reserved`: a bare participle joined by `and` to a
/// passive verb is passive too.
fn propagate_passive(tokens: Vec<(Token, bool)>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for (token, past) in tokens {
        let token = match token {
            Token::Verb { action, active: true }
                if past
                    && matches!(out.last(), Some(Token::And))
                    && matches!(out.iter().rev().nth(1), Some(Token::Verb { active: false, .. })) =>
            {
                Token::verb(action, false)
            }
            other => other,
        };
        out.push(token);
    }
    out
}
