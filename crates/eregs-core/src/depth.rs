//! Paragraph depth inference.
//!
//! Given the markers of a section in document order, find every assignment
//! of (marker family, depth) consistent with how regulations nest, then
//! score the survivors. The problem is small (a section rarely has more
//! than a few dozen markers), so a plain backtracking search suffices.
//!
//! Rules enforced during the search:
//!
//! - the first marker sits at depth 0;
//! - a marker at an existing depth continues that level's family with the
//!   next index (or any later index once stars have been seen there);
//! - a marker one level deeper starts a new family at its first index, and
//!   that family may not already appear among its ancestors;
//! - standalone stars stand for at least one omitted sibling, inline stars
//!   for zero or more;
//! - unmarked paragraphs nest like a family of their own.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::markers::{INLINE_STARS, MARKERLESS, MarkerType, STARS_TAG};

/// Stop collecting after this many complete solutions.
const MAX_SOLUTIONS: usize = 2_000;

const SINGLE_CHILD_PENALTY: u32 = 10;
const SPREAD_TYPE_PENALTY: u32 = 5;

/// One input to the solver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerToken {
    /// `(a)`, `(1)`, `(iv)`, `(B)` with the punctuation removed.
    Plain(String),
    /// Italic marker, `<E T="03">1</E>`.
    Emphasized(String),
    /// Standalone `* * *` row.
    Stars,
    /// `* * *` at the end of a paragraph's own text.
    InlineStars,
    Markerless,
}

impl MarkerToken {
    /// Interpret a raw marker string, recognising the stars and markerless
    /// sentinels and `<E T="03">…</E>` emphasis.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            STARS_TAG => MarkerToken::Stars,
            INLINE_STARS => MarkerToken::InlineStars,
            MARKERLESS | "" => MarkerToken::Markerless,
            _ => {
                if let Some(inner) = raw
                    .strip_prefix("<E T=\"03\">")
                    .and_then(|s| s.strip_suffix("</E>"))
                {
                    MarkerToken::Emphasized(inner.to_string())
                } else {
                    MarkerToken::Plain(raw.to_string())
                }
            }
        }
    }

    pub fn is_stars(&self) -> bool {
        matches!(self, MarkerToken::Stars | MarkerToken::InlineStars)
    }

    /// Marker text used for labels; empty for stars and markerless.
    pub fn text(&self) -> &str {
        match self {
            MarkerToken::Plain(s) | MarkerToken::Emphasized(s) => s,
            _ => "",
        }
    }

    fn candidates(&self) -> Vec<(MarkerType, usize)> {
        let types = match self {
            MarkerToken::Plain(m) => MarkerType::plain_candidates(m),
            MarkerToken::Emphasized(m) => MarkerType::emphasized_candidates(m),
            _ => return Vec::new(),
        };
        types
            .into_iter()
            .filter_map(|t| t.index_of(self.text()).map(|i| (t, i)))
            .collect()
    }
}

/// Depth and family chosen for one marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParAssignment {
    pub typ: MarkerType,
    pub marker: String,
    pub depth: usize,
}

/// A complete assignment for the whole marker sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub assignment: Vec<ParAssignment>,
    pub penalty: u32,
}

impl Solution {
    pub fn depths(&self) -> Vec<usize> {
        self.assignment.iter().map(|a| a.depth).collect()
    }
}

/// State of one open nesting level during the search.
#[derive(Debug, Clone)]
struct Level {
    /// `None` until a real marker (not stars) is seen at this level.
    kind: Option<MarkerType>,
    /// Smallest index the next sibling may take.
    next_min: usize,
    /// Whether the next sibling must take exactly `next_min`.
    exact: bool,
}

impl Level {
    fn marker(kind: MarkerType, idx: usize) -> Self {
        Self {
            kind: Some(kind),
            next_min: idx + 1,
            exact: true,
        }
    }

    fn admits(&self, kind: MarkerType, idx: usize) -> bool {
        match self.kind {
            Some(k) if k != kind => false,
            _ if self.exact => idx == self.next_min,
            _ => idx >= self.next_min,
        }
    }
}

struct Search<'a> {
    tokens: &'a [MarkerToken],
    solutions: Vec<Vec<ParAssignment>>,
}

impl Search<'_> {
    fn run(&mut self, pos: usize, path: &mut Vec<Level>, acc: &mut Vec<ParAssignment>) {
        if self.solutions.len() >= MAX_SOLUTIONS {
            return;
        }
        let Some(token) = self.tokens.get(pos) else {
            self.solutions.push(acc.clone());
            return;
        };

        for (depth, level) in self.options(token, path, pos == 0) {
            let saved: Vec<Level> = path.drain(depth..).collect();
            path.push(level.clone());
            acc.push(ParAssignment {
                typ: assignment_type(token, &level),
                marker: token.text().to_string(),
                depth,
            });

            self.run(pos + 1, path, acc);

            acc.pop();
            path.pop();
            path.extend(saved);
        }
    }

    /// Every (depth, new level state) the token may take given the open path.
    fn options(&self, token: &MarkerToken, path: &[Level], first: bool) -> Vec<(usize, Level)> {
        let mut out = Vec::new();
        let child_depth = path.len();

        match token {
            MarkerToken::Stars | MarkerToken::InlineStars => {
                let occupies = usize::from(matches!(token, MarkerToken::Stars));
                for (depth, level) in path.iter().enumerate() {
                    out.push((
                        depth,
                        Level {
                            kind: level.kind,
                            next_min: level.next_min + occupies,
                            exact: false,
                        },
                    ));
                }
                out.push((
                    child_depth,
                    Level {
                        kind: None,
                        next_min: occupies,
                        exact: false,
                    },
                ));
            }
            MarkerToken::Markerless => {
                for (depth, level) in path.iter().enumerate() {
                    if level.kind == Some(MarkerType::Markerless) {
                        out.push((depth, Level::marker(MarkerType::Markerless, 0)));
                    }
                }
                out.push((child_depth, Level::marker(MarkerType::Markerless, 0)));
            }
            MarkerToken::Plain(_) | MarkerToken::Emphasized(_) => {
                for (kind, idx) in token.candidates() {
                    for (depth, level) in path.iter().enumerate() {
                        let ancestors = &path[..depth];
                        if level.kind.is_none() && ancestors.iter().any(|l| l.kind == Some(kind)) {
                            continue;
                        }
                        if level.admits(kind, idx) {
                            out.push((depth, Level::marker(kind, idx)));
                        }
                    }
                    let fresh_level = idx == 0 || first;
                    if fresh_level && !path.iter().any(|l| l.kind == Some(kind)) {
                        out.push((child_depth, Level::marker(kind, idx)));
                    }
                }
            }
        }
        if first {
            out.retain(|(depth, _)| *depth == 0);
        }
        out
    }
}

fn assignment_type(token: &MarkerToken, level: &Level) -> MarkerType {
    match token {
        MarkerToken::Stars | MarkerToken::InlineStars => MarkerType::Stars,
        MarkerToken::Markerless => MarkerType::Markerless,
        _ => level.kind.unwrap_or(MarkerType::Markerless),
    }
}

/// Every assignment satisfying the nesting rules, unscored and in search order.
pub fn derive_depths(tokens: &[MarkerToken]) -> Vec<Solution> {
    if tokens.is_empty() {
        return vec![Solution {
            assignment: Vec::new(),
            penalty: 0,
        }];
    }
    let mut search = Search {
        tokens,
        solutions: Vec::new(),
    };
    search.run(0, &mut Vec::new(), &mut Vec::new());
    search
        .solutions
        .into_iter()
        .map(|assignment| {
            let penalty = penalty(&assignment);
            Solution {
                assignment,
                penalty,
            }
        })
        .collect()
}

/// Heuristic penalty; lower is better.
///
/// A parent with exactly one child usually means a marker was pushed a level
/// too deep (`h` → `i` as roman under `h`). One family spread over several
/// depths is likewise suspicious.
pub fn penalty(assignment: &[ParAssignment]) -> u32 {
    let mut total = 0;
    for (i, parent) in assignment.iter().enumerate() {
        if parent.typ == MarkerType::Stars {
            continue;
        }
        let children = assignment[i + 1..]
            .iter()
            .take_while(|a| a.depth > parent.depth)
            .filter(|a| a.depth == parent.depth + 1 && a.typ != MarkerType::Stars)
            .count();
        if children == 1 {
            total += SINGLE_CHILD_PENALTY;
        }
    }

    let mut seen: Vec<(MarkerType, usize)> = Vec::new();
    for a in assignment {
        if matches!(a.typ, MarkerType::Stars | MarkerType::Markerless) {
            continue;
        }
        if !seen.contains(&(a.typ, a.depth)) {
            if seen.iter().any(|(t, _)| *t == a.typ) {
                total += SPREAD_TYPE_PENALTY;
            }
            seen.push((a.typ, a.depth));
        }
    }
    total
}

/// Keep only the minimum-penalty solutions, preserving search order.
pub fn best_solutions(solutions: Vec<Solution>) -> Vec<Solution> {
    let Some(min) = solutions.iter().map(|s| s.penalty).min() else {
        return Vec::new();
    };
    solutions.into_iter().filter(|s| s.penalty == min).collect()
}

/// Solve and pick: the first minimum-penalty solution. Logs when the
/// heuristics could not decide.
pub fn solve(tokens: &[MarkerToken]) -> Option<Solution> {
    let best = best_solutions(derive_depths(tokens));
    if best.len() > 1 {
        warn!(
            solutions = best.len(),
            markers = ?tokens.iter().map(MarkerToken::text).collect::<Vec<_>>(),
            "ambiguous paragraph markers, using first solution"
        );
    }
    best.into_iter().next()
}
