//! Sort key normalisation for regulation label segments.
//!
//! Converts label segments (`"b"`, `"12"`, `"iv"`, `"30(a)"`, `"p3"`) into
//! lexicographically-sortable strings so siblings can be ordered without
//! knowing how the document laid them out.
//!
//! # Segment conventions
//!
//! - Digits: numeric order, `2` before `10`
//! - Lower/upper alpha: position in the marker sequence (`z` < `aa`)
//! - Roman: position in the roman sequence (`iv` < `v` < `x`)
//! - Appendix paragraphs of the form `30(a)`: `(30, a)`
//! - Synthetic `pN` / `hN`: by `N`, after everything else
//!
//! Lower alpha and roman overlap (`i`, `v`, `x`); the caller passes the
//! family its siblings use.

use std::cmp::Ordering;

use crate::markers::{MarkerType, from_roman};
use crate::node::{INTERP, SUBPART, is_synthetic};

/// Family of a set of sibling segments, as far as ordering is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentFamily {
    Alpha,
    Roman,
}

/// Normalise a label segment into a lexicographically-sortable string.
///
/// Output has three dot-separated groups: a class rank, a zero-padded
/// primary number, and a zero-padded secondary number.
///
/// | Input  | Output              |
/// |--------|---------------------|
/// | `"2"`  | `"1.00002.00000"`   |
/// | `"b"`  | `"1.00002.00000"`   |
/// | `"iv"` | `"1.00004.00000"` (roman family) |
/// | `"30(a)"` | `"1.00030.00001"` |
/// | `"p3"` | `"3.00003.00000"`   |
pub fn normalize_segment(segment: &str, family: SegmentFamily) -> String {
    let s = segment.trim();
    if s.is_empty() {
        return "0.00000.00000".to_string();
    }
    if s == SUBPART || s == INTERP {
        return "4.00000.00000".to_string();
    }
    if is_synthetic(s) {
        let n: u32 = s[1..].parse().unwrap_or(0);
        return format!("3.{n:05}.00000");
    }

    // Leading digits with an optional parenthesised suffix: "12", "30(a)".
    let digit_end = s
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(s.len());
    if digit_end > 0 {
        let base: u32 = s[..digit_end].parse().unwrap_or(0);
        let rest = s[digit_end..].trim_start_matches('(').trim_end_matches(')');
        let secondary = if rest.is_empty() {
            0
        } else {
            alpha_rank(rest).unwrap_or(0) + 1
        };
        return format!("1.{base:05}.{secondary:05}");
    }

    if family == SegmentFamily::Roman
        && let Some(n) = from_roman(s)
    {
        return format!("1.{n:05}.00000");
    }

    if let Some(rank) = alpha_rank(s) {
        return format!("1.{:05}.00000", rank + 1);
    }

    format!("2.00000.{}", s)
}

fn alpha_rank(s: &str) -> Option<u32> {
    let lower = s.to_ascii_lowercase();
    MarkerType::Lower.index_of(&lower).map(|i| i as u32)
}

/// Pick the family a set of sibling segments uses.
///
/// Roman wins only when every alphabetic sibling parses as roman and at
/// least one of them is not also a single lower-alpha letter (`ii`, `iv`).
pub fn sibling_family<'a>(segments: impl IntoIterator<Item = &'a str>) -> SegmentFamily {
    let mut saw_multi_char_roman = false;
    for seg in segments {
        if !seg.chars().all(|c| c.is_ascii_lowercase()) || is_synthetic(seg) {
            continue;
        }
        if from_roman(seg).is_none() {
            return SegmentFamily::Alpha;
        }
        if MarkerType::Lower.index_of(seg).is_none() {
            saw_multi_char_roman = true;
        }
    }
    if saw_multi_char_roman {
        SegmentFamily::Roman
    } else {
        SegmentFamily::Alpha
    }
}

/// Compare two sibling segments within a family.
pub fn compare_segments(a: &str, b: &str, family: SegmentFamily) -> Ordering {
    normalize_segment(a, family).cmp(&normalize_segment(b, family))
}
