//! Word-level edit scripts.
//!
//! Text is split into words, whitespace runs and `![alt](GID)` graphics
//! markers, and a Myers diff of those tokens decides what was kept. The
//! common prefix and suffix are trimmed before the search, which runs in
//! linear space. Edits are reported as character offsets into the old text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use similar::DiffTag;
use similar::algorithms::{Capture, myers};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)|\s+|\S+").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    /// Insert text at an old-text character position.
    Insert(usize, String),
    /// Delete old-text characters `start..end`.
    Delete(usize, usize),
}

fn tokens(text: &str) -> Vec<&str> {
    TOKEN.find_iter(text).map(|m| m.as_str()).collect()
}

#[derive(Default)]
struct Pending {
    start: Option<usize>,
    end: usize,
    inserted: String,
}

impl Pending {
    fn flush(&mut self, out: &mut Vec<Opcode>) {
        if let Some(start) = self.start.take() {
            if self.end > start {
                out.push(Opcode::Delete(start, self.end));
            }
            if !self.inserted.is_empty() {
                out.push(Opcode::Insert(start, std::mem::take(&mut self.inserted)));
            }
        }
        self.inserted.clear();
    }
}

/// Inserts and deletes turning `old` into `new`. A replacement is a
/// delete followed by an insert at the same position.
pub fn opcodes(old: &str, new: &str) -> Vec<Opcode> {
    let a = tokens(old);
    let b = tokens(new);

    let mut capture = Capture::new();
    let Ok(()) = myers::diff(&mut capture, &a, 0..a.len(), &b, 0..b.len());

    // Character offset of every old token, plus the end of the text.
    let mut at = Vec::with_capacity(a.len() + 1);
    let mut pos = 0;
    for token in &a {
        at.push(pos);
        pos += token.chars().count();
    }
    at.push(pos);

    let mut out = Vec::new();
    let mut pending = Pending::default();
    for op in capture.into_ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            pending.flush(&mut out);
            continue;
        }
        if pending.start.is_none() {
            pending.start = Some(at[old_range.start]);
            pending.end = at[old_range.start];
        }
        pending.end = pending.end.max(at[old_range.end]);
        for token in &b[new_range] {
            pending.inserted.push_str(token);
        }
    }
    pending.flush(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn apply(old: &str, ops: &[Opcode]) -> String {
        let chars: Vec<char> = old.chars().collect();
        let mut out = String::new();
        let mut cursor = 0;
        for op in ops {
            match op {
                Opcode::Delete(start, end) => {
                    out.extend(&chars[cursor..*start]);
                    cursor = *end;
                }
                Opcode::Insert(at, text) => {
                    if *at >= cursor {
                        out.extend(&chars[cursor..*at]);
                        cursor = *at;
                    }
                    out.push_str(text);
                }
            }
        }
        out.extend(&chars[cursor..]);
        out
    }

    #[test]
    fn replaced_word() {
        let ops = opcodes("The quick fox", "The slow fox");
        assert_eq!(
            ops,
            vec![Opcode::Delete(4, 9), Opcode::Insert(4, "slow".into())]
        );
    }

    #[test]
    fn appended_and_removed() {
        assert_eq!(
            opcodes("one two", "one two three"),
            vec![Opcode::Insert(7, " three".into())]
        );
        assert_eq!(opcodes("one two three", "one three"), vec![Opcode::Delete(4, 8)]);
        assert!(opcodes("same", "same").is_empty());
    }

    #[test]
    fn graphics_are_single_tokens() {
        let ops = opcodes("See ![chart](ER01) here", "See ![chart](ER02) here");
        assert_eq!(
            ops,
            vec![
                Opcode::Delete(4, 18),
                Opcode::Insert(4, "![chart](ER02)".into())
            ]
        );
    }

    #[test]
    fn offsets_count_characters() {
        let ops = opcodes("§ 1 é x", "§ 1 é y");
        assert_eq!(ops, vec![Opcode::Delete(6, 7), Opcode::Insert(6, "y".into())]);
    }

    #[test]
    fn long_paragraphs_diff_in_linear_space() {
        let words: Vec<String> = (0..8_000).map(|i| format!("w{i}")).collect();
        let old = words.join(" ");
        let mut changed = words.clone();
        changed[4_000] = "changed".to_string();
        let new = changed.join(" ");

        let start: usize = words[..4_000].iter().map(|w| w.len() + 1).sum();
        let ops = opcodes(&old, &new);
        assert_eq!(
            ops,
            vec![
                Opcode::Delete(start, start + "w4000".len()),
                Opcode::Insert(start, "changed".into()),
            ]
        );
        assert_eq!(apply(&old, &ops), new);
    }

    proptest! {
        #[test]
        fn edits_rebuild_new_text(old in "[ab é]{0,24}", new in "[ab é]{0,24}") {
            let ops = opcodes(&old, &new);
            prop_assert_eq!(apply(&old, &ops), new);
        }
    }
}
