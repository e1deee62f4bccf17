//! Paragraph marker tables.
//!
//! Regulation paragraphs nest as lower alpha → digits → roman → upper alpha →
//! italic digits → italic roman. The same character can belong to several
//! families (`i`, `v`, `x` are both lower alpha and roman), which is what
//! makes depth inference interesting.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Standalone `* * *` row in Federal Register XML.
pub const STARS_TAG: &str = "STARS";
/// `* * *` trailing a paragraph's own text.
pub const INLINE_STARS: &str = "* * *";
/// Placeholder for a paragraph without a marker.
pub const MARKERLESS: &str = "MARKERLESS";

const MAX_NUMERIC: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    Lower,
    Ints,
    Roman,
    Upper,
    EmInts,
    EmRoman,
    Stars,
    Markerless,
}

/// The regtext nesting order, p1 through p6.
pub const PARAGRAPH_LEVELS: [MarkerType; 6] = [
    MarkerType::Lower,
    MarkerType::Ints,
    MarkerType::Roman,
    MarkerType::Upper,
    MarkerType::EmInts,
    MarkerType::EmRoman,
];

static LOWER: LazyLock<Vec<String>> = LazyLock::new(|| alpha_sequence('a'));
static UPPER: LazyLock<Vec<String>> = LazyLock::new(|| alpha_sequence('A'));
static INTS: LazyLock<Vec<String>> =
    LazyLock::new(|| (1..=MAX_NUMERIC).map(|i| i.to_string()).collect());
static ROMAN: LazyLock<Vec<String>> =
    LazyLock::new(|| (1..=MAX_NUMERIC).map(to_roman).collect());

/// `a..z` followed by doubled letters `aa..zz`.
fn alpha_sequence(first: char) -> Vec<String> {
    let letters: Vec<char> = (0..26u8).map(|i| (first as u8 + i) as char).collect();
    letters
        .iter()
        .map(|c| c.to_string())
        .chain(letters.iter().map(|c| format!("{c}{c}")))
        .collect()
}

impl MarkerType {
    pub fn sequence(self) -> &'static [String] {
        match self {
            MarkerType::Lower => &LOWER,
            MarkerType::Upper => &UPPER,
            MarkerType::Ints | MarkerType::EmInts => &INTS,
            MarkerType::Roman | MarkerType::EmRoman => &ROMAN,
            MarkerType::Stars | MarkerType::Markerless => &[],
        }
    }

    /// Position of `marker` within this family's sequence.
    pub fn index_of(self, marker: &str) -> Option<usize> {
        self.sequence().iter().position(|m| m == marker)
    }

    pub fn is_emphasized(self) -> bool {
        matches!(self, MarkerType::EmInts | MarkerType::EmRoman)
    }

    /// Plain (non-italic) families containing `marker`, in nesting order.
    pub fn plain_candidates(marker: &str) -> Vec<MarkerType> {
        [
            MarkerType::Lower,
            MarkerType::Ints,
            MarkerType::Roman,
            MarkerType::Upper,
        ]
        .into_iter()
        .filter(|t| t.index_of(marker).is_some())
        .collect()
    }

    /// Italic families containing `marker`.
    pub fn emphasized_candidates(marker: &str) -> Vec<MarkerType> {
        [MarkerType::EmInts, MarkerType::EmRoman]
            .into_iter()
            .filter(|t| t.index_of(marker).is_some())
            .collect()
    }

    /// Regtext paragraph level (0 for p1) at which this family sits.
    pub fn paragraph_level(self) -> Option<usize> {
        PARAGRAPH_LEVELS.iter().position(|t| *t == self)
    }
}

/// Lowercase roman numeral for `1..=3999`.
pub fn to_roman(mut n: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for (value, numeral) in TABLE {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Parse a lowercase roman numeral; `None` unless it is canonical.
pub fn from_roman(s: &str) -> Option<usize> {
    if s.is_empty() {
        return None;
    }
    let value = |c: char| match c {
        'i' => Some(1),
        'v' => Some(5),
        'x' => Some(10),
        'l' => Some(50),
        'c' => Some(100),
        'd' => Some(500),
        'm' => Some(1000),
        _ => None,
    };
    let digits: Vec<usize> = s.chars().map(value).collect::<Option<_>>()?;
    let mut total = 0usize;
    let mut prev = 0usize;
    for d in digits.iter().rev() {
        if *d < prev {
            total = total.checked_sub(*d)?;
        } else {
            total += d;
            prev = *d;
        }
    }
    (to_roman(total) == s).then_some(total)
}

/// Marker as it appears in text for a regtext paragraph: `(b)`.
pub fn paren(marker: &str) -> String {
    format!("({marker})")
}

/// Successor of `marker` within `kind`, if any.
pub fn next_marker(kind: MarkerType, marker: &str) -> Option<&'static str> {
    let idx = kind.index_of(marker)?;
    kind.sequence().get(idx + 1).map(String::as_str)
}
