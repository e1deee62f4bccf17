//! Effective-date delays announced by later notices.
//!
//! A delay reads like "the effective date of 12 FR 501 has been delayed
//! until March 3, 2003": an effective-date phrase, one or more FR
//! citations, a delay verb, then the new date.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::dates::parse_prose;

/// An FR citation moved to a new effective date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delay {
    pub fr_volume: u32,
    pub fr_page: u32,
    pub until: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelayToken {
    EffectiveDate,
    Notice { volume: u32, page: u32 },
    Delayed,
    Date(NaiveDate),
}

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<effective>effective\s+date)|(?P<notice>(?P<volume>\d+)\s+FR\s+(?P<page>\d+))|(?P<delayed>\bdelayed\b)|(?P<date>(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},\s*\d{4})",
    )
    .expect("static regex")
});

fn tokens(text: &str) -> Vec<DelayToken> {
    TOKEN
        .captures_iter(text)
        .filter_map(|c| {
            if c.name("effective").is_some() {
                Some(DelayToken::EffectiveDate)
            } else if c.name("notice").is_some() {
                Some(DelayToken::Notice {
                    volume: c.name("volume")?.as_str().parse().ok()?,
                    page: c.name("page")?.as_str().parse().ok()?,
                })
            } else if c.name("delayed").is_some() {
                Some(DelayToken::Delayed)
            } else {
                parse_prose(c.name("date")?.as_str()).map(DelayToken::Date)
            }
        })
        .collect()
}

/// Every delay stated in `text`.
pub fn delays_in(text: &str) -> Vec<Delay> {
    let mut out = Vec::new();
    let mut seen_effective = false;
    let mut cited: Vec<(u32, u32)> = Vec::new();
    let mut delayed = false;

    for token in tokens(text) {
        match token {
            DelayToken::EffectiveDate => {
                seen_effective = true;
                if !delayed {
                    cited.clear();
                }
            }
            DelayToken::Notice { volume, page } if seen_effective && !delayed => {
                cited.push((volume, page));
            }
            DelayToken::Delayed if !cited.is_empty() => delayed = true,
            DelayToken::Date(until) if delayed => {
                out.extend(cited.drain(..).map(|(fr_volume, fr_page)| Delay {
                    fr_volume,
                    fr_page,
                    until,
                }));
                seen_effective = false;
                delayed = false;
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_delay() {
        let delays =
            delays_in("The effective date of 12 FR 501 has been delayed until March 3, 2003.");
        assert_eq!(
            delays,
            vec![Delay {
                fr_volume: 12,
                fr_page: 501,
                until: NaiveDate::from_ymd_opt(2003, 3, 3).unwrap(),
            }]
        );
    }

    #[test]
    fn several_citations() {
        let delays = delays_in(
            "The effective dates of the rules published at 77 FR 6194 and 77 FR 50244 \
             are delayed until January 18, 2013.",
        );
        assert_eq!(delays.len(), 2);
        assert_eq!(delays[1].fr_page, 50244);
    }

    #[test]
    fn plain_effective_dates_are_not_delays() {
        assert!(delays_in("This rule is effective February 1, 2013.").is_empty());
        assert!(delays_in("See 77 FR 6194. Delayed reporting is due June 1, 2013.").is_empty());
    }
}
