//! Tokens of an amendatory instruction and the amendments they compile to.

use serde::{Deserialize, Serialize};

/// What an amendment does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Post,
    Put,
    Delete,
    Reserve,
    Move,
    Keep,
}

impl Action {
    /// Application order: removals first, then moves, then replacements,
    /// then additions.
    pub fn phase(self) -> u8 {
        match self {
            Action::Delete | Action::Reserve => 0,
            Action::Move => 1,
            Action::Put | Action::Keep => 2,
            Action::Post => 3,
        }
    }
}

/// Part of a node an amendment is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Text,
    Title,
    Heading,
}

/// A partially specified location. Unset fields are filled from the
/// surrounding context when the instruction is compiled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub part: Option<String>,
    pub subpart: Option<String>,
    pub section: Option<String>,
    pub appendix: Option<String>,
    /// Paragraph markers as written, outermost first; their depth is
    /// decided against the context.
    pub paragraphs: Vec<String>,
    /// Whether the markers continue from the first paragraph level.
    pub anchored: bool,
    pub comment: bool,
    pub comment_levels: Vec<String>,
    pub field: Option<Field>,
}

impl Target {
    pub fn section(part: Option<&str>, section: &str) -> Self {
        Self {
            part: part.map(str::to_string),
            section: Some(section.to_string()),
            anchored: true,
            ..Self::default()
        }
    }

    pub fn paragraphs(markers: &[&str]) -> Self {
        Self {
            paragraphs: markers.iter().map(|m| m.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Whether this target names nothing below the part.
    pub fn is_bare(&self) -> bool {
        self.subpart.is_none()
            && self.section.is_none()
            && self.appendix.is_none()
            && self.paragraphs.is_empty()
            && !self.comment
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Sets the location later targets inherit from. `certain` contexts
    /// (`in § 1005.7`) are never promoted to targets.
    Context { target: Target, certain: bool },
    Verb { action: Action, active: bool },
    Paragraph(Target),
    And,
    As,
    Through,
}

impl Token {
    pub fn context(target: Target) -> Self {
        Token::Context {
            target,
            certain: false,
        }
    }

    pub fn verb(action: Action, active: bool) -> Self {
        Token::Verb { action, active }
    }

    pub fn is_verb(&self) -> bool {
        matches!(self, Token::Verb { .. })
    }
}

/// One compiled instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendment {
    pub action: Action,
    pub label: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Field>,
    /// Index of the `REGTEXT` block the instruction came from; its new
    /// content lives there.
    #[serde(default)]
    pub block: usize,
}

impl Amendment {
    pub fn new(action: Action, label: Vec<String>) -> Self {
        Self {
            action,
            label,
            destination: None,
            field: None,
            block: 0,
        }
    }

    pub fn label_id(&self) -> String {
        self.label.join("-")
    }
}
