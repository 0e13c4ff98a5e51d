//! Position filter configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit for window, distance and scope measurements
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Words,
    Sentences,
    Paragraphs,
}

impl Unit {
    pub fn name(self) -> &'static str {
        match self {
            Unit::Words => "words",
            Unit::Sentences => "sentences",
            Unit::Paragraphs => "paragraphs",
        }
    }
}

/// Bounds of a distance or occurrence count
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSpec {
    Exactly(u32),
    AtLeast(u32),
    AtMost(u32),
    FromTo(u32, u32),
}

impl RangeSpec {
    pub fn lower(self) -> u32 {
        match self {
            RangeSpec::Exactly(n) | RangeSpec::AtLeast(n) | RangeSpec::FromTo(n, _) => n,
            RangeSpec::AtMost(_) => 0,
        }
    }

    pub fn upper(self) -> u32 {
        match self {
            RangeSpec::Exactly(n) | RangeSpec::AtMost(n) | RangeSpec::FromTo(_, n) => n,
            RangeSpec::AtLeast(_) => u32::MAX,
        }
    }

    pub fn contains(self, n: u32) -> bool {
        n >= self.lower() && n <= self.upper()
    }

    pub fn is_valid(self) -> bool {
        self.lower() <= self.upper()
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeSpec::Exactly(n) => write!(f, "exactly {}", n),
            RangeSpec::AtLeast(n) => write!(f, "at least {}", n),
            RangeSpec::AtMost(n) => write!(f, "at most {}", n),
            RangeSpec::FromTo(a, b) => write!(f, "from {} to {}", a, b),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Same,
    Different,
}

/// Anchor of a content filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentAnchor {
    AtStart,
    AtEnd,
    EntireContent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub size: u32,
    pub unit: Unit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Distance {
    pub range: RangeSpec,
    pub unit: Unit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub scope: Scope,
    pub unit: Unit,
}

/// Position constraints of one full-text selection
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PosFilterConfig {
    pub ordered: bool,
    pub window: Option<Window>,
    pub distance: Option<Distance>,
    pub scope: Option<ScopeFilter>,
    pub content: Option<ContentAnchor>,
}

impl PosFilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    pub fn window(mut self, size: u32, unit: Unit) -> Self {
        self.window = Some(Window { size, unit });
        self
    }

    pub fn distance(mut self, range: RangeSpec, unit: Unit) -> Self {
        self.distance = Some(Distance { range, unit });
        self
    }

    pub fn scope(mut self, scope: Scope, unit: Unit) -> Self {
        self.scope = Some(ScopeFilter { scope, unit });
        self
    }

    pub fn content(mut self, anchor: ContentAnchor) -> Self {
        self.content = Some(anchor);
        self
    }

    /// Whether any constraint needs sentence or paragraph boundaries, or the token count
    pub fn needs_text(&self) -> bool {
        let coarse = |unit: Unit| unit != Unit::Words;
        self.window.map_or(false, |w| coarse(w.unit))
            || self.distance.map_or(false, |d| coarse(d.unit))
            || self.scope.is_some()
            || self.content.is_some()
    }

    /// Whether the configuration constrains anything
    pub fn is_empty(&self) -> bool {
        !self.ordered
            && self.window.is_none()
            && self.distance.is_none()
            && self.scope.is_none()
            && self.content.is_none()
    }

    /// Structural checks performed when a selection is compiled
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(window) = self.window {
            if window.size == 0 {
                return Err("window size must be at least 1".to_string());
            }
        }
        if let Some(distance) = self.distance {
            if !distance.range.is_valid() {
                return Err(format!("empty distance range: {}", distance.range));
            }
        }
        if let Some(scope) = self.scope {
            if scope.unit == Unit::Words {
                return Err("scope must be sentence or paragraph".to_string());
            }
        }
        Ok(())
    }

    /// Short description for plan output
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.ordered {
            parts.push("ordered".to_string());
        }
        if let Some(w) = self.window {
            parts.push(format!("window {} {}", w.size, w.unit.name()));
        }
        if let Some(d) = self.distance {
            parts.push(format!("distance {} {}", d.range, d.unit.name()));
        }
        if let Some(s) = self.scope {
            let kind = match s.scope {
                Scope::Same => "same",
                Scope::Different => "different",
            };
            parts.push(format!("{} {}", kind, s.unit.name()));
        }
        if let Some(c) = self.content {
            parts.push(
                match c {
                    ContentAnchor::AtStart => "at start",
                    ContentAnchor::AtEnd => "at end",
                    ContentAnchor::EntireContent => "entire content",
                }
                .to_string(),
            );
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_spec() {
        assert!(RangeSpec::Exactly(3).contains(3));
        assert!(!RangeSpec::AtLeast(4).contains(3));
        assert!(RangeSpec::AtMost(2).contains(0));
        assert!(!RangeSpec::FromTo(5, 2).is_valid());
        assert_eq!(RangeSpec::AtLeast(1).upper(), u32::MAX);
    }

    #[test]
    fn test_validate_rejects_malformed_filters() {
        assert!(PosFilterConfig::new().window(0, Unit::Words).validate().is_err());
        assert!(PosFilterConfig::new()
            .distance(RangeSpec::FromTo(3, 1), Unit::Words)
            .validate()
            .is_err());
        assert!(PosFilterConfig::new().scope(Scope::Same, Unit::Words).validate().is_err());
        assert!(PosFilterConfig::new().ordered().window(3, Unit::Words).validate().is_ok());
    }

    #[test]
    fn test_needs_text() {
        assert!(!PosFilterConfig::new().ordered().window(2, Unit::Words).needs_text());
        assert!(PosFilterConfig::new().window(1, Unit::Sentences).needs_text());
        assert!(PosFilterConfig::new().content(ContentAnchor::AtEnd).needs_text());
    }
}
