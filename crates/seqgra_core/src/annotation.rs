//! Ground-truth position annotations.
//!
//! An annotation is a string the length of its sequence over `{_, G, C}`.

use serde::{Deserialize, Serialize};

/// Role of a single position in an annotated sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionType {
    /// `_`: no signal.
    Background,
    /// `G`: part of the grammar that determines the label.
    Grammar,
    /// `C`: confounding signal.
    Confounder,
}

impl PositionType {
    /// Parse one annotation symbol.
    pub const fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '_' => Some(Self::Background),
            'G' => Some(Self::Grammar),
            'C' => Some(Self::Confounder),
            _ => None,
        }
    }

    /// The annotation symbol for this position type.
    pub const fn symbol(&self) -> char {
        match self {
            Self::Background => '_',
            Self::Grammar => 'G',
            Self::Confounder => 'C',
        }
    }
}

/// Whether `symbol` marks a grammar position.
///
/// Anything else, including symbols outside the annotation alphabet, counts
/// as non-grammar.
#[inline]
pub fn is_grammar(symbol: char) -> bool {
    symbol == PositionType::Grammar.symbol()
}

/// First symbol of `annotation` outside `{_, G, C}`, with its 0-based position.
pub fn find_invalid_symbol(annotation: &str) -> Option<(usize, char)> {
    annotation
        .chars()
        .enumerate()
        .find(|(_, c)| PositionType::from_symbol(*c).is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols() {
        for t in [PositionType::Background, PositionType::Grammar, PositionType::Confounder] {
            assert_eq!(PositionType::from_symbol(t.symbol()), Some(t));
        }
        assert_eq!(PositionType::from_symbol('x'), None);
    }

    #[test]
    fn test_is_grammar() {
        assert!(is_grammar('G'));
        assert!(!is_grammar('_'));
        assert!(!is_grammar('C'));
        assert!(!is_grammar('g'));
    }

    #[test]
    fn test_find_invalid_symbol() {
        assert_eq!(find_invalid_symbol("__GGC_"), None);
        assert_eq!(find_invalid_symbol(""), None);
        assert_eq!(find_invalid_symbol("_GX_"), Some((2, 'X')));
    }
}
