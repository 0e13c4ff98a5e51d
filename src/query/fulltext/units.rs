//! Sentence and paragraph boundaries over tokenized text

use crate::query::fulltext::options::Unit;
use crate::tokenizer::Tokenizer;

/// Per-token sentence and paragraph numbers of one text
///
/// A sentence ends at `.`, `!` or `?` between two words; a paragraph ends at
/// a line break, which also ends the sentence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextUnits {
    sentence: Vec<u32>,
    paragraph: Vec<u32>,
}

impl TextUnits {
    pub fn new(text: &str, tokenizer: &Tokenizer) -> Self {
        let words = tokenizer.words(text);
        let mut sentence = Vec::with_capacity(words.len());
        let mut paragraph = Vec::with_capacity(words.len());
        let (mut s, mut p) = (0u32, 0u32);
        let mut prev_end: Option<usize> = None;

        for (offset, word) in words {
            if let Some(end) = prev_end {
                let gap = &text[end..offset];
                if gap.contains('\n') {
                    p += 1;
                    s += 1;
                } else if gap.contains(['.', '!', '?']) {
                    s += 1;
                }
            }
            sentence.push(s);
            paragraph.push(p);
            prev_end = Some(offset + word.len());
        }

        Self { sentence, paragraph }
    }

    /// Number of tokens
    pub fn len(&self) -> u32 {
        self.sentence.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.sentence.is_empty()
    }

    fn table(&self, unit: Unit) -> Option<&[u32]> {
        match unit {
            Unit::Words => None,
            Unit::Sentences => Some(&self.sentence),
            Unit::Paragraphs => Some(&self.paragraph),
        }
    }

    /// Number of the unit containing a token
    pub fn unit_index(&self, pos: u32, unit: Unit) -> u32 {
        match self.table(unit) {
            None => pos,
            Some(table) => table.get(pos as usize).copied().unwrap_or_else(|| {
                table.last().copied().unwrap_or(0)
            }),
        }
    }

    /// First token position after the `n` units starting at the unit of `pos`
    pub fn advance(&self, pos: u32, unit: Unit, n: u32) -> u32 {
        match self.table(unit) {
            None => pos.saturating_add(n),
            Some(table) => {
                let target = self.unit_index(pos, unit).saturating_add(n);
                table.partition_point(|&u| u < target) as u32
            }
        }
    }

    /// Units strictly between the unit of `from` and the unit of `to`
    pub fn distance(&self, from: u32, to: u32, unit: Unit) -> u32 {
        self.unit_index(from, unit)
            .abs_diff(self.unit_index(to, unit))
            .saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerConfig;

    fn units(text: &str) -> TextUnits {
        TextUnits::new(text, &Tokenizer::new(&TokenizerConfig::default()))
    }

    #[test]
    fn test_sentence_and_paragraph_numbers() {
        let u = units("One two. Three four!\nFive six");
        assert_eq!(u.len(), 6);
        assert_eq!(u.unit_index(1, Unit::Sentences), 0);
        assert_eq!(u.unit_index(2, Unit::Sentences), 1);
        assert_eq!(u.unit_index(4, Unit::Sentences), 2);
        assert_eq!(u.unit_index(3, Unit::Paragraphs), 0);
        assert_eq!(u.unit_index(4, Unit::Paragraphs), 1);
    }

    #[test]
    fn test_advance() {
        let u = units("a b. c d. e f");
        assert_eq!(u.advance(0, Unit::Words, 3), 3);
        assert_eq!(u.advance(1, Unit::Sentences, 1), 2);
        assert_eq!(u.advance(0, Unit::Sentences, 2), 4);
        assert_eq!(u.advance(4, Unit::Sentences, 5), 6);
    }

    #[test]
    fn test_distance() {
        let u = units("a b. c d. e f");
        assert_eq!(u.distance(0, 1, Unit::Words), 0);
        assert_eq!(u.distance(0, 3, Unit::Words), 2);
        assert_eq!(u.distance(0, 1, Unit::Sentences), 0);
        assert_eq!(u.distance(0, 5, Unit::Sentences), 1);
    }
}
