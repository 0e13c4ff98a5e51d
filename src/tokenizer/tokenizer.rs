use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{FtOptions, StopWords, TokenizerConfig};

/// Word splitter and token normalizer shared by full-text evaluation and indexing
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Stemmer,
    stopwords: HashSet<String>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("config", &self.config)
            .field("stopwords", &self.stopwords.len())
            .finish()
    }
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let (algorithm, language) = match config.language.to_lowercase().as_str() {
            "german" => (Algorithm::German, LANGUAGE::German),
            "french" => (Algorithm::French, LANGUAGE::French),
            "spanish" => (Algorithm::Spanish, LANGUAGE::Spanish),
            "italian" => (Algorithm::Italian, LANGUAGE::Italian),
            "dutch" => (Algorithm::Dutch, LANGUAGE::Dutch),
            _ => (Algorithm::English, LANGUAGE::English),
        };

        let stopwords = get(language)
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();

        Self {
            config: config.clone(),
            stemmer: Stemmer::create(algorithm),
            stopwords,
        }
    }

    /// Split text into words, returning each word with its byte offset
    ///
    /// The index of a word in the returned vector is its token position.
    pub fn words<'t>(&self, text: &'t str) -> Vec<(usize, &'t str)> {
        text.unicode_word_indices().collect()
    }

    /// Split query text into words
    ///
    /// With wildcards enabled, whitespace-separated chunks carrying wildcard
    /// syntax stay whole so the pattern survives word segmentation.
    pub fn query_words(&self, text: &str, opts: &FtOptions) -> Vec<String> {
        if !opts.wildcards {
            return self.words(text).into_iter().map(|(_, w)| w.to_string()).collect();
        }
        let mut out = Vec::new();
        for chunk in text.split_whitespace() {
            if has_wildcards(chunk) {
                out.push(chunk.to_string());
            } else {
                out.extend(self.words(chunk).into_iter().map(|(_, w)| w.to_string()));
            }
        }
        out
    }

    /// Normalize a word according to clause options
    pub fn normalize(&self, word: &str, opts: &FtOptions) -> String {
        let mut token: String = word.chars().take(self.config.max_token_length).collect();

        if !opts.case_sensitive {
            token = token.to_lowercase();
        }
        if !opts.diacritics_sensitive {
            token = token.chars().map(fold_diacritic).collect();
        }
        if opts.stemming {
            token = self.stemmer.stem(&token).to_string();
        }

        token
    }

    /// Normalize a wildcard pattern; patterns are never stemmed
    pub fn normalize_pattern(&self, pattern: &str, opts: &FtOptions) -> String {
        let mut token = pattern.to_string();
        if !opts.case_sensitive {
            token = token.to_lowercase();
        }
        if !opts.diacritics_sensitive {
            token = token.chars().map(fold_diacritic).collect();
        }
        token
    }

    /// Check whether a query word is a stop word under the clause options
    pub fn is_stop_word(&self, word: &str, opts: &FtOptions) -> bool {
        match &opts.stop_words {
            StopWords::None => false,
            StopWords::Default => self.stopwords.contains(&word.to_lowercase()),
            StopWords::List(list) => {
                let lower = word.to_lowercase();
                list.iter().any(|w| w.to_lowercase() == lower)
            }
        }
    }
}

/// Strip accents from common Latin letters
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => 'C',
        'ď' | 'đ' => 'd',
        'Ď' | 'Đ' => 'D',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => 'G',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' => 'I',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => 'O',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => 'S',
        'ţ' | 'ť' => 't',
        'Ţ' | 'Ť' => 'T',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' | 'Ÿ' => 'Y',
        'ź' | 'ż' | 'ž' => 'z',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        other => other,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Piece {
    Lit(char),
    Any { min: usize, max: Option<usize> },
}

fn parse_pattern(pattern: &str) -> Vec<Piece> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut pieces = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                pieces.push(Piece::Lit(chars[i + 1]));
                i += 2;
            }
            '.' => {
                let piece = match chars.get(i + 1) {
                    Some('?') => Piece::Any { min: 0, max: Some(1) },
                    Some('*') => Piece::Any { min: 0, max: None },
                    Some('+') => Piece::Any { min: 1, max: None },
                    _ => Piece::Any { min: 1, max: Some(1) },
                };
                i += if matches!(piece, Piece::Any { min: 1, max: Some(1) }) { 1 } else { 2 };
                pieces.push(piece);
            }
            c => {
                pieces.push(Piece::Lit(c));
                i += 1;
            }
        }
    }
    pieces
}

/// Match a token against a wildcard pattern
///
/// Supports `.` (one char), `.?` (zero or one), `.*` (any run) and `.+`
/// (non-empty run); `\` escapes the next character.
pub fn wildcard_match(pattern: &str, token: &str) -> bool {
    let pieces = parse_pattern(pattern);
    let chars: Vec<char> = token.chars().collect();

    // reach[j]: the first processed pieces can consume exactly j chars
    let mut reach = vec![false; chars.len() + 1];
    reach[0] = true;
    for piece in &pieces {
        let mut next = vec![false; chars.len() + 1];
        for j in 0..=chars.len() {
            if !reach[j] {
                continue;
            }
            match *piece {
                Piece::Lit(c) => {
                    if j < chars.len() && chars[j] == c {
                        next[j + 1] = true;
                    }
                }
                Piece::Any { min, max } => {
                    let upper = max.map_or(chars.len(), |m| (j + m).min(chars.len()));
                    for k in (j + min)..=upper {
                        if k <= chars.len() {
                            next[k] = true;
                        }
                    }
                }
            }
        }
        reach = next;
    }
    reach[chars.len()]
}

/// Whether a query word carries wildcard syntax
pub fn has_wildcards(word: &str) -> bool {
    word.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(&TokenizerConfig::default())
    }

    #[test]
    fn test_words_with_offsets() {
        let tokenizer = tokenizer();
        let words = tokenizer.words("Hello World! This is a test.");
        let text: Vec<&str> = words.iter().map(|(_, w)| *w).collect();
        assert_eq!(text, vec!["Hello", "World", "This", "is", "a", "test"]);
        assert_eq!(words[1].0, 6);
    }

    #[test]
    fn test_normalize_case_and_diacritics() {
        let tokenizer = tokenizer();
        let opts = FtOptions::default();
        assert_eq!(tokenizer.normalize("Café", &opts), "cafe");

        let strict = FtOptions::default()
            .with_case_sensitive(true)
            .with_diacritics_sensitive(true);
        assert_eq!(tokenizer.normalize("Café", &strict), "Café");
    }

    #[test]
    fn test_stemming() {
        let tokenizer = tokenizer();
        let opts = FtOptions::default().with_stemming(true);
        assert_eq!(
            tokenizer.normalize("running", &opts),
            tokenizer.normalize("runs", &opts)
        );
    }

    #[test]
    fn test_stop_words() {
        let tokenizer = tokenizer();
        let none = FtOptions::default();
        assert!(!tokenizer.is_stop_word("the", &none));

        let default = FtOptions::default().with_stop_words(StopWords::Default);
        assert!(tokenizer.is_stop_word("The", &default));
        assert!(!tokenizer.is_stop_word("database", &default));

        let list = FtOptions::default().with_stop_words(StopWords::List(vec!["xml".to_string()]));
        assert!(tokenizer.is_stop_word("XML", &list));
        assert!(!tokenizer.is_stop_word("the", &list));
    }

    #[test]
    fn test_query_words_keep_wildcard_patterns() {
        let tokenizer = tokenizer();
        let plain = FtOptions::default();
        assert_eq!(tokenizer.query_words("data.* v1\\.0", &plain), vec!["data", "v1", "0"]);

        let wild = FtOptions::default().with_wildcards(true);
        assert_eq!(tokenizer.query_words("data.* v1\\.0", &wild), vec!["data.*", "v1\\.0"]);
        assert_eq!(tokenizer.query_words("fast, engine", &wild), vec!["fast", "engine"]);
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("da.a", "data"));
        assert!(!wildcard_match("da.a", "daa"));
        assert!(wildcard_match("data.*", "data"));
        assert!(wildcard_match("data.*", "database"));
        assert!(!wildcard_match("data.+", "data"));
        assert!(wildcard_match("colo.?r", "color"));
        assert!(wildcard_match("colo.?r", "colour"));
        assert!(!wildcard_match("colo.?r", "colouur"));
        assert!(wildcard_match("v1\\.0", "v1.0"));
        assert!(!wildcard_match("v1\\.0", "v100"));
    }
}
