use serde::{Deserialize, Serialize};

/// Engine-wide configuration for compiling and evaluating queries
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum expression nesting for compilation and evaluation
    pub max_depth: usize,
    pub planner: PlannerConfig,
    pub tokenizer: TokenizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 512,
            planner: PlannerConfig::default(),
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_planner(mut self, planner: PlannerConfig) -> Self {
        self.planner = planner;
        self
    }
}

/// How a zero estimate for a negated full-text access is read
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroCostPolicy {
    /// The negated operand matches nothing, so the predicate holds for every node
    #[default]
    AcceptAll,
    /// Treat the access as not index-servable and evaluate sequentially
    Unusable,
}

/// Index planner configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Rewrite predicates into index probes when the store provides indexes
    pub use_index: bool,
    pub zero_cost: ZeroCostPolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            use_index: true,
            zero_cost: ZeroCostPolicy::AcceptAll,
        }
    }
}

/// Tokenizer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Stemmer and stop word language
    pub language: String,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            language: "english".to_string(),
            max_token_length: 50,
        }
    }
}

/// Stop word handling of a full-text clause
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopWords {
    #[default]
    None,
    /// The tokenizer language's default list
    Default,
    List(Vec<String>),
}

/// Match options declared for a full-text clause
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtOptions {
    pub case_sensitive: bool,
    pub diacritics_sensitive: bool,
    pub stemming: bool,
    pub wildcards: bool,
    pub stop_words: StopWords,
}

impl FtOptions {
    pub fn with_case_sensitive(mut self, on: bool) -> Self {
        self.case_sensitive = on;
        self
    }

    pub fn with_diacritics_sensitive(mut self, on: bool) -> Self {
        self.diacritics_sensitive = on;
        self
    }

    pub fn with_stemming(mut self, on: bool) -> Self {
        self.stemming = on;
        self
    }

    pub fn with_wildcards(mut self, on: bool) -> Self {
        self.wildcards = on;
        self
    }

    pub fn with_stop_words(mut self, stop_words: StopWords) -> Self {
        self.stop_words = stop_words;
        self
    }

    /// Options that must agree with the full-text index build options
    pub fn index_options(&self) -> FtIndexOptions {
        FtIndexOptions {
            case_sensitive: self.case_sensitive,
            diacritics_sensitive: self.diacritics_sensitive,
            stemming: self.stemming,
            wildcards: self.wildcards,
        }
    }
}

/// Build-time options of a full-text index
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtIndexOptions {
    pub case_sensitive: bool,
    pub diacritics_sensitive: bool,
    pub stemming: bool,
    pub wildcards: bool,
}

/// Which secondary indexes a store provides
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub text_index: bool,
    pub attribute_index: bool,
    pub fulltext: Option<FtIndexOptions>,
}

impl IndexMeta {
    /// All value indexes plus a full-text index with default options
    pub fn all() -> Self {
        Self {
            text_index: true,
            attribute_index: true,
            fulltext: Some(FtIndexOptions::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_depth, 512);
        assert!(config.planner.use_index);
        assert_eq!(config.planner.zero_cost, ZeroCostPolicy::AcceptAll);
        assert_eq!(config.tokenizer.language, "english");
    }

    #[test]
    fn test_ft_options_index_view() {
        let opts = FtOptions::default()
            .with_stemming(true)
            .with_stop_words(StopWords::Default);
        let index = opts.index_options();
        assert!(index.stemming);
        assert!(!index.case_sensitive);
        assert_ne!(index, FtIndexOptions::default());
    }

    #[test]
    fn test_config_serde() {
        let config = EngineConfig::default().with_planner(PlannerConfig {
            use_index: false,
            zero_cost: ZeroCostPolicy::Unusable,
        });
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"unusable\""));
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert!(!back.planner.use_index);
        assert_eq!(back.planner.zero_cost, ZeroCostPolicy::Unusable);
    }
}
