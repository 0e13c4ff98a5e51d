//! Full-text selections: terms, combinators and position filters

use crate::config::{FtOptions, StopWords, ZeroCostPolicy};
use crate::error::{ArborError, EvalFault};
use crate::query::context::EvalContext;
use crate::query::explain::PlanNode;
use crate::query::fulltext::filter::{self, MAX_FILTER_LEVELS};
use crate::query::fulltext::matches::{FtHit, FtMatches};
use crate::query::fulltext::options::{PosFilterConfig, RangeSpec};
use crate::query::fulltext::units::TextUnits;
use crate::query::planner::IndexContext;
use crate::query::types::{IndexCost, NodeId};
use crate::tokenizer::{has_wildcards, wildcard_match, Tokenizer};
use crate::Result;

/// Where term occurrences come from
#[derive(Clone, Copy, Debug)]
pub enum FtSource<'t> {
    /// Probe the full-text index; ids are text nodes
    Index,
    /// Scan the string value of a single node
    Node { id: NodeId, text: &'t str },
}

/// How the strings of a term are combined
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FtMode {
    /// Any string, each read as a phrase
    Any,
    /// All strings, each read as a phrase
    All,
    /// All strings joined into one phrase
    #[default]
    Phrase,
    /// Any single word
    AnyWord,
    /// Every single word
    AllWords,
}

impl FtMode {
    fn name(self) -> &'static str {
        match self {
            FtMode::Any => "any",
            FtMode::All => "all",
            FtMode::Phrase => "phrase",
            FtMode::AnyWord => "any word",
            FtMode::AllWords => "all words",
        }
    }

    fn is_disjunctive(self) -> bool {
        matches!(self, FtMode::Any | FtMode::AnyWord)
    }
}

/// A full-text term
#[derive(Clone, Debug, PartialEq)]
pub struct FtWords {
    pub terms: Vec<String>,
    pub mode: FtMode,
    /// Required number of occurrences per node
    pub occurs: Option<RangeSpec>,
    /// Match options; inherited from the enclosing clause when unset
    pub options: Option<FtOptions>,
}

/// Query word with its offset from the first kept word of its phrase
#[derive(Clone, Debug)]
struct PhraseWord {
    offset: u32,
    word: String,
}

impl FtWords {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            terms: vec![term.into()],
            mode: FtMode::Phrase,
            occurs: None,
            options: None,
        }
    }

    pub fn with_terms<I, S>(terms: I, mode: FtMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            mode,
            occurs: None,
            options: None,
        }
    }

    pub fn occurs(mut self, range: RangeSpec) -> Self {
        self.occurs = Some(range);
        self
    }

    pub fn options(mut self, options: FtOptions) -> Self {
        self.options = Some(options);
        self
    }

    fn opts(&self) -> FtOptions {
        self.options.clone().unwrap_or_default()
    }

    /// Split the terms into phrases of non-stop words
    fn phrases(&self, tokenizer: &Tokenizer, opts: &FtOptions) -> Vec<Vec<PhraseWord>> {
        let split = |text: &str| tokenizer.query_words(text, opts);
        let raw: Vec<Vec<String>> = match self.mode {
            FtMode::Phrase => vec![self.terms.iter().flat_map(|t| split(t)).collect()],
            FtMode::Any | FtMode::All => self.terms.iter().map(|t| split(t)).collect(),
            FtMode::AnyWord | FtMode::AllWords => self
                .terms
                .iter()
                .flat_map(|t| split(t))
                .map(|w| vec![w])
                .collect(),
        };

        raw.into_iter()
            .map(|words| {
                let kept: Vec<(u32, String)> = words
                    .into_iter()
                    .enumerate()
                    .filter(|(_, w)| !tokenizer.is_stop_word(w, opts))
                    .map(|(i, w)| (i as u32, w))
                    .collect();
                let first = kept.first().map_or(0, |(i, _)| *i);
                kept.into_iter()
                    .map(|(i, word)| PhraseWord {
                        offset: i - first,
                        word,
                    })
                    .collect()
            })
            .collect()
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>, source: &FtSource<'_>) -> Result<FtMatches> {
        cx.check_cancelled()?;
        cx.stats.ft_terms += 1;

        let opts = self.opts();
        let tokenizer = cx.tokenizer();
        let text_tokens: Vec<String> = match source {
            FtSource::Node { text, .. } => tokenizer
                .words(text)
                .into_iter()
                .map(|(_, w)| tokenizer.normalize(w, &opts))
                .collect(),
            FtSource::Index => Vec::new(),
        };

        let mut result: Option<FtMatches> = None;
        for phrase in self.phrases(tokenizer, &opts) {
            let mut acc: Option<FtMatches> = None;
            for pw in &phrase {
                let occurrences = word_matches(cx, source, &text_tokens, &pw.word, &opts)?;
                acc = Some(match acc {
                    None => occurrences,
                    Some(prev) => phrase_join(&prev, &occurrences, pw.offset),
                });
                if acc.as_ref().map_or(false, FtMatches::is_empty) {
                    break;
                }
            }
            let matched = acc.unwrap_or_else(|| FtMatches::empty(1));
            result = Some(match result {
                None => matched,
                Some(prev) if self.mode.is_disjunctive() => prev.union(&matched),
                Some(prev) => prev.intersect(&matched).flatten(),
            });
        }

        let matches = result.unwrap_or_else(|| FtMatches::empty(1));
        Ok(match self.occurs {
            Some(range) => filter::occurs(&matches, range),
            None => matches,
        })
    }

    fn index_cost(&self, ic: &IndexContext<'_>) -> IndexCost {
        let opts = self.opts();
        let meta = ic.accessor().index_meta();
        if self.occurs.is_some()
            || opts.stop_words != StopWords::None
            || meta.fulltext != Some(opts.index_options())
        {
            return IndexCost::UNUSABLE;
        }

        let accessor = ic.accessor();
        let phrase_costs = self.phrases(ic.tokenizer(), &opts).into_iter().map(|phrase| {
            phrase
                .iter()
                .map(|pw| accessor.estimate_token_hits(&pw.word, &opts))
                .min()
                .unwrap_or(0)
        });

        let hits = if self.mode.is_disjunctive() {
            phrase_costs.fold(0usize, usize::saturating_add)
        } else {
            phrase_costs.min().unwrap_or(0)
        };
        IndexCost::hits(hits)
    }
}

/// Occurrences of one query word as a single-level stream
fn word_matches(
    cx: &mut EvalContext<'_>,
    source: &FtSource<'_>,
    text_tokens: &[String],
    word: &str,
    opts: &FtOptions,
) -> Result<FtMatches> {
    match source {
        FtSource::Index => {
            let postings = cx.accessor().lookup_token(word, opts)?;
            cx.stats.index_probes += 1;
            Ok(FtMatches::from_postings(&postings))
        }
        FtSource::Node { id, .. } => {
            let tokenizer = cx.tokenizer();
            let wildcard = opts.wildcards && has_wildcards(word);
            let needle = if wildcard {
                tokenizer.normalize_pattern(word, opts)
            } else {
                tokenizer.normalize(word, opts)
            };
            let hits: Vec<FtHit> = text_tokens
                .iter()
                .enumerate()
                .filter(|(_, token)| {
                    if wildcard {
                        wildcard_match(&needle, token)
                    } else {
                        **token == needle
                    }
                })
                .map(|(i, _)| FtHit::new(i as u32, i as u32, 0))
                .collect();

            let mut matches = FtMatches::empty(1);
            if !hits.is_empty() {
                matches.push(*id, hits);
            }
            Ok(matches)
        }
    }
}

/// Extend phrase hits by a word expected `offset` tokens after the phrase start
fn phrase_join(acc: &FtMatches, next: &FtMatches, offset: u32) -> FtMatches {
    let mut out = FtMatches::empty(1);
    let (mut i, mut j) = (0, 0);
    let mut hits = Vec::new();
    while i < acc.len() && j < next.len() {
        match acc.ids()[i].cmp(&next.ids()[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                hits.clear();
                let following = next.block(j);
                let mut k = 0;
                for hit in acc.block(i) {
                    let target = hit.pos + offset;
                    while k < following.len() && following[k].pos < target {
                        k += 1;
                    }
                    if k < following.len() && following[k].pos == target {
                        hits.push(FtHit::new(hit.pos, target, 0));
                    }
                }
                if !hits.is_empty() {
                    out.push(acc.ids()[i], hits.iter().copied());
                }
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Full-text selection tree
#[derive(Clone, Debug, PartialEq)]
pub enum FtExpr {
    Words(FtWords),
    And(Vec<FtExpr>),
    Or(Vec<FtExpr>),
    /// Occurrences of the left operand not inside occurrences of the right
    MildNot(Box<FtExpr>, Box<FtExpr>),
    Not(Box<FtExpr>),
    /// Position filters over the operand's matches
    Select(Box<FtExpr>, PosFilterConfig),
}

impl From<FtWords> for FtExpr {
    fn from(words: FtWords) -> Self {
        FtExpr::Words(words)
    }
}

impl FtExpr {
    pub fn words(term: impl Into<String>) -> Self {
        FtExpr::Words(FtWords::new(term))
    }

    pub fn and(operands: Vec<FtExpr>) -> Self {
        FtExpr::And(operands)
    }

    pub fn or(operands: Vec<FtExpr>) -> Self {
        FtExpr::Or(operands)
    }

    pub fn mild_not(left: FtExpr, right: FtExpr) -> Self {
        FtExpr::MildNot(Box::new(left), Box::new(right))
    }

    pub fn not(operand: FtExpr) -> Self {
        FtExpr::Not(Box::new(operand))
    }

    pub fn select(operand: FtExpr, config: PosFilterConfig) -> Self {
        FtExpr::Select(Box::new(operand), config)
    }

    /// Number of operand levels the matches of this expression carry
    pub fn levels(&self) -> u16 {
        match self {
            FtExpr::Words(_) => 1,
            FtExpr::And(ops) => ops.iter().map(FtExpr::levels).sum(),
            FtExpr::Or(ops) => ops.iter().map(FtExpr::levels).max().unwrap_or(0),
            FtExpr::MildNot(left, _) => left.levels(),
            FtExpr::Not(_) => 0,
            FtExpr::Select(inner, _) => inner.levels(),
        }
    }

    /// Validate and normalize, handing clause options to terms without their own
    pub fn compile(self, options: &FtOptions) -> Result<FtExpr> {
        Ok(match self {
            FtExpr::Words(mut words) => {
                if let Some(range) = words.occurs {
                    if !range.is_valid() {
                        return Err(ArborError::Compile(format!("empty occurrence range: {}", range)));
                    }
                }
                if words.options.is_none() {
                    words.options = Some(options.clone());
                }
                FtExpr::Words(words)
            }
            FtExpr::And(ops) => {
                let ops = Self::compile_all(ops, options, |e| match e {
                    FtExpr::And(inner) => Ok(inner),
                    other => Err(other),
                })?;
                Self::collapse(ops, FtExpr::And)?
            }
            FtExpr::Or(ops) => {
                let ops = Self::compile_all(ops, options, |e| match e {
                    FtExpr::Or(inner) => Ok(inner),
                    other => Err(other),
                })?;
                Self::collapse(ops, FtExpr::Or)?
            }
            FtExpr::MildNot(left, right) => {
                FtExpr::MildNot(Box::new(left.compile(options)?), Box::new(right.compile(options)?))
            }
            FtExpr::Not(inner) => FtExpr::Not(Box::new(inner.compile(options)?)),
            FtExpr::Select(inner, config) => {
                let inner = inner.compile(options)?;
                if config.is_empty() {
                    return Ok(inner);
                }
                config.validate().map_err(ArborError::Compile)?;
                if inner.levels() > MAX_FILTER_LEVELS {
                    return Err(ArborError::Compile(format!(
                        "position filters support at most {} operands",
                        MAX_FILTER_LEVELS
                    )));
                }
                FtExpr::Select(Box::new(inner), config)
            }
        })
    }

    fn compile_all<F>(ops: Vec<FtExpr>, options: &FtOptions, unnest: F) -> Result<Vec<FtExpr>>
    where
        F: Fn(FtExpr) -> std::result::Result<Vec<FtExpr>, FtExpr>,
    {
        let mut out = Vec::with_capacity(ops.len());
        for op in ops {
            match unnest(op.compile(options)?) {
                Ok(inner) => out.extend(inner),
                Err(single) => out.push(single),
            }
        }
        Ok(out)
    }

    fn collapse(mut ops: Vec<FtExpr>, wrap: fn(Vec<FtExpr>) -> FtExpr) -> Result<FtExpr> {
        match ops.len() {
            0 => Err(ArborError::Compile("full-text combinator without operands".to_string())),
            1 => Ok(ops.remove(0)),
            _ => Ok(wrap(ops)),
        }
    }

    /// Evaluate into a match stream
    pub fn evaluate(&self, cx: &mut EvalContext<'_>, source: &FtSource<'_>) -> Result<FtMatches> {
        match self {
            FtExpr::Words(words) => words.evaluate(cx, source),
            FtExpr::And(ops) => Self::evaluate_and(ops, cx, source),
            FtExpr::Or(ops) => {
                let mut acc: Option<FtMatches> = None;
                for op in ops {
                    let next = op.evaluate(cx, source)?;
                    acc = Some(match acc {
                        None => next,
                        Some(prev) => prev.union(&next),
                    });
                }
                Ok(acc.unwrap_or_else(|| FtMatches::empty(0)))
            }
            FtExpr::MildNot(left, right) => {
                let left = left.evaluate(cx, source)?;
                if left.is_empty() {
                    return Ok(left);
                }
                let right = right.evaluate(cx, source)?;
                Ok(left.mild_not(&right))
            }
            FtExpr::Not(inner) => match source {
                FtSource::Node { id, .. } => {
                    let matched = inner.evaluate(cx, source)?;
                    Ok(if matched.is_empty() {
                        FtMatches::bare(*id)
                    } else {
                        FtMatches::empty(0)
                    })
                }
                FtSource::Index => Err(ArborError::eval(
                    EvalFault::Type,
                    "negation cannot be answered by the index on its own",
                )),
            },
            FtExpr::Select(inner, config) => {
                let matches = inner.evaluate(cx, source)?;
                let query = cx.query();
                let tokenizer = query.tokenizer();
                filter::apply_filters(&matches, config, |id| match source {
                    FtSource::Node { text, .. } => Ok(TextUnits::new(text, tokenizer)),
                    FtSource::Index => {
                        let text = query.accessor().node_text(id)?;
                        Ok(TextUnits::new(&text, tokenizer))
                    }
                })
            }
        }
    }

    /// Positive operands intersect; negated operands remove their ids
    fn evaluate_and(ops: &[FtExpr], cx: &mut EvalContext<'_>, source: &FtSource<'_>) -> Result<FtMatches> {
        let (negated, positive): (Vec<&FtExpr>, Vec<&FtExpr>) =
            ops.iter().partition(|op| matches!(op, FtExpr::Not(_)));

        if positive.is_empty() {
            let mut acc: Option<FtMatches> = None;
            for op in ops {
                let next = op.evaluate(cx, source)?;
                acc = Some(match acc {
                    None => next,
                    Some(prev) => prev.intersect(&next),
                });
            }
            return Ok(acc.unwrap_or_else(|| FtMatches::empty(0)));
        }

        let mut acc: Option<FtMatches> = None;
        for op in positive {
            let next = op.evaluate(cx, source)?;
            let merged = match acc {
                None => next,
                Some(prev) => prev.intersect(&next),
            };
            if merged.is_empty() {
                return Ok(FtMatches::empty(merged.levels()));
            }
            acc = Some(merged);
        }

        let mut acc = acc.unwrap_or_else(|| FtMatches::empty(0));
        for op in negated {
            if let FtExpr::Not(inner) = op {
                let excluded = inner.evaluate(cx, source)?;
                acc = acc.without_ids(&excluded);
            }
        }
        Ok(acc)
    }

    /// Expected index hits when answered by the full-text index
    pub fn index_cost(&self, ic: &IndexContext<'_>, cap: usize) -> IndexCost {
        match self {
            FtExpr::Words(words) => words.index_cost(ic),
            FtExpr::And(ops) => {
                let mut sum = 0usize;
                let mut positives = 0;
                for op in ops {
                    let cost = match op {
                        FtExpr::Not(inner) => {
                            if !inner.index_cost(ic, cap).is_usable() {
                                return IndexCost::UNUSABLE;
                            }
                            continue;
                        }
                        other => other.index_cost(ic, cap),
                    };
                    if !cost.is_usable() || cost.negated {
                        return IndexCost::UNUSABLE;
                    }
                    positives += 1;
                    sum = sum.saturating_add(cost.hits);
                    if sum > cap {
                        return IndexCost::hits(sum);
                    }
                }
                if positives == 0 {
                    return IndexCost::UNUSABLE;
                }
                IndexCost::hits(sum)
            }
            FtExpr::Or(ops) => {
                let mut sum = 0usize;
                for op in ops {
                    let cost = op.index_cost(ic, cap);
                    if !cost.is_usable() || cost.negated {
                        return IndexCost::UNUSABLE;
                    }
                    sum = sum.saturating_add(cost.hits);
                    if sum > cap {
                        return IndexCost::hits(sum);
                    }
                }
                IndexCost::hits(sum)
            }
            FtExpr::MildNot(left, right) => {
                let right_cost = right.index_cost(ic, usize::MAX);
                if !right_cost.is_usable() || right_cost.negated {
                    return IndexCost::UNUSABLE;
                }
                left.index_cost(ic, cap)
            }
            FtExpr::Not(inner) => {
                let cost = inner.index_cost(ic, cap);
                // a negated operand without hits holds for every node
                if cost.is_usable() && !cost.negated && cost.hits == 0 {
                    match ic.policy() {
                        ZeroCostPolicy::AcceptAll => IndexCost {
                            hits: 0,
                            negated: true,
                        },
                        ZeroCostPolicy::Unusable => {
                            tracing::warn!("negated full-text operand without hits treated as unusable");
                            IndexCost::UNUSABLE
                        }
                    }
                } else {
                    IndexCost::UNUSABLE
                }
            }
            FtExpr::Select(inner, _) => inner.index_cost(ic, cap),
        }
    }

    pub fn plan(&self) -> PlanNode {
        match self {
            FtExpr::Words(words) => {
                let mut node = PlanNode::new("FtWords")
                    .attr("terms", words.terms.join("|"))
                    .attr("mode", words.mode.name());
                if let Some(range) = words.occurs {
                    node = node.attr("occurs", range.to_string());
                }
                node
            }
            FtExpr::And(ops) => PlanNode::new("FtAnd").children(ops.iter().map(FtExpr::plan)),
            FtExpr::Or(ops) => PlanNode::new("FtOr").children(ops.iter().map(FtExpr::plan)),
            FtExpr::MildNot(left, right) => PlanNode::new("FtMildNot")
                .child(left.plan())
                .child(right.plan()),
            FtExpr::Not(inner) => PlanNode::new("FtNot").child(inner.plan()),
            FtExpr::Select(inner, config) => PlanNode::new("FtSelect")
                .attr("filters", config.describe())
                .child(inner.plan()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StopWords;
    use crate::query::context::QueryContext;
    use crate::query::fulltext::options::{ContentAnchor, Unit};
    use crate::store::DocumentBuilder;
    use std::sync::Arc;

    fn context() -> QueryContext {
        let store = DocumentBuilder::new().build().unwrap();
        QueryContext::new(Arc::new(store))
    }

    fn run(ft: FtExpr, text: &str) -> FtMatches {
        let query = context();
        let mut cx = EvalContext::new(&query);
        let ft = ft.compile(&FtOptions::default()).unwrap();
        ft.evaluate(&mut cx, &FtSource::Node { id: 7, text }).unwrap()
    }

    #[test]
    fn test_phrase_matches_adjacent_words() {
        let m = run(FtExpr::words("query engine"), "A fast query engine, a slow query planner");
        assert_eq!(m.ids(), &[7]);
        assert_eq!(m.block(0), &[FtHit::new(2, 3, 0)]);
        assert!(run(FtExpr::words("engine query"), "the query engine").is_empty());
    }

    #[test]
    fn test_phrase_keeps_gaps_of_stop_words() {
        let stop = StopWords::List(vec!["of".to_string(), "the".to_string()]);
        let opts = FtOptions::default().with_stop_words(stop);
        let ft = FtExpr::Words(FtWords::new("state of art").options(opts));
        let m = run(ft.clone(), "the state of the art");
        assert!(m.is_empty());
        let m = run(ft, "the state of art");
        assert_eq!(m.block(0), &[FtHit::new(1, 3, 0)]);
    }

    #[test]
    fn test_any_and_all_modes() {
        let any = FtExpr::Words(FtWords::with_terms(["xml", "json"], FtMode::Any));
        assert_eq!(run(any, "json only").ids(), &[7]);

        let all = FtExpr::Words(FtWords::with_terms(["xml", "json"], FtMode::All));
        assert!(run(all.clone(), "json only").is_empty());
        let m = run(all, "xml and json");
        assert_eq!(m.levels(), 1);
        assert_eq!(m.block(0).len(), 2);
    }

    #[test]
    fn test_times_filter() {
        let three = FtExpr::Words(FtWords::new("data").occurs(RangeSpec::Exactly(3)));
        assert!(!run(three, "data data data").is_empty());
        let four = FtExpr::Words(FtWords::new("data").occurs(RangeSpec::AtLeast(4)));
        assert!(run(four, "data data data").is_empty());
    }

    #[test]
    fn test_ordered_selection() {
        let ft = || {
            FtExpr::select(
                FtExpr::and(vec![FtExpr::words("a"), FtExpr::words("b")]),
                PosFilterConfig::new().ordered(),
            )
        };
        assert!(!run(ft(), "a b").is_empty());
        assert!(run(ft(), "b a").is_empty());
        let m = run(ft(), "b a b");
        let positions: Vec<u32> = m.block(0).iter().map(|h| h.pos).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_window_and_content() {
        let window = FtExpr::select(
            FtExpr::and(vec![FtExpr::words("fast"), FtExpr::words("engine")]),
            PosFilterConfig::new().window(3, Unit::Words),
        );
        assert!(!run(window.clone(), "fast query engine").is_empty());
        assert!(run(window, "fast and robust query engine").is_empty());

        let start = FtExpr::select(FtExpr::words("fast"), PosFilterConfig::new().content(ContentAnchor::AtStart));
        assert!(!run(start.clone(), "fast engine").is_empty());
        assert!(run(start, "a fast engine").is_empty());
    }

    #[test]
    fn test_negation() {
        let not = FtExpr::not(FtExpr::words("slow"));
        let m = run(not.clone(), "fast engine");
        assert_eq!(m.ids(), &[7]);
        assert!(m.block(0).is_empty());
        assert!(run(not, "slow engine").is_empty());

        let and_not = FtExpr::and(vec![FtExpr::words("engine"), FtExpr::not(FtExpr::words("slow"))]);
        assert!(!run(and_not.clone(), "fast engine").is_empty());
        assert!(run(and_not, "slow engine").is_empty());
    }

    #[test]
    fn test_mild_not() {
        let ft = FtExpr::mild_not(FtExpr::words("york"), FtExpr::words("new york"));
        assert!(run(ft.clone(), "new york").is_empty());
        assert!(!run(ft, "new york and york").is_empty());
    }

    #[test]
    fn test_compile_rejects_malformed_selections() {
        let zero_window = FtExpr::select(FtExpr::words("a"), PosFilterConfig::new().window(0, Unit::Words));
        assert!(zero_window.compile(&FtOptions::default()).is_err());

        let bad_times = FtExpr::Words(FtWords::new("a").occurs(RangeSpec::FromTo(4, 2)));
        assert!(bad_times.compile(&FtOptions::default()).is_err());

        assert!(FtExpr::and(vec![]).compile(&FtOptions::default()).is_err());
    }

    #[test]
    fn test_compile_flattens_and_inherits_options() {
        let opts = FtOptions::default().with_stemming(true);
        let nested = FtExpr::and(vec![
            FtExpr::words("a"),
            FtExpr::and(vec![FtExpr::words("b"), FtExpr::words("c")]),
        ]);
        let compiled = nested.compile(&opts).unwrap();
        match &compiled {
            FtExpr::And(ops) => {
                assert_eq!(ops.len(), 3);
                assert!(ops.iter().all(|op| matches!(op, FtExpr::Words(w) if w.options == Some(opts.clone()))));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(compiled.levels(), 3);
    }

    #[test]
    fn test_wildcards() {
        let opts = FtOptions::default().with_wildcards(true);
        let ft = FtExpr::Words(FtWords::new("data.*").options(opts.clone()));
        assert!(!run(ft.clone(), "Databases rule").is_empty());
        assert!(run(ft, "dat rule").is_empty());

        let phrase = FtExpr::Words(FtWords::new("fast quer.*").options(opts));
        let m = run(phrase, "a fast query engine");
        assert_eq!(m.block(0), &[FtHit::new(1, 2, 0)]);
    }
}
