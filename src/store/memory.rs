use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use roaring::RoaringBitmap;

use crate::config::{FtIndexOptions, FtOptions, IndexMeta, TokenizerConfig};
use crate::error::ArborError;
use crate::query::accessor::{IndexAccessor, NumRange, ValueTarget};
use crate::query::types::{NodeId, NodeKind};
use crate::tokenizer::{has_wildcards, wildcard_match, Tokenizer};
use crate::Result;

#[derive(Debug)]
struct StoredNode {
    kind: NodeKind,
    name: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attrs: Vec<NodeId>,
    /// Value of text and attribute nodes
    text: Option<String>,
}

impl StoredNode {
    fn new(kind: NodeKind, name: Option<String>, parent: Option<NodeId>, text: Option<String>) -> Self {
        Self {
            kind,
            name,
            parent,
            children: Vec::new(),
            attrs: Vec::new(),
            text,
        }
    }
}

/// Assembles a document in pre-order
///
/// Node 0 is the document node. Attributes must be added before any child
/// of their element.
pub struct DocumentBuilder {
    nodes: Vec<StoredNode>,
    open: Vec<NodeId>,
    meta: IndexMeta,
    tokenizer: TokenizerConfig,
    error: Option<String>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![StoredNode::new(NodeKind::Document, None, None, None)],
            open: Vec::new(),
            meta: IndexMeta::all(),
            tokenizer: TokenizerConfig::default(),
            error: None,
        }
    }

    /// Indexes to build and advertise
    pub fn with_meta(mut self, meta: IndexMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Tokenizer used for the full-text index
    pub fn with_tokenizer(mut self, config: TokenizerConfig) -> Self {
        self.tokenizer = config;
        self
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(0)
    }

    fn next_id(&self) -> NodeId {
        self.nodes.len() as NodeId
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    /// Start an element under the current one
    pub fn open(&mut self, name: impl Into<String>) -> &mut Self {
        let parent = self.current();
        let id = self.next_id();
        self.nodes
            .push(StoredNode::new(NodeKind::Element, Some(name.into()), Some(parent), None));
        self.nodes[parent as usize].children.push(id);
        self.open.push(id);
        self
    }

    /// Add an attribute to the current element
    pub fn attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let owner = match self.open.last() {
            Some(&id) => id,
            None => {
                self.fail(format!("attribute {} outside an element", name));
                return self;
            }
        };
        if !self.nodes[owner as usize].children.is_empty() {
            self.fail(format!("attribute {} added after child content", name));
            return self;
        }
        let id = self.next_id();
        self.nodes.push(StoredNode::new(
            NodeKind::Attribute,
            Some(name),
            Some(owner),
            Some(value.into()),
        ));
        self.nodes[owner as usize].attrs.push(id);
        self
    }

    /// Add text under the current element; adjacent text is merged
    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        let parent = self.current();
        if let Some(&last) = self.nodes[parent as usize].children.last() {
            let node = &mut self.nodes[last as usize];
            if node.kind == NodeKind::Text {
                if let Some(existing) = node.text.as_mut() {
                    existing.push_str(&text);
                    return self;
                }
            }
        }
        let id = self.next_id();
        self.nodes
            .push(StoredNode::new(NodeKind::Text, None, Some(parent), Some(text)));
        self.nodes[parent as usize].children.push(id);
        self
    }

    /// Finish the current element
    pub fn close(&mut self) -> &mut Self {
        if self.open.pop().is_none() {
            self.fail("close without an open element".to_string());
        }
        self
    }

    /// Build the store and its indexes
    pub fn build(self) -> Result<MemoryStore> {
        if let Some(message) = self.error {
            return Err(ArborError::Storage(message));
        }
        if !self.open.is_empty() {
            return Err(ArborError::Storage(format!(
                "{} element(s) left open",
                self.open.len()
            )));
        }
        Ok(MemoryStore::index(self.nodes, self.meta, Tokenizer::new(&self.tokenizer)))
    }
}

/// Read-only document with value, numeric and full-text indexes
pub struct MemoryStore {
    nodes: Vec<StoredNode>,
    meta: IndexMeta,
    tokenizer: Tokenizer,
    values: HashMap<(ValueTarget, String), RoaringBitmap>,
    /// Numeric node values sorted ascending
    numbers: HashMap<ValueTarget, Vec<(f64, NodeId)>>,
    /// Token to (text node, position) postings
    tokens: HashMap<String, Vec<(NodeId, u32)>>,
    probes: AtomicUsize,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("nodes", &self.nodes.len())
            .field("meta", &self.meta)
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl MemoryStore {
    fn index(nodes: Vec<StoredNode>, meta: IndexMeta, tokenizer: Tokenizer) -> Self {
        let mut values: HashMap<(ValueTarget, String), RoaringBitmap> = HashMap::new();
        let mut numbers: HashMap<ValueTarget, Vec<(f64, NodeId)>> = HashMap::new();
        let mut tokens: HashMap<String, Vec<(NodeId, u32)>> = HashMap::new();
        let ft_opts = meta.fulltext.map(token_options);

        for (id, node) in nodes.iter().enumerate() {
            let id = id as NodeId;
            let value = match &node.text {
                Some(value) => value,
                None => continue,
            };
            let target = match node.kind {
                NodeKind::Text => ValueTarget::Text,
                NodeKind::Attribute => ValueTarget::Attribute,
                _ => continue,
            };

            if let (NodeKind::Text, Some(opts)) = (node.kind, &ft_opts) {
                for (pos, (_, word)) in tokenizer.words(value).into_iter().enumerate() {
                    tokens
                        .entry(tokenizer.normalize(word, opts))
                        .or_default()
                        .push((id, pos as u32));
                }
            }
            let indexed = match target {
                ValueTarget::Text => meta.text_index,
                ValueTarget::Attribute => meta.attribute_index,
            };
            if !indexed {
                continue;
            }

            values.entry((target, value.clone())).or_default().insert(id);
            let n: f64 = value.trim().parse().unwrap_or(f64::NAN);
            if !n.is_nan() {
                numbers.entry(target).or_default().push((n, id));
            }
        }

        for entries in numbers.values_mut() {
            entries.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        }

        tracing::debug!(
            nodes = nodes.len(),
            values = values.len(),
            tokens = tokens.len(),
            "memory store indexed"
        );

        Self {
            nodes,
            meta,
            tokenizer,
            values,
            numbers,
            tokens,
            probes: AtomicUsize::new(0),
        }
    }

    /// Number of stored nodes, the document node included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Index lookups served so far; estimates are not counted
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::Relaxed)
    }

    fn node(&self, id: NodeId) -> Result<&StoredNode> {
        self.nodes
            .get(id as usize)
            .ok_or_else(|| ArborError::Storage(format!("unknown node {}", id)))
    }

    fn has_index(&self, target: ValueTarget) -> bool {
        match target {
            ValueTarget::Text => self.meta.text_index,
            ValueTarget::Attribute => self.meta.attribute_index,
        }
    }

    fn require_index(&self, target: ValueTarget) -> Result<()> {
        if self.has_index(target) {
            Ok(())
        } else {
            Err(ArborError::Storage(format!("no {} value index", target.name())))
        }
    }

    /// Slice of numeric entries inside the range
    fn numeric_slice(&self, target: ValueTarget, range: &NumRange) -> &[(f64, NodeId)] {
        let entries = match self.numbers.get(&target) {
            Some(entries) => entries.as_slice(),
            None => return &[],
        };
        if range.is_empty() {
            return &[];
        }
        let start = entries.partition_point(|(v, _)| {
            if range.min_inclusive {
                *v < range.min
            } else {
                *v <= range.min
            }
        });
        let end = entries.partition_point(|(v, _)| {
            if range.max_inclusive {
                *v <= range.max
            } else {
                *v < range.max
            }
        });
        if start >= end {
            &[]
        } else {
            &entries[start..end]
        }
    }

    /// Postings of a query word, expanding wildcard patterns over the dictionary
    fn postings(&self, token: &str, opts: &FtOptions) -> Cow<'_, [(NodeId, u32)]> {
        if opts.wildcards && has_wildcards(token) {
            let pattern = self.tokenizer.normalize_pattern(token, opts);
            let mut merged: Vec<(NodeId, u32)> = self
                .tokens
                .iter()
                .filter(|(term, _)| wildcard_match(&pattern, term))
                .flat_map(|(_, postings)| postings.iter().copied())
                .collect();
            merged.sort_unstable();
            merged.dedup();
            return Cow::Owned(merged);
        }
        let normalized = self.tokenizer.normalize(token, opts);
        match self.tokens.get(&normalized) {
            Some(postings) => Cow::Borrowed(postings.as_slice()),
            None => Cow::Borrowed(&[]),
        }
    }

    fn fulltext_matches(&self, opts: &FtOptions) -> bool {
        self.meta.fulltext == Some(opts.index_options())
    }
}

/// Options the full-text index normalizes tokens with
fn token_options(index: FtIndexOptions) -> FtOptions {
    FtOptions::default()
        .with_case_sensitive(index.case_sensitive)
        .with_diacritics_sensitive(index.diacritics_sensitive)
        .with_stemming(index.stemming)
        .with_wildcards(index.wildcards)
}

impl IndexAccessor for MemoryStore {
    fn root(&self) -> NodeId {
        0
    }

    fn node_kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.node(id)?.kind)
    }

    fn node_name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id as usize)?.name.as_deref()
    }

    fn node_parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id as usize)?.parent
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id as usize)
            .map_or(&[], |node| node.children.as_slice())
    }

    fn attributes(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id as usize)
            .map_or(&[], |node| node.attrs.as_slice())
    }

    fn node_text(&self, id: NodeId) -> Result<Cow<'_, str>> {
        let node = self.node(id)?;
        if let Some(text) = &node.text {
            return Ok(Cow::Borrowed(text));
        }
        let mut out = String::new();
        let mut stack: Vec<NodeId> = node.children.iter().rev().copied().collect();
        while let Some(child) = stack.pop() {
            let child = self.node(child)?;
            match child.kind {
                NodeKind::Text => out.push_str(child.text.as_deref().unwrap_or_default()),
                _ => stack.extend(child.children.iter().rev()),
            }
        }
        Ok(Cow::Owned(out))
    }

    fn index_meta(&self) -> &IndexMeta {
        &self.meta
    }

    fn estimate_value_hits(&self, target: ValueTarget, value: &str) -> usize {
        self.values
            .get(&(target, value.to_string()))
            .map_or(0, |ids| ids.len() as usize)
    }

    fn lookup_value(&self, target: ValueTarget, value: &str) -> Result<RoaringBitmap> {
        self.require_index(target)?;
        self.probes.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .values
            .get(&(target, value.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn estimate_range_hits(&self, target: ValueTarget, range: &NumRange) -> usize {
        self.numeric_slice(target, range).len()
    }

    fn lookup_numeric_range(&self, target: ValueTarget, range: &NumRange) -> Result<RoaringBitmap> {
        self.require_index(target)?;
        self.probes.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .numeric_slice(target, range)
            .iter()
            .map(|&(_, id)| id)
            .collect())
    }

    fn estimate_token_hits(&self, token: &str, opts: &FtOptions) -> usize {
        if !self.fulltext_matches(opts) {
            return usize::MAX;
        }
        self.postings(token, opts).len()
    }

    fn lookup_token(&self, token: &str, opts: &FtOptions) -> Result<Vec<(NodeId, u32)>> {
        if !self.fulltext_matches(opts) {
            return Err(ArborError::Storage(
                "full-text index options differ from the query options".to_string(),
            ));
        }
        self.probes.fetch_add(1, Ordering::Relaxed);
        Ok(self.postings(token, opts).into_owned())
    }
}
