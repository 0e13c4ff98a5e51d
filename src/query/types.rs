//! Core types shared by query compilation and evaluation

use crate::query::pairs;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pre-order rank of a node; the document node is 0
pub type NodeId = u32;

/// Kind of a stored node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
}

/// Ascending, duplicate-free sequence of node ids
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeSet {
    ids: Vec<NodeId>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from ids in any order
    pub fn from_unsorted(mut ids: Vec<NodeId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    /// Build from ids already ascending and unique
    pub fn from_sorted(ids: Vec<NodeId>) -> Self {
        debug_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        Self { ids }
    }

    pub fn from_bitmap(bitmap: &RoaringBitmap) -> Self {
        Self {
            ids: bitmap.iter().collect(),
        }
    }

    pub fn to_bitmap(&self) -> RoaringBitmap {
        self.ids.iter().copied().collect()
    }

    pub fn single(id: NodeId) -> Self {
        Self { ids: vec![id] }
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn into_ids(self) -> Vec<NodeId> {
        self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn union(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            ids: pairs::union_sorted(&self.ids, &other.ids),
        }
    }

    pub fn intersect(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            ids: pairs::intersect_sorted(&self.ids, &other.ids),
        }
    }
}

/// Result of evaluating an expression
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The empty sequence
    Empty,
    Bool(bool),
    Num(f64),
    Str(String),
    Nodes(NodeSet),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Nodes(nodes) => nodes.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool_const(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Effective boolean value of a value that does not need node access
    pub fn truthy(&self) -> bool {
        match self {
            Value::Empty => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Nodes(nodes) => !nodes.is_empty(),
        }
    }

    /// Atom of a single non-node value
    pub fn as_atom(&self) -> Option<Atom> {
        match self {
            Value::Bool(b) => Some(Atom::Bool(*b)),
            Value::Num(n) => Some(Atom::Num(*n)),
            Value::Str(s) => Some(Atom::Str(s.clone())),
            Value::Empty | Value::Nodes(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty-sequence()",
            Value::Bool(_) => "xs:boolean",
            Value::Num(_) => "xs:double",
            Value::Str(_) => "xs:string",
            Value::Nodes(_) => "node()*",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("()"),
            Value::Bool(b) => write!(f, "{}()", b),
            Value::Num(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Nodes(nodes) => write!(f, "nodes({})", nodes.len()),
        }
    }
}

/// Atomized item compared by general comparisons
#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Atom {
    /// Numeric reading; strings are parsed after trimming
    pub fn to_num(&self) -> f64 {
        match self {
            Atom::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Atom::Num(n) => *n,
            Atom::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }

    /// Whether `self op other` holds
    ///
    /// Numbers win over booleans, booleans over strings.
    pub fn compare(&self, op: CmpOp, other: &Atom) -> bool {
        match (self, other) {
            (Atom::Num(_), _) | (_, Atom::Num(_)) => {
                match self.to_num().partial_cmp(&other.to_num()) {
                    Some(ord) => op.holds(ord),
                    None => op == CmpOp::Ne,
                }
            }
            (Atom::Bool(_), _) | (_, Atom::Bool(_)) => {
                let a = self.to_bool();
                let b = other.to_bool();
                op.holds(a.cmp(&b))
            }
            (Atom::Str(a), Atom::Str(b)) => op.holds(a.cmp(b)),
        }
    }

    fn to_bool(&self) -> bool {
        match self {
            Atom::Bool(b) => *b,
            Atom::Num(n) => *n != 0.0 && !n.is_nan(),
            Atom::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Bool(b) => write!(f, "{}()", b),
            Atom::Num(n) => write!(f, "{}", n),
            Atom::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<Atom> for Value {
    fn from(atom: Atom) -> Self {
        match atom {
            Atom::Bool(b) => Value::Bool(b),
            Atom::Num(n) => Value::Num(n),
            Atom::Str(s) => Value::Str(s),
        }
    }
}

/// General comparison operator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Operator that holds when the operands change sides
    pub fn swap(self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            other => other,
        }
    }

    pub fn is_lower_bound(self) -> bool {
        matches!(self, CmpOp::Gt | CmpOp::Ge)
    }

    pub fn is_upper_bound(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Le)
    }

    pub fn holds(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Eq => ord == Equal,
            CmpOp::Ne => ord != Equal,
            CmpOp::Lt => ord == Less,
            CmpOp::Le => ord != Greater,
            CmpOp::Gt => ord == Greater,
            CmpOp::Ge => ord != Less,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Path step axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
}

impl Axis {
    /// Axis leading back from a node reached through this axis
    pub fn invert(self) -> Axis {
        match self {
            Axis::Child | Axis::Attribute => Axis::Parent,
            Axis::Descendant => Axis::Ancestor,
            Axis::DescendantOrSelf => Axis::AncestorOrSelf,
            Axis::SelfAxis => Axis::SelfAxis,
            Axis::Parent => Axis::Child,
            Axis::Ancestor => Axis::Descendant,
            Axis::AncestorOrSelf => Axis::DescendantOrSelf,
        }
    }

    /// Axis never leaves the subtree of the context node
    pub fn is_down(self) -> bool {
        matches!(
            self,
            Axis::Child | Axis::Descendant | Axis::DescendantOrSelf | Axis::Attribute | Axis::SelfAxis
        )
    }

    /// Reverse axes number their nodes from the context outward
    pub fn is_reverse(self) -> bool {
        matches!(self, Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf)
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Attribute => "attribute",
            Axis::SelfAxis => "self",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
        }
    }
}

/// Node test of a path step
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Test {
    /// `node()`
    Node,
    /// `text()`
    Text,
    /// `document-node()`
    Document,
    /// `*`: any node of the axis' principal kind
    Any,
    /// A named node of the axis' principal kind
    Name(String),
}

impl Test {
    pub fn name(name: impl Into<String>) -> Self {
        Test::Name(name.into())
    }

    /// Check a node against this test; `principal` is the axis' principal kind
    pub fn matches(&self, kind: NodeKind, name: Option<&str>, principal: NodeKind) -> bool {
        match self {
            Test::Node => true,
            Test::Text => kind == NodeKind::Text,
            Test::Document => kind == NodeKind::Document,
            Test::Any => kind == principal,
            Test::Name(n) => kind == principal && name == Some(n.as_str()),
        }
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Test::Node => f.write_str("node()"),
            Test::Text => f.write_str("text()"),
            Test::Document => f.write_str("document-node()"),
            Test::Any => f.write_str("*"),
            Test::Name(n) => f.write_str(n),
        }
    }
}

/// Estimated index hits of a candidate index access
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexCost {
    /// Expected number of hits; `usize::MAX` when no index applies
    pub hits: usize,
    /// The estimate describes a negated operand
    pub negated: bool,
}

impl IndexCost {
    pub const UNUSABLE: IndexCost = IndexCost {
        hits: usize::MAX,
        negated: false,
    };

    pub fn hits(hits: usize) -> Self {
        Self {
            hits,
            negated: false,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.hits != usize::MAX
    }
}

/// Query execution statistics
#[derive(Clone, Debug, Default)]
pub struct QueryStats {
    /// Number of nodes in the result
    pub nodes_matched: u64,
    /// Nodes visited by axis traversal
    pub nodes_visited: u64,
    /// Index probes sent to the store
    pub index_probes: u64,
    /// Number of probe cache hits
    pub probe_cache_hits: u64,
    /// Number of probe cache misses
    pub probe_cache_misses: u64,
    /// Full-text terms evaluated
    pub ft_terms: u64,
    /// Query execution time in microseconds
    pub execution_time_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_set_normalizes() {
        let set = NodeSet::from_unsorted(vec![5, 1, 5, 3]);
        assert_eq!(set.ids(), &[1, 3, 5]);
        assert!(set.contains(3));
        assert!(!set.contains(4));

        let other = NodeSet::from_sorted(vec![3, 4]);
        assert_eq!(set.union(&other).ids(), &[1, 3, 4, 5]);
        assert_eq!(set.intersect(&other).ids(), &[3]);
    }

    #[test]
    fn test_node_set_bitmap_interop() {
        let set = NodeSet::from_sorted(vec![2, 10, 40]);
        let bitmap = set.to_bitmap();
        assert_eq!(NodeSet::from_bitmap(&bitmap), set);
    }

    #[test]
    fn test_axis_inversion() {
        assert_eq!(Axis::Child.invert(), Axis::Parent);
        assert_eq!(Axis::Attribute.invert(), Axis::Parent);
        assert_eq!(Axis::Descendant.invert(), Axis::Ancestor);
        assert!(Axis::Descendant.is_down());
        assert!(!Axis::Parent.is_down());
    }

    #[test]
    fn test_atom_comparison() {
        let price = Atom::Str(" 10.0 ".to_string());
        assert!(price.compare(CmpOp::Eq, &Atom::Num(10.0)));
        assert!(price.compare(CmpOp::Ge, &Atom::Num(5.0)));
        assert!(!Atom::Str("10.0".to_string()).compare(CmpOp::Eq, &Atom::Str("10".to_string())));
        assert!(!Atom::Str("abc".to_string()).compare(CmpOp::Eq, &Atom::Num(1.0)));
        assert!(Atom::Str("abc".to_string()).compare(CmpOp::Ne, &Atom::Num(1.0)));
    }

    #[test]
    fn test_cmp_op_swap() {
        assert_eq!(CmpOp::Lt.swap(), CmpOp::Gt);
        assert_eq!(CmpOp::Eq.swap(), CmpOp::Eq);
        assert!(CmpOp::Ge.holds(std::cmp::Ordering::Equal));
        assert!(!CmpOp::Gt.holds(std::cmp::Ordering::Equal));
    }

    #[test]
    fn test_test_matching() {
        let name = Test::name("book");
        assert!(name.matches(NodeKind::Element, Some("book"), NodeKind::Element));
        assert!(!name.matches(NodeKind::Attribute, Some("book"), NodeKind::Element));
        assert!(Test::Any.matches(NodeKind::Attribute, Some("id"), NodeKind::Attribute));
        assert!(!Test::Text.matches(NodeKind::Element, None, NodeKind::Element));
    }
}
