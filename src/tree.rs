pub mod frame;

use std::collections::BTreeSet;
use std::fmt::Display;
use std::num::NonZeroU64;

use chrono::{DateTime, Utc};
use recursion::CollapsibleExt;

use crate::error::StructuralError;
use crate::tree::frame::ComparisonFrame;

/// Root of every parsed or decoded pattern
#[derive(Debug, Clone, PartialEq)]
pub struct PatternTree {
    root: ObservationNode,
}

/// Join between observation-level nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationJoin {
    And,
    Or,
    FollowedBy,
}

/// Join between comparison-level nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonJoin {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObservationNode {
    Observation(Observation),
    Expression(ObservationExpression),
}

/// A bracketed observation: comparisons over one or more object types.
///
/// `objects` is derived from the comparisons at construction time and cannot
/// be set directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    objects: BTreeSet<String>,
    join: Option<ComparisonJoin>,
    qualifiers: Vec<Qualifier>,
    expressions: Vec<ComparisonNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationExpression {
    join: ObservationJoin,
    qualifiers: Vec<Qualifier>,
    expressions: Vec<ObservationNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonNode {
    Comparison(Comparison),
    Expression(ComparisonExpression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    object: String,
    path: Vec<PathComponent>,
    negated: Option<bool>,
    operator: String,
    value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpression {
    join: ComparisonJoin,
    expressions: Vec<ComparisonNode>,
}

/// A single step of an object path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathComponent {
    /// Dictionary property access: .name or .'quoted name'
    Property(String),
    /// List access: [1], [*], [start:stop:step]
    Index(IndexStep),
}

/// Bracketed list access. A bare `[1]` only sets `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexStep {
    pub start: Option<i64>,
    pub stop: Option<Stop>,
    pub step: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stop {
    Index(i64),
    /// `*`, any element
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
    StartStop {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
    Within {
        value: u64,
        unit: TimeUnit,
    },
    Repeats {
        value: NonZeroU64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeUnit {
    #[default]
    Seconds,
}

/// Typed comparison value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl PatternTree {
    pub fn new(root: ObservationNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &ObservationNode {
        &self.root
    }

    /// Every comparison in the tree, in source order
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        let mut observations: Vec<&ObservationNode> = vec![&self.root];
        while let Some(node) = observations.pop() {
            match node {
                ObservationNode::Observation(o) => {
                    let mut comparisons: Vec<&ComparisonNode> =
                        o.expressions.iter().rev().collect();
                    while let Some(c) = comparisons.pop() {
                        match c {
                            ComparisonNode::Comparison(c) => out.push(c),
                            ComparisonNode::Expression(e) => {
                                comparisons.extend(e.expressions.iter().rev())
                            }
                        }
                    }
                }
                ObservationNode::Expression(e) => observations.extend(e.expressions.iter().rev()),
            }
        }
        out
    }

    /// Union of the object types of every observation
    pub fn object_types(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        let mut stack: Vec<&ObservationNode> = vec![&self.root];
        while let Some(node) = stack.pop() {
            match node {
                ObservationNode::Observation(o) => out.extend(o.objects.iter().map(String::as_str)),
                ObservationNode::Expression(e) => stack.extend(e.expressions.iter()),
            }
        }
        out
    }

    /// Every qualifier in the tree, visiting a node's own qualifiers before
    /// its children
    pub fn qualifiers(&self) -> Vec<&Qualifier> {
        let mut out = Vec::new();
        let mut stack: Vec<&ObservationNode> = vec![&self.root];
        while let Some(node) = stack.pop() {
            out.extend(node.qualifiers());
            if let ObservationNode::Expression(e) = node {
                stack.extend(e.expressions.iter().rev());
            }
        }
        out
    }
}

impl ObservationNode {
    pub fn qualifiers(&self) -> &[Qualifier] {
        match self {
            ObservationNode::Observation(o) => &o.qualifiers,
            ObservationNode::Expression(e) => &e.qualifiers,
        }
    }

    pub(crate) fn with_qualifiers(self, qualifiers: Vec<Qualifier>) -> Self {
        match self {
            ObservationNode::Observation(mut o) => {
                o.qualifiers.extend(qualifiers);
                ObservationNode::Observation(o)
            }
            ObservationNode::Expression(mut e) => {
                e.qualifiers.extend(qualifiers);
                ObservationNode::Expression(e)
            }
        }
    }
}

impl Observation {
    /// Builds an observation, deriving `objects` from the comparison subtree.
    ///
    /// `join` must be present exactly when there is more than one expression.
    pub fn new(
        join: Option<ComparisonJoin>,
        qualifiers: Vec<Qualifier>,
        expressions: Vec<ComparisonNode>,
    ) -> Result<Self, StructuralError> {
        match (join, expressions.len()) {
            (_, 0) => {
                return Err(StructuralError::EmptyExpressions {
                    node: "observation",
                })
            }
            (None, n) if n > 1 => return Err(StructuralError::MissingJoin { found: n }),
            (Some(join), 1) => {
                return Err(StructuralError::SuperfluousJoin {
                    join: join.as_str(),
                })
            }
            _ => {}
        }

        let objects = expressions.iter().flat_map(derive_objects).collect();

        Ok(Self {
            objects,
            join,
            qualifiers,
            expressions,
        })
    }

    pub fn objects(&self) -> &BTreeSet<String> {
        &self.objects
    }

    pub fn join(&self) -> Option<ComparisonJoin> {
        self.join
    }

    pub fn qualifiers(&self) -> &[Qualifier] {
        &self.qualifiers
    }

    pub fn expressions(&self) -> &[ComparisonNode] {
        &self.expressions
    }
}

/// Object types referenced anywhere beneath a comparison node
pub fn derive_objects(node: &ComparisonNode) -> BTreeSet<String> {
    node.collapse_frames(|frame| match frame {
        ComparisonFrame::Comparison(c) => BTreeSet::from([c.object.clone()]),
        ComparisonFrame::Expression(_, children) => children.into_iter().flatten().collect(),
    })
}

impl ObservationExpression {
    pub fn new(
        join: ObservationJoin,
        qualifiers: Vec<Qualifier>,
        expressions: Vec<ObservationNode>,
    ) -> Result<Self, StructuralError> {
        if expressions.len() < 2 {
            return Err(StructuralError::JoinArity {
                node: "observation expression",
                join: join.as_str(),
                found: expressions.len(),
            });
        }
        Ok(Self {
            join,
            qualifiers,
            expressions,
        })
    }

    pub fn join(&self) -> ObservationJoin {
        self.join
    }

    pub fn qualifiers(&self) -> &[Qualifier] {
        &self.qualifiers
    }

    pub fn expressions(&self) -> &[ObservationNode] {
        &self.expressions
    }
}

impl Comparison {
    pub fn new(
        object: impl Into<String>,
        path: Vec<PathComponent>,
        negated: Option<bool>,
        operator: impl Into<String>,
        value: Literal,
    ) -> Result<Self, StructuralError> {
        if path.is_empty() {
            return Err(StructuralError::EmptyPath);
        }
        Ok(Self {
            object: object.into(),
            path,
            negated,
            operator: operator.into(),
            value,
        })
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn path(&self) -> &[PathComponent] {
        &self.path
    }

    pub fn negated(&self) -> Option<bool> {
        self.negated
    }

    /// Absent `negated` means not negated
    pub fn is_negated(&self) -> bool {
        self.negated.unwrap_or(false)
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn value(&self) -> &Literal {
        &self.value
    }
}

impl ComparisonExpression {
    pub fn new(
        join: ComparisonJoin,
        expressions: Vec<ComparisonNode>,
    ) -> Result<Self, StructuralError> {
        if expressions.len() < 2 {
            return Err(StructuralError::JoinArity {
                node: "comparison expression",
                join: join.as_str(),
                found: expressions.len(),
            });
        }
        Ok(Self { join, expressions })
    }

    pub fn join(&self) -> ComparisonJoin {
        self.join
    }

    pub fn expressions(&self) -> &[ComparisonNode] {
        &self.expressions
    }

    pub(crate) fn into_parts(self) -> (ComparisonJoin, Vec<ComparisonNode>) {
        (self.join, self.expressions)
    }
}

impl ObservationJoin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationJoin::And => "AND",
            ObservationJoin::Or => "OR",
            ObservationJoin::FollowedBy => "FOLLOWEDBY",
        }
    }
}

impl ComparisonJoin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonJoin::And => "AND",
            ComparisonJoin::Or => "OR",
        }
    }
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "SECONDS",
        }
    }
}

impl Display for ObservationJoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for ComparisonJoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// [stop], [start:stop] or [start:stop:step]; absent parts are left blank
impl Display for IndexStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn opt(x: Option<i64>) -> String {
            x.map(|x| x.to_string()).unwrap_or_default()
        }
        let stop = match self.stop {
            Some(Stop::Index(i)) => i.to_string(),
            Some(Stop::Wildcard) => "*".to_string(),
            None => String::new(),
        };
        match (self.start, self.step) {
            (None, None) => write!(f, "[{}]", stop),
            (start, None) => write!(f, "[{}:{}]", opt(start), stop),
            (start, step) => write!(f, "[{}:{}:{}]", opt(start), stop, opt(step)),
        }
    }
}

impl Display for PathComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathComponent::Property(p) => write!(f, "{}", p),
            PathComponent::Index(i) => write!(f, "{}", i),
        }
    }
}
