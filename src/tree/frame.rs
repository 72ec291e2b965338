use recursion::{Collapsible, MappableFrame, PartiallyApplied};

use super::{
    Comparison, ComparisonJoin, ComparisonNode, Observation, ObservationExpression,
    ObservationNode,
};

/// short-lived single layer of a borrowed comparison subtree
pub enum ComparisonFrame<'a, X> {
    Comparison(&'a Comparison),
    Expression(ComparisonJoin, Vec<X>),
}

impl<'a> MappableFrame for ComparisonFrame<'a, PartiallyApplied> {
    type Frame<X> = ComparisonFrame<'a, X>;

    fn map_frame<A, B>(input: Self::Frame<A>, f: impl FnMut(A) -> B) -> Self::Frame<B> {
        use ComparisonFrame::*;
        match input {
            Comparison(c) => Comparison(c),
            Expression(join, xs) => Expression(join, xs.into_iter().map(f).collect()),
        }
    }
}

impl<'a> Collapsible for &'a ComparisonNode {
    type FrameToken = ComparisonFrame<'a, PartiallyApplied>;

    fn into_frame(self) -> ComparisonFrame<'a, Self> {
        match self {
            ComparisonNode::Comparison(c) => ComparisonFrame::Comparison(c),
            ComparisonNode::Expression(e) => {
                ComparisonFrame::Expression(e.join, e.expressions.iter().collect())
            }
        }
    }
}

/// short-lived single layer of a borrowed observation subtree. Observations
/// are leaves here; their comparisons are folded separately.
pub enum ObservationFrame<'a, X> {
    Observation(&'a Observation),
    Expression(&'a ObservationExpression, Vec<X>),
}

impl<'a> MappableFrame for ObservationFrame<'a, PartiallyApplied> {
    type Frame<X> = ObservationFrame<'a, X>;

    fn map_frame<A, B>(input: Self::Frame<A>, f: impl FnMut(A) -> B) -> Self::Frame<B> {
        use ObservationFrame::*;
        match input {
            Observation(o) => Observation(o),
            Expression(e, xs) => Expression(e, xs.into_iter().map(f).collect()),
        }
    }
}

impl<'a> Collapsible for &'a ObservationNode {
    type FrameToken = ObservationFrame<'a, PartiallyApplied>;

    fn into_frame(self) -> ObservationFrame<'a, Self> {
        match self {
            ObservationNode::Observation(o) => ObservationFrame::Observation(o),
            ObservationNode::Expression(e) => {
                ObservationFrame::Expression(e, e.expressions.iter().collect())
            }
        }
    }
}
