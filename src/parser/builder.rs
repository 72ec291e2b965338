use std::num::NonZeroU64;

use pest::{
    iterators::{Pair, Pairs},
    pratt_parser::{Assoc::*, Op, PrattParser},
};
use slog::{debug, Logger};

use super::raw::Rule;
use crate::error::{PatternError, StructuralError};
use crate::literal::{decode_index, decode_literal, decode_string, decode_timestamp, TokenKind};
use crate::tree::{
    Comparison, ComparisonExpression, ComparisonJoin, ComparisonNode, Observation,
    ObservationExpression, ObservationJoin, ObservationNode, PathComponent, PatternTree,
    Qualifier, TimeUnit,
};

/// A node that can absorb a run of identical joins into one n-ary expression
trait Chainable: Sized {
    type Join: Copy + PartialEq;

    fn chain(join: Self::Join, items: Vec<Self>) -> Result<Self, StructuralError>;
}

impl Chainable for ObservationNode {
    type Join = ObservationJoin;

    fn chain(join: ObservationJoin, items: Vec<Self>) -> Result<Self, StructuralError> {
        ObservationExpression::new(join, vec![], items).map(ObservationNode::Expression)
    }
}

impl Chainable for ComparisonNode {
    type Join = ComparisonJoin;

    fn chain(join: ComparisonJoin, items: Vec<Self>) -> Result<Self, StructuralError> {
        ComparisonExpression::new(join, items).map(ComparisonNode::Expression)
    }
}

/// Intermediate result of a Pratt fold. A chain stays open so that a
/// following identical join extends it instead of nesting; anything that
/// came from parentheses is already a closed node.
enum Operand<T: Chainable> {
    Node(T),
    Chain(T::Join, Vec<T>),
}

impl<T: Chainable> Operand<T> {
    fn finish(self) -> Result<T, StructuralError> {
        match self {
            Operand::Node(n) => Ok(n),
            Operand::Chain(join, items) => T::chain(join, items),
        }
    }

    fn extend(self, join: T::Join, rhs: Self) -> Result<Self, StructuralError> {
        let mut items = match self {
            Operand::Chain(j, items) if j == join => items,
            other => vec![other.finish()?],
        };
        items.push(rhs.finish()?);
        Ok(Operand::Chain(join, items))
    }
}

/// Walks the `pattern` node produced by the grammar into a pattern tree
pub fn build(logger: &Logger, pattern: Pair<'_, Rule>) -> Result<PatternTree, PatternError> {
    debug!(logger, "building pattern tree"; "input" => pattern.as_str());

    let expressions = pattern
        .into_inner()
        .find(|p| p.as_rule() == Rule::observation_expressions)
        .ok_or_else(|| StructuralError::internal("Grammar guarantees pattern has expressions"))?;

    let root = Builder { logger }
        .observation_expressions(expressions.into_inner())?
        .finish()?;

    Ok(PatternTree::new(root))
}

struct Builder<'l> {
    logger: &'l Logger,
}

impl Builder<'_> {
    fn observation_expressions(
        &self,
        pairs: Pairs<'_, Rule>,
    ) -> Result<Operand<ObservationNode>, PatternError> {
        // later ops bind tighter
        let pratt = PrattParser::new()
            .op(Op::infix(Rule::followedby, Left))
            .op(Op::infix(Rule::obs_or, Left))
            .op(Op::infix(Rule::obs_and, Left))
            .op(Op::postfix(Rule::start_stop_qualifier)
                | Op::postfix(Rule::within_qualifier)
                | Op::postfix(Rule::repeats_qualifier));

        pratt
            .map_primary(|pair| self.observation_primary(pair))
            .map_infix(|lhs, op, rhs| {
                let join = match op.as_rule() {
                    Rule::followedby => ObservationJoin::FollowedBy,
                    Rule::obs_or => ObservationJoin::Or,
                    Rule::obs_and => ObservationJoin::And,
                    rule => {
                        return Err(StructuralError::internal(format!(
                            "Unexpected observation infix rule: {:?}",
                            rule
                        ))
                        .into())
                    }
                };
                Ok(lhs?.extend(join, rhs?)?)
            })
            .map_postfix(|lhs, op| {
                let qualifier = self.qualifier(op)?;
                Ok(Operand::Node(lhs?.finish()?.with_qualifiers(vec![qualifier])))
            })
            .parse(pairs)
    }

    fn observation_primary(
        &self,
        pair: Pair<'_, Rule>,
    ) -> Result<Operand<ObservationNode>, PatternError> {
        match pair.as_rule() {
            Rule::observation => {
                let inner = first_inner(pair, "observation")?;
                let root = self.comparison_expression(inner.into_inner())?;
                let (join, expressions) = match root {
                    Operand::Chain(join, items) => (Some(join), items),
                    // a bracket holding one parenthesized expression is the same
                    // observation as the unparenthesized one
                    Operand::Node(ComparisonNode::Expression(e)) => {
                        let (join, items) = e.into_parts();
                        (Some(join), items)
                    }
                    Operand::Node(c) => (None, vec![c]),
                };
                let observation = Observation::new(join, vec![], expressions)?;
                debug!(self.logger, "observation built";
                    "objects" => observation.objects().len(),
                    "expressions" => observation.expressions().len());
                Ok(Operand::Node(ObservationNode::Observation(observation)))
            }
            Rule::observation_group => {
                let inner = first_inner(pair, "observation group")?;
                let node = self.observation_expressions(inner.into_inner())?.finish()?;
                Ok(Operand::Node(node))
            }
            rule => Err(StructuralError::internal(format!(
                "Unexpected observation primary rule: {:?}",
                rule
            ))
            .into()),
        }
    }

    fn comparison_expression(
        &self,
        pairs: Pairs<'_, Rule>,
    ) -> Result<Operand<ComparisonNode>, PatternError> {
        let pratt = PrattParser::new()
            .op(Op::infix(Rule::cmp_or, Left))
            .op(Op::infix(Rule::cmp_and, Left));

        pratt
            .map_primary(|pair| match pair.as_rule() {
                Rule::comparison => Ok(Operand::Node(ComparisonNode::Comparison(
                    self.comparison(pair)?,
                ))),
                Rule::comparison_group => {
                    let inner = first_inner(pair, "comparison group")?;
                    let node = self.comparison_expression(inner.into_inner())?.finish()?;
                    Ok(Operand::Node(node))
                }
                rule => Err(StructuralError::internal(format!(
                    "Unexpected comparison primary rule: {:?}",
                    rule
                ))
                .into()),
            })
            .map_infix(|lhs, op, rhs| {
                let join = match op.as_rule() {
                    Rule::cmp_or => ComparisonJoin::Or,
                    Rule::cmp_and => ComparisonJoin::And,
                    rule => {
                        return Err(StructuralError::internal(format!(
                            "Unexpected comparison infix rule: {:?}",
                            rule
                        ))
                        .into())
                    }
                };
                Ok(lhs?.extend(join, rhs?)?)
            })
            .parse(pairs)
    }

    fn comparison(&self, pair: Pair<'_, Rule>) -> Result<Comparison, PatternError> {
        let mut inner = pair.into_inner();

        let path_pair = inner
            .next()
            .ok_or_else(|| StructuralError::internal("Grammar guarantees comparison has path"))?;
        let (object, path) = object_path(path_pair)?;

        let mut negated = None;
        let mut operator_pair = inner
            .next()
            .ok_or_else(|| StructuralError::internal("Grammar guarantees comparison has operator"))?;
        if operator_pair.as_rule() == Rule::negation {
            negated = Some(true);
            operator_pair = inner.next().ok_or_else(|| {
                StructuralError::internal("Grammar guarantees comparison has operator")
            })?;
        }
        let operator = normalize_operator(operator_pair.as_str());

        let value_pair = inner
            .next()
            .ok_or_else(|| StructuralError::internal("Grammar guarantees comparison has value"))?;
        let value = decode_literal(token_kind(&value_pair)?, value_pair.as_str())?;

        Ok(Comparison::new(object, path, negated, operator, value)?)
    }

    fn qualifier(&self, pair: Pair<'_, Rule>) -> Result<Qualifier, PatternError> {
        let rule = pair.as_rule();
        let mut values = pair
            .into_inner()
            .filter(|p| matches!(p.as_rule(), Rule::timestamp_literal | Rule::int_literal));
        let mut next = |what: &str| {
            values.next().ok_or_else(|| {
                StructuralError::internal(format!("Grammar guarantees qualifier has {}", what))
            })
        };

        let qualifier = match rule {
            Rule::start_stop_qualifier => Qualifier::StartStop {
                start: decode_timestamp(next("start")?.as_str())?,
                stop: decode_timestamp(next("stop")?.as_str())?,
            },
            Rule::within_qualifier => {
                let text = next("value")?.as_str();
                let value = text.parse::<u64>().map_err(|_| {
                    StructuralError::InvalidQualifierValue {
                        qualifier: "WITHIN",
                        value: text.to_string(),
                        reason: "must be a non-negative integer",
                    }
                })?;
                Qualifier::Within {
                    value,
                    unit: TimeUnit::Seconds,
                }
            }
            Rule::repeats_qualifier => {
                let text = next("value")?.as_str();
                let value = text
                    .parse::<u64>()
                    .ok()
                    .and_then(NonZeroU64::new)
                    .ok_or_else(|| StructuralError::InvalidQualifierValue {
                        qualifier: "REPEATS",
                        value: text.to_string(),
                        reason: "must be a positive integer",
                    })?;
                Qualifier::Repeats { value }
            }
            rule => {
                return Err(StructuralError::internal(format!(
                    "Unexpected qualifier rule: {:?}",
                    rule
                ))
                .into())
            }
        };

        debug!(self.logger, "qualifier attached"; "qualifier" => ?qualifier);
        Ok(qualifier)
    }
}

fn first_inner<'i>(pair: Pair<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, StructuralError> {
    pair.into_inner()
        .next()
        .ok_or_else(|| StructuralError::internal(format!("Grammar guarantees {} has content", what)))
}

fn object_path(pair: Pair<'_, Rule>) -> Result<(String, Vec<PathComponent>), PatternError> {
    let mut inner = pair.into_inner();
    let object = inner
        .next()
        .ok_or_else(|| StructuralError::internal("Grammar guarantees path has object type"))?
        .as_str()
        .to_string();

    let path = inner
        .map(|step| match step.as_rule() {
            Rule::identifier => Ok(PathComponent::Property(step.as_str().to_string())),
            Rule::string_literal => Ok(PathComponent::Property(decode_string(step.as_str())?)),
            Rule::index_path_step => Ok(PathComponent::Index(decode_index(step.as_str())?)),
            rule => Err(StructuralError::internal(format!(
                "Unexpected path step rule: {:?}",
                rule
            ))
            .into()),
        })
        .collect::<Result<Vec<_>, PatternError>>()?;

    Ok((object, path))
}

fn token_kind(pair: &Pair<'_, Rule>) -> Result<TokenKind, StructuralError> {
    Ok(match pair.as_rule() {
        Rule::string_literal => TokenKind::String,
        Rule::int_literal | Rule::float_literal => TokenKind::Number,
        Rule::bool_literal => TokenKind::Bool,
        Rule::timestamp_literal => TokenKind::Timestamp,
        Rule::binary_literal => TokenKind::Binary,
        Rule::hex_literal => TokenKind::Hex,
        Rule::set_literal => TokenKind::Set,
        rule => {
            return Err(StructuralError::internal(format!(
                "Unexpected literal rule: {:?}",
                rule
            )))
        }
    })
}

/// Keywords are uppercased; `==` and `<>` collapse into `=` and `!=`
fn normalize_operator(op: &str) -> String {
    match op {
        "==" => "=".to_string(),
        "<>" => "!=".to_string(),
        op => op.to_ascii_uppercase(),
    }
}
