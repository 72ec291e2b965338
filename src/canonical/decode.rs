use std::collections::BTreeSet;
use std::num::NonZeroU64;

use slog::{debug, Logger};

use super::document::{Entry, Node, Scalar, ScalarStyle};
use super::scalar::{resolve_literal, resolve_timestamp};
use crate::error::{PatternError, StructuralError};
use crate::literal::decode_index;
use crate::tree::{
    Comparison, ComparisonExpression, ComparisonJoin, ComparisonNode, Observation,
    ObservationExpression, ObservationJoin, ObservationNode, PathComponent, PatternTree,
    Qualifier, TimeUnit,
};

/// Assemble and validate a pattern tree from a read document
pub fn decode_document(logger: &Logger, root: &Node) -> Result<PatternTree, PatternError> {
    let (kind, body) = variant(root, "document")?;
    if kind != "pattern" {
        return Err(StructuralError::UnknownVariant {
            context: "document",
            variant: kind.to_string(),
            expected: "pattern",
        }
        .into());
    }

    let tree = PatternTree::new(Decoder { logger }.observation_node(body)?);
    debug!(logger, "pattern tree decoded"; "comparisons" => tree.comparisons().len());
    Ok(tree)
}

struct Decoder<'l> {
    logger: &'l Logger,
}

impl Decoder<'_> {
    fn observation_node(&self, node: &Node) -> Result<ObservationNode, PatternError> {
        let (kind, body) = variant(node, "observation node")?;
        match kind {
            "observation" => {
                let fields = Fields::new(
                    "observation",
                    body,
                    &["objects", "join", "qualifiers", "expressions"],
                )?;
                let join = fields
                    .join("join")?
                    .map(|j| comparison_join("observation", j))
                    .transpose()?;
                let qualifiers = self.qualifiers(fields.get("qualifiers"))?;
                let expressions = fields
                    .sequence("expressions")?
                    .iter()
                    .map(|n| self.comparison_node(n))
                    .collect::<Result<Vec<_>, _>>()?;
                let declared = declared_objects(fields.required("objects")?)?;

                let observation = Observation::new(join, qualifiers, expressions)?;
                if &declared != observation.objects() {
                    return Err(StructuralError::ObjectsMismatch {
                        declared: declared.into_iter().collect(),
                        derived: observation.objects().iter().cloned().collect(),
                    }
                    .into());
                }
                debug!(self.logger, "observation decoded"; "objects" => observation.objects().len());
                Ok(ObservationNode::Observation(observation))
            }
            "expression" => {
                let fields =
                    Fields::new("expression", body, &["join", "qualifiers", "expressions"])?;
                let join = fields
                    .join("join")?
                    .ok_or(StructuralError::MissingField {
                        node: "expression",
                        field: "join",
                    })?;
                let join = observation_join(join)?;
                let qualifiers = self.qualifiers(fields.get("qualifiers"))?;
                let expressions = fields
                    .sequence("expressions")?
                    .iter()
                    .map(|n| self.observation_node(n))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ObservationNode::Expression(ObservationExpression::new(
                    join,
                    qualifiers,
                    expressions,
                )?))
            }
            other => Err(StructuralError::UnknownVariant {
                context: "observation node",
                variant: other.to_string(),
                expected: "observation, expression",
            }
            .into()),
        }
    }

    fn comparison_node(&self, node: &Node) -> Result<ComparisonNode, PatternError> {
        let (kind, body) = variant(node, "comparison node")?;
        match kind {
            "comparison" => {
                let fields = Fields::new(
                    "comparison",
                    body,
                    &["object", "path", "negated", "operator", "value", "qualifiers"],
                )?;
                reject_qualifiers("comparison", fields.get("qualifiers"))?;

                let object = fields.required_scalar("object")?.text.clone();
                let path = fields
                    .sequence("path")?
                    .iter()
                    .map(path_component)
                    .collect::<Result<Vec<_>, _>>()?;
                let negated = match fields.scalar("negated")? {
                    None => None,
                    Some(s) if s.style == ScalarStyle::Plain && s.text == "true" => Some(true),
                    Some(s) if s.style == ScalarStyle::Plain && s.text == "false" => Some(false),
                    Some(_) => {
                        return Err(StructuralError::UnexpectedShape {
                            node: "comparison",
                            field: "negated",
                            expected: "true, false or blank",
                        }
                        .into())
                    }
                };
                let operator = fields.required_scalar("operator")?.text.clone();
                let value = resolve_literal(fields.required_scalar("value")?)?;

                Ok(ComparisonNode::Comparison(Comparison::new(
                    object, path, negated, operator, value,
                )?))
            }
            "expression" => {
                let fields =
                    Fields::new("expression", body, &["join", "qualifiers", "expressions"])?;
                reject_qualifiers("comparison expression", fields.get("qualifiers"))?;
                let join = fields
                    .join("join")?
                    .ok_or(StructuralError::MissingField {
                        node: "expression",
                        field: "join",
                    })?;
                let join = comparison_join("expression", join)?;
                let expressions = fields
                    .sequence("expressions")?
                    .iter()
                    .map(|n| self.comparison_node(n))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ComparisonNode::Expression(ComparisonExpression::new(
                    join,
                    expressions,
                )?))
            }
            other => Err(StructuralError::UnknownVariant {
                context: "comparison node",
                variant: other.to_string(),
                expected: "comparison, expression",
            }
            .into()),
        }
    }

    fn qualifiers(&self, node: Option<&Node>) -> Result<Vec<Qualifier>, PatternError> {
        let items = match node {
            None => return Ok(vec![]),
            Some(n) if n.is_null() => return Ok(vec![]),
            Some(Node::Sequence(items)) => items,
            Some(_) => {
                return Err(StructuralError::UnexpectedShape {
                    node: "observation",
                    field: "qualifiers",
                    expected: "a sequence of qualifiers or blank",
                }
                .into())
            }
        };

        items.iter().map(qualifier).collect()
    }
}

fn qualifier(node: &Node) -> Result<Qualifier, PatternError> {
    let (kind, body) = variant(node, "qualifier")?;
    match kind {
        "start_stop" => {
            let fields = Fields::new("start_stop", body, &["start", "stop"])?;
            Ok(Qualifier::StartStop {
                start: resolve_timestamp(fields.required_scalar("start")?)?,
                stop: resolve_timestamp(fields.required_scalar("stop")?)?,
            })
        }
        "within" => {
            let fields = Fields::new("within", body, &["value", "unit"])?;
            let text = &fields.required_scalar("value")?.text;
            let value = text
                .parse::<u64>()
                .map_err(|_| StructuralError::InvalidQualifierValue {
                    qualifier: "WITHIN",
                    value: text.clone(),
                    reason: "must be a non-negative integer",
                })?;
            let unit = match fields.scalar("unit")? {
                None => TimeUnit::Seconds,
                Some(s) if s.text.eq_ignore_ascii_case("seconds") => TimeUnit::Seconds,
                Some(s) => {
                    return Err(StructuralError::UnknownUnit {
                        unit: s.text.clone(),
                    }
                    .into())
                }
            };
            Ok(Qualifier::Within { value, unit })
        }
        "repeats" => {
            let fields = Fields::new("repeats", body, &["value"])?;
            let text = &fields.required_scalar("value")?.text;
            let value = text
                .parse::<u64>()
                .ok()
                .and_then(NonZeroU64::new)
                .ok_or_else(|| StructuralError::InvalidQualifierValue {
                    qualifier: "REPEATS",
                    value: text.clone(),
                    reason: "must be a positive integer",
                })?;
            Ok(Qualifier::Repeats { value })
        }
        other => Err(StructuralError::UnknownVariant {
            context: "qualifier",
            variant: other.to_string(),
            expected: "start_stop, within, repeats",
        }
        .into()),
    }
}

fn reject_qualifiers(node: &'static str, qualifiers: Option<&Node>) -> Result<(), StructuralError> {
    match qualifiers {
        None => Ok(()),
        Some(n) if n.is_null() => Ok(()),
        Some(Node::Sequence(items)) if items.is_empty() => Ok(()),
        Some(_) => Err(StructuralError::QualifierOnComparison { node }),
    }
}

/// A property is a scalar; an index is a flow sequence holding its body
fn path_component(node: &Node) -> Result<PathComponent, PatternError> {
    match node {
        Node::Scalar(s) => Ok(PathComponent::Property(s.text.clone())),
        Node::Sequence(items) => match items.as_slice() {
            [] => Ok(PathComponent::Index(decode_index("")?)),
            [Node::Scalar(s)] if s.style == ScalarStyle::Plain => {
                Ok(PathComponent::Index(decode_index(&s.text)?))
            }
            _ => Err(StructuralError::UnexpectedShape {
                node: "comparison",
                field: "path",
                expected: "property names and [index] components",
            }
            .into()),
        },
        _ => Err(StructuralError::UnexpectedShape {
            node: "comparison",
            field: "path",
            expected: "property names and [index] components",
        }
        .into()),
    }
}

fn declared_objects(node: &Node) -> Result<BTreeSet<String>, StructuralError> {
    let members: Vec<&Scalar> = match node {
        Node::Set(members) => members.iter().collect(),
        Node::Sequence(items) => items
            .iter()
            .map(|n| match n {
                Node::Scalar(s) => Ok(s),
                _ => Err(StructuralError::UnexpectedShape {
                    node: "observation",
                    field: "objects",
                    expected: "a set of object type names",
                }),
            })
            .collect::<Result<_, _>>()?,
        _ => {
            return Err(StructuralError::UnexpectedShape {
                node: "observation",
                field: "objects",
                expected: "a set of object type names",
            })
        }
    };

    let mut objects = BTreeSet::new();
    for member in members {
        if !objects.insert(member.text.clone()) {
            return Err(StructuralError::DuplicateObject {
                object: member.text.clone(),
            });
        }
    }
    Ok(objects)
}

fn comparison_join(node: &'static str, join: &str) -> Result<ComparisonJoin, StructuralError> {
    match join.to_ascii_uppercase().as_str() {
        "AND" => Ok(ComparisonJoin::And),
        "OR" => Ok(ComparisonJoin::Or),
        _ => Err(StructuralError::UnknownJoin {
            node,
            join: join.to_string(),
            expected: "AND, OR",
        }),
    }
}

fn observation_join(join: &str) -> Result<ObservationJoin, StructuralError> {
    match join.to_ascii_uppercase().as_str() {
        "AND" => Ok(ObservationJoin::And),
        "OR" => Ok(ObservationJoin::Or),
        "FOLLOWEDBY" => Ok(ObservationJoin::FollowedBy),
        _ => Err(StructuralError::UnknownJoin {
            node: "expression",
            join: join.to_string(),
            expected: "AND, OR, FOLLOWEDBY",
        }),
    }
}

/// The single key of a node mapping and the value under it
fn variant<'a>(node: &'a Node, context: &'static str) -> Result<(&'a str, &'a Node), StructuralError> {
    match node {
        Node::Mapping(entries) => match entries.as_slice() {
            [Entry { key, value }] => Ok((key.as_str(), value)),
            entries => Err(StructuralError::NotSingleKey {
                context,
                found: entries.len(),
            }),
        },
        _ => Err(StructuralError::NotSingleKey { context, found: 0 }),
    }
}

/// Checked view over the fields of one node
struct Fields<'a> {
    node: &'static str,
    entries: &'a [Entry],
}

impl<'a> Fields<'a> {
    fn new(
        node: &'static str,
        body: &'a Node,
        allowed: &[&str],
    ) -> Result<Self, StructuralError> {
        let entries: &[Entry] = match body {
            Node::Mapping(entries) => entries.as_slice(),
            n if n.is_null() => &[],
            _ => {
                return Err(StructuralError::UnexpectedShape {
                    node,
                    field: "body",
                    expected: "a mapping of fields",
                })
            }
        };

        let mut seen = BTreeSet::new();
        for entry in entries {
            if !allowed.contains(&entry.key.as_str()) {
                return Err(StructuralError::UnknownField {
                    node,
                    field: entry.key.clone(),
                });
            }
            if !seen.insert(entry.key.as_str()) {
                return Err(StructuralError::DuplicateField {
                    node,
                    field: entry.key.clone(),
                });
            }
        }

        Ok(Self { node, entries })
    }

    fn get(&self, key: &str) -> Option<&'a Node> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    fn required(&self, key: &'static str) -> Result<&'a Node, StructuralError> {
        self.get(key).ok_or(StructuralError::MissingField {
            node: self.node,
            field: key,
        })
    }

    /// A scalar field; blank and missing are both `None`
    fn scalar(&self, key: &'static str) -> Result<Option<&'a Scalar>, StructuralError> {
        match self.get(key) {
            None => Ok(None),
            Some(n) if n.is_null() => Ok(None),
            Some(Node::Scalar(s)) => Ok(Some(s)),
            Some(_) => Err(StructuralError::UnexpectedShape {
                node: self.node,
                field: key,
                expected: "a scalar",
            }),
        }
    }

    fn required_scalar(&self, key: &'static str) -> Result<&'a Scalar, StructuralError> {
        self.scalar(key)?.ok_or(StructuralError::MissingField {
            node: self.node,
            field: key,
        })
    }

    /// Join keywords are plain scalars
    fn join(&self, key: &'static str) -> Result<Option<&'a str>, StructuralError> {
        Ok(self.scalar(key)?.map(|s| s.text.as_str()))
    }

    fn sequence(&self, key: &'static str) -> Result<&'a [Node], StructuralError> {
        match self.required(key)? {
            Node::Sequence(items) => Ok(items.as_slice()),
            _ => Err(StructuralError::UnexpectedShape {
                node: self.node,
                field: key,
                expected: "a sequence",
            }),
        }
    }
}
