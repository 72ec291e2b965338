use itertools::Itertools;
use recursion::CollapsibleExt;

use super::scalar::{render_literal, render_str, render_timestamp};
use crate::error::EncodingError;
use crate::tree::frame::{ComparisonFrame, ObservationFrame};
use crate::tree::{
    Comparison, ComparisonNode, Observation, PathComponent, PatternTree, Qualifier,
};

/// A field value: either fits after `key: ` or is a block under `key:`
enum Value {
    Inline(String),
    Block(Vec<String>),
}

impl Value {
    fn blank() -> Self {
        Value::Inline(String::new())
    }
}

/// Encode a tree as canonical text. Deterministic; two-space indentation,
/// every field present, trailing newline.
pub fn encode(tree: &PatternTree) -> Result<String, EncodingError> {
    let root = tree
        .root()
        .collapse_frames(|frame| -> Result<Vec<String>, EncodingError> {
            match frame {
                ObservationFrame::Observation(o) => observation(o),
                ObservationFrame::Expression(e, children) => {
                    let children = children.into_iter().collect::<Result<Vec<_>, _>>()?;
                    Ok(variant(
                        "expression",
                        vec![
                            ("join", Value::Inline(e.join().to_string())),
                            ("qualifiers", qualifiers(e.qualifiers())),
                            ("expressions", Value::Block(sequence(children))),
                        ],
                    ))
                }
            }
        })?;

    let mut lines = vec!["pattern:".to_string()];
    lines.extend(indent(root, 2));
    Ok(lines.into_iter().map(|l| l + "\n").collect())
}

fn observation(o: &Observation) -> Result<Vec<String>, EncodingError> {
    let objects = if o.objects().len() == 1 {
        Value::Inline(format!(
            "{{{}}}",
            o.objects().iter().map(|s| render_str(s)).join(", ")
        ))
    } else {
        Value::Block(o.objects().iter().map(|s| format!("? {}", render_str(s))).collect())
    };

    let expressions = o
        .expressions()
        .iter()
        .map(comparison_node)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(variant(
        "observation",
        vec![
            ("objects", objects),
            (
                "join",
                o.join()
                    .map(|j| Value::Inline(j.to_string()))
                    .unwrap_or_else(Value::blank),
            ),
            ("qualifiers", qualifiers(o.qualifiers())),
            ("expressions", Value::Block(sequence(expressions))),
        ],
    ))
}

fn comparison_node(node: &ComparisonNode) -> Result<Vec<String>, EncodingError> {
    node.collapse_frames(|frame| -> Result<Vec<String>, EncodingError> {
        match frame {
            ComparisonFrame::Comparison(c) => comparison(c),
            ComparisonFrame::Expression(join, children) => {
                let children = children.into_iter().collect::<Result<Vec<_>, _>>()?;
                Ok(variant(
                    "expression",
                    vec![
                        ("join", Value::Inline(join.to_string())),
                        ("expressions", Value::Block(sequence(children))),
                    ],
                ))
            }
        }
    })
}

fn comparison(c: &Comparison) -> Result<Vec<String>, EncodingError> {
    let path = match c.path() {
        [single] => Value::Inline(format!("[{}]", path_component(single))),
        components => Value::Block(
            components
                .iter()
                .map(|p| format!("- {}", path_component(p)))
                .collect(),
        ),
    };

    Ok(variant(
        "comparison",
        vec![
            ("object", Value::Inline(render_str(c.object()))),
            ("path", path),
            (
                "negated",
                c.negated()
                    .map(|n| Value::Inline(n.to_string()))
                    .unwrap_or_else(Value::blank),
            ),
            ("operator", Value::Inline(render_str(c.operator()))),
            ("value", Value::Inline(render_literal(c.value())?)),
        ],
    ))
}

fn path_component(p: &PathComponent) -> String {
    match p {
        PathComponent::Property(name) => render_str(name),
        PathComponent::Index(step) => step.to_string(),
    }
}

fn qualifiers(qualifiers: &[Qualifier]) -> Value {
    if qualifiers.is_empty() {
        return Value::blank();
    }

    let items = qualifiers
        .iter()
        .map(|q| match q {
            Qualifier::StartStop { start, stop } => variant(
                "start_stop",
                vec![
                    ("start", Value::Inline(render_timestamp(start))),
                    ("stop", Value::Inline(render_timestamp(stop))),
                ],
            ),
            Qualifier::Within { value, unit } => variant(
                "within",
                vec![
                    ("value", Value::Inline(value.to_string())),
                    ("unit", Value::Inline(unit.to_string())),
                ],
            ),
            Qualifier::Repeats { value } => {
                variant("repeats", vec![("value", Value::Inline(value.to_string()))])
            }
        })
        .collect();

    Value::Block(sequence(items))
}

/// Single-key mapping naming the variant, with its fields beneath
fn variant(name: &str, fields: Vec<(&str, Value)>) -> Vec<String> {
    let mut lines = vec![format!("{}:", name)];
    for (key, value) in fields {
        match value {
            Value::Inline(s) if s.is_empty() => lines.push(format!("  {}:", key)),
            Value::Inline(s) => lines.push(format!("  {}: {}", key, s)),
            Value::Block(block) => {
                lines.push(format!("  {}:", key));
                lines.extend(indent(block, 4));
            }
        }
    }
    lines
}

/// Block sequence; a mapping item starts on its dash line
fn sequence(items: Vec<Vec<String>>) -> Vec<String> {
    items
        .into_iter()
        .flat_map(|item| {
            item.into_iter()
                .enumerate()
                .map(|(i, line)| {
                    if i == 0 {
                        format!("- {}", line)
                    } else {
                        format!("  {}", line)
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn indent(lines: Vec<String>, by: usize) -> impl Iterator<Item = String> {
    let pad = " ".repeat(by);
    lines.into_iter().map(move |l| format!("{}{}", pad, l))
}
