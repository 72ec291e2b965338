use chrono::{TimeZone, Utc};
use stixtree::*;

const FOLLOWEDBY: &str = "\
pattern:
  expression:
    join: FOLLOWEDBY
    qualifiers:
      - within:
          value: 600
          unit: SECONDS
    expressions:
      - observation:
          objects:
            ? ipv4-addr
            ? ipv6-addr
          join: OR
          qualifiers:
          expressions:
            - comparison:
                object: ipv4-addr
                path: [value]
                negated:
                operator: '='
                value: 198.51.100.1/32
            - comparison:
                object: ipv4-addr
                path: [value]
                negated:
                operator: '='
                value: 203.0.113.33/32
            - comparison:
                object: ipv6-addr
                path: [value]
                negated:
                operator: '='
                value: 2001:0db8:dead:beef:dead:beef:dead:0001/128
      - observation:
          objects: {domain-name}
          join:
          qualifiers:
          expressions:
            - comparison:
                object: domain-name
                path: [value]
                negated:
                operator: '='
                value: example.com
";

fn decode_err(text: &str) -> PatternError {
    match decode(text) {
        Ok(tree) => panic!("expected an error, decoded {:?}", tree),
        Err(e) => e,
    }
}

fn structural(text: &str) -> StructuralError {
    match decode_err(text) {
        PatternError::Structural(e) => e,
        other => panic!("expected a structural error, got {:?}", other),
    }
}

/// A single-comparison observation with the given `objects` field and body
fn observation_doc(objects: &str, comparison_fields: &str) -> String {
    format!(
        "\
pattern:
  observation:
    objects: {objects}
    join:
    qualifiers:
    expressions:
      - comparison:
{comparison_fields}"
    )
}

const FILE_NAME: &str = "          object: file
          path: [name]
          negated:
          operator: '='
          value: test.exe
";

// ==============================================================================
// Encoding

#[test]
fn test_encode_followedby_example() {
    let tree = parse_pattern(
        "([ipv4-addr:value = '198.51.100.1/32' OR ipv4-addr:value = '203.0.113.33/32' \
         OR ipv6-addr:value = '2001:0db8:dead:beef:dead:beef:dead:0001/128'] \
         FOLLOWEDBY [domain-name:value = 'example.com']) WITHIN 600 SECONDS",
    )
    .unwrap();
    assert_eq!(encode(&tree).unwrap(), FOLLOWEDBY);
}

#[test]
fn test_encode_paths_and_values() {
    let tree = parse_pattern(
        "[file:extensions.'windows-pebinary-ext'.sections[*].entropy > 7.0 \
         AND email-message:body LIKE '%malicious%']",
    )
    .unwrap();
    assert_eq!(
        encode(&tree).unwrap(),
        "\
pattern:
  observation:
    objects:
      ? email-message
      ? file
    join: AND
    qualifiers:
    expressions:
      - comparison:
          object: file
          path:
            - extensions
            - windows-pebinary-ext
            - sections
            - [*]
            - entropy
          negated:
          operator: '>'
          value: 7.0
      - comparison:
          object: email-message
          path: [body]
          negated:
          operator: LIKE
          value: '%malicious%'
"
    );
}

#[test]
fn test_encode_qualifiers_and_scalars() {
    let tree = parse_pattern(
        "[file:name NOT = '42' AND file:payload = b'aGk='] \
         START t'2017-06-29T00:00:00Z' STOP t'2017-12-05T00:00:00Z' REPEATS 5 TIMES",
    )
    .unwrap();
    assert_eq!(
        encode(&tree).unwrap(),
        "\
pattern:
  observation:
    objects: {file}
    join: AND
    qualifiers:
      - start_stop:
          start: 2017-06-29T00:00:00Z
          stop: 2017-12-05T00:00:00Z
      - repeats:
          value: 5
    expressions:
      - comparison:
          object: file
          path: [name]
          negated: true
          operator: '='
          value: '42'
      - comparison:
          object: file
          path: [payload]
          negated:
          operator: '='
          value: !!binary aGk=
"
    );
}

#[test]
fn test_encode_rejects_non_finite_floats() {
    let comparison = Comparison::new(
        "x",
        vec![PathComponent::Property("y".to_string())],
        None,
        "=",
        Literal::Float(f64::NAN),
    )
    .unwrap();
    let tree = PatternTree::new(ObservationNode::Observation(
        Observation::new(None, vec![], vec![ComparisonNode::Comparison(comparison)]).unwrap(),
    ));
    assert!(matches!(
        encode(&tree),
        Err(EncodingError::NonFiniteFloat { .. })
    ));
}

// ==============================================================================
// Decoding

#[test]
fn test_decode_followedby_example() {
    let tree = decode(FOLLOWEDBY).unwrap();
    assert_eq!(
        tree,
        parse_pattern(
            "([ipv4-addr:value = '198.51.100.1/32' OR ipv4-addr:value = '203.0.113.33/32' \
             OR ipv6-addr:value = '2001:0db8:dead:beef:dead:beef:dead:0001/128'] \
             FOLLOWEDBY [domain-name:value = 'example.com']) WITHIN 600 SECONDS",
        )
        .unwrap()
    );
}

#[test]
fn test_decode_accepts_hand_written_variations() {
    // level sequences, a block path, space-separated timestamps, lower-case
    // joins, comments and a missing `negated`
    let text = "\
# hand written
pattern:
  observation:
    objects:
    - file
    join: and
    qualifiers:
    - start_stop:
        start: 2017-06-29 00:00:00
        stop: 2017-12-05T00:00:00Z
    expressions:
    - comparison:
        object: file
        path:
        - name
        operator: '='
        value: test.exe   # trailing comment
    - comparison:
        object: file
        path: [size]
        operator: '>'
        value: 4096
";
    let tree = decode(text).unwrap();
    assert_eq!(
        tree,
        parse_pattern(
            "[file:name = 'test.exe' AND file:size > 4096] \
             START t'2017-06-29T00:00:00Z' STOP t'2017-12-05T00:00:00Z'"
        )
        .unwrap()
    );
    assert_eq!(
        tree.qualifiers()[0],
        &Qualifier::StartStop {
            start: Utc.with_ymd_and_hms(2017, 6, 29, 0, 0, 0).unwrap(),
            stop: Utc.with_ymd_and_hms(2017, 12, 5, 0, 0, 0).unwrap(),
        }
    );
}

#[test]
fn test_explicit_negated_false_is_preserved() {
    let fields = FILE_NAME.replace("negated:", "negated: false");
    let tree = decode(&observation_doc("{file}", &fields)).unwrap();
    assert_eq!(tree.comparisons()[0].negated(), Some(false));
    assert!(!tree.comparisons()[0].is_negated());

    // and survives another round
    assert_eq!(decode(&encode(&tree).unwrap()).unwrap(), tree);
}

#[test]
fn test_objects_mismatch() {
    let err = structural(&observation_doc("{file, process}", FILE_NAME));
    assert_eq!(
        err,
        StructuralError::ObjectsMismatch {
            declared: vec!["file".to_string(), "process".to_string()],
            derived: vec!["file".to_string()],
        }
    );

    assert!(matches!(
        structural(&observation_doc("{process}", FILE_NAME)),
        StructuralError::ObjectsMismatch { .. }
    ));
    assert_eq!(
        structural(&observation_doc("{file, file}", FILE_NAME)),
        StructuralError::DuplicateObject {
            object: "file".to_string()
        }
    );
}

#[test]
fn test_join_must_agree_with_children() {
    // a join on a single expression
    let text = observation_doc("{file}", FILE_NAME).replace("    join:\n", "    join: AND\n");
    assert_eq!(
        structural(&text),
        StructuralError::SuperfluousJoin { join: "AND" }
    );

    // two expressions, no join
    let text = format!("{}      - comparison:\n{}", observation_doc("{file}", FILE_NAME), FILE_NAME);
    assert_eq!(structural(&text), StructuralError::MissingJoin { found: 2 });

    // observation expression with a single child
    let text = "\
pattern:
  expression:
    join: AND
    qualifiers:
    expressions:
      - observation:
          objects: {file}
          join:
          qualifiers:
          expressions:
            - comparison:
                object: file
                path: [name]
                negated:
                operator: '='
                value: a
";
    assert!(matches!(
        structural(text),
        StructuralError::JoinArity { found: 1, .. }
    ));

    let text = text.replace("    join: AND\n", "    join:\n");
    assert_eq!(
        structural(&text),
        StructuralError::MissingField {
            node: "expression",
            field: "join"
        }
    );

    let text = text.replace("    join:\n", "    join: XOR\n");
    assert!(matches!(structural(&text), StructuralError::UnknownJoin { .. }));
}

#[test]
fn test_qualifier_on_comparison() {
    let fields = format!("{}          qualifiers:\n            - repeats:\n                value: 2\n", FILE_NAME);
    assert_eq!(
        structural(&observation_doc("{file}", &fields)),
        StructuralError::QualifierOnComparison { node: "comparison" }
    );

    // blank is tolerated
    let fields = format!("{}          qualifiers:\n", FILE_NAME);
    assert!(decode(&observation_doc("{file}", &fields)).is_ok());
}

#[test]
fn test_unknown_duplicate_and_missing_fields() {
    let fields = format!("{}          colour: red\n", FILE_NAME);
    assert_eq!(
        structural(&observation_doc("{file}", &fields)),
        StructuralError::UnknownField {
            node: "comparison",
            field: "colour".to_string()
        }
    );

    let fields = format!("{}          value: again\n", FILE_NAME);
    assert_eq!(
        structural(&observation_doc("{file}", &fields)),
        StructuralError::DuplicateField {
            node: "comparison",
            field: "value".to_string()
        }
    );

    let fields = FILE_NAME.replace("          operator: '='\n", "");
    assert_eq!(
        structural(&observation_doc("{file}", &fields)),
        StructuralError::MissingField {
            node: "comparison",
            field: "operator"
        }
    );
}

#[test]
fn test_variants_are_single_key() {
    let text = "\
pattern:
  observation:
    objects: {file}
    expressions:
      - comparison:
          object: file
          path: [name]
          operator: '='
          value: a
  expression:
    join: AND
";
    assert_eq!(
        structural(text),
        StructuralError::NotSingleKey {
            context: "observation node",
            found: 2
        }
    );

    let text = "pattern:\n  observatoin:\n    objects: {file}\n";
    assert!(matches!(
        structural(text),
        StructuralError::UnknownVariant {
            context: "observation node",
            ..
        }
    ));

    assert!(matches!(
        structural("patterns:\n  observation:\n"),
        StructuralError::UnknownVariant {
            context: "document",
            ..
        }
    ));
}

#[test]
fn test_value_resolution() {
    let value = |v: &str| {
        let fields = FILE_NAME.replace("value: test.exe", &format!("value: {}", v));
        let tree = decode(&observation_doc("{file}", &fields)).unwrap();
        tree.comparisons()[0].value().clone()
    };

    assert_eq!(value("'4096'"), Literal::String("4096".to_string()));
    assert_eq!(value("4096"), Literal::Int(4096));
    assert_eq!(value("-1.5"), Literal::Float(-1.5));
    assert_eq!(value("true"), Literal::Bool(true));
    assert_eq!(value("\"a\\tb\""), Literal::String("a\tb".to_string()));
    assert_eq!(value("!!binary aGk="), Literal::Bytes(b"hi".to_vec()));
    assert_eq!(
        value("2016-01-01T00:00:00Z"),
        Literal::Timestamp(Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap())
    );

    let fields = FILE_NAME.replace("value: test.exe", "value: 2016-01-01T00:00:00+02:00");
    assert!(matches!(
        decode_err(&observation_doc("{file}", &fields)),
        PatternError::Literal(LiteralError::NonUtcTimestamp { .. })
    ));
}

#[test]
fn test_index_components() {
    let fields = FILE_NAME.replace(
        "path: [name]",
        "path:\n            - sections\n            - [2:10:2]\n            - name",
    );
    let tree = decode(&observation_doc("{file}", &fields)).unwrap();
    assert_eq!(
        tree.comparisons()[0].path()[1],
        PathComponent::Index(IndexStep {
            start: Some(2),
            stop: Some(Stop::Index(10)),
            step: Some(2),
        })
    );

    let fields = FILE_NAME.replace("path: [name]", "path:\n            - sections\n            - [1:*:2:3]");
    assert!(matches!(
        decode_err(&observation_doc("{file}", &fields)),
        PatternError::Literal(LiteralError::InvalidIndex { .. })
    ));
}

#[test]
fn test_notation_errors_carry_line_numbers() {
    let text = observation_doc("{file}", &FILE_NAME.replace("path: [name]", "path: [name"));
    assert!(matches!(
        structural(&text),
        StructuralError::Syntax { line: 9, .. }
    ));
}

#[test]
fn test_document_depth_is_bounded() {
    let logger = slog::Logger::root(slog::Discard, slog::o!());
    let mut text = String::from("pattern:\n");
    let mut indent = 2;
    for _ in 0..40 {
        let pad = " ".repeat(indent);
        text.push_str(&format!("{pad}expression:\n{pad}  join: AND\n{pad}  expressions:\n{pad}    -\n"));
        indent += 6;
    }
    text.push_str(&format!("{}observation:\n", " ".repeat(indent)));

    assert!(matches!(
        decode_with(&logger, &text, &Config::with_max_depth(8)),
        Err(PatternError::Structural(StructuralError::NestingTooDeep { limit: 8 }))
    ));
}

// ==============================================================================
// Stability

#[test]
fn test_encode_is_idempotent() {
    for pattern in [
        "[ipv4-addr:value = '1.2.3.4']",
        "[email-message:from_ref.value MATCHES '.*']",
        "[file:name = 'test.exe' AND (file:size < 4 OR file:size > 4096)]",
        "[domain-name:value = 'xyz.com'] AND [file:name = 'test.exe'] REPEATS 5 TIMES WITHIN 10 SECONDS",
        "[a:x = 'true'] OR [a:x = '1:2'] OR [a:x = ' padded '] OR [a:x = 'line\\\\break']",
    ] {
        let tree = parse_pattern(pattern).unwrap();
        let once = encode(&tree).unwrap();
        let decoded = decode(&once).unwrap();
        assert_eq!(decoded, tree, "{} did not round trip", pattern);
        assert_eq!(encode(&decoded).unwrap(), once);
    }
}
