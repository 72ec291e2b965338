use std::process::{Command, Output};

use tempdir::TempDir;

const CANONICAL: &str = "\
pattern:
  observation:
    objects: {ipv4-addr}
    join:
    qualifiers:
    expressions:
      - comparison:
          object: ipv4-addr
          path: [value]
          negated:
          operator: '='
          value: 1.2.3.4
";

fn stixtree(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stixtree"))
        .args(args)
        .output()
        .expect("failed to execute stixtree")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_parse_prints_canonical_text() {
    let output = stixtree(&["parse", "[ipv4-addr:value = '1.2.3.4']"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), CANONICAL);
}

#[test]
fn test_parse_reports_syntax_errors() {
    let output = stixtree(&["parse", "[ipv4-addr:value = ]"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("stixtree::syntax"), "stderr was: {}", stderr);
}

#[test]
fn test_objects() {
    let output = stixtree(&[
        "objects",
        "[ipv6-addr:value = '::1'] FOLLOWEDBY [domain-name:value = 'example.com' OR ipv4-addr:value = '1.2.3.4']",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "domain-name\nipv4-addr\nipv6-addr\n");
}

#[test]
fn test_max_depth_flag() {
    let output = stixtree(&["--max-depth", "1", "parse", "([a:x = 1])"]);
    assert!(!output.status.success());
}

#[test]
fn test_check() {
    let tmp_dir = TempDir::new("stixtree-check").unwrap();
    let good = tmp_dir.path().join("good.yaml");
    let bad = tmp_dir.path().join("bad.yaml");
    std::fs::write(&good, CANONICAL).unwrap();
    std::fs::write(&bad, CANONICAL.replace("{ipv4-addr}", "{ipv6-addr}")).unwrap();

    let output = stixtree(&["check", good.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("ok (1 comparisons)"));

    let output = stixtree(&["check", bad.to_str().unwrap()]);
    assert!(!output.status.success());

    let missing = tmp_dir.path().join("missing.yaml");
    let output = stixtree(&["check", missing.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_fmt_rewrites_and_checks() {
    let tmp_dir = TempDir::new("stixtree-fmt").unwrap();
    let file = tmp_dir.path().join("pattern.yaml");
    let path = file.to_str().unwrap();

    // same tree, hand-written layout
    let loose = "\
pattern:
  observation:
    objects:
    - ipv4-addr
    expressions:
    - comparison:
        object: ipv4-addr
        path:
        - value
        operator: '='
        value: '1.2.3.4'
";
    std::fs::write(&file, loose).unwrap();

    let output = stixtree(&["fmt", "--check", path]);
    assert!(!output.status.success());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), loose);

    let output = stixtree(&["fmt", path]);
    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), CANONICAL);

    let output = stixtree(&["fmt", "--check", path]);
    assert!(output.status.success());
}
