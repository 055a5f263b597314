use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

#[test]
fn list_prints_dependency_order() {
  let env = TestEnv::with_moduleset("desktop.toml");

  let output = env.jhb_cmd().args(["list", "meta-desktop"]).output().unwrap();

  assert!(output.status.success());
  let stdout = String::from_utf8(output.stdout).unwrap();
  let names: Vec<&str> = stdout.lines().filter_map(|l| l.split_whitespace().next()).collect();
  assert_eq!(names, vec!["zlib", "glib", "pango", "gtk", "meta-desktop"]);
}

#[test]
fn list_json_output_is_valid() {
  let env = TestEnv::with_moduleset("desktop.toml");

  let output = env
    .jhb_cmd()
    .args(["list", "gtk", "--skip", "pango", "-o", "json"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let names: Vec<&str> = json
    .as_array()
    .unwrap()
    .iter()
    .map(|m| m["name"].as_str().unwrap())
    .collect();
  assert_eq!(names, vec!["zlib", "glib", "gtk"]);
  assert_eq!(json[0]["kind"], "tarball");
}

#[test]
fn moduleset_flag_overrides_config() {
  let env = TestEnv::with_moduleset("desktop.toml");

  env
    .jhb_cmd()
    .arg("--moduleset")
    .arg(fixture_path("meta_only.toml"))
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("meta-base"))
    .stdout(predicate::str::contains("gtk").not());
}

#[test]
fn dot_limits_graph_to_requested_modules() {
  let env = TestEnv::with_moduleset("desktop.toml");

  env
    .jhb_cmd()
    .args(["dot", "glib"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("digraph"))
    .stdout(predicate::str::contains("\"zlib\""))
    .stdout(predicate::str::contains("\"gtk\"").not());
}

#[test]
fn check_passes_on_clean_moduleset() {
  let env = TestEnv::with_moduleset("desktop.toml");

  env
    .jhb_cmd()
    .arg("check")
    .assert()
    .success()
    .stdout(predicate::str::contains("Moduleset OK: 5 modules"));
}

#[test]
fn check_reports_cycles_and_unknown_modules() {
  let env = TestEnv::with_moduleset("cycle.toml");

  env
    .jhb_cmd()
    .arg("check")
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency cycle: a -> b -> a"))
    .stderr(predicate::str::contains("unknown module 'missing' (required by 'c')"));
}

#[test]
fn list_without_moduleset_explains_what_is_missing() {
  let env = TestEnv::empty();

  env
    .jhb_cmd()
    .arg("list")
    .assert()
    .failure()
    .stderr(predicate::str::contains("No moduleset configured"));
}
