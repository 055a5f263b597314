use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_meta_modules_succeeds() {
  let env = TestEnv::with_moduleset("meta_only.toml");

  env
    .jhb_cmd()
    .args(["build", "--on-error", "abandon"])
    .assert()
    .success()
    .stdout(predicate::str::contains("*** success ***"))
    .stdout(predicate::str::contains("Build complete!"));

  assert!(env.prefix().join("share").join("aclocal").is_dir());
  assert!(env.checkout_root().is_dir());
}

#[test]
fn build_reports_poisoned_modules_and_fails() {
  let env = TestEnv::with_moduleset("broken_app.toml");

  env
    .jhb_cmd()
    .args(["build", "--no-network", "--on-error", "abandon"])
    .assert()
    .failure()
    .code(1)
    .stdout(predicate::str::contains("error during stage configure of app"))
    .stdout(predicate::str::contains(
      "module meta-desktop not built due to non buildable app",
    ))
    .stdout(predicate::str::contains(
      "the following modules were not built: app, meta-desktop",
    ));
}

#[test]
fn build_ask_requires_a_terminal() {
  let env = TestEnv::with_moduleset("meta_only.toml");

  env
    .jhb_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("non-interactive mode"));
}

#[test]
fn build_with_skipped_seed_has_nothing_to_do() {
  let env = TestEnv::with_moduleset("meta_only.toml");

  env
    .jhb_cmd()
    .args(["build", "meta-desktop", "--skip", "meta-desktop", "--on-error", "abandon"])
    .assert()
    .success()
    .stderr(predicate::str::contains("Nothing to build"));
}

#[test]
fn build_unknown_module_fails() {
  let env = TestEnv::with_moduleset("meta_only.toml");

  env
    .jhb_cmd()
    .args(["build", "nautilus", "--on-error", "abandon"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown module 'nautilus'"));
}
