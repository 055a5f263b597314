//! End-to-end driver runs against fake collaborators.

use jhb_lib::build::{ModuleStatus, PoisonCause};
use jhb_lib::module::{TarballSource, VcsSource};
use jhb_lib::{BuildState, FixedRecovery, MenuChoice, ModuleDescriptor, ModuleError, ModuleRegistry, ScriptedRecovery};

use super::common::{Event, TestEnv, tarball};

const NONE: &[&str] = &[];

fn two_modules() -> ModuleRegistry {
  [
    ModuleDescriptor::vcs("A", VcsSource::new("a")),
    ModuleDescriptor::vcs("B", VcsSource::new("b")).with_dependencies(["A"]),
  ]
  .into_iter()
  .collect()
}

const FULL_PIPELINE: &[BuildState] = &[
  BuildState::Start,
  BuildState::Checkout,
  BuildState::Configure,
  BuildState::Build,
  BuildState::Install,
  BuildState::Done,
];

mod success {
  use super::*;

  #[tokio::test]
  async fn dependent_modules_build_in_order() {
    let env = TestEnv::new();
    let config = env.config();
    let registry = two_modules();
    let plan = registry.full_plan(NONE).unwrap();
    let mut driver = env.driver(config.clone(), NONE, Box::new(FixedRecovery::Abandon));

    let report = driver.build(&plan).await;

    assert!(report.succeeded());
    for name in ["A", "B"] {
      let outcome = report.outcome(name).unwrap();
      assert_eq!(outcome.states, FULL_PIPELINE, "{}", name);
      assert_eq!(outcome.status, ModuleStatus::Built);
      assert!(outcome.accepted_errors.is_empty());
    }

    let a_dir = config.checkout_root.join("a");
    let b_dir = config.checkout_root.join("b");
    let prefix = config.prefix.display().to_string();
    let commands = env.commands();
    assert_eq!(
      commands,
      vec![
        (format!("./autogen.sh --prefix {}", prefix), a_dir.clone()),
        ("make".to_string(), a_dir.clone()),
        ("make install".to_string(), a_dir),
        (format!("./autogen.sh --prefix {}", prefix), b_dir.clone()),
        ("make".to_string(), b_dir.clone()),
        ("make install".to_string(), b_dir),
      ]
    );
    assert_eq!(env.reports().last().map(String::as_str), Some("success"));
  }

  #[tokio::test]
  async fn checkouts_use_repository_base() {
    let env = TestEnv::new();
    let config = env.config();
    let registry = two_modules();
    let plan = registry.full_plan(NONE).unwrap();
    let mut driver = env.driver(config.clone(), NONE, Box::new(FixedRecovery::Abandon));

    driver.build(&plan).await;

    let checkouts: Vec<_> = env
      .events()
      .into_iter()
      .filter(|event| matches!(event, Event::Checkout { .. }))
      .collect();
    assert_eq!(
      checkouts,
      vec![
        Event::Checkout {
          op: "update",
          dest: config.checkout_root.join("a"),
        },
        Event::Checkout {
          op: "update",
          dest: config.checkout_root.join("b"),
        },
      ]
    );
  }

  #[tokio::test]
  async fn no_network_skips_checkout() {
    let env = TestEnv::new();
    let config = jhb_lib::BuildConfig {
      no_network: true,
      ..env.config()
    };
    let registry = two_modules();
    let plan = registry.expand(&["A"], NONE).unwrap();
    let mut driver = env.driver(config, NONE, Box::new(FixedRecovery::Abandon));

    let report = driver.build(&plan).await;

    assert!(report.succeeded());
    assert_eq!(
      report.outcome("A").unwrap().states,
      [
        BuildState::Start,
        BuildState::Configure,
        BuildState::Build,
        BuildState::Install,
        BuildState::Done
      ]
    );
    assert!(!env.events().iter().any(|e| matches!(e, Event::Checkout { .. })));
  }
}

mod failure {
  use super::*;

  #[tokio::test]
  async fn abandoned_module_poisons_its_dependents() {
    let env = TestEnv::new();
    let config = env.config();
    let registry = two_modules();
    let plan = registry.full_plan(NONE).unwrap();
    let mut driver = env.driver(config.clone(), &["make"], Box::new(FixedRecovery::Abandon));

    let report = driver.build(&plan).await;

    assert!(!report.succeeded());
    assert_eq!(report.poisoned(), vec!["A", "B"]);
    assert!(matches!(
      report.outcome("A").unwrap().status,
      ModuleStatus::Poisoned(PoisonCause::Abandoned {
        state: BuildState::Build,
        error: ModuleError::Compile(_),
      })
    ));
    assert_eq!(
      report.outcome("B").unwrap().status,
      ModuleStatus::Poisoned(PoisonCause::Dependency {
        dependency: "A".to_string()
      })
    );
    assert!(report.outcome("B").unwrap().states.is_empty());

    let b_dir = config.checkout_root.join("b");
    assert!(env.commands().iter().all(|(_, cwd)| cwd != &b_dir));
    assert!(!env.events().iter().any(|e| matches!(e, Event::Checkout { dest, .. } if dest == &b_dir)));

    let reports = env.reports();
    assert!(reports.iter().any(|m| m.starts_with("error during stage build of A")));
    assert!(reports.contains(&"module B not built due to non buildable A".to_string()));
    assert_eq!(
      reports.last().map(String::as_str),
      Some("the following modules were not built: A, B")
    );
  }

  #[tokio::test]
  async fn accepted_compile_error_still_installs() {
    let env = TestEnv::new();
    let registry = two_modules();
    let plan = registry.expand(&["A"], NONE).unwrap();
    let mut driver = env.driver(
      env.config(),
      &["make"],
      Box::new(ScriptedRecovery::new([MenuChoice::Accept])),
    );

    let report = driver.build(&plan).await;

    // `make install` also fails and the script is exhausted by then.
    let outcome = report.outcome("A").unwrap();
    assert_eq!(outcome.accepted_errors.len(), 1);
    assert!(matches!(outcome.accepted_errors[0], ModuleError::Compile(_)));
    assert!(outcome.states.contains(&BuildState::Install));
    assert!(outcome.is_poisoned());
  }

  #[tokio::test]
  async fn continue_policy_builds_everything_despite_errors() {
    let env = TestEnv::new();
    let registry = two_modules();
    let plan = registry.full_plan(NONE).unwrap();
    let mut driver = env.driver(env.config(), &["./autogen.sh"], Box::new(FixedRecovery::Continue));

    let report = driver.build(&plan).await;

    assert!(report.succeeded());
    for name in ["A", "B"] {
      let outcome = report.outcome(name).unwrap();
      assert_eq!(outcome.states, FULL_PIPELINE);
      assert!(matches!(outcome.accepted_errors[..], [ModuleError::Configure(_)]));
    }
  }
}

mod tarballs {
  use super::*;

  const URL: &str = "https://download.example.org/zlib-1.3.tar.gz";

  fn zlib(payload: &[u8]) -> ModuleRegistry {
    [ModuleDescriptor::tarball(
      "zlib",
      TarballSource::new("1.3", URL, payload.len() as u64),
    )]
    .into_iter()
    .collect()
  }

  #[tokio::test]
  async fn archive_is_downloaded_unpacked_and_built() {
    let env = TestEnv::new();
    let config = env.config();
    let archive = tarball("zlib-1.3");
    env.serve(archive.clone());
    let registry = zlib(&archive);
    let plan = registry.full_plan(NONE).unwrap();
    let mut driver = env.driver(config.clone(), NONE, Box::new(FixedRecovery::Abandon));

    let report = driver.build(&plan).await;

    assert!(report.succeeded());
    assert_eq!(
      report.outcome("zlib").unwrap().states,
      [
        BuildState::Start,
        BuildState::Download,
        BuildState::Unpack,
        BuildState::Patch,
        BuildState::Build,
        BuildState::Install,
        BuildState::Done
      ]
    );
    let build_dir = config.checkout_root.join("zlib-1.3");
    assert!(build_dir.join("configure").is_file());
    assert_eq!(
      env.commands(),
      vec![
        ("make".to_string(), build_dir.clone()),
        ("make install".to_string(), build_dir),
      ]
    );
  }

  #[tokio::test]
  async fn no_build_stops_after_patching() {
    let env = TestEnv::new();
    let config = jhb_lib::BuildConfig {
      no_build: true,
      ..env.config()
    };
    let archive = tarball("zlib-1.3");
    env.serve(archive.clone());
    let registry = zlib(&archive);
    let plan = registry.full_plan(NONE).unwrap();
    let mut driver = env.driver(config.clone(), NONE, Box::new(FixedRecovery::Abandon));

    let report = driver.build(&plan).await;

    assert!(report.succeeded());
    assert_eq!(
      report.outcome("zlib").unwrap().states,
      [
        BuildState::Start,
        BuildState::Download,
        BuildState::Unpack,
        BuildState::Patch,
        BuildState::Done
      ]
    );
    assert!(env.commands().is_empty());
    assert!(config.checkout_root.join("zlib-1.3").join("configure").is_file());
  }

  #[tokio::test]
  async fn lenient_archive_failures_continue_to_build() {
    let env = TestEnv::new();
    let registry = zlib(b"abc");
    let plan = registry.full_plan(NONE).unwrap();
    let mut driver = env.driver(env.config(), NONE, Box::new(FixedRecovery::Continue));

    let report = driver.build(&plan).await;

    let outcome = report.outcome("zlib").unwrap();
    assert_eq!(
      outcome.states,
      [
        BuildState::Start,
        BuildState::Download,
        BuildState::Unpack,
        BuildState::Patch,
        BuildState::Build,
        BuildState::Install,
        BuildState::Done
      ]
    );
    assert!(matches!(
      outcome.accepted_errors[..],
      [ModuleError::Fetch(_), ModuleError::Unpack(_)]
    ));
    assert_eq!(
      env
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Download { .. }))
        .count(),
      1
    );
  }
}
