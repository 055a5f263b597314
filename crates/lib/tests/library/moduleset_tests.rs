//! Loading moduleset files and planning from them.

use std::path::Path;

use tempfile::TempDir;

use jhb_lib::module::ModuleKind;
use jhb_lib::{ConfigError, RegistryError, load_moduleset};

const NONE: &[&str] = &[];

const DESKTOP: &str = r#"
[modules.zlib]
kind = "tarball"
version = "1.3.1"
url = "https://zlib.net/zlib-1.3.1.tar.gz"
size = 1512791
patches = ["patches/zlib-pkgconfig.patch", { path = "/srv/patches/zlib-cross.patch", strip = 0 }]

[modules.glib]
kind = "vcs"
dependencies = ["zlib"]
revision = "glib-2-80"

[modules.pango]
kind = "vcs"
dependencies = ["glib"]

[modules.gtk]
kind = "vcs"
dependencies = ["glib", "pango"]
checkout_dir = "gtk-4"

[modules.meta-desktop]
kind = "meta"
dependencies = ["gtk"]
"#;

fn write(dir: &Path, content: &str) -> std::path::PathBuf {
  let path = dir.join("desktop.toml");
  std::fs::write(&path, content).unwrap();
  path
}

#[test]
fn loads_every_kind() {
  let temp = TempDir::new().unwrap();
  let path = write(temp.path(), DESKTOP);

  let registry = load_moduleset(&path).unwrap();

  assert_eq!(registry.len(), 5);
  assert_eq!(registry.get("meta-desktop").unwrap().kind, ModuleKind::Meta);
  let ModuleKind::Tarball(zlib) = &registry.get("zlib").unwrap().kind else {
    panic!("zlib should be a tarball");
  };
  assert_eq!(zlib.size, 1512791);
  assert_eq!(zlib.patches.len(), 2);
  assert_eq!(zlib.patches[0].path, temp.path().join("patches/zlib-pkgconfig.patch"));
  assert_eq!(zlib.patches[0].strip, 1);
  assert_eq!(zlib.patches[1].path, Path::new("/srv/patches/zlib-cross.patch"));
  assert_eq!(zlib.patches[1].strip, 0);

  let ModuleKind::Vcs(glib) = &registry.get("glib").unwrap().kind else {
    panic!("glib should be a vcs module");
  };
  assert_eq!(glib.module, "glib");
  assert_eq!(glib.revision.as_deref(), Some("glib-2-80"));
}

#[test]
fn plan_from_meta_module_orders_dependencies_first() {
  let temp = TempDir::new().unwrap();
  let registry = load_moduleset(&write(temp.path(), DESKTOP)).unwrap();

  let plan = registry.expand(&["meta-desktop"], NONE).unwrap();

  assert_eq!(plan.names(), vec!["zlib", "glib", "pango", "gtk", "meta-desktop"]);
}

#[test]
fn skipping_a_module_drops_what_only_it_pulls_in() {
  let temp = TempDir::new().unwrap();
  let registry = load_moduleset(&write(temp.path(), DESKTOP)).unwrap();

  let plan = registry.expand(&["gtk"], &["pango"]).unwrap();
  assert_eq!(plan.names(), vec!["zlib", "glib", "gtk"]);

  let plan = registry.expand(&["gtk"], &["glib"]).unwrap();
  assert_eq!(plan.names(), vec!["pango", "gtk"]);
}

#[test]
fn cycle_in_file_is_reported_on_expansion() {
  let temp = TempDir::new().unwrap();
  let path = write(
    temp.path(),
    r#"
[modules.a]
kind = "meta"
dependencies = ["b"]

[modules.b]
kind = "meta"
dependencies = ["a"]
"#,
  );
  let registry = load_moduleset(&path).unwrap();

  let err = registry.expand(&["a"], NONE).unwrap_err();

  assert_eq!(
    err,
    RegistryError::DependencyCycle {
      cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()]
    }
  );
}

#[test]
fn dangling_dependency_is_reported_on_expansion() {
  let temp = TempDir::new().unwrap();
  let path = write(
    temp.path(),
    r#"
[modules.gtk]
kind = "vcs"
dependencies = ["glib"]
"#,
  );
  let registry = load_moduleset(&path).unwrap();

  let err = registry.expand(&["gtk"], NONE).unwrap_err();

  assert_eq!(err.to_string(), "unknown module 'glib' (required by 'gtk')");
}

#[test]
fn invalid_entries_are_rejected() {
  let temp = TempDir::new().unwrap();
  let cases = [
    (
      "[modules.zlib]\nkind = \"tarball\"\nversion = \"1\"\nurl = \"\"\nsize = 1\n",
      "url is empty",
    ),
    (
      "[modules.zlib]\nkind = \"tarball\"\nversion = \"1\"\nurl = \"https://x/z.tgz\"\nsize = 1\nsha256 = \"abc\"\n",
      "sha256",
    ),
    ("[modules.a]\nkind = \"meta\"\ndependencies = [\"a\"]\n", "itself"),
  ];

  for (content, needle) in cases {
    let err = load_moduleset(&write(temp.path(), content)).unwrap_err();
    assert!(
      matches!(&err, ConfigError::InvalidModule { message, .. } if message.contains(needle)),
      "expected {:?} for {:?}, got {}",
      needle,
      content,
      err
    );
  }
}

#[test]
fn unknown_kind_is_a_parse_error() {
  let temp = TempDir::new().unwrap();
  let path = write(temp.path(), "[modules.a]\nkind = \"svn\"\n");

  assert!(matches!(load_moduleset(&path), Err(ConfigError::Parse { .. })));
}

#[test]
fn missing_file_is_a_read_error() {
  let temp = TempDir::new().unwrap();

  assert!(matches!(
    load_moduleset(&temp.path().join("absent.toml")),
    Err(ConfigError::Read { .. })
  ));
}
