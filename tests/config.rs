use std::fs;
use std::path::PathBuf;

use jvbridge::frontend::config::{self, CONFIG_FILE, ENV_OPTIONS};
use jvbridge::infrastructure::bootstrap;
use jvbridge::{Environment, Overrides};
use parking_lot::Mutex;
use tempfile::TempDir;

/// Serializes tests that touch the process-wide environment
static GLOBAL: Mutex<()> = parking_lot::const_mutex(());

fn no_vars(_: &str) -> Option<String> {
    None
}

#[test]
fn test_discovers_file_in_parent_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE),
        "executable = \"/opt/julia/bin/julia\"\nevaluator_capacity = 32\n",
    )
    .unwrap();
    let nested = dir.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    assert_eq!(
        Environment::discover_from(&nested),
        Some(dir.path().join(CONFIG_FILE))
    );
    let env = Environment::resolve_with(None, &nested, &Overrides::default(), no_vars).unwrap();
    assert_eq!(env.executable, "/opt/julia/bin/julia");
    assert_eq!(env.evaluator_capacity, 32);
}

#[test]
fn test_priority_order() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("custom.toml");
    fs::write(&file, "options = \"--from-file\"\nlog_level = \"warn\"\n").unwrap();

    let vars = |name: &str| (name == ENV_OPTIONS).then(|| "--from-env".to_string());
    let env = Environment::resolve_with(Some(&file), dir.path(), &Overrides::default(), vars).unwrap();
    assert_eq!(env.options, "--from-env");
    assert_eq!(env.log_level, "warn");

    let overrides = Overrides {
        options: Some("--from-override".to_string()),
        ..Overrides::default()
    };
    let env = Environment::resolve_with(Some(&file), dir.path(), &overrides, vars).unwrap();
    assert_eq!(env.options, "--from-override");
}

#[test]
fn test_invalid_files_are_config_errors() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join(CONFIG_FILE);
    fs::write(&file, "evaluator_capacity = 0\n").unwrap();
    let err = Environment::resolve_with(Some(&file), dir.path(), &Overrides::default(), no_vars)
        .unwrap_err();
    assert_eq!(err.kind(), "ConfigError");

    let missing = dir.path().join("absent.toml");
    let err = Environment::resolve_with(Some(&missing), dir.path(), &Overrides::default(), no_vars)
        .unwrap_err();
    assert_eq!(err.kind(), "ConfigError");
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join(CONFIG_FILE);
    let env = Environment {
        sysimage: Some(PathBuf::from("/images/sys.so")),
        ..Environment::default()
    };
    env.save(&file).unwrap();
    assert_eq!(Environment::load(&file).unwrap(), env);
}

#[test]
fn test_reset_rereads_the_environment() {
    let _guard = GLOBAL.lock();
    std::env::set_var(ENV_OPTIONS, "--startup-file=no");
    config::reset();
    assert_eq!(config::current().unwrap().options, "--startup-file=no");

    std::env::set_var(ENV_OPTIONS, "");
    assert_eq!(config::current().unwrap().options, "--startup-file=no");
    config::reset();
    assert_eq!(config::current().unwrap().options, "");
    std::env::remove_var(ENV_OPTIONS);
}

#[test]
fn test_use_sysimage_pins_the_environment() {
    let _guard = GLOBAL.lock();
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("sys.so");
    fs::write(&image, b"image").unwrap();

    config::reset();
    let env = bootstrap::use_sysimage(&image).unwrap();
    let pinned = image.canonicalize().unwrap();
    assert_eq!(env.sysimage.as_deref(), Some(pinned.as_path()));
    assert_eq!(config::current().unwrap().sysimage, Some(pinned));
    config::reset();
}
