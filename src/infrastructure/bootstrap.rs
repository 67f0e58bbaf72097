//! Launching and locating the external foreign runtime
//!
//! Failures here are startup errors; they never surface as conversion or
//! dispatch errors.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::errors::{BridgeError, BridgeResult};
use crate::frontend::config::{self, Environment};
use crate::infrastructure::logging::{info, log_bootstrap_failure, log_bootstrap_launch};

/// Run `executable` with `args` and capture its stdout
///
/// A non-zero exit yields `Ok(None)`. `suppress_errors` decides whether the
/// process's stderr reaches ours or is discarded. Only a process that
/// cannot be launched at all is an error, and only when not suppressed.
pub fn invoke<S: AsRef<str>>(
    executable: &str,
    args: &[S],
    suppress_errors: bool,
) -> BridgeResult<Option<Vec<u8>>> {
    log_bootstrap_launch(executable, args.len());
    let stderr = if suppress_errors {
        Stdio::null()
    } else {
        Stdio::inherit()
    };
    let output = Command::new(executable)
        .args(args.iter().map(AsRef::as_ref))
        .stdin(Stdio::null())
        .stderr(stderr)
        .output();

    let output = match output {
        Ok(output) => output,
        Err(err) => {
            log_bootstrap_failure(executable, None, suppress_errors);
            if suppress_errors {
                return Ok(None);
            }
            return Err(BridgeError::bootstrap(format!(
                "failed to launch {executable}: {err}"
            )));
        }
    };

    if output.status.success() {
        return Ok(Some(output.stdout));
    }

    log_bootstrap_failure(executable, output.status.code(), suppress_errors);
    Ok(None)
}

/// Launch the runtime named by `env` with its configured options, the
/// pinned image if any, then `args`
pub fn invoke_runtime<S: AsRef<str>>(
    env: &Environment,
    args: &[S],
    suppress_errors: bool,
) -> BridgeResult<Option<Vec<u8>>> {
    invoke(&env.executable, &runtime_args(env, args), suppress_errors)
}

/// Full argument list for a runtime launch
pub fn runtime_args<S: AsRef<str>>(env: &Environment, args: &[S]) -> Vec<String> {
    let mut full = env.option_args();
    if let Some(image) = &env.sysimage {
        full.push(format!("--sysimage={}", image.display()));
    }
    full.extend(args.iter().map(|arg| arg.as_ref().to_string()));
    full
}

/// Resolve a locator: paths are checked as given, bare names are searched
/// for on `PATH`
pub fn locate(executable: &str) -> Option<PathBuf> {
    let candidate = Path::new(executable);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let search = env::var_os("PATH")?;
    env::split_paths(&search)
        .map(|dir| dir.join(executable))
        .find(|path| path.is_file())
}

/// Pin the process-wide environment to a precompiled image
pub fn use_sysimage(path: impl AsRef<Path>) -> BridgeResult<Environment> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(BridgeError::bootstrap(format!(
            "system image {} does not exist",
            path.display()
        )));
    }
    let image = path.canonicalize()?;
    info!(target: "bootstrap", image = %image.display(), "pinned system image");
    config::update(|env| env.sysimage = Some(image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable() {
        let exe = "jvbridge-no-such-runtime";
        assert_eq!(invoke(exe, &["-v"], true).unwrap(), None);
        let err = invoke(exe, &["-v"], false).unwrap_err();
        assert_eq!(err.kind(), "BootstrapError");
        assert!(locate(exe).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_failures() {
        let out = invoke("sh", &["-c", "printf ok"], false).unwrap();
        assert_eq!(out.as_deref(), Some(&b"ok"[..]));

        assert!(locate("sh").is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_runs_are_not_errors() {
        for suppress_errors in [true, false] {
            let out = invoke("sh", &["-c", "echo bad >&2; exit 3"], suppress_errors).unwrap();
            assert_eq!(out, None, "suppress_errors = {suppress_errors}");
        }
    }

    #[test]
    fn test_runtime_args_order() {
        let env = Environment {
            options: "--startup-file=no".to_string(),
            sysimage: Some(PathBuf::from("/tmp/sys.so")),
            ..Environment::default()
        };
        assert_eq!(
            runtime_args(&env, &["-e", "1"]),
            vec!["--startup-file=no", "--sysimage=/tmp/sys.so", "-e", "1"]
        );
    }

    #[test]
    fn test_missing_sysimage() {
        let err = use_sysimage("/definitely/not/here.so").unwrap_err();
        assert_eq!(err.kind(), "BootstrapError");
    }
}
