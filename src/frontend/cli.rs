use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::bridge::Bridge;
use crate::core::HostValue;
use crate::errors::BridgeResult;
use crate::frontend::config::{self, Overrides};
use crate::infrastructure::logging::{debug, error, init_logging, LogConfig};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliConfig {
    pub config_file: Option<PathBuf>,
    pub log_level: Option<String>,
    pub json: bool,
    pub repl: bool,
    pub print_config: bool,
    pub fragments: Vec<String>,
}

/// Outcome of argument parsing
#[derive(Debug, PartialEq)]
pub enum Command {
    Run(CliConfig),
    Help,
}

pub fn usage(prog: &str) -> String {
    format!(
        "jvbridge - evaluate source in the embedded runtime\n\n\
        USAGE:\n    {prog} [OPTIONS] <fragment>...\n    {prog} [OPTIONS] --repl\n\n\
        OPTIONS:\n    \
        -h, --help           Print help information\n    \
        --config FILE        Read settings from FILE instead of jvbridge.toml\n    \
        --log-level LEVEL    Log level or filter directives\n    \
        --json               Print results as JSON\n    \
        --repl               Read and evaluate one line at a time\n    \
        --print-config       Print the resolved configuration as TOML\n\n\
        EXAMPLES:\n    \
        {prog} '1 + 2'\n    \
        {prog} --json 'x = [1, 2]' 'sum(x)'"
    )
}

/// Parse arguments, excluding the program name
pub fn parse_args<I, S>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut config = CliConfig::default();
    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--json" => config.json = true,
            "--repl" => config.repl = true,
            "--print-config" => config.print_config = true,
            "--config" => {
                let path = args.next().ok_or("--config requires an argument")?;
                config.config_file = Some(PathBuf::from(path));
            }
            "--log-level" => {
                config.log_level = Some(args.next().ok_or("--log-level requires an argument")?);
            }
            "--" => config.fragments.extend(args.by_ref()),
            opt if opt.starts_with("--") => return Err(format!("Unknown option: {opt}")),
            fragment => config.fragments.push(fragment.to_string()),
        }
    }

    if config.fragments.is_empty() && !config.repl && !config.print_config {
        return Err("No source fragments given".to_string());
    }
    Ok(Command::Run(config))
}

pub struct Cli {
    config: CliConfig,
}

impl Cli {
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> BridgeResult<i32> {
        let overrides = Overrides {
            log_level: self.config.log_level.clone(),
            ..Overrides::default()
        };
        let environment = config::init(self.config.config_file.as_deref(), &overrides)?;
        let _guard = init_logging(LogConfig::from_environment(&environment));
        debug!(?environment, "configuration resolved");

        if self.config.print_config {
            print!("{}", environment.to_toml()?);
            if self.config.fragments.is_empty() && !self.config.repl {
                return Ok(0);
            }
        }

        let bridge = Bridge::with_environment(environment);
        if self.config.repl {
            return self.repl(&bridge);
        }

        match bridge.eval_all(&self.config.fragments) {
            Ok(value) => {
                self.print_value(&bridge, &value);
                Ok(0)
            }
            Err(err) => {
                error!(kind = err.kind(), "evaluation failed");
                self.print_output(&bridge);
                eprintln!("{err}");
                Ok(1)
            }
        }
    }

    fn repl(&self, bridge: &Bridge) -> BridgeResult<i32> {
        let stdin = io::stdin();
        let mut failures = 0;
        prompt();
        for line in stdin.lock().lines() {
            let line = line?;
            let source = line.trim();
            if !source.is_empty() {
                match bridge.eval(source) {
                    Ok(value) => self.print_value(bridge, &value),
                    Err(err) => {
                        failures += 1;
                        self.print_output(bridge);
                        eprintln!("{err}");
                    }
                }
            }
            prompt();
        }
        println!();
        Ok(if failures == 0 { 0 } else { 1 })
    }

    fn print_value(&self, bridge: &Bridge, value: &HostValue) {
        self.print_output(bridge);
        if self.config.json {
            println!("{}", value.to_json());
        } else if *value != HostValue::Unit {
            println!("{value}");
        }
    }

    fn print_output(&self, bridge: &Bridge) {
        print!("{}", bridge.take_output());
    }
}

fn prompt() {
    print!("jv> ");
    let _ = io::stdout().flush();
}

/// Entry point for CLI binary
pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args();
    let prog = args.next().unwrap_or_else(|| "jvbridge".to_string());
    let config = match parse_args(args) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            println!("{}", usage(&prog));
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}\n\n{}", usage(&prog));
            std::process::exit(2);
        }
    };
    let exit_code = Cli::new(config).run()?;
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragments_and_flags() {
        let Command::Run(config) =
            parse_args(["--json", "--log-level", "debug", "x = 1", "x + 1"]).unwrap()
        else {
            panic!("expected a run");
        };
        assert!(config.json);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.fragments, vec!["x = 1", "x + 1"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(Vec::<String>::new()).is_err());
        assert!(parse_args(["--config"]).is_err());
        assert!(parse_args(["--bogus", "1"]).is_err());
        assert_eq!(parse_args(["-h"]).unwrap(), Command::Help);
    }

    #[test]
    fn test_double_dash_keeps_option_like_fragments() {
        let Command::Run(config) = parse_args(["--", "--x"]).unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(config.fragments, vec!["--x"]);
        assert!(matches!(parse_args(["--repl"]), Ok(Command::Run(c)) if c.repl));
    }
}
