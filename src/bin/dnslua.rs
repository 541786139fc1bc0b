use clap::Parser;
use dnslua::{config::Config, Error};
use std::path::PathBuf;
use std::process::{Command, ExitCode};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: dnslua.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Lua entrypoint
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Generated dnscontrol.js
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// dnscontrol binary to run afterwards
    #[arg(short, long)]
    engine: Option<String>,

    /// Only generate the output file; do not run the engine
    #[arg(long)]
    no_engine: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Arguments forwarded to the engine, e.g. `preview` or `push --domains x`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    engine_args: Vec<String>,
}

fn run(cli: &Cli) -> Result<Option<i32>, Error> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(input) = &cli.input {
        config.input = input.clone();
    }
    if let Some(output) = &cli.output {
        config.output = output.clone();
    }
    if let Some(engine) = &cli.engine {
        config.engine = engine.clone();
    }
    debug!("config: {:?}", config);

    dnslua::transpile_file(&config.input, &config.output, &config.serializer)?;
    info!(
        "generated {} from {}",
        config.output.display(),
        config.input.display()
    );

    if cli.no_engine {
        return Ok(None);
    }

    debug!(engine = %config.engine, args = ?cli.engine_args, "running engine");
    let status = Command::new(&config.engine)
        .args(&cli.engine_args)
        .status()
        .map_err(|e| Error::io(&config.engine, e))?;
    // killed by a signal: report a generic failure
    Ok(Some(status.code().unwrap_or(1)))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(code)) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everything_after_the_first_positional_goes_to_the_engine() {
        let cli = Cli::try_parse_from(["dnslua", "-v", "preview", "--domains", "x", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.no_engine);
        assert_eq!(cli.engine_args, vec!["preview", "--domains", "x", "-v"]);

        let cli = Cli::try_parse_from(["dnslua", "--", "push", "--cmode", "all"]).unwrap();
        assert_eq!(cli.engine_args, vec!["push", "--cmode", "all"]);
    }

    #[test]
    fn test_no_engine_only_generates() {
        let cli = Cli::try_parse_from(["dnslua", "--no-engine", "-i", "zones.lua"]).unwrap();
        assert!(cli.no_engine);
        assert!(cli.engine_args.is_empty());
        assert_eq!(cli.input, Some(PathBuf::from("zones.lua")));
    }
}
