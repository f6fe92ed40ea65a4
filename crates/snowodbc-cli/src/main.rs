use std::{env, fs, path::Path};

use anyhow::{bail, Context, Result};
use snowodbc::ConnectionConfig;
use snowodbc_cli::render::{self, Renderer};
use snowodbc_cli::telemetry;
use tracing::debug;

const USAGE: &str = "usage: snowodbc-cli query <file.json> [--literal] | schema <file.json> | dsn";

fn main() -> Result<()> {
    telemetry::init()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let config = ConnectionConfig::from_env().context("invalid SNOWFLAKE_* configuration")?;
    debug!(grammar = ?config.options.grammar, processor = ?config.options.processor, "loaded configuration");
    let renderer = Renderer::from_config(&config);

    let lines = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["query", path, flags @ ..] => {
            let literal = match flags {
                [] => false,
                ["--literal"] => true,
                _ => bail!(USAGE),
            };
            let request = render::parse_query(&read(path)?)?;
            renderer.render_query(&request, literal)?
        }
        ["schema", path] => {
            let blueprint = render::parse_blueprint(&read(path)?)?;
            renderer.render_schema(&blueprint)?
        }
        ["dsn"] => vec![config.dsn()?],
        _ => bail!(USAGE),
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn read(path: &str) -> Result<String> {
    let path = Path::new(path);
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
