use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Takes precedence over `RUST_LOG`.
pub const LOG_ENV: &str = "SNOWODBC_LOG";
const DEFAULT_FILTER: &str = "info";

/// Installs a stderr fmt subscriber so stdout only carries SQL.
pub fn init() -> Result<()> {
    let filter = filter_from(env::var(LOG_ENV).ok().as_deref())?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to install tracing subscriber")
}

pub fn filter_from(directives: Option<&str>) -> Result<EnvFilter> {
    match directives.map(str::trim).filter(|value| !value.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV} directives: {directives}")),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directives_win() {
        let filter = filter_from(Some("snowodbc=debug")).unwrap();
        assert_eq!(filter.to_string(), "snowodbc=debug");
    }

    #[test]
    fn blank_directives_fall_back() {
        assert!(filter_from(Some("   ")).is_ok());
        assert!(filter_from(None).is_ok());
    }
}
