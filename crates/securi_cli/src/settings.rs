//! Configuration file and logging setup.

use color_eyre::eyre::{Result, WrapErr};
use securi_certify::WorkflowConfig;
use securi_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Contents of the `--config` file; every section is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Ledger client settings
    pub ledger: LedgerConfig,
    /// Workflow settings
    pub workflow: WorkflowConfig,
}

impl Settings {
    /// Load from `path`, or defaults if none is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text).wrap_err_with(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        settings.ledger.validate().wrap_err("invalid ledger settings")?;
        Ok(settings)
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init_logging(level: Option<&str>, json: bool) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(format!("securi={}", level))
            .wrap_err_with(|| format!("invalid log level {}", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("securi=info")),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.ledger.confirmations, 1);
        assert_eq!(settings.workflow.lookup_timeout_secs, 15);
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ledger": {{"confirmations": 3, "public_rpc_url": "http://localhost:8545"}}, "workflow": {{"lookup_timeout_secs": 5}}}}"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.ledger.confirmations, 3);
        assert_eq!(settings.ledger.public_rpc_url, "http://localhost:8545");
        assert_eq!(settings.ledger.gas_limit, LedgerConfig::default().gas_limit);
        assert_eq!(settings.workflow.lookup_timeout_secs, 5);
    }

    #[test]
    fn test_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());

        assert!(Settings::load(Some(Path::new("/nonexistent/securi.json"))).is_err());
    }
}
