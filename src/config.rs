use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{Result, StepflowError, runtime::DEFAULT_WAIT_TIMEOUT, snapshot::CodecKind};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// advance the run one manual step at a time, defaults to false
    pub stepwise: bool,
    /// default timeout of `wait_for_event` in milliseconds, defaults to 2000 seconds
    pub wait_timeout_ms: u64,
    /// codec used for snapshots, `json` or `base64`
    pub codec: CodecKind,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            stepwise: false,
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT.as_millis() as u64,
            codec: CodecKind::default(),
        }
    }
}

impl ContextConfig {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())
            .map_err(|e| StepflowError::Config(format!("failed to load config file {:?}: {e}", path.as_ref())))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<ContextConfig>(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// A zero wait timeout would fail every wait before it starts.
    pub fn validate(&self) -> Result<()> {
        if self.wait_timeout_ms == 0 {
            return Err(StepflowError::Config("wait_timeout_ms must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}
