use camino::Utf8PathBuf;
use std::path::PathBuf;

/// Overrides supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub max_attempts: Option<u32>,
    pub turn_limit: Option<u32>,
    pub sandbox_timeout_secs: Option<u64>,
    pub state_dir: Option<Utf8PathBuf>,
    pub generator_command: Option<Vec<String>>,
}
