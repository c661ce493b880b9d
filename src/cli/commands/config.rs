//! `shipwright config`

use shipwright_config::Config;
use shipwright_utils::ExitCode;

use crate::error::ShipwrightError;

pub(crate) fn execute(config: &Config) -> Result<ExitCode, ShipwrightError> {
    println!("Effective configuration:");
    match &config.config_path {
        Some(path) => println!("  file: {}", path.display()),
        None => println!("  file: <none found>"),
    }
    for line in config.describe() {
        println!("  {line}");
    }
    config.validate()?;
    Ok(ExitCode::SUCCESS)
}
