//! `shipwright clean`

use std::io::{BufRead, Write};

use shipwright_config::Config;
use shipwright_utils::ExitCode;

use crate::error::ShipwrightError;

pub(crate) fn execute(config: &Config, force: bool) -> Result<ExitCode, ShipwrightError> {
    let state_dir = &config.run.state_dir;
    if !state_dir.exists() {
        println!("Nothing to clean: {state_dir} does not exist");
        return Ok(ExitCode::SUCCESS);
    }

    let runs = std::fs::read_dir(state_dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .count();
    println!("Clean state directory: {state_dir}");
    println!("  Will remove {runs} run director{}", if runs == 1 { "y" } else { "ies" });

    if !force && !confirm()? {
        println!("Aborted");
        return Ok(ExitCode::SUCCESS);
    }

    std::fs::remove_dir_all(state_dir)?;
    println!("✓ Removed {state_dir}");
    Ok(ExitCode::SUCCESS)
}

fn confirm() -> std::io::Result<bool> {
    print!("Continue? [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
