//! `shipwright validate <DIR>`

use std::path::Path;
use std::sync::Arc;

use shipwright_config::Config;
use shipwright_model::{
    GeneratedProject, ProjectError, Requirement, SpecDocument, ValidationReport, Verdict,
};
use shipwright_sandbox::{SandboxConfig, ValidationCancelled, ValidationSandbox};
use shipwright_utils::{CancellationToken, ExitCode};
use tracing::warn;

use crate::error::ShipwrightError;

/// Directory names never copied into the sandbox.
const SKIPPED_DIRS: &[&str] = &["__pycache__", "node_modules", "target"];

pub(crate) async fn execute(
    config: &Config,
    dir: &Path,
    cancel: &CancellationToken,
) -> Result<ExitCode, ShipwrightError> {
    let project = load_project(config, dir)?;
    let sandbox = ValidationSandbox::new(SandboxConfig::from_settings(&config.sandbox));

    let report = match sandbox
        .validate_cancellable(&project, config.sandbox_timeout(), cancel)
        .await
    {
        Ok(report) => report,
        Err(ValidationCancelled) => {
            eprintln!("shipwright: validation cancelled");
            return Ok(ExitCode::CANCELLED);
        }
    };

    print_report(&report);
    Ok(exit_code_for(report.verdict()))
}

pub(crate) const fn exit_code_for(verdict: Verdict) -> ExitCode {
    match verdict {
        Verdict::Accepted => ExitCode::SUCCESS,
        Verdict::Rejected => ExitCode::VALIDATION_EXHAUSTED,
        Verdict::SandboxError => ExitCode::SANDBOX_FAILURE,
    }
}

fn load_project(config: &Config, dir: &Path) -> Result<GeneratedProject, ShipwrightError> {
    if !dir.is_dir() {
        return Err(ShipwrightError::Project {
            dir: dir.display().to_string(),
            source: ProjectError::Empty,
        });
    }
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;

    let spec = Arc::new(SpecDocument::complete(vec![Requirement::user(format!(
        "validate existing project at {}",
        dir.display()
    ))]));
    GeneratedProject::new(spec, 1, files, &config.classifier()?).map_err(|source| {
        ShipwrightError::Project {
            dir: dir.display().to_string(),
            source,
        }
    })
}

fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<(String, String)>,
) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if !SKIPPED_DIRS.contains(&name.as_ref()) {
                collect_files(root, &path, out)?;
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        match std::fs::read_to_string(&path) {
            Ok(content) => out.push((relative, content)),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(path = %relative, "skipping non-UTF-8 file");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn print_report(report: &ValidationReport) {
    println!("{}", report.summary());
    if let Some(counts) = report.counts()
        && counts.skipped > 0
    {
        println!("  skipped: {}", counts.skipped);
    }
    for failure in report.failures() {
        println!("  ✗ {}: {}", failure.test_id, failure.message.replace('\n', " "));
    }
    if let Some(lint) = report.lint() {
        println!("  lint: {}", lint.summary);
    }
    if report.verdict() != Verdict::Accepted && !report.output_tail().is_empty() {
        println!("\n--- output tail ---\n{}", report.output_tail());
    }
}
