use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{
    CliArgs, ClassifySettings, Config, ConfigSource, GeneratorSettings, InstallRule,
    InterviewSettings, OutputFormat, RunSettings, SandboxSettings,
};

/// TOML configuration file structure. Every field is optional so a file only
/// needs to mention what it changes.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    run: Option<TomlRun>,
    sandbox: Option<TomlSandbox>,
    generator: Option<TomlGenerator>,
    interview: Option<TomlInterview>,
    classify: Option<TomlClassify>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRun {
    max_attempts: Option<u32>,
    turn_limit: Option<u32>,
    state_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlSandbox {
    root: Option<Utf8PathBuf>,
    timeout_secs: Option<u64>,
    install_timeout_secs: Option<u64>,
    kill_grace_ms: Option<u64>,
    output_cap_bytes: Option<usize>,
    test_command: Option<Vec<String>>,
    output_format: Option<OutputFormat>,
    env_passthrough: Option<Vec<String>>,
    install: Option<Vec<InstallRule>>,
    lint_command: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlGenerator {
    command: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlInterview {
    topics: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlClassify {
    test_patterns: Option<Vec<String>>,
    metadata_patterns: Option<Vec<String>>,
}

/// Overwrite `slot` with `value` when present and record who set it.
fn apply<T>(
    slot: &mut T,
    value: Option<T>,
    key: &str,
    source: ConfigSource,
    attribution: &mut BTreeMap<String, ConfigSource>,
) {
    if let Some(value) = value {
        *slot = value;
        attribution.insert(key.to_string(), source);
    }
}

const ATTRIBUTED_KEYS: &[&str] = &[
    "max_attempts",
    "turn_limit",
    "state_dir",
    "sandbox_root",
    "sandbox_timeout",
    "install_timeout",
    "kill_grace_ms",
    "output_cap_bytes",
    "test_command",
    "output_format",
    "env_passthrough",
    "install_rules",
    "lint_command",
    "generator_command",
    "generator_timeout",
    "interview_topics",
    "test_patterns",
    "metadata_patterns",
];

impl Config {
    /// Built-in defaults only; no discovery, no CLI.
    #[must_use]
    pub fn defaults() -> Self {
        let source_attribution = ATTRIBUTED_KEYS
            .iter()
            .map(|k| ((*k).to_string(), ConfigSource::Default))
            .collect();
        Self {
            run: RunSettings::default(),
            sandbox: SandboxSettings::default(),
            generator: GeneratorSettings::default(),
            interview: InterviewSettings::default(),
            classify: ClassifySettings::default(),
            config_path: None,
            source_attribution,
        }
    }

    /// Discover and load configuration with precedence: CLI > file > defaults
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Path-driven variant of [`discover`](Self::discover) used by tests to
    /// avoid depending on the process working directory.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut config = Self::defaults();

        let config_path = match &cli_args.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            let file = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            config.apply_file(file);
            config.config_path = Some(path.clone());
        }

        config.apply_cli(cli_args);
        Ok(config)
    }

    fn apply_file(&mut self, file: TomlConfig) {
        let src = ConfigSource::File;
        let attr = &mut self.source_attribution;

        if let Some(run) = file.run {
            apply(&mut self.run.max_attempts, run.max_attempts, "max_attempts", src, attr);
            apply(&mut self.run.turn_limit, run.turn_limit, "turn_limit", src, attr);
            apply(&mut self.run.state_dir, run.state_dir, "state_dir", src, attr);
        }

        if let Some(sandbox) = file.sandbox {
            let s = &mut self.sandbox;
            apply(&mut s.root, sandbox.root.map(Some), "sandbox_root", src, attr);
            apply(&mut s.timeout_secs, sandbox.timeout_secs, "sandbox_timeout", src, attr);
            apply(
                &mut s.install_timeout_secs,
                sandbox.install_timeout_secs,
                "install_timeout",
                src,
                attr,
            );
            apply(&mut s.kill_grace_ms, sandbox.kill_grace_ms, "kill_grace_ms", src, attr);
            apply(
                &mut s.output_cap_bytes,
                sandbox.output_cap_bytes,
                "output_cap_bytes",
                src,
                attr,
            );
            apply(&mut s.test_command, sandbox.test_command, "test_command", src, attr);
            apply(&mut s.output_format, sandbox.output_format, "output_format", src, attr);
            apply(
                &mut s.env_passthrough,
                sandbox.env_passthrough,
                "env_passthrough",
                src,
                attr,
            );
            apply(&mut s.install, sandbox.install, "install_rules", src, attr);
            // An empty list switches a configured lint step back off.
            apply(
                &mut s.lint_command,
                sandbox.lint_command.map(|argv| (!argv.is_empty()).then_some(argv)),
                "lint_command",
                src,
                attr,
            );
        }

        if let Some(generator) = file.generator {
            apply(
                &mut self.generator.command,
                generator.command,
                "generator_command",
                src,
                attr,
            );
            apply(
                &mut self.generator.timeout_secs,
                generator.timeout_secs,
                "generator_timeout",
                src,
                attr,
            );
        }

        if let Some(interview) = file.interview {
            apply(&mut self.interview.topics, interview.topics, "interview_topics", src, attr);
        }

        if let Some(classify) = file.classify {
            apply(
                &mut self.classify.test_patterns,
                classify.test_patterns,
                "test_patterns",
                src,
                attr,
            );
            apply(
                &mut self.classify.metadata_patterns,
                classify.metadata_patterns,
                "metadata_patterns",
                src,
                attr,
            );
        }
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let src = ConfigSource::Cli;
        let attr = &mut self.source_attribution;
        apply(&mut self.run.max_attempts, cli.max_attempts, "max_attempts", src, attr);
        apply(&mut self.run.turn_limit, cli.turn_limit, "turn_limit", src, attr);
        apply(&mut self.run.state_dir, cli.state_dir.clone(), "state_dir", src, attr);
        apply(
            &mut self.sandbox.timeout_secs,
            cli.sandbox_timeout_secs,
            "sandbox_timeout",
            src,
            attr,
        );
        apply(
            &mut self.generator.command,
            cli.generator_command.clone(),
            "generator_command",
            src,
            attr,
        );
    }

    /// Walk up from `start_dir` looking for `.shipwright/config.toml`,
    /// stopping at the filesystem root or the first repository root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);
        while let Some(dir) = current {
            let candidate = dir.join(".shipwright").join("config.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }
            current = dir.parent();
        }
        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config file: {}", path.display())),
            // An explicit --config pointing nowhere behaves like an empty file.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read config file: {}", path.display())),
        }
    }
}
