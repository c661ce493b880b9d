//! Configuration management for shipwright
//!
//! Hierarchical configuration with discovery and precedence CLI > file >
//! defaults. The TOML file has `[run]`, `[sandbox]`, `[generator]`,
//! `[interview]` and `[classify]` sections.

mod cli_args;
mod discovery;
mod model;

pub use cli_args::CliArgs;
pub use model::*;

use std::time::Duration;

use shipwright_model::FileClassifier;

use crate::error::ConfigError;

impl Config {
    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if self.run.turn_limit == 0 {
            return Err(ConfigError::invalid("turn_limit", "must be at least 1"));
        }
        if self.sandbox.timeout_secs == 0 {
            return Err(ConfigError::invalid("sandbox.timeout_secs", "must be at least 1"));
        }
        if self.sandbox.install_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "sandbox.install_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.generator.timeout_secs == 0 {
            return Err(ConfigError::invalid("generator.timeout_secs", "must be at least 1"));
        }
        if self.sandbox.test_command.is_empty() {
            return Err(ConfigError::invalid("sandbox.test_command", "must not be empty"));
        }
        if self.sandbox.lint_command.as_ref().is_some_and(Vec::is_empty) {
            return Err(ConfigError::invalid("sandbox.lint_command", "must not be empty"));
        }
        if let Some(rule) = self.sandbox.install.iter().find(|r| r.command.is_empty()) {
            return Err(ConfigError::invalid(
                "sandbox.install",
                format!("rule for `{}` has an empty command", rule.marker),
            ));
        }
        if let Some(rule) = self
            .sandbox
            .install
            .iter()
            .find(|r| r.marker.contains(['/', '\\']) || r.marker.is_empty())
        {
            return Err(ConfigError::invalid(
                "sandbox.install",
                format!("marker `{}` must be a bare file name", rule.marker),
            ));
        }
        if self.interview.topics.is_empty() {
            return Err(ConfigError::invalid("interview.topics", "must list at least one topic"));
        }
        self.classifier()?;
        Ok(())
    }

    /// Required only for `run`; `validate` alone does not check it.
    pub fn require_generator(&self) -> Result<&[String], ConfigError> {
        if self.generator.command.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "generator.command".to_string(),
                hint: "set [generator].command in .shipwright/config.toml or pass --generator-cmd"
                    .to_string(),
            });
        }
        Ok(&self.generator.command)
    }

    pub fn classifier(&self) -> Result<FileClassifier, ConfigError> {
        FileClassifier::new(&self.classify.test_patterns, &self.classify.metadata_patterns)
            .map_err(|e| ConfigError::invalid("classify", e.to_string()))
    }

    #[must_use]
    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox.timeout_secs)
    }

    #[must_use]
    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator.timeout_secs)
    }

    /// `key = value (source)` lines for `shipwright config`.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        let source = |key: &str| {
            self.source_attribution
                .get(key)
                .copied()
                .unwrap_or(ConfigSource::Default)
        };
        let mut lines = vec![
            format!("max_attempts = {} ({})", self.run.max_attempts, source("max_attempts")),
            format!("turn_limit = {} ({})", self.run.turn_limit, source("turn_limit")),
            format!("state_dir = {} ({})", self.run.state_dir, source("state_dir")),
            format!(
                "sandbox.root = {} ({})",
                self.sandbox
                    .root
                    .as_ref()
                    .map_or_else(|| "<system temp>".to_string(), ToString::to_string),
                source("sandbox_root")
            ),
            format!(
                "sandbox.timeout_secs = {} ({})",
                self.sandbox.timeout_secs,
                source("sandbox_timeout")
            ),
            format!(
                "sandbox.test_command = {:?} ({})",
                self.sandbox.test_command,
                source("test_command")
            ),
            format!(
                "sandbox.output_format = {} ({})",
                self.sandbox.output_format,
                source("output_format")
            ),
            format!(
                "sandbox.install = {} rule(s) ({})",
                self.sandbox.install.len(),
                source("install_rules")
            ),
            format!(
                "sandbox.lint_command = {} ({})",
                self.sandbox
                    .lint_command
                    .as_ref()
                    .map_or_else(|| "<none>".to_string(), |argv| format!("{argv:?}")),
                source("lint_command")
            ),
            format!(
                "generator.command = {:?} ({})",
                self.generator.command,
                source("generator_command")
            ),
            format!(
                "interview.topics = {} topic(s) ({})",
                self.interview.topics.len(),
                source("interview_topics")
            ),
        ];
        if let Some(path) = &self.config_path {
            lines.insert(0, format!("config file: {}", path.display()));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::defaults().validate().unwrap();
    }

    #[test]
    fn zero_attempts_is_invalid() {
        let mut config = Config::defaults();
        config.run.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "max_attempts"
        ));
    }

    #[test]
    fn empty_test_command_is_invalid() {
        let mut config = Config::defaults();
        config.sandbox.test_command.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn install_marker_must_be_a_file_name() {
        let mut config = Config::defaults();
        config.sandbox.install = vec![InstallRule {
            marker: "../requirements.txt".to_string(),
            command: vec!["true".to_string()],
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_lint_command_is_invalid() {
        let mut config = Config::defaults();
        config.sandbox.lint_command = Some(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_installs_are_not_editable() {
        for rule in InstallRule::python_defaults() {
            assert!(!rule.command.iter().any(|arg| arg == "-e"), "{rule:?}");
        }
    }

    #[test]
    fn bad_glob_is_invalid() {
        let mut config = Config::defaults();
        config.classify.test_patterns = vec!["tests/[".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn generator_is_required_for_runs() {
        let config = Config::defaults();
        assert!(matches!(
            config.require_generator(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn describe_mentions_sources() {
        let lines = Config::defaults().describe();
        assert!(lines.iter().any(|l| l == "max_attempts = 3 (default)"));
    }
}
