//! Configuration loading from bench.toml
//!
//! Harness configuration can be specified in a `bench.toml` file, discovered
//! by walking up from the current directory. CLI flags override file values.

use std::path::Path;
use std::time::Duration;

use hvmbench_core::Backend;
use serde::{Deserialize, Serialize};

/// hvm-bench configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BenchConfig {
    /// Which backends are legal under which mode.
    #[serde(default)]
    pub matrix: MatrixConfig,
    /// Runner configuration.
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// The mode × backend validity table. Row order here is report row order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Backends that can interpret programs directly.
    #[serde(default = "default_interpreted")]
    pub interpreted: Vec<Backend>,
    /// Backends that can compile programs to standalone binaries.
    #[serde(default = "default_compiled")]
    pub compiled: Vec<Backend>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            interpreted: default_interpreted(),
            compiled: default_compiled(),
        }
    }
}

fn default_interpreted() -> Vec<Backend> {
    vec![Backend::C, Backend::Cuda, Backend::Rust]
}
fn default_compiled() -> Vec<Backend> {
    vec![Backend::C, Backend::Cuda]
}

/// Runner configuration for matrix execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Per-run timeout (e.g. "60s", "2m").
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Timeout for build and staging steps (builds can hang too).
    #[serde(default = "default_build_timeout")]
    pub build_timeout: String,
    /// Number of parallel cells.
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Directory containing the benchmark programs.
    #[serde(default = "default_programs_dir")]
    pub programs_dir: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            build_timeout: default_build_timeout(),
            jobs: None,
            programs_dir: default_programs_dir(),
        }
    }
}

fn default_timeout() -> String {
    "60s".to_string()
}
fn default_build_timeout() -> String {
    "10m".to_string()
}
fn default_programs_dir() -> String {
    "./programs".to_string()
}

impl BenchConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from the current
    /// directory.
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("bench.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Parse a duration string (e.g. "60s", "500ms", "10m").
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty duration string");
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration number: {num_part}"))?;

        let seconds = match unit_part.to_lowercase().as_str() {
            "ms" => value / 1_000.0,
            "s" | "" => value,
            "m" | "min" => value * 60.0,
            "h" => value * 3_600.0,
            _ => anyhow::bail!("unknown duration unit: {unit_part}"),
        };

        Ok(Duration::from_secs_f64(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_hvm_sets() {
        let config = BenchConfig::default();
        assert_eq!(
            config.matrix.interpreted,
            vec![Backend::C, Backend::Cuda, Backend::Rust]
        );
        assert_eq!(config.matrix.compiled, vec![Backend::C, Backend::Cuda]);
        assert_eq!(config.runner.timeout, "60s");
        assert_eq!(config.runner.programs_dir, "./programs");
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(
            BenchConfig::parse_duration("60s").unwrap(),
            Duration::from_secs(60)
        );
        assert_eq!(
            BenchConfig::parse_duration("500ms").unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(
            BenchConfig::parse_duration("10m").unwrap(),
            Duration::from_secs(600)
        );
        assert_eq!(
            BenchConfig::parse_duration("90").unwrap(),
            Duration::from_secs(90)
        );
        assert!(BenchConfig::parse_duration("10 parsecs").is_err());
        assert!(BenchConfig::parse_duration("").is_err());
    }

    #[test]
    fn parse_partial_toml_keeps_defaults() {
        let toml_str = r#"
            [matrix]
            interpreted = ["rust", "c"]

            [runner]
            timeout = "5s"
        "#;

        let config: BenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.matrix.interpreted, vec![Backend::Rust, Backend::C]);
        // Defaults still apply where the file is silent.
        assert_eq!(config.matrix.compiled, vec![Backend::C, Backend::Cuda]);
        assert_eq!(config.runner.timeout, "5s");
        assert_eq!(config.runner.build_timeout, "10m");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let toml_str = r#"
            [matrix]
            interpreted = ["fortran"]
        "#;
        assert!(toml::from_str::<BenchConfig>(toml_str).is_err());
    }
}
