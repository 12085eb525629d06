//! Run and solver configuration.
//!
//! Values come from an optional TOML file (path in `BOUNDARY_CONFIG`) with
//! solver credentials overridable from the usual `DWAVE_API_*` variables.
//!
//! ```toml
//! [solver]
//! endpoint = "https://cloud.dwavesys.com/sapi/v2"
//! solver = "Advantage_system4.1"
//!
//! [run]
//! num_reads = 100
//! chain_strength = 2.0
//!
//! [run.objective]
//! cut_reward = 1.0
//! same_color_penalty = 2.0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::BoundaryObjective;
use crate::sampler::{SampleParams, DEFAULT_LABEL};

pub const CONFIG_PATH_VAR : &str = "BOUNDARY_CONFIG";
pub const TOKEN_VAR : &str = "DWAVE_API_TOKEN";
pub const ENDPOINT_VAR : &str = "DWAVE_API_ENDPOINT";
pub const SOLVER_VAR : &str = "DWAVE_API_SOLVER";

pub const DEFAULT_ENDPOINT : &str = "https://cloud.dwavesys.com/sapi/v2";

/// Shortest allowed wait between status polls.
pub const MIN_POLL_INTERVAL_MS : u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path : PathBuf, source : std::io::Error },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no API token; set DWAVE_API_TOKEN or solver.token")]
    MissingToken,

    #[error("invalid value for {field}: {reason}")]
    Invalid { field : &'static str, reason : String },
}

/// Where and how to reach the hosted solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub endpoint : String,
    pub token : String,
    /// Solver name; `None` lets the service pick.
    pub solver : Option<String>,
    pub request_timeout_secs : u64,
    pub poll_interval_ms : u64,
}

impl SolverConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// File form of `SolverConfig`, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SolverSection {
    endpoint : Option<String>,
    token : Option<String>,
    solver : Option<String>,
    request_timeout_secs : Option<u64>,
    poll_interval_ms : Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// `None` derives the chain strength from the model.
    pub chain_strength : Option<f64>,
    pub chain_strength_prefactor : f64,
    pub num_reads : u32,
    pub label : String,
    pub timeout_secs : u64,
    pub objective : BoundaryObjective,
    /// Grid image to segment instead of the built-in example.
    pub image : Option<PathBuf>,
    pub output_dir : PathBuf,
    pub cell_size : u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            chain_strength : None,
            chain_strength_prefactor : 1.414,
            num_reads : 10,
            label : DEFAULT_LABEL.to_string(),
            timeout_secs : 300,
            objective : BoundaryObjective::default(),
            image : None,
            output_dir : PathBuf::from("."),
            cell_size : 120,
        }
    }
}

impl RunConfig {
    /// Sampling parameters for a given chain strength.
    pub fn sample_params(&self, chain_strength : f64) -> SampleParams {
        SampleParams {
            chain_strength,
            num_reads : self.num_reads,
            label : self.label.clone(),
            timeout : Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    solver : SolverSection,
    run : RunConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub solver : SolverConfig,
    pub run : RunConfig,
}

impl Config {
    /// Reads the file named by `BOUNDARY_CONFIG` (if set) and the process
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = |key : &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        let path = env(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::resolve(path.as_deref(), env)
    }

    /// `env` stands in for the process environment.
    pub fn resolve<F>(path : Option<&Path>, env : F) -> Result<Self, ConfigError>
    where
        F : Fn(&str) -> Option<String>,
    {
        let file = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|source| ConfigError::Read { path : path.to_path_buf(), source })?;
                tracing::debug!(path = %path.display(), "read config file");
                Self::parse(&text)?
            }
            None => FileConfig::default(),
        };

        let section = file.solver;
        let token = env(TOKEN_VAR).or(section.token).ok_or(ConfigError::MissingToken)?;
        let solver = SolverConfig {
            endpoint : env(ENDPOINT_VAR).or(section.endpoint).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            token,
            solver : env(SOLVER_VAR).or(section.solver),
            request_timeout_secs : section.request_timeout_secs.unwrap_or(60),
            poll_interval_ms : section.poll_interval_ms.unwrap_or(1000),
        };
        let config = Config { solver, run : file.run };
        config.validate()?;
        Ok(config)
    }

    fn parse(text : &str) -> Result<FileConfig, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.solver.endpoint.starts_with("http://") && !self.solver.endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid { field : "solver.endpoint", reason : self.solver.endpoint.clone() });
        }
        if self.solver.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid { field : "solver.request_timeout_secs", reason : "must be positive".into() });
        }
        if self.solver.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                field : "solver.poll_interval_ms",
                reason : format!("at least {MIN_POLL_INTERVAL_MS} ms"),
            });
        }
        if self.run.cell_size < 8 {
            return Err(ConfigError::Invalid { field : "run.cell_size", reason : "at least 8 pixels".into() });
        }
        let prefactor = self.run.chain_strength_prefactor;
        if !(prefactor.is_finite() && prefactor > 0.0) {
            return Err(ConfigError::Invalid {
                field : "run.chain_strength_prefactor",
                reason : "must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs : &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map : HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key : &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_token_from_env() {
        let config = Config::resolve(None, env_of(&[(TOKEN_VAR, "abc")])).unwrap();
        assert_eq!(config.solver.token, "abc");
        assert_eq!(config.solver.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.solver.solver, None);
        assert_eq!(config.run, RunConfig::default());
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(Config::resolve(None, env_of(&[])), Err(ConfigError::MissingToken)));
    }

    #[test]
    fn file_values_and_env_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("boundary.toml");
        std::fs::write(
            &path,
            r#"
[solver]
endpoint = "https://example.test/sapi"
token = "from-file"
solver = "file-solver"
poll_interval_ms = 250

[run]
num_reads = 250
chain_strength = 3.5
output_dir = "out"

[run.objective]
same_color_penalty = 3.0
"#,
        )
        .unwrap();

        let config = Config::resolve(Some(&path), env_of(&[(SOLVER_VAR, "env-solver")])).unwrap();
        assert_eq!(config.solver.token, "from-file");
        assert_eq!(config.solver.endpoint, "https://example.test/sapi");
        assert_eq!(config.solver.solver.as_deref(), Some("env-solver"));
        assert_eq!(config.solver.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.run.num_reads, 250);
        assert_eq!(config.run.chain_strength, Some(3.5));
        assert_eq!(config.run.output_dir, PathBuf::from("out"));
        assert_eq!(config.run.objective.cut_reward, 1.0);
        assert_eq!(config.run.objective.same_color_penalty, 3.0);

        let params = config.run.sample_params(3.5);
        assert_eq!(params.num_reads, 250);
        assert_eq!(params.label, DEFAULT_LABEL);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let typo = dir.path().join("typo.toml");
        std::fs::write(&typo, "[run]\nnum_read = 5\n").unwrap();
        assert!(matches!(Config::resolve(Some(&typo), env_of(&[(TOKEN_VAR, "t")])), Err(ConfigError::Parse(_))));

        let bad_endpoint = env_of(&[(TOKEN_VAR, "t"), (ENDPOINT_VAR, "ftp://nope")]);
        assert!(matches!(Config::resolve(None, bad_endpoint), Err(ConfigError::Invalid { .. })));

        for (name, text) in [
            ("poll.toml", "[solver]\npoll_interval_ms = 0\n"),
            ("inf.toml", "[run]\nchain_strength_prefactor = inf\n"),
            ("neg.toml", "[run]\nchain_strength_prefactor = -1.0\n"),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, text).unwrap();
            let result = Config::resolve(Some(&path), env_of(&[(TOKEN_VAR, "t")]));
            assert!(matches!(result, Err(ConfigError::Invalid { .. })), "{name}: {result:?}");
        }

        let missing = dir.path().join("absent.toml");
        assert!(matches!(Config::resolve(Some(&missing), env_of(&[(TOKEN_VAR, "t")])), Err(ConfigError::Read { .. })));
    }
}
