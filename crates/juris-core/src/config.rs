use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for one engine instance.
///
/// Loaded from the `[retrieval]` section of a TOML file (or built from
/// defaults). All values are deliberately configuration, not hard-coded law:
/// weights, decay shape, and the REFERENCES depth cutoff came from the source
/// material as reasonable defaults, not product requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Lower bound on bundle size; fewer results flips the degraded flag.
    #[serde(default = "default_min_results")]
    pub min_results: usize,

    /// Upper bound on bundle size (mandatory overflow excepted).
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// K for the nearest-neighbor seed search. Kept at or above
    /// `max_results` so truncation never starves on seeds alone.
    #[serde(default = "default_seed_k")]
    pub seed_k: usize,

    /// Hard depth bound on graph expansion.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Per-level frontier cap bounding fan-out in dense legal graphs.
    #[serde(default = "default_max_frontier")]
    pub max_frontier: usize,

    /// Weight of the similarity axis in score fusion.
    #[serde(default = "default_w_sim")]
    pub w_sim: f32,

    /// Weight of the graph-distance axis in score fusion.
    #[serde(default = "default_w_graph")]
    pub w_graph: f32,

    /// Graph-distance score per depth (`depth_decay[0]` is depth 1).
    /// Must be non-increasing and cover `max_depth` entries.
    #[serde(default = "default_depth_decay")]
    pub depth_decay: Vec<f32>,

    /// Per-call store timeout; a timeout counts as store unavailability.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Backoff before the single retry of a failed store call.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_results: default_min_results(),
            max_results: default_max_results(),
            seed_k: default_seed_k(),
            max_depth: default_max_depth(),
            max_frontier: default_max_frontier(),
            w_sim: default_w_sim(),
            w_graph: default_w_graph(),
            depth_decay: default_depth_decay(),
            store_timeout_ms: default_store_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl RetrievalConfig {
    /// Check cross-field invariants after deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            bail!("max_results must be at least 1");
        }
        if self.min_results > self.max_results {
            bail!(
                "min_results ({}) exceeds max_results ({})",
                self.min_results,
                self.max_results
            );
        }
        if self.seed_k < self.max_results {
            bail!(
                "seed_k ({}) must be at least max_results ({})",
                self.seed_k,
                self.max_results
            );
        }
        if self.max_depth == 0 {
            bail!("max_depth must be at least 1");
        }
        if self.max_frontier == 0 {
            bail!("max_frontier must be at least 1");
        }
        if self.w_sim < 0.0 || !self.w_sim.is_finite() {
            bail!("w_sim must be finite and non-negative");
        }
        if self.w_graph < 0.0 || !self.w_graph.is_finite() {
            bail!("w_graph must be finite and non-negative");
        }
        if self.depth_decay.len() < self.max_depth {
            bail!(
                "depth_decay needs {} entries to cover max_depth, got {}",
                self.max_depth,
                self.depth_decay.len()
            );
        }
        for pair in self.depth_decay.windows(2) {
            if pair[1] > pair[0] {
                bail!("depth_decay must be non-increasing");
            }
        }
        for value in &self.depth_decay {
            if !(0.0..=1.0).contains(value) {
                bail!("depth_decay values must be in [0, 1]");
            }
        }
        Ok(())
    }

    /// Graph-distance score for a node first reached at `depth` (1-based).
    ///
    /// Depths past the decay table score zero; `validate` guarantees the
    /// table covers `max_depth`, so this only happens on out-of-policy input.
    #[must_use]
    pub fn decay(&self, depth: usize) -> f32 {
        if depth == 0 {
            return 0.0;
        }
        self.depth_decay.get(depth - 1).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    retrieval: Option<RetrievalConfig>,
}

/// Load and validate a [`RetrievalConfig`] from the `[retrieval]` section of
/// a TOML file. A missing section yields defaults; a missing file is an error.
pub fn load_retrieval_config(path: &Path) -> Result<RetrievalConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    let config = file.retrieval.unwrap_or_default();
    config
        .validate()
        .with_context(|| format!("invalid [retrieval] section in {}", path.display()))?;
    Ok(config)
}

const fn default_min_results() -> usize {
    8
}

const fn default_max_results() -> usize {
    12
}

const fn default_seed_k() -> usize {
    24
}

const fn default_max_depth() -> usize {
    2
}

const fn default_max_frontier() -> usize {
    64
}

const fn default_w_sim() -> f32 {
    0.6
}

const fn default_w_graph() -> f32 {
    0.4
}

fn default_depth_decay() -> Vec<f32> {
    vec![0.6, 0.3]
}

const fn default_store_timeout_ms() -> u64 {
    2000
}

const fn default_retry_backoff_ms() -> u64 {
    150
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_valid() {
        let config = RetrievalConfig::default();
        config.validate().expect("defaults must validate");
        assert_eq!(config.min_results, 8);
        assert_eq!(config.max_results, 12);
        assert_eq!(config.max_depth, 2);
        assert!((config.w_sim - 0.6).abs() < 1e-6);
        assert!((config.w_graph - 0.4).abs() < 1e-6);
    }

    #[test]
    fn decay_is_depth_indexed() {
        let config = RetrievalConfig::default();
        assert!((config.decay(1) - 0.6).abs() < 1e-6);
        assert!((config.decay(2) - 0.3).abs() < 1e-6);
        assert!(config.decay(0).abs() < 1e-6);
        assert!(config.decay(9).abs() < 1e-6);
    }

    #[test]
    fn min_above_max_is_rejected() {
        let config = RetrievalConfig {
            min_results: 20,
            ..RetrievalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn seed_k_below_max_results_is_rejected() {
        let config = RetrievalConfig {
            seed_k: 4,
            ..RetrievalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn increasing_decay_is_rejected() {
        let config = RetrievalConfig {
            depth_decay: vec![0.3, 0.6],
            ..RetrievalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_decay_table_is_rejected() {
        let config = RetrievalConfig {
            max_depth: 3,
            ..RetrievalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_retrieval_section_from_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[retrieval]\nmax_results = 6\nmin_results = 3\nseed_k = 10\nw_sim = 0.7\nw_graph = 0.3"
        )
        .expect("write config");

        let config = load_retrieval_config(file.path()).expect("load");
        assert_eq!(config.max_results, 6);
        assert_eq!(config.min_results, 3);
        assert!((config.w_sim - 0.7).abs() < 1e-6);
        // Unset fields keep their defaults.
        assert_eq!(config.max_depth, 2);
    }

    #[test]
    fn missing_section_yields_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "# no retrieval section").expect("write config");

        let config = load_retrieval_config(file.path()).expect("load");
        assert_eq!(config, RetrievalConfig::default());
    }

    #[test]
    fn invalid_section_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[retrieval]\nmax_results = 0").expect("write config");
        assert!(load_retrieval_config(file.path()).is_err());
    }
}
