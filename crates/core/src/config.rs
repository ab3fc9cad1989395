use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::Difficulty;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    pub constraints: ConstraintConfig,
    pub batch: BatchConfig,
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    /// Seed for the generator RNG. `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub difficulty: Difficulty,
    /// Chance that a small standalone number is rendered as a word.
    pub word_number_prob: f64,
    pub perturbation_level: f64,
    /// Chance of picking a `gsm8k_style` template variant when one exists.
    pub gsm8k_style_prob: f64,
    pub messy_vocab_prob: f64,
    /// Relative tolerance for the formula/trace answer cross-check.
    pub answer_tolerance: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConstraintConfig {
    pub max_attempts: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub use_depth_distribution: bool,
    /// Trace depth -> sampling weight.
    pub depth_weights: BTreeMap<usize, f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub schema_dir: PathBuf,
    pub vocab_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("FORGE_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map FORGE__GENERATION__SEED=7 to generation.seed
            .add_source(Environment::with_prefix("FORGE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl GenerationConfig {
    /// Higher diversity, gsm8k-style templates preferred.
    pub fn for_training(seed: Option<u64>) -> Self {
        Self {
            seed,
            messy_vocab_prob: 0.3,
            perturbation_level: 0.4,
            gsm8k_style_prob: 0.6,
            ..Self::default()
        }
    }

    /// Low diversity for consistent evaluation sets.
    pub fn for_evaluation(seed: Option<u64>) -> Self {
        Self {
            seed,
            messy_vocab_prob: 0.0,
            perturbation_level: 0.0,
            gsm8k_style_prob: 0.0,
            ..Self::default()
        }
    }

    /// Reproducible, plain output.
    pub fn for_debugging(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            difficulty: Difficulty::Easy,
            word_number_prob: 0.0,
            messy_vocab_prob: 0.0,
            perturbation_level: 0.0,
            gsm8k_style_prob: 0.0,
            ..Self::default()
        }
    }

    /// Clamp every probability into `[0, 1]`. NaN falls back to the default.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        self.word_number_prob = probability(self.word_number_prob, defaults.word_number_prob);
        self.perturbation_level = probability(self.perturbation_level, defaults.perturbation_level);
        self.gsm8k_style_prob = probability(self.gsm8k_style_prob, defaults.gsm8k_style_prob);
        self.messy_vocab_prob = probability(self.messy_vocab_prob, defaults.messy_vocab_prob);
        if self.answer_tolerance.is_nan() || self.answer_tolerance <= 0.0 {
            self.answer_tolerance = DEFAULT_ANSWER_TOLERANCE;
        }
        self
    }
}

fn probability(value: f64, default: f64) -> f64 {
    if value.is_nan() {
        default
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Relative tolerance between formula and trace answers.
pub const DEFAULT_ANSWER_TOLERANCE: f64 = 1e-6;

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            difficulty: Difficulty::Medium,
            word_number_prob: 0.3,
            perturbation_level: 0.0,
            gsm8k_style_prob: 0.3,
            messy_vocab_prob: 0.2,
            answer_tolerance: DEFAULT_ANSWER_TOLERANCE,
        }
    }
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self { max_attempts: 10 }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        // Share of GSM-8K problems by number of compute steps.
        let depth_weights = [(1, 0.05), (2, 0.20), (3, 0.30), (4, 0.25), (5, 0.12), (6, 0.08)]
            .into_iter()
            .collect();

        Self {
            batch_size: 10,
            use_depth_distribution: false,
            depth_weights,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            schema_dir: PathBuf::from("crates/arithmetic/data/schemas"),
            vocab_dir: PathBuf::from("crates/arithmetic/data/vocab"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,virtual_expert_arithmetic=debug".into(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let eval = GenerationConfig::for_evaluation(Some(3));
        assert_eq!(eval.seed, Some(3));
        assert_eq!(eval.perturbation_level, 0.0);

        let debug = GenerationConfig::for_debugging(42);
        assert_eq!(debug.difficulty, Difficulty::Easy);
        assert_eq!(debug.word_number_prob, 0.0);
    }

    #[test]
    fn test_normalized_clamps_probabilities() {
        let config = GenerationConfig {
            word_number_prob: 1.7,
            perturbation_level: -0.2,
            answer_tolerance: 0.0,
            ..GenerationConfig::default()
        }
        .normalized();

        assert_eq!(config.word_number_prob, 1.0);
        assert_eq!(config.perturbation_level, 0.0);
        assert_eq!(config.answer_tolerance, DEFAULT_ANSWER_TOLERANCE);
    }

    #[test]
    fn test_normalized_replaces_nan_with_defaults() {
        let config = GenerationConfig {
            word_number_prob: f64::NAN,
            perturbation_level: f64::NAN,
            gsm8k_style_prob: f64::NAN,
            messy_vocab_prob: f64::NAN,
            answer_tolerance: f64::NAN,
            ..GenerationConfig::default()
        }
        .normalized();
        let defaults = GenerationConfig::default();

        assert_eq!(config.word_number_prob, defaults.word_number_prob);
        assert_eq!(config.perturbation_level, defaults.perturbation_level);
        assert_eq!(config.gsm8k_style_prob, defaults.gsm8k_style_prob);
        assert_eq!(config.messy_vocab_prob, defaults.messy_vocab_prob);
        assert_eq!(config.answer_tolerance, DEFAULT_ANSWER_TOLERANCE);
    }

    #[test]
    fn test_default_depth_weights() {
        let batch = BatchConfig::default();
        assert_eq!(batch.depth_weights.len(), 6);
        assert!(batch.depth_weights[&3] > batch.depth_weights[&1]);
    }
}
