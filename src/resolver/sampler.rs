//! Sample pools and the weighted rating distribution.
//!
//! Pools are fixed, immutable lists of candidate values loaded at compile
//! time from `sample_pools.json` (overridable through configuration).
//! Selection is uniform random, except ratings, which draw from a
//! configurable discrete distribution over 1–5.
//!
//! Invariants enforced at load: the name, positive-comment, and
//! choice-format pools are non-empty with non-empty entries; the
//! improvement and additional pools may contain the empty string,
//! modeling optional feedback that is sometimes left blank.

use anyhow::{bail, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Raw JSON content of the default sample pools, embedded at compile time
/// so there is no runtime file I/O.
const SAMPLE_POOLS_JSON: &str = include_str!("sample_pools.json");

/// Identifies one named sample pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolId {
    /// Respondent names.
    Names,
    /// Positive-experience comments.
    Positive,
    /// Improvement suggestions (may be blank).
    Improvement,
    /// Closing / additional comments (may be blank).
    Additional,
    /// Answer-option labels for choice questions.
    Formats,
}

/// The full set of named sample pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplePools {
    pub names: Vec<String>,
    pub positive: Vec<String>,
    pub improvement: Vec<String>,
    pub additional: Vec<String>,
    pub formats: Vec<String>,
}

impl SamplePools {
    /// The built-in pools.
    pub fn embedded() -> Self {
        let pools: SamplePools =
            serde_json::from_str(SAMPLE_POOLS_JSON).expect("embedded sample pools are valid JSON");
        pools
            .validated()
            .expect("embedded sample pools satisfy invariants")
    }

    /// Validate pool invariants, consuming and returning self.
    ///
    /// Pools that must always produce a value (names, positive, formats)
    /// must be non-empty and contain no blank entries. The optional pools
    /// must be non-empty as lists but may contain blank entries.
    pub fn validated(self) -> Result<Self> {
        for (pool, values, allow_blank) in [
            ("names", &self.names, false),
            ("positive", &self.positive, false),
            ("formats", &self.formats, false),
            ("improvement", &self.improvement, true),
            ("additional", &self.additional, true),
        ] {
            if values.is_empty() {
                bail!("sample pool '{pool}' is empty");
            }
            if !allow_blank && values.iter().any(|v| v.trim().is_empty()) {
                bail!("sample pool '{pool}' contains a blank entry");
            }
        }
        Ok(self)
    }

    /// The values of one pool.
    pub fn get(&self, id: PoolId) -> &[String] {
        match id {
            PoolId::Names => &self.names,
            PoolId::Positive => &self.positive,
            PoolId::Improvement => &self.improvement,
            PoolId::Additional => &self.additional,
            PoolId::Formats => &self.formats,
        }
    }

    /// Draw one value uniformly at random from a pool.
    pub fn pick<R: Rng>(&self, id: PoolId, rng: &mut R) -> &str {
        let values = self.get(id);
        &values[rng.gen_range(0..values.len())]
    }
}

/// Discrete probability distribution over the ratings 1–5.
///
/// The exact weights are a configuration parameter, not a fixed law; the
/// default mildly favors 4–5 the way real survey feedback skews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 5]", into = "[f64; 5]")]
pub struct RatingWeights([f64; 5]);

impl Default for RatingWeights {
    fn default() -> Self {
        Self([0.05, 0.10, 0.20, 0.35, 0.30])
    }
}

impl RatingWeights {
    /// Build a distribution, checking that weights are non-negative and
    /// sum to 1 within floating-point tolerance.
    pub fn new(weights: [f64; 5]) -> Result<Self> {
        if weights.iter().any(|&w| w < 0.0) {
            bail!("rating weights must be non-negative");
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            bail!("rating weights must sum to 1 (got {sum})");
        }
        Ok(Self(weights))
    }

    /// The weight assigned to a rating (1-indexed).
    pub fn weight(&self, rating: u8) -> f64 {
        self.0[(rating - 1) as usize]
    }

    /// Sample a rating in 1–5 by cumulative scan.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> u8 {
        let roll: f64 = rng.gen();
        let mut cumulative = 0.0;
        for (i, w) in self.0.iter().enumerate() {
            cumulative += w;
            if roll <= cumulative {
                return (i + 1) as u8;
            }
        }
        5
    }
}

impl TryFrom<[f64; 5]> for RatingWeights {
    type Error = anyhow::Error;
    fn try_from(weights: [f64; 5]) -> Result<Self> {
        Self::new(weights)
    }
}

impl From<RatingWeights> for [f64; 5] {
    fn from(w: RatingWeights) -> Self {
        w.0
    }
}
