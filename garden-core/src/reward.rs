//! Reward tier drawing and coupon code generation.
//!
//! The percentage is drawn from a small weighted tier set; the weighting is
//! deployment configuration, not a constant. Codes are a fixed prefix plus
//! a random uppercase alphanumeric suffix; global uniqueness is enforced by
//! the caller against the coupon store, with the generator only providing
//! candidates.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::RewardConfig;
use crate::error::{GardenError, Result};

/// Characters used for code suffixes. Uppercase plus digits keeps codes
/// shout-out-loud friendly at checkout.
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A freshly minted reward: the drawn percentage and its coupon code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrant {
    /// Discount percentage.
    pub percentage: u8,
    /// Coupon code, unique across all players and time.
    pub code: String,
}

/// Draw a reward percentage from the configured weighted tiers.
///
/// # Errors
/// Returns [`GardenError::Config`] if the tier table is empty or carries
/// no positive weight; `GardenConfig::validate` rejects such tables up
/// front.
pub fn draw_percentage(rewards: &RewardConfig, rng: &mut impl Rng) -> Result<u8> {
    let weights: Vec<u32> = rewards.tiers.iter().map(|t| t.weight).collect();
    let index = WeightedIndex::new(&weights)
        .map_err(|e| GardenError::Config(format!("invalid reward weights: {e}")))?;
    Ok(rewards.tiers[index.sample(rng)].percentage)
}

/// Generate one candidate coupon code, e.g. `MG-A3X7K2`.
#[must_use]
pub fn generate_code(rewards: &RewardConfig, rng: &mut impl Rng) -> String {
    let suffix: String = (0..rewards.code_suffix_len)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect();
    format!("{}-{}", rewards.code_prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewardTier;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn drawn_percentage_is_always_a_configured_tier() {
        let rewards = RewardConfig::default();
        let allowed: HashSet<u8> = rewards.percentages().into_iter().collect();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            let pct = draw_percentage(&rewards, &mut rng).expect("draws");
            assert!(allowed.contains(&pct), "unexpected percentage {pct}");
        }
    }

    #[test]
    fn every_tier_is_reachable() {
        let rewards = RewardConfig::default();
        let mut rng = StdRng::seed_from_u64(4);
        let seen: HashSet<u8> = (0..2_000)
            .map(|_| draw_percentage(&rewards, &mut rng).expect("draws"))
            .collect();
        assert_eq!(seen.len(), rewards.tiers.len());
    }

    #[test]
    fn zero_weight_tier_is_never_drawn() {
        let rewards = RewardConfig {
            tiers: vec![
                RewardTier { percentage: 1, weight: 1 },
                RewardTier { percentage: 50, weight: 0 },
            ],
            ..RewardConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..200 {
            assert_eq!(draw_percentage(&rewards, &mut rng).expect("draws"), 1);
        }
    }

    #[test]
    fn code_has_prefix_and_suffix_shape() {
        let rewards = RewardConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let code = generate_code(&rewards, &mut rng);
        let (prefix, suffix) = code.split_once('-').expect("dash separator");
        assert_eq!(prefix, "MG");
        assert_eq!(suffix.len(), 6);
        assert!(suffix
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn codes_vary_across_draws() {
        let rewards = RewardConfig::default();
        let mut rng = StdRng::seed_from_u64(8);
        let codes: HashSet<String> = (0..100).map(|_| generate_code(&rewards, &mut rng)).collect();
        assert!(codes.len() > 95, "suffixes should rarely collide");
    }
}
