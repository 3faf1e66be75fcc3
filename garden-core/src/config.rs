//! Configuration for the Memory Garden engine.
//!
//! Loadable from TOML; every section and field has a default matching the
//! production deployment, so an empty file (or no file) yields a playable
//! engine.

use serde::{Deserialize, Serialize};

use crate::error::{GardenError, Result};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GardenConfig {
    /// Round and cooldown rules.
    #[serde(default)]
    pub game: GameRules,
    /// Reward tier weighting and coupon code shape.
    #[serde(default)]
    pub rewards: RewardConfig,
    /// Tile image pool.
    #[serde(default)]
    pub images: ImagePoolConfig,
    /// SQLite persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// HTTP binding settings, consumed by the server crate.
    #[serde(default)]
    pub server: ServerConfig,
    /// Dev override channel. Off unless a deployment opts in.
    #[serde(default)]
    pub dev: DevConfig,
}

impl GardenConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns [`GardenError::Config`] if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| GardenError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    ///
    /// # Errors
    /// Returns [`GardenError::Config`] naming the violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.game.tile_count < 2 {
            return Err(GardenError::Config(
                "game.tile_count must be at least 2".into(),
            ));
        }
        if self.game.tile_count > self.images.pool.len() {
            return Err(GardenError::Config(format!(
                "game.tile_count ({}) exceeds the image pool size ({})",
                self.game.tile_count,
                self.images.pool.len()
            )));
        }
        if self.game.squares_per_garden == 0 {
            return Err(GardenError::Config(
                "game.squares_per_garden must be at least 1".into(),
            ));
        }
        if self.rewards.tiers.is_empty() {
            return Err(GardenError::Config("rewards.tiers must not be empty".into()));
        }
        if self.rewards.tiers.iter().all(|t| t.weight == 0) {
            return Err(GardenError::Config(
                "rewards.tiers must carry at least one non-zero weight".into(),
            ));
        }
        if self.rewards.code_suffix_len == 0 {
            return Err(GardenError::Config(
                "rewards.code_suffix_len must be at least 1".into(),
            ));
        }
        if !self.images.url_template.contains("{id}") {
            return Err(GardenError::Config(
                "images.url_template must contain an {id} placeholder".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Round and cooldown rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRules {
    /// Mandatory wait between a resolved play and the next round, in seconds.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Number of tiles per round.
    #[serde(default = "default_tile_count")]
    pub tile_count: usize,
    /// Wins required to complete one garden.
    #[serde(default = "default_squares_per_garden")]
    pub squares_per_garden: u32,
    /// How long clients show the tiles face-up, in milliseconds. Cosmetic
    /// pacing only; the server never enforces it.
    #[serde(default = "default_reveal_ms")]
    pub reveal_ms: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            cooldown_seconds: 86_400,
            tile_count: 12,
            squares_per_garden: 12,
            reveal_ms: 2_000,
        }
    }
}

/// One reward tier: a discount percentage and its draw weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTier {
    /// Discount percentage granted when this tier is drawn.
    pub percentage: u8,
    /// Relative draw weight. Equal weights give a uniform draw.
    pub weight: u32,
}

/// Reward tier weighting and coupon code shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Weighted reward tiers.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<RewardTier>,
    /// Prefix for generated coupon codes.
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,
    /// Length of the random code suffix.
    #[serde(default = "default_code_suffix_len")]
    pub code_suffix_len: usize,
    /// How many candidate codes to try before giving up on a collision
    /// streak. With a 6-character alphanumeric suffix this never triggers
    /// in practice.
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            code_prefix: default_code_prefix(),
            code_suffix_len: default_code_suffix_len(),
            max_code_attempts: default_max_code_attempts(),
        }
    }
}

impl RewardConfig {
    /// The set of percentages a reward can be drawn from.
    #[must_use]
    pub fn percentages(&self) -> Vec<u8> {
        self.tiers.iter().map(|t| t.percentage).collect()
    }
}

/// Tile image pool: a curated list of image ids and a URL template with an
/// `{id}` placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePoolConfig {
    /// Image ids available for tile sampling.
    #[serde(default = "default_image_pool")]
    pub pool: Vec<u32>,
    /// URL template; `{id}` is replaced by the image id.
    #[serde(default = "default_url_template")]
    pub url_template: String,
}

impl Default for ImagePoolConfig {
    fn default() -> Self {
        Self {
            pool: default_image_pool(),
            url_template: default_url_template(),
        }
    }
}

impl ImagePoolConfig {
    /// Render the image URL for one pool id.
    #[must_use]
    pub fn url_for(&self, id: u32) -> String {
        self.url_template.replace("{id}", &id.to_string())
    }
}

/// SQLite persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            busy_timeout_ms: 5_000,
        }
    }
}

/// HTTP binding settings, consumed by the server crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Name of the identity cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Identity cookie lifetime in days.
    #[serde(default = "default_cookie_max_age_days")]
    pub cookie_max_age_days: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cookie_name: default_cookie_name(),
            cookie_max_age_days: default_cookie_max_age_days(),
        }
    }
}

/// Dev override channel capability flag. Resolved at deployment time and
/// never reachable through the public contract when disabled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DevConfig {
    /// Whether forced outcomes and cooldown/garden resets are permitted.
    #[serde(default)]
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_cooldown_seconds() -> u64 {
    86_400
}
fn default_tile_count() -> usize {
    12
}
fn default_squares_per_garden() -> u32 {
    12
}
fn default_reveal_ms() -> u64 {
    2_000
}
fn default_tiers() -> Vec<RewardTier> {
    vec![
        RewardTier { percentage: 1, weight: 70 },
        RewardTier { percentage: 2, weight: 25 },
        RewardTier { percentage: 3, weight: 5 },
    ]
}
fn default_code_prefix() -> String {
    "MG".to_string()
}
fn default_code_suffix_len() -> usize {
    6
}
fn default_max_code_attempts() -> u32 {
    16
}
fn default_url_template() -> String {
    "https://picsum.photos/id/{id}/200/200".to_string()
}
fn default_busy_timeout_ms() -> u32 {
    5_000
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    15_002
}
fn default_cookie_name() -> String {
    "mg_uid".to_string()
}
fn default_cookie_max_age_days() -> u32 {
    365
}

// Curated nature/landscape image ids.
fn default_image_pool() -> Vec<u32> {
    vec![
        10, 11, 15, 16, 17, 18, 19, 20, 22, 24, 27, 28, 29, 36, 37, 39, 40, 42, 43, 47, 48, 49,
        50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 62, 63, 64, 65, 66, 67, 68, 69, 70, 71, 73,
        74,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = GardenConfig::from_toml("").expect("defaults parse");
        assert_eq!(config.game.cooldown_seconds, 86_400);
        assert_eq!(config.game.tile_count, 12);
        assert_eq!(config.game.squares_per_garden, 12);
        assert_eq!(config.rewards.tiers.len(), 3);
        assert!(!config.dev.enabled);
    }

    #[test]
    fn partial_toml_overrides_one_section() {
        let config = GardenConfig::from_toml(
            r#"
            [game]
            cooldown_seconds = 30
            tile_count = 4

            [dev]
            enabled = true
            "#,
        )
        .expect("parses");
        assert_eq!(config.game.cooldown_seconds, 30);
        assert_eq!(config.game.tile_count, 4);
        assert_eq!(config.game.reveal_ms, 2_000);
        assert!(config.dev.enabled);
    }

    #[test]
    fn rejects_tile_count_beyond_pool() {
        let mut config = GardenConfig::default();
        config.game.tile_count = config.images.pool.len() + 1;
        assert!(matches!(config.validate(), Err(GardenError::Config(_))));
    }

    #[test]
    fn rejects_empty_reward_tiers() {
        let mut config = GardenConfig::default();
        config.rewards.tiers.clear();
        assert!(matches!(config.validate(), Err(GardenError::Config(_))));
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let mut config = GardenConfig::default();
        config.images.url_template = "https://example.com/static.png".into();
        assert!(matches!(config.validate(), Err(GardenError::Config(_))));
    }

    #[test]
    fn url_template_substitutes_id() {
        let images = ImagePoolConfig::default();
        assert_eq!(images.url_for(42), "https://picsum.photos/id/42/200/200");
    }
}
