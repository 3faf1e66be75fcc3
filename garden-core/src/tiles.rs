//! Tile set generation for one round.
//!
//! A round shows a fixed number of tiles, each with a distinct image
//! sampled from the curated pool. The target shown during the prompt phase
//! is a byte-identical copy of exactly one tile's image, so a unique
//! correct answer always exists and can only be found by visual matching.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ImagePoolConfig;
use crate::error::{GardenError, Result};
use crate::types::TileId;

/// One displayed tile slot: a round-scoped id plus the image it shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Round-scoped identifier, distinct from the image URL.
    pub id: TileId,
    /// URL of the image this tile shows.
    pub image_url: String,
}

/// Sample `count` tiles with pairwise-distinct images from the pool.
///
/// Tile ids are assigned sequentially after the shuffle, so they carry no
/// information about which pool image landed where.
///
/// # Errors
/// Returns [`GardenError::Config`] if the pool is smaller than `count`.
pub fn generate_tile_set(
    images: &ImagePoolConfig,
    count: usize,
    rng: &mut impl Rng,
) -> Result<Vec<Tile>> {
    if images.pool.len() < count {
        return Err(GardenError::Config(format!(
            "image pool has {} entries, need {count}",
            images.pool.len()
        )));
    }

    let tiles = images
        .pool
        .choose_multiple(rng, count)
        .enumerate()
        .map(|(index, image_id)| Tile {
            id: TileId(index as u32 + 1),
            image_url: images.url_for(*image_id),
        })
        .collect();
    Ok(tiles)
}

/// Designate one tile of the set as the memorization target.
///
/// # Errors
/// Returns [`GardenError::Config`] if the set is empty.
pub fn pick_target<'a>(tiles: &'a [Tile], rng: &mut impl Rng) -> Result<&'a Tile> {
    tiles
        .choose(rng)
        .ok_or_else(|| GardenError::Config("cannot pick a target from an empty tile set".into()))
}
