//! # Memory Garden Core Engine
//!
//! Server-authoritative round engine for the Memory Garden: each player may
//! attempt one timed memory challenge per cooldown window. The engine issues
//! a secret round (a tile set plus one matching target), validates a single
//! answer submission, grants a weighted random coupon reward on a win, and
//! tracks long-lived garden progression across many rounds.
//!
//! The crate is deliberately framework-agnostic: all HTTP, rendering, and
//! animation concerns live in sibling crates. What lives here is the state
//! machine the presentation layer must defer to:
//!
//! - [`engine::GardenEngine`] - the single entry point (`ensure_player`,
//!   `status`, `submit_play`, `redeem_coupon`, plus dev overrides)
//! - [`round::RoundStore`] - at most one active round per player,
//!   last-generated-wins supersede semantics
//! - [`cooldown`] - on-demand eligibility from a stored timestamp; no
//!   background timers, so eligibility survives restarts
//! - [`reward`] - weighted reward tiers and globally unique coupon codes
//! - [`progression`] - the squares/gardens counter rollover
//! - [`store::GardenStore`] - durable players, coupons, and play history
//!   in SQLite
//!
//! ## Authority contract
//!
//! Clients never learn the correct tile before submitting, never compute
//! win/loss locally, and must echo the `round_id` they were issued; a
//! submission against anything but the player's current active round fails
//! as stale. All persistent side effects of a resolved play commit in one
//! transaction, so a failed commit grants nothing and consumes no round.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod progression;
pub mod reward;
pub mod round;
pub mod store;
pub mod tiles;
pub mod types;

pub use config::GardenConfig;
pub use engine::{GameStatus, GardenEngine, Outcome, PlayResolution};
pub use error::{GardenError, Result};
pub use types::*;
