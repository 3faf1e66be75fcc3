//! # garden-client
//!
//! Framework-agnostic client session for the Memory Garden.
//!
//! One session module drives the visible round phases for every UI stack;
//! views subscribe to phase changes and render, instead of re-deriving the
//! game logic per framework.
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                  View layer                │
//! │   (DOM bindings, React bindings, tests)    │
//! │                      │                     │
//! │                      ▼                     │
//! │   ┌────────────────────────────────────┐   │
//! │   │        RoundSession<A>             │   │
//! │   │  init / begin / tick / submit      │   │
//! │   │  subscribe(phase changes)          │   │
//! │   └───────┬──────────────────┬─────────┘   │
//! │           ▼                  ▼             │
//! │   ┌──────────────┐   ┌───────────────┐     │
//! │   │ RoundMachine │   │ A: GardenApi  │     │
//! │   │ (pure state) │   │ (HTTP or mock)│     │
//! │   └──────────────┘   └───────────────┘     │
//! └────────────────────────────────────────────┘
//! ```
//!
//! The machine is pure and synchronous: reveal pacing is cosmetic and
//! driven by explicit `tick(now)` calls, the server's answer is the only
//! source of win/loss, and exactly one submission can leave a session per
//! round. A stale-round rejection resets the machine to `Init`, whose
//! recovery is simply to fetch status again.

pub mod error;
pub mod machine;
pub mod session;
pub mod transport;

pub use error::ClientError;
pub use machine::{Phase, PhaseChange, RoundMachine};
pub use session::{GardenApi, RoundSession};
pub use transport::GardenHttp;
