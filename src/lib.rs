//! End-to-end behavioral test support for the grid study platform.
//!
//! This crate is the library half of a cucumber test suite driving a live
//! deployment of the platform micro-services (directory, explore, study,
//! case, network-conversion, filter, config, actions, modification) over
//! HTTP and WebSocket. It provides:
//!
//! * [`env::EnvProperties`]: per-environment service URL resolution,
//! * [`context::TestContext`]: the per-scenario alias tables,
//! * [`client`]: one thin REST wrapper per micro-service,
//! * [`notification`]: WebSocket-based completion waiting,
//! * [`retry`]: the fixed-delay polling helper,
//! * [`util`]: data-file lookup and JSON comparison helpers.
//!
//! The step definitions live in the `bdd` test target (`tests/bdd/`):
//!
//! ```bash
//! USING_PLATFORM=local cargo test --test bdd
//! ```

pub mod client;
pub mod context;
pub mod env;
pub mod error;
pub mod notification;
pub mod retry;
pub mod util;

pub use context::TestContext;
pub use env::EnvProperties;
pub use error::{BddError, Result};
