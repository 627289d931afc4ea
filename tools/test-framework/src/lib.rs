// #![deny(warnings)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![doc = include_str!("../README.md")]

//!
//! ## Overview
//!
//! This test framework starts Dymension and Cosmos SDK chains, links them
//! with an IBC relayer, and checks that ICS-20 token transfers between them
//! are relayed with the expected effect on balances and light clients.
//!
//! Chains and relayers are reached through the
//! [`ChainHandle`](crate::chain::handle::ChainHandle) and
//! [`RelayerHandle`](crate::relayer::handle::RelayerHandle) traits. They are
//! implemented by containers driven through the docker CLI, and by the
//! in-memory chains and relayer of the [`mock`] module.
//!
//! ## Example Test
//!
//! ```rust,no_run
//! use dymension_test_framework::prelude::*;
//!
//! #[test]
//! pub fn dymension_osmosis_light_client() -> Result<(), Error> {
//!     run_transfer_scenario_test(&variants::dymension_osmosis_light_client()?)
//! }
//! ```
//!
//! The scenario starts both chains, funds a relayer wallet on each at
//! genesis, creates the clients, connection and transfer channel of the
//! path, funds one user per chain, sends `1000000udym` from Dymension to
//! the Osmosis user, flushes the relayer and checks both balances. It
//! then looks for the `MsgUpdateClient` relayed to Osmosis and checks
//! that it updates `07-tendermint-0`.
//!
//! The same scenario runs in memory, without docker:
//!
//! ```rust
//! use dymension_test_framework::prelude::*;
//!
//! # fn main() -> Result<(), Error> {
//! let dir = std::env::temp_dir().join("dymension-test-framework-doc");
//! let config = TestConfig {
//!     chain_store_dir: dir.join("store"),
//!     log_dir: dir.join("logs"),
//!     ..TestConfig::default()
//! };
//!
//! let report = run_transfer_scenario(
//!     &config,
//!     &MockBackend::new(),
//!     &variants::dymension_osmosis_light_client()?,
//! )?;
//!
//! assert_eq!(report.receiver_balance, Amount::from(1_000_000u64));
//! # Ok(())
//! # }
//! ```
//!
//! ## Running Tests
//!
//! The container backed scenarios are gated behind the `interchain`
//! feature of the integration test crate:
//!
//! ```bash
//! RUST_LOG=info RUST_BACKTRACE=1 \
//!     cargo test -p dymension-integration-test --features interchain -- --test-threads=1
//! ```
//!
//! Take a look at the [`TestConfig`](crate::types::config::TestConfig)
//! type for the environment variables controlling how tests are run.
//! Each run stores its relayer homes and `.env` exports under a random
//! `test-<id>` sub-directory of `CHAIN_STORE_DIR`, and its JSON log of
//! relayer commands under `LOG_DIR`.

extern crate alloc;

pub mod bootstrap;
pub mod chain;
pub mod error;
pub mod framework;
pub mod ibc;
pub mod interchain;
pub mod mock;
pub mod prelude;
pub mod relayer;
pub mod reporter;
pub mod types;
pub mod user;
pub mod util;
