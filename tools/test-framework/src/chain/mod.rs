/*!
   Chains under test: their configuration, the handle tests use to
   interact with them, and the container backed implementation driving
   a Cosmos SDK node through its command line.
*/

pub mod builtin;
pub mod chain_type;
pub mod cli;
pub mod config;
pub mod cosmos;
pub mod docker;
pub mod driver;
pub mod encoding;
pub mod exec;
pub mod factory;
pub mod handle;
pub mod poll;
pub mod spec;
pub mod tx;
