/*!
   Relayers driven by the tests, and the selection of the channels
   they create.
*/

pub mod docker;
pub mod factory;
pub mod handle;
pub mod hermes;
pub mod rly;
