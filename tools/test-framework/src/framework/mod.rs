/*!
   Framework code for running the IBC transfer scenarios with minimal
   setup. Test writers pick a [`TransferScenario`](transfer::TransferScenario)
   from [`variants`] or build their own, and run it with
   [`run_transfer_scenario_test`](transfer::run_transfer_scenario_test).
*/

pub mod backend;
pub mod base;
pub mod transfer;
pub mod variants;
