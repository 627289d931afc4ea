/*!
   The transfer scenarios against chains and relayers running in docker.
*/

use dymension_test_framework::prelude::*;

#[test]
fn test_dymension_osmosis_light_client() -> Result<(), Error> {
    run_transfer_scenario_test(&variants::dymension_osmosis_light_client()?)
}

#[test]
fn test_dymension_osmosis_custom_relayer() -> Result<(), Error> {
    run_transfer_scenario_test(&variants::dymension_osmosis_custom_relayer()?)
}

#[test]
fn test_dymension_gaia_light_client() -> Result<(), Error> {
    run_transfer_scenario_test(&variants::dymension_gaia_light_client()?)
}

#[test]
fn test_dymension_gaia() -> Result<(), Error> {
    run_transfer_scenario_test(&variants::dymension_gaia()?)
}

/// The light client scenario relayed by hermes instead of rly.
#[test]
fn test_dymension_osmosis_hermes() -> Result<(), Error> {
    let mut scenario = variants::dymension_osmosis_light_client()?
        .with_relayer(BuiltinRelayerFactory::new(RelayerImpl::Hermes));

    scenario.name = "dymension_osmosis_hermes".to_string();

    run_transfer_scenario_test(&scenario)
}
