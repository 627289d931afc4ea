/*!
   The transfer scenarios run between Dymension and the builtin Cosmos
   SDK chains. They differ in the counterparty chain, the relayer image,
   the gas adjustment of Dymension, the types registered for decoding
   its transactions, and whether the light client update is checked.
*/

use crate::chain::builtin::dymension;
use crate::chain::docker::DockerImage;
use crate::chain::encoding::{default_encoding, evm_encoding};
use crate::chain::spec::{ChainSpec, GenesisAmounts};
use crate::error::Error;
use crate::framework::transfer::{LightClientCheck, TransferScenario};
use crate::relayer::factory::{BuiltinRelayerFactory, RelayerImpl, RelayerOption};
use crate::relayer::rly::{RLY_IMAGE, RLY_UID_GID};

pub const DYMENSION_GENESIS_AMOUNT: &str = "1000000000000000000000000";
pub const DYMENSION_STAKING_AMOUNT: &str = "500000000000000000000000";

pub const OSMOSIS_VERSION: &str = "v11.0.0";

/// The path name used by every variant.
pub const IBC_PATH: &str = "gaia-osmo-demo";

pub const ETHERMINT_RLY_VERSION: &str = "reece-v2.3.1-ethermint";

/**
   Dymension with a zero gas price, ethermint types registered and
   large genesis balances, so that a single validator can stake.
*/
pub fn dymension_spec(gas_adjustment: f64, evm: bool) -> Result<ChainSpec, Error> {
    let mut config = dymension();

    config.gas_adjustment = gas_adjustment;
    config.encoding = if evm { evm_encoding() } else { default_encoding() };
    config.genesis_amounts =
        GenesisAmounts::parse(DYMENSION_GENESIS_AMOUNT, DYMENSION_STAKING_AMOUNT)?;

    Ok(ChainSpec::new("dymension")
        .with_version("latest")
        .with_config(config))
}

/// The rly build that knows the ethermint account types.
pub fn ethermint_rly() -> BuiltinRelayerFactory {
    BuiltinRelayerFactory::new(RelayerImpl::CosmosRly).with_options([
        RelayerOption::DockerImage(
            DockerImage::new(RLY_IMAGE, ETHERMINT_RLY_VERSION)
                .with_uid_gid(RLY_UID_GID),
        ),
        RelayerOption::StartupFlags(
            ["--processor", "events", "--block-history", "100"]
                .iter()
                .map(|flag| flag.to_string())
                .collect(),
        ),
    ])
}

/// Transfer to osmosis and check the client update relayed to it.
pub fn dymension_osmosis_light_client() -> Result<TransferScenario, Error> {
    Ok(TransferScenario::new(
        "dymension_osmosis_light_client",
        dymension_spec(0.0, true)?,
        ChainSpec::new("osmosis").with_version(OSMOSIS_VERSION),
    )
    .with_path(IBC_PATH)
    .with_light_client_check(LightClientCheck::default()))
}

/// Transfer to osmosis relayed by the ethermint build of rly.
pub fn dymension_osmosis_custom_relayer() -> Result<TransferScenario, Error> {
    Ok(TransferScenario::new(
        "dymension_osmosis_custom_relayer",
        dymension_spec(1.5, true)?,
        ChainSpec::new("osmosis").with_version(OSMOSIS_VERSION),
    )
    .with_path(IBC_PATH)
    .with_relayer(ethermint_rly()))
}

pub fn dymension_gaia_light_client() -> Result<TransferScenario, Error> {
    Ok(TransferScenario::new(
        "dymension_gaia_light_client",
        dymension_spec(0.0, true)?,
        ChainSpec::new("gaia"),
    )
    .with_path(IBC_PATH)
    .with_light_client_check(LightClientCheck::default()))
}

/// Transfer to gaia without registering the ethermint types.
pub fn dymension_gaia() -> Result<TransferScenario, Error> {
    Ok(TransferScenario::new(
        "dymension_gaia",
        dymension_spec(0.0, false)?,
        ChainSpec::new("gaia"),
    )
    .with_path(IBC_PATH))
}

pub fn all_variants() -> Result<Vec<TransferScenario>, Error> {
    Ok(vec![
        dymension_osmosis_light_client()?,
        dymension_osmosis_custom_relayer()?,
        dymension_gaia_light_client()?,
        dymension_gaia()?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::builtin::builtin_chain_presets;
    use crate::chain::encoding::{
        register_ethermint_interfaces, InterfaceRegistry, PUBKEY_INTERFACE,
    };

    #[test_log::test]
    fn variants_resolve_dymension_first() {
        let presets = builtin_chain_presets();

        for scenario in all_variants().unwrap() {
            let source = scenario.source.resolve(0, &presets).unwrap();
            let destination = scenario.destination.resolve(1, &presets).unwrap();

            assert_eq!(source.chain_id, "dymension_100-1");
            assert_eq!(source.gas_prices, "0udym");
            assert_eq!(
                source.genesis_amounts.genesis.to_string(),
                DYMENSION_GENESIS_AMOUNT
            );
            assert_ne!(destination.chain_id, source.chain_id);
            assert_eq!(scenario.path, IBC_PATH);
        }
    }

    #[test_log::test]
    fn variants_differ_in_checks_and_encoding() {
        let presets = builtin_chain_presets();
        let mut ethermint = InterfaceRegistry::new();
        register_ethermint_interfaces(&mut ethermint);
        let ethermint_types = ethermint.list_implementations(PUBKEY_INTERFACE);

        let with_check = dymension_osmosis_light_client().unwrap();
        assert!(with_check.light_client_check.is_some());

        let custom = dymension_osmosis_custom_relayer().unwrap();
        assert!(custom.light_client_check.is_none());
        assert_eq!(custom.relayer.image().unwrap().version, ETHERMINT_RLY_VERSION);
        assert_eq!(
            custom.source.resolve(0, &presets).unwrap().gas_adjustment,
            1.5
        );

        let plain = dymension_gaia().unwrap().source.resolve(0, &presets).unwrap();
        for type_url in ethermint_types.iter() {
            assert!(!plain.encoding.interface_registry.is_registered(type_url));
        }

        let evm = with_check.source.resolve(0, &presets).unwrap();
        for type_url in ethermint_types.iter() {
            assert!(evm.encoding.interface_registry.is_registered(type_url));
        }
    }
}
