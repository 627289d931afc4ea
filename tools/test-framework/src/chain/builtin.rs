/*!
   Builtin chain presets, looked up by chain name when resolving a
   [`ChainSpec`](crate::chain::spec::ChainSpec).
*/

use crate::chain::chain_type::ChainType;
use crate::chain::docker::DockerImage;
use crate::chain::spec::{ChainConfig, ChainPresets, GenesisAmounts};

const HEIGHLINER_REGISTRY: &str = "ghcr.io/strangelove-ventures/heighliner";
const HEIGHLINER_UID_GID: &str = "1025:1025";

fn heighliner_image(name: &str, version: &str) -> DockerImage {
    DockerImage::new(&format!("{HEIGHLINER_REGISTRY}/{name}"), version)
        .with_uid_gid(HEIGHLINER_UID_GID)
}

fn cosmos_config(
    name: &str,
    chain_id: &str,
    image: DockerImage,
    bin: &str,
    bech32_prefix: &str,
    denom: &str,
    gas_prices: &str,
    trusting_period: &str,
) -> ChainConfig {
    let chain_type = ChainType::Cosmos;

    ChainConfig {
        chain_type,
        name: name.to_string(),
        chain_id: chain_id.to_string(),
        images: vec![image],
        bin: bin.to_string(),
        bech32_prefix: bech32_prefix.to_string(),
        denom: denom.to_string(),
        coin_type: chain_type.coin_type(),
        gas_prices: gas_prices.to_string(),
        gas_adjustment: 1.3,
        trusting_period: trusting_period.to_string(),
        encoding: chain_type.default_encoding(),
        genesis_amounts: GenesisAmounts::default(),
        modify_genesis: Vec::new(),
        no_host_mount: false,
    }
}

pub fn gaia() -> ChainConfig {
    cosmos_config(
        "gaia",
        "cosmoshub-1004",
        heighliner_image("gaia", "v9.1.0"),
        "gaiad",
        "cosmos",
        "uatom",
        "0.01uatom",
        "504h",
    )
}

pub fn osmosis() -> ChainConfig {
    cosmos_config(
        "osmosis",
        "osmosis-1001",
        heighliner_image("osmosis", "v11.0.0"),
        "osmosisd",
        "osmo",
        "uosmo",
        "0.0025uosmo",
        "336h",
    )
}

/**
   Dymension runs the EVM module, so its accounts use ethermint keys and
   its transactions need the ethermint types to be decoded. The image is
   expected to be built locally.
*/
pub fn dymension() -> ChainConfig {
    let chain_type = ChainType::Ethermint;

    ChainConfig {
        chain_type,
        name: "dymension".to_string(),
        chain_id: "dymension_100-1".to_string(),
        images: vec![DockerImage::new("dymension", "latest").with_uid_gid(HEIGHLINER_UID_GID)],
        bin: "dymd".to_string(),
        bech32_prefix: "dym".to_string(),
        denom: "udym".to_string(),
        coin_type: chain_type.coin_type(),
        gas_prices: "0udym".to_string(),
        gas_adjustment: 0.0,
        trusting_period: "168h0m0s".to_string(),
        encoding: chain_type.default_encoding(),
        genesis_amounts: GenesisAmounts::default(),
        modify_genesis: Vec::new(),
        no_host_mount: false,
    }
}

pub fn builtin_chain_presets() -> ChainPresets {
    [gaia(), osmosis(), dymension()]
        .into_iter()
        .map(|config| (config.name.clone(), config))
        .collect()
}

pub fn builtin_chain_config(name: &str) -> Option<ChainConfig> {
    builtin_chain_presets().remove(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn presets_are_keyed_by_name() {
        let presets = builtin_chain_presets();

        assert_eq!(presets.len(), 3);
        for (name, config) in presets {
            assert_eq!(name, config.name);
            assert!(!config.images.is_empty());
        }
    }

    #[test_log::test]
    fn dymension_uses_evm_encoding() {
        let config = builtin_chain_config("dymension").unwrap();

        assert_eq!(config.chain_type, ChainType::Ethermint);
        assert!(config
            .encoding
            .interface_registry
            .is_registered("/ethermint.crypto.v1.ethsecp256k1.PubKey"));

        assert!(builtin_chain_config("juno").is_none());
    }
}
