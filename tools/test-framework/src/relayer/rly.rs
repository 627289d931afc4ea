/*!
   The command line of the Go relayer, `rly`.
*/

use ibc_relayer_types::core::ics24_host::identifier::ChannelId;
use serde::{Deserialize, Serialize};
use serde_json as json;

use crate::chain::chain_type::ChainType;
use crate::chain::docker::DockerImage;
use crate::chain::spec::ChainConfig;
use crate::error::Error;
use crate::relayer::docker::{command_args, RelayerCommand, RelayerCommander};
use crate::relayer::handle::ChannelOutput;

pub const RLY_IMAGE: &str = "ghcr.io/cosmos/relayer";
pub const RLY_DEFAULT_VERSION: &str = "v2.4.2";
pub const RLY_UID_GID: &str = "100:1000";

const DEFAULT_RLY_GAS_ADJUSTMENT: f64 = 1.3;

#[derive(Clone, Debug, Default)]
pub struct CosmosRly;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlyChainConfig {
    #[serde(rename = "type")]
    pub chain_type: String,
    pub value: RlyChainConfigValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RlyChainConfigValue {
    pub key: String,
    pub chain_id: String,
    pub rpc_addr: String,
    pub grpc_addr: String,
    pub account_prefix: String,
    pub keyring_backend: String,
    pub gas_adjustment: f64,
    pub gas_prices: String,
    pub coin_type: u32,
    pub debug: bool,
    pub timeout: String,
    pub output_format: String,
    pub sign_mode: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_codecs: Vec<String>,
}

impl RlyChainConfig {
    pub fn new(chain: &ChainConfig, key_name: &str, rpc_address: &str, grpc_address: &str) -> Self {
        let gas_adjustment = if chain.gas_adjustment > 0.0 {
            chain.gas_adjustment
        } else {
            DEFAULT_RLY_GAS_ADJUSTMENT
        };

        let extra_codecs = match chain.chain_type {
            ChainType::Cosmos => Vec::new(),
            ChainType::Ethermint => vec!["ethermint".to_string()],
        };

        Self {
            chain_type: "cosmos".to_string(),
            value: RlyChainConfigValue {
                key: key_name.to_string(),
                chain_id: chain.chain_id.clone(),
                rpc_addr: rpc_address.to_string(),
                grpc_addr: grpc_address.to_string(),
                account_prefix: chain.bech32_prefix.clone(),
                keyring_backend: "test".to_string(),
                gas_adjustment,
                gas_prices: chain.gas_prices.clone(),
                coin_type: chain.coin_type,
                debug: true,
                timeout: "20s".to_string(),
                output_format: "json".to_string(),
                sign_mode: "direct".to_string(),
                extra_codecs,
            },
        }
    }
}

/// `rly q channels` prints one JSON encoded channel per line.
pub fn parse_rly_channels(stdout: &str) -> Result<Vec<ChannelOutput>, Error> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| json::from_str(line).map_err(Error::from))
        .collect()
}

fn with_home(mut args: Vec<String>, home: &str) -> Vec<String> {
    args.extend(["--home".to_string(), home.to_string()]);
    args
}

impl RelayerCommander for CosmosRly {
    fn name(&self) -> &str {
        "rly"
    }

    fn default_image(&self) -> DockerImage {
        DockerImage::new(RLY_IMAGE, RLY_DEFAULT_VERSION).with_uid_gid(RLY_UID_GID)
    }

    fn init(&self, home: &str) -> RelayerCommand {
        RelayerCommand::single(with_home(command_args(&["rly", "config", "init"]), home))
    }

    fn add_chain_configuration(
        &self,
        home: &str,
        chain: &ChainConfig,
        key_name: &str,
        rpc_address: &str,
        grpc_address: &str,
    ) -> Result<RelayerCommand, Error> {
        let config = RlyChainConfig::new(chain, key_name, rpc_address, grpc_address);
        let file_path = format!("chains/{}.json", chain.chain_id);
        let content = json::to_string_pretty(&config)?;

        let command = with_home(
            command_args(&[
                "rly",
                "chains",
                "add",
                "-f",
                &format!("{home}/{file_path}"),
                &chain.chain_id,
            ]),
            home,
        );

        Ok(RelayerCommand::single(command).with_file(&file_path, content))
    }

    fn restore_key(
        &self,
        home: &str,
        chain: &ChainConfig,
        key_name: &str,
        mnemonic: &str,
    ) -> RelayerCommand {
        RelayerCommand::single(with_home(
            command_args(&[
                "rly",
                "keys",
                "restore",
                &chain.chain_id,
                key_name,
                mnemonic,
                "--coin-type",
                &chain.coin_type.to_string(),
            ]),
            home,
        ))
    }

    fn generate_path(
        &self,
        home: &str,
        src_chain_id: &str,
        dst_chain_id: &str,
        path_name: &str,
    ) -> RelayerCommand {
        RelayerCommand::single(with_home(
            command_args(&["rly", "paths", "new", src_chain_id, dst_chain_id, path_name]),
            home,
        ))
    }

    fn link_path(&self, home: &str, path_name: &str) -> Result<RelayerCommand, Error> {
        Ok(RelayerCommand::single(with_home(
            command_args(&[
                "rly",
                "tx",
                "link",
                path_name,
                "--src-port",
                "transfer",
                "--dst-port",
                "transfer",
                "--order",
                "unordered",
                "--version",
                "ics20-1",
            ]),
            home,
        )))
    }

    fn get_channels(&self, home: &str, chain_id: &str) -> Vec<String> {
        with_home(command_args(&["rly", "q", "channels", chain_id]), home)
    }

    fn parse_channels(&self, stdout: &str) -> Result<Vec<ChannelOutput>, Error> {
        parse_rly_channels(stdout)
    }

    fn flush(
        &self,
        home: &str,
        path_name: &str,
        channel_id: &ChannelId,
    ) -> Result<RelayerCommand, Error> {
        Ok(RelayerCommand::single(with_home(
            command_args(&["rly", "tx", "flush", path_name, channel_id.as_str()]),
            home,
        )))
    }

    fn start(&self, home: &str, paths: &[String], startup_flags: &[String]) -> Vec<String> {
        let mut args = command_args(&["rly", "start"]);
        args.extend(paths.iter().cloned());
        args.push("--debug".to_string());
        args.extend(startup_flags.iter().cloned());

        with_home(args, home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::builtin::{dymension, osmosis};

    #[test_log::test]
    fn chain_file_for_ethermint_chain() {
        let chain = dymension();
        let command = CosmosRly
            .add_chain_configuration(
                "/home/relayer",
                &chain,
                "dymension_100-1",
                "http://dymension_100-1-val-0:26657",
                "dymension_100-1-val-0:9090",
            )
            .unwrap();

        assert_eq!(command.files[0].path, "chains/dymension_100-1.json");

        let config: json::Value = json::from_str(&command.files[0].content).unwrap();
        assert_eq!(config["value"]["chain-id"], "dymension_100-1");
        assert_eq!(config["value"]["coin-type"], 60);
        assert_eq!(config["value"]["gas-adjustment"], 1.3);
        assert_eq!(config["value"]["extra-codecs"][0], "ethermint");

        assert_eq!(
            command.commands[0][..5],
            ["rly", "chains", "add", "-f", "/home/relayer/chains/dymension_100-1.json"]
        );

        let osmosis_config = RlyChainConfig::new(&osmosis(), "key", "rpc", "grpc");
        assert!(osmosis_config.value.extra_codecs.is_empty());
    }

    #[test_log::test]
    fn parses_channel_lines() {
        let stdout = concat!(
            r#"{"state":"STATE_OPEN","ordering":"ORDER_UNORDERED","counterparty":{"port_id":"transfer","channel_id":"channel-0"},"connection_hops":["connection-0"],"version":"ics20-1","port_id":"transfer","channel_id":"channel-0"}"#,
            "\n\n",
            r#"{"state":"STATE_OPEN","ordering":"ORDER_UNORDERED","counterparty":{"port_id":"transfer","channel_id":"channel-3"},"connection_hops":["connection-1"],"version":"ics20-1","port_id":"transfer","channel_id":"channel-1"}"#,
            "\n"
        );

        let channels = parse_rly_channels(stdout).unwrap();

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].counterparty.channel_id, "channel-3");
        assert!(parse_rly_channels("not json").is_err());
    }

    #[test_log::test]
    fn link_flush_and_channel_query_commands() {
        let link = CosmosRly.link_path("/home/relayer", "gaia-osmo-demo").unwrap();
        assert!(link.files.is_empty());
        assert_eq!(
            link.commands,
            [[
                "rly",
                "tx",
                "link",
                "gaia-osmo-demo",
                "--src-port",
                "transfer",
                "--dst-port",
                "transfer",
                "--order",
                "unordered",
                "--version",
                "ics20-1",
                "--home",
                "/home/relayer"
            ]]
        );

        let flush = CosmosRly
            .flush("/home/relayer", "gaia-osmo-demo", &ChannelId::new(3))
            .unwrap();
        assert_eq!(
            flush.commands,
            [[
                "rly",
                "tx",
                "flush",
                "gaia-osmo-demo",
                "channel-3",
                "--home",
                "/home/relayer"
            ]]
        );

        assert_eq!(
            CosmosRly.get_channels("/home/relayer", "dymension_100-1"),
            ["rly", "q", "channels", "dymension_100-1", "--home", "/home/relayer"]
        );
    }

    #[test_log::test]
    fn start_command_appends_startup_flags() {
        let command = CosmosRly.start(
            "/home/relayer",
            &["dym-osmo".to_string()],
            &["--processor".to_string(), "events".to_string()],
        );

        assert_eq!(
            command,
            [
                "rly",
                "start",
                "dym-osmo",
                "--debug",
                "--processor",
                "events",
                "--home",
                "/home/relayer"
            ]
        );
    }
}
