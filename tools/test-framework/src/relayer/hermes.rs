/*!
   The command line of the Hermes relayer.

   Hermes keeps every chain in a single `config.toml`, so the
   configuration is accumulated in memory and the whole file is
   rewritten whenever a chain is added. Paths only exist on the test
   side: Hermes addresses chains directly when creating channels.
*/

use ibc_relayer_types::core::ics24_host::identifier::ChannelId;
use serde::{Deserialize, Serialize};
use serde_json as json;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::chain::chain_type::ChainType;
use crate::chain::docker::DockerImage;
use crate::chain::spec::ChainConfig;
use crate::error::Error;
use crate::relayer::docker::{command_args, RelayerCommand, RelayerCommander};
use crate::relayer::handle::{ChannelCounterparty, ChannelOutput};
use crate::util::mutex::MutexUtil;

pub const HERMES_IMAGE: &str = "ghcr.io/informalsystems/hermes";
pub const HERMES_DEFAULT_VERSION: &str = "1.7.4";
pub const HERMES_UID_GID: &str = "1000:1000";

const CONFIG_PATH: &str = ".hermes/config.toml";
const DEFAULT_GAS_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HermesConfig {
    pub global: GlobalConfig,
    pub mode: ModeConfig,
    pub rest: ServiceConfig,
    pub telemetry: ServiceConfig,
    #[serde(default)]
    pub chains: Vec<HermesChainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeConfig {
    pub clients: ClientsMode,
    pub connections: EnabledMode,
    pub channels: EnabledMode,
    pub packets: PacketsMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientsMode {
    pub enabled: bool,
    pub refresh: bool,
    pub misbehaviour: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnabledMode {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketsMode {
    pub enabled: bool,
    pub clear_interval: u64,
    pub clear_on_start: bool,
    pub tx_confirmation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HermesChainConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub chain_type: String,
    pub rpc_addr: String,
    pub grpc_addr: String,
    pub event_source: EventSource,
    pub rpc_timeout: String,
    pub account_prefix: String,
    pub key_name: String,
    pub key_store_type: String,
    pub store_prefix: String,
    pub max_gas: u64,
    pub gas_multiplier: f64,
    pub gas_price: GasPrice,
    pub clock_drift: String,
    pub max_block_time: String,
    pub trusting_period: String,
    pub trust_threshold: TrustThreshold,
    pub address_type: AddressType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSource {
    pub mode: String,
    pub url: String,
    pub batch_delay: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasPrice {
    pub price: f64,
    pub denom: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustThreshold {
    pub numerator: String,
    pub denominator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressType {
    pub derivation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto_type: Option<ProtoType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtoType {
    pub pk_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HermesPath {
    src_chain_id: String,
    dst_chain_id: String,
}

pub struct Hermes {
    config: Mutex<HermesConfig>,
    paths: Mutex<BTreeMap<String, HermesPath>>,
}

/// The channel list printed by `hermes --json query channels --verbose`.
#[derive(Debug, Deserialize)]
struct ChannelsResult {
    result: Vec<ChannelEnds>,
}

#[derive(Debug, Deserialize)]
struct ChannelEnds {
    channel_end: HermesChannelEnd,
    counterparty_channel_end: HermesChannelEnd,
}

#[derive(Debug, Deserialize)]
struct HermesChannelEnd {
    state: String,
    ordering: String,
    remote: HermesRemote,
    #[serde(default)]
    connection_hops: Vec<String>,
    #[serde(default)]
    version: json::Value,
}

#[derive(Debug, Deserialize)]
struct HermesRemote {
    port_id: String,
    #[serde(default)]
    channel_id: Option<String>,
}

impl Default for HermesConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig {
                log_level: "info".to_string(),
            },
            mode: ModeConfig {
                clients: ClientsMode {
                    enabled: true,
                    refresh: true,
                    misbehaviour: false,
                },
                connections: EnabledMode { enabled: false },
                channels: EnabledMode { enabled: false },
                packets: PacketsMode {
                    enabled: true,
                    clear_interval: 0,
                    clear_on_start: true,
                    tx_confirmation: false,
                },
            },
            rest: ServiceConfig {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            telemetry: ServiceConfig {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            chains: Vec::new(),
        }
    }
}

impl HermesChainConfig {
    pub fn new(
        chain: &ChainConfig,
        key_name: &str,
        rpc_address: &str,
        grpc_address: &str,
    ) -> Result<Self, Error> {
        let gas_multiplier = if chain.gas_adjustment > 0.0 {
            chain.gas_adjustment
        } else {
            DEFAULT_GAS_MULTIPLIER
        };

        let address_type = match chain.chain_type {
            ChainType::Cosmos => AddressType {
                derivation: "cosmos".to_string(),
                proto_type: None,
            },
            ChainType::Ethermint => AddressType {
                derivation: "ethermint".to_string(),
                proto_type: Some(ProtoType {
                    pk_type: chain.chain_type.pk_type().to_string(),
                }),
            },
        };

        Ok(Self {
            id: chain.chain_id.clone(),
            chain_type: "CosmosSdk".to_string(),
            rpc_addr: rpc_address.to_string(),
            grpc_addr: grpc_url(grpc_address),
            event_source: EventSource {
                mode: "push".to_string(),
                url: websocket_url(rpc_address),
                batch_delay: "500ms".to_string(),
            },
            rpc_timeout: "10s".to_string(),
            account_prefix: chain.bech32_prefix.clone(),
            key_name: key_name.to_string(),
            key_store_type: "Test".to_string(),
            store_prefix: "ibc".to_string(),
            max_gas: 3_000_000,
            gas_multiplier,
            gas_price: GasPrice {
                price: chain.gas_price_amount()?,
                denom: chain.denom.clone(),
            },
            clock_drift: "5s".to_string(),
            max_block_time: "30s".to_string(),
            trusting_period: chain.trusting_period.clone(),
            trust_threshold: TrustThreshold {
                numerator: "1".to_string(),
                denominator: "3".to_string(),
            },
            address_type,
        })
    }
}

fn grpc_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

fn websocket_url(rpc_address: &str) -> String {
    let host = rpc_address
        .strip_prefix("http://")
        .or_else(|| rpc_address.strip_prefix("tcp://"))
        .unwrap_or(rpc_address);

    format!("ws://{host}/websocket")
}

/**
   Extract the channels from the JSON output of Hermes. Log lines may
   precede the result, which is the last line carrying a `result`
   field.
*/
pub fn parse_hermes_channels(stdout: &str) -> Result<Vec<ChannelOutput>, Error> {
    let line = stdout
        .lines()
        .rev()
        .find(|line| line.contains("\"result\""))
        .ok_or_else(|| Error::missing_field("result".to_string(), "hermes output".to_string()))?;

    let result: ChannelsResult = json::from_str(line)?;

    let channels = result
        .result
        .into_iter()
        .map(|ends| {
            let version = match ends.channel_end.version {
                json::Value::String(version) => version,
                json::Value::Null => String::new(),
                other => other.to_string(),
            };

            // Each end records the identifiers of the other end.
            ChannelOutput {
                state: ends.channel_end.state,
                ordering: ends.channel_end.ordering,
                counterparty: ChannelCounterparty {
                    port_id: ends.channel_end.remote.port_id,
                    channel_id: ends.channel_end.remote.channel_id.unwrap_or_default(),
                },
                connection_hops: ends.channel_end.connection_hops,
                version,
                port_id: ends.counterparty_channel_end.remote.port_id,
                channel_id: ends
                    .counterparty_channel_end
                    .remote
                    .channel_id
                    .unwrap_or_default(),
            }
        })
        .collect();

    Ok(channels)
}

impl Hermes {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(HermesConfig::default()),
            paths: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> HermesConfig {
        self.config.acquire_mutex().clone()
    }

    fn hermes_args(home: &str, args: &[&str]) -> Vec<String> {
        let config_path = format!("{home}/{CONFIG_PATH}");
        let mut command = command_args(&["hermes", "--config", &config_path]);
        command.extend(command_args(args));
        command
    }

    fn path(&self, path_name: &str) -> Result<HermesPath, Error> {
        self.paths
            .acquire_mutex()
            .get(path_name)
            .cloned()
            .ok_or_else(|| Error::unknown_path(path_name.to_string()))
    }
}

impl Default for Hermes {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayerCommander for Hermes {
    fn name(&self) -> &str {
        "hermes"
    }

    fn default_image(&self) -> DockerImage {
        DockerImage::new(HERMES_IMAGE, HERMES_DEFAULT_VERSION).with_uid_gid(HERMES_UID_GID)
    }

    fn init(&self, _home: &str) -> RelayerCommand {
        RelayerCommand::default()
    }

    fn add_chain_configuration(
        &self,
        _home: &str,
        chain: &ChainConfig,
        key_name: &str,
        rpc_address: &str,
        grpc_address: &str,
    ) -> Result<RelayerCommand, Error> {
        let chain_config = HermesChainConfig::new(chain, key_name, rpc_address, grpc_address)?;

        let mut config = self.config.acquire_mutex();
        config.chains.retain(|existing| existing.id != chain_config.id);
        config.chains.push(chain_config);

        let content = toml::to_string_pretty(&*config).map_err(Error::toml)?;

        Ok(RelayerCommand::default().with_file(CONFIG_PATH, content))
    }

    fn restore_key(
        &self,
        home: &str,
        chain: &ChainConfig,
        key_name: &str,
        mnemonic: &str,
    ) -> RelayerCommand {
        let mnemonic_path = format!(".hermes/mnemonics/{}.txt", chain.chain_id);

        let command = Self::hermes_args(
            home,
            &[
                "keys",
                "add",
                "--chain",
                &chain.chain_id,
                "--key-name",
                key_name,
                "--mnemonic-file",
                &format!("{home}/{mnemonic_path}"),
                "--hd-path",
                chain.chain_type.hd_path(),
                "--overwrite",
            ],
        );

        RelayerCommand::single(command).with_file(&mnemonic_path, mnemonic.to_string())
    }

    fn generate_path(
        &self,
        _home: &str,
        src_chain_id: &str,
        dst_chain_id: &str,
        path_name: &str,
    ) -> RelayerCommand {
        self.paths.acquire_mutex().insert(
            path_name.to_string(),
            HermesPath {
                src_chain_id: src_chain_id.to_string(),
                dst_chain_id: dst_chain_id.to_string(),
            },
        );

        RelayerCommand::default()
    }

    fn link_path(&self, home: &str, path_name: &str) -> Result<RelayerCommand, Error> {
        let path = self.path(path_name)?;

        Ok(RelayerCommand::single(Self::hermes_args(
            home,
            &[
                "create",
                "channel",
                "--a-chain",
                &path.src_chain_id,
                "--b-chain",
                &path.dst_chain_id,
                "--a-port",
                "transfer",
                "--b-port",
                "transfer",
                "--new-client-connection",
                "--yes",
            ],
        )))
    }

    fn get_channels(&self, home: &str, chain_id: &str) -> Vec<String> {
        let config_path = format!("{home}/{CONFIG_PATH}");

        command_args(&[
            "hermes",
            "--json",
            "--config",
            &config_path,
            "query",
            "channels",
            "--chain",
            chain_id,
            "--verbose",
        ])
    }

    fn parse_channels(&self, stdout: &str) -> Result<Vec<ChannelOutput>, Error> {
        parse_hermes_channels(stdout)
    }

    fn flush(
        &self,
        home: &str,
        path_name: &str,
        channel_id: &ChannelId,
    ) -> Result<RelayerCommand, Error> {
        let path = self.path(path_name)?;

        Ok(RelayerCommand::single(Self::hermes_args(
            home,
            &[
                "clear",
                "packets",
                "--chain",
                &path.src_chain_id,
                "--port",
                "transfer",
                "--channel",
                channel_id.as_str(),
            ],
        )))
    }

    fn start(&self, home: &str, _paths: &[String], startup_flags: &[String]) -> Vec<String> {
        let mut command = Self::hermes_args(home, &["start"]);
        command.extend(startup_flags.iter().cloned());
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::builtin::{dymension, osmosis};

    #[test_log::test]
    fn config_accumulates_chains() {
        let hermes = Hermes::new();

        hermes
            .add_chain_configuration(
                "/home/relayer",
                &dymension(),
                "dymension_100-1",
                "http://dymension-val-0:26657",
                "dymension-val-0:9090",
            )
            .unwrap();

        let command = hermes
            .add_chain_configuration(
                "/home/relayer",
                &osmosis(),
                "osmosis-1001",
                "http://osmosis-val-0:26657",
                "osmosis-val-0:9090",
            )
            .unwrap();

        assert!(command.commands.is_empty());
        assert_eq!(command.files[0].path, ".hermes/config.toml");

        let config: toml::Value = toml::from_str(&command.files[0].content).unwrap();
        let chains = config["chains"].as_array().unwrap();

        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0]["address_type"]["derivation"].as_str(), Some("ethermint"));
        assert_eq!(
            chains[0]["event_source"]["url"].as_str(),
            Some("ws://dymension-val-0:26657/websocket")
        );
        assert_eq!(chains[1]["grpc_addr"].as_str(), Some("http://osmosis-val-0:9090"));
        assert_eq!(chains[1]["gas_price"]["price"].as_float(), Some(0.0025));
    }

    #[test_log::test]
    fn unknown_path_is_rejected() {
        let hermes = Hermes::new();

        assert!(hermes.link_path("/home/relayer", "dym-osmo").is_err());

        hermes.generate_path("/home/relayer", "dymension_100-1", "osmosis-1001", "dym-osmo");

        let command = hermes.link_path("/home/relayer", "dym-osmo").unwrap();
        assert!(command.commands[0].contains(&"--new-client-connection".to_string()));

        let flush = hermes
            .flush("/home/relayer", "dym-osmo", &ChannelId::new(0))
            .unwrap();
        assert_eq!(
            flush.commands[0][3..],
            [
                "clear",
                "packets",
                "--chain",
                "dymension_100-1",
                "--port",
                "transfer",
                "--channel",
                "channel-0"
            ]
        );
    }

    #[test_log::test]
    fn link_flush_and_channel_query_commands() {
        let hermes = Hermes::new();
        hermes.generate_path("/home/relayer", "dymension_100-1", "osmosis-1001", "gaia-osmo-demo");

        let link = hermes.link_path("/home/relayer", "gaia-osmo-demo").unwrap();
        assert_eq!(
            link.commands,
            [[
                "hermes",
                "--config",
                "/home/relayer/.hermes/config.toml",
                "create",
                "channel",
                "--a-chain",
                "dymension_100-1",
                "--b-chain",
                "osmosis-1001",
                "--a-port",
                "transfer",
                "--b-port",
                "transfer",
                "--new-client-connection",
                "--yes"
            ]]
        );

        let flush = hermes
            .flush("/home/relayer", "gaia-osmo-demo", &ChannelId::new(2))
            .unwrap();
        assert_eq!(
            flush.commands,
            [[
                "hermes",
                "--config",
                "/home/relayer/.hermes/config.toml",
                "clear",
                "packets",
                "--chain",
                "dymension_100-1",
                "--port",
                "transfer",
                "--channel",
                "channel-2"
            ]]
        );

        assert_eq!(
            hermes.get_channels("/home/relayer", "osmosis-1001"),
            [
                "hermes",
                "--json",
                "--config",
                "/home/relayer/.hermes/config.toml",
                "query",
                "channels",
                "--chain",
                "osmosis-1001",
                "--verbose"
            ]
        );
    }

    #[test_log::test]
    fn parses_verbose_channel_query() {
        let stdout = concat!(
            "2024-01-01T00:00:00Z INFO using default configuration\n",
            r#"{"result":[{"channel_end":{"state":"Open","ordering":"Unordered","remote":{"port_id":"transfer","channel_id":"channel-7"},"connection_hops":["connection-0"],"version":"ics20-1"},"counterparty_channel_end":{"state":"Open","ordering":"Unordered","remote":{"port_id":"transfer","channel_id":"channel-0"},"connection_hops":["connection-3"],"version":"ics20-1"}}],"status":"success"}"#,
            "\n"
        );

        let channels = parse_hermes_channels(stdout).unwrap();

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].channel_id, "channel-0");
        assert_eq!(channels[0].counterparty.channel_id, "channel-7");
        assert_eq!(channels[0].version, "ics20-1");
        assert!(channels[0].is_open());
    }
}
