/*!
   The interface through which tests drive a relayer, and the explicit
   selection of the channel a test transfers over.
*/

use alloc::sync::Arc;
use core::fmt::{self, Display};
use core::str::FromStr;
use ibc_relayer_types::core::ics24_host::identifier::{ChannelId, PortId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chain::spec::ChainConfig;
use crate::error::Error;
use crate::reporter::RelayerExecReporter;

pub type DynRelayer = Arc<dyn RelayerHandle>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounterparty {
    pub port_id: String,
    pub channel_id: String,
}

/// A channel end as listed by a relayer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutput {
    pub state: String,
    pub ordering: String,
    pub counterparty: ChannelCounterparty,
    #[serde(default)]
    pub connection_hops: Vec<String>,
    #[serde(default)]
    pub version: String,
    pub port_id: String,
    pub channel_id: String,
}

/// How the channel of a transfer is chosen among the channels of a chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelSelector {
    /// The first listed channel, whatever its port or state.
    First,
    ById(ChannelId),
    /// The only open channel bound to the port.
    ByPort(PortId),
    /// The channel whose counterparty end has the given identifier.
    ByCounterparty(ChannelId),
}

/**
   A relayer process relaying between the chains of a test.

   Every command run on behalf of a test is recorded in the given
   [`RelayerExecReporter`].
*/
pub trait RelayerHandle: Send + Sync {
    /// The name of the relayer implementation, e.g. `rly`.
    fn name(&self) -> &str;

    /// Register a chain with the relayer, signing with `key_name`.
    fn add_chain_configuration(
        &self,
        reporter: &RelayerExecReporter,
        chain: &ChainConfig,
        key_name: &str,
        rpc_address: &str,
        grpc_address: &str,
    ) -> Result<(), Error>;

    /// Import the key used to sign transactions on a chain.
    fn restore_key(
        &self,
        reporter: &RelayerExecReporter,
        chain: &ChainConfig,
        key_name: &str,
        mnemonic: &str,
    ) -> Result<(), Error>;

    fn generate_path(
        &self,
        reporter: &RelayerExecReporter,
        src_chain_id: &str,
        dst_chain_id: &str,
        path_name: &str,
    ) -> Result<(), Error>;

    /// Create the clients, connection and transfer channel of a path.
    fn link_path(&self, reporter: &RelayerExecReporter, path_name: &str) -> Result<(), Error>;

    fn get_channels(
        &self,
        reporter: &RelayerExecReporter,
        chain_id: &str,
    ) -> Result<Vec<ChannelOutput>, Error>;

    /**
       Relay every pending packet of the channel, then the
       acknowledgements back to the sending chain. Returns once both
       are committed.
    */
    fn flush(
        &self,
        reporter: &RelayerExecReporter,
        path_name: &str,
        channel_id: &ChannelId,
    ) -> Result<(), Error>;

    fn start_relayer(&self, reporter: &RelayerExecReporter, paths: &[String]) -> Result<(), Error>;

    fn stop_relayer(&self, reporter: &RelayerExecReporter) -> Result<(), Error>;
}

impl ChannelOutput {
    pub fn is_open(&self) -> bool {
        matches!(self.state.as_str(), "STATE_OPEN" | "Open" | "OPEN")
    }

    pub fn channel_id(&self) -> Result<ChannelId, Error> {
        ChannelId::from_str(&self.channel_id).map_err(crate::error::handle_generic_error)
    }

    pub fn port_id(&self) -> Result<PortId, Error> {
        PortId::from_str(&self.port_id).map_err(crate::error::handle_generic_error)
    }

    pub fn counterparty_channel_id(&self) -> Result<ChannelId, Error> {
        ChannelId::from_str(&self.counterparty.channel_id)
            .map_err(crate::error::handle_generic_error)
    }
}

impl Default for ChannelSelector {
    fn default() -> Self {
        Self::ByPort(PortId::transfer())
    }
}

impl Display for ChannelSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Self::First => write!(f, "the first channel"),
            Self::ById(channel_id) => write!(f, "channel id {channel_id}"),
            Self::ByPort(port_id) => write!(f, "the open channel on port {port_id}"),
            Self::ByCounterparty(channel_id) => {
                write!(f, "counterparty channel id {channel_id}")
            }
        }
    }
}

/**
   Pick the channel matching `selector` among the channels of
   `chain_id`. Selecting by port fails when several open channels
   are bound to the port.
*/
pub fn select_channel(
    chain_id: &str,
    channels: &[ChannelOutput],
    selector: &ChannelSelector,
) -> Result<ChannelOutput, Error> {
    let not_found = || Error::channel_not_found(chain_id.to_string(), selector.to_string());

    match selector {
        ChannelSelector::First => {
            if channels.len() > 1 {
                warn!(
                    "chain {} has {} channels, picking the first one {}",
                    chain_id,
                    channels.len(),
                    channels[0].channel_id
                );
            }

            channels.first().cloned().ok_or_else(not_found)
        }
        ChannelSelector::ById(channel_id) => channels
            .iter()
            .find(|channel| channel.channel_id == channel_id.as_str())
            .cloned()
            .ok_or_else(not_found),
        ChannelSelector::ByCounterparty(channel_id) => channels
            .iter()
            .find(|channel| channel.counterparty.channel_id == channel_id.as_str())
            .cloned()
            .ok_or_else(not_found),
        ChannelSelector::ByPort(port_id) => {
            let candidates: Vec<&ChannelOutput> = channels
                .iter()
                .filter(|channel| channel.port_id == port_id.as_str() && channel.is_open())
                .collect();

            match candidates.as_slice() {
                [] => Err(not_found()),
                [channel] => Ok((*channel).clone()),
                _ => Err(Error::ambiguous_channel(
                    chain_id.to_string(),
                    candidates.len(),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorDetail;

    fn channel(channel_id: &str, counterparty: &str, port_id: &str) -> ChannelOutput {
        ChannelOutput {
            state: "STATE_OPEN".to_string(),
            ordering: "ORDER_UNORDERED".to_string(),
            counterparty: ChannelCounterparty {
                port_id: port_id.to_string(),
                channel_id: counterparty.to_string(),
            },
            connection_hops: vec!["connection-0".to_string()],
            version: "ics20-1".to_string(),
            port_id: port_id.to_string(),
            channel_id: channel_id.to_string(),
        }
    }

    #[test_log::test]
    fn parses_rly_channel_output() {
        let output = r#"{"state":"STATE_OPEN","ordering":"ORDER_UNORDERED","counterparty":{"port_id":"transfer","channel_id":"channel-4"},"connection_hops":["connection-0"],"version":"ics20-1","port_id":"transfer","channel_id":"channel-0"}"#;

        let parsed: ChannelOutput = serde_json::from_str(output).unwrap();

        assert_eq!(parsed, channel("channel-0", "channel-4", "transfer"));
        assert!(parsed.is_open());
        assert_eq!(parsed.counterparty_channel_id().unwrap().as_str(), "channel-4");
    }

    #[test_log::test]
    fn default_selector_requires_unique_transfer_channel() {
        let single = vec![
            channel("channel-0", "channel-1", "transfer"),
            channel("channel-1", "channel-2", "icahost"),
        ];

        let selected = select_channel("dymension_100-1", &single, &ChannelSelector::default())
            .unwrap();
        assert_eq!(selected.channel_id, "channel-0");

        let multiple = vec![
            channel("channel-0", "channel-1", "transfer"),
            channel("channel-5", "channel-7", "transfer"),
        ];

        let err = select_channel("dymension_100-1", &multiple, &ChannelSelector::default())
            .unwrap_err();

        match err.detail() {
            ErrorDetail::AmbiguousChannel(e) => assert_eq!(e.count, 2),
            e => panic!("unexpected error: {e:?}"),
        }
    }

    #[test_log::test]
    fn explicit_selectors() {
        let channels = vec![
            channel("channel-0", "channel-1", "transfer"),
            channel("channel-5", "channel-7", "transfer"),
        ];

        let by_id = ChannelSelector::ById(ChannelId::new(5));
        assert_eq!(
            select_channel("osmosis-1001", &channels, &by_id).unwrap().channel_id,
            "channel-5"
        );

        let by_counterparty = ChannelSelector::ByCounterparty(ChannelId::new(1));
        assert_eq!(
            select_channel("osmosis-1001", &channels, &by_counterparty)
                .unwrap()
                .channel_id,
            "channel-0"
        );

        assert_eq!(
            select_channel("osmosis-1001", &channels, &ChannelSelector::First)
                .unwrap()
                .channel_id,
            "channel-0"
        );

        let missing = ChannelSelector::ById(ChannelId::new(9));
        assert!(select_channel("osmosis-1001", &channels, &missing).is_err());
        assert!(select_channel("osmosis-1001", &[], &ChannelSelector::First).is_err());
    }
}
