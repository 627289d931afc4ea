/*!
   An in-memory relayer between the chains of a [`MockNetwork`].

   The relayer only moves packets when flushed: starting it does not
   relay in the background.
*/

use ibc_relayer_types::core::ics24_host::identifier::ChannelId;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::chain::exec::ExecOutput;
use crate::chain::handle::ChainHandle;
use crate::chain::spec::ChainConfig;
use crate::error::Error;
use crate::mock::chain::MockChain;
use crate::mock::MockNetwork;
use crate::relayer::handle::{ChannelOutput, RelayerHandle};
use crate::reporter::{now_millis, RelayerExecReporter};
use crate::util::mutex::MutexUtil;

const MOCK_CONTAINER: &str = "mock-relayer";

pub struct MockRelayer {
    network: MockNetwork,
    state: Mutex<MockRelayerState>,
}

#[derive(Default)]
struct MockRelayerState {
    chains: BTreeMap<String, MockRelayerChain>,
    paths: BTreeMap<String, MockPath>,
    running: Vec<String>,
}

/// The address signing on a chain, known once its key is restored.
#[derive(Clone, Debug, Default)]
struct MockRelayerChain {
    signer: Option<String>,
}

#[derive(Clone, Debug)]
struct MockPath {
    src_chain_id: String,
    dst_chain_id: String,
    link: Option<MockLink>,
}

/// The identifiers created on both ends of a linked path.
#[derive(Clone, Debug, PartialEq, Eq)]
struct MockLink {
    src_client_id: String,
    dst_client_id: String,
    src_channel_id: String,
    dst_channel_id: String,
}

/// One end of a linked path, with the key signing on it.
struct PathEnd {
    chain: std::sync::Arc<MockChain>,
    signer: String,
    client_id: String,
    channel_id: String,
}

impl MockRelayer {
    pub fn new(network: &MockNetwork) -> Self {
        Self {
            network: network.clone(),
            state: Mutex::new(MockRelayerState::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.state.acquire_mutex().running.is_empty()
    }

    /// Run `task` and report it as the execution of `command`.
    fn track<R>(
        &self,
        reporter: &RelayerExecReporter,
        command: &[&str],
        task: impl FnOnce() -> Result<(R, String), Error>,
    ) -> Result<R, Error> {
        let command: Vec<String> = command.iter().map(|arg| arg.to_string()).collect();

        debug!("running mock relayer command: {}", command.join(" "));

        let start_time = now_millis();
        let result = task();

        let report = match &result {
            Ok((_, stdout)) => Ok(ExecOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
            }),
            Err(e) => Err(Error::exec(command.join(" "), Some(1), e.to_string())),
        };

        reporter.track_relayer_exec(MOCK_CONTAINER, &command, &report, start_time);

        result.map(|(value, _)| value)
    }

    fn signer(&self, path_name: &str, chain_id: &str) -> Result<String, Error> {
        self.state
            .acquire_mutex()
            .chains
            .get(chain_id)
            .and_then(|chain| chain.signer.clone())
            .ok_or_else(|| Error::unknown_link_member(path_name.to_string(), chain_id.to_string()))
    }

    fn path(&self, path_name: &str) -> Result<MockPath, Error> {
        self.state
            .acquire_mutex()
            .paths
            .get(path_name)
            .cloned()
            .ok_or_else(|| Error::unknown_path(path_name.to_string()))
    }

    fn linked_ends(&self, path_name: &str) -> Result<(PathEnd, PathEnd), Error> {
        let path = self.path(path_name)?;
        let link = path
            .link
            .ok_or_else(|| Error::unknown_path(path_name.to_string()))?;

        let src = PathEnd {
            chain: self.network.chain(&path.src_chain_id)?,
            signer: self.signer(path_name, &path.src_chain_id)?,
            client_id: link.src_client_id,
            channel_id: link.src_channel_id,
        };

        let dst = PathEnd {
            chain: self.network.chain(&path.dst_chain_id)?,
            signer: self.signer(path_name, &path.dst_chain_id)?,
            client_id: link.dst_client_id,
            channel_id: link.dst_channel_id,
        };

        Ok((src, dst))
    }

    /**
       Relay the packets pending on `from`, then their acknowledgements
       back. Returns the number of packets relayed.
    */
    fn relay_packets(from: &PathEnd, to: &PathEnd) -> Result<usize, Error> {
        let packets = from.chain.pending_packets(&from.channel_id);

        if packets.is_empty() {
            return Ok(0);
        }

        let received =
            to.chain
                .receive_packets(&to.signer, &to.client_id, from.chain.header()?, &packets)?;

        from.chain
            .acknowledge_packets(&from.signer, &from.client_id, to.chain.header()?, &received)?;

        Ok(received.len())
    }

    fn create_link(&self, path: &MockPath, path_name: &str) -> Result<MockLink, Error> {
        let src = self.network.chain(&path.src_chain_id)?;
        let dst = self.network.chain(&path.dst_chain_id)?;
        let src_signer = self.signer(path_name, &path.src_chain_id)?;
        let dst_signer = self.signer(path_name, &path.dst_chain_id)?;

        let src_client_id = src.create_client(&src_signer, dst.config(), dst.height()?)?;
        let dst_client_id = dst.create_client(&dst_signer, src.config(), src.height()?)?;

        let src_connection_id = src.open_connection(
            &src_signer,
            "MsgConnectionOpenInit",
            &src_client_id,
            &dst_client_id,
            None,
        )?;
        let dst_connection_id = dst.open_connection(
            &dst_signer,
            "MsgConnectionOpenTry",
            &dst_client_id,
            &src_client_id,
            None,
        )?;
        src.open_connection(
            &src_signer,
            "MsgConnectionOpenAck",
            &src_client_id,
            &dst_client_id,
            Some(&src_connection_id),
        )?;
        dst.open_connection(
            &dst_signer,
            "MsgConnectionOpenConfirm",
            &dst_client_id,
            &src_client_id,
            Some(&dst_connection_id),
        )?;

        let src_channel_id =
            src.open_channel(&src_signer, "MsgChannelOpenInit", &src_connection_id, None, None)?;
        let dst_channel_id = dst.open_channel(
            &dst_signer,
            "MsgChannelOpenTry",
            &dst_connection_id,
            None,
            Some(&src_channel_id),
        )?;
        src.open_channel(
            &src_signer,
            "MsgChannelOpenAck",
            &src_connection_id,
            Some(&src_channel_id),
            Some(&dst_channel_id),
        )?;
        dst.open_channel(
            &dst_signer,
            "MsgChannelOpenConfirm",
            &dst_connection_id,
            Some(&dst_channel_id),
            Some(&src_channel_id),
        )?;

        Ok(MockLink {
            src_client_id,
            dst_client_id,
            src_channel_id,
            dst_channel_id,
        })
    }
}

impl RelayerHandle for MockRelayer {
    fn name(&self) -> &str {
        "mock"
    }

    fn add_chain_configuration(
        &self,
        reporter: &RelayerExecReporter,
        chain: &ChainConfig,
        key_name: &str,
        _rpc_address: &str,
        _grpc_address: &str,
    ) -> Result<(), Error> {
        self.track(reporter, &["mock", "chains", "add", &chain.chain_id], || {
            self.network.chain(&chain.chain_id)?;

            self.state
                .acquire_mutex()
                .chains
                .insert(chain.chain_id.clone(), MockRelayerChain::default());

            Ok(((), format!("added chain {} with key {}", chain.chain_id, key_name)))
        })
    }

    fn restore_key(
        &self,
        reporter: &RelayerExecReporter,
        chain: &ChainConfig,
        key_name: &str,
        mnemonic: &str,
    ) -> Result<(), Error> {
        self.track(
            reporter,
            &["mock", "keys", "restore", &chain.chain_id, key_name],
            || {
                let wallet = self.network.chain(&chain.chain_id)?.wallet_by_mnemonic(mnemonic)?;

                self.state
                    .acquire_mutex()
                    .chains
                    .entry(chain.chain_id.clone())
                    .or_default()
                    .signer = Some(wallet.address.0.clone());

                Ok(((), wallet.address.0))
            },
        )
    }

    fn generate_path(
        &self,
        reporter: &RelayerExecReporter,
        src_chain_id: &str,
        dst_chain_id: &str,
        path_name: &str,
    ) -> Result<(), Error> {
        self.track(
            reporter,
            &["mock", "paths", "new", src_chain_id, dst_chain_id, path_name],
            || {
                let mut state = self.state.acquire_mutex();

                for chain_id in [src_chain_id, dst_chain_id] {
                    if !state.chains.contains_key(chain_id) {
                        return Err(Error::unknown_link_member(
                            path_name.to_string(),
                            chain_id.to_string(),
                        ));
                    }
                }

                state.paths.insert(
                    path_name.to_string(),
                    MockPath {
                        src_chain_id: src_chain_id.to_string(),
                        dst_chain_id: dst_chain_id.to_string(),
                        link: None,
                    },
                );

                Ok(((), format!("created path {path_name}")))
            },
        )
    }

    fn link_path(&self, reporter: &RelayerExecReporter, path_name: &str) -> Result<(), Error> {
        self.track(reporter, &["mock", "tx", "link", path_name], || {
            let path = self.path(path_name)?;

            if path.link.is_some() {
                return Ok(((), format!("path {path_name} is already linked")));
            }

            let link = self.create_link(&path, path_name)?;

            info!(
                "linked path {}: {} on {} <-> {} on {}",
                path_name,
                link.src_channel_id,
                path.src_chain_id,
                link.dst_channel_id,
                path.dst_chain_id
            );

            let stdout = format!("{} <-> {}", link.src_channel_id, link.dst_channel_id);

            if let Some(path) = self.state.acquire_mutex().paths.get_mut(path_name) {
                path.link = Some(link);
            }

            Ok(((), stdout))
        })
    }

    fn get_channels(
        &self,
        reporter: &RelayerExecReporter,
        chain_id: &str,
    ) -> Result<Vec<ChannelOutput>, Error> {
        self.track(reporter, &["mock", "q", "channels", chain_id], || {
            let channels = self.network.chain(chain_id)?.channels();
            let stdout = serde_json::to_string(&channels)?;

            Ok((channels, stdout))
        })
    }

    fn flush(
        &self,
        reporter: &RelayerExecReporter,
        path_name: &str,
        channel_id: &ChannelId,
    ) -> Result<(), Error> {
        self.track(
            reporter,
            &["mock", "tx", "flush", path_name, channel_id.as_str()],
            || {
                let (src, dst) = self.linked_ends(path_name)?;

                if src.channel_id != channel_id.as_str() && dst.channel_id != channel_id.as_str() {
                    return Err(Error::unknown_channel(
                        src.chain.config().chain_id.clone(),
                        channel_id.to_string(),
                    ));
                }

                let forward = Self::relay_packets(&src, &dst)?;
                let backward = Self::relay_packets(&dst, &src)?;

                info!(
                    "flushed path {}: relayed {} packets forward and {} backward",
                    path_name, forward, backward
                );

                Ok(((), format!("relayed {} packets", forward + backward)))
            },
        )
    }

    fn start_relayer(&self, reporter: &RelayerExecReporter, paths: &[String]) -> Result<(), Error> {
        let mut command = vec!["mock", "start"];
        command.extend(paths.iter().map(String::as_str));

        self.track(reporter, &command, || {
            for path in paths {
                self.path(path)?;
            }

            self.state.acquire_mutex().running = paths.to_vec();

            Ok(((), String::new()))
        })
    }

    fn stop_relayer(&self, _reporter: &RelayerExecReporter) -> Result<(), Error> {
        self.state.acquire_mutex().running.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::builtin::{dymension, osmosis};
    use crate::chain::handle::{TransferOptions, FAUCET_ACCOUNT_KEY_NAME};
    use crate::chain::poll::{poll_for_message, MsgAcknowledgement, MsgRecvPacket, MsgUpdateClient};
    use crate::ibc::denom::{derive_ibc_denom, Denom};
    use crate::types::wallet::WalletAmount;
    use ibc_relayer_types::applications::transfer::amount::Amount;
    use ibc_relayer_types::core::ics24_host::identifier::PortId;

    struct Setup {
        dymension: std::sync::Arc<MockChain>,
        osmosis: std::sync::Arc<MockChain>,
        relayer: MockRelayer,
        reporter: RelayerExecReporter,
    }

    fn setup() -> Setup {
        let network = MockNetwork::new();
        let dymension = network.add_chain(dymension());
        let osmosis = network.add_chain(osmosis());
        let relayer = MockRelayer::new(&network);
        let reporter = RelayerExecReporter::nop("mock-relayer");

        for chain in [&dymension, &osmosis] {
            let wallet = chain.create_wallet("relayer").unwrap();
            chain.start("mock-relayer", &[]).unwrap();

            relayer
                .add_chain_configuration(&reporter, chain.config(), "relayer", "", "")
                .unwrap();
            relayer
                .restore_key(&reporter, chain.config(), "relayer", &wallet.mnemonic)
                .unwrap();
        }

        relayer
            .generate_path(&reporter, "dymension_100-1", "osmosis-1001", "dym-osmo")
            .unwrap();

        Setup {
            dymension,
            osmosis,
            relayer,
            reporter,
        }
    }

    #[test_log::test]
    fn link_creates_first_clients_and_open_channels() {
        let Setup {
            dymension,
            osmosis,
            relayer,
            reporter,
        } = setup();

        relayer.link_path(&reporter, "dym-osmo").unwrap();

        assert_eq!(dymension.clients()[0].client_id, "07-tendermint-0");
        assert_eq!(osmosis.clients()[0].counterparty_chain_id, "dymension_100-1");
        assert_eq!(osmosis.connections().len(), 1);

        let channels = relayer.get_channels(&reporter, "osmosis-1001").unwrap();

        assert_eq!(channels.len(), 1);
        assert!(channels[0].is_open());
        assert_eq!(channels[0].counterparty.channel_id, "channel-0");

        // Linking twice keeps the existing channel.
        relayer.link_path(&reporter, "dym-osmo").unwrap();
        assert_eq!(relayer.get_channels(&reporter, "osmosis-1001").unwrap().len(), 1);
    }

    #[test_log::test]
    fn flush_relays_transfer_and_acknowledgement() {
        let Setup {
            dymension,
            osmosis,
            relayer,
            reporter,
        } = setup();

        relayer.link_path(&reporter, "dym-osmo").unwrap();

        let receiver = osmosis.create_wallet("receiver").unwrap();
        let osmosis_height = osmosis.height().unwrap();

        let tx = dymension
            .send_ibc_transfer(
                &ChannelId::new(0),
                FAUCET_ACCOUNT_KEY_NAME,
                &WalletAmount::new(receiver.address.clone(), Denom::base("udym"), 1_000_000u64),
                &TransferOptions::default(),
            )
            .unwrap();

        tx.validate().unwrap();
        assert_eq!(dymension.pending_packets("channel-0").len(), 1);

        relayer
            .flush(&reporter, "dym-osmo", &ChannelId::new(0))
            .unwrap();

        assert!(dymension.pending_packets("channel-0").is_empty());

        let ibc_denom =
            derive_ibc_denom(&PortId::transfer(), &ChannelId::new(0), &Denom::base("udym"))
                .unwrap();

        assert_eq!(
            osmosis
                .get_balance(receiver.address.as_str(), ibc_denom.as_str())
                .unwrap(),
            Amount::from(1_000_000u64)
        );

        let registry = &osmosis.config().encoding.interface_registry;

        let update: MsgUpdateClient = poll_for_message(
            osmosis.as_ref(),
            registry,
            osmosis_height,
            osmosis_height + 10,
            None,
        )
        .unwrap();

        assert_eq!(update.client_id, "07-tendermint-0");
        assert!(!update.signer.is_empty());

        let _recv: MsgRecvPacket = poll_for_message(
            osmosis.as_ref(),
            registry,
            osmosis_height,
            osmosis_height + 10,
            None,
        )
        .unwrap();

        let dymension_height = dymension.height().unwrap();
        let ack: MsgAcknowledgement = poll_for_message(
            dymension.as_ref(),
            &dymension.config().encoding.interface_registry,
            dymension_height,
            dymension_height,
            None,
        )
        .unwrap();

        assert_eq!(ack.acknowledgement, r#"{"result":"AQ=="}"#);
    }

    #[test_log::test]
    fn vouchers_sent_back_release_escrow() {
        let Setup {
            dymension,
            osmosis,
            relayer,
            reporter,
        } = setup();

        relayer.link_path(&reporter, "dym-osmo").unwrap();

        let sender = dymension.create_wallet("sender").unwrap();
        let receiver = osmosis.create_wallet("receiver").unwrap();

        dymension
            .send_funds(
                FAUCET_ACCOUNT_KEY_NAME,
                &WalletAmount::new(sender.address.clone(), Denom::base("udym"), 500u64),
            )
            .unwrap();

        dymension
            .send_ibc_transfer(
                &ChannelId::new(0),
                "sender",
                &WalletAmount::new(receiver.address.clone(), Denom::base("udym"), 500u64),
                &TransferOptions::default(),
            )
            .unwrap();

        relayer
            .flush(&reporter, "dym-osmo", &ChannelId::new(0))
            .unwrap();

        let voucher =
            derive_ibc_denom(&PortId::transfer(), &ChannelId::new(0), &Denom::base("udym"))
                .unwrap();

        assert!(osmosis.denom_trace(voucher.as_str()).is_some());

        osmosis
            .send_ibc_transfer(
                &ChannelId::new(0),
                "receiver",
                &WalletAmount::new(sender.address.clone(), voucher.clone(), 200u64),
                &TransferOptions::default(),
            )
            .unwrap();

        relayer
            .flush(&reporter, "dym-osmo", &ChannelId::new(0))
            .unwrap();

        assert_eq!(
            osmosis
                .get_balance(receiver.address.as_str(), voucher.as_str())
                .unwrap(),
            Amount::from(300u64)
        );
        assert_eq!(
            dymension.get_balance(sender.address.as_str(), "udym").unwrap(),
            Amount::from(200u64)
        );
        assert_eq!(
            dymension
                .get_balance(&crate::mock::chain::escrow_address("transfer", "channel-0"), "udym")
                .unwrap(),
            Amount::from(300u64)
        );
    }

    #[test_log::test]
    fn rejected_packet_is_refunded() {
        let Setup {
            dymension,
            osmosis: _,
            relayer,
            reporter,
        } = setup();

        relayer.link_path(&reporter, "dym-osmo").unwrap();

        let sender = dymension.create_wallet("sender").unwrap();

        dymension
            .send_funds(
                FAUCET_ACCOUNT_KEY_NAME,
                &WalletAmount::new(sender.address.clone(), Denom::base("udym"), 100u64),
            )
            .unwrap();

        // A dymension address cannot receive on osmosis.
        dymension
            .send_ibc_transfer(
                &ChannelId::new(0),
                "sender",
                &WalletAmount::new(sender.address.clone(), Denom::base("udym"), 100u64),
                &TransferOptions::default(),
            )
            .unwrap();

        assert_eq!(
            dymension.get_balance(sender.address.as_str(), "udym").unwrap(),
            Amount::from(0u64)
        );

        relayer
            .flush(&reporter, "dym-osmo", &ChannelId::new(0))
            .unwrap();

        assert_eq!(
            dymension.get_balance(sender.address.as_str(), "udym").unwrap(),
            Amount::from(100u64)
        );
    }

    #[test_log::test]
    fn operations_on_unknown_paths_fail() {
        let Setup {
            relayer, reporter, ..
        } = setup();

        assert!(relayer.link_path(&reporter, "unknown").is_err());
        assert!(relayer
            .flush(&reporter, "dym-osmo", &ChannelId::new(0))
            .is_err());
        assert!(relayer
            .start_relayer(&reporter, &["unknown".to_string()])
            .is_err());

        relayer
            .start_relayer(&reporter, &["dym-osmo".to_string()])
            .unwrap();
        assert!(relayer.is_running());

        relayer.stop_relayer(&reporter).unwrap();
        assert!(!relayer.is_running());
    }
}
