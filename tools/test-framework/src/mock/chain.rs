/*!
   An in-memory chain.

   A [`MockChain`] keeps a bank ledger and commits every transaction in
   its own block, recording it as a JSON encoded `TxResponse` shaped
   like the ones returned by the cosmos-sdk CLI. Token transfers follow
   the ICS-20 rules: native tokens are escrowed when sent and vouchers
   are minted on the receiving chain, vouchers travelling back to their
   source are burned and the escrowed tokens released.

   Creating clients, connections and channels, and delivering packets,
   is driven by the [`MockRelayer`](crate::mock::MockRelayer).
*/

use core::str::FromStr;
use core::time::Duration;
use ibc_relayer_types::applications::transfer::amount::Amount;
use ibc_relayer_types::core::ics24_host::identifier::ChannelId;
use serde_json::{self as json, json};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::chain::handle::{
    ChainHandle, ChainInitOptions, TransferOptions, FAUCET_ACCOUNT_KEY_NAME,
};
use crate::chain::spec::ChainConfig;
use crate::chain::tx::{Packet, Tx};
use crate::error::{handle_generic_error, Error};
use crate::ibc::denom::DenomTrace;
use crate::relayer::handle::{ChannelCounterparty, ChannelOutput};
use crate::types::wallet::{Wallet, WalletAmount};
use crate::util::mutex::MutexUtil;
use crate::util::random::random_string;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const SUCCESS_ACK: &str = r#"{"result":"AQ=="}"#;
const TENDERMINT_HEADER: &str = "/ibc.lightclients.tendermint.v1.Header";

pub struct MockChain {
    config: ChainConfig,
    state: Mutex<MockChainState>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockClient {
    pub client_id: String,
    pub counterparty_chain_id: String,
    pub latest_height: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockConnection {
    pub connection_id: String,
    pub client_id: String,
    pub counterparty_client_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockChannel {
    pub port_id: String,
    pub channel_id: String,
    pub connection_id: String,
    pub counterparty_port_id: String,
    pub counterparty_channel_id: Option<String>,
    pub open: bool,
}

/// A packet received by the chain, with the acknowledgement it wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedPacket {
    pub packet: Packet,
    pub acknowledgement: String,
}

#[derive(Default)]
struct MockChainState {
    started: bool,
    height: u64,
    tx_count: u64,
    keys: BTreeMap<String, Wallet>,
    balances: BTreeMap<String, BTreeMap<String, Amount>>,
    txs: BTreeMap<u64, Vec<json::Value>>,
    denom_traces: BTreeMap<String, DenomTrace>,
    clients: Vec<MockClient>,
    connections: Vec<MockConnection>,
    channels: Vec<MockChannel>,
    next_sequences: BTreeMap<String, u64>,
    sent_packets: Vec<Packet>,
    received_packets: BTreeSet<(String, u64)>,
}

/// The ICS-20 payload of a transfer packet.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FungibleTokenPacketData {
    pub denom: String,
    pub amount: String,
    pub sender: String,
    pub receiver: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memo: String,
}

fn zero() -> Amount {
    Amount::from(0u64)
}

/// The account holding the tokens escrowed on a channel.
pub fn escrow_address(port_id: &str, channel_id: &str) -> String {
    format!("escrow/{port_id}/{channel_id}")
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos() as u64)
        .unwrap_or_default()
}

fn attribute(key: &str, value: impl ToString) -> json::Value {
    json!({ "key": key, "value": value.to_string() })
}

fn packet_json(packet: &Packet) -> json::Value {
    json!({
        "sequence": packet.sequence.to_string(),
        "source_port": packet.source_port,
        "source_channel": packet.source_channel,
        "destination_port": packet.dest_port,
        "destination_channel": packet.dest_channel,
        "data": String::from_utf8_lossy(&packet.data),
        "timeout_height": packet.timeout_height,
        "timeout_timestamp": packet.timeout_timestamp.to_string(),
    })
}

fn packet_attributes(packet: &Packet, connection_id: &str) -> Vec<json::Value> {
    vec![
        attribute("packet_data", String::from_utf8_lossy(&packet.data)),
        attribute(
            "packet_data_hex",
            String::from_utf8_lossy(&subtle_encoding::hex::encode(&packet.data)),
        ),
        attribute("packet_timeout_height", &packet.timeout_height),
        attribute("packet_timeout_timestamp", packet.timeout_timestamp),
        attribute("packet_sequence", packet.sequence),
        attribute("packet_src_port", &packet.source_port),
        attribute("packet_src_channel", &packet.source_channel),
        attribute("packet_dst_port", &packet.dest_port),
        attribute("packet_dst_channel", &packet.dest_channel),
        attribute("packet_channel_ordering", "ORDER_UNORDERED"),
        attribute("packet_connection", connection_id),
    ]
}

impl MockChainState {
    fn balance(&self, address: &str, denom: &str) -> Amount {
        self.balances
            .get(address)
            .and_then(|balances| balances.get(denom))
            .copied()
            .unwrap_or_else(zero)
    }

    fn credit(&mut self, address: &str, denom: &str, amount: Amount) -> Result<(), Error> {
        let balance = self
            .balances
            .entry(address.to_string())
            .or_default()
            .entry(denom.to_string())
            .or_insert_with(zero);

        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| handle_generic_error(eyre::eyre!("balance overflow for {address}")))?;

        Ok(())
    }

    fn debit(&mut self, address: &str, denom: &str, amount: Amount) -> Result<(), Error> {
        let balance = self.balance(address, denom);

        let remaining = balance.checked_sub(amount).ok_or_else(|| {
            Error::insufficient_funds(
                address.to_string(),
                denom.to_string(),
                balance.to_string(),
                amount.to_string(),
            )
        })?;

        self.balances
            .entry(address.to_string())
            .or_default()
            .insert(denom.to_string(), remaining);

        Ok(())
    }

    /// The full trace of a denomination held on this chain.
    fn trace_of(&self, denom: &str) -> DenomTrace {
        self.denom_traces
            .get(denom)
            .cloned()
            .unwrap_or_else(|| DenomTrace::parse(denom))
    }

    fn channel(&self, channel_id: &str) -> Option<&MockChannel> {
        self.channels
            .iter()
            .find(|channel| channel.channel_id == channel_id)
    }

    fn client_mut(&mut self, client_id: &str) -> Option<&mut MockClient> {
        self.clients
            .iter_mut()
            .find(|client| client.client_id == client_id)
    }

    /// Commit a transaction in a new block and return its `TxResponse`.
    fn commit_tx(
        &mut self,
        config: &ChainConfig,
        messages: Vec<json::Value>,
        events: Vec<json::Value>,
        memo: &str,
    ) -> json::Value {
        self.height += 1;
        self.tx_count += 1;

        let hash = Sha256::digest(format!("{}/{}/{}", config.chain_id, self.height, self.tx_count));
        let tx_hash = String::from_utf8_lossy(&subtle_encoding::hex::encode_upper(hash)).to_string();

        let gas_used = 50_000 + 25_000 * messages.len() as u64;

        let response = json!({
            "height": self.height.to_string(),
            "txhash": tx_hash,
            "code": 0,
            "raw_log": "",
            "gas_wanted": (gas_used * 2).to_string(),
            "gas_used": gas_used.to_string(),
            "tx": {
                "@type": "/cosmos.tx.v1beta1.Tx",
                "body": {
                    "messages": messages,
                    "memo": memo,
                    "timeout_height": "0",
                    "extension_options": [],
                    "non_critical_extension_options": [],
                },
                "auth_info": {
                    "signer_infos": [{
                        "public_key": {
                            "@type": config.chain_type.pk_type(),
                            "key": random_string(44),
                        },
                        "mode_info": { "single": { "mode": "SIGN_MODE_DIRECT" } },
                        "sequence": self.tx_count.to_string(),
                    }],
                    "fee": {
                        "amount": [],
                        "gas_limit": (gas_used * 2).to_string(),
                        "payer": "",
                        "granter": "",
                    },
                },
                "signatures": [random_string(88)],
            },
            "logs": [{ "msg_index": 0, "log": "", "events": events }],
            "events": [],
        });

        self.txs
            .entry(self.height)
            .or_default()
            .push(response.clone());

        response
    }
}

impl MockChain {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MockChainState::default()),
        }
    }

    fn id(&self) -> String {
        self.config.chain_id.clone()
    }

    fn started_state(&self) -> Result<std::sync::MutexGuard<'_, MockChainState>, Error> {
        let state = self.state.acquire_mutex();

        if state.started {
            Ok(state)
        } else {
            Err(Error::chain_not_started(self.id()))
        }
    }

    fn key(&self, state: &MockChainState, key_name: &str) -> Result<Wallet, Error> {
        state
            .keys
            .get(key_name)
            .cloned()
            .ok_or_else(|| Error::unknown_key(self.id(), key_name.to_string()))
    }

    fn new_wallet(&self, state: &mut MockChainState, key_name: &str) -> Result<Wallet, Error> {
        if state.keys.contains_key(key_name) {
            return Err(handle_generic_error(eyre::eyre!(
                "key {} already exists on chain {}",
                key_name,
                self.config.chain_id
            )));
        }

        let address = format!("{}1{}", self.config.bech32_prefix, random_string(38));
        let mnemonic = (0..24)
            .map(|_| random_string(6))
            .collect::<Vec<_>>()
            .join(" ");

        let wallet = Wallet::new(
            key_name.to_string(),
            address,
            mnemonic,
            ChainHandle::chain_id(self),
        );

        state.keys.insert(key_name.to_string(), wallet.clone());

        Ok(wallet)
    }

    /// The key restored from `mnemonic`.
    pub fn wallet_by_mnemonic(&self, mnemonic: &str) -> Result<Wallet, Error> {
        self.state
            .acquire_mutex()
            .keys
            .values()
            .find(|wallet| wallet.mnemonic == mnemonic)
            .cloned()
            .ok_or_else(|| Error::unknown_key(self.id(), "<mnemonic>".to_string()))
    }

    pub fn clients(&self) -> Vec<MockClient> {
        self.state.acquire_mutex().clients.clone()
    }

    pub fn connections(&self) -> Vec<MockConnection> {
        self.state.acquire_mutex().connections.clone()
    }

    /// The trace of an `ibc/{hash}` voucher minted on the chain.
    pub fn denom_trace(&self, ibc_denom: &str) -> Option<DenomTrace> {
        self.state.acquire_mutex().denom_traces.get(ibc_denom).cloned()
    }

    /// Packets sent from the channel and not acknowledged yet.
    pub fn pending_packets(&self, channel_id: &str) -> Vec<Packet> {
        self.state
            .acquire_mutex()
            .sent_packets
            .iter()
            .filter(|packet| packet.source_channel == channel_id)
            .cloned()
            .collect()
    }

    /// The header a counterparty light client is updated with.
    pub fn header(&self) -> Result<json::Value, Error> {
        let state = self.started_state()?;

        Ok(json!({
            "@type": TENDERMINT_HEADER,
            "signed_header": {
                "header": {
                    "chain_id": self.config.chain_id,
                    "height": state.height.to_string(),
                },
            },
            "trusted_height": {
                "revision_number": "0",
                "revision_height": state.height.saturating_sub(1).to_string(),
            },
        }))
    }

    fn update_client_message(
        state: &mut MockChainState,
        signer: &str,
        client_id: &str,
        header: json::Value,
    ) -> json::Value {
        let header_height = header
            .pointer("/signed_header/header/height")
            .and_then(|height| height.as_str())
            .and_then(|height| height.parse::<u64>().ok())
            .unwrap_or_default();

        if let Some(client) = state.client_mut(client_id) {
            client.latest_height = client.latest_height.max(header_height);
        }

        json!({
            "@type": "/ibc.core.client.v1.MsgUpdateClient",
            "client_id": client_id,
            "client_message": header,
            "signer": signer,
        })
    }

    /**
       Create a light client of `counterparty` at the given height and
       return its identifier, `07-tendermint-{N}` for the N-th client.
    */
    pub fn create_client(
        &self,
        signer: &str,
        counterparty: &ChainConfig,
        counterparty_height: u64,
    ) -> Result<String, Error> {
        let mut state = self.started_state()?;

        let client_id = format!("07-tendermint-{}", state.clients.len());

        state.clients.push(MockClient {
            client_id: client_id.clone(),
            counterparty_chain_id: counterparty.chain_id.clone(),
            latest_height: counterparty_height,
        });

        let message = json!({
            "@type": "/ibc.core.client.v1.MsgCreateClient",
            "client_state": {
                "@type": "/ibc.lightclients.tendermint.v1.ClientState",
                "chain_id": counterparty.chain_id,
                "trusting_period": counterparty.trusting_period,
                "latest_height": {
                    "revision_number": "0",
                    "revision_height": counterparty_height.to_string(),
                },
            },
            "consensus_state": {
                "@type": "/ibc.lightclients.tendermint.v1.ConsensusState",
            },
            "signer": signer,
        });

        let events = vec![json!({
            "type": "create_client",
            "attributes": [
                attribute("client_id", &client_id),
                attribute("client_type", "07-tendermint"),
                attribute("consensus_height", format!("0-{counterparty_height}")),
            ],
        })];

        state.commit_tx(&self.config, vec![message], events, "");

        info!("created client {} on chain {}", client_id, self.config.chain_id);

        Ok(client_id)
    }

    /**
       Run one step of the connection handshake. The first step on each
       end allocates the connection identifier.
    */
    pub fn open_connection(
        &self,
        signer: &str,
        message_type: &str,
        client_id: &str,
        counterparty_client_id: &str,
        connection_id: Option<&str>,
    ) -> Result<String, Error> {
        let mut state = self.started_state()?;

        let connection_id = match connection_id {
            Some(connection_id) => connection_id.to_string(),
            None => {
                let connection_id = format!("connection-{}", state.connections.len());

                state.connections.push(MockConnection {
                    connection_id: connection_id.clone(),
                    client_id: client_id.to_string(),
                    counterparty_client_id: counterparty_client_id.to_string(),
                });

                connection_id
            }
        };

        let message = json!({
            "@type": format!("/ibc.core.connection.v1.{message_type}"),
            "client_id": client_id,
            "connection_id": connection_id,
            "counterparty": { "client_id": counterparty_client_id },
            "signer": signer,
        });

        state.commit_tx(&self.config, vec![message], Vec::new(), "");

        Ok(connection_id)
    }

    /**
       Run one step of the channel handshake on the `transfer` port. The
       first step on each end allocates the channel identifier, and the
       channel is open once the counterparty channel is known and the
       step is `MsgChannelOpenAck` or `MsgChannelOpenConfirm`.
    */
    pub fn open_channel(
        &self,
        signer: &str,
        message_type: &str,
        connection_id: &str,
        channel_id: Option<&str>,
        counterparty_channel_id: Option<&str>,
    ) -> Result<String, Error> {
        let mut state = self.started_state()?;
        let port_id = "transfer".to_string();

        let channel_id = match channel_id {
            Some(channel_id) => channel_id.to_string(),
            None => {
                let channel_id = ChannelId::new(state.channels.len() as u64).to_string();

                state.channels.push(MockChannel {
                    port_id: port_id.clone(),
                    channel_id: channel_id.clone(),
                    connection_id: connection_id.to_string(),
                    counterparty_port_id: port_id.clone(),
                    counterparty_channel_id: None,
                    open: false,
                });

                channel_id
            }
        };

        let chain_id = self.id();
        let channel = state
            .channels
            .iter_mut()
            .find(|channel| channel.channel_id == channel_id)
            .ok_or_else(|| Error::unknown_channel(chain_id, channel_id.clone()))?;

        if let Some(counterparty_channel_id) = counterparty_channel_id {
            channel.counterparty_channel_id = Some(counterparty_channel_id.to_string());
        }

        if matches!(message_type, "MsgChannelOpenAck" | "MsgChannelOpenConfirm") {
            channel.open = channel.counterparty_channel_id.is_some();
        }

        let message = json!({
            "@type": format!("/ibc.core.channel.v1.{message_type}"),
            "port_id": port_id,
            "channel_id": channel_id,
            "counterparty_channel_id": counterparty_channel_id.unwrap_or_default(),
            "connection_hops": [connection_id],
            "version": "ics20-1",
            "signer": signer,
        });

        state.commit_tx(&self.config, vec![message], Vec::new(), "");

        Ok(channel_id)
    }

    /// Every channel end of the chain, as listed by a relayer.
    pub fn channels(&self) -> Vec<ChannelOutput> {
        self.state
            .acquire_mutex()
            .channels
            .iter()
            .map(|channel| ChannelOutput {
                state: if channel.open {
                    "STATE_OPEN".to_string()
                } else {
                    "STATE_INIT".to_string()
                },
                ordering: "ORDER_UNORDERED".to_string(),
                counterparty: ChannelCounterparty {
                    port_id: channel.counterparty_port_id.clone(),
                    channel_id: channel.counterparty_channel_id.clone().unwrap_or_default(),
                },
                connection_hops: vec![channel.connection_id.clone()],
                version: "ics20-1".to_string(),
                port_id: channel.port_id.clone(),
                channel_id: channel.channel_id.clone(),
            })
            .collect()
    }

    /**
       Apply a received transfer packet to the ledger and return the
       acknowledgement to write. A packet that cannot be applied is
       acknowledged with an error and leaves the ledger untouched.
    */
    fn apply_received_packet(&self, state: &mut MockChainState, packet: &Packet) -> String {
        match self.try_apply_received_packet(state, packet) {
            Ok(()) => SUCCESS_ACK.to_string(),
            Err(e) => json!({ "error": e.to_string() }).to_string(),
        }
    }

    fn try_apply_received_packet(
        &self,
        state: &mut MockChainState,
        packet: &Packet,
    ) -> Result<(), Error> {
        let data: FungibleTokenPacketData = json::from_slice(&packet.data)?;

        let amount = Amount::from_str(&data.amount).map_err(handle_generic_error)?;

        if !data
            .receiver
            .starts_with(&format!("{}1", self.config.bech32_prefix))
        {
            return Err(Error::assertion(format!(
                "invalid receiver address {} on chain {}",
                data.receiver, self.config.chain_id
            )));
        }

        let trace = DenomTrace::parse(&data.denom);

        if trace.has_prefix(&packet.source_port, &packet.source_channel) {
            // The token returns to this chain, which escrowed it when sending.
            let local = trace.remove_prefix();
            let denom = local.ibc_denom()?;
            let escrow = escrow_address(&packet.dest_port, &packet.dest_channel);

            state.debit(&escrow, &denom, amount)?;
            state.credit(&data.receiver, &denom, amount)?;
        } else {
            let voucher = trace.add_prefix(&packet.dest_port, &packet.dest_channel);
            let denom = voucher.ibc_denom()?;

            state.credit(&data.receiver, &denom, amount)?;
            state.denom_traces.insert(denom, voucher);
        }

        Ok(())
    }

    /// Give back the tokens of a packet acknowledged with an error.
    fn refund_packet(&self, state: &mut MockChainState, packet: &Packet) -> Result<(), Error> {
        let data: FungibleTokenPacketData = json::from_slice(&packet.data)?;
        let amount = Amount::from_str(&data.amount).map_err(handle_generic_error)?;

        let trace = DenomTrace::parse(&data.denom);
        let denom = trace.ibc_denom()?;

        if !trace.has_prefix(&packet.source_port, &packet.source_channel) {
            let escrow = escrow_address(&packet.source_port, &packet.source_channel);
            state.debit(&escrow, &denom, amount)?;
        }

        state.credit(&data.sender, &denom, amount)
    }

    /**
       Deliver packets sent by the counterparty, updating the client
       tracking it first, in a single transaction. Packets received
       before are skipped.
    */
    pub fn receive_packets(
        &self,
        signer: &str,
        client_id: &str,
        header: json::Value,
        packets: &[Packet],
    ) -> Result<Vec<ReceivedPacket>, Error> {
        let mut state = self.started_state()?;

        let mut messages = vec![Self::update_client_message(
            &mut state, signer, client_id, header,
        )];
        let mut events = Vec::new();
        let mut received = Vec::new();

        for packet in packets {
            let key = (packet.dest_channel.clone(), packet.sequence);

            if state.received_packets.contains(&key) {
                debug!("skipping packet {} already received", packet.sequence);
                continue;
            }

            let connection_id = state
                .channel(&packet.dest_channel)
                .map(|channel| channel.connection_id.clone())
                .ok_or_else(|| Error::unknown_channel(self.id(), packet.dest_channel.clone()))?;

            let acknowledgement = self.apply_received_packet(&mut state, packet);
            state.received_packets.insert(key);

            messages.push(json!({
                "@type": "/ibc.core.channel.v1.MsgRecvPacket",
                "packet": packet_json(packet),
                "proof_height": { "revision_number": "0", "revision_height": "0" },
                "signer": signer,
            }));

            events.push(json!({
                "type": "recv_packet",
                "attributes": packet_attributes(packet, &connection_id),
            }));

            let mut ack_attributes = packet_attributes(packet, &connection_id);
            ack_attributes.push(attribute("packet_ack", &acknowledgement));

            events.push(json!({
                "type": "write_acknowledgement",
                "attributes": ack_attributes,
            }));

            received.push(ReceivedPacket {
                packet: packet.clone(),
                acknowledgement,
            });
        }

        state.commit_tx(&self.config, messages, events, "");

        Ok(received)
    }

    /**
       Process the acknowledgements of packets sent by this chain,
       refunding the sender of every packet acknowledged with an error.
    */
    pub fn acknowledge_packets(
        &self,
        signer: &str,
        client_id: &str,
        header: json::Value,
        received: &[ReceivedPacket],
    ) -> Result<(), Error> {
        let mut state = self.started_state()?;

        let mut messages = vec![Self::update_client_message(
            &mut state, signer, client_id, header,
        )];
        let mut events = Vec::new();

        for ReceivedPacket {
            packet,
            acknowledgement,
        } in received
        {
            let Some(index) = state.sent_packets.iter().position(|sent| sent == packet) else {
                continue;
            };

            state.sent_packets.remove(index);

            if acknowledgement.contains("\"error\"") {
                self.refund_packet(&mut state, packet)?;
            }

            messages.push(json!({
                "@type": "/ibc.core.channel.v1.MsgAcknowledgement",
                "packet": packet_json(packet),
                "acknowledgement": acknowledgement,
                "proof_height": { "revision_number": "0", "revision_height": "0" },
                "signer": signer,
            }));

            events.push(json!({
                "type": "acknowledge_packet",
                "attributes": [
                    attribute("packet_sequence", packet.sequence),
                    attribute("packet_src_channel", &packet.source_channel),
                    attribute("packet_dst_channel", &packet.dest_channel),
                ],
            }));
        }

        state.commit_tx(&self.config, messages, events, "");

        Ok(())
    }
}

impl ChainHandle for MockChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn initialize(&self, options: &ChainInitOptions) -> Result<(), Error> {
        debug!(
            "initializing mock chain {} for test {}",
            self.config.chain_id, options.test_name
        );

        Ok(())
    }

    fn start(&self, test_name: &str, genesis_wallets: &[WalletAmount]) -> Result<(), Error> {
        let mut state = self.state.acquire_mutex();

        if state.started {
            return Err(Error::chain_already_started(self.config.chain_id.to_string()));
        }

        let faucet = self.new_wallet(&mut state, FAUCET_ACCOUNT_KEY_NAME)?;
        state.credit(
            faucet.address.as_str(),
            &self.config.denom,
            self.config.genesis_amounts.genesis,
        )?;

        for wallet in genesis_wallets {
            state.credit(wallet.address.as_str(), wallet.denom.as_str(), wallet.amount)?;
        }

        state.started = true;
        state.height = 2;

        info!(
            "started mock chain {} for test {}",
            self.config.chain_id, test_name
        );

        Ok(())
    }

    fn height(&self) -> Result<u64, Error> {
        Ok(self.started_state()?.height)
    }

    fn wait_for_blocks(&self, delta: u64) -> Result<u64, Error> {
        let mut state = self.started_state()?;
        state.height += delta;

        Ok(state.height)
    }

    fn get_balance(&self, address: &str, denom: &str) -> Result<Amount, Error> {
        Ok(self.started_state()?.balance(address, denom))
    }

    fn create_wallet(&self, key_name: &str) -> Result<Wallet, Error> {
        let mut state = self.state.acquire_mutex();
        self.new_wallet(&mut state, key_name)
    }

    fn send_funds(&self, key_name: &str, amount: &WalletAmount) -> Result<(), Error> {
        let mut state = self.started_state()?;
        let sender = self.key(&state, key_name)?;
        let denom = amount.denom.as_str();

        state.debit(sender.address.as_str(), denom, amount.amount)?;
        state.credit(amount.address.as_str(), denom, amount.amount)?;

        let message = json!({
            "@type": "/cosmos.bank.v1beta1.MsgSend",
            "from_address": sender.address.as_str(),
            "to_address": amount.address.as_str(),
            "amount": [{ "denom": denom, "amount": amount.amount.to_string() }],
        });

        let events = vec![json!({
            "type": "transfer",
            "attributes": [
                attribute("recipient", amount.address.as_str()),
                attribute("sender", sender.address.as_str()),
                attribute("amount", format!("{}{}", amount.amount, denom)),
            ],
        })];

        state.commit_tx(&self.config, vec![message], events, "");

        Ok(())
    }

    fn send_ibc_transfer(
        &self,
        channel_id: &ChannelId,
        key_name: &str,
        amount: &WalletAmount,
        options: &TransferOptions,
    ) -> Result<Tx, Error> {
        let mut state = self.started_state()?;
        let sender = self.key(&state, key_name)?;

        let unknown_channel = || Error::unknown_channel(self.id(), channel_id.to_string());

        let channel = state
            .channel(channel_id.as_str())
            .filter(|channel| channel.open)
            .cloned()
            .ok_or_else(unknown_channel)?;

        let counterparty_channel_id = channel
            .counterparty_channel_id
            .clone()
            .ok_or_else(unknown_channel)?;

        let denom = amount.denom.as_str();
        let trace = state.trace_of(denom);

        state.debit(sender.address.as_str(), denom, amount.amount)?;

        // Vouchers going back through the channel they came from are burned.
        if !trace.has_prefix(&channel.port_id, &channel.channel_id) {
            let escrow = escrow_address(&channel.port_id, &channel.channel_id);
            state.credit(&escrow, denom, amount.amount)?;
        }

        let memo = options.memo.clone().unwrap_or_default();

        let data = FungibleTokenPacketData {
            denom: trace.full_path(),
            amount: amount.amount.to_string(),
            sender: sender.address.0.clone(),
            receiver: amount.address.0.clone(),
            memo: memo.clone(),
        };

        let (timeout_height, timeout_timestamp) = match &options.timeout {
            Some(timeout) => (
                format!("0-{}", timeout.height.unwrap_or_default()),
                timeout.nano_seconds.unwrap_or_default(),
            ),
            None => (
                "0-0".to_string(),
                now_nanos() + DEFAULT_TIMEOUT.as_nanos() as u64,
            ),
        };

        let sequence = {
            let next = state
                .next_sequences
                .entry(channel.channel_id.clone())
                .or_insert(1);
            let sequence = *next;
            *next += 1;
            sequence
        };

        let packet = Packet {
            sequence,
            source_port: channel.port_id.clone(),
            source_channel: channel.channel_id.clone(),
            dest_port: channel.counterparty_port_id.clone(),
            dest_channel: counterparty_channel_id,
            data: json::to_vec(&data)?,
            timeout_height,
            timeout_timestamp,
        };

        let message = json!({
            "@type": "/ibc.applications.transfer.v1.MsgTransfer",
            "source_port": packet.source_port,
            "source_channel": packet.source_channel,
            "token": { "denom": denom, "amount": amount.amount.to_string() },
            "sender": sender.address.as_str(),
            "receiver": amount.address.as_str(),
            "timeout_height": {
                "revision_number": "0",
                "revision_height": packet.timeout_height.trim_start_matches("0-"),
            },
            "timeout_timestamp": packet.timeout_timestamp.to_string(),
            "memo": memo,
        });

        let events = vec![json!({
            "type": "send_packet",
            "attributes": packet_attributes(&packet, &channel.connection_id),
        })];

        let response = state.commit_tx(&self.config, vec![message], events, &memo);
        state.sent_packets.push(packet);

        Tx::from_tx_response(&response)
    }

    fn query_txs_at_height(&self, height: u64) -> Result<Vec<json::Value>, Error> {
        let state = self.started_state()?;

        Ok(state.txs.get(&height).cloned().unwrap_or_default())
    }

    fn rpc_address(&self) -> String {
        format!("mock://{}", self.config.chain_id)
    }

    fn grpc_address(&self) -> String {
        format!("mock-grpc://{}", self.config.chain_id)
    }

    fn stop(&self) -> Result<(), Error> {
        self.state.acquire_mutex().started = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::builtin::{dymension, osmosis};
    use crate::chain::poll::tx_messages;
    use crate::error::ErrorDetail;
    use crate::ibc::denom::Denom;

    fn started(config: ChainConfig) -> MockChain {
        let chain = MockChain::new(config);
        chain.start("mock", &[]).unwrap();
        chain
    }

    #[test_log::test]
    fn operations_require_started_chain() {
        let chain = MockChain::new(osmosis());

        assert!(chain.height().is_err());

        chain.start("mock", &[]).unwrap();
        assert_eq!(chain.height().unwrap(), 2);

        chain.stop().unwrap();
        assert!(chain.get_balance("osmo1abc", "uosmo").is_err());
    }

    #[test_log::test]
    fn second_start_is_rejected() {
        let chain = MockChain::new(osmosis());
        let wallet = chain.create_wallet("relayer").unwrap();

        chain.start("mock", &[]).unwrap();

        let result = chain.start(
            "mock",
            &[WalletAmount::new(wallet.address.clone(), Denom::base("uosmo"), 5_000u64)],
        );

        match result {
            Err(e) => match e.detail() {
                ErrorDetail::ChainAlreadyStarted(detail) => {
                    assert_eq!(detail.chain_id, "osmosis-1001")
                }
                e => panic!("expected an already started chain, got {e:?}"),
            },
            Ok(()) => panic!("expected the second start to fail"),
        }

        assert_eq!(
            chain.get_balance(wallet.address.as_str(), "uosmo").unwrap(),
            Amount::from(0u64)
        );
    }

    #[test_log::test]
    fn genesis_wallets_are_funded() {
        let chain = MockChain::new(osmosis());
        let wallet = chain.create_wallet("relayer").unwrap();

        chain
            .start(
                "mock",
                &[WalletAmount::new(wallet.address.clone(), Denom::base("uosmo"), 5_000u64)],
            )
            .unwrap();

        assert_eq!(
            chain.get_balance(wallet.address.as_str(), "uosmo").unwrap(),
            Amount::from(5_000u64)
        );
        assert!(chain.create_wallet("relayer").is_err());
    }

    #[test_log::test]
    fn send_funds_moves_tokens_and_records_tx() {
        let chain = started(osmosis());
        let user = chain.create_wallet("user").unwrap();

        chain
            .send_funds(
                FAUCET_ACCOUNT_KEY_NAME,
                &WalletAmount::new(user.address.clone(), Denom::base("uosmo"), 10_000_000u64),
            )
            .unwrap();

        assert_eq!(
            chain.get_balance(user.address.as_str(), "uosmo").unwrap(),
            Amount::from(10_000_000u64)
        );

        let height = chain.height().unwrap();
        let txs = chain.query_txs_at_height(height).unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(
            tx_messages(&txs[0])[0]["@type"],
            "/cosmos.bank.v1beta1.MsgSend"
        );

        let err = chain
            .send_funds(
                "user",
                &WalletAmount::new(user.address.clone(), Denom::base("uosmo"), 20_000_000u64),
            )
            .unwrap_err();

        match err.detail() {
            crate::error::ErrorDetail::InsufficientFunds(e) => assert_eq!(e.balance, "10000000"),
            e => panic!("unexpected error: {e:?}"),
        }
    }

    #[test_log::test]
    fn ethermint_chains_sign_with_ethermint_keys() {
        let chain = started(dymension());
        let user = chain.create_wallet("user").unwrap();

        chain
            .send_funds(
                FAUCET_ACCOUNT_KEY_NAME,
                &WalletAmount::new(user.address.clone(), Denom::base("udym"), 1u64),
            )
            .unwrap();

        let txs = chain.query_txs_at_height(chain.height().unwrap()).unwrap();

        assert!(crate::chain::encoding::default_encoding()
            .interface_registry
            .ensure_decodable(&txs[0])
            .is_err());

        assert!(chain
            .config()
            .encoding
            .interface_registry
            .ensure_decodable(&txs[0])
            .is_ok());
    }

    #[test_log::test]
    fn transfer_requires_open_channel() {
        let chain = started(dymension());
        let user = chain.create_wallet("user").unwrap();

        let result = chain.send_ibc_transfer(
            &ChannelId::new(0),
            FAUCET_ACCOUNT_KEY_NAME,
            &WalletAmount::new(user.address.clone(), Denom::base("udym"), 1u64),
            &TransferOptions::default(),
        );

        match result {
            Err(e) => match e.detail() {
                crate::error::ErrorDetail::UnknownChannel(e) => {
                    assert_eq!(e.channel_id, "channel-0")
                }
                e => panic!("unexpected error: {e:?}"),
            },
            Ok(tx) => panic!("unexpected transfer: {tx:?}"),
        }
    }
}
