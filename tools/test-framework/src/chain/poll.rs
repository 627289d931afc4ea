/*!
   Polling a chain for messages of a given type in its transactions.
*/

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json as json;
use tracing::{debug, trace};

use crate::chain::encoding::InterfaceRegistry;
use crate::chain::handle::ChainHandle;
use crate::error::Error;

/// A message type that can be decoded from a JSON encoded transaction.
pub trait TypedMessage: DeserializeOwned {
    const TYPE_URL: &'static str;
}

/// The light client update submitted by a relayer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsgUpdateClient {
    pub client_id: String,

    /// Named `header` before ibc-go v7.
    #[serde(default, alias = "header")]
    pub client_message: Option<json::Value>,

    #[serde(default)]
    pub signer: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsgRecvPacket {
    pub packet: json::Value,

    #[serde(default)]
    pub signer: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsgAcknowledgement {
    pub packet: json::Value,

    #[serde(default)]
    pub acknowledgement: String,

    #[serde(default)]
    pub signer: String,
}

impl TypedMessage for MsgUpdateClient {
    const TYPE_URL: &'static str = "/ibc.core.client.v1.MsgUpdateClient";
}

impl TypedMessage for MsgRecvPacket {
    const TYPE_URL: &'static str = "/ibc.core.channel.v1.MsgRecvPacket";
}

impl TypedMessage for MsgAcknowledgement {
    const TYPE_URL: &'static str = "/ibc.core.channel.v1.MsgAcknowledgement";
}

/// The body messages of a JSON encoded `TxResponse`.
pub fn tx_messages(tx_response: &json::Value) -> &[json::Value] {
    tx_response
        .get("tx")
        .and_then(|tx| tx.get("body"))
        .and_then(|body| body.get("messages"))
        .and_then(|messages| messages.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/**
   Search the blocks from `start_height` to `end_height`, both
   inclusive, for the first message of type `M` accepted by `filter`.
   Blocks that are not produced yet are waited for.

   Every transaction is checked against `registry` first, so a
   transaction carrying a type unknown to the registry fails the poll
   even if it does not contain the message looked for.
*/
pub fn poll_for_message<M: TypedMessage>(
    chain: &dyn ChainHandle,
    registry: &InterfaceRegistry,
    start_height: u64,
    end_height: u64,
    filter: Option<&dyn Fn(&M) -> bool>,
) -> Result<M, Error> {
    debug!(
        "polling {} for {} between heights {} and {}",
        chain.config().chain_id,
        M::TYPE_URL,
        start_height,
        end_height
    );

    for height in start_height..=end_height {
        let mut current_height = chain.height()?;
        while current_height < height {
            current_height = chain.wait_for_blocks(1)?;
        }

        let txs = chain.query_txs_at_height(height)?;
        trace!("found {} transactions at height {}", txs.len(), height);

        for tx in txs.iter() {
            registry.ensure_decodable(tx)?;

            for message in tx_messages(tx) {
                if message.get("@type").and_then(|t| t.as_str()) != Some(M::TYPE_URL) {
                    continue;
                }

                let decoded: M = json::from_value(message.clone())?;

                if filter.map_or(true, |filter| filter(&decoded)) {
                    return Ok(decoded);
                }
            }
        }
    }

    Err(Error::message_not_found(
        M::TYPE_URL.to_string(),
        start_height,
        end_height,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn decodes_update_client_of_both_ibc_versions() {
        let legacy: MsgUpdateClient = json::from_value(json::json!({
            "@type": "/ibc.core.client.v1.MsgUpdateClient",
            "client_id": "07-tendermint-0",
            "header": { "@type": "/ibc.lightclients.tendermint.v1.Header" },
            "signer": "osmo1relayer"
        }))
        .unwrap();

        assert_eq!(legacy.client_id, "07-tendermint-0");
        assert!(legacy.client_message.is_some());

        let current: MsgUpdateClient = json::from_value(json::json!({
            "client_id": "07-tendermint-1",
            "client_message": { "@type": "/ibc.lightclients.tendermint.v1.Header" },
            "signer": "osmo1relayer"
        }))
        .unwrap();

        assert_eq!(current.signer, "osmo1relayer");
    }

    #[test_log::test]
    fn extracts_body_messages() {
        let tx = json::json!({
            "tx": { "body": { "messages": [{ "@type": "/cosmos.bank.v1beta1.MsgSend" }] } }
        });

        assert_eq!(tx_messages(&tx).len(), 1);
        assert!(tx_messages(&json::json!({})).is_empty());
    }
}
