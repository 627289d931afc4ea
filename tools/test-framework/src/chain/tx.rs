/*!
   The result of a committed IBC transfer transaction.
*/

use core::str::FromStr;
use ibc_relayer_types::core::ics24_host::identifier::{ChannelId, PortId};
use serde::{Deserialize, Serialize};
use serde_json as json;
use subtle_encoding::base64;

use crate::error::Error;

const SEND_PACKET_EVENT: &str = "send_packet";

/// A committed transaction that sent an IBC packet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub height: u64,
    pub tx_hash: String,
    pub gas_spent: u64,
    pub packet: Packet,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub sequence: u64,
    pub source_port: String,
    pub source_channel: String,
    pub dest_port: String,
    pub dest_channel: String,
    pub data: Vec<u8>,

    /// `{revision}-{height}`, empty or `0-0` when not set.
    pub timeout_height: String,

    /// Nanoseconds since the unix epoch, zero when not set.
    pub timeout_timestamp: u64,
}

impl Tx {
    /**
       Check that the transaction was committed and sent a well formed
       packet. Every violation is reported, not only the first one.
    */
    pub fn validate(&self) -> Result<(), Error> {
        let mut reasons = Vec::new();

        if self.height == 0 {
            reasons.push("tx height cannot be 0".to_string());
        }

        if self.tx_hash.is_empty() {
            reasons.push("tx hash cannot be empty".to_string());
        }

        if self.gas_spent == 0 {
            reasons.push("tx gas spent cannot be 0".to_string());
        }

        reasons.extend(self.packet.violations());

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_tx(reasons))
        }
    }

    /**
       Build from the JSON encoded `TxResponse` returned by the chain
       CLI, reading the packet from the `send_packet` event. A response
       with a non zero code is a failed transaction.
    */
    pub fn from_tx_response(response: &json::Value) -> Result<Self, Error> {
        let tx_hash = response
            .get("txhash")
            .and_then(|hash| hash.as_str())
            .ok_or_else(|| Error::missing_field("txhash".to_string(), "tx response".to_string()))?
            .to_string();

        Self::check_response_code(response)?;

        let height = parse_u64(response.get("height")).unwrap_or(0);
        let gas_spent = parse_u64(response.get("gas_used")).unwrap_or(0);

        let attributes = find_event_attributes(response, SEND_PACKET_EVENT).unwrap_or_default();
        let attribute = |key: &str| {
            attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };

        let data = match attribute("packet_data_hex") {
            hex_data if !hex_data.is_empty() => {
                subtle_encoding::hex::decode(hex_data.as_bytes()).unwrap_or_default()
            }
            _ => attribute("packet_data").into_bytes(),
        };

        let packet = Packet {
            sequence: attribute("packet_sequence").parse().unwrap_or(0),
            source_port: attribute("packet_src_port"),
            source_channel: attribute("packet_src_channel"),
            dest_port: attribute("packet_dst_port"),
            dest_channel: attribute("packet_dst_channel"),
            data,
            timeout_height: attribute("packet_timeout_height"),
            timeout_timestamp: attribute("packet_timeout_timestamp").parse().unwrap_or(0),
        };

        Ok(Tx {
            height,
            tx_hash,
            gas_spent,
            packet,
        })
    }
}

impl Tx {
    /// A committed `TxResponse` with a non zero code failed in `DeliverTx`.
    pub fn check_response_code(response: &json::Value) -> Result<(), Error> {
        let code = parse_u64(response.get("code")).unwrap_or(0);

        if code == 0 {
            return Ok(());
        }

        let tx_hash = response
            .get("txhash")
            .and_then(|hash| hash.as_str())
            .unwrap_or_default()
            .to_string();

        let raw_log = response
            .get("raw_log")
            .and_then(|log| log.as_str())
            .unwrap_or_default()
            .to_string();

        Err(Error::tx_failed(tx_hash, code, raw_log))
    }
}

impl Packet {
    pub fn validate(&self) -> Result<(), Error> {
        let reasons = self.violations();

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_tx(reasons))
        }
    }

    pub fn has_timeout_height(&self) -> bool {
        !self.timeout_height.is_empty() && self.timeout_height != "0-0"
    }

    fn violations(&self) -> Vec<String> {
        let mut reasons = Vec::new();

        if self.sequence == 0 {
            reasons.push("packet sequence cannot be 0".to_string());
        }

        if let Err(e) = PortId::from_str(&self.source_port) {
            reasons.push(format!("invalid packet source port: {e}"));
        }

        if let Err(e) = ChannelId::from_str(&self.source_channel) {
            reasons.push(format!("invalid packet source channel: {e}"));
        }

        if let Err(e) = PortId::from_str(&self.dest_port) {
            reasons.push(format!("invalid packet destination port: {e}"));
        }

        if let Err(e) = ChannelId::from_str(&self.dest_channel) {
            reasons.push(format!("invalid packet destination channel: {e}"));
        }

        if !self.has_timeout_height() && self.timeout_timestamp == 0 {
            reasons.push("packet timeout height and timeout timestamp cannot both be 0".to_string());
        }

        if self.data.is_empty() {
            reasons.push("packet data bytes cannot be empty".to_string());
        }

        reasons
    }
}

/// Numbers in cosmos JSON are encoded as strings.
pub fn parse_u64(value: Option<&json::Value>) -> Option<u64> {
    match value? {
        json::Value::Number(n) => n.as_u64(),
        json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/**
   Collect the attributes of the first event of the given type. Events
   are looked up in the ABCI logs first, then in the top level events
   whose keys and values may be base64 encoded depending on the
   Tendermint version of the chain.
*/
pub fn find_event_attributes(
    response: &json::Value,
    event_type: &str,
) -> Option<Vec<(String, String)>> {
    let from_logs = response
        .get("logs")
        .and_then(|logs| logs.as_array())
        .into_iter()
        .flatten()
        .filter_map(|log| log.get("events").and_then(|events| events.as_array()))
        .flatten();

    let from_events = response
        .get("events")
        .and_then(|events| events.as_array())
        .into_iter()
        .flatten();

    let event = from_logs
        .chain(from_events)
        .find(|event| event.get("type").and_then(|t| t.as_str()) == Some(event_type))?;

    let attributes = event
        .get("attributes")
        .and_then(|attributes| attributes.as_array())?
        .iter()
        .filter_map(|attribute| {
            let key = attribute.get("key")?.as_str()?;
            let value = attribute
                .get("value")
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            Some(decode_attribute(key, value))
        })
        .collect();

    Some(attributes)
}

fn decode_attribute(key: &str, value: &str) -> (String, String) {
    if key.starts_with("packet_") || key.contains('_') {
        return (key.to_string(), value.to_string());
    }

    let decode = |s: &str| {
        base64::decode(s.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    };

    match decode(key) {
        Some(decoded_key) if decoded_key.is_ascii() => {
            (decoded_key, decode(value).unwrap_or_else(|| value.to_string()))
        }
        _ => (key.to_string(), value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorDetail;

    fn transfer_response() -> json::Value {
        json::json!({
            "height": "42",
            "txhash": "5F2A1C",
            "code": 0,
            "gas_used": "91274",
            "logs": [{
                "events": [{
                    "type": "send_packet",
                    "attributes": [
                        { "key": "packet_data", "value": "{\"amount\":\"1000000\",\"denom\":\"udym\"}" },
                        { "key": "packet_timeout_height", "value": "0-1042" },
                        { "key": "packet_timeout_timestamp", "value": "0" },
                        { "key": "packet_sequence", "value": "1" },
                        { "key": "packet_src_port", "value": "transfer" },
                        { "key": "packet_src_channel", "value": "channel-0" },
                        { "key": "packet_dst_port", "value": "transfer" },
                        { "key": "packet_dst_channel", "value": "channel-3" }
                    ]
                }]
            }]
        })
    }

    #[test_log::test]
    fn parses_send_packet_event() {
        let tx = Tx::from_tx_response(&transfer_response()).unwrap();

        assert_eq!(tx.height, 42);
        assert_eq!(tx.gas_spent, 91274);
        assert_eq!(tx.packet.sequence, 1);
        assert_eq!(tx.packet.source_channel, "channel-0");
        assert_eq!(tx.packet.dest_channel, "channel-3");
        assert_eq!(tx.packet.timeout_height, "0-1042");

        tx.validate().unwrap();
    }

    #[test_log::test]
    fn decodes_base64_event_attributes() {
        let response = json::json!({
            "height": "7",
            "txhash": "AB",
            "gas_used": "10",
            "events": [{
                "type": "send_packet",
                // "packet_sequence" => "4"
                "attributes": [{ "key": "cGFja2V0X3NlcXVlbmNl", "value": "NA==" }]
            }]
        });

        let attributes = find_event_attributes(&response, "send_packet").unwrap();
        assert_eq!(attributes, vec![("packet_sequence".to_string(), "4".to_string())]);
    }

    #[test_log::test]
    fn failed_response_is_an_error() {
        let mut response = transfer_response();
        response["code"] = json::json!(5);
        response["raw_log"] = json::json!("insufficient funds");

        let err = Tx::from_tx_response(&response).unwrap_err();

        match err.detail() {
            ErrorDetail::TxFailed(e) => {
                assert_eq!(e.code, 5);
                assert_eq!(e.raw_log, "insufficient funds");
            }
            e => panic!("unexpected error: {e:?}"),
        }
    }

    #[test_log::test]
    fn validation_collects_every_violation() {
        let tx = Tx {
            height: 0,
            tx_hash: String::new(),
            gas_spent: 0,
            packet: Packet {
                source_port: "transfer".to_string(),
                source_channel: "channel-0".to_string(),
                dest_port: "transfer".to_string(),
                dest_channel: "channel-1".to_string(),
                ..Default::default()
            },
        };

        let err = tx.validate().unwrap_err();

        match err.detail() {
            ErrorDetail::InvalidTx(e) => {
                assert_eq!(e.reasons.len(), 6);
                assert!(e.reasons[0].contains("height"));
                assert!(e.reasons.iter().any(|r| r.contains("timeout")));
            }
            e => panic!("unexpected error: {e:?}"),
        }
    }

    #[test_log::test]
    fn timeout_timestamp_alone_is_enough() {
        let mut tx = Tx::from_tx_response(&transfer_response()).unwrap();
        tx.packet.timeout_height = "0-0".to_string();
        tx.packet.timeout_timestamp = 1_700_000_000_000_000_000;

        tx.validate().unwrap();

        tx.packet.source_channel = "chan".to_string();
        assert!(tx.packet.validate().is_err());
    }
}
