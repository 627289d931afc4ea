/*!
   The type registry used to decode transactions queried from a chain.

   Transactions returned by the cosmos-sdk CLI embed `Any` values tagged
   with a `@type` URL: messages, public keys, accounts and light client
   headers. A transaction can only be decoded if every one of these type
   URLs has a concrete implementation registered for its interface.

   Chains built on ethermint sign with their own key type, so their
   transactions can only be decoded after
   [`register_ethermint_interfaces`] has been called on the registry of
   that chain's [`EncodingConfig`]. Each chain configuration owns its
   registry; there is no process wide state.
*/

use std::collections::{BTreeMap, BTreeSet};

use serde_json as json;

use crate::error::Error;

pub const TX_INTERFACE: &str = "cosmos.tx.v1beta1.Tx";
pub const MSG_INTERFACE: &str = "cosmos.base.v1beta1.Msg";
pub const PUBKEY_INTERFACE: &str = "cosmos.crypto.PubKey";
pub const ACCOUNT_INTERFACE: &str = "cosmos.auth.v1beta1.AccountI";
pub const CLIENT_MESSAGE_INTERFACE: &str = "ibc.core.client.v1.ClientMessage";
pub const CLIENT_STATE_INTERFACE: &str = "ibc.core.exported.v1.ClientState";
pub const CONSENSUS_STATE_INTERFACE: &str = "ibc.core.exported.v1.ConsensusState";
pub const TX_EXTENSION_INTERFACE: &str = "cosmos.tx.v1beta1.TxExtensionOptionI";

const TYPE_URL_FIELD: &str = "@type";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterfaceRegistry {
    interfaces: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodingConfig {
    pub interface_registry: InterfaceRegistry,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register concrete type URLs as implementations of an interface.
    pub fn register_implementations(&mut self, interface: &str, type_urls: &[&str]) {
        let implementations = self.interfaces.entry(interface.to_string()).or_default();

        for type_url in type_urls {
            implementations.insert(normalize_type_url(type_url));
        }
    }

    pub fn is_registered(&self, type_url: &str) -> bool {
        let type_url = normalize_type_url(type_url);

        self.interfaces
            .values()
            .any(|implementations| implementations.contains(&type_url))
    }

    pub fn list_implementations(&self, interface: &str) -> Vec<String> {
        self.interfaces
            .get(interface)
            .map(|implementations| implementations.iter().cloned().collect())
            .unwrap_or_default()
    }

    /**
       Walk a JSON encoded value and fail on the first `@type` URL that
       has no registered implementation.
    */
    pub fn ensure_decodable(&self, value: &json::Value) -> Result<(), Error> {
        match value {
            json::Value::Object(fields) => {
                if let Some(type_url) = fields.get(TYPE_URL_FIELD).and_then(|t| t.as_str()) {
                    if !self.is_registered(type_url) {
                        return Err(Error::unregistered_type(type_url.to_string()));
                    }
                }

                for field in fields.values() {
                    self.ensure_decodable(field)?;
                }

                Ok(())
            }
            json::Value::Array(items) => {
                for item in items {
                    self.ensure_decodable(item)?;
                }

                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn normalize_type_url(type_url: &str) -> String {
    if type_url.starts_with('/') {
        type_url.to_string()
    } else {
        format!("/{type_url}")
    }
}

/**
   The cosmos-sdk and ibc-go types found in the transactions of a chain
   relaying token transfers.
*/
pub fn register_cosmos_interfaces(registry: &mut InterfaceRegistry) {
    registry.register_implementations(TX_INTERFACE, &["/cosmos.tx.v1beta1.Tx"]);

    registry.register_implementations(
        PUBKEY_INTERFACE,
        &[
            "/cosmos.crypto.secp256k1.PubKey",
            "/cosmos.crypto.ed25519.PubKey",
            "/cosmos.crypto.multisig.LegacyAminoPubKey",
        ],
    );

    registry.register_implementations(
        ACCOUNT_INTERFACE,
        &[
            "/cosmos.auth.v1beta1.BaseAccount",
            "/cosmos.auth.v1beta1.ModuleAccount",
            "/cosmos.vesting.v1beta1.ContinuousVestingAccount",
            "/cosmos.vesting.v1beta1.DelayedVestingAccount",
        ],
    );

    registry.register_implementations(
        MSG_INTERFACE,
        &[
            "/cosmos.bank.v1beta1.MsgSend",
            "/cosmos.bank.v1beta1.MsgMultiSend",
            "/cosmos.staking.v1beta1.MsgCreateValidator",
            "/cosmos.staking.v1beta1.MsgDelegate",
            "/cosmos.gov.v1beta1.MsgSubmitProposal",
            "/cosmos.gov.v1beta1.MsgVote",
            "/ibc.applications.transfer.v1.MsgTransfer",
            "/ibc.core.client.v1.MsgCreateClient",
            "/ibc.core.client.v1.MsgUpdateClient",
            "/ibc.core.connection.v1.MsgConnectionOpenInit",
            "/ibc.core.connection.v1.MsgConnectionOpenTry",
            "/ibc.core.connection.v1.MsgConnectionOpenAck",
            "/ibc.core.connection.v1.MsgConnectionOpenConfirm",
            "/ibc.core.channel.v1.MsgChannelOpenInit",
            "/ibc.core.channel.v1.MsgChannelOpenTry",
            "/ibc.core.channel.v1.MsgChannelOpenAck",
            "/ibc.core.channel.v1.MsgChannelOpenConfirm",
            "/ibc.core.channel.v1.MsgRecvPacket",
            "/ibc.core.channel.v1.MsgAcknowledgement",
            "/ibc.core.channel.v1.MsgTimeout",
        ],
    );

    registry.register_implementations(
        CLIENT_MESSAGE_INTERFACE,
        &[
            "/ibc.lightclients.tendermint.v1.Header",
            "/ibc.lightclients.tendermint.v1.Misbehaviour",
        ],
    );

    registry.register_implementations(
        CLIENT_STATE_INTERFACE,
        &["/ibc.lightclients.tendermint.v1.ClientState"],
    );

    registry.register_implementations(
        CONSENSUS_STATE_INTERFACE,
        &["/ibc.lightclients.tendermint.v1.ConsensusState"],
    );
}

/// Account, key and message types of ethermint based chains.
pub fn register_ethermint_interfaces(registry: &mut InterfaceRegistry) {
    registry.register_implementations(
        PUBKEY_INTERFACE,
        &["/ethermint.crypto.v1.ethsecp256k1.PubKey"],
    );

    registry.register_implementations(ACCOUNT_INTERFACE, &["/ethermint.types.v1.EthAccount"]);

    registry.register_implementations(MSG_INTERFACE, &["/ethermint.evm.v1.MsgEthereumTx"]);

    registry.register_implementations(
        TX_EXTENSION_INTERFACE,
        &[
            "/ethermint.types.v1.ExtensionOptionsWeb3Tx",
            "/ethermint.types.v1.ExtensionOptionDynamicFeeTx",
        ],
    );
}

pub fn default_encoding() -> EncodingConfig {
    let mut interface_registry = InterfaceRegistry::new();
    register_cosmos_interfaces(&mut interface_registry);

    EncodingConfig { interface_registry }
}

/// The encoding of chains running the EVM module, such as dymension.
pub fn evm_encoding() -> EncodingConfig {
    let mut encoding = default_encoding();
    register_ethermint_interfaces(&mut encoding.interface_registry);

    encoding
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorDetail;

    fn ethermint_tx() -> json::Value {
        json::json!({
            "height": "12",
            "tx": {
                "@type": "/cosmos.tx.v1beta1.Tx",
                "body": {
                    "messages": [{
                        "@type": "/ibc.applications.transfer.v1.MsgTransfer",
                        "source_port": "transfer",
                    }]
                },
                "auth_info": {
                    "signer_infos": [{
                        "public_key": {
                            "@type": "/ethermint.crypto.v1.ethsecp256k1.PubKey",
                            "key": "A1b2"
                        }
                    }]
                }
            }
        })
    }

    #[test_log::test]
    fn default_encoding_rejects_ethermint_keys() {
        let registry = default_encoding().interface_registry;

        let err = registry.ensure_decodable(&ethermint_tx()).unwrap_err();

        match err.detail() {
            ErrorDetail::UnregisteredType(e) => {
                assert_eq!(e.type_url, "/ethermint.crypto.v1.ethsecp256k1.PubKey")
            }
            e => panic!("unexpected error: {e:?}"),
        }
    }

    #[test_log::test]
    fn evm_encoding_accepts_ethermint_keys() {
        let registry = evm_encoding().interface_registry;

        registry.ensure_decodable(&ethermint_tx()).unwrap();
        assert!(registry.is_registered("ethermint.types.v1.EthAccount"));
        assert!(registry
            .list_implementations(PUBKEY_INTERFACE)
            .contains(&"/cosmos.crypto.secp256k1.PubKey".to_string()));
    }

    #[test_log::test]
    fn registries_are_independent() {
        let mut first = default_encoding();
        let second = default_encoding();

        register_ethermint_interfaces(&mut first.interface_registry);

        assert_ne!(first, second);
        assert!(!second
            .interface_registry
            .is_registered("/ethermint.crypto.v1.ethsecp256k1.PubKey"));
    }
}
