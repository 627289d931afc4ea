use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::chain::encoding::{default_encoding, evm_encoding, EncodingConfig};
use crate::error::Error;

const COSMOS_HD_PATH: &str = "m/44'/118'/0'/0/0";
const ETHERMINT_HD_PATH: &str = "m/44'/60'/0'/0/0";

const COSMOS_PK_TYPE: &str = "/cosmos.crypto.secp256k1.PubKey";
const ETHERMINT_PK_TYPE: &str = "/ethermint.crypto.v1.ethsecp256k1.PubKey";

/**
   The family of a chain, which decides the key derivation, the key
   algorithm and the encoding of its transactions.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    #[default]
    Cosmos,
    Ethermint,
}

impl ChainType {
    pub fn hd_path(&self) -> &str {
        match self {
            Self::Cosmos => COSMOS_HD_PATH,
            Self::Ethermint => ETHERMINT_HD_PATH,
        }
    }

    pub fn coin_type(&self) -> u32 {
        match self {
            Self::Cosmos => 118,
            Self::Ethermint => 60,
        }
    }

    /// Public key type URL of the accounts created on the chain.
    pub fn pk_type(&self) -> &str {
        match self {
            Self::Cosmos => COSMOS_PK_TYPE,
            Self::Ethermint => ETHERMINT_PK_TYPE,
        }
    }

    // Extra arguments required to run `<chain binary> keys add`
    pub fn extra_keys_add_args(&self) -> Vec<String> {
        match self {
            Self::Cosmos => vec![],
            Self::Ethermint => vec!["--algo".to_owned(), "eth_secp256k1".to_owned()],
        }
    }

    // Extra arguments required to run `<chain binary> start`
    pub fn extra_start_args(&self) -> Vec<String> {
        match self {
            Self::Cosmos => vec![],
            Self::Ethermint => vec![
                "--json-rpc.address".to_owned(),
                "0.0.0.0:8545".to_owned(),
            ],
        }
    }

    pub fn default_encoding(&self) -> EncodingConfig {
        match self {
            Self::Cosmos => default_encoding(),
            Self::Ethermint => evm_encoding(),
        }
    }
}

impl FromStr for ChainType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            name if name.contains("dymd") || name.contains("evmosd") => Ok(ChainType::Ethermint),
            "ethermint" => Ok(ChainType::Ethermint),
            _ => Ok(ChainType::Cosmos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn detects_chain_type_from_binary() {
        assert_eq!(ChainType::from_str("dymd").unwrap(), ChainType::Ethermint);
        assert_eq!(ChainType::from_str("osmosisd").unwrap(), ChainType::Cosmos);
        assert_eq!(ChainType::from_str("gaiad").unwrap(), ChainType::Cosmos);
    }

    #[test_log::test]
    fn ethermint_chains_use_evm_keys() {
        let chain_type = ChainType::Ethermint;

        assert_eq!(chain_type.coin_type(), 60);
        assert_eq!(chain_type.hd_path(), "m/44'/60'/0'/0/0");
        assert!(chain_type
            .default_encoding()
            .interface_registry
            .is_registered(chain_type.pk_type()));

        assert!(!ChainType::Cosmos
            .default_encoding()
            .interface_registry
            .is_registered(chain_type.pk_type()));
    }
}
