/*!
   Types for information about a chain wallet.
*/

use core::fmt::{self, Display};
use ibc_relayer_types::applications::transfer::amount::Amount;
use ibc_relayer_types::core::ics24_host::identifier::ChainId;
use serde::{Deserialize, Serialize};

use crate::ibc::denom::Denom;
use crate::types::env::{EnvWriter, ExportEnv};

/**
   Newtype wrapper for the bech32 address of a wallet.
*/
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalletAddress(pub String);

/**
   A wallet containing the key name in the chain keyring, the address,
   and the mnemonic that can be used to restore the key elsewhere,
   such as in a relayer keyring.
*/
#[derive(Debug, Clone)]
pub struct Wallet {
    /// The name of the key in the chain's test keyring.
    pub key_name: String,

    /// The bech32 address of the wallet.
    pub address: WalletAddress,

    /// The BIP-39 mnemonic of the key.
    pub mnemonic: String,

    /// The chain the wallet belongs to.
    pub chain_id: ChainId,
}

/**
   A token amount addressed to a wallet. Used both for funding
   wallets and as the payload of IBC transfers.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAmount {
    pub address: WalletAddress,
    pub denom: Denom,
    pub amount: Amount,
}

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Wallet {
    pub fn new(key_name: String, address: String, mnemonic: String, chain_id: ChainId) -> Self {
        Self {
            key_name,
            address: WalletAddress(address),
            mnemonic,
            chain_id,
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn formatted_address(&self) -> &WalletAddress {
        &self.address
    }
}

impl WalletAmount {
    pub fn new(address: WalletAddress, denom: Denom, amount: impl Into<Amount>) -> Self {
        Self {
            address,
            denom,
            amount: amount.into(),
        }
    }
}

impl Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0)
    }
}

impl Display for WalletAmount {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}{} to {}", self.amount, self.denom, self.address)
    }
}

impl ExportEnv for Wallet {
    fn export_env(&self, writer: &mut impl EnvWriter) {
        writer.write_env("KEY_NAME", &self.key_name);
        writer.write_env("ADDRESS", &self.address.0);
    }
}
