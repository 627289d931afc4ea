/*!
   The interface through which tests interact with a running chain.
*/

use alloc::sync::Arc;
use ibc_relayer_types::applications::transfer::amount::Amount;
use ibc_relayer_types::core::ics24_host::identifier::{ChainId, ChannelId};
use serde_json as json;

use crate::chain::docker::DockerClient;
use crate::chain::spec::ChainConfig;
use crate::chain::tx::Tx;
use crate::error::Error;
use crate::types::wallet::{Wallet, WalletAmount};

/// The key holding the funds used to create test users.
pub const FAUCET_ACCOUNT_KEY_NAME: &str = "faucet";

pub type DynChain = Arc<dyn ChainHandle>;

/// Timeout of an IBC transfer, in destination block height or time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IbcTimeout {
    pub height: Option<u64>,
    pub nano_seconds: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Use the chain CLI default timeout when not set.
    pub timeout: Option<IbcTimeout>,
    pub memo: Option<String>,
}

/// Resources shared by all chains of a test.
#[derive(Clone, Debug, Default)]
pub struct ChainInitOptions {
    pub test_name: String,
    pub client: Option<DockerClient>,
    pub network_id: Option<String>,
    pub pull_images: bool,
}

/**
   A running chain, as seen by a test.

   All operations block until the chain has acknowledged them. Methods
   that submit transactions return once the transaction is committed
   in a block.
*/
pub trait ChainHandle: Send + Sync {
    fn config(&self) -> &ChainConfig;

    fn chain_id(&self) -> ChainId {
        ChainId::from_string(&self.config().chain_id)
    }

    /// Prepare the resources of the chain before it is started.
    fn initialize(&self, options: &ChainInitOptions) -> Result<(), Error>;

    /**
       Create the genesis of the chain with the given extra wallets
       funded, and start producing blocks.
    */
    fn start(&self, test_name: &str, genesis_wallets: &[WalletAmount]) -> Result<(), Error>;

    fn height(&self) -> Result<u64, Error>;

    /// Wait until `delta` more blocks are produced and return the new height.
    fn wait_for_blocks(&self, delta: u64) -> Result<u64, Error>;

    fn get_balance(&self, address: &str, denom: &str) -> Result<Amount, Error>;

    /// Create a new key in the chain keyring.
    fn create_wallet(&self, key_name: &str) -> Result<Wallet, Error>;

    /// Send native tokens from the key `key_name` to `amount.address`.
    fn send_funds(&self, key_name: &str, amount: &WalletAmount) -> Result<(), Error>;

    fn send_ibc_transfer(
        &self,
        channel_id: &ChannelId,
        key_name: &str,
        amount: &WalletAmount,
        options: &TransferOptions,
    ) -> Result<Tx, Error>;

    /// The JSON encoded `TxResponse`s of the transactions in a block.
    fn query_txs_at_height(&self, height: u64) -> Result<Vec<json::Value>, Error>;

    fn rpc_address(&self) -> String;

    fn grpc_address(&self) -> String;

    fn stop(&self) -> Result<(), Error>;
}
