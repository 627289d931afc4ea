/*!
   Re-export of common constructs that are used by test cases.
*/

pub use core::time::Duration;
pub use eyre::eyre;
pub use ibc_relayer_types::applications::transfer::amount::Amount;
pub use ibc_relayer_types::core::ics24_host::identifier::{ChannelId, PortId};
pub use std::thread::sleep;
pub use tracing::{debug, error, info, warn};

pub use crate::bootstrap::init::init_test;
pub use crate::chain::builtin::{builtin_chain_config, dymension, gaia, osmosis};
pub use crate::chain::handle::{ChainHandle, DynChain, TransferOptions};
pub use crate::chain::poll::{poll_for_message, MsgUpdateClient};
pub use crate::chain::spec::{ChainConfig, ChainSpec, GenesisAmounts};
pub use crate::error::{handle_generic_error, Error, ErrorDetail};
pub use crate::framework::backend::{DockerBackend, InterchainBackend, MockBackend};
pub use crate::framework::base::{run_basic_test, BasicTest, TestOverrides};
pub use crate::framework::transfer::{
    run_transfer_scenario, run_transfer_scenario_test, LightClientCheck, TransferReport,
    TransferScenario,
};
pub use crate::framework::variants;
pub use crate::ibc::denom::{derive_ibc_denom, get_prefixed_denom, Denom, DenomTrace};
pub use crate::interchain::{Interchain, InterchainBuildOptions, InterchainLink};
pub use crate::relayer::factory::{BuiltinRelayerFactory, RelayerImpl, RelayerOption};
pub use crate::relayer::handle::{ChannelSelector, DynRelayer, RelayerHandle};
pub use crate::reporter::RelayerExecReporter;
pub use crate::types::config::TestConfig;
pub use crate::types::wallet::{Wallet, WalletAddress, WalletAmount};
pub use crate::user::get_and_fund_test_users;
pub use crate::util::assert::*;
pub use crate::util::suspend::suspend;
