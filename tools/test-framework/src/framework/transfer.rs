/*!
   The IBC transfer scenario: start two chains linked by a relayer,
   fund a user on each, transfer tokens from the first chain to the
   second, flush the relayer, and check the resulting balances and
   optionally the light client update relayed to the destination.

   Every step is fatal: the first error aborts the scenario.
*/

use alloc::sync::Arc;
use ibc_relayer_types::applications::transfer::amount::Amount;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::chain::docker::sanitize_name;
use crate::chain::handle::{DynChain, TransferOptions};
use crate::chain::poll::{poll_for_message, MsgUpdateClient};
use crate::chain::spec::ChainSpec;
use crate::chain::tx::Tx;
use crate::error::Error;
use crate::framework::backend::{BackendSetup, DockerBackend, InterchainBackend};
use crate::framework::base::{run_basic_test, BasicTest, TestOverrides};
use crate::ibc::denom::{get_prefixed_denom, Denom, DenomTrace};
use crate::interchain::{BuiltInterchain, Interchain, InterchainBuildOptions, InterchainLink};
use crate::relayer::factory::{BuiltinRelayerFactory, RelayerImpl};
use crate::relayer::handle::{select_channel, ChannelOutput, ChannelSelector, DynRelayer};
use crate::reporter::{create_log_file, timestamped_log_name, RelayerExecReporter, Reporter};
use crate::types::config::TestConfig;
use crate::types::env::write_env;
use crate::types::wallet::{Wallet, WalletAmount};
use crate::user::get_and_fund_test_users;
use crate::util::assert::{assert_eq, assert_not_empty};

pub const DEFAULT_FUND_AMOUNT: u64 = 10_000_000;
pub const DEFAULT_TRANSFER_AMOUNT: u64 = 1_000_000;
pub const DEFAULT_KEY_PREFIX: &str = "default";
pub const DEFAULT_RELAYER_NAME: &str = "relayer";

/// The first light client created on a chain.
pub const FIRST_CLIENT_ID: &str = "07-tendermint-0";

/// Blocks after the transfer height searched for the client update.
pub const DEFAULT_LIGHT_CLIENT_WINDOW: u64 = 10;

/**
   Look for a `MsgUpdateClient` on the destination chain within `window`
   blocks of its height before the transfer, and check the client it
   updates.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightClientCheck {
    pub expected_client_id: String,
    pub window: u64,
}

/// The configuration of one transfer scenario.
#[derive(Clone, Debug)]
pub struct TransferScenario {
    pub name: String,

    /// The chain the tokens are sent from.
    pub source: ChainSpec,

    pub destination: ChainSpec,

    pub relayer: BuiltinRelayerFactory,

    /// The name the relayer is registered under in the interchain.
    pub relayer_name: String,

    pub path: String,

    pub key_prefix: String,

    pub fund_amount: Amount,

    pub transfer_amount: Amount,

    /// Selects the source channel. The destination channel is always its counterparty.
    pub channel_selector: ChannelSelector,

    /// Expect the path to be created outside of the interchain build.
    pub skip_path_creation: bool,

    pub transfer_options: TransferOptions,

    pub light_client_check: Option<LightClientCheck>,
}

/// What a successful scenario observed.
#[derive(Clone, Debug)]
pub struct TransferReport {
    pub source_chain_id: String,
    pub destination_chain_id: String,
    pub source_channel: ChannelOutput,
    pub destination_channel: ChannelOutput,
    pub sender: Wallet,
    pub receiver: Wallet,
    pub tx: Tx,
    /// The denomination of the received vouchers, `ibc/<hash>`.
    pub ibc_denom: String,
    pub sender_balance: Amount,
    pub receiver_balance: Amount,
    pub update_client: Option<MsgUpdateClient>,
    pub log_file: PathBuf,
    pub env_file: PathBuf,
}

/// Runs a [`TransferScenario`] with the backend as a [`BasicTest`].
pub struct TransferTest<'a, Backend> {
    pub scenario: &'a TransferScenario,
    pub backend: Backend,
}

impl Default for LightClientCheck {
    fn default() -> Self {
        Self {
            expected_client_id: FIRST_CLIENT_ID.to_string(),
            window: DEFAULT_LIGHT_CLIENT_WINDOW,
        }
    }
}

impl TransferScenario {
    /// A scenario with the default amounts, relayer and path name.
    pub fn new(name: &str, source: ChainSpec, destination: ChainSpec) -> Self {
        let path = format!("{}-{}", source.name, destination.name);

        Self {
            name: name.to_string(),
            source,
            destination,
            path,
            relayer: BuiltinRelayerFactory::new(RelayerImpl::default()),
            relayer_name: DEFAULT_RELAYER_NAME.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            fund_amount: DEFAULT_FUND_AMOUNT.into(),
            transfer_amount: DEFAULT_TRANSFER_AMOUNT.into(),
            channel_selector: ChannelSelector::default(),
            skip_path_creation: false,
            transfer_options: TransferOptions::default(),
            light_client_check: None,
        }
    }

    pub fn with_relayer(mut self, relayer: BuiltinRelayerFactory) -> Self {
        self.relayer = relayer;
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn with_amounts(mut self, fund: impl Into<Amount>, transfer: impl Into<Amount>) -> Self {
        self.fund_amount = fund.into();
        self.transfer_amount = transfer.into();
        self
    }

    pub fn with_channel_selector(mut self, selector: ChannelSelector) -> Self {
        self.channel_selector = selector;
        self
    }

    pub fn with_skip_path_creation(mut self, skip: bool) -> Self {
        self.skip_path_creation = skip;
        self
    }

    pub fn with_light_client_check(mut self, check: LightClientCheck) -> Self {
        self.light_client_check = Some(check);
        self
    }
}

impl<'a, Backend: InterchainBackend> TestOverrides for TransferTest<'a, Backend> {}

impl<'a, Backend: InterchainBackend> BasicTest for TransferTest<'a, Backend> {
    fn run(&self, config: &TestConfig) -> Result<(), Error> {
        let report = run_transfer_scenario(config, &self.backend, self.scenario)?;

        info!(
            "transferred {} from {} to {}, received as {}",
            self.scenario.transfer_amount,
            report.source_chain_id,
            report.destination_chain_id,
            report.ibc_denom,
        );

        Ok(())
    }
}

/**
   Run the scenario against containers, bootstrapping the test with
   [`init_test`](crate::bootstrap::init::init_test).
*/
pub fn run_transfer_scenario_test(scenario: &TransferScenario) -> Result<(), Error> {
    run_basic_test(&TransferTest {
        scenario,
        backend: DockerBackend,
    })
}

/**
   Run the scenario with the chains and relayer of `backend`, recording
   the test and its relayer commands in a new log file of
   `config.log_dir`.
*/
pub fn run_transfer_scenario(
    config: &TestConfig,
    backend: &dyn InterchainBackend,
    scenario: &TransferScenario,
) -> Result<TransferReport, Error> {
    let (log, log_file) = create_log_file(&config.log_dir, &timestamped_log_name())?;
    let reporter = Arc::new(Reporter::new(log));

    info!(
        "running transfer scenario {} on the {} backend, logging to {}",
        scenario.name,
        backend.name(),
        log_file.display()
    );

    reporter.begin_test(&scenario.name)?;

    let exec_reporter = reporter.relayer_exec_reporter(&scenario.name);

    let result = backend
        .setup(
            config,
            &scenario.name,
            vec![scenario.source.clone(), scenario.destination.clone()],
            &scenario.relayer,
        )
        .and_then(|setup| {
            // The setup holds the docker network, keep it until the steps are done.
            run_steps(config, &setup, scenario, &exec_reporter, log_file)
                .map_err(config.hang_on_error())
        });

    reporter.finish_test(&scenario.name, &result)?;

    result
}

fn run_steps(
    config: &TestConfig,
    setup: &BackendSetup,
    scenario: &TransferScenario,
    reporter: &RelayerExecReporter,
    log_file: PathBuf,
) -> Result<TransferReport, Error> {
    let (src, dst) = match setup.chains.as_slice() {
        [src, dst] => (src.clone(), dst.clone()),
        chains => {
            return Err(Error::assertion(format!(
                "expected a source and a destination chain, got {} chains",
                chains.len()
            )))
        }
    };

    let src_id = src.config().chain_id.clone();
    let dst_id = dst.config().chain_id.clone();

    let interchain = Interchain::new()
        .add_chain(src.clone())?
        .add_chain(dst.clone())?
        .add_relayer(setup.relayer.clone(), &scenario.relayer_name)?
        .add_link(InterchainLink {
            chain1: src.clone(),
            chain2: dst.clone(),
            relayer: setup.relayer.clone(),
            path: scenario.path.clone(),
        })?;

    let built = interchain.build(
        reporter,
        InterchainBuildOptions {
            test_name: scenario.name.clone(),
            client: setup.client.clone(),
            network_id: setup.network_id(),
            skip_path_creation: scenario.skip_path_creation,
            pull_images: config.pull_images,
        },
    )?;

    let env_file = export_interchain_env(config, scenario, &built)?;

    info!("funding test users on {} and {}", src_id, dst_id);

    let chains = [src.clone(), dst.clone()];
    let users = get_and_fund_test_users(&scenario.key_prefix, scenario.fund_amount, &chains)?;

    for (chain, user) in chains.iter().zip(users.iter()) {
        let balance = chain.get_balance(user.address.as_str(), &chain.config().denom)?;

        assert_eq(
            &format!("funded balance of {} on {}", user.address, chain.config().chain_id),
            &balance,
            &scenario.fund_amount,
        )?;
    }

    let (sender, receiver) = match users.as_slice() {
        [sender, receiver] => (sender.clone(), receiver.clone()),
        _ => return Err(Error::assertion("expected one user per chain".to_string())),
    };

    let (src_channel, dst_channel) =
        discover_channels(&src_id, &dst_id, scenario, reporter, &setup.relayer)?;

    info!(
        "transferring over {}/{} on {} to {}/{} on {}",
        src_channel.port_id,
        src_channel.channel_id,
        src_id,
        dst_channel.port_id,
        dst_channel.channel_id,
        dst_id
    );

    let dst_height = dst.height()?;
    let src_denom = src.config().denom.clone();

    let initial_balance = src.get_balance(sender.address.as_str(), &src_denom)?;

    let tx = src.send_ibc_transfer(
        &src_channel.channel_id()?,
        &sender.key_name,
        &WalletAmount::new(
            receiver.address.clone(),
            Denom::base(&src_denom),
            scenario.transfer_amount,
        ),
        &scenario.transfer_options,
    )?;

    tx.validate()?;

    debug!("transfer committed at height {} as {}", tx.height, tx.tx_hash);

    setup
        .relayer
        .flush(reporter, &scenario.path, &src_channel.channel_id()?)?;

    let sender_balance = src.get_balance(sender.address.as_str(), &src_denom)?;

    let expected_sender_balance = initial_balance
        .checked_sub(scenario.transfer_amount)
        .ok_or_else(|| {
            Error::insufficient_funds(
                sender.address.to_string(),
                src_denom.clone(),
                initial_balance.to_string(),
                scenario.transfer_amount.to_string(),
            )
        })?;

    assert_eq(
        "sender balance after the transfer",
        &sender_balance,
        &expected_sender_balance,
    )?;

    let ibc_denom = DenomTrace::parse(&get_prefixed_denom(
        &dst_channel.port_id()?,
        &dst_channel.channel_id()?,
        &src_denom,
    ))
    .ibc_denom()?;

    let receiver_balance = dst.get_balance(receiver.address.as_str(), &ibc_denom)?;

    assert_eq(
        &format!("receiver balance of {ibc_denom}"),
        &receiver_balance,
        &scenario.transfer_amount,
    )?;

    let update_client = match &scenario.light_client_check {
        Some(check) => Some(check_light_client(&dst, dst_height, check)?),
        None => None,
    };

    built.stop(reporter)?;

    Ok(TransferReport {
        source_chain_id: src_id,
        destination_chain_id: dst_id,
        source_channel: src_channel,
        destination_channel: dst_channel,
        sender,
        receiver,
        tx,
        ibc_denom,
        sender_balance,
        receiver_balance,
        update_client,
        log_file,
        env_file,
    })
}

/**
   Select the source channel and look up its counterparty on the
   destination chain.
*/
fn discover_channels(
    src_id: &str,
    dst_id: &str,
    scenario: &TransferScenario,
    reporter: &RelayerExecReporter,
    relayer: &DynRelayer,
) -> Result<(ChannelOutput, ChannelOutput), Error> {
    let src_channels = relayer.get_channels(reporter, src_id)?;
    let src_channel = select_channel(src_id, &src_channels, &scenario.channel_selector)?;

    let dst_channels = relayer.get_channels(reporter, dst_id)?;
    let dst_channel = select_channel(
        dst_id,
        &dst_channels,
        &ChannelSelector::ById(src_channel.counterparty_channel_id()?),
    )?;

    Ok((src_channel, dst_channel))
}

/**
   The decoding registry is the one of the destination chain, so that
   its chain specific transactions within the window decode.
*/
fn check_light_client(
    dst: &DynChain,
    start_height: u64,
    check: &LightClientCheck,
) -> Result<MsgUpdateClient, Error> {
    let registry = &dst.config().encoding.interface_registry;

    let update = poll_for_message::<MsgUpdateClient>(
        dst.as_ref(),
        registry,
        start_height,
        start_height + check.window,
        None,
    )?;

    assert_eq(
        "client updated on the destination chain",
        &update.client_id,
        &check.expected_client_id,
    )?;

    assert_not_empty("signer of the client update", &update.signer)?;

    info!(
        "client {} on {} was updated by {}",
        update.client_id,
        dst.config().chain_id,
        update.signer
    );

    Ok(update)
}

fn export_interchain_env(
    config: &TestConfig,
    scenario: &TransferScenario,
    built: &BuiltInterchain,
) -> Result<PathBuf, Error> {
    fs::create_dir_all(&config.chain_store_dir)?;

    let env_file = config
        .chain_store_dir
        .join(format!("{}.env", sanitize_name(&scenario.name)));

    write_env(&env_file, built)?;

    info!("written interchain environment to {}", env_file.display());

    Ok(env_file)
}
