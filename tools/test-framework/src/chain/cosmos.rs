/*!
   A Cosmos SDK chain run as a single validator node in a container.
*/

use alloc::sync::Arc;
use ibc_relayer_types::applications::transfer::amount::Amount;
use ibc_relayer_types::core::ics24_host::identifier::ChannelId;
use serde_json as json;
use std::sync::RwLock;
use tracing::{debug, info};

use crate::chain::cli::keys::{add_key, show_address};
use crate::chain::cli::query::{query_status_height, query_tx, query_txs_at_height};
use crate::chain::cli::transfer::{bank_send, gas_args, ibc_transfer};
use crate::chain::config::{
    allow_cors, enable_api, replace_stake_denom, set_genesis_value, set_grpc_port,
    set_minimum_gas_price, set_rpc_port, set_timeout_commit, GRPC_PORT, RPC_PORT,
};
use crate::chain::docker::{sanitize_name, ContainerOptions, DockerVolume};
use crate::chain::driver::ChainDriver;
use crate::chain::handle::{
    ChainHandle, ChainInitOptions, TransferOptions, FAUCET_ACCOUNT_KEY_NAME,
};
use crate::chain::spec::ChainConfig;
use crate::chain::tx::Tx;
use crate::error::Error;
use crate::types::config::TestConfig;
use crate::types::env::{EnvWriter, ExportEnv};
use crate::types::wallet::{Wallet, WalletAmount};
use crate::util::retry::assert_eventually_succeed;

const VALIDATOR_KEY_NAME: &str = "validator";
const NODE_HOME_ROOT: &str = "/var/cosmos-chain";
const TIMEOUT_COMMIT: &str = "1s";

pub struct CosmosChain {
    config: ChainConfig,
    test_config: TestConfig,
    num_validators: usize,
    num_full_nodes: usize,
    node: RwLock<Option<ChainNode>>,
}

/// The resources of a running node. The container goes before the volume.
struct ChainNode {
    driver: ChainDriver,
    _volume: DockerVolume,
}

impl CosmosChain {
    pub fn new(
        config: ChainConfig,
        test_config: TestConfig,
        num_validators: usize,
        num_full_nodes: usize,
    ) -> Self {
        Self {
            config,
            test_config,
            num_validators,
            num_full_nodes,
            node: RwLock::new(None),
        }
    }

    pub fn home_path(&self) -> String {
        format!("{}/{}", NODE_HOME_ROOT, self.config.name)
    }

    fn driver(&self) -> Result<ChainDriver, Error> {
        let node = self
            .node
            .read()
            .map_err(|_| Error::generic(eyre::eyre!("poisoned chain node lock")))?;

        node.as_ref()
            .map(|node| node.driver.clone())
            .ok_or_else(|| Error::chain_not_started(self.config.chain_id.clone()))
    }

    fn gas_args(&self) -> Vec<String> {
        gas_args(&self.config.gas_prices, self.config.gas_adjustment)
    }

    /**
       Run a genesis subcommand, falling back to the top level command
       used before cosmos-sdk v0.47 moved them under `genesis`.
    */
    fn exec_genesis_command(&self, driver: &ChainDriver, args: &[&str]) -> Result<(), Error> {
        let mut genesis_args = vec!["genesis"];
        genesis_args.extend_from_slice(args);

        if driver.exec(&genesis_args).is_err() {
            driver.exec(args)?;
        }

        Ok(())
    }

    fn add_genesis_account(
        &self,
        driver: &ChainDriver,
        address: &str,
        coins: &str,
    ) -> Result<(), Error> {
        debug!("adding genesis account {} with {}", address, coins);

        self.exec_genesis_command(
            driver,
            &["add-genesis-account", address, coins, "--keyring-backend", "test"],
        )
    }

    fn modify_genesis(&self, driver: &ChainDriver) -> Result<(), Error> {
        let genesis_file = "config/genesis.json";

        let mut genesis: json::Value = json::from_str(&driver.read_file(genesis_file)?)?;

        replace_stake_denom(&mut genesis, &self.config.denom);

        for kv in self.config.modify_genesis.iter() {
            set_genesis_value(&mut genesis, &kv.key, kv.value.clone())?;
        }

        let content = json::to_string_pretty(&genesis)?;
        driver.write_file(genesis_file, &content)
    }

    fn modify_node_config(&self, driver: &ChainDriver) -> Result<(), Error> {
        driver.update_chain_config("config/config.toml", |config| {
            set_rpc_port(config, RPC_PORT)?;
            set_timeout_commit(config, TIMEOUT_COMMIT)?;
            allow_cors(config)?;

            Ok(())
        })?;

        driver.update_chain_config("config/app.toml", |config| {
            set_grpc_port(config, GRPC_PORT)?;
            set_minimum_gas_price(config, &self.config.gas_prices)?;
            enable_api(config)?;

            Ok(())
        })
    }

    /// Wait until the transaction is committed and return its response.
    fn wait_for_tx(&self, driver: &ChainDriver, tx_hash: &str) -> Result<json::Value, Error> {
        assert_eventually_succeed(
            &format!("transaction {tx_hash} committed on {}", self.config.chain_id),
            self.test_config.block_wait_attempts,
            self.test_config.block_wait_interval(),
            || query_tx(driver, tx_hash),
        )
    }
}

impl ChainHandle for CosmosChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn initialize(&self, options: &ChainInitOptions) -> Result<(), Error> {
        if self.num_validators != 1 || self.num_full_nodes != 0 {
            return Err(Error::generic(eyre::eyre!(
                "chain {} requests {} validators and {} full nodes, only a single validator node is supported",
                self.config.chain_id,
                self.num_validators,
                self.num_full_nodes
            )));
        }

        let client = options
            .client
            .as_ref()
            .ok_or_else(|| Error::missing_network(self.config.chain_id.clone()))?;

        let network_id = options
            .network_id
            .as_ref()
            .ok_or_else(|| Error::missing_network(self.config.chain_id.clone()))?;

        let image = self.config.image()?;

        if options.pull_images {
            info!("pulling image {}", image);
            client.pull_image(image)?;
        }

        let name = format!(
            "{}-val-0-{}",
            sanitize_name(&self.config.chain_id),
            sanitize_name(&options.test_name)
        );

        let home_path = self.home_path();

        let volume = client.create_volume(&name)?;
        client.set_volume_owner(&volume, image, &home_path)?;

        let container = client.run_container(&ContainerOptions {
            name: name.clone(),
            image: image.reference(),
            network_id: Some(network_id.clone()),
            user: image.uid_gid.clone(),
            binds: vec![(volume.name.clone(), home_path.clone())],
            entrypoint: Some("sh".to_string()),
            cmd: vec!["-c".to_string(), "sleep infinity".to_string()],
            ..Default::default()
        })?;

        let driver = ChainDriver::new(
            self.config.chain_type,
            self.config.bin.clone(),
            self.chain_id(),
            home_path,
            self.config.bech32_prefix.clone(),
            self.test_config.chain_store_dir.join(&name),
            self.test_config.block_wait_attempts,
            self.test_config.block_wait_interval(),
            Arc::new(container),
        );

        info!(
            "initialized chain {} in container {}",
            self.config.chain_id, name
        );

        let mut node = self
            .node
            .write()
            .map_err(|_| Error::generic(eyre::eyre!("poisoned chain node lock")))?;

        *node = Some(ChainNode {
            driver,
            _volume: volume,
        });

        Ok(())
    }

    fn start(&self, test_name: &str, genesis_wallets: &[WalletAmount]) -> Result<(), Error> {
        let driver = self.driver()?;
        let chain_id = self.config.chain_id.clone();
        let denom = &self.config.denom;
        let amounts = &self.config.genesis_amounts;

        info!("starting chain {} for test {}", chain_id, test_name);

        driver.exec(&["init", &sanitize_name(test_name), "--chain-id", &chain_id])?;

        let validator = add_key(&driver, VALIDATOR_KEY_NAME)?;
        self.add_genesis_account(
            &driver,
            &validator.address,
            &format!("{}{}", amounts.genesis, denom),
        )?;

        self.exec_genesis_command(
            &driver,
            &[
                "gentx",
                VALIDATOR_KEY_NAME,
                &format!("{}{}", amounts.staking, denom),
                "--chain-id",
                &chain_id,
                "--keyring-backend",
                "test",
            ],
        )?;

        let faucet = add_key(&driver, FAUCET_ACCOUNT_KEY_NAME)?;
        self.add_genesis_account(
            &driver,
            &faucet.address,
            &format!("{}{}", amounts.genesis, denom),
        )?;

        for wallet in genesis_wallets {
            self.add_genesis_account(
                &driver,
                wallet.address.as_str(),
                &format!("{}{}", wallet.amount, wallet.denom),
            )?;
        }

        self.exec_genesis_command(&driver, &["collect-gentxs"])?;

        self.modify_genesis(&driver)?;
        self.modify_node_config(&driver)?;

        let start_command = format!(
            "{} start --home {} {} > {}/node.log 2>&1",
            self.config.bin,
            driver.home_path,
            self.config.chain_type.extra_start_args().join(" "),
            driver.home_path,
        );

        driver
            .container()
            .exec_detached(&["sh", "-c", &start_command])?;

        assert_eventually_succeed(
            &format!("chain {chain_id} producing blocks"),
            self.test_config.block_wait_attempts,
            self.test_config.block_wait_interval(),
            || {
                let height = query_status_height(&driver)?;
                if height >= 2 {
                    Ok(())
                } else {
                    Err(Error::assertion(format!(
                        "chain {chain_id} is at height {height}"
                    )))
                }
            },
        )?;

        info!("chain {} is producing blocks", chain_id);

        Ok(())
    }

    fn height(&self) -> Result<u64, Error> {
        query_status_height(&self.driver()?)
    }

    fn wait_for_blocks(&self, delta: u64) -> Result<u64, Error> {
        let driver = self.driver()?;
        let target = query_status_height(&driver)? + delta;

        assert_eventually_succeed(
            &format!("chain {} reach height {}", self.config.chain_id, target),
            self.test_config.block_wait_attempts,
            self.test_config.block_wait_interval(),
            || {
                let height = query_status_height(&driver)?;
                if height >= target {
                    Ok(height)
                } else {
                    Err(Error::assertion(format!(
                        "height {height} is below target {target}"
                    )))
                }
            },
        )
    }

    fn get_balance(&self, address: &str, denom: &str) -> Result<Amount, Error> {
        self.driver()?.query_balance(address, denom)
    }

    fn create_wallet(&self, key_name: &str) -> Result<Wallet, Error> {
        let driver = self.driver()?;
        let key = add_key(&driver, key_name)?;

        debug!(
            "created key {} with address {} on {}",
            key_name, key.address, self.config.chain_id
        );

        Ok(Wallet::new(
            key_name.to_string(),
            key.address,
            key.mnemonic,
            self.chain_id(),
        ))
    }

    fn send_funds(&self, key_name: &str, amount: &WalletAmount) -> Result<(), Error> {
        let driver = self.driver()?;
        let sender = show_address(&driver, key_name)?;

        let tx_hash = bank_send(
            &driver,
            &sender,
            amount.address.as_str(),
            &format!("{}{}", amount.amount, amount.denom),
            &self.gas_args(),
        )?;

        let response = self.wait_for_tx(&driver, &tx_hash)?;
        Tx::check_response_code(&response)?;

        Ok(())
    }

    fn send_ibc_transfer(
        &self,
        channel_id: &ChannelId,
        key_name: &str,
        amount: &WalletAmount,
        options: &TransferOptions,
    ) -> Result<Tx, Error> {
        let driver = self.driver()?;

        info!(
            "sending IBC transfer of {} over {} from key {}",
            amount, channel_id, key_name
        );

        let tx_hash = ibc_transfer(
            &driver,
            key_name,
            "transfer",
            channel_id.as_str(),
            amount.address.as_str(),
            &format!("{}{}", amount.amount, amount.denom),
            options,
            &self.gas_args(),
        )?;

        let response = self.wait_for_tx(&driver, &tx_hash)?;

        Tx::from_tx_response(&response)
    }

    fn query_txs_at_height(&self, height: u64) -> Result<Vec<json::Value>, Error> {
        query_txs_at_height(&self.driver()?, height)
    }

    fn rpc_address(&self) -> String {
        self.driver()
            .map(|driver| driver.rpc_address())
            .unwrap_or_default()
    }

    fn grpc_address(&self) -> String {
        self.driver()
            .map(|driver| driver.grpc_address())
            .unwrap_or_default()
    }

    fn stop(&self) -> Result<(), Error> {
        let mut node = self
            .node
            .write()
            .map_err(|_| Error::generic(eyre::eyre!("poisoned chain node lock")))?;

        if node.take().is_some() {
            info!("stopped chain {}", self.config.chain_id);
        }

        Ok(())
    }
}

impl ExportEnv for CosmosChain {
    fn export_env(&self, writer: &mut impl EnvWriter) {
        writer.write_env("CHAIN_ID", &self.config.chain_id);
        writer.write_env("DENOM", &self.config.denom);

        if let Ok(driver) = self.driver() {
            driver.export_env(writer);
        }
    }
}
