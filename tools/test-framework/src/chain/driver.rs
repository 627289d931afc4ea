/*!
   Implementation of [`ChainDriver`].
*/

use alloc::sync::Arc;
use core::time::Duration;
use ibc_relayer_types::applications::transfer::amount::Amount;
use ibc_relayer_types::core::ics24_host::identifier::ChainId;
use std::fs;
use std::path::PathBuf;

use crate::chain::chain_type::ChainType;
use crate::chain::cli::query::query_balance;
use crate::chain::config::{GRPC_PORT, P2P_PORT, RPC_PORT};
use crate::chain::docker::Container;
use crate::chain::exec::ExecOutput;
use crate::error::Error;
use crate::types::env::{EnvWriter, ExportEnv};
use crate::util::retry::assert_eventually_succeed;

/**
    A driver for interacting with a chain full node through the chain
    command line, executed inside the container running the node.

    The name `ChainDriver` is inspired by
    [WebDriver](https://developer.mozilla.org/en-US/docs/Web/WebDriver),
    which is the term used to describe programs that control spawning of the
    web browsers. In our case, the ChainDriver is used to spawn and manage
    chain full nodes.
*/
#[derive(Debug, Clone)]
pub struct ChainDriver {
    pub chain_type: ChainType,

    /**
       The chain CLI inside the container, e.g. `dymd`.
    */
    pub command_path: String,

    /**
       The ID of the chain.
    */
    pub chain_id: ChainId,

    /**
       The home directory of the node inside the container.
    */
    pub home_path: String,

    pub account_prefix: String,

    /**
       The hostname of the node on the test network.
    */
    pub hostname: String,

    /**
       A directory on the host used to stage files copied into the
       container.
    */
    pub host_dir: PathBuf,

    pub wait_attempts: u16,

    pub wait_interval: Duration,

    container: Arc<Container>,
}

impl ExportEnv for ChainDriver {
    fn export_env(&self, writer: &mut impl EnvWriter) {
        writer.write_env("CMD", &self.command_path);
        writer.write_env("HOME", &self.home_path);
        writer.write_env("CONTAINER", &self.container.name);
        writer.write_env("RPC_ADDR", &self.rpc_address());
        writer.write_env("GRPC_ADDR", &self.grpc_address());
    }
}

impl ChainDriver {
    pub fn new(
        chain_type: ChainType,
        command_path: String,
        chain_id: ChainId,
        home_path: String,
        account_prefix: String,
        host_dir: PathBuf,
        wait_attempts: u16,
        wait_interval: Duration,
        container: Arc<Container>,
    ) -> Self {
        Self {
            chain_type,
            command_path,
            chain_id,
            home_path,
            account_prefix,
            hostname: container.name.clone(),
            host_dir,
            wait_attempts,
            wait_interval,
            container,
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Run the chain CLI with the node home directory.
    pub fn exec(&self, args: &[&str]) -> Result<ExecOutput, Error> {
        let mut full_args = vec![self.command_path.as_str()];
        full_args.extend_from_slice(args);
        full_args.extend_from_slice(&["--home", self.home_path.as_str()]);

        self.container.exec(&full_args)
    }

    /// Run the chain CLI without the `--home` flag, e.g. for `status`.
    pub fn exec_without_home(&self, args: &[&str]) -> Result<ExecOutput, Error> {
        let mut full_args = vec![self.command_path.as_str()];
        full_args.extend_from_slice(args);

        self.container.exec(&full_args)
    }

    /// The RPC address reachable from other containers on the network.
    pub fn rpc_address(&self) -> String {
        format!("http://{}:{}", self.hostname, RPC_PORT)
    }

    pub fn grpc_address(&self) -> String {
        format!("{}:{}", self.hostname, GRPC_PORT)
    }

    pub fn p2p_address(&self) -> String {
        format!("{}:{}", self.hostname, P2P_PORT)
    }

    /// The RPC address used by the CLI inside the node container.
    pub fn rpc_listen_address(&self) -> String {
        format!("tcp://localhost:{RPC_PORT}")
    }

    pub fn read_file(&self, file_path: &str) -> Result<String, Error> {
        self.container
            .read_file(&format!("{}/{}", self.home_path, file_path))
    }

    /**
       Write a file relative to the node home directory. The file is
       staged in the host directory and copied into the container.
    */
    pub fn write_file(&self, file_path: &str, content: &str) -> Result<(), Error> {
        let staged = self.host_dir.join(file_path.replace('/', "_"));

        fs::create_dir_all(&self.host_dir)?;
        fs::write(&staged, content)?;

        self.container
            .copy_to(&staged, &format!("{}/{}", self.home_path, file_path))
    }

    pub fn update_chain_config(
        &self,
        file: &str,
        cont: impl FnOnce(&mut toml::Value) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let config1 = self.read_file(file)?;

        let mut config2 = toml::from_str(&config1).map_err(crate::error::handle_generic_error)?;

        cont(&mut config2)?;

        let config3 = toml::to_string_pretty(&config2).map_err(Error::toml)?;

        self.write_file(file, &config3)?;

        Ok(())
    }

    /**
       Query for the balances for a given wallet address and denomination
    */
    pub fn query_balance(&self, address: &str, denom: &str) -> Result<Amount, Error> {
        query_balance(self, address, denom)
    }

    /**
       Assert that a wallet should eventually have the expected amount in the
       given denomination.
    */
    pub fn assert_eventual_wallet_amount(
        &self,
        address: &str,
        denom: &str,
        amount: Amount,
    ) -> Result<(), Error> {
        assert_eventually_succeed(
            &format!("wallet reach {address} amount {amount} {denom}"),
            self.wait_attempts,
            self.wait_interval,
            || {
                let amount2 = self.query_balance(address, denom)?;

                if amount2 == amount {
                    Ok(())
                } else {
                    Err(Error::assertion(format!(
                        "current balance of account {address} with amount {amount2} does not match the target amount {amount}"
                    )))
                }
            },
        )
    }
}
