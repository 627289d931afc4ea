/*!
   Assembly of the chains and relayers of a test into one topology.

   An [`Interchain`] is declared first, then built in a fixed order:
   the chains are initialized, a wallet is created on every chain for
   every relayer linking it, the chains are started with these wallets
   funded at genesis, and finally the relayers are configured, linked
   and started.
*/

use alloc::sync::Arc;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::chain::docker::DockerClient;
use crate::chain::handle::{ChainInitOptions, DynChain};
use crate::error::Error;
use crate::ibc::denom::Denom;
use crate::relayer::handle::DynRelayer;
use crate::reporter::RelayerExecReporter;
use crate::types::env::{prefix_writer, EnvWriter, ExportEnv};
use crate::types::wallet::{Wallet, WalletAmount};

/// An IBC path between two chains, relayed by one relayer.
#[derive(Clone)]
pub struct InterchainLink {
    pub chain1: DynChain,
    pub chain2: DynChain,
    pub relayer: DynRelayer,
    /// The path name registered with the relayer.
    pub path: String,
}

#[derive(Clone, Debug, Default)]
pub struct InterchainBuildOptions {
    pub test_name: String,
    pub client: Option<DockerClient>,
    pub network_id: Option<String>,
    /// Generate the paths without creating clients, connections and channels.
    pub skip_path_creation: bool,
    pub pull_images: bool,
}

#[derive(Default)]
pub struct Interchain {
    chains: Vec<DynChain>,
    relayers: Vec<(String, DynRelayer)>,
    links: Vec<InterchainLink>,
}

/// The relayer wallet of one chain, keyed by relayer name and chain id.
pub type RelayerWallets = BTreeMap<(String, String), Wallet>;

pub struct BuiltInterchain {
    chains: Vec<DynChain>,
    relayers: Vec<(String, DynRelayer)>,
    links: Vec<InterchainLink>,
    relayer_wallets: RelayerWallets,
}

fn same_relayer(a: &DynRelayer, b: &DynRelayer) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl Interchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chain, which must not share its chain id with another chain.
    pub fn add_chain(mut self, chain: DynChain) -> Result<Self, Error> {
        let chain_id = &chain.config().chain_id;

        if self
            .chains
            .iter()
            .any(|existing| &existing.config().chain_id == chain_id)
        {
            return Err(Error::duplicate_chain(chain_id.clone()));
        }

        self.chains.push(chain);
        Ok(self)
    }

    /// Add a relayer under a unique name.
    pub fn add_relayer(mut self, relayer: DynRelayer, name: &str) -> Result<Self, Error> {
        if self.relayers.iter().any(|(existing, other)| {
            existing == name || same_relayer(other, &relayer)
        }) {
            return Err(Error::duplicate_relayer(name.to_string()));
        }

        self.relayers.push((name.to_string(), relayer));
        Ok(self)
    }

    /// Declare a link between two chains that were already added.
    pub fn add_link(mut self, link: InterchainLink) -> Result<Self, Error> {
        for chain in [&link.chain1, &link.chain2] {
            let chain_id = &chain.config().chain_id;

            if !self
                .chains
                .iter()
                .any(|existing| &existing.config().chain_id == chain_id)
            {
                return Err(Error::unknown_link_member(link.path.clone(), chain_id.clone()));
            }
        }

        if self.relayer_name(&link.relayer).is_none() {
            return Err(Error::unknown_link_member(
                link.path.clone(),
                link.relayer.name().to_string(),
            ));
        }

        self.links.push(link);
        Ok(self)
    }

    fn relayer_name(&self, relayer: &DynRelayer) -> Option<String> {
        self.relayers
            .iter()
            .find(|(_, other)| same_relayer(other, relayer))
            .map(|(name, _)| name.clone())
    }

    /**
       The chains linked by each relayer, without duplicates, in the
       order of the links.
    */
    fn relayer_chains(&self) -> Vec<(String, DynRelayer, DynChain)> {
        let mut pairs: Vec<(String, DynRelayer, DynChain)> = Vec::new();

        for link in self.links.iter() {
            let Some(name) = self.relayer_name(&link.relayer) else {
                continue;
            };

            for chain in [&link.chain1, &link.chain2] {
                let known = pairs.iter().any(|(other, _, existing)| {
                    other == &name && existing.config().chain_id == chain.config().chain_id
                });

                if !known {
                    pairs.push((name.clone(), link.relayer.clone(), chain.clone()));
                }
            }
        }

        pairs
    }

    /**
       Start every chain and relayer. Any failure aborts the build; the
       resources created so far are released when dropped.
    */
    pub fn build(
        self,
        reporter: &RelayerExecReporter,
        options: InterchainBuildOptions,
    ) -> Result<BuiltInterchain, Error> {
        let init_options = ChainInitOptions {
            test_name: options.test_name.clone(),
            client: options.client.clone(),
            network_id: options.network_id.clone(),
            pull_images: options.pull_images,
        };

        for chain in self.chains.iter() {
            info!("initializing chain {}", chain.config().chain_id);
            chain.initialize(&init_options)?;
        }

        let relayer_chains = self.relayer_chains();
        let mut relayer_wallets = RelayerWallets::new();

        for (name, _, chain) in relayer_chains.iter() {
            let chain_id = chain.config().chain_id.clone();
            let key_name = format!("{name}-{chain_id}");

            debug!("creating wallet {} for relayer {}", key_name, name);

            let wallet = chain.create_wallet(&key_name)?;
            relayer_wallets.insert((name.clone(), chain_id), wallet);
        }

        for chain in self.chains.iter() {
            let config = chain.config();

            let genesis_wallets: Vec<WalletAmount> = relayer_wallets
                .iter()
                .filter(|((_, chain_id), _)| chain_id == &config.chain_id)
                .map(|(_, wallet)| {
                    WalletAmount::new(
                        wallet.address.clone(),
                        Denom::base(&config.denom),
                        config.genesis_amounts.genesis,
                    )
                })
                .collect();

            info!("starting chain {}", config.chain_id);
            chain.start(&options.test_name, &genesis_wallets)?;
        }

        for (name, relayer, chain) in relayer_chains.iter() {
            let config = chain.config();
            let key = (name.clone(), config.chain_id.clone());

            let wallet = relayer_wallets
                .get(&key)
                .ok_or_else(|| Error::unknown_key(config.chain_id.clone(), name.clone()))?;

            // The relayer names its keys after the chain they sign for.
            relayer.add_chain_configuration(
                reporter,
                config,
                &config.chain_id,
                &chain.rpc_address(),
                &chain.grpc_address(),
            )?;

            relayer.restore_key(reporter, config, &config.chain_id, &wallet.mnemonic)?;
        }

        for link in self.links.iter() {
            let src_chain_id = &link.chain1.config().chain_id;
            let dst_chain_id = &link.chain2.config().chain_id;

            link.relayer
                .generate_path(reporter, src_chain_id, dst_chain_id, &link.path)?;

            if options.skip_path_creation {
                info!("skipping creation of path {}", link.path);
            } else {
                link.relayer.link_path(reporter, &link.path)?;
            }
        }

        for (name, relayer) in self.relayers.iter() {
            let paths: Vec<String> = self
                .links
                .iter()
                .filter(|link| same_relayer(&link.relayer, relayer))
                .map(|link| link.path.clone())
                .collect();

            if paths.is_empty() {
                continue;
            }

            info!("starting relayer {} on paths {:?}", name, paths);
            relayer.start_relayer(reporter, &paths)?;
        }

        Ok(BuiltInterchain {
            chains: self.chains,
            relayers: self.relayers,
            links: self.links,
            relayer_wallets,
        })
    }
}

impl BuiltInterchain {
    pub fn chains(&self) -> &[DynChain] {
        &self.chains
    }

    pub fn links(&self) -> &[InterchainLink] {
        &self.links
    }

    pub fn relayer_wallets(&self) -> &RelayerWallets {
        &self.relayer_wallets
    }

    pub fn relayer_wallet(&self, relayer_name: &str, chain_id: &str) -> Option<&Wallet> {
        self.relayer_wallets
            .get(&(relayer_name.to_string(), chain_id.to_string()))
    }

    /// Stop the relayers, then the chains.
    pub fn stop(&self, reporter: &RelayerExecReporter) -> Result<(), Error> {
        for (_, relayer) in self.relayers.iter() {
            relayer.stop_relayer(reporter)?;
        }

        for chain in self.chains.iter() {
            chain.stop()?;
        }

        Ok(())
    }
}

impl ExportEnv for BuiltInterchain {
    fn export_env(&self, writer: &mut impl EnvWriter) {
        for (i, chain) in self.chains.iter().enumerate() {
            let mut writer = prefix_writer(&format!("CHAIN_{}", i + 1), writer);

            writer.write_env("CHAIN_ID", &chain.config().chain_id);
            writer.write_env("DENOM", &chain.config().denom);
            writer.write_env("RPC_ADDR", &chain.rpc_address());
            writer.write_env("GRPC_ADDR", &chain.grpc_address());
        }

        for (i, link) in self.links.iter().enumerate() {
            writer.write_env(&format!("PATH_{}", i + 1), &link.path);
        }

        for ((relayer, chain_id), wallet) in self.relayer_wallets.iter() {
            let prefix = format!("RELAYER_{relayer}_{chain_id}")
                .to_uppercase()
                .replace(['-', '.'], "_");

            wallet.export_env(&mut prefix_writer(&prefix, writer));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::builtin::{dymension, osmosis};
    use crate::chain::handle::ChainHandle;
    use crate::mock::{MockNetwork, MockRelayer};
    use crate::relayer::handle::RelayerHandle;
    use crate::types::env::format_env;

    #[test_log::test]
    fn rejects_duplicate_members() {
        let network = MockNetwork::new();
        let dymension = network.add_chain(dymension());
        let duplicate = network.add_chain(dymension.config().clone());

        let result = Interchain::new()
            .add_chain(dymension)
            .and_then(|interchain| interchain.add_chain(duplicate));

        assert!(result.is_err());

        let relayer: DynRelayer = Arc::new(MockRelayer::new(&network));

        let result = Interchain::new()
            .add_relayer(relayer.clone(), "rly")
            .and_then(|interchain| interchain.add_relayer(relayer, "rly2"));

        assert!(result.is_err());
    }

    #[test_log::test]
    fn link_requires_added_chains() {
        let network = MockNetwork::new();
        let dymension = network.add_chain(dymension());
        let osmosis = network.add_chain(osmosis());
        let relayer: DynRelayer = Arc::new(MockRelayer::new(&network));

        let result = Interchain::new()
            .add_chain(dymension.clone())
            .and_then(|interchain| interchain.add_relayer(relayer.clone(), "rly"))
            .and_then(|interchain| {
                interchain.add_link(InterchainLink {
                    chain1: dymension,
                    chain2: osmosis,
                    relayer,
                    path: "dym-osmo".to_string(),
                })
            });

        assert!(result.is_err());
    }

    #[test_log::test]
    fn build_funds_relayer_wallets_and_links_path() {
        let network = MockNetwork::new();
        let dymension = network.add_chain(dymension());
        let osmosis = network.add_chain(osmosis());
        let relayer: DynRelayer = Arc::new(MockRelayer::new(&network));
        let reporter = RelayerExecReporter::nop("build");

        let built = Interchain::new()
            .add_chain(dymension.clone())
            .and_then(|interchain| interchain.add_chain(osmosis.clone()))
            .and_then(|interchain| interchain.add_relayer(relayer.clone(), "rly"))
            .and_then(|interchain| {
                interchain.add_link(InterchainLink {
                    chain1: dymension.clone(),
                    chain2: osmosis.clone(),
                    relayer: relayer.clone(),
                    path: "dym-osmo".to_string(),
                })
            })
            .and_then(|interchain| {
                interchain.build(
                    &reporter,
                    InterchainBuildOptions {
                        test_name: "build".to_string(),
                        ..Default::default()
                    },
                )
            })
            .unwrap();

        let wallet = built.relayer_wallet("rly", "osmosis-1001").unwrap();
        let balance = osmosis.get_balance(wallet.address.as_str(), "uosmo").unwrap();
        assert_eq!(balance, osmosis.config().genesis_amounts.genesis);

        let channels = relayer.get_channels(&reporter, "dymension_100-1").unwrap();
        assert_eq!(channels.len(), 1);

        let env = format_env(&built);
        assert!(env.contains("CHAIN_1_CHAIN_ID=dymension_100-1"));
        assert!(env.contains("RELAYER_RLY_OSMOSIS_1001_KEY_NAME=rly-osmosis-1001"));

        built.stop(&reporter).unwrap();
    }

    #[test_log::test]
    fn skipping_path_creation_leaves_no_channel() {
        let network = MockNetwork::new();
        let dymension = network.add_chain(dymension());
        let osmosis = network.add_chain(osmosis());
        let relayer: DynRelayer = Arc::new(MockRelayer::new(&network));
        let reporter = RelayerExecReporter::nop("skip");

        Interchain::new()
            .add_chain(dymension.clone())
            .and_then(|interchain| interchain.add_chain(osmosis.clone()))
            .and_then(|interchain| interchain.add_relayer(relayer.clone(), "rly"))
            .and_then(|interchain| {
                interchain.add_link(InterchainLink {
                    chain1: dymension,
                    chain2: osmosis,
                    relayer: relayer.clone(),
                    path: "dym-osmo".to_string(),
                })
            })
            .and_then(|interchain| {
                interchain.build(
                    &reporter,
                    InterchainBuildOptions {
                        test_name: "skip".to_string(),
                        skip_path_creation: true,
                        ..Default::default()
                    },
                )
            })
            .unwrap();

        assert!(relayer
            .get_channels(&reporter, "osmosis-1001")
            .unwrap()
            .is_empty());
    }
}
