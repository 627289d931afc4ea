/*!
   In-memory chains and relayer, used to run the transfer scenarios
   without containers.
*/

pub mod chain;
pub mod relayer;

use alloc::sync::Arc;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::chain::builtin::builtin_chain_presets;
use crate::chain::factory::ChainFactory;
use crate::chain::handle::{ChainHandle, DynChain};
use crate::chain::spec::{ChainConfig, ChainPresets, ChainSpec};
use crate::error::Error;
use crate::util::mutex::MutexUtil;

pub use chain::MockChain;
pub use relayer::MockRelayer;

/// The mock chains reachable by a [`MockRelayer`], by chain id.
#[derive(Clone, Default)]
pub struct MockNetwork {
    chains: Arc<Mutex<BTreeMap<String, Arc<MockChain>>>>,
}

/// Builds [`MockChain`]s from the same specs as the docker chain factory.
pub struct MockChainFactory {
    network: MockNetwork,
    specs: Vec<ChainSpec>,
    presets: ChainPresets,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chain, replacing any chain with the same chain id.
    pub fn add_chain(&self, config: ChainConfig) -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new(config));

        self.chains
            .acquire_mutex()
            .insert(chain.config().chain_id.clone(), chain.clone());

        chain
    }

    pub fn chain(&self, chain_id: &str) -> Result<Arc<MockChain>, Error> {
        self.chains
            .acquire_mutex()
            .get(chain_id)
            .cloned()
            .ok_or_else(|| Error::chain_not_started(chain_id.to_string()))
    }
}

impl MockChainFactory {
    pub fn new(network: &MockNetwork, specs: Vec<ChainSpec>) -> Self {
        Self {
            network: network.clone(),
            specs,
            presets: builtin_chain_presets(),
        }
    }
}

impl ChainFactory for MockChainFactory {
    fn chains(&self, _test_name: &str) -> Result<Vec<DynChain>, Error> {
        self.specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let config = spec.resolve(index, &self.presets)?;
                let chain: DynChain = self.network.add_chain(config);
                Ok(chain)
            })
            .collect()
    }

    fn count(&self) -> usize {
        self.specs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn factory_keeps_spec_order() {
        let network = MockNetwork::new();
        let factory = MockChainFactory::new(
            &network,
            vec![
                ChainSpec::new("osmosis"),
                ChainSpec::new("gaia"),
                ChainSpec::new("dymension"),
            ],
        );

        let chains = factory.chains("order").unwrap();
        let chain_ids: Vec<&str> = chains
            .iter()
            .map(|chain| chain.config().chain_id.as_str())
            .collect();

        assert_eq!(factory.count(), 3);
        assert_eq!(chain_ids, ["osmosis-1001", "cosmoshub-1004", "dymension_100-1"]);
        assert!(network.chain("cosmoshub-1004").is_ok());
        assert!(network.chain("juno-1").is_err());
    }

    #[test_log::test]
    fn unknown_chain_name_fails() {
        let factory = MockChainFactory::new(&MockNetwork::new(), vec![ChainSpec::new("juno")]);

        assert!(factory.chains("unknown").is_err());
    }
}
