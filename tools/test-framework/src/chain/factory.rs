/*!
   Construction of the chains of a test from their specs.
*/

use alloc::sync::Arc;
use tracing::debug;

use crate::chain::builtin::builtin_chain_presets;
use crate::chain::cosmos::CosmosChain;
use crate::chain::handle::DynChain;
use crate::chain::spec::{ChainConfig, ChainPresets, ChainSpec};
use crate::error::Error;
use crate::types::config::TestConfig;

pub trait ChainFactory {
    /// Build the chains in the same order as their specs.
    fn chains(&self, test_name: &str) -> Result<Vec<DynChain>, Error>;

    fn count(&self) -> usize;
}

pub struct BuiltinChainFactory {
    specs: Vec<ChainSpec>,
    presets: ChainPresets,
    test_config: TestConfig,
}

impl BuiltinChainFactory {
    pub fn new(test_config: &TestConfig, specs: Vec<ChainSpec>) -> Self {
        Self {
            specs,
            presets: builtin_chain_presets(),
            test_config: test_config.clone(),
        }
    }

    pub fn with_presets(mut self, presets: ChainPresets) -> Self {
        self.presets = presets;
        self
    }

    /// Resolve every spec, failing on the first invalid one.
    pub fn configs(&self) -> Result<Vec<ChainConfig>, Error> {
        self.specs
            .iter()
            .enumerate()
            .map(|(index, spec)| spec.resolve(index, &self.presets))
            .collect()
    }
}

impl ChainFactory for BuiltinChainFactory {
    fn chains(&self, test_name: &str) -> Result<Vec<DynChain>, Error> {
        let configs = self.configs()?;

        let chains = self
            .specs
            .iter()
            .zip(configs)
            .map(|(spec, config)| {
                debug!(
                    "creating chain {} ({}) for test {}",
                    config.chain_id, config.name, test_name
                );

                let chain: DynChain = Arc::new(CosmosChain::new(
                    config,
                    self.test_config.clone(),
                    spec.num_validators(),
                    spec.num_full_nodes(),
                ));

                chain
            })
            .collect();

        Ok(chains)
    }

    fn count(&self) -> usize {
        self.specs.len()
    }
}
