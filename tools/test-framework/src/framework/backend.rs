/*!
   The backends that provide the chains and the relayer of a scenario:
   containers driven through the docker CLI, or in-memory mocks.
*/

use alloc::sync::Arc;
use tracing::info;

use crate::chain::docker::{docker_setup, DockerClient, DockerNetwork};
use crate::chain::factory::{BuiltinChainFactory, ChainFactory};
use crate::chain::handle::DynChain;
use crate::chain::spec::ChainSpec;
use crate::error::Error;
use crate::mock::{MockChainFactory, MockNetwork, MockRelayer};
use crate::relayer::factory::BuiltinRelayerFactory;
use crate::relayer::handle::DynRelayer;
use crate::types::config::TestConfig;

/**
   The chains and relayer of a scenario, not started yet. The docker
   network, when present, is removed when this is dropped.
*/
pub struct BackendSetup {
    pub chains: Vec<DynChain>,
    pub relayer: DynRelayer,
    pub client: Option<DockerClient>,
    pub network: Option<DockerNetwork>,
}

pub trait InterchainBackend {
    fn name(&self) -> &str;

    /// Create the chains of `specs`, in order, and a relayer able to reach them.
    fn setup(
        &self,
        config: &TestConfig,
        test_name: &str,
        specs: Vec<ChainSpec>,
        relayer_factory: &BuiltinRelayerFactory,
    ) -> Result<BackendSetup, Error>;
}

/// Chains and relayer running in containers on a fresh docker network.
#[derive(Clone, Copy, Debug, Default)]
pub struct DockerBackend;

/**
   Chains and relayer simulated in memory. The relayer factory is only
   used for its implementation name; packets are relayed on flush.
*/
#[derive(Clone, Default)]
pub struct MockBackend {
    network: MockNetwork,
}

impl BackendSetup {
    pub fn network_id(&self) -> Option<String> {
        self.network.as_ref().map(|network| network.id.clone())
    }
}

impl InterchainBackend for DockerBackend {
    fn name(&self) -> &str {
        "docker"
    }

    fn setup(
        &self,
        config: &TestConfig,
        test_name: &str,
        specs: Vec<ChainSpec>,
        relayer_factory: &BuiltinRelayerFactory,
    ) -> Result<BackendSetup, Error> {
        let (client, network) = docker_setup(config, test_name)?;

        info!("created docker network {} for test {}", network.name, test_name);

        let chains = BuiltinChainFactory::new(config, specs).chains(test_name)?;

        let relayer = relayer_factory.build(test_name, config, client.clone(), &network.id)?;

        Ok(BackendSetup {
            chains,
            relayer,
            client: Some(client),
            network: Some(network),
        })
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network(&self) -> &MockNetwork {
        &self.network
    }
}

impl InterchainBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn setup(
        &self,
        _config: &TestConfig,
        test_name: &str,
        specs: Vec<ChainSpec>,
        relayer_factory: &BuiltinRelayerFactory,
    ) -> Result<BackendSetup, Error> {
        let chains = MockChainFactory::new(&self.network, specs).chains(test_name)?;

        info!(
            "created {} mock chains and a mock {} relayer for test {}",
            chains.len(),
            relayer_factory.relayer_impl(),
            test_name
        );

        let relayer: DynRelayer = Arc::new(MockRelayer::new(&self.network));

        Ok(BackendSetup {
            chains,
            relayer,
            client: None,
            network: None,
        })
    }
}
