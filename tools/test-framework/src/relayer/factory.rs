/*!
   Construction of the relayer of a test.
*/

use alloc::sync::Arc;
use core::fmt::{self, Display};
use core::str::FromStr;
use tracing::info;

use crate::chain::docker::{sanitize_name, DockerClient, DockerImage};
use crate::error::Error;
use crate::relayer::docker::DockerRelayer;
use crate::relayer::handle::DynRelayer;
use crate::relayer::hermes::Hermes;
use crate::relayer::rly::CosmosRly;
use crate::types::config::TestConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RelayerImpl {
    #[default]
    CosmosRly,
    Hermes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayerOption {
    /// Run the relayer from this image instead of the default one.
    DockerImage(DockerImage),
    /// Extra arguments given to the relayer start command.
    StartupFlags(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct BuiltinRelayerFactory {
    relayer_impl: RelayerImpl,
    options: Vec<RelayerOption>,
}

impl Display for RelayerImpl {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Self::CosmosRly => write!(f, "rly"),
            Self::Hermes => write!(f, "hermes"),
        }
    }
}

impl FromStr for RelayerImpl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rly" | "cosmos-rly" | "relayer" => Ok(Self::CosmosRly),
            "hermes" => Ok(Self::Hermes),
            _ => Err(Error::generic(eyre::eyre!("unknown relayer implementation: {s}"))),
        }
    }
}

impl BuiltinRelayerFactory {
    pub fn new(relayer_impl: RelayerImpl) -> Self {
        Self {
            relayer_impl,
            options: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = RelayerOption>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn relayer_impl(&self) -> RelayerImpl {
        self.relayer_impl
    }

    /// The last image option wins.
    pub fn image(&self) -> Option<DockerImage> {
        self.options.iter().rev().find_map(|option| match option {
            RelayerOption::DockerImage(image) => Some(image.clone()),
            _ => None,
        })
    }

    /// Startup flags of all options, in order.
    pub fn startup_flags(&self) -> Vec<String> {
        self.options
            .iter()
            .flat_map(|option| match option {
                RelayerOption::StartupFlags(flags) => flags.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    /**
       Create a relayer running on the docker network `network_id`. The
       relayer home directory is created under the chain store directory
       of the test run.
    */
    pub fn build(
        &self,
        test_name: &str,
        test_config: &TestConfig,
        client: DockerClient,
        network_id: &str,
    ) -> Result<DynRelayer, Error> {
        let host_home = test_config
            .chain_store_dir
            .join("relayers")
            .join(format!("{}-{}", self.relayer_impl, sanitize_name(test_name)));

        info!(
            "building relayer {} with home directory {}",
            self.relayer_impl,
            host_home.display()
        );

        let image = self.image();
        let startup_flags = self.startup_flags();

        let relayer: DynRelayer = match self.relayer_impl {
            RelayerImpl::CosmosRly => Arc::new(DockerRelayer::new(
                CosmosRly,
                test_name,
                client,
                network_id,
                &host_home,
                image,
                startup_flags,
            )?),
            RelayerImpl::Hermes => Arc::new(DockerRelayer::new(
                Hermes::new(),
                test_name,
                client,
                network_id,
                &host_home,
                image,
                startup_flags,
            )?),
        };

        Ok(relayer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn options_are_combined() {
        let factory = BuiltinRelayerFactory::new(RelayerImpl::CosmosRly).with_options([
            RelayerOption::DockerImage(DockerImage::new("ghcr.io/cosmos/relayer", "v2.3.1")),
            RelayerOption::StartupFlags(vec!["--processor".to_string(), "events".to_string()]),
            RelayerOption::StartupFlags(vec!["-b".to_string(), "100".to_string()]),
            RelayerOption::DockerImage(DockerImage::new("ghcr.io/cosmos/relayer", "main")),
        ]);

        assert_eq!(factory.image().unwrap().reference(), "ghcr.io/cosmos/relayer:main");
        assert_eq!(factory.startup_flags(), ["--processor", "events", "-b", "100"]);
        assert!(BuiltinRelayerFactory::new(RelayerImpl::Hermes).image().is_none());
    }

    #[test_log::test]
    fn parses_relayer_names() {
        assert_eq!("rly".parse::<RelayerImpl>().unwrap(), RelayerImpl::CosmosRly);
        assert_eq!("hermes".parse::<RelayerImpl>().unwrap(), RelayerImpl::Hermes);
        assert!("go-relayer-v3".parse::<RelayerImpl>().is_err());
    }
}
