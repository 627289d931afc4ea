/*!
   Declarative description of the chains to run in a test.

   A [`ChainSpec`] names a chain and optionally overrides parts of its
   configuration. Specs are resolved into a complete [`ChainConfig`] by
   merging the overrides over the builtin preset for the chain name.
*/

use core::str::FromStr;
use ibc_relayer_types::applications::transfer::amount::Amount;
use serde::{Deserialize, Serialize};
use serde_json as json;
use std::collections::BTreeMap;

use crate::chain::chain_type::ChainType;
use crate::chain::encoding::EncodingConfig;
use crate::error::{handle_generic_error, Error};

pub use crate::chain::docker::DockerImage;

pub const DEFAULT_GENESIS_AMOUNT: u64 = 10_000_000_000_000;
pub const DEFAULT_STAKING_AMOUNT: u64 = 1_000_000_000_000;

/**
   The amount of native tokens the validator account holds at genesis,
   and the part of it the validator self-delegates in its gentx.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAmounts {
    #[serde(with = "amount_string")]
    pub genesis: Amount,

    #[serde(with = "amount_string")]
    pub staking: Amount,
}

/// A value to set in the genesis file, addressed by a dotted path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenesisKV {
    pub key: String,
    pub value: json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub chain_type: ChainType,

    pub name: String,

    pub chain_id: String,

    #[serde(default)]
    pub images: Vec<DockerImage>,

    /// The chain binary inside the image, e.g. `dymd`.
    pub bin: String,

    pub bech32_prefix: String,

    pub denom: String,

    #[serde(default)]
    pub coin_type: u32,

    /// Minimum gas price, e.g. `0.0025uosmo`.
    pub gas_prices: String,

    /// Multiplier over simulated gas. Zero disables gas simulation.
    #[serde(default)]
    pub gas_adjustment: f64,

    pub trusting_period: String,

    #[serde(skip)]
    pub encoding: EncodingConfig,

    #[serde(default)]
    pub genesis_amounts: GenesisAmounts,

    #[serde(default)]
    pub modify_genesis: Vec<GenesisKV>,

    #[serde(default)]
    pub no_host_mount: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ChainSpec {
    /// Name of the builtin preset to start from.
    pub name: String,

    /// Overrides the version of every image of the chain.
    pub version: Option<String>,

    pub num_validators: Option<usize>,

    pub num_full_nodes: Option<usize>,

    pub chain_config: Option<ChainConfig>,
}

pub type ChainPresets = BTreeMap<String, ChainConfig>;

impl Default for GenesisAmounts {
    fn default() -> Self {
        Self {
            genesis: DEFAULT_GENESIS_AMOUNT.into(),
            staking: DEFAULT_STAKING_AMOUNT.into(),
        }
    }
}

impl GenesisAmounts {
    pub fn new(genesis: impl Into<Amount>, staking: impl Into<Amount>) -> Self {
        Self {
            genesis: genesis.into(),
            staking: staking.into(),
        }
    }

    /// Parse decimal amounts that may not fit into `u64`.
    pub fn parse(genesis: &str, staking: &str) -> Result<Self, Error> {
        Ok(Self {
            genesis: Amount::from_str(genesis).map_err(handle_generic_error)?,
            staking: Amount::from_str(staking).map_err(handle_generic_error)?,
        })
    }
}

impl ChainConfig {
    /// The numeric part of the minimum gas price.
    pub fn gas_price_amount(&self) -> Result<f64, Error> {
        let amount = self
            .gas_prices
            .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '/');

        amount.parse::<f64>().map_err(|e| {
            Error::generic(eyre::eyre!(
                "invalid gas price `{}` for chain {}: {}",
                self.gas_prices,
                self.chain_id,
                e
            ))
        })
    }

    pub fn image(&self) -> Result<&DockerImage, Error> {
        self.images
            .first()
            .ok_or_else(|| Error::missing_field("images".to_string(), self.chain_id.clone()))
    }

    /**
       Fill every field left empty in `self` from `preset`. Fields set
       in `self` take precedence.
    */
    pub fn merge_over(self, preset: &ChainConfig) -> ChainConfig {
        fn or_preset(value: String, preset: &str) -> String {
            if value.is_empty() {
                preset.to_string()
            } else {
                value
            }
        }

        let default_encoding = EncodingConfig::default();

        ChainConfig {
            chain_type: self.chain_type,
            name: or_preset(self.name, &preset.name),
            chain_id: or_preset(self.chain_id, &preset.chain_id),
            images: if self.images.is_empty() {
                preset.images.clone()
            } else {
                self.images
            },
            bin: or_preset(self.bin, &preset.bin),
            bech32_prefix: or_preset(self.bech32_prefix, &preset.bech32_prefix),
            denom: or_preset(self.denom, &preset.denom),
            coin_type: if self.coin_type == 0 {
                preset.coin_type
            } else {
                self.coin_type
            },
            gas_prices: or_preset(self.gas_prices, &preset.gas_prices),
            gas_adjustment: self.gas_adjustment,
            trusting_period: or_preset(self.trusting_period, &preset.trusting_period),
            encoding: if self.encoding == default_encoding {
                preset.encoding.clone()
            } else {
                self.encoding
            },
            genesis_amounts: self.genesis_amounts,
            modify_genesis: if self.modify_genesis.is_empty() {
                preset.modify_genesis.clone()
            } else {
                self.modify_genesis
            },
            no_host_mount: self.no_host_mount || preset.no_host_mount,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let required = [
            ("chain_id", &self.chain_id),
            ("bin", &self.bin),
            ("bech32_prefix", &self.bech32_prefix),
            ("denom", &self.denom),
        ];

        for (field, value) in required {
            if value.is_empty() {
                return Err(Error::missing_field(
                    field.to_string(),
                    format!("chain config of {}", self.name),
                ));
            }
        }

        self.image()?;

        Ok(())
    }
}

impl ChainSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn with_config(mut self, chain_config: ChainConfig) -> Self {
        self.chain_config = Some(chain_config);
        self
    }

    pub fn num_validators(&self) -> usize {
        self.num_validators.unwrap_or(1)
    }

    pub fn num_full_nodes(&self) -> usize {
        self.num_full_nodes.unwrap_or(0)
    }

    /**
       Produce the complete configuration of the chain at position
       `index` in the list of specs passed to a chain factory.
    */
    pub fn resolve(&self, index: usize, presets: &ChainPresets) -> Result<ChainConfig, Error> {
        let preset = presets.get(&self.name);

        let mut config = match (&self.chain_config, preset) {
            (Some(config), Some(preset)) => config.clone().merge_over(preset),
            (Some(config), None) => config.clone(),
            (None, Some(preset)) => preset.clone(),
            (None, None) => return Err(Error::unknown_chain(self.name.clone())),
        };

        if config.name.is_empty() {
            config.name = self.name.clone();
        }

        if config.chain_id.is_empty() {
            config.chain_id = format!("{}-{}", self.name, index + 1);
        }

        if let Some(version) = &self.version {
            for image in config.images.iter_mut() {
                image.version = version.clone();
            }
        }

        if config.coin_type == 0 {
            config.coin_type = config.chain_type.coin_type();
        }

        config.validate()?;

        Ok(config)
    }
}

mod amount_string {
    use core::str::FromStr;
    use ibc_relayer_types::applications::transfer::amount::Amount;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let value = String::deserialize(deserializer)?;
        Amount::from_str(&value).map_err(|e| D::Error::custom(format!("{e:?}")))
    }
}
