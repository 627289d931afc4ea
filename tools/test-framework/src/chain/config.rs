/*!
    Helper functions for modifying the node configuration and genesis
    file of a Cosmos SDK chain.

    Since we do not need to understand the full structure of the
    CosmosSDK config, we are updating the config as dynamic TOML
    and JSON values instead of serializing them into proper types.
*/

use eyre::{eyre, Report as Error};
use serde_json as json;
use toml::Value;

pub const RPC_PORT: u16 = 26657;
pub const GRPC_PORT: u16 = 9090;
pub const P2P_PORT: u16 = 26656;

fn section_mut<'a>(config: &'a mut Value, section: &str) -> Result<&'a mut toml::Table, Error> {
    config
        .get_mut(section)
        .ok_or_else(|| eyre!("expect {} section", section))?
        .as_table_mut()
        .ok_or_else(|| eyre!("expect object"))
}

/// Set the `rpc.laddr` field in the full node config.
pub fn set_rpc_port(config: &mut Value, port: u16) -> Result<(), Error> {
    section_mut(config, "rpc")?.insert(
        "laddr".to_string(),
        format!("tcp://0.0.0.0:{port}").into(),
    );

    Ok(())
}

/// Set the `p2p.laddr` field in the full node config.
pub fn set_p2p_port(config: &mut Value, port: u16) -> Result<(), Error> {
    section_mut(config, "p2p")?.insert(
        "laddr".to_string(),
        format!("tcp://0.0.0.0:{port}").into(),
    );

    Ok(())
}

/// Set the `consensus.timeout_commit` field in the full node config.
pub fn set_timeout_commit(config: &mut Value, timeout: &str) -> Result<(), Error> {
    section_mut(config, "consensus")?.insert("timeout_commit".to_string(), timeout.into());

    Ok(())
}

/// Allow the relayer to reach the node from other containers.
pub fn allow_cors(config: &mut Value) -> Result<(), Error> {
    section_mut(config, "rpc")?.insert(
        "cors_allowed_origins".to_string(),
        Value::Array(vec!["*".into()]),
    );

    Ok(())
}

pub fn set_grpc_port(app_config: &mut Value, port: u16) -> Result<(), Error> {
    section_mut(app_config, "grpc")?.insert("address".to_string(), format!("0.0.0.0:{port}").into());

    Ok(())
}

pub fn enable_api(app_config: &mut Value) -> Result<(), Error> {
    if let Some(field) = app_config.get_mut("api") {
        let api = field.as_table_mut().ok_or_else(|| eyre!("expect object"))?;
        api.insert("enable".to_string(), true.into());
        api.insert("address".to_string(), "tcp://0.0.0.0:1317".into());
    }

    Ok(())
}

pub fn set_minimum_gas_price(app_config: &mut Value, price: &str) -> Result<(), Error> {
    app_config
        .as_table_mut()
        .ok_or_else(|| eyre!("expect object"))?
        .insert("minimum-gas-prices".to_string(), price.into());

    Ok(())
}

/**
   Replace every occurence of the default `stake` denomination in the
   genesis file with the native denomination of the chain.
*/
pub fn replace_stake_denom(genesis: &mut json::Value, denom: &str) {
    match genesis {
        json::Value::String(value) if value == "stake" => {
            *value = denom.to_string();
        }
        json::Value::Array(items) => {
            for item in items {
                replace_stake_denom(item, denom);
            }
        }
        json::Value::Object(fields) => {
            for value in fields.values_mut() {
                replace_stake_denom(value, denom);
            }
        }
        _ => {}
    }
}

/**
   Set a value in the genesis file at a dotted path such as
   `app_state.gov.voting_params.voting_period`. Every segment but the
   last one must already exist.
*/
pub fn set_genesis_value(
    genesis: &mut json::Value,
    key: &str,
    value: json::Value,
) -> Result<(), Error> {
    let mut segments: Vec<&str> = key.split('.').collect();
    let last = segments
        .pop()
        .filter(|last| !last.is_empty())
        .ok_or_else(|| eyre!("empty genesis key"))?;

    let mut current = genesis;
    for segment in segments {
        current = match current {
            json::Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| eyre!("expect array index at `{}` in {}", segment, key))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| eyre!("index {} out of bounds in {}", index, key))?
            }
            other => other
                .get_mut(segment)
                .ok_or_else(|| eyre!("expect field `{}` in genesis key {}", segment, key))?,
        };
    }

    current
        .as_object_mut()
        .ok_or_else(|| eyre!("expect object at genesis key {}", key))?
        .insert(last.to_owned(), value);

    Ok(())
}
