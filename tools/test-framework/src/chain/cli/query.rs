use core::str::FromStr;
use eyre::eyre;
use ibc_relayer_types::applications::transfer::amount::Amount;
use serde_json as json;
use serde_yaml as yaml;

use crate::chain::driver::ChainDriver;
use crate::chain::tx::parse_u64;
use crate::error::{handle_generic_error, Error};

pub fn query_balance(driver: &ChainDriver, wallet_id: &str, denom: &str) -> Result<Amount, Error> {
    let res = driver
        .exec(&[
            "--node",
            &driver.rpc_listen_address(),
            "query",
            "bank",
            "balances",
            wallet_id,
            "--denom",
            denom,
            "--output",
            "json",
        ])?
        .stdout;

    parse_balance(&res)
}

/**
   Parse the output of `query bank balances --denom`, which is either
   a bare coin or, on newer SDK versions, a coin under `balance`.
*/
pub fn parse_balance(output: &str) -> Result<Amount, Error> {
    let value = parse_json_or_yaml(output)?;

    let coin = value.get("balance").unwrap_or(&value);

    let amount_str = coin
        .get("amount")
        .ok_or_else(|| eyre!("expected amount field"))?
        .as_str()
        .ok_or_else(|| eyre!("expected string field"))?;

    let amount = Amount::from_str(amount_str).map_err(handle_generic_error)?;

    Ok(amount)
}

/// Query the latest block height from the node status.
pub fn query_status_height(driver: &ChainDriver) -> Result<u64, Error> {
    let output = driver.exec_without_home(&["status", "--node", &driver.rpc_listen_address()])?;

    // Older SDK versions print the status to stderr.
    parse_status_height(output.output())
}

pub fn parse_status_height(output: &str) -> Result<u64, Error> {
    let status: json::Value = json::from_str(output.trim())?;

    let sync_info = status
        .get("SyncInfo")
        .or_else(|| status.get("sync_info"))
        .ok_or_else(|| Error::missing_field("sync_info".to_string(), "node status".to_string()))?;

    parse_u64(sync_info.get("latest_block_height")).ok_or_else(|| {
        Error::missing_field(
            "latest_block_height".to_string(),
            "node status".to_string(),
        )
    })
}

pub fn query_tx(driver: &ChainDriver, tx_hash: &str) -> Result<json::Value, Error> {
    let res = driver
        .exec(&[
            "--node",
            &driver.rpc_listen_address(),
            "query",
            "tx",
            tx_hash,
            "--output",
            "json",
        ])?
        .stdout;

    parse_json_or_yaml(&res)
}

/**
    Query for the transactions included in the block at `height`.
*/
pub fn query_txs_at_height(driver: &ChainDriver, height: u64) -> Result<Vec<json::Value>, Error> {
    let event_query = format!("tx.height={height}");
    let node = driver.rpc_listen_address();

    let res = driver
        .exec(&[
            "--node", &node, "query", "txs", "--events", &event_query, "--limit", "100",
            "--output", "json",
        ])
        .or_else(|_| {
            // Since cosmos-sdk v0.50 the events are passed with `--query`.
            driver.exec(&[
                "--node", &node, "query", "txs", "--query", &event_query, "--limit", "100",
                "--output", "json",
            ])
        })?
        .stdout;

    tracing::debug!("parsing tx result: {}", res);

    parse_txs(&res)
}

pub fn parse_txs(output: &str) -> Result<Vec<json::Value>, Error> {
    let value = parse_json_or_yaml(output)?;

    let txs = match value.get("txs") {
        Some(json::Value::Array(txs)) => txs.clone(),
        Some(json::Value::Null) | None => Vec::new(),
        Some(_) => return Err(Error::generic(eyre!("expected txs to be an array"))),
    };

    Ok(txs)
}

pub fn parse_json_or_yaml(output: &str) -> Result<json::Value, Error> {
    match json::from_str(output) {
        Ok(res) => Ok(res),
        _ => {
            let value: yaml::Value = yaml::from_str(output).map_err(handle_generic_error)?;
            yaml_to_json_value(value)
        }
    }
}

// Hack to convert yaml::Value to json::Value. Unfortunately there is
// no builtin conversion provided even though both Value types are
// essentially the same. We just convert the two types to and from
// strings as a shortcut.
fn yaml_to_json_value(value: yaml::Value) -> Result<json::Value, Error> {
    let json_str = json::to_string(&value).map_err(handle_generic_error)?;

    let parsed = json::from_str(&json_str).map_err(handle_generic_error)?;

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn parses_balance_formats() {
        assert_eq!(
            parse_balance(r#"{"denom":"udym","amount":"10000000"}"#).unwrap(),
            Amount::from(10_000_000u64)
        );
        assert_eq!(
            parse_balance(r#"{"balance":{"denom":"udym","amount":"9000000"}}"#).unwrap(),
            Amount::from(9_000_000u64)
        );
        assert_eq!(
            parse_balance("amount: \"42\"\ndenom: uosmo\n").unwrap(),
            Amount::from(42u64)
        );
        assert!(parse_balance(r#"{"denom":"udym"}"#).is_err());
    }

    #[test_log::test]
    fn parses_status_height() {
        assert_eq!(
            parse_status_height(r#"{"SyncInfo":{"latest_block_height":"17"}}"#).unwrap(),
            17
        );
        assert_eq!(
            parse_status_height(r#"{"sync_info":{"latest_block_height":"3"}}"#).unwrap(),
            3
        );
        assert!(parse_status_height(r#"{"node_info":{}}"#).is_err());
    }

    #[test_log::test]
    fn parses_txs_search_result() {
        let txs = parse_txs(r#"{"total_count":"1","txs":[{"height":"5","txhash":"AA"}]}"#).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0]["txhash"], "AA");

        assert!(parse_txs(r#"{"total_count":"0","txs":null}"#).unwrap().is_empty());
    }
}
