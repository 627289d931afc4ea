/*!
   Methods for performing token transfers on a chain.
*/

use serde_json as json;

use crate::chain::driver::ChainDriver;
use crate::chain::handle::TransferOptions;
use crate::error::Error;

/// Fixed gas limit used when gas simulation is disabled.
const DEFAULT_GAS_LIMIT: &str = "300000";

/**
   The fee and gas flags of a transaction. A zero gas adjustment
   disables simulation in favour of a fixed gas limit.
*/
pub fn gas_args(gas_prices: &str, gas_adjustment: f64) -> Vec<String> {
    let mut args = vec!["--gas-prices".to_string(), gas_prices.to_string()];

    if gas_adjustment > 0.0 {
        args.extend([
            "--gas".to_string(),
            "auto".to_string(),
            "--gas-adjustment".to_string(),
            gas_adjustment.to_string(),
        ]);
    } else {
        args.extend(["--gas".to_string(), DEFAULT_GAS_LIMIT.to_string()]);
    }

    args
}

pub fn bank_send(
    driver: &ChainDriver,
    sender: &str,
    recipient: &str,
    token: &str,
    gas_args: &[String],
) -> Result<String, Error> {
    let tx_args = tx_args(driver);

    let mut args = vec!["tx", "bank", "send", sender, recipient, token];
    args.extend(tx_args.iter().map(String::as_str));
    args.extend(gas_args.iter().map(String::as_str));

    let output = driver.exec(&args)?;

    parse_broadcast_output(&output.stdout)
}

pub fn ibc_transfer(
    driver: &ChainDriver,
    sender: &str,
    src_port: &str,
    src_channel: &str,
    recipient: &str,
    token: &str,
    options: &TransferOptions,
    gas_args: &[String],
) -> Result<String, Error> {
    let mut args: Vec<String> = ["tx", "ibc-transfer", "transfer", src_port, src_channel, recipient, token]
        .iter()
        .map(|arg| arg.to_string())
        .collect();

    args.extend(["--from".to_string(), sender.to_string()]);

    if let Some(timeout) = &options.timeout {
        if let Some(height) = timeout.height {
            args.extend(["--packet-timeout-height".to_string(), format!("0-{height}")]);
        }

        if let Some(nano_seconds) = timeout.nano_seconds {
            args.extend([
                "--packet-timeout-timestamp".to_string(),
                nano_seconds.to_string(),
            ]);
        }
    }

    if let Some(memo) = &options.memo {
        args.extend(["--memo".to_string(), memo.clone()]);
    }

    args.extend(tx_args(driver));
    args.extend(gas_args.iter().cloned());

    let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = driver.exec(&args_ref)?;

    parse_broadcast_output(&output.stdout)
}

fn tx_args(driver: &ChainDriver) -> Vec<String> {
    vec![
        "--chain-id".to_string(),
        driver.chain_id.to_string(),
        "--node".to_string(),
        driver.rpc_listen_address(),
        "--keyring-backend".to_string(),
        "test".to_string(),
        "--broadcast-mode".to_string(),
        "sync".to_string(),
        "--output".to_string(),
        "json".to_string(),
        "--yes".to_string(),
    ]
}

/**
   Extract the hash of a transaction accepted into the mempool. A non
   zero code means that `CheckTx` rejected it.
*/
pub fn parse_broadcast_output(output: &str) -> Result<String, Error> {
    let response: json::Value = json::from_str(output.trim())?;

    let tx_hash = response
        .get("txhash")
        .and_then(|hash| hash.as_str())
        .ok_or_else(|| Error::missing_field("txhash".to_string(), "broadcast output".to_string()))?
        .to_string();

    let code = response.get("code").and_then(|code| code.as_u64()).unwrap_or(0);

    if code != 0 {
        let raw_log = response
            .get("raw_log")
            .and_then(|log| log.as_str())
            .unwrap_or_default()
            .to_string();

        return Err(Error::tx_failed(tx_hash, code, raw_log));
    }

    Ok(tx_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn gas_adjustment_enables_simulation() {
        assert_eq!(
            gas_args("0.0025uosmo", 1.3),
            ["--gas-prices", "0.0025uosmo", "--gas", "auto", "--gas-adjustment", "1.3"]
        );
        assert_eq!(
            gas_args("0udym", 0.0),
            ["--gas-prices", "0udym", "--gas", "300000"]
        );
    }

    #[test_log::test]
    fn parses_broadcast_output() {
        assert_eq!(
            parse_broadcast_output(r#"{"height":"0","txhash":"ABCD","code":0,"raw_log":"[]"}"#)
                .unwrap(),
            "ABCD"
        );

        assert!(parse_broadcast_output(
            r#"{"height":"0","txhash":"ABCD","code":13,"raw_log":"insufficient fee"}"#
        )
        .is_err());
    }
}
