/*!
   Methods for managing keys in the test keyring of a chain.
*/

use serde_json as json;

use crate::chain::driver::ChainDriver;
use crate::error::Error;

/// The address and mnemonic of a newly created key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutput {
    pub address: String,
    pub mnemonic: String,
}

pub fn add_key(driver: &ChainDriver, key_name: &str) -> Result<KeyOutput, Error> {
    let coin_type = driver.chain_type.coin_type().to_string();
    let extra_args = driver.chain_type.extra_keys_add_args();

    let mut args = vec![
        "keys",
        "add",
        key_name,
        "--coin-type",
        &coin_type,
        "--keyring-backend",
        "test",
        "--output",
        "json",
    ];
    args.extend(extra_args.iter().map(String::as_str));

    let output = driver.exec(&args)?;

    // Some SDK versions print the new key to stderr.
    parse_key_output(output.output())
}

pub fn show_address(driver: &ChainDriver, key_name: &str) -> Result<String, Error> {
    let output = driver.exec(&[
        "keys",
        "show",
        key_name,
        "-a",
        "--keyring-backend",
        "test",
    ])?;

    Ok(output.stdout.trim().to_string())
}

pub fn parse_key_output(output: &str) -> Result<KeyOutput, Error> {
    let value: json::Value = json::from_str(output.trim())?;

    let field = |name: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .ok_or_else(|| Error::missing_field(name.to_string(), "keys add output".to_string()))
    };

    Ok(KeyOutput {
        address: field("address")?,
        mnemonic: field("mnemonic")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn parses_new_key() {
        let output = r#"{"name":"faucet","type":"local","address":"dym1qqqsyqcyq5rqwzqf","pubkey":"{}","mnemonic":"abandon ability able"}"#;

        let key = parse_key_output(output).unwrap();

        assert_eq!(key.address, "dym1qqqsyqcyq5rqwzqf");
        assert_eq!(key.mnemonic, "abandon ability able");
        assert!(parse_key_output(r#"{"name":"faucet"}"#).is_err());
    }
}
