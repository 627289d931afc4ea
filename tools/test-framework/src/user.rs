/*!
   Creation of funded user wallets on running chains.
*/

use ibc_relayer_types::applications::transfer::amount::Amount;
use tracing::{debug, info};

use crate::chain::handle::{DynChain, FAUCET_ACCOUNT_KEY_NAME};
use crate::error::Error;
use crate::ibc::denom::Denom;
use crate::types::wallet::{Wallet, WalletAmount};
use crate::util::random::random_string;

/// Blocks to wait after funding, so that the funds are visible to queries.
pub const FUNDING_WAIT_BLOCKS: u64 = 5;

/**
   Create one wallet per chain, named `<key_prefix>-<chain id>-<random>`,
   and fund it with `amount` of the native denom of the chain from the
   faucet account.

   The wallets are returned in the order of `chains`.
*/
pub fn get_and_fund_test_users(
    key_prefix: &str,
    amount: impl Into<Amount>,
    chains: &[DynChain],
) -> Result<Vec<Wallet>, Error> {
    let amount = amount.into();

    let wallets = chains
        .iter()
        .map(|chain| {
            let config = chain.config();
            let key_name = format!("{}-{}-{}", key_prefix, config.chain_id, random_string(3));

            let wallet = chain.create_wallet(&key_name)?;

            debug!(
                "funding user {} on chain {} with {}{}",
                wallet.address, config.chain_id, amount, config.denom
            );

            chain.send_funds(
                FAUCET_ACCOUNT_KEY_NAME,
                &WalletAmount::new(wallet.address.clone(), Denom::base(&config.denom), amount),
            )?;

            Ok(wallet)
        })
        .collect::<Result<Vec<_>, Error>>()?;

    for chain in chains {
        chain.wait_for_blocks(FUNDING_WAIT_BLOCKS)?;
    }

    info!("funded {} test users with {} each", wallets.len(), amount);

    Ok(wallets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::builtin::{dymension, osmosis};
    use crate::chain::handle::ChainHandle;
    use crate::mock::MockNetwork;

    #[test_log::test]
    fn funds_one_user_per_chain() {
        let network = MockNetwork::new();
        let chains: Vec<DynChain> = vec![
            network.add_chain(dymension()),
            network.add_chain(osmosis()),
        ];

        for chain in chains.iter() {
            chain.start("funds_one_user_per_chain", &[]).unwrap();
        }

        let height = chains[0].height().unwrap();
        let users = get_and_fund_test_users("default", 10_000_000u64, &chains).unwrap();

        assert_eq!(users.len(), 2);
        assert!(users[0].key_name.starts_with("default-dymension_100-1-"));
        assert!(users[1].address.as_str().starts_with("osmo1"));

        assert_eq!(
            chains[1].get_balance(users[1].address.as_str(), "uosmo").unwrap(),
            Amount::from(10_000_000u64)
        );

        assert!(chains[0].height().unwrap() >= height + FUNDING_WAIT_BLOCKS);
    }

    #[test_log::test]
    fn funding_requires_started_chains() {
        let network = MockNetwork::new();
        let chains: Vec<DynChain> = vec![network.add_chain(osmosis())];

        assert!(get_and_fund_test_users("default", 1u64, &chains).is_err());
    }
}
