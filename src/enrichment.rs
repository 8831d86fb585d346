use alloy::primitives::Address;
use eyre::{Result, WrapErr};
use tracing::{debug, info};

use crate::{
    db::{self, SharedConn},
    models::{NewToken, Token},
    parser::lower_hex,
    rpc::ChainReader,
};

/// Stored token for `token`, creating it from chain data on first sighting.
///
/// The database is checked again right before the insert, and the insert
/// itself ignores an address that appeared meanwhile, so concurrent sightings
/// of one token end up sharing a single row.
pub async fn ensure_token<C: ChainReader>(
    conn: &SharedConn,
    chain: &C,
    token: Address,
) -> Result<Token> {
    let address = lower_hex(&token);

    let existing = {
        let db = db::lock(conn)?;
        db::find_token_by_address(&db, &address)?
    };
    if let Some(existing) = existing {
        return Ok(existing);
    }

    let name = chain
        .token_name(token)
        .await
        .wrap_err_with(|| format!("name() failed for {address}"))?;
    let deployer_address = chain
        .deployer_address(token)
        .await
        .wrap_err_with(|| format!("deployer lookup failed for {address}"))?;
    let pair_address = chain
        .pair_address(token)
        .await
        .wrap_err_with(|| format!("pair lookup failed for {address}"))?;

    let db = db::lock(conn)?;
    if let Some(existing) = db::find_token_by_address(&db, &address)? {
        debug!("Token {} was stored while enriching, reusing it", address);
        return Ok(existing);
    }

    let stored = db::insert_token_if_absent(
        &db,
        &NewToken {
            address: address.clone(),
            name,
            deployer_address,
            pair_address,
            trading_enabled: true,
        },
    )?;
    info!("🆕 New token {} ({}) deployer={}", stored.name, stored.address, stored.deployer_address);

    Ok(stored)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy::primitives::Address;
    use eyre::{eyre, Result};

    use crate::rpc::ChainReader;

    /// In-memory chain that yields between calls so concurrent callers interleave
    #[derive(Default)]
    pub struct FakeChain {
        pub name_calls: AtomicUsize,
        pub fail_names: bool,
    }

    impl ChainReader for FakeChain {
        async fn token_name(&self, _token: Address) -> Result<String> {
            self.name_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_names {
                return Err(eyre!("execution reverted"));
            }
            Ok("Pepe".to_string())
        }

        async fn deployer_address(&self, _token: Address) -> Result<String> {
            tokio::task::yield_now().await;
            Ok("0xdeployer".to_string())
        }

        async fn pair_address(&self, _token: Address) -> Result<String> {
            tokio::task::yield_now().await;
            Ok("0xpair".to_string())
        }
    }
}
