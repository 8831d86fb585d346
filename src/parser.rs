// src/parser.rs
use alloy::{
    primitives::{Address, U256},
    rpc::types::Log,
    sol,
};
use tracing::{debug, warn};

sol! {
    #[derive(Debug)]
    event Approval(address indexed owner, address indexed spender, uint256 value);
}

/// A decoded, non-zero ERC20 approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalEvent {
    pub token: Address, // emitting contract
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub tx_hash: String,
    pub timestamp: i64, // receipt time, unix seconds
}

impl ApprovalEvent {
    pub fn token_address(&self) -> String {
        lower_hex(&self.token)
    }

    pub fn spender_address(&self) -> String {
        lower_hex(&self.spender)
    }
}

/// Lowercase 0x-prefixed form used as the storage key for addresses
pub fn lower_hex(address: &Address) -> String {
    format!("{address:#x}")
}

/// Decode a raw `Approval` log.
///
/// Returns `None` for logs with missing or short data, logs that do not decode
/// as an ERC20 approval, logs without a transaction hash, and revokes
/// (`value == 0`).
pub fn decode_approval(log: &Log, timestamp: i64) -> Option<ApprovalEvent> {
    if log.inner.data.data.len() < 32 {
        return None;
    }

    let decoded = match log.log_decode::<Approval>() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Failed to decode approval log from {:#x}: {}", log.inner.address, e);
            return None;
        }
    };
    let approval = decoded.inner.data;

    if approval.value.is_zero() {
        debug!("Revoke on {:#x}, skipping", log.inner.address);
        return None;
    }

    let Some(tx_hash) = log.transaction_hash else {
        warn!("Approval log from {:#x} without tx hash", log.inner.address);
        return None;
    };

    Some(ApprovalEvent {
        token: log.inner.address,
        owner: approval.owner,
        spender: approval.spender,
        value: approval.value,
        tx_hash: format!("{tx_hash:#x}"),
        timestamp,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use alloy::{
        primitives::{Address, Bytes, B256, U256},
        rpc::types::Log,
        sol_types::SolEvent,
    };

    use super::Approval;

    pub fn approval_log(token: Address, owner: Address, spender: Address, value: U256, tx: B256) -> Log {
        let topics = vec![Approval::SIGNATURE_HASH, owner.into_word(), spender.into_word()];
        let data = Bytes::from(value.to_be_bytes::<32>().to_vec());
        Log {
            inner: alloy::primitives::Log::new_unchecked(token, topics, data),
            transaction_hash: Some(tx),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Bytes, B256};

    use super::fixtures::approval_log;
    use super::*;

    const TOKEN: Address = Address::repeat_byte(0xAB);
    const OWNER: Address = Address::repeat_byte(0x01);
    const SPENDER: Address = Address::repeat_byte(0x02);

    #[test]
    fn decodes_non_zero_approval() {
        let log = approval_log(TOKEN, OWNER, SPENDER, U256::from(5u64), B256::repeat_byte(0x11));
        let event = decode_approval(&log, 1_700_000_000).expect("decoded");

        assert_eq!(event.owner, OWNER);
        assert_eq!(event.spender, SPENDER);
        assert_eq!(event.value, U256::from(5u64));
        assert_eq!(event.token_address(), format!("0x{}", "ab".repeat(20)));
        assert_eq!(event.tx_hash, format!("0x{}", "11".repeat(32)));
        assert_eq!(event.timestamp, 1_700_000_000);
    }

    #[test]
    fn zero_value_is_a_revoke() {
        let log = approval_log(TOKEN, OWNER, SPENDER, U256::ZERO, B256::repeat_byte(0x11));
        assert!(decode_approval(&log, 0).is_none());
    }

    #[test]
    fn short_data_is_dropped() {
        let mut log = approval_log(TOKEN, OWNER, SPENDER, U256::from(1u64), B256::repeat_byte(0x11));
        log.inner.data = alloy::primitives::LogData::new_unchecked(
            log.inner.data.topics().to_vec(),
            Bytes::from(vec![0u8; 16]),
        );
        assert!(decode_approval(&log, 0).is_none());
    }

    #[test]
    fn missing_indexed_topics_are_dropped() {
        let mut log = approval_log(TOKEN, OWNER, SPENDER, U256::from(1u64), B256::repeat_byte(0x11));
        log.inner.data = alloy::primitives::LogData::new_unchecked(
            log.inner.data.topics()[..1].to_vec(),
            log.inner.data.data.clone(),
        );
        assert!(decode_approval(&log, 0).is_none());
    }

    #[test]
    fn log_without_tx_hash_is_dropped() {
        let mut log = approval_log(TOKEN, OWNER, SPENDER, U256::from(1u64), B256::ZERO);
        log.transaction_hash = None;
        assert!(decode_approval(&log, 0).is_none());
    }
}
