//! Well-known role identifiers.

use alloy_primitives::{B256, keccak256};
use std::sync::LazyLock;

/// Administrative role. Holders may grant and revoke every other role and update pool weights.
pub const DEFAULT_ADMIN_ROLE: B256 = B256::ZERO;

/// Role a pool must hold (for its own pool scope) before the validator registry lets it
/// onboard validators.
pub static NETWORK_POOL_ROLE: LazyLock<B256> =
    LazyLock::new(|| keccak256("STADER_NETWORK_POOL"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_distinct() {
        assert_ne!(*NETWORK_POOL_ROLE, DEFAULT_ADMIN_ROLE);
        assert_eq!(*NETWORK_POOL_ROLE, keccak256(b"STADER_NETWORK_POOL"));
    }
}
