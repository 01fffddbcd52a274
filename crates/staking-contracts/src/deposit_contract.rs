alloy_sol_types::sol! {
    /// Beacon chain deposit contract.
    ///
    /// Every call must carry exactly 32 ETH for a fresh validator. The contract is not
    /// idempotent: calling it twice with the same pubkey locks a second 32 ETH.
    #[derive(Debug, PartialEq, Eq)]
    interface IDepositContract {
        function deposit(
            bytes calldata pubkey,
            bytes calldata withdrawal_credentials,
            bytes calldata signature,
            bytes32 deposit_data_root
        ) external payable;

        /// Little-endian encoded `uint64` deposit count
        function get_deposit_count() external view returns (bytes memory);

        event DepositEvent(bytes pubkey, bytes withdrawal_credentials, bytes amount, bytes signature, bytes index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, Bytes};
    use alloy_sol_types::SolCall;

    #[test]
    fn test_deposit_call_encoding() {
        let call = IDepositContract::depositCall {
            pubkey: Bytes::from(vec![0xaa; 48]),
            withdrawal_credentials: Bytes::from(vec![0x01; 32]),
            signature: Bytes::from(vec![0xbb; 96]),
            deposit_data_root: B256::repeat_byte(0xcc),
        };
        let encoded = call.abi_encode();
        assert_eq!(&encoded[..4], IDepositContract::depositCall::SELECTOR.as_slice());

        let decoded = IDepositContract::depositCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.pubkey.len(), 48);
        assert_eq!(decoded.deposit_data_root, B256::repeat_byte(0xcc));
    }
}
