//! Clients for the beacon-chain deposit contract.

use alloy::{
    network::{EthereumWallet, ReceiptResponse as _, TransactionBuilder},
    primitives::{Address, B256, Bytes, U256, keccak256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use otter_staking_contracts::IDepositContract;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::{retry::with_retry, types::ValidatorCredentials};

/// External deposit contract the engine forwards allotments to.
///
/// Implementations must report the outcome of a single submission and never resubmit on their
/// own: the contract is not idempotent.
#[async_trait]
pub trait DepositContract: Send + Sync {
    /// Sends `amount` together with the validator's deposit data. Returns the transaction hash.
    async fn deposit(&self, credentials: &ValidatorCredentials, amount: U256) -> Result<B256>;
}

/// Deposit contract reached over JSON-RPC with a local signer.
pub struct RpcDepositContract {
    provider: DynProvider,
    address: Address,
}

impl RpcDepositContract {
    pub async fn connect(rpc_url: &str, signer: PrivateKeySigner, address: Address) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(rpc_url)
            .await
            .wrap_err_with(|| format!("failed to connect to {rpc_url}"))?;

        Ok(Self::new(provider.erased(), address))
    }

    /// Connects without a signer. Only reads such as [`deposit_count`](Self::deposit_count)
    /// succeed on the returned client.
    pub async fn connect_read_only(rpc_url: &str, address: Address) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .wrap_err_with(|| format!("failed to connect to {rpc_url}"))?;

        Ok(Self::new(provider.erased(), address))
    }

    pub const fn new(provider: DynProvider, address: Address) -> Self {
        Self { provider, address }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    /// Number of deposits the contract has accepted so far.
    pub async fn deposit_count(&self) -> Result<u64> {
        let request = TransactionRequest::default()
            .with_to(self.address)
            .with_input(IDepositContract::get_deposit_countCall {}.abi_encode());

        let raw = with_retry("get_deposit_count", || async {
            self.provider
                .call(request.clone())
                .await
                .wrap_err("eth_call get_deposit_count failed")
        })
        .await?;

        let encoded = IDepositContract::get_deposit_countCall::abi_decode_returns(&raw)
            .wrap_err("failed to decode get_deposit_count output")?;
        let count: [u8; 8] = encoded
            .as_ref()
            .try_into()
            .map_err(|_| eyre::eyre!("unexpected deposit count length {}", encoded.len()))?;
        Ok(u64::from_le_bytes(count))
    }
}

#[async_trait]
impl DepositContract for RpcDepositContract {
    async fn deposit(&self, credentials: &ValidatorCredentials, amount: U256) -> Result<B256> {
        let call = IDepositContract::depositCall {
            pubkey: credentials.pubkey.clone(),
            withdrawal_credentials: Bytes::copy_from_slice(
                credentials.withdrawal_credentials.as_slice(),
            ),
            signature: credentials.signature.clone(),
            deposit_data_root: credentials.deposit_data_root,
        };
        let request = TransactionRequest::default()
            .with_to(self.address)
            .with_value(amount)
            .with_input(call.abi_encode());

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .wrap_err("failed to submit deposit transaction")?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, pubkey = %credentials.pubkey, "Deposit transaction submitted");

        let receipt = pending
            .get_receipt()
            .await
            .wrap_err_with(|| format!("failed to fetch receipt for {tx_hash}"))?;
        if !receipt.status() {
            eyre::bail!("deposit transaction {tx_hash} reverted");
        }

        info!(%tx_hash, pubkey = %credentials.pubkey, %amount, "Deposit confirmed");
        Ok(tx_hash)
    }
}

/// Accepts every deposit without touching a chain. Used for simulations.
#[derive(Debug, Default)]
pub struct DryRunDepositContract {
    submitted: AtomicU64,
}

impl DryRunDepositContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DepositContract for DryRunDepositContract {
    async fn deposit(&self, credentials: &ValidatorCredentials, amount: U256) -> Result<B256> {
        let index = self.submitted.fetch_add(1, Ordering::Relaxed);
        let tx_hash = keccak256([&credentials.pubkey[..], index.to_be_bytes().as_slice()].concat());
        info!(%tx_hash, pubkey = %credentials.pubkey, %amount, index, "Dry-run deposit");
        Ok(tx_hash)
    }
}
