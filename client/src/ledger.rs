//! The ledger seam.
//!
//! Everything the gateway needs from the chain goes through [`Ledger`]: send
//! a transaction, read an account, ask whether a transaction touching an
//! account has failed, and read back the instructions that landed on it.
//! [`RpcLedger`] talks to a real node; tests script one.

use std::future::Future;
use std::str::FromStr;

use log::debug;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use solana_transaction_status::{UiInstruction, UiTransactionEncoding};

use crate::error::LedgerError;

pub trait Ledger: Send + Sync {
    /// Sign with `payer`, send, and wait for confirmation.
    fn submit(
        &self,
        instructions: &[Instruction],
        payer: &Keypair,
    ) -> impl Future<Output = Result<Signature, LedgerError>> + Send;

    /// Raw account data, `None` if the account does not exist.
    fn account_data(
        &self,
        address: &Pubkey,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, LedgerError>> + Send;

    /// Error text of the most recent failed transaction that touched
    /// `address`, if there is one.
    fn failed_transaction(
        &self,
        address: &Pubkey,
    ) -> impl Future<Output = Result<Option<String>, LedgerError>> + Send;

    /// Data of every instruction addressed to `program_id`, top-level or
    /// inner, in the successful transactions that touched `address`. Newest
    /// transaction first.
    fn program_instructions(
        &self,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> impl Future<Output = Result<Vec<Vec<u8>>, LedgerError>> + Send;
}

pub struct RpcLedger {
    rpc: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcLedger {
    pub fn new(rpc_url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }
}

/// Map the configured commitment level onto the RPC one.
pub fn commitment_config(level: shadowlend_config::Commitment) -> CommitmentConfig {
    match level {
        shadowlend_config::Commitment::Processed => CommitmentConfig::processed(),
        shadowlend_config::Commitment::Confirmed => CommitmentConfig::confirmed(),
        shadowlend_config::Commitment::Finalized => CommitmentConfig::finalized(),
    }
}

impl Ledger for RpcLedger {
    async fn submit(
        &self,
        instructions: &[Instruction],
        payer: &Keypair,
    ) -> Result<Signature, LedgerError> {
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerError::Rpc(format!("failed to get blockhash: {e}")))?;

        let tx = Transaction::new_signed_with_payer(
            instructions,
            Some(&payer.pubkey()),
            &[payer],
            blockhash,
        );

        self.rpc
            .send_and_confirm_transaction(&tx)
            .await
            .map_err(|e| LedgerError::from_message(e.to_string()))
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn failed_transaction(&self, address: &Pubkey) -> Result<Option<String>, LedgerError> {
        let statuses = self
            .rpc
            .get_signatures_for_address(address)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        // newest first
        Ok(statuses.into_iter().find_map(|status| {
            status
                .err
                .map(|err| format!("{} failed: {err:?}", status.signature))
        }))
    }

    async fn program_instructions(
        &self,
        address: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<Vec<u8>>, LedgerError> {
        let statuses = self
            .rpc
            .get_signatures_for_address(address)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        let mut found = Vec::new();
        for status in statuses.into_iter().filter(|s| s.err.is_none()) {
            let signature = Signature::from_str(&status.signature)
                .map_err(|e| LedgerError::Rpc(format!("bad signature {}: {e}", status.signature)))?;
            let tx = self
                .rpc
                .get_transaction_with_config(
                    &signature,
                    RpcTransactionConfig {
                        encoding: Some(UiTransactionEncoding::Base64),
                        commitment: Some(self.commitment),
                        max_supported_transaction_version: Some(0),
                    },
                )
                .await
                .map_err(|e| LedgerError::Rpc(e.to_string()))?;

            let Some(versioned) = tx.transaction.transaction.decode() else {
                debug!("skipping undecodable transaction {signature}");
                continue;
            };
            let keys = versioned.message.static_account_keys();
            let addressed = |index: u8| keys.get(index as usize) == Some(program_id);

            for ix in versioned.message.instructions() {
                if addressed(ix.program_id_index) {
                    found.push(ix.data.clone());
                }
            }

            let inner = tx
                .transaction
                .meta
                .and_then(|meta| Option::<Vec<_>>::from(meta.inner_instructions))
                .unwrap_or_default();
            for ix in inner.into_iter().flat_map(|group| group.instructions) {
                if let UiInstruction::Compiled(ix) = ix {
                    if addressed(ix.program_id_index) {
                        let data = bs58::decode(&ix.data)
                            .into_vec()
                            .map_err(|e| LedgerError::Rpc(format!("bad inner instruction data: {e}")))?;
                        found.push(data);
                    }
                }
            }
        }
        Ok(found)
    }
}
