//! Read-only view of on-ledger obligation and pool records.

use shadowlend_cipher::SharedSecret;
use shadowlend_obligation::{Pool, Position, ProgramAccount, UserObligation, decrypt_position};
use solana_sdk::pubkey::Pubkey;

use crate::error::GatewayError;
use crate::ledger::Ledger;

pub struct ObligationTracker<'a, L> {
    ledger: &'a L,
}

impl<'a, L: Ledger> ObligationTracker<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    pub async fn fetch_obligation(
        &self,
        obligation: &Pubkey,
    ) -> Result<Option<UserObligation>, GatewayError> {
        match self.ledger.account_data(obligation).await? {
            Some(data) => Ok(Some(UserObligation::decode(&data)?)),
            None => Ok(None),
        }
    }

    pub async fn fetch_pool(&self, pool: &Pubkey) -> Result<Option<Pool>, GatewayError> {
        match self.ledger.account_data(pool).await? {
            Some(data) => Ok(Some(Pool::decode(&data)?)),
            None => Ok(None),
        }
    }

    /// Current state nonce, `None` while the obligation does not exist.
    pub async fn observe_nonce(&self, obligation: &Pubkey) -> Result<Option<u128>, GatewayError> {
        let nonce = self
            .fetch_obligation(obligation)
            .await?
            .map(|record| record.state_nonce);
        log::debug!("obligation {obligation} nonce {nonce:?}");
        Ok(nonce)
    }

    /// Fetch and decrypt. `nonce` defaults to the record's own state nonce.
    pub async fn position(
        &self,
        obligation: &Pubkey,
        secret: &SharedSecret,
        nonce: Option<u128>,
    ) -> Result<Option<(UserObligation, Position)>, GatewayError> {
        let Some(record) = self.fetch_obligation(obligation).await? else {
            return Ok(None);
        };
        let position = decrypt_position(&record, secret, nonce.unwrap_or(record.state_nonce))?;
        Ok(Some((record, position)))
    }
}
