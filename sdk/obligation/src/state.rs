use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

use crate::ObligationError;

/// Size of the encrypted obligation record: three 32-byte slots.
pub const ENCRYPTED_STATE_LEN: usize = 96;

/// Account discriminator: `sha256("account:<TypeName>")[0..8]`.
pub fn account_discriminator(type_name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("account:{type_name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Accounts owned by the lending program: a discriminator, then borsh.
pub trait ProgramAccount: BorshDeserialize + BorshSerialize {
    const TYPE_NAME: &'static str;

    /// Decode raw account data. Anchor may allocate more space than the
    /// fields need, so trailing bytes are ignored.
    fn decode(data: &[u8]) -> Result<Self, ObligationError> {
        if data.len() < 8 {
            return Err(ObligationError::AccountTooShort(data.len()));
        }
        let (discriminator, mut body) = data.split_at(8);
        if discriminator != account_discriminator(Self::TYPE_NAME) {
            return Err(ObligationError::InvalidDiscriminator(Self::TYPE_NAME));
        }
        Self::deserialize(&mut body).map_err(|e| ObligationError::Decode(e.to_string()))
    }

    fn encode(&self) -> Result<Vec<u8>, ObligationError> {
        let mut out = account_discriminator(Self::TYPE_NAME).to_vec();
        self.serialize(&mut out)
            .map_err(|e| ObligationError::Decode(e.to_string()))?;
        Ok(out)
    }
}

/// A user's confidential position within one pool.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UserObligation {
    pub user: [u8; 32],
    pub pool: [u8; 32],
    pub encrypted_state: [u8; ENCRYPTED_STATE_LEN],
    pub state_commitment: [u8; 32],
    /// Advanced by exactly one on every accepted callback
    pub state_nonce: u128,
    pub is_initialized: bool,
    pub bump: u8,
}

impl ProgramAccount for UserObligation {
    const TYPE_NAME: &'static str = "UserObligation";
}

impl UserObligation {
    pub fn user(&self) -> Pubkey {
        Pubkey::new_from_array(self.user)
    }

    pub fn pool(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool)
    }
}

/// Global configuration of one lending market.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Pool {
    pub authority: [u8; 32],
    pub collateral_mint: [u8; 32],
    pub borrow_mint: [u8; 32],
    pub encrypted_pool_state: Vec<u8>,
    pub pool_state_commitment: [u8; 32],
    /// basis points
    pub ltv: u16,
    pub liquidation_threshold: u16,
    pub liquidation_bonus: u16,
    pub fixed_borrow_rate: u64,
    pub total_deposits: u64,
    pub total_borrows: u64,
    pub vault_nonce: u128,
    pub last_update_ts: i64,
    pub bump: u8,
}

impl ProgramAccount for Pool {
    const TYPE_NAME: &'static str = "Pool";
}

impl Pool {
    pub fn authority(&self) -> Pubkey {
        Pubkey::new_from_array(self.authority)
    }

    pub fn collateral_mint(&self) -> Pubkey {
        Pubkey::new_from_array(self.collateral_mint)
    }

    pub fn borrow_mint(&self) -> Pubkey {
        Pubkey::new_from_array(self.borrow_mint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obligation(nonce: u128) -> UserObligation {
        UserObligation {
            user: [1u8; 32],
            pool: [2u8; 32],
            encrypted_state: [3u8; ENCRYPTED_STATE_LEN],
            state_commitment: [4u8; 32],
            state_nonce: nonce,
            is_initialized: true,
            bump: 254,
        }
    }

    #[test]
    fn discriminators_match_anchor() {
        assert_eq!(
            account_discriminator("UserObligation"),
            [82, 43, 188, 33, 64, 224, 73, 242]
        );
        assert_eq!(
            account_discriminator("Pool"),
            [241, 154, 109, 4, 17, 177, 109, 188]
        );
    }

    #[test]
    fn obligation_layout() {
        let data = obligation(3).encode().unwrap();
        assert_eq!(data.len(), 8 + 32 + 32 + 96 + 32 + 16 + 1 + 1);
        // nonce sits after the commitment, little-endian
        assert_eq!(&data[200..216], &3u128.to_le_bytes());
    }

    #[test]
    fn decode_tolerates_padding() {
        let mut data = obligation(9).encode().unwrap();
        data.extend_from_slice(&[0u8; 64]);
        assert_eq!(UserObligation::decode(&data).unwrap().state_nonce, 9);
    }

    #[test]
    fn wrong_account_type_is_rejected() {
        let data = obligation(1).encode().unwrap();
        assert!(matches!(
            Pool::decode(&data),
            Err(ObligationError::InvalidDiscriminator("Pool"))
        ));
        assert!(matches!(
            UserObligation::decode(&data[..4]),
            Err(ObligationError::AccountTooShort(4))
        ));
    }

    #[test]
    fn truncated_body_is_a_decode_error() {
        let data = obligation(1).encode().unwrap();
        assert!(matches!(
            UserObligation::decode(&data[..100]),
            Err(ObligationError::Decode(_))
        ));
    }

    #[test]
    fn pool_with_encrypted_blob() {
        let pool = Pool {
            authority: [1u8; 32],
            collateral_mint: [2u8; 32],
            borrow_mint: [3u8; 32],
            encrypted_pool_state: vec![9u8; 64],
            pool_state_commitment: [0u8; 32],
            ltv: 7_500,
            liquidation_threshold: 8_000,
            liquidation_bonus: 500,
            fixed_borrow_rate: 500,
            total_deposits: 1_000,
            total_borrows: 400,
            vault_nonce: 0,
            last_update_ts: 1_700_000_000,
            bump: 255,
        };
        let decoded = Pool::decode(&pool.encode().unwrap()).unwrap();
        assert_eq!(decoded, pool);
        assert_eq!(decoded.borrow_mint(), Pubkey::new_from_array([3u8; 32]));
    }
}
