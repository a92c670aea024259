//! Shadowlend Obligation State
//!
//! Read-side view of the lending program's accounts. The ledger is the only
//! writer; this crate decodes what it stores, tells whether a callback has
//! landed by comparing state nonces, and decrypts the confidential slots of
//! an obligation for its owner.

pub mod state;
pub mod tracker;

use shadowlend_cipher::CipherError;
use thiserror::Error;

pub use state::{ENCRYPTED_STATE_LEN, Pool, ProgramAccount, UserObligation, account_discriminator};
pub use tracker::{Position, Slot, decrypt_position, decrypt_slot, has_advanced};

#[derive(Debug, Error)]
pub enum ObligationError {
    #[error("account data too short: {0} bytes")]
    AccountTooShort(usize),

    #[error("account is not a {0}")]
    InvalidDiscriminator(&'static str),

    #[error("account decode failed: {0}")]
    Decode(String),

    #[error("no slot at index {0}")]
    InvalidSlot(usize),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}
