use shadowlend_cipher::{SharedSecret, decrypt};

use crate::ObligationError;
use crate::state::{ENCRYPTED_STATE_LEN, UserObligation};

/// The three 32-byte slots of an encrypted obligation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Deposit = 0,
    Debt = 1,
    Internal = 2,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Deposit, Slot::Debt, Slot::Internal];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Slot, ObligationError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ObligationError::InvalidSlot(index))
    }

    pub fn byte_range(self) -> std::ops::Range<usize> {
        let start = self.index() * 32;
        start..start + 32
    }
}

/// Strict greater-than on the state nonce.
///
/// `None` means the obligation does not exist yet. A first deposit creates
/// it, so going from absent to any nonce of at least one counts as advanced.
/// Wrapping past `u128::MAX` is not treated as progress.
pub fn has_advanced(before: Option<u128>, after: Option<u128>) -> bool {
    match (before, after) {
        (Some(before), Some(after)) => after > before,
        (None, Some(after)) => after >= 1,
        (_, None) => false,
    }
}

/// Decrypt one slot. Slot `i` was sealed under `nonce + i`.
pub fn decrypt_slot(
    encrypted_state: &[u8; ENCRYPTED_STATE_LEN],
    slot: Slot,
    secret: &SharedSecret,
    nonce: u128,
) -> Result<u64, ObligationError> {
    let mut block = [0u8; 32];
    block.copy_from_slice(&encrypted_state[slot.byte_range()]);
    let lane_nonce = nonce.wrapping_add(slot.index() as u128);
    Ok(decrypt(secret, &block, lane_nonce)?)
}

/// Plaintext view of an obligation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub deposit: u64,
    pub debt: u64,
    pub internal: u64,
}

/// Decrypt all three slots of `obligation` under `nonce`.
pub fn decrypt_position(
    obligation: &UserObligation,
    secret: &SharedSecret,
    nonce: u128,
) -> Result<Position, ObligationError> {
    let slot = |s| decrypt_slot(&obligation.encrypted_state, s, secret, nonce);
    Ok(Position {
        deposit: slot(Slot::Deposit)?,
        debt: slot(Slot::Debt)?,
        internal: slot(Slot::Internal)?,
    })
}
