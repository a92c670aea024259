//! Shadowlend Instruction Codec
//!
//! Byte-exact payloads for the lending program: an 8-byte operation
//! discriminator followed by fixed-width little-endian arguments. Decoding is
//! the strict inverse and performs no semantic validation.
//!
//! | Operation | Args |
//! |---|---|
//! | deposit | u64 offset, u64 amount, [u8;32] pubkey, u128 nonce |
//! | borrow / withdraw / spend | u64 offset, [u8;32] ciphertext, [u8;32] pubkey, u128 nonce |
//! | repay | u64 offset, u64 amount |
//! | liquidate | u64 offset, u64 repay amount, [u8;32] victim pubkey, u128 victim nonce |
//! | *_callback | u8 tag, output, [u8;64] signature |

pub mod accounts;
pub mod builder;
pub mod codec;
pub mod operation;
pub mod wire;

use thiserror::Error;

pub use accounts::{AccountBook, ComputationAccounts, Market, PriceFeeds, ToAccountMetas};
pub use codec::{
    ApprovalOutput, ComputationResult, ConfidentialArgs, DepositArgs, LiquidateArgs,
    LiquidationOutput, ProgramInstruction, Refusal, RepayArgs, SharedState, TransferOutput,
};
pub use operation::Operation;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown operation discriminator {0:?}")]
    UnknownOperation([u8; 8]),

    #[error("malformed instruction: {0}")]
    MalformedInstruction(String),

    #[error("invalid length for `{field}`: expected {expected} bytes, got {actual}")]
    InvalidArgumentLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}
