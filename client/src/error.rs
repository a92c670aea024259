use shadowlend_address::AddressError;
use shadowlend_cipher::CipherError;
use shadowlend_instruction::CodecError;
use shadowlend_obligation::ObligationError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// First custom error code of an Anchor program.
const ANCHOR_ERROR_OFFSET: u32 = 6000;

/// Errors raised by the lending program, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("invalid amount")]
    InvalidAmount,
    #[error("computation aborted")]
    AbortedComputation,
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    #[error("borrow not approved")]
    BorrowNotApproved,
    #[error("withdraw not approved")]
    WithdrawNotApproved,
    #[error("math overflow")]
    MathOverflow,
    #[error("cluster not set")]
    ClusterNotSet,
    #[error("invalid mint")]
    InvalidMint,
    #[error("unauthorized")]
    Unauthorized,
}

impl ProgramError {
    const ALL: [ProgramError; 9] = [
        ProgramError::InvalidAmount,
        ProgramError::AbortedComputation,
        ProgramError::InsufficientLiquidity,
        ProgramError::BorrowNotApproved,
        ProgramError::WithdrawNotApproved,
        ProgramError::MathOverflow,
        ProgramError::ClusterNotSet,
        ProgramError::InvalidMint,
        ProgramError::Unauthorized,
    ];

    pub fn code(self) -> u32 {
        ANCHOR_ERROR_OFFSET + self as u32
    }

    pub fn from_code(code: u32) -> Option<ProgramError> {
        let index = code.checked_sub(ANCHOR_ERROR_OFFSET)?;
        Self::ALL.get(index as usize).copied()
    }
}

/// Pull a custom program error code out of an RPC or transaction error
/// message. Understands both `custom program error: 0x1771` and the
/// `Custom(6001)` debug form.
pub fn custom_error_code(message: &str) -> Option<u32> {
    if let Some(pos) = message.find("custom program error: 0x") {
        let hex: String = message[pos + "custom program error: 0x".len()..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        return u32::from_str_radix(&hex, 16).ok();
    }
    if let Some(pos) = message.find("Custom(") {
        let digits: String = message[pos + "Custom(".len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        return digits.parse().ok();
    }
    None
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transport or node failure; says nothing about the request itself.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The ledger executed and refused the transaction.
    #[error("transaction failed: {message}")]
    TransactionFailed {
        message: String,
        custom_code: Option<u32>,
    },
}

impl LedgerError {
    /// Classify a raw client error message.
    pub fn from_message(message: String) -> Self {
        let custom_code = custom_error_code(&message);
        let executed = custom_code.is_some()
            || message.contains("Error processing Instruction")
            || message.contains("InstructionError")
            || message.contains("simulation failed");
        if executed {
            LedgerError::TransactionFailed {
                message,
                custom_code,
            }
        } else {
            LedgerError::Rpc(message)
        }
    }

    pub fn program_error(&self) -> Option<ProgramError> {
        match self {
            LedgerError::TransactionFailed {
                custom_code: Some(code),
                ..
            } => ProgramError::from_code(*code),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A request for this obligation is still in flight.
    #[error("obligation {0} already has an operation in flight")]
    ObligationBusy(Pubkey),

    /// The caller built its request against a nonce the ledger has moved past.
    #[error("stale nonce for obligation {obligation}: expected {expected}, ledger has {actual:?}")]
    StaleNonce {
        obligation: Pubkey,
        expected: u128,
        actual: Option<u128>,
    },

    #[error("os randomness unavailable: {0}")]
    Randomness(String),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Obligation(#[from] ObligationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
