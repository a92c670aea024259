use crate::wire::{Reader, WireFormat, put_bool, put_u8, put_u16, put_u64, put_u128};
use crate::{CodecError, Operation};

/// Width of an encrypted amount on the wire.
pub const ENCRYPTED_AMOUNT_LEN: usize = 32;
/// Width of the cluster's signature over a computation output.
pub const CLUSTER_SIGNATURE_LEN: usize = 64;

/// `deposit` arguments. The amount is public: it moves through a visible
/// vault transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositArgs {
    pub computation_offset: u64,
    pub amount: u64,
    pub user_pubkey: [u8; 32],
    pub user_nonce: u128,
}

impl WireFormat for DepositArgs {
    const LEN: usize = 8 + 8 + 32 + 16;

    fn write(&self, out: &mut Vec<u8>) {
        put_u64(out, self.computation_offset);
        put_u64(out, self.amount);
        out.extend_from_slice(&self.user_pubkey);
        put_u128(out, self.user_nonce);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            computation_offset: r.u64()?,
            amount: r.u64()?,
            user_pubkey: r.array()?,
            user_nonce: r.u128()?,
        })
    }
}

/// Arguments shared by `borrow`, `withdraw` and `spend`: the amount only
/// travels encrypted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfidentialArgs {
    pub computation_offset: u64,
    pub encrypted_amount: [u8; ENCRYPTED_AMOUNT_LEN],
    pub user_pubkey: [u8; 32],
    pub user_nonce: u128,
}

impl ConfidentialArgs {
    /// Build from untrusted slices, checking each fixed width.
    pub fn from_parts(
        computation_offset: u64,
        encrypted_amount: &[u8],
        user_pubkey: &[u8],
        user_nonce: u128,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            computation_offset,
            encrypted_amount: crate::wire::fixed("encrypted_amount", encrypted_amount)?,
            user_pubkey: crate::wire::fixed("user_pubkey", user_pubkey)?,
            user_nonce,
        })
    }
}

impl WireFormat for ConfidentialArgs {
    const LEN: usize = 8 + ENCRYPTED_AMOUNT_LEN + 32 + 16;

    fn write(&self, out: &mut Vec<u8>) {
        put_u64(out, self.computation_offset);
        out.extend_from_slice(&self.encrypted_amount);
        out.extend_from_slice(&self.user_pubkey);
        put_u128(out, self.user_nonce);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            computation_offset: r.u64()?,
            encrypted_amount: r.array()?,
            user_pubkey: r.array()?,
            user_nonce: r.u128()?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepayArgs {
    pub computation_offset: u64,
    pub amount: u64,
}

impl WireFormat for RepayArgs {
    const LEN: usize = 16;

    fn write(&self, out: &mut Vec<u8>) {
        put_u64(out, self.computation_offset);
        put_u64(out, self.amount);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            computation_offset: r.u64()?,
            amount: r.u64()?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidateArgs {
    pub computation_offset: u64,
    pub repay_amount: u64,
    pub victim_pubkey: [u8; 32],
    pub victim_nonce: u128,
}

impl WireFormat for LiquidateArgs {
    const LEN: usize = 8 + 8 + 32 + 16;

    fn write(&self, out: &mut Vec<u8>) {
        put_u64(out, self.computation_offset);
        put_u64(out, self.repay_amount);
        out.extend_from_slice(&self.victim_pubkey);
        put_u128(out, self.victim_nonce);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            computation_offset: r.u64()?,
            repay_amount: r.u64()?,
            victim_pubkey: r.array()?,
            victim_nonce: r.u128()?,
        })
    }
}

/// Re-encrypted obligation state returned by the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SharedState {
    pub encryption_key: [u8; 32],
    pub nonce: u128,
    /// deposit, debt, internal balance
    pub ciphertexts: [[u8; 32]; 3],
}

impl WireFormat for SharedState {
    const LEN: usize = 32 + 16 + 3 * 32;

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.encryption_key);
        put_u128(out, self.nonce);
        for ciphertext in &self.ciphertexts {
            out.extend_from_slice(ciphertext);
        }
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            encryption_key: r.array()?,
            nonce: r.u128()?,
            ciphertexts: [r.array()?, r.array()?, r.array()?],
        })
    }
}

/// Borrow verdict
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApprovalOutput {
    pub state: SharedState,
    pub approved: bool,
}

impl WireFormat for ApprovalOutput {
    const LEN: usize = SharedState::LEN + 1;

    fn write(&self, out: &mut Vec<u8>) {
        self.state.write(out);
        put_bool(out, self.approved);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            state: SharedState::read(r)?,
            approved: r.bool()?,
        })
    }
}

/// Withdraw and spend verdicts reveal the amount that leaves the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferOutput {
    pub state: SharedState,
    pub approved: bool,
    pub amount: u64,
}

impl WireFormat for TransferOutput {
    const LEN: usize = SharedState::LEN + 1 + 8;

    fn write(&self, out: &mut Vec<u8>) {
        self.state.write(out);
        put_bool(out, self.approved);
        put_u64(out, self.amount);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            state: SharedState::read(r)?,
            approved: r.bool()?,
            amount: r.u64()?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidationOutput {
    pub state: SharedState,
    pub liquidatable: bool,
    pub seized_collateral: u64,
    pub repaid_amount: u64,
}

impl WireFormat for LiquidationOutput {
    const LEN: usize = SharedState::LEN + 1 + 8 + 8;

    fn write(&self, out: &mut Vec<u8>) {
        self.state.write(out);
        put_bool(out, self.liquidatable);
        put_u64(out, self.seized_collateral);
        put_u64(out, self.repaid_amount);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            state: SharedState::read(r)?,
            liquidatable: r.bool()?,
            seized_collateral: r.u64()?,
            repaid_amount: r.u64()?,
        })
    }
}

/// Tagged union the cluster hands to every callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComputationResult<T> {
    Success {
        output: T,
        signature: [u8; CLUSTER_SIGNATURE_LEN],
    },
    Failure,
}

const RESULT_SUCCESS: u8 = 0;
const RESULT_FAILURE: u8 = 1;

impl<T: WireFormat> ComputationResult<T> {
    fn write(&self, out: &mut Vec<u8>) {
        match self {
            ComputationResult::Success { output, signature } => {
                put_u8(out, RESULT_SUCCESS);
                output.write(out);
                out.extend_from_slice(signature);
            }
            ComputationResult::Failure => put_u8(out, RESULT_FAILURE),
        }
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        match r.u8()? {
            RESULT_SUCCESS => Ok(ComputationResult::Success {
                output: T::read(r)?,
                signature: r.array()?,
            }),
            RESULT_FAILURE => Ok(ComputationResult::Failure),
            tag => Err(CodecError::MalformedInstruction(format!(
                "unknown computation result tag {tag}"
            ))),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ComputationResult::Success { .. })
    }
}

/// Why a callback did not apply its request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refusal {
    /// The cluster aborted the computation.
    Aborted,
    /// The circuit ran and its check failed: health factor for borrow,
    /// withdraw and spend, a healthy position for liquidate.
    Declined,
}

/// A decoded instruction payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramInstruction {
    Deposit(DepositArgs),
    Borrow(ConfidentialArgs),
    Withdraw(ConfidentialArgs),
    Repay(RepayArgs),
    Liquidate(LiquidateArgs),
    Spend(ConfidentialArgs),
    DepositCallback(ComputationResult<SharedState>),
    BorrowCallback(ComputationResult<ApprovalOutput>),
    WithdrawCallback(ComputationResult<TransferOutput>),
    RepayCallback(ComputationResult<SharedState>),
    LiquidateCallback(ComputationResult<LiquidationOutput>),
    SpendCallback(ComputationResult<TransferOutput>),
    InitializePool {
        ltv_bps: u16,
        liquidation_threshold_bps: u16,
    },
    ClosePool,
}

impl ProgramInstruction {
    pub fn operation(&self) -> Operation {
        match self {
            ProgramInstruction::Deposit(_) => Operation::Deposit,
            ProgramInstruction::Borrow(_) => Operation::Borrow,
            ProgramInstruction::Withdraw(_) => Operation::Withdraw,
            ProgramInstruction::Repay(_) => Operation::Repay,
            ProgramInstruction::Liquidate(_) => Operation::Liquidate,
            ProgramInstruction::Spend(_) => Operation::Spend,
            ProgramInstruction::DepositCallback(_) => Operation::DepositCallback,
            ProgramInstruction::BorrowCallback(_) => Operation::BorrowCallback,
            ProgramInstruction::WithdrawCallback(_) => Operation::WithdrawCallback,
            ProgramInstruction::RepayCallback(_) => Operation::RepayCallback,
            ProgramInstruction::LiquidateCallback(_) => Operation::LiquidateCallback,
            ProgramInstruction::SpendCallback(_) => Operation::SpendCallback,
            ProgramInstruction::InitializePool { .. } => Operation::InitializePool,
            ProgramInstruction::ClosePool => Operation::ClosePool,
        }
    }

    /// Discriminator followed by the fixed-order arguments.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 256);
        out.extend_from_slice(&self.operation().discriminator());

        match self {
            ProgramInstruction::Deposit(args) => args.write(&mut out),
            ProgramInstruction::Borrow(args)
            | ProgramInstruction::Withdraw(args)
            | ProgramInstruction::Spend(args) => args.write(&mut out),
            ProgramInstruction::Repay(args) => args.write(&mut out),
            ProgramInstruction::Liquidate(args) => args.write(&mut out),
            ProgramInstruction::DepositCallback(result)
            | ProgramInstruction::RepayCallback(result) => result.write(&mut out),
            ProgramInstruction::BorrowCallback(result) => result.write(&mut out),
            ProgramInstruction::WithdrawCallback(result)
            | ProgramInstruction::SpendCallback(result) => result.write(&mut out),
            ProgramInstruction::LiquidateCallback(result) => result.write(&mut out),
            ProgramInstruction::InitializePool {
                ltv_bps,
                liquidation_threshold_bps,
            } => {
                put_u16(&mut out, *ltv_bps);
                put_u16(&mut out, *liquidation_threshold_bps);
            }
            ProgramInstruction::ClosePool => {}
        }
        out
    }

    /// Strict inverse of [`encode`](Self::encode). Does no semantic checks.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(data);
        let discriminator: [u8; 8] = r.array()?;
        let operation = Operation::from_discriminator(&discriminator)
            .ok_or(CodecError::UnknownOperation(discriminator))?;

        let ix = match operation {
            Operation::Deposit => ProgramInstruction::Deposit(DepositArgs::read(&mut r)?),
            Operation::Borrow => ProgramInstruction::Borrow(ConfidentialArgs::read(&mut r)?),
            Operation::Withdraw => ProgramInstruction::Withdraw(ConfidentialArgs::read(&mut r)?),
            Operation::Repay => ProgramInstruction::Repay(RepayArgs::read(&mut r)?),
            Operation::Liquidate => ProgramInstruction::Liquidate(LiquidateArgs::read(&mut r)?),
            Operation::Spend => ProgramInstruction::Spend(ConfidentialArgs::read(&mut r)?),
            Operation::DepositCallback => {
                ProgramInstruction::DepositCallback(ComputationResult::read(&mut r)?)
            }
            Operation::BorrowCallback => {
                ProgramInstruction::BorrowCallback(ComputationResult::read(&mut r)?)
            }
            Operation::WithdrawCallback => {
                ProgramInstruction::WithdrawCallback(ComputationResult::read(&mut r)?)
            }
            Operation::RepayCallback => {
                ProgramInstruction::RepayCallback(ComputationResult::read(&mut r)?)
            }
            Operation::LiquidateCallback => {
                ProgramInstruction::LiquidateCallback(ComputationResult::read(&mut r)?)
            }
            Operation::SpendCallback => {
                ProgramInstruction::SpendCallback(ComputationResult::read(&mut r)?)
            }
            Operation::InitializePool => ProgramInstruction::InitializePool {
                ltv_bps: r.u16()?,
                liquidation_threshold_bps: r.u16()?,
            },
            Operation::ClosePool => ProgramInstruction::ClosePool,
        };

        r.finish()?;
        Ok(ix)
    }

    /// How a callback said no: `None` for an approving callback and for
    /// anything that is not a callback.
    pub fn refusal(&self) -> Option<Refusal> {
        fn verdict<T>(result: &ComputationResult<T>, approved: impl Fn(&T) -> bool) -> Option<Refusal> {
            match result {
                ComputationResult::Failure => Some(Refusal::Aborted),
                ComputationResult::Success { output, .. } if !approved(output) => {
                    Some(Refusal::Declined)
                }
                ComputationResult::Success { .. } => None,
            }
        }

        match self {
            ProgramInstruction::DepositCallback(r) | ProgramInstruction::RepayCallback(r) => {
                verdict(r, |_| true)
            }
            ProgramInstruction::BorrowCallback(r) => verdict(r, |o| o.approved),
            ProgramInstruction::WithdrawCallback(r) | ProgramInstruction::SpendCallback(r) => {
                verdict(r, |o| o.approved)
            }
            ProgramInstruction::LiquidateCallback(r) => verdict(r, |o| o.liquidatable),
            _ => None,
        }
    }

    /// Computation offset carried by a request, if any.
    pub fn computation_offset(&self) -> Option<u64> {
        match self {
            ProgramInstruction::Deposit(a) => Some(a.computation_offset),
            ProgramInstruction::Borrow(a)
            | ProgramInstruction::Withdraw(a)
            | ProgramInstruction::Spend(a) => Some(a.computation_offset),
            ProgramInstruction::Repay(a) => Some(a.computation_offset),
            ProgramInstruction::Liquidate(a) => Some(a.computation_offset),
            _ => None,
        }
    }
}
