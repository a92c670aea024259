use sha2::{Digest, Sha256};

/// Every instruction the lending program understands.
///
/// The discriminator of an operation is `sha256("global:<name>")[0..8]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Deposit,
    Borrow,
    Withdraw,
    Repay,
    Liquidate,
    Spend,
    DepositCallback,
    BorrowCallback,
    WithdrawCallback,
    RepayCallback,
    LiquidateCallback,
    SpendCallback,
    InitializePool,
    ClosePool,
}

impl Operation {
    pub const ALL: [Operation; 14] = [
        Operation::Deposit,
        Operation::Borrow,
        Operation::Withdraw,
        Operation::Repay,
        Operation::Liquidate,
        Operation::Spend,
        Operation::DepositCallback,
        Operation::BorrowCallback,
        Operation::WithdrawCallback,
        Operation::RepayCallback,
        Operation::LiquidateCallback,
        Operation::SpendCallback,
        Operation::InitializePool,
        Operation::ClosePool,
    ];

    /// The six operations that queue an MPC computation.
    pub const REQUESTS: [Operation; 6] = [
        Operation::Deposit,
        Operation::Borrow,
        Operation::Withdraw,
        Operation::Repay,
        Operation::Liquidate,
        Operation::Spend,
    ];

    /// Instruction name as registered by the program
    pub fn name(self) -> &'static str {
        match self {
            Operation::Deposit => "deposit",
            Operation::Borrow => "borrow",
            Operation::Withdraw => "withdraw",
            Operation::Repay => "repay",
            Operation::Liquidate => "liquidate",
            Operation::Spend => "spend",
            Operation::DepositCallback => "deposit_callback",
            Operation::BorrowCallback => "borrow_callback",
            Operation::WithdrawCallback => "withdraw_callback",
            Operation::RepayCallback => "repay_callback",
            Operation::LiquidateCallback => "liquidate_callback",
            Operation::SpendCallback => "spend_callback",
            Operation::InitializePool => "initialize_pool",
            Operation::ClosePool => "close_pool",
        }
    }

    pub fn discriminator(self) -> [u8; 8] {
        let digest = Sha256::digest(format!("global:{}", self.name()).as_bytes());
        let mut out = [0u8; 8];
        out.copy_from_slice(&digest[..8]);
        out
    }

    pub fn from_discriminator(discriminator: &[u8; 8]) -> Option<Operation> {
        Self::ALL
            .into_iter()
            .find(|op| op.discriminator() == *discriminator)
    }

    /// Circuit (computation definition) the request runs; `None` for
    /// callbacks and administrative instructions.
    pub fn circuit(self) -> Option<&'static str> {
        match self {
            Operation::Deposit
            | Operation::Borrow
            | Operation::Withdraw
            | Operation::Repay
            | Operation::Liquidate
            | Operation::Spend => Some(self.name()),
            _ => None,
        }
    }

    pub fn callback(self) -> Option<Operation> {
        match self {
            Operation::Deposit => Some(Operation::DepositCallback),
            Operation::Borrow => Some(Operation::BorrowCallback),
            Operation::Withdraw => Some(Operation::WithdrawCallback),
            Operation::Repay => Some(Operation::RepayCallback),
            Operation::Liquidate => Some(Operation::LiquidateCallback),
            Operation::Spend => Some(Operation::SpendCallback),
            _ => None,
        }
    }

    /// Whether the amount travels encrypted. Deposit, repay and liquidate
    /// amounts are visible as token transfers anyway and go in the clear.
    pub fn is_confidential(self) -> bool {
        matches!(
            self,
            Operation::Borrow | Operation::Withdraw | Operation::Spend
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
