//! Pairs each payload with its own account list.

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::accounts::*;
use crate::codec::*;

fn instruction(
    program_id: Pubkey,
    accounts: &impl ToAccountMetas,
    payload: ProgramInstruction,
) -> Instruction {
    log::debug!(
        "building {} instruction for program {program_id}",
        payload.operation()
    );
    Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: payload.encode(),
    }
}

pub fn deposit(program_id: Pubkey, accounts: &DepositAccounts, args: DepositArgs) -> Instruction {
    instruction(program_id, accounts, ProgramInstruction::Deposit(args))
}

pub fn borrow(program_id: Pubkey, accounts: &BorrowAccounts, args: ConfidentialArgs) -> Instruction {
    instruction(program_id, accounts, ProgramInstruction::Borrow(args))
}

pub fn withdraw(
    program_id: Pubkey,
    accounts: &WithdrawAccounts,
    args: ConfidentialArgs,
) -> Instruction {
    instruction(program_id, accounts, ProgramInstruction::Withdraw(args))
}

pub fn repay(program_id: Pubkey, accounts: &RepayAccounts, args: RepayArgs) -> Instruction {
    instruction(program_id, accounts, ProgramInstruction::Repay(args))
}

pub fn liquidate(
    program_id: Pubkey,
    accounts: &LiquidateAccounts,
    args: LiquidateArgs,
) -> Instruction {
    instruction(program_id, accounts, ProgramInstruction::Liquidate(args))
}

pub fn spend(program_id: Pubkey, accounts: &SpendAccounts, args: ConfidentialArgs) -> Instruction {
    instruction(program_id, accounts, ProgramInstruction::Spend(args))
}

pub fn initialize_pool(
    program_id: Pubkey,
    accounts: &InitializePoolAccounts,
    ltv_bps: u16,
    liquidation_threshold_bps: u16,
) -> Instruction {
    instruction(
        program_id,
        accounts,
        ProgramInstruction::InitializePool {
            ltv_bps,
            liquidation_threshold_bps,
        },
    )
}

pub fn close_pool(program_id: Pubkey, accounts: &ClosePoolAccounts) -> Instruction {
    instruction(program_id, accounts, ProgramInstruction::ClosePool)
}
