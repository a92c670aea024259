//! Typed per-operation account lists.
//!
//! Each request names its accounts through a struct instead of a loose list,
//! so a missing account does not compile. [`ToAccountMetas`] flattens them
//! in the order the program declares them. Deposit, withdraw and spend put
//! the computation block right after the payer; borrow, repay and liquidate
//! name the pool and obligation first.

use shadowlend_address::{
    ASSOCIATED_TOKEN_PROGRAM_ID, AddressError, MpcAddresses, ProtocolAddresses, SYSTEM_PROGRAM_ID,
    TOKEN_PROGRAM_ID, associated_token_account,
};
use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

pub trait ToAccountMetas {
    fn to_account_metas(&self) -> Vec<AccountMeta>;
}

/// One lending market as recorded at deployment time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Market {
    pub pool: Pubkey,
    pub collateral_mint: Pubkey,
    pub borrow_mint: Pubkey,
    pub collateral_vault: Pubkey,
    pub borrow_vault: Pubkey,
}

/// Price update accounts read by the health checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceFeeds {
    pub sol_price_update: Pubkey,
    pub usdc_price_update: Pubkey,
}

impl PriceFeeds {
    fn push_metas(&self, metas: &mut Vec<AccountMeta>) {
        metas.extend([
            AccountMeta::new_readonly(self.sol_price_update, false),
            AccountMeta::new_readonly(self.usdc_price_update, false),
        ]);
    }
}

/// Accounts every queued computation must name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComputationAccounts {
    pub sign_pda: Pubkey,
    pub mxe: Pubkey,
    pub mempool: Pubkey,
    pub execution_pool: Pubkey,
    pub computation: Pubkey,
    pub computation_definition: Pubkey,
    pub cluster: Pubkey,
    pub fee_pool: Pubkey,
    pub clock: Pubkey,
    pub arcium_program: Pubkey,
}

impl ComputationAccounts {
    pub fn derive(
        protocol: &ProtocolAddresses,
        mpc: &MpcAddresses,
        circuit: &str,
        computation_offset: u64,
    ) -> Result<Self, AddressError> {
        Ok(Self {
            sign_pda: protocol.signer()?.address,
            mxe: mpc.mxe()?.address,
            mempool: mpc.mempool()?.address,
            execution_pool: mpc.execution_pool()?.address,
            computation: mpc.computation(computation_offset)?.address,
            computation_definition: mpc.computation_definition(circuit)?.address,
            cluster: mpc.cluster()?.address,
            fee_pool: mpc.fee_pool()?.address,
            clock: mpc.clock()?.address,
            arcium_program: mpc.arcium_program_id(),
        })
    }

    fn push_metas(&self, metas: &mut Vec<AccountMeta>) {
        metas.extend([
            AccountMeta::new(self.sign_pda, false),
            AccountMeta::new_readonly(self.mxe, false),
            AccountMeta::new(self.mempool, false),
            AccountMeta::new(self.execution_pool, false),
            AccountMeta::new(self.computation, false),
            AccountMeta::new_readonly(self.computation_definition, false),
            AccountMeta::new(self.cluster, false),
            AccountMeta::new(self.fee_pool, false),
            AccountMeta::new(self.clock, false),
        ]);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositAccounts {
    pub payer: Pubkey,
    pub computation: ComputationAccounts,
    pub pool: Pubkey,
    pub obligation: Pubkey,
    pub collateral_mint: Pubkey,
    pub user_token_account: Pubkey,
    pub collateral_vault: Pubkey,
}

impl ToAccountMetas for DepositAccounts {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        let mut metas = vec![AccountMeta::new(self.payer, true)];
        self.computation.push_metas(&mut metas);
        metas.extend([
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.obligation, false),
            AccountMeta::new_readonly(self.collateral_mint, false),
            AccountMeta::new(self.user_token_account, false),
            AccountMeta::new(self.collateral_vault, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(self.computation.arcium_program, false),
        ]);
        metas
    }
}

/// Borrow only queues a computation; tokens move in the callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BorrowAccounts {
    pub payer: Pubkey,
    pub pool: Pubkey,
    pub obligation: Pubkey,
    pub computation: ComputationAccounts,
    pub feeds: PriceFeeds,
}

impl ToAccountMetas for BorrowAccounts {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        let mut metas = vec![
            AccountMeta::new(self.payer, true),
            AccountMeta::new_readonly(self.pool, false),
            AccountMeta::new(self.obligation, false),
        ];
        self.computation.push_metas(&mut metas);
        self.feeds.push_metas(&mut metas);
        metas.extend([
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(self.computation.arcium_program, false),
        ]);
        metas
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawAccounts {
    pub payer: Pubkey,
    pub computation: ComputationAccounts,
    pub pool: Pubkey,
    pub obligation: Pubkey,
    pub collateral_mint: Pubkey,
    pub user_token_account: Pubkey,
    pub collateral_vault: Pubkey,
}

impl ToAccountMetas for WithdrawAccounts {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        let mut metas = vec![AccountMeta::new(self.payer, true)];
        self.computation.push_metas(&mut metas);
        metas.extend([
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.obligation, false),
            AccountMeta::new_readonly(self.collateral_mint, false),
            AccountMeta::new(self.user_token_account, false),
            AccountMeta::new(self.collateral_vault, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(self.computation.arcium_program, false),
        ]);
        metas
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepayAccounts {
    pub payer: Pubkey,
    pub pool: Pubkey,
    pub obligation: Pubkey,
    pub borrow_mint: Pubkey,
    pub user_token_account: Pubkey,
    pub borrow_vault: Pubkey,
    pub computation: ComputationAccounts,
}

impl ToAccountMetas for RepayAccounts {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        let mut metas = vec![
            AccountMeta::new(self.payer, true),
            AccountMeta::new_readonly(self.pool, false),
            AccountMeta::new(self.obligation, false),
            AccountMeta::new_readonly(self.borrow_mint, false),
            AccountMeta::new(self.user_token_account, false),
            AccountMeta::new(self.borrow_vault, false),
        ];
        self.computation.push_metas(&mut metas);
        metas.extend([
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(self.computation.arcium_program, false),
        ]);
        metas
    }
}

/// `payer` is the liquidator; `obligation` belongs to the victim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidateAccounts {
    pub payer: Pubkey,
    pub pool: Pubkey,
    pub obligation: Pubkey,
    pub computation: ComputationAccounts,
    pub borrow_mint: Pubkey,
    pub borrow_vault: Pubkey,
    pub liquidator_token_account: Pubkey,
    pub feeds: PriceFeeds,
}

impl ToAccountMetas for LiquidateAccounts {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        let mut metas = vec![
            AccountMeta::new(self.payer, true),
            AccountMeta::new_readonly(self.pool, false),
            AccountMeta::new(self.obligation, false),
        ];
        self.computation.push_metas(&mut metas);
        metas.extend([
            AccountMeta::new_readonly(self.borrow_mint, false),
            AccountMeta::new(self.borrow_vault, false),
            AccountMeta::new(self.liquidator_token_account, false),
        ]);
        self.feeds.push_metas(&mut metas);
        metas.extend([
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(self.computation.arcium_program, false),
        ]);
        metas
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpendAccounts {
    pub payer: Pubkey,
    pub computation: ComputationAccounts,
    pub pool: Pubkey,
    pub obligation: Pubkey,
    pub destination_token_account: Pubkey,
    pub borrow_vault: Pubkey,
}

impl ToAccountMetas for SpendAccounts {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        let mut metas = vec![AccountMeta::new(self.payer, true)];
        self.computation.push_metas(&mut metas);
        metas.extend([
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.obligation, false),
            AccountMeta::new(self.destination_token_account, false),
            AccountMeta::new(self.borrow_vault, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(self.computation.arcium_program, false),
        ]);
        metas
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitializePoolAccounts {
    pub authority: Pubkey,
    pub pool: Pubkey,
    pub collateral_mint: Pubkey,
    pub borrow_mint: Pubkey,
    pub collateral_vault: Pubkey,
    pub borrow_vault: Pubkey,
}

impl ToAccountMetas for InitializePoolAccounts {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.authority, true),
            AccountMeta::new(self.pool, false),
            AccountMeta::new_readonly(self.collateral_mint, false),
            AccountMeta::new_readonly(self.borrow_mint, false),
            AccountMeta::new(self.collateral_vault, false),
            AccountMeta::new(self.borrow_vault, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClosePoolAccounts {
    pub authority: Pubkey,
    pub pool: Pubkey,
}

impl ToAccountMetas for ClosePoolAccounts {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.authority, true),
            AccountMeta::new(self.pool, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ]
    }
}

/// Resolves the typed account list of each operation for one market.
#[derive(Clone, Copy, Debug)]
pub struct AccountBook {
    pub protocol: ProtocolAddresses,
    pub mpc: MpcAddresses,
    pub market: Market,
    pub feeds: PriceFeeds,
}

impl AccountBook {
    pub fn new(
        protocol: ProtocolAddresses,
        mpc: MpcAddresses,
        market: Market,
        feeds: PriceFeeds,
    ) -> Self {
        Self {
            protocol,
            mpc,
            market,
            feeds,
        }
    }

    pub fn obligation(&self, user: &Pubkey) -> Result<Pubkey, AddressError> {
        Ok(self.protocol.obligation(user, &self.market.pool)?.address)
    }

    fn computation(&self, circuit: &str, offset: u64) -> Result<ComputationAccounts, AddressError> {
        ComputationAccounts::derive(&self.protocol, &self.mpc, circuit, offset)
    }

    pub fn deposit(&self, payer: Pubkey, offset: u64) -> Result<DepositAccounts, AddressError> {
        Ok(DepositAccounts {
            payer,
            computation: self.computation("deposit", offset)?,
            pool: self.market.pool,
            obligation: self.obligation(&payer)?,
            collateral_mint: self.market.collateral_mint,
            user_token_account: associated_token_account(&payer, &self.market.collateral_mint)?
                .address,
            collateral_vault: self.market.collateral_vault,
        })
    }

    pub fn borrow(&self, payer: Pubkey, offset: u64) -> Result<BorrowAccounts, AddressError> {
        Ok(BorrowAccounts {
            payer,
            pool: self.market.pool,
            obligation: self.obligation(&payer)?,
            computation: self.computation("borrow", offset)?,
            feeds: self.feeds,
        })
    }

    pub fn withdraw(&self, payer: Pubkey, offset: u64) -> Result<WithdrawAccounts, AddressError> {
        Ok(WithdrawAccounts {
            payer,
            computation: self.computation("withdraw", offset)?,
            pool: self.market.pool,
            obligation: self.obligation(&payer)?,
            collateral_mint: self.market.collateral_mint,
            user_token_account: associated_token_account(&payer, &self.market.collateral_mint)?
                .address,
            collateral_vault: self.market.collateral_vault,
        })
    }

    pub fn repay(&self, payer: Pubkey, offset: u64) -> Result<RepayAccounts, AddressError> {
        Ok(RepayAccounts {
            payer,
            pool: self.market.pool,
            obligation: self.obligation(&payer)?,
            borrow_mint: self.market.borrow_mint,
            user_token_account: associated_token_account(&payer, &self.market.borrow_mint)?
                .address,
            borrow_vault: self.market.borrow_vault,
            computation: self.computation("repay", offset)?,
        })
    }

    pub fn liquidate(
        &self,
        liquidator: Pubkey,
        victim: &Pubkey,
        offset: u64,
    ) -> Result<LiquidateAccounts, AddressError> {
        Ok(LiquidateAccounts {
            payer: liquidator,
            pool: self.market.pool,
            obligation: self.obligation(victim)?,
            computation: self.computation("liquidate", offset)?,
            borrow_mint: self.market.borrow_mint,
            borrow_vault: self.market.borrow_vault,
            liquidator_token_account: associated_token_account(
                &liquidator,
                &self.market.borrow_mint,
            )?
            .address,
            feeds: self.feeds,
        })
    }

    pub fn spend(
        &self,
        payer: Pubkey,
        destination_token_account: Pubkey,
        offset: u64,
    ) -> Result<SpendAccounts, AddressError> {
        Ok(SpendAccounts {
            payer,
            computation: self.computation("spend", offset)?,
            pool: self.market.pool,
            obligation: self.obligation(&payer)?,
            destination_token_account,
            borrow_vault: self.market.borrow_vault,
        })
    }

    pub fn initialize_pool(&self, authority: Pubkey) -> InitializePoolAccounts {
        InitializePoolAccounts {
            authority,
            pool: self.market.pool,
            collateral_mint: self.market.collateral_mint,
            borrow_mint: self.market.borrow_mint,
            collateral_vault: self.market.collateral_vault,
            borrow_vault: self.market.borrow_vault,
        }
    }

    pub fn close_pool(&self, authority: Pubkey) -> ClosePoolAccounts {
        ClosePoolAccounts {
            authority,
            pool: self.market.pool,
        }
    }
}
