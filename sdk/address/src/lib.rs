//! Shadowlend Address Derivation
//!
//! Every account the lending program touches is a program-derived address
//! (PDA): a fixed seed recipe hashed together with a program identifier and
//! searched downwards over a bump byte until the result lies off the ed25519
//! curve. Nothing here performs I/O.
//!
//! ```text
//! Lending program                      MPC program
//! ──────────────────────────────       ─────────────────────────────────────────
//! pool             ["pool_v2"]         mxe          ["MXEAccount", program]
//! collateral vault ["collateral_vault", pool]       mempool ["Mempool", cluster]
//! borrow vault     ["borrow_vault", pool]           execpool ["Execpool", cluster]
//! obligation       ["obligation", user, pool]       computation ["ComputationAccount", cluster, offset]
//! signer           ["ArciumSignerAccount"]          comp def ["ComputationDefinitionAccount", program, def]
//!                                                   cluster ["Cluster", cluster]
//!                                                   fee pool ["FeePool"], clock ["ClockAccount"]
//! ```

pub mod arcium;

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub use arcium::{ARCIUM_PROGRAM_ID, MpcAddresses, comp_def_offset};

/// Deployed Shadowlend program ID (devnet)
pub const SHADOWLEND_PROGRAM_ID: &str = "CiCw5JPuC7oHRvEzhcmKYYBmYDVSUZxQG4hHMAarPUvE";

pub const POOL_SEED: &[u8] = b"pool_v2";
pub const COLLATERAL_VAULT_SEED: &[u8] = b"collateral_vault";
pub const BORROW_VAULT_SEED: &[u8] = b"borrow_vault";
pub const OBLIGATION_SEED: &[u8] = b"obligation";
pub const SIGNER_SEED: &[u8] = b"ArciumSignerAccount";

pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::from_str_const("11111111111111111111111111111111");
pub const TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ATokenGPvbdGVxr1b2hvZbsiqW5xWRwoTkPdWcaRwpKx");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address derivation failed for `{recipe}`: no off-curve bump found")]
    AddressDerivationFailed { recipe: &'static str },

    #[error("invalid program id `{0}`")]
    InvalidProgramId(String),
}

/// A program-derived address together with the bump that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DerivedAddress {
    pub address: Pubkey,
    pub bump: u8,
}

impl DerivedAddress {
    pub fn pubkey(&self) -> Pubkey {
        self.address
    }
}

/// Derive a PDA from an ordered seed list.
///
/// `recipe` names the logical account and is only used for error reporting.
pub fn derive(
    seeds: &[&[u8]],
    program_id: &Pubkey,
    recipe: &'static str,
) -> Result<DerivedAddress, AddressError> {
    Pubkey::try_find_program_address(seeds, program_id)
        .map(|(address, bump)| DerivedAddress { address, bump })
        .ok_or(AddressError::AddressDerivationFailed { recipe })
}

/// Parse a base58 program identifier.
pub fn parse_program_id(value: &str) -> Result<Pubkey, AddressError> {
    Pubkey::from_str(value).map_err(|_| AddressError::InvalidProgramId(value.to_string()))
}

/// Address book for accounts owned by the lending program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolAddresses {
    program_id: Pubkey,
}

impl ProtocolAddresses {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// The single lending pool
    pub fn pool(&self) -> Result<DerivedAddress, AddressError> {
        derive(&[POOL_SEED], &self.program_id, "pool")
    }

    pub fn collateral_vault(&self, pool: &Pubkey) -> Result<DerivedAddress, AddressError> {
        derive(
            &[COLLATERAL_VAULT_SEED, pool.as_ref()],
            &self.program_id,
            "collateral_vault",
        )
    }

    pub fn borrow_vault(&self, pool: &Pubkey) -> Result<DerivedAddress, AddressError> {
        derive(
            &[BORROW_VAULT_SEED, pool.as_ref()],
            &self.program_id,
            "borrow_vault",
        )
    }

    /// One obligation per (user, pool) pair
    pub fn obligation(&self, user: &Pubkey, pool: &Pubkey) -> Result<DerivedAddress, AddressError> {
        derive(
            &[OBLIGATION_SEED, user.as_ref(), pool.as_ref()],
            &self.program_id,
            "obligation",
        )
    }

    /// Signer PDA the program uses when queueing computations
    pub fn signer(&self) -> Result<DerivedAddress, AddressError> {
        derive(&[SIGNER_SEED], &self.program_id, "signer")
    }
}

/// Associated token account of `wallet` for `mint` under the classic token program.
pub fn associated_token_account(
    wallet: &Pubkey,
    mint: &Pubkey,
) -> Result<DerivedAddress, AddressError> {
    derive(
        &[wallet.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
        "associated_token_account",
    )
}
