//! MPC network accounts
//!
//! The computation cluster's accounts are owned by the MPC program, not by the
//! lending program. The client never writes them but must name every one of
//! them correctly in each queued instruction.

use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

use crate::{AddressError, DerivedAddress, derive};

/// MPC program ID (devnet)
pub const ARCIUM_PROGRAM_ID: &str = "Arcj82pX7HxYKLR92qvgZUAd7vGS1k4hQvAFcPATFdEQ";

pub const MXE_SEED: &[u8] = b"MXEAccount";
pub const MEMPOOL_SEED: &[u8] = b"Mempool";
pub const EXECPOOL_SEED: &[u8] = b"Execpool";
pub const COMPUTATION_SEED: &[u8] = b"ComputationAccount";
pub const COMP_DEF_SEED: &[u8] = b"ComputationDefinitionAccount";
pub const CLUSTER_SEED: &[u8] = b"Cluster";
pub const FEE_POOL_SEED: &[u8] = b"FeePool";
pub const CLOCK_SEED: &[u8] = b"ClockAccount";

/// Computation definition offset of a circuit: `sha256(name)[0..4]` as LE u32.
pub fn comp_def_offset(circuit: &str) -> u32 {
    let digest = Sha256::digest(circuit.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Address book for the MPC network's accounts serving one lending program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MpcAddresses {
    /// MPC program that owns every account below
    arcium_program_id: Pubkey,
    /// The lending program registered with the MPC network
    mxe_program_id: Pubkey,
    cluster_offset: u32,
}

impl MpcAddresses {
    pub fn new(arcium_program_id: Pubkey, mxe_program_id: Pubkey, cluster_offset: u32) -> Self {
        Self {
            arcium_program_id,
            mxe_program_id,
            cluster_offset,
        }
    }

    pub fn arcium_program_id(&self) -> Pubkey {
        self.arcium_program_id
    }

    pub fn cluster_offset(&self) -> u32 {
        self.cluster_offset
    }

    pub fn mxe(&self) -> Result<DerivedAddress, AddressError> {
        derive(
            &[MXE_SEED, self.mxe_program_id.as_ref()],
            &self.arcium_program_id,
            "mxe",
        )
    }

    pub fn mempool(&self) -> Result<DerivedAddress, AddressError> {
        derive(
            &[MEMPOOL_SEED, &self.cluster_offset.to_le_bytes()],
            &self.arcium_program_id,
            "mempool",
        )
    }

    pub fn execution_pool(&self) -> Result<DerivedAddress, AddressError> {
        derive(
            &[EXECPOOL_SEED, &self.cluster_offset.to_le_bytes()],
            &self.arcium_program_id,
            "execution_pool",
        )
    }

    /// Per-request account; exists once the cluster has accepted the request.
    pub fn computation(&self, computation_offset: u64) -> Result<DerivedAddress, AddressError> {
        derive(
            &[
                COMPUTATION_SEED,
                &self.cluster_offset.to_le_bytes(),
                &computation_offset.to_le_bytes(),
            ],
            &self.arcium_program_id,
            "computation",
        )
    }

    pub fn computation_definition(&self, circuit: &str) -> Result<DerivedAddress, AddressError> {
        derive(
            &[
                COMP_DEF_SEED,
                self.mxe_program_id.as_ref(),
                &comp_def_offset(circuit).to_le_bytes(),
            ],
            &self.arcium_program_id,
            "computation_definition",
        )
    }

    pub fn cluster(&self) -> Result<DerivedAddress, AddressError> {
        derive(
            &[CLUSTER_SEED, &self.cluster_offset.to_le_bytes()],
            &self.arcium_program_id,
            "cluster",
        )
    }

    pub fn fee_pool(&self) -> Result<DerivedAddress, AddressError> {
        derive(&[FEE_POOL_SEED], &self.arcium_program_id, "fee_pool")
    }

    pub fn clock(&self) -> Result<DerivedAddress, AddressError> {
        derive(&[CLOCK_SEED], &self.arcium_program_id, "clock")
    }
}
