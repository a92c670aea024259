//! Async client for the Shadowlend lending program.
//!
//! [`GatewayContext`] owns everything one caller needs (ledger handle,
//! market addresses, key material, polling bounds) and drives each request
//! through submission, computation pickup and callback. The chain is reached
//! only through the [`Ledger`] trait.

pub mod error;
pub mod gateway;
pub mod inflight;
pub mod ledger;
pub mod poll;
pub mod tracker;

pub use error::{GatewayError, LedgerError, ProgramError};
pub use gateway::{GatewayContext, Outcome, Phase, Receipt, Request, Stage, deployment_book};
pub use inflight::{InFlight, InFlightGuard, OffsetAllocator};
pub use ledger::{Ledger, RpcLedger, commitment_config};
pub use poll::PollPolicy;
pub use tracker::ObligationTracker;
