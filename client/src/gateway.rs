//! Drives one request from assembly to a terminal state.
//!
//! ```text
//! Building -> Submitted -> AwaitingComputationPickup -> AwaitingCallback
//!                                                      -> Finalized | TimedOut | Rejected
//! ```
//!
//! The only completion signal is the obligation's state nonce moving past
//! the value seen just before submission. A callback that lands without
//! moving it, because the computation aborted or its check said no, ends
//! the run as `Rejected`. Running out of attempts yields `TimedOut`; the
//! request may still land later, so the offset is burned and a retry must go
//! through `execute` again.

use std::fmt;

use log::{debug, info, warn};
use shadowlend_address::{MpcAddresses, ProtocolAddresses};
use shadowlend_cipher::{KeyMaterial, SharedSecret, encrypt, random_nonce};
use shadowlend_config::{Deployment, GatewayConfig};
use shadowlend_instruction::codec::{ConfidentialArgs, DepositArgs, LiquidateArgs, RepayArgs};
use shadowlend_instruction::{
    AccountBook, Market, Operation, PriceFeeds, ProgramInstruction, Refusal, builder,
};
use shadowlend_obligation::has_advanced;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};

use crate::error::{GatewayError, LedgerError, ProgramError};
use crate::inflight::{InFlight, OffsetAllocator};
use crate::ledger::Ledger;
use crate::poll::{PollPolicy, poll};
use crate::tracker::ObligationTracker;

/// A request as the caller states it, before any encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    Deposit {
        amount: u64,
    },
    Borrow {
        amount: u64,
    },
    Withdraw {
        amount: u64,
    },
    Repay {
        amount: u64,
    },
    /// `victim_key` is the x25519 public key the victim's state is
    /// re-encrypted to.
    Liquidate {
        victim: Pubkey,
        repay_amount: u64,
        victim_key: [u8; 32],
    },
    Spend {
        amount: u64,
        destination: Pubkey,
    },
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::Deposit { .. } => Operation::Deposit,
            Request::Borrow { .. } => Operation::Borrow,
            Request::Withdraw { .. } => Operation::Withdraw,
            Request::Repay { .. } => Operation::Repay,
            Request::Liquidate { .. } => Operation::Liquidate,
            Request::Spend { .. } => Operation::Spend,
        }
    }

    /// Owner of the obligation this request changes.
    pub fn target_user(&self, payer: &Pubkey) -> Pubkey {
        match self {
            Request::Liquidate { victim, .. } => *victim,
            _ => *payer,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Building,
    Submitted,
    AwaitingComputationPickup,
    AwaitingCallback,
    Finalized,
    TimedOut,
    Rejected,
}

/// Which wait ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Pickup,
    Callback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Pickup => f.write_str("computation pickup"),
            Stage::Callback => f.write_str("callback"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The state nonce advanced to `nonce`.
    Finalized { nonce: u128 },
    /// Gave up waiting. The computation may still complete.
    TimedOut { stage: Stage },
    /// The ledger or cluster refused the request. `reason` is the external
    /// system's own error text.
    Rejected {
        reason: String,
        program_error: Option<ProgramError>,
    },
}

impl Outcome {
    pub fn phase(&self) -> Phase {
        match self {
            Outcome::Finalized { .. } => Phase::Finalized,
            Outcome::TimedOut { .. } => Phase::TimedOut,
            Outcome::Rejected { .. } => Phase::Rejected,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Outcome::Finalized { .. })
    }
}

/// Everything known about one run once it reached a terminal state.
#[derive(Clone, Debug)]
pub struct Receipt {
    pub operation: Operation,
    pub computation_offset: u64,
    /// `None` when the transaction never landed.
    pub signature: Option<Signature>,
    pub obligation: Pubkey,
    pub nonce_before: Option<u128>,
    pub outcome: Outcome,
    /// The callback the cluster delivered, with its verdict and any revealed
    /// amounts. `None` if it was not seen.
    pub callback: Option<ProgramInstruction>,
    /// Phases entered, in order, ending with the terminal one.
    pub phases: Vec<Phase>,
}

/// Account book for a recorded deployment on a given cluster.
pub fn deployment_book(
    deployment: &Deployment,
    arcium_program_id: Pubkey,
    cluster_offset: u32,
    feeds: PriceFeeds,
) -> AccountBook {
    AccountBook::new(
        ProtocolAddresses::new(deployment.program_id),
        MpcAddresses::new(arcium_program_id, deployment.program_id, cluster_offset),
        Market {
            pool: deployment.pool,
            collateral_mint: deployment.collateral_mint,
            borrow_mint: deployment.borrow_mint,
            collateral_vault: deployment.collateral_vault,
            borrow_vault: deployment.borrow_vault,
        },
        feeds,
    )
}

/// What one look during the callback wait saw.
enum Landing {
    Advanced(u128),
    Failed(String),
    Refused(ProgramInstruction, Refusal),
}

fn refusal_outcome(operation: Operation, refusal: Refusal) -> Outcome {
    match refusal {
        Refusal::Aborted => Outcome::Rejected {
            reason: format!("{operation}: computation aborted by the cluster"),
            program_error: Some(ProgramError::AbortedComputation),
        },
        Refusal::Declined => {
            let (reason, program_error) = match operation {
                Operation::Borrow => ("health check failed", Some(ProgramError::BorrowNotApproved)),
                Operation::Withdraw | Operation::Spend => {
                    ("health check failed", Some(ProgramError::WithdrawNotApproved))
                }
                Operation::Liquidate => ("position is not liquidatable", None),
                _ => ("declined by the cluster", None),
            };
            Outcome::Rejected {
                reason: format!("{operation}: {reason}"),
                program_error,
            }
        }
    }
}

/// Explicit per-caller context: ledger handle, market addresses, key
/// material and polling bounds. Nothing here is global; construct one and
/// pass it by reference.
pub struct GatewayContext<L> {
    ledger: L,
    book: AccountBook,
    keys: KeyMaterial,
    secret: SharedSecret,
    pickup: PollPolicy,
    callback: PollPolicy,
    in_flight: InFlight,
    offsets: OffsetAllocator,
}

impl<L: Ledger> GatewayContext<L> {
    /// Fails with `InvalidPublicKey` if `cluster_public` is unusable.
    pub fn new(
        ledger: L,
        book: AccountBook,
        keys: KeyMaterial,
        cluster_public: &[u8; 32],
        gateway: &GatewayConfig,
    ) -> Result<Self, GatewayError> {
        let secret = keys.shared_secret(cluster_public)?;
        Ok(Self {
            ledger,
            book,
            keys,
            secret,
            pickup: PollPolicy::pickup(gateway),
            callback: PollPolicy::callback(gateway),
            in_flight: InFlight::new(),
            offsets: OffsetAllocator::new(),
        })
    }

    /// Context for a recorded deployment on a given cluster.
    #[allow(clippy::too_many_arguments)]
    pub fn for_deployment(
        ledger: L,
        deployment: &Deployment,
        arcium_program_id: Pubkey,
        cluster_offset: u32,
        feeds: PriceFeeds,
        keys: KeyMaterial,
        cluster_public: &[u8; 32],
        gateway: &GatewayConfig,
    ) -> Result<Self, GatewayError> {
        let book = deployment_book(deployment, arcium_program_id, cluster_offset, feeds);
        Self::new(ledger, book, keys, cluster_public, gateway)
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn book(&self) -> &AccountBook {
        &self.book
    }

    pub fn shared_secret(&self) -> &SharedSecret {
        &self.secret
    }

    pub fn user_public_key(&self) -> [u8; 32] {
        self.keys.public_key()
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn offsets(&self) -> &OffsetAllocator {
        &self.offsets
    }

    pub fn tracker(&self) -> ObligationTracker<'_, L> {
        ObligationTracker::new(&self.ledger)
    }

    pub fn with_policies(mut self, pickup: PollPolicy, callback: PollPolicy) -> Self {
        self.pickup = pickup;
        self.callback = callback;
        self
    }

    pub async fn execute(&self, payer: &Keypair, request: Request) -> Result<Receipt, GatewayError> {
        self.run(payer, request, None).await
    }

    /// Like [`execute`](Self::execute), but refuses to submit unless the
    /// obligation still carries `expected_nonce`.
    pub async fn execute_with_nonce(
        &self,
        payer: &Keypair,
        request: Request,
        expected_nonce: u128,
    ) -> Result<Receipt, GatewayError> {
        self.run(payer, request, Some(expected_nonce)).await
    }

    async fn run(
        &self,
        payer: &Keypair,
        request: Request,
        expected_nonce: Option<u128>,
    ) -> Result<Receipt, GatewayError> {
        let operation = request.operation();
        let obligation = self.book.obligation(&request.target_user(&payer.pubkey()))?;
        let _guard = self.in_flight.acquire(obligation)?;
        let mut phases = vec![Phase::Building];

        let nonce_before = self.tracker().observe_nonce(&obligation).await?;
        if let Some(expected) = expected_nonce.filter(|e| nonce_before != Some(*e)) {
            warn!("{operation}: obligation {obligation} moved to {nonce_before:?}, expected {expected}");
            return Err(GatewayError::StaleNonce {
                obligation,
                expected,
                actual: nonce_before,
            });
        }

        let computation_offset = self.offsets.next()?;
        let instruction = self.build(payer.pubkey(), &request, computation_offset)?;
        let computation = self.book.mpc.computation(computation_offset)?.address;
        info!("{operation}: offset {computation_offset}, obligation {obligation}, nonce {nonce_before:?}");

        let mut receipt = Receipt {
            operation,
            computation_offset,
            signature: None,
            obligation,
            nonce_before,
            outcome: Outcome::TimedOut {
                stage: Stage::Pickup,
            },
            callback: None,
            phases: Vec::new(),
        };

        let signature = match self.ledger.submit(&[instruction], payer).await {
            Ok(signature) => signature,
            Err(err @ LedgerError::TransactionFailed { .. }) => {
                let outcome = Outcome::Rejected {
                    program_error: err.program_error(),
                    reason: err.to_string(),
                };
                warn!("{operation}: rejected at submission: {err}");
                phases.push(Phase::Rejected);
                receipt.outcome = outcome;
                receipt.phases = phases;
                return Ok(receipt);
            }
            Err(err) => return Err(err.into()),
        };
        phases.push(Phase::Submitted);
        receipt.signature = Some(signature);
        info!("{operation}: submitted {signature}");

        phases.push(Phase::AwaitingComputationPickup);
        let picked_up = poll(self.pickup, "pickup", move |_| async move {
            if self.ledger.account_data(&computation).await?.is_some() {
                return Ok::<_, GatewayError>(Some(()));
            }
            // fast callbacks can beat the first look at the computation account
            let now = self.tracker().observe_nonce(&obligation).await?;
            Ok(has_advanced(nonce_before, now).then_some(()))
        })
        .await?;

        let outcome = if picked_up.is_none() {
            Outcome::TimedOut {
                stage: Stage::Pickup,
            }
        } else {
            debug!("{operation}: computation {computation} picked up");
            phases.push(Phase::AwaitingCallback);
            let landing = poll(self.callback, "callback", move |_| async move {
                let now = self.tracker().observe_nonce(&obligation).await?;
                if has_advanced(nonce_before, now) {
                    return Ok::<_, GatewayError>(now.map(Landing::Advanced));
                }
                if let Some(reason) = self.ledger.failed_transaction(&computation).await? {
                    return Ok(Some(Landing::Failed(reason)));
                }
                // a refusing callback succeeds without touching the nonce
                Ok(self
                    .landed_callback(operation, &computation)
                    .await?
                    .and_then(|callback| {
                        let refusal = callback.refusal()?;
                        Some(Landing::Refused(callback, refusal))
                    }))
            })
            .await?;

            match landing {
                Some(Landing::Advanced(nonce)) => {
                    receipt.callback = match self.landed_callback(operation, &computation).await {
                        Ok(callback) => callback,
                        Err(e) => {
                            warn!("{operation}: finalized but could not read the callback: {e}");
                            None
                        }
                    };
                    Outcome::Finalized { nonce }
                }
                Some(Landing::Failed(reason)) => Outcome::Rejected {
                    program_error: crate::error::custom_error_code(&reason)
                        .and_then(ProgramError::from_code),
                    reason,
                },
                Some(Landing::Refused(callback, refusal)) => {
                    receipt.callback = Some(callback);
                    refusal_outcome(operation, refusal)
                }
                None => Outcome::TimedOut {
                    stage: Stage::Callback,
                },
            }
        };

        match &outcome {
            Outcome::Finalized { nonce } => info!("{operation}: finalized at nonce {nonce}"),
            Outcome::TimedOut { stage } => {
                warn!("{operation}: timed out waiting for {stage}; offset {computation_offset} is spent")
            }
            Outcome::Rejected { reason, .. } => warn!("{operation}: rejected: {reason}"),
        }
        phases.push(outcome.phase());
        receipt.outcome = outcome;
        receipt.phases = phases;
        Ok(receipt)
    }

    /// The newest callback for `operation` that landed on `computation`.
    async fn landed_callback(
        &self,
        operation: Operation,
        computation: &Pubkey,
    ) -> Result<Option<ProgramInstruction>, GatewayError> {
        let Some(expected) = operation.callback() else {
            return Ok(None);
        };
        let program_id = self.book.protocol.program_id();
        for data in self.ledger.program_instructions(computation, &program_id).await? {
            match ProgramInstruction::decode(&data) {
                Ok(ix) if ix.operation() == expected => return Ok(Some(ix)),
                Ok(_) => {}
                Err(e) => debug!("{operation}: skipping instruction on {computation}: {e}"),
            }
        }
        Ok(None)
    }

    fn build(
        &self,
        payer: Pubkey,
        request: &Request,
        computation_offset: u64,
    ) -> Result<Instruction, GatewayError> {
        let program_id = self.book.protocol.program_id();
        let user_pubkey = self.keys.public_key();

        let instruction = match *request {
            Request::Deposit { amount } => builder::deposit(
                program_id,
                &self.book.deposit(payer, computation_offset)?,
                DepositArgs {
                    computation_offset,
                    amount,
                    user_pubkey,
                    user_nonce: random_nonce(),
                },
            ),
            Request::Repay { amount } => builder::repay(
                program_id,
                &self.book.repay(payer, computation_offset)?,
                RepayArgs {
                    computation_offset,
                    amount,
                },
            ),
            Request::Borrow { amount } => builder::borrow(
                program_id,
                &self.book.borrow(payer, computation_offset)?,
                self.confidential(computation_offset, amount)?,
            ),
            Request::Withdraw { amount } => builder::withdraw(
                program_id,
                &self.book.withdraw(payer, computation_offset)?,
                self.confidential(computation_offset, amount)?,
            ),
            Request::Spend {
                amount,
                destination,
            } => builder::spend(
                program_id,
                &self.book.spend(payer, destination, computation_offset)?,
                self.confidential(computation_offset, amount)?,
            ),
            Request::Liquidate {
                victim,
                repay_amount,
                victim_key,
            } => builder::liquidate(
                program_id,
                &self.book.liquidate(payer, &victim, computation_offset)?,
                LiquidateArgs {
                    computation_offset,
                    repay_amount,
                    victim_pubkey: victim_key,
                    victim_nonce: random_nonce(),
                },
            ),
        };
        Ok(instruction)
    }

    /// Seal `amount` under a fresh nonce.
    fn confidential(&self, computation_offset: u64, amount: u64) -> Result<ConfidentialArgs, GatewayError> {
        let user_nonce = random_nonce();
        let sealed = encrypt(&self.secret, &[amount], user_nonce)?;
        let encrypted_amount = sealed
            .first()
            .map(|value| value.ciphertext)
            .ok_or(shadowlend_cipher::CipherError::EncryptionFailed)?;
        Ok(ConfidentialArgs {
            computation_offset,
            encrypted_amount,
            user_pubkey: self.keys.public_key(),
            user_nonce,
        })
    }
}
