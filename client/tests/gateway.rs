use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use shadowlend_address::{
    ARCIUM_PROGRAM_ID, MpcAddresses, ProtocolAddresses, SHADOWLEND_PROGRAM_ID, parse_program_id,
};
use shadowlend_cipher::{KeyMaterial, decrypt, encrypt};
use shadowlend_client::{
    GatewayContext, GatewayError, Ledger, LedgerError, ObligationTracker, Outcome, Phase,
    PollPolicy, ProgramError, Request, Stage,
};
use shadowlend_config::GatewayConfig;
use shadowlend_instruction::{
    AccountBook, ApprovalOutput, ComputationResult, LiquidationOutput, Market, PriceFeeds,
    ProgramInstruction, SharedState,
};
use shadowlend_obligation::{Position, ProgramAccount, UserObligation};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};

/// In-memory ledger. Each read of the watched obligation pops the next
/// scripted nonce; the last one sticks.
struct ScriptedLedger {
    obligation: Pubkey,
    nonces: Mutex<VecDeque<Option<u128>>>,
    encrypted_state: [u8; 96],
    picked_up: bool,
    submit_failure: Option<String>,
    callback_failure: Option<String>,
    /// Callbacks that landed on the computation account, newest first.
    callbacks: Vec<ProgramInstruction>,
    submitted: Mutex<Vec<Instruction>>,
}

impl ScriptedLedger {
    fn new(obligation: Pubkey, nonces: &[Option<u128>]) -> Self {
        Self {
            obligation,
            nonces: Mutex::new(nonces.iter().copied().collect()),
            encrypted_state: [0u8; 96],
            picked_up: true,
            submit_failure: None,
            callback_failure: None,
            callbacks: Vec::new(),
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn next_nonce(&self) -> Option<u128> {
        let mut nonces = self.nonces.lock().unwrap();
        if nonces.len() > 1 {
            nonces.pop_front().flatten()
        } else {
            nonces.front().copied().flatten()
        }
    }

    fn submitted(&self) -> Vec<Instruction> {
        self.submitted.lock().unwrap().clone()
    }
}

fn obligation_bytes(nonce: u128, encrypted_state: [u8; 96]) -> Vec<u8> {
    UserObligation {
        user: [5u8; 32],
        pool: [6u8; 32],
        encrypted_state,
        state_commitment: [0u8; 32],
        state_nonce: nonce,
        is_initialized: true,
        bump: 254,
    }
    .encode()
    .unwrap()
}

impl Ledger for ScriptedLedger {
    async fn submit(
        &self,
        instructions: &[Instruction],
        _payer: &Keypair,
    ) -> Result<Signature, LedgerError> {
        if let Some(message) = &self.submit_failure {
            return Err(LedgerError::from_message(message.clone()));
        }
        self.submitted
            .lock()
            .unwrap()
            .extend_from_slice(instructions);
        Ok(Signature::from([7u8; 64]))
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        if *address == self.obligation {
            return Ok(self
                .next_nonce()
                .map(|nonce| obligation_bytes(nonce, self.encrypted_state)));
        }
        // anything else is the computation account
        let submitted = !self.submitted.lock().unwrap().is_empty();
        Ok((self.picked_up && submitted).then(|| vec![0u8; 8]))
    }

    async fn failed_transaction(&self, _address: &Pubkey) -> Result<Option<String>, LedgerError> {
        Ok(self.callback_failure.clone())
    }

    async fn program_instructions(
        &self,
        _address: &Pubkey,
        _program_id: &Pubkey,
    ) -> Result<Vec<Vec<u8>>, LedgerError> {
        // the request itself also touched the computation account
        let mut found: Vec<Vec<u8>> = self.callbacks.iter().map(|cb| cb.encode()).collect();
        found.extend(self.submitted().into_iter().map(|ix| ix.data));
        found.push(vec![0xff; 4]);
        Ok(found)
    }
}

fn shared_state(nonce: u128) -> SharedState {
    SharedState {
        encryption_key: [1u8; 32],
        nonce,
        ciphertexts: [[2u8; 32]; 3],
    }
}

fn borrow_verdict(approved: bool) -> ProgramInstruction {
    ProgramInstruction::BorrowCallback(ComputationResult::Success {
        output: ApprovalOutput {
            state: shared_state(4),
            approved,
        },
        signature: [3u8; 64],
    })
}

fn book() -> AccountBook {
    let program_id = parse_program_id(SHADOWLEND_PROGRAM_ID).unwrap();
    let protocol = ProtocolAddresses::new(program_id);
    let mpc = MpcAddresses::new(parse_program_id(ARCIUM_PROGRAM_ID).unwrap(), program_id, 0);
    let pool = protocol.pool().unwrap().address;
    AccountBook::new(
        protocol,
        mpc,
        Market {
            pool,
            collateral_mint: Pubkey::new_from_array([1u8; 32]),
            borrow_mint: Pubkey::new_from_array([2u8; 32]),
            collateral_vault: protocol.collateral_vault(&pool).unwrap().address,
            borrow_vault: protocol.borrow_vault(&pool).unwrap().address,
        },
        PriceFeeds {
            sol_price_update: Pubkey::new_from_array([3u8; 32]),
            usdc_price_update: Pubkey::new_from_array([4u8; 32]),
        },
    )
}

fn fast(max_attempts: u32) -> PollPolicy {
    PollPolicy::new(Duration::from_millis(1), max_attempts)
}

struct Harness {
    payer: Keypair,
    obligation: Pubkey,
}

impl Harness {
    fn new() -> Self {
        let payer = Keypair::new();
        let obligation = book().obligation(&payer.pubkey()).unwrap();
        Self { payer, obligation }
    }

    fn context(&self, ledger: ScriptedLedger) -> GatewayContext<ScriptedLedger> {
        let cluster = KeyMaterial::generate();
        GatewayContext::new(
            ledger,
            book(),
            KeyMaterial::generate(),
            &cluster.public_key(),
            &GatewayConfig::default(),
        )
        .unwrap()
        .with_policies(fast(5), fast(5))
    }
}

#[tokio::test]
async fn finalizes_when_nonce_advances() {
    let h = Harness::new();
    let ctx = h.context(ScriptedLedger::new(
        h.obligation,
        &[Some(3), Some(3), Some(3), Some(4)],
    ));

    let receipt = ctx
        .execute(&h.payer, Request::Borrow { amount: 1_000 })
        .await
        .unwrap();

    assert_eq!(receipt.outcome, Outcome::Finalized { nonce: 4 });
    assert_eq!(receipt.nonce_before, Some(3));
    assert_eq!(receipt.obligation, h.obligation);
    assert!(receipt.signature.is_some());
    assert_eq!(
        receipt.phases,
        vec![
            Phase::Building,
            Phase::Submitted,
            Phase::AwaitingComputationPickup,
            Phase::AwaitingCallback,
            Phase::Finalized,
        ]
    );
    assert!(ctx.in_flight().is_empty());
}

#[tokio::test]
async fn unchanged_nonce_times_out_at_callback() {
    let h = Harness::new();
    let ctx = h.context(ScriptedLedger::new(h.obligation, &[Some(3)]));

    let receipt = ctx
        .execute(&h.payer, Request::Repay { amount: 10 })
        .await
        .unwrap();

    assert_eq!(
        receipt.outcome,
        Outcome::TimedOut {
            stage: Stage::Callback
        }
    );
    assert_eq!(receipt.phases.last(), Some(&Phase::TimedOut));
    assert!(ctx.offsets().was_issued(receipt.computation_offset));
    assert!(ctx.in_flight().is_empty());
}

#[tokio::test]
async fn missing_computation_account_times_out_at_pickup() {
    let h = Harness::new();
    let mut ledger = ScriptedLedger::new(h.obligation, &[Some(3)]);
    ledger.picked_up = false;
    let ctx = h.context(ledger);

    let receipt = ctx
        .execute(&h.payer, Request::Deposit { amount: 500_000 })
        .await
        .unwrap();

    assert_eq!(
        receipt.outcome,
        Outcome::TimedOut {
            stage: Stage::Pickup
        }
    );
    assert!(!receipt.phases.contains(&Phase::AwaitingCallback));
}

#[tokio::test]
async fn first_deposit_finalizes_once_obligation_exists() {
    let h = Harness::new();
    let ctx = h.context(ScriptedLedger::new(h.obligation, &[None, None, Some(1)]));

    let receipt = ctx
        .execute(&h.payer, Request::Deposit { amount: 500_000 })
        .await
        .unwrap();

    assert_eq!(receipt.nonce_before, None);
    assert_eq!(receipt.outcome, Outcome::Finalized { nonce: 1 });
}

#[tokio::test]
async fn second_request_for_busy_obligation_is_refused() {
    let h = Harness::new();
    let ctx = h.context(ScriptedLedger::new(h.obligation, &[Some(3)]));

    let (first, second) = tokio::join!(
        ctx.execute(&h.payer, Request::Borrow { amount: 100 }),
        ctx.execute(&h.payer, Request::Withdraw { amount: 50 }),
    );

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(GatewayError::ObligationBusy(o)) if o == h.obligation
    ));
    assert_eq!(ctx.ledger().submitted().len(), 1);
    assert!(ctx.in_flight().is_empty());
}

#[tokio::test]
async fn stale_nonce_is_refused_before_submission() {
    let h = Harness::new();
    let ctx = h.context(ScriptedLedger::new(h.obligation, &[Some(5)]));

    let err = ctx
        .execute_with_nonce(&h.payer, Request::Borrow { amount: 100 }, 4)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GatewayError::StaleNonce {
            expected: 4,
            actual: Some(5),
            ..
        }
    ));
    assert!(ctx.ledger().submitted().is_empty());
    assert!(ctx.in_flight().is_empty());
}

#[tokio::test]
async fn matching_nonce_is_submitted() {
    let h = Harness::new();
    let ctx = h.context(ScriptedLedger::new(h.obligation, &[Some(5), Some(6)]));

    let receipt = ctx
        .execute_with_nonce(&h.payer, Request::Borrow { amount: 100 }, 5)
        .await
        .unwrap();
    assert_eq!(receipt.outcome, Outcome::Finalized { nonce: 6 });
}

#[tokio::test]
async fn failed_callback_is_rejected_not_timed_out() {
    let h = Harness::new();
    let mut ledger = ScriptedLedger::new(h.obligation, &[Some(3)]);
    ledger.callback_failure =
        Some("5xQ failed: InstructionError(0, Custom(6003))".to_string());
    let ctx = h.context(ledger);

    let receipt = ctx
        .execute(&h.payer, Request::Borrow { amount: 1_000_000 })
        .await
        .unwrap();

    match receipt.outcome {
        Outcome::Rejected {
            reason,
            program_error,
        } => {
            assert!(reason.contains("Custom(6003)"));
            assert_eq!(program_error, Some(ProgramError::BorrowNotApproved));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(receipt.phases.last(), Some(&Phase::Rejected));
}

#[tokio::test]
async fn declined_health_check_is_rejected_not_timed_out() {
    let h = Harness::new();
    let mut ledger = ScriptedLedger::new(h.obligation, &[Some(3)]);
    ledger.callbacks = vec![borrow_verdict(false)];
    let ctx = h.context(ledger);

    let receipt = ctx
        .execute(&h.payer, Request::Borrow { amount: 1_000_000 })
        .await
        .unwrap();

    match &receipt.outcome {
        Outcome::Rejected {
            reason,
            program_error,
        } => {
            assert!(reason.contains("health check"));
            assert_eq!(*program_error, Some(ProgramError::BorrowNotApproved));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(receipt.callback, Some(borrow_verdict(false)));
    assert_eq!(receipt.phases.last(), Some(&Phase::Rejected));
    assert!(ctx.in_flight().is_empty());
}

#[tokio::test]
async fn aborted_computation_is_rejected() {
    let h = Harness::new();
    let mut ledger = ScriptedLedger::new(h.obligation, &[Some(3)]);
    ledger.callbacks = vec![ProgramInstruction::RepayCallback(ComputationResult::Failure)];
    let ctx = h.context(ledger);

    let receipt = ctx
        .execute(&h.payer, Request::Repay { amount: 10 })
        .await
        .unwrap();

    assert!(matches!(
        receipt.outcome,
        Outcome::Rejected {
            program_error: Some(ProgramError::AbortedComputation),
            ..
        }
    ));
}

#[tokio::test]
async fn approving_callback_waits_for_the_nonce() {
    let h = Harness::new();
    let mut ledger = ScriptedLedger::new(
        h.obligation,
        &[Some(3), Some(3), Some(3), Some(3), Some(4)],
    );
    ledger.callbacks = vec![borrow_verdict(true)];
    let ctx = h.context(ledger);

    let receipt = ctx
        .execute(&h.payer, Request::Borrow { amount: 1_000 })
        .await
        .unwrap();

    assert_eq!(receipt.outcome, Outcome::Finalized { nonce: 4 });
    assert_eq!(receipt.callback, Some(borrow_verdict(true)));
}

#[tokio::test]
async fn refused_transaction_is_rejected_without_signature() {
    let h = Harness::new();
    let mut ledger = ScriptedLedger::new(h.obligation, &[Some(3)]);
    ledger.submit_failure = Some(
        "Transaction simulation failed: Error processing Instruction 0: \
         custom program error: 0x1772"
            .to_string(),
    );
    let ctx = h.context(ledger);

    let receipt = ctx
        .execute(&h.payer, Request::Repay { amount: 1 })
        .await
        .unwrap();

    assert!(receipt.signature.is_none());
    assert_eq!(receipt.phases, vec![Phase::Building, Phase::Rejected]);
    assert!(matches!(
        receipt.outcome,
        Outcome::Rejected {
            program_error: Some(ProgramError::InsufficientLiquidity),
            ..
        }
    ));
}

#[tokio::test]
async fn transport_failure_is_an_error() {
    let h = Harness::new();
    let mut ledger = ScriptedLedger::new(h.obligation, &[Some(3)]);
    ledger.submit_failure = Some("error sending request: connection refused".to_string());
    let ctx = h.context(ledger);

    let err = ctx
        .execute(&h.payer, Request::Repay { amount: 1 })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Ledger(LedgerError::Rpc(_))));
    assert!(ctx.in_flight().is_empty());
}

#[tokio::test]
async fn confidential_amount_is_sealed_and_public_amount_is_not() {
    let h = Harness::new();
    let ctx = h.context(ScriptedLedger::new(h.obligation, &[Some(1), Some(2), Some(3)]));

    ctx.execute(&h.payer, Request::Borrow { amount: 1_000 })
        .await
        .unwrap();
    ctx.execute(&h.payer, Request::Deposit { amount: 500_000 })
        .await
        .unwrap();

    let submitted = ctx.ledger().submitted();
    assert_eq!(submitted.len(), 2);

    match ProgramInstruction::decode(&submitted[0].data).unwrap() {
        ProgramInstruction::Borrow(args) => {
            assert_eq!(args.user_pubkey, ctx.user_public_key());
            let amount = decrypt(ctx.shared_secret(), &args.encrypted_amount, args.user_nonce);
            assert_eq!(amount.unwrap(), 1_000);
        }
        other => panic!("expected borrow, got {other:?}"),
    }
    match ProgramInstruction::decode(&submitted[1].data).unwrap() {
        ProgramInstruction::Deposit(args) => assert_eq!(args.amount, 500_000),
        other => panic!("expected deposit, got {other:?}"),
    }
}

#[tokio::test]
async fn offsets_are_fresh_per_run() {
    let h = Harness::new();
    let ctx = h.context(ScriptedLedger::new(h.obligation, &[Some(3)]));

    let a = ctx
        .execute(&h.payer, Request::Repay { amount: 1 })
        .await
        .unwrap();
    let b = ctx
        .execute(&h.payer, Request::Repay { amount: 1 })
        .await
        .unwrap();

    assert_ne!(a.computation_offset, b.computation_offset);
    assert!(ctx.offsets().was_issued(a.computation_offset));
    assert!(ctx.offsets().was_issued(b.computation_offset));
}

#[tokio::test]
async fn liquidation_targets_the_victim_obligation() {
    let h = Harness::new();
    let victim = Pubkey::new_unique();
    let victim_obligation = book().obligation(&victim).unwrap();
    let ctx = h.context(ScriptedLedger::new(victim_obligation, &[Some(7), Some(8)]));

    let receipt = ctx
        .execute(
            &h.payer,
            Request::Liquidate {
                victim,
                repay_amount: 250,
                victim_key: [9u8; 32],
            },
        )
        .await
        .unwrap();

    assert_eq!(receipt.obligation, victim_obligation);
    assert_eq!(receipt.outcome, Outcome::Finalized { nonce: 8 });
}

#[tokio::test]
async fn finalized_liquidation_reports_revealed_amounts() {
    let h = Harness::new();
    let victim = Pubkey::new_unique();
    let victim_obligation = book().obligation(&victim).unwrap();
    let mut ledger = ScriptedLedger::new(victim_obligation, &[Some(7), Some(8)]);
    ledger.callbacks = vec![ProgramInstruction::LiquidateCallback(
        ComputationResult::Success {
            output: LiquidationOutput {
                state: shared_state(8),
                liquidatable: true,
                seized_collateral: 275,
                repaid_amount: 250,
            },
            signature: [3u8; 64],
        },
    )];
    let ctx = h.context(ledger);

    let receipt = ctx
        .execute(
            &h.payer,
            Request::Liquidate {
                victim,
                repay_amount: 250,
                victim_key: [9u8; 32],
            },
        )
        .await
        .unwrap();

    assert_eq!(receipt.outcome, Outcome::Finalized { nonce: 8 });
    match receipt.callback {
        Some(ProgramInstruction::LiquidateCallback(ComputationResult::Success { output, .. })) => {
            assert!(output.liquidatable);
            assert_eq!(output.seized_collateral, 275);
            assert_eq!(output.repaid_amount, 250);
        }
        other => panic!("expected liquidation callback, got {other:?}"),
    }
}

#[tokio::test]
async fn healthy_position_rejects_liquidation() {
    let h = Harness::new();
    let victim = Pubkey::new_unique();
    let victim_obligation = book().obligation(&victim).unwrap();
    let mut ledger = ScriptedLedger::new(victim_obligation, &[Some(7)]);
    ledger.callbacks = vec![ProgramInstruction::LiquidateCallback(
        ComputationResult::Success {
            output: LiquidationOutput {
                state: shared_state(7),
                liquidatable: false,
                seized_collateral: 0,
                repaid_amount: 0,
            },
            signature: [3u8; 64],
        },
    )];
    let ctx = h.context(ledger);

    let receipt = ctx
        .execute(
            &h.payer,
            Request::Liquidate {
                victim,
                repay_amount: 250,
                victim_key: [9u8; 32],
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        receipt.outcome,
        Outcome::Rejected {
            program_error: None,
            ..
        }
    ));
}

#[tokio::test]
async fn tracker_decrypts_position_at_state_nonce() {
    let h = Harness::new();
    let cluster = KeyMaterial::generate();
    let secret = KeyMaterial::generate()
        .shared_secret(&cluster.public_key())
        .unwrap();

    let mut state = [0u8; 96];
    for (i, block) in encrypt(&secret, &[10, 20, 30], 4)
        .unwrap()
        .iter()
        .enumerate()
    {
        state[i * 32..(i + 1) * 32].copy_from_slice(block.as_bytes());
    }
    let mut ledger = ScriptedLedger::new(h.obligation, &[Some(4)]);
    ledger.encrypted_state = state;
    let tracker = ObligationTracker::new(&ledger);

    let (record, position) = tracker
        .position(&h.obligation, &secret, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.state_nonce, 4);
    assert_eq!(
        position,
        Position {
            deposit: 10,
            debt: 20,
            internal: 30
        }
    );
    assert!(matches!(
        tracker.position(&h.obligation, &secret, Some(5)).await,
        Err(GatewayError::Obligation(_))
    ));
}
