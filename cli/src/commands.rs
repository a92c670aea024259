use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use log::info;
use shadowlend_cipher::{CipherError, KeyMaterial};
use shadowlend_client::{
    GatewayContext, Ledger, ObligationTracker, Outcome, Receipt, Request, RpcLedger,
    commitment_config, deployment_book,
};
use shadowlend_config::{Deployment, DeploymentRecord, ShadowlendConfig};
use shadowlend_instruction::{
    AccountBook, ComputationResult, PriceFeeds, ProgramInstruction, Refusal, builder,
};
use shadowlend_obligation::{ObligationError, Slot, decrypt_slot};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

fn load_config() -> Result<ShadowlendConfig> {
    let config = ShadowlendConfig::load()?;
    config.validate()?;
    Ok(config)
}

fn load_payer(config: &ShadowlendConfig) -> Result<Keypair> {
    use solana_sdk::signer::keypair::read_keypair_file;

    let path = config.payer_keypair_path();
    read_keypair_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read payer keypair {}: {e}", path.display()))
}

fn load_deployment(config: &ShadowlendConfig) -> Result<Deployment> {
    let deployment = DeploymentRecord::load(&config.deployment_path())?.verify()?;
    if deployment.program_id != config.program_id()? {
        bail!(
            "deployment record is for program {}, config says {}",
            deployment.program_id,
            config.program_id()?
        );
    }
    Ok(deployment)
}

fn ledger(config: &ShadowlendConfig) -> RpcLedger {
    info!("rpc {}", config.rpc_url());
    RpcLedger::new(config.rpc_url(), commitment_config(config.solana.commitment))
}

fn price_feeds(config: &ShadowlendConfig) -> Result<PriceFeeds> {
    let (sol_price_update, usdc_price_update) = config.price_updates()?;
    Ok(PriceFeeds {
        sol_price_update,
        usdc_price_update,
    })
}

fn book(config: &ShadowlendConfig, deployment: &Deployment) -> Result<AccountBook> {
    Ok(deployment_book(
        deployment,
        config.arcium_program_id()?,
        config.cluster_offset()?,
        price_feeds(config)?,
    ))
}

fn context(config: &ShadowlendConfig) -> Result<GatewayContext<RpcLedger>> {
    let deployment = load_deployment(config)?;
    let keys = KeyMaterial::load_or_generate(&config.key_material_path())?;
    let context = GatewayContext::for_deployment(
        ledger(config),
        &deployment,
        config.arcium_program_id()?,
        config.cluster_offset()?,
        price_feeds(config)?,
        keys,
        &config.mxe_public_key()?,
        &config.gateway,
    )?;
    Ok(context)
}

fn resolve_user(user: Option<&str>, config: &ShadowlendConfig) -> Result<Pubkey> {
    match user {
        Some(user) => Pubkey::from_str(user).with_context(|| format!("not an address: {user}")),
        None => Ok(load_payer(config)?.pubkey()),
    }
}

pub fn genkey(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => ShadowlendConfig::load()?.key_material_path(),
    };

    if path.exists() {
        bail!(
            "File {} already exists. Remove it first or use a different path.",
            path.display()
        );
    }

    println!("🔐 Generating x25519 key material...");
    let keys = KeyMaterial::generate();
    keys.save(&path)?;

    println!("✅ Wrote key material to {}", path.display());
    println!("🔑 Public key: {}", hex::encode(keys.public_key()));
    Ok(())
}

pub async fn addresses(user: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let deployment = load_deployment(&config)?;
    let book = book(&config, &deployment)?;
    let user = resolve_user(user, &config)?;

    println!("📍 Program {}", book.protocol.program_id());
    println!("  Pool:              {}", book.market.pool);
    println!("  Collateral vault:  {}", book.market.collateral_vault);
    println!("  Borrow vault:      {}", book.market.borrow_vault);
    println!("  Signer PDA:        {}", book.protocol.signer()?.address);
    println!("  Obligation ({user}): {}", book.obligation(&user)?);
    println!();
    println!("📍 MPC cluster {}", book.mpc.cluster_offset());
    println!("  MXE:               {}", book.mpc.mxe()?.address);
    println!("  Mempool:           {}", book.mpc.mempool()?.address);
    println!("  Execution pool:    {}", book.mpc.execution_pool()?.address);
    println!("  Cluster:           {}", book.mpc.cluster()?.address);
    println!("  Fee pool:          {}", book.mpc.fee_pool()?.address);
    println!("  Clock:             {}", book.mpc.clock()?.address);
    for circuit in ["deposit", "borrow", "withdraw", "repay", "liquidate", "spend"] {
        println!(
            "  comp def {circuit:<10} {}",
            book.mpc.computation_definition(circuit)?.address
        );
    }
    Ok(())
}

pub async fn init_pool(
    collateral_mint: Pubkey,
    borrow_mint: Pubkey,
    ltv_bps: u16,
    liquidation_threshold_bps: u16,
) -> Result<()> {
    let config = load_config()?;
    let authority = load_payer(&config)?;

    let record = DeploymentRecord::derive(config.program_id()?, collateral_mint, borrow_mint)?;
    let deployment = record.verify()?;
    let book = book(&config, &deployment)?;

    println!("🏦 Initializing pool {}...", deployment.pool);
    let ix = builder::initialize_pool(
        deployment.program_id,
        &book.initialize_pool(authority.pubkey()),
        ltv_bps,
        liquidation_threshold_bps,
    );
    let signature = ledger(&config).submit(&[ix], &authority).await?;
    println!("✅ Pool initialized: {signature}");

    let path = config.deployment_path();
    record.save(&path)?;
    println!("📝 Deployment record written to {}", path.display());
    Ok(())
}

pub async fn close_pool() -> Result<()> {
    let config = load_config()?;
    let authority = load_payer(&config)?;
    let deployment = load_deployment(&config)?;
    let book = book(&config, &deployment)?;

    let ix = builder::close_pool(deployment.program_id, &book.close_pool(authority.pubkey()));
    let signature = ledger(&config).submit(&[ix], &authority).await?;
    println!("✅ Pool {} closed: {signature}", deployment.pool);
    Ok(())
}

pub async fn pool() -> Result<()> {
    let config = load_config()?;
    let deployment = load_deployment(&config)?;
    let ledger = ledger(&config);

    let Some(pool) = ObligationTracker::new(&ledger)
        .fetch_pool(&deployment.pool)
        .await?
    else {
        bail!("pool {} does not exist", deployment.pool);
    };

    println!("🏦 Pool {}", deployment.pool);
    println!("  Authority:             {}", pool.authority());
    println!("  Collateral mint:       {}", pool.collateral_mint());
    println!("  Borrow mint:           {}", pool.borrow_mint());
    println!("  LTV:                   {} bps", pool.ltv);
    println!("  Liquidation threshold: {} bps", pool.liquidation_threshold);
    println!("  Liquidation bonus:     {} bps", pool.liquidation_bonus);
    println!("  Fixed borrow rate:     {}", pool.fixed_borrow_rate);
    println!("  Total deposits:        {}", pool.total_deposits);
    println!("  Total borrows:         {}", pool.total_borrows);
    println!("  Vault nonce:           {}", pool.vault_nonce);
    println!("  Last update:           {}", pool.last_update_ts);
    Ok(())
}

pub async fn execute(request: impl FnOnce([u8; 32]) -> Result<Request>) -> Result<()> {
    let config = load_config()?;
    let payer = load_payer(&config)?;
    let context = context(&config)?;
    let request = request(context.user_public_key())?;

    println!("📤 {} as {}...", request.operation(), payer.pubkey());
    let receipt = context.execute(&payer, request).await?;
    print_receipt(&receipt);

    match receipt.outcome {
        Outcome::Finalized { .. } => Ok(()),
        Outcome::TimedOut { stage } => bail!(
            "gave up waiting for {stage}; run `shadowlend status` later to see whether it landed"
        ),
        Outcome::Rejected { reason, .. } => bail!("rejected: {reason}"),
    }
}

fn print_receipt(receipt: &Receipt) {
    println!("  Operation:          {}", receipt.operation);
    println!("  Computation offset: {}", receipt.computation_offset);
    if let Some(signature) = receipt.signature {
        println!("  Signature:          {signature}");
    }
    println!("  Obligation:         {}", receipt.obligation);
    println!("  Nonce before:       {:?}", receipt.nonce_before);
    println!("  Phases:             {:?}", receipt.phases);
    if let Some(callback) = &receipt.callback {
        print_callback(callback);
    }
    match &receipt.outcome {
        Outcome::Finalized { nonce } => println!("✅ Finalized at nonce {nonce}"),
        Outcome::TimedOut { stage } => println!("⏳ Timed out waiting for {stage}"),
        Outcome::Rejected {
            reason,
            program_error,
        } => {
            println!("❌ Rejected: {reason}");
            if let Some(error) = program_error {
                println!("   Program error {}: {error}", error.code());
            }
        }
    }
}

fn print_callback(callback: &ProgramInstruction) {
    use ComputationResult::Success;

    match callback {
        ProgramInstruction::BorrowCallback(Success { output, .. }) => {
            println!("  Approved:           {}", output.approved)
        }
        ProgramInstruction::WithdrawCallback(Success { output, .. })
        | ProgramInstruction::SpendCallback(Success { output, .. }) => {
            println!("  Approved:           {}", output.approved);
            println!("  Amount released:    {}", output.amount);
        }
        ProgramInstruction::LiquidateCallback(Success { output, .. }) => {
            println!("  Liquidatable:       {}", output.liquidatable);
            println!("  Seized collateral:  {}", output.seized_collateral);
            println!("  Repaid amount:      {}", output.repaid_amount);
        }
        ProgramInstruction::DepositCallback(Success { output, .. })
        | ProgramInstruction::RepayCallback(Success { output, .. }) => {
            println!("  Sealed at nonce:    {}", output.nonce)
        }
        other if other.refusal() == Some(Refusal::Aborted) => {
            println!("  Callback:           computation aborted")
        }
        other => println!("  Callback:           {}", other.operation()),
    }
}

pub async fn status(user: Option<String>, nonce: Option<u128>) -> Result<()> {
    let config = load_config()?;
    let deployment = load_deployment(&config)?;
    let book = book(&config, &deployment)?;
    let user = resolve_user(user.as_deref(), &config)?;
    let obligation = book.obligation(&user)?;
    let ledger = ledger(&config);
    let tracker = ObligationTracker::new(&ledger);

    let Some(record) = tracker.fetch_obligation(&obligation).await? else {
        println!("📭 No obligation for {user} ({obligation})");
        return Ok(());
    };

    println!("📋 Obligation {obligation}");
    println!("  User:        {}", record.user());
    println!("  Pool:        {}", record.pool());
    println!("  Initialized: {}", record.is_initialized);
    println!("  State nonce: {}", record.state_nonce);

    let key_path = config.key_material_path();
    if !key_path.exists() {
        println!("  (no key material at {}, skipping decryption)", key_path.display());
        return Ok(());
    }
    let secret = KeyMaterial::load(&key_path)?.shared_secret(&config.mxe_public_key()?)?;
    let nonce = nonce.unwrap_or(record.state_nonce);

    for slot in Slot::ALL {
        let label = format!("{slot:?}");
        match decrypt_slot(&record.encrypted_state, slot, &secret, nonce) {
            Ok(value) => println!("  {label:<11}: {value}"),
            Err(ObligationError::Cipher(CipherError::DecryptionMismatch)) => {
                println!("  {label:<11}: <not sealed to this key at nonce {nonce}>")
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
