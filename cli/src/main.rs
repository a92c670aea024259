mod commands;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use shadowlend_client::Request;
use solana_sdk::pubkey::Pubkey;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let cmd = args[1].as_str();
    let rest = &args[2..];

    let result = match cmd {
        "config" => {
            print!("{}", shadowlend_config::ShadowlendConfig::generate_sample());
            Ok(())
        }
        "genkey" => commands::genkey(rest.first().map(PathBuf::from)),
        "addresses" => commands::addresses(rest.first().map(String::as_str)).await,
        "init-pool" => match parse_init_pool(rest) {
            Ok((collateral, borrow, ltv, lt)) => {
                commands::init_pool(collateral, borrow, ltv, lt).await
            }
            Err(e) => Err(e),
        },
        "close-pool" => commands::close_pool().await,
        "pool" => commands::pool().await,
        "deposit" | "borrow" | "withdraw" | "repay" | "spend" | "liquidate" => {
            commands::execute(|own_key| parse_request(cmd, rest, own_key)).await
        }
        "status" => match parse_status_args(rest) {
            Ok((user, nonce)) => commands::status(user, nonce).await,
            Err(e) => Err(e),
        },
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        _ => {
            println!("❌ Unknown command: {cmd}");
            println!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error running {cmd}: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Shadowlend CLI - confidential lending on Arcium");
    println!();
    println!("USAGE:");
    println!("  shadowlend <command> [args]");
    println!();
    println!("SETUP COMMANDS:");
    println!("  config                             Print a sample shadowlend.toml");
    println!("  genkey [path]                      Generate x25519 key material");
    println!("  init-pool <coll> <borrow> <ltv> <lt>");
    println!("                                     Create the pool and write the deployment record");
    println!("  close-pool                         Close the pool (authority only)");
    println!();
    println!("LENDING COMMANDS:");
    println!("  deposit <amount>                   Deposit collateral (public amount)");
    println!("  borrow <amount>                    Borrow (encrypted amount)");
    println!("  withdraw <amount>                  Withdraw collateral (encrypted amount)");
    println!("  repay <amount>                     Repay debt (public amount)");
    println!("  spend <amount> <token-account>     Spend internal balance (encrypted amount)");
    println!("  liquidate <victim> <amount> [key]  Liquidate an unhealthy obligation");
    println!();
    println!("QUERY COMMANDS:");
    println!("  addresses [user]                   Print derived program and MPC accounts");
    println!("  pool                               Print the pool record");
    println!("  status [user] [--nonce <n>]        Fetch and decrypt an obligation");
    println!("  help                               Show this help message");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  SL_CONFIG            Config file path");
    println!("  SOLANA_RPC_URL       Solana RPC endpoint");
    println!("  SL_NETWORK           localnet | devnet | mainnet");
    println!("  SL_CLUSTER_OFFSET    Arcium cluster offset");
    println!("  SL_MXE_PUBLIC_KEY    Cluster x25519 public key (hex)");
    println!("  SL_SOL_PRICE_UPDATE  SOL/USD price update account");
    println!("  SL_USDC_PRICE_UPDATE USDC/USD price update account");
    println!("  SL_PAYER_KEYPAIR     Solana keypair file");
    println!("  RUST_LOG             Log level (debug/info/warn/error)");
}

fn parse_amount(value: Option<&String>, what: &str) -> Result<u64> {
    let value = value.with_context(|| format!("missing {what}"))?;
    value
        .parse()
        .with_context(|| format!("{what} must be a whole number of base units, got `{value}`"))
}

fn parse_pubkey(value: Option<&String>, what: &str) -> Result<Pubkey> {
    let value = value.with_context(|| format!("missing {what}"))?;
    Pubkey::from_str(value).with_context(|| format!("{what} is not an address: `{value}`"))
}

fn parse_x25519(value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value.trim_start_matches("0x")).context("key is not hex")?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| anyhow::anyhow!("key must be 32 bytes, got {}", bytes.len()))
}

/// Lending commands. A liquidation without an explicit victim key seals the
/// victim's refreshed state to `own_key`.
fn parse_request(cmd: &str, args: &[String], own_key: [u8; 32]) -> Result<Request> {
    let request = match cmd {
        "deposit" => Request::Deposit {
            amount: parse_amount(args.first(), "amount")?,
        },
        "borrow" => Request::Borrow {
            amount: parse_amount(args.first(), "amount")?,
        },
        "withdraw" => Request::Withdraw {
            amount: parse_amount(args.first(), "amount")?,
        },
        "repay" => Request::Repay {
            amount: parse_amount(args.first(), "amount")?,
        },
        "spend" => Request::Spend {
            amount: parse_amount(args.first(), "amount")?,
            destination: parse_pubkey(args.get(1), "destination token account")?,
        },
        "liquidate" => Request::Liquidate {
            victim: parse_pubkey(args.first(), "victim")?,
            repay_amount: parse_amount(args.get(1), "repay amount")?,
            victim_key: match args.get(2) {
                Some(key) => parse_x25519(key)?,
                None => own_key,
            },
        },
        other => bail!("not a lending command: {other}"),
    };
    Ok(request)
}

fn parse_init_pool(args: &[String]) -> Result<(Pubkey, Pubkey, u16, u16)> {
    let collateral = parse_pubkey(args.first(), "collateral mint")?;
    let borrow = parse_pubkey(args.get(1), "borrow mint")?;
    let ltv = parse_amount(args.get(2), "ltv (bps)")?;
    let lt = parse_amount(args.get(3), "liquidation threshold (bps)")?;
    if ltv > 10_000 || lt > 10_000 || ltv >= lt {
        bail!("need ltv < liquidation threshold <= 10000 bps, got {ltv} / {lt}");
    }
    Ok((collateral, borrow, ltv as u16, lt as u16))
}

fn parse_status_args(args: &[String]) -> Result<(Option<String>, Option<u128>)> {
    let mut user = None;
    let mut nonce = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--nonce" => {
                let value = args.get(i + 1).context("--nonce needs a value")?;
                nonce = Some(value.parse().context("--nonce must be an integer")?);
                i += 1;
            }
            other => user = Some(other.to_string()),
        }
        i += 1;
    }

    Ok((user, nonce))
}
