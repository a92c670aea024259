//! Shadowlend Configuration
//!
//! Handles loading configuration from:
//! 1. SL_CONFIG env var (explicit path)
//! 2. ./shadowlend.toml (current directory)
//! 3. ~/.shadowlend/shadowlend.toml (user home)
//!
//! Environment variables take precedence over TOML config. The loaded value
//! is handed to whoever needs it; there is no global instance.

pub mod deployment;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use std::{env, fs};

pub use deployment::{Deployment, DeploymentRecord};

const CONFIG_FILE_NAME: &str = "shadowlend.toml";
const CONFIG_DIR_NAME: &str = ".shadowlend";

// ============================================================================
// Default Constants
// ============================================================================

const LOCALNET_RPC_URL: &str = "http://127.0.0.1:8899";
const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
const MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Cluster offset of the local MPC test cluster
const LOCALNET_CLUSTER_OFFSET: u32 = 0;

const DEFAULT_PICKUP_INTERVAL_MS: u64 = 2_000;
const DEFAULT_PICKUP_ATTEMPTS: u32 = 60;
const DEFAULT_CALLBACK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_CALLBACK_ATTEMPTS: u32 = 90;

/// Pyth push-oracle sponsored feed accounts (shard 0)
const SOL_USD_PRICE_UPDATE: &str = "7UVimffxr9ow1uXYxsr4LHAcV58mLzhmwaeKvJ1pjLiE";
const USDC_USD_PRICE_UPDATE: &str = "Dpw1EAVrSB1ibxiDQyTAW6Zip3J4Btk2x4SgApQCeFbX";

const KEY_MATERIAL_FILE: &str = "x25519.json";
const DEPLOYMENT_FILE: &str = "deployment.json";

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShadowlendConfig {
    #[serde(default)]
    pub solana: SolanaConfig,
    #[serde(default)]
    pub arcium: ArciumConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Localnet,
    Devnet,
    Mainnet,
}

impl Network {
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::Localnet => LOCALNET_RPC_URL,
            Network::Devnet => DEVNET_RPC_URL,
            Network::Mainnet => MAINNET_RPC_URL,
        }
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "localnet" | "local" => Ok(Network::Localnet),
            "devnet" | "dev" => Ok(Network::Devnet),
            "mainnet" | "main" | "mainnet-beta" => Ok(Network::Mainnet),
            other => bail!("unknown network `{other}`"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

/// Solana connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaConfig {
    #[serde(default)]
    pub network: Network,
    /// Falls back to the network's public endpoint when unset
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub commitment: Commitment,
    #[serde(default = "default_program_id")]
    pub program_id: String,
    #[serde(default = "default_arcium_program_id")]
    pub arcium_program_id: String,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            rpc_url: None,
            commitment: Commitment::default(),
            program_id: default_program_id(),
            arcium_program_id: default_arcium_program_id(),
        }
    }
}

fn default_program_id() -> String {
    shadowlend_address::SHADOWLEND_PROGRAM_ID.into()
}
fn default_arcium_program_id() -> String {
    shadowlend_address::ARCIUM_PROGRAM_ID.into()
}

/// MPC cluster selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArciumConfig {
    /// Required outside localnet. Never guessed at runtime.
    #[serde(default)]
    pub cluster_offset: Option<u32>,
    /// Cluster's x25519 public key, hex. Confidential amounts are sealed to it.
    #[serde(default)]
    pub mxe_public_key: Option<String>,
}

/// Polling bounds for the two waiting phases of a computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_pickup_interval")]
    pub pickup_interval_ms: u64,
    #[serde(default = "default_pickup_attempts")]
    pub pickup_attempts: u32,
    #[serde(default = "default_callback_interval")]
    pub callback_interval_ms: u64,
    #[serde(default = "default_callback_attempts")]
    pub callback_attempts: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            pickup_interval_ms: DEFAULT_PICKUP_INTERVAL_MS,
            pickup_attempts: DEFAULT_PICKUP_ATTEMPTS,
            callback_interval_ms: DEFAULT_CALLBACK_INTERVAL_MS,
            callback_attempts: DEFAULT_CALLBACK_ATTEMPTS,
        }
    }
}

fn default_pickup_interval() -> u64 {
    DEFAULT_PICKUP_INTERVAL_MS
}
fn default_pickup_attempts() -> u32 {
    DEFAULT_PICKUP_ATTEMPTS
}
fn default_callback_interval() -> u64 {
    DEFAULT_CALLBACK_INTERVAL_MS
}
fn default_callback_attempts() -> u32 {
    DEFAULT_CALLBACK_ATTEMPTS
}

impl GatewayConfig {
    pub fn pickup_interval(&self) -> Duration {
        Duration::from_millis(self.pickup_interval_ms)
    }

    pub fn callback_interval(&self) -> Duration {
        Duration::from_millis(self.callback_interval_ms)
    }
}

/// Price update accounts handed to borrow and liquidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_sol_price_update")]
    pub sol_price_update: String,
    #[serde(default = "default_usdc_price_update")]
    pub usdc_price_update: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            sol_price_update: default_sol_price_update(),
            usdc_price_update: default_usdc_price_update(),
        }
    }
}

fn default_sol_price_update() -> String {
    SOL_USD_PRICE_UPDATE.into()
}
fn default_usdc_price_update() -> String {
    USDC_USD_PRICE_UPDATE.into()
}

/// Local files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Solana JSON keypair; defaults to ~/.config/solana/id.json
    #[serde(default)]
    pub payer_keypair: Option<String>,
    /// x25519 key material; defaults to ~/.shadowlend/x25519.json
    #[serde(default)]
    pub key_material: Option<String>,
    /// Deployment record; defaults to ~/.shadowlend/deployment.json
    #[serde(default)]
    pub deployment: Option<String>,
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from variable if present
fn env_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, field: &mut String) {
    if let Some(v) = lookup(key) {
        *field = v;
    }
}

/// Set Option<String> from variable if present
fn env_option_string(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut Option<String>,
) {
    if let Some(v) = lookup(key) {
        *field = Some(v);
    }
}

/// Set field from variable if present and parseable
fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) {
    if let Some(v) = lookup(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("ignoring unparseable {key}={v}"),
        }
    }
}

/// Set Option<T> from variable if present and parseable
fn env_parse_option<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut Option<T>,
) {
    if let Some(v) = lookup(key) {
        match v.parse() {
            Ok(parsed) => *field = Some(parsed),
            Err(_) => log::warn!("ignoring unparseable {key}={v}"),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl ShadowlendConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SL_CONFIG env var
        if let Ok(path) = env::var("SL_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("SL_CONFIG points to missing file {}", path.display());
        }

        // 2. Check ./shadowlend.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shadowlend/shadowlend.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Solana
        env_parse(&lookup, "SL_NETWORK", &mut self.solana.network);
        env_option_string(&lookup, "SOLANA_RPC_URL", &mut self.solana.rpc_url);
        env_string(&lookup, "SL_PROGRAM_ID", &mut self.solana.program_id);
        env_string(
            &lookup,
            "SL_ARCIUM_PROGRAM_ID",
            &mut self.solana.arcium_program_id,
        );

        // Arcium
        env_parse_option(&lookup, "SL_CLUSTER_OFFSET", &mut self.arcium.cluster_offset);
        env_option_string(&lookup, "SL_MXE_PUBLIC_KEY", &mut self.arcium.mxe_public_key);

        // Gateway
        env_parse(
            &lookup,
            "SL_PICKUP_INTERVAL_MS",
            &mut self.gateway.pickup_interval_ms,
        );
        env_parse(&lookup, "SL_PICKUP_ATTEMPTS", &mut self.gateway.pickup_attempts);
        env_parse(
            &lookup,
            "SL_CALLBACK_INTERVAL_MS",
            &mut self.gateway.callback_interval_ms,
        );
        env_parse(
            &lookup,
            "SL_CALLBACK_ATTEMPTS",
            &mut self.gateway.callback_attempts,
        );

        // Oracle
        env_string(&lookup, "SL_SOL_PRICE_UPDATE", &mut self.oracle.sol_price_update);
        env_string(&lookup, "SL_USDC_PRICE_UPDATE", &mut self.oracle.usdc_price_update);

        // Wallet
        env_option_string(&lookup, "SL_PAYER_KEYPAIR", &mut self.wallet.payer_keypair);
        env_option_string(&lookup, "SL_KEY_MATERIAL", &mut self.wallet.key_material);
        env_option_string(&lookup, "SL_DEPLOYMENT", &mut self.wallet.deployment);
    }

    /// Check everything that would otherwise fail halfway through a request.
    pub fn validate(&self) -> Result<()> {
        self.program_id()?;
        self.arcium_program_id()?;
        self.cluster_offset()?;
        self.price_updates()?;
        if self.arcium.mxe_public_key.is_some() {
            self.mxe_public_key()?;
        }

        let gw = &self.gateway;
        if gw.pickup_attempts == 0 || gw.callback_attempts == 0 {
            bail!("gateway attempt bounds must be at least 1");
        }
        if gw.pickup_interval_ms == 0 || gw.callback_interval_ms == 0 {
            bail!("gateway poll intervals must be non-zero");
        }
        Ok(())
    }

    pub fn rpc_url(&self) -> &str {
        self.solana
            .rpc_url
            .as_deref()
            .unwrap_or(self.solana.network.default_rpc_url())
    }

    pub fn program_id(&self) -> Result<Pubkey> {
        shadowlend_address::parse_program_id(&self.solana.program_id)
            .context("invalid solana.program_id")
    }

    pub fn arcium_program_id(&self) -> Result<Pubkey> {
        shadowlend_address::parse_program_id(&self.solana.arcium_program_id)
            .context("invalid solana.arcium_program_id")
    }

    /// The configured cluster offset. Only localnet has a default.
    pub fn cluster_offset(&self) -> Result<u32> {
        match (self.arcium.cluster_offset, self.solana.network) {
            (Some(offset), _) => Ok(offset),
            (None, Network::Localnet) => Ok(LOCALNET_CLUSTER_OFFSET),
            (None, network) => bail!(
                "arcium.cluster_offset must be set for {network:?} (or export SL_CLUSTER_OFFSET)"
            ),
        }
    }

    /// Needed by every command that encrypts or decrypts amounts.
    pub fn mxe_public_key(&self) -> Result<[u8; 32]> {
        let Some(encoded) = self.arcium.mxe_public_key.as_deref() else {
            bail!("arcium.mxe_public_key is not set (or export SL_MXE_PUBLIC_KEY)");
        };
        let bytes = hex::decode(encoded.trim_start_matches("0x"))
            .context("arcium.mxe_public_key is not hex")?;
        <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| anyhow::anyhow!("arcium.mxe_public_key must be 32 bytes, got {}", bytes.len()))
    }

    /// SOL/USD and USDC/USD price update accounts, in that order.
    pub fn price_updates(&self) -> Result<(Pubkey, Pubkey)> {
        let sol = Pubkey::from_str(&self.oracle.sol_price_update)
            .context("invalid oracle.sol_price_update")?;
        let usdc = Pubkey::from_str(&self.oracle.usdc_price_update)
            .context("invalid oracle.usdc_price_update")?;
        Ok((sol, usdc))
    }

    pub fn payer_keypair_path(&self) -> PathBuf {
        self.wallet
            .payer_keypair
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_default()
                    .join(".config")
                    .join("solana")
                    .join("id.json")
            })
    }

    pub fn key_material_path(&self) -> PathBuf {
        self.wallet
            .key_material
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join(KEY_MATERIAL_FILE))
    }

    pub fn deployment_path(&self) -> PathBuf {
        self.wallet
            .deployment
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join(DEPLOYMENT_FILE))
    }

    fn config_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_default().join(CONFIG_DIR_NAME)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.solana.network = Network::Devnet;
        sample.solana.rpc_url = Some(DEVNET_RPC_URL.into());
        sample.arcium.cluster_offset = Some(1_078_779_259);
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ShadowlendConfig::default();
        assert_eq!(config.solana.network, Network::Localnet);
        assert_eq!(config.rpc_url(), LOCALNET_RPC_URL);
        assert_eq!(config.gateway.pickup_interval_ms, 2_000);
        assert_eq!(config.gateway.pickup_attempts, 60);
        assert_eq!(config.gateway.callback_interval_ms, 1_000);
        assert_eq!(config.gateway.callback_attempts, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generate_sample() {
        let sample = ShadowlendConfig::generate_sample();
        assert!(sample.contains("[solana]"));
        assert!(sample.contains("[arcium]"));
        assert!(sample.contains("[gateway]"));
        assert!(sample.contains("[oracle]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = ShadowlendConfig::generate_sample();
        let parsed: ShadowlendConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.solana.network, Network::Devnet);
        assert_eq!(parsed.cluster_offset().unwrap(), 1_078_779_259);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: ShadowlendConfig = toml::from_str(
            r#"
            [solana]
            network = "devnet"

            [gateway]
            callback_attempts = 10
            "#,
        )
        .unwrap();
        assert_eq!(parsed.rpc_url(), DEVNET_RPC_URL);
        assert_eq!(parsed.gateway.callback_attempts, 10);
        assert_eq!(parsed.gateway.pickup_attempts, DEFAULT_PICKUP_ATTEMPTS);
    }

    #[test]
    fn test_devnet_requires_cluster_offset() {
        let mut config = ShadowlendConfig::default();
        config.solana.network = Network::Devnet;
        assert!(config.validate().is_err());

        config.arcium.cluster_offset = Some(7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = ShadowlendConfig::default();
        config.apply_overrides(vars(&[
            ("SL_NETWORK", "mainnet"),
            ("SOLANA_RPC_URL", "http://rpc.example:8899"),
            ("SL_CLUSTER_OFFSET", "42"),
            ("SL_CALLBACK_ATTEMPTS", "5"),
            ("SL_KEY_MATERIAL", "/tmp/k.json"),
        ]));

        assert_eq!(config.solana.network, Network::Mainnet);
        assert_eq!(config.rpc_url(), "http://rpc.example:8899");
        assert_eq!(config.cluster_offset().unwrap(), 42);
        assert_eq!(config.gateway.callback_attempts, 5);
        assert_eq!(config.key_material_path(), PathBuf::from("/tmp/k.json"));
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let mut config = ShadowlendConfig::default();
        config.apply_overrides(vars(&[("SL_PICKUP_ATTEMPTS", "lots")]));
        assert_eq!(config.gateway.pickup_attempts, DEFAULT_PICKUP_ATTEMPTS);
    }

    #[test]
    fn test_zero_bounds_are_rejected() {
        let mut config = ShadowlendConfig::default();
        config.gateway.pickup_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_program_id_is_rejected() {
        let mut config = ShadowlendConfig::default();
        config.solana.program_id = "nope".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mxe_public_key() {
        let mut config = ShadowlendConfig::default();
        assert!(config.mxe_public_key().is_err());

        let key = "ab".repeat(32);
        config.apply_overrides(vars(&[("SL_MXE_PUBLIC_KEY", key.as_str())]));
        assert_eq!(config.mxe_public_key().unwrap(), [0xab; 32]);

        config.arcium.mxe_public_key = Some("abcd".into());
        assert!(config.mxe_public_key().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_price_updates() {
        let mut config = ShadowlendConfig::default();
        let (sol, usdc) = config.price_updates().unwrap();
        assert_ne!(sol, usdc);

        let feed = Pubkey::new_unique().to_string();
        config.apply_overrides(vars(&[("SL_USDC_PRICE_UPDATE", feed.as_str())]));
        assert_eq!(config.price_updates().unwrap().1.to_string(), feed);

        config.oracle.sol_price_update = "not-a-key".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[arcium]\ncluster_offset = 99\n").unwrap();

        let config = ShadowlendConfig::read_file(&path).unwrap();
        assert_eq!(config.arcium.cluster_offset, Some(99));
    }
}
