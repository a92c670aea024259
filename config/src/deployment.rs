//! Deployment record written when a market is set up.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use shadowlend_address::ProtocolAddresses;
use solana_sdk::pubkey::Pubkey;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// JSON document naming the deployed program and its market accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub program_id: String,
    pub pool: String,
    pub collateral_mint: String,
    pub borrow_mint: String,
    pub collateral_vault: String,
    pub borrow_vault: String,
}

/// A deployment record with every address parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub program_id: Pubkey,
    pub pool: Pubkey,
    pub collateral_mint: Pubkey,
    pub borrow_mint: Pubkey,
    pub collateral_vault: Pubkey,
    pub borrow_vault: Pubkey,
}

fn parse(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("deployment.{field} is not an address: {value}"))
}

impl DeploymentRecord {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment record: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse deployment record: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write deployment record: {}", path.display()))
    }

    /// Record the derived market accounts for a freshly initialized pool.
    pub fn derive(program_id: Pubkey, collateral_mint: Pubkey, borrow_mint: Pubkey) -> Result<Self> {
        let book = ProtocolAddresses::new(program_id);
        let pool = book.pool()?.address;
        Ok(Self {
            program_id: program_id.to_string(),
            pool: pool.to_string(),
            collateral_mint: collateral_mint.to_string(),
            borrow_mint: borrow_mint.to_string(),
            collateral_vault: book.collateral_vault(&pool)?.address.to_string(),
            borrow_vault: book.borrow_vault(&pool)?.address.to_string(),
        })
    }

    pub fn resolve(&self) -> Result<Deployment> {
        Ok(Deployment {
            program_id: parse("program_id", &self.program_id)?,
            pool: parse("pool", &self.pool)?,
            collateral_mint: parse("collateral_mint", &self.collateral_mint)?,
            borrow_mint: parse("borrow_mint", &self.borrow_mint)?,
            collateral_vault: parse("collateral_vault", &self.collateral_vault)?,
            borrow_vault: parse("borrow_vault", &self.borrow_vault)?,
        })
    }

    /// Resolve and check the pool and vaults against their derived addresses.
    pub fn verify(&self) -> Result<Deployment> {
        let deployment = self.resolve()?;
        let book = ProtocolAddresses::new(deployment.program_id);

        let pool = book.pool()?.address;
        if pool != deployment.pool {
            bail!("deployment pool {} does not match derived {pool}", deployment.pool);
        }
        let collateral_vault = book.collateral_vault(&pool)?.address;
        if collateral_vault != deployment.collateral_vault {
            bail!(
                "deployment collateral_vault {} does not match derived {collateral_vault}",
                deployment.collateral_vault
            );
        }
        let borrow_vault = book.borrow_vault(&pool)?.address;
        if borrow_vault != deployment.borrow_vault {
            bail!(
                "deployment borrow_vault {} does not match derived {borrow_vault}",
                deployment.borrow_vault
            );
        }
        Ok(deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowlend_address::{SHADOWLEND_PROGRAM_ID, parse_program_id};

    fn record() -> DeploymentRecord {
        DeploymentRecord::derive(
            parse_program_id(SHADOWLEND_PROGRAM_ID).unwrap(),
            Pubkey::new_from_array([1u8; 32]),
            Pubkey::new_from_array([2u8; 32]),
        )
        .unwrap()
    }

    #[test]
    fn derived_record_verifies() {
        let deployment = record().verify().unwrap();
        assert_eq!(deployment.borrow_mint, Pubkey::new_from_array([2u8; 32]));
    }

    #[test]
    fn tampered_vault_fails_verification() {
        let mut record = record();
        record.borrow_vault = record.collateral_vault.clone();
        assert!(record.resolve().is_ok());
        assert!(record.verify().is_err());
    }

    #[test]
    fn garbage_address_names_the_field() {
        let mut record = record();
        record.pool = "xyz".into();
        let err = record.resolve().unwrap_err();
        assert!(err.to_string().contains("deployment.pool"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deployment.json");
        let original = record();
        original.save(&path).unwrap();
        assert_eq!(DeploymentRecord::load(&path).unwrap(), original);
    }
}
