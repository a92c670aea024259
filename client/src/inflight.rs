//! Client-side discipline for concurrent requests.
//!
//! Two requests against the same obligation race on its state nonce, so at
//! most one may be in flight per obligation. Computation offsets are
//! single-use: once issued, an offset is never handed out again.

use dashmap::DashSet;
use rand_core::{OsRng, TryRngCore};
use solana_sdk::pubkey::Pubkey;

use crate::error::GatewayError;

/// Obligations with an operation between submission and a terminal state.
#[derive(Debug, Default)]
pub struct InFlight {
    obligations: DashSet<Pubkey>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `obligation` until the returned guard is dropped.
    pub fn acquire(&self, obligation: Pubkey) -> Result<InFlightGuard<'_>, GatewayError> {
        if !self.obligations.insert(obligation) {
            log::warn!("refusing second request for busy obligation {obligation}");
            return Err(GatewayError::ObligationBusy(obligation));
        }
        Ok(InFlightGuard {
            registry: self,
            obligation,
        })
    }

    pub fn is_busy(&self, obligation: &Pubkey) -> bool {
        self.obligations.contains(obligation)
    }

    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }
}

/// Releases the obligation on drop, whatever the outcome.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    registry: &'a InFlight,
    obligation: Pubkey,
}

impl InFlightGuard<'_> {
    pub fn obligation(&self) -> Pubkey {
        self.obligation
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.obligations.remove(&self.obligation);
    }
}

/// Hands out random computation offsets, never the same one twice.
///
/// Every issued offset is remembered for the allocator's lifetime, about
/// 8 bytes plus set overhead per request. Long-lived callers can watch
/// [`len`](Self::len); a fresh allocator only loses the duplicate check
/// against its predecessor, and offsets are drawn from the full u64 range.
#[derive(Debug, Default)]
pub struct OffsetAllocator {
    issued: DashSet<u64>,
}

impl OffsetAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Result<u64, GatewayError> {
        loop {
            let offset = OsRng
                .try_next_u64()
                .map_err(|e| GatewayError::Randomness(e.to_string()))?;
            if self.issued.insert(offset) {
                return Ok(offset);
            }
        }
    }

    /// Record an offset chosen elsewhere. Returns false if already used.
    pub fn reserve(&self, offset: u64) -> bool {
        self.issued.insert(offset)
    }

    pub fn was_issued(&self, offset: u64) -> bool {
        self.issued.contains(&offset)
    }

    /// Number of offsets issued or reserved so far.
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_rejected_until_release() {
        let registry = InFlight::new();
        let obligation = Pubkey::new_from_array([1u8; 32]);

        let guard = registry.acquire(obligation).unwrap();
        assert!(registry.is_busy(&obligation));
        assert!(matches!(
            registry.acquire(obligation),
            Err(GatewayError::ObligationBusy(o)) if o == obligation
        ));

        drop(guard);
        assert!(!registry.is_busy(&obligation));
        assert!(registry.acquire(obligation).is_ok());
    }

    #[test]
    fn different_obligations_do_not_conflict() {
        let registry = InFlight::new();
        let _a = registry.acquire(Pubkey::new_from_array([1u8; 32])).unwrap();
        let _b = registry.acquire(Pubkey::new_from_array([2u8; 32])).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn offsets_are_never_reissued() {
        let offsets = OffsetAllocator::new();
        assert!(offsets.is_empty());
        let first = offsets.next().unwrap();
        assert!(offsets.was_issued(first));
        assert!(!offsets.reserve(first));

        let many: std::collections::HashSet<u64> =
            (0..256).map(|_| offsets.next().unwrap()).collect();
        assert_eq!(many.len(), 256);
        assert!(!many.contains(&first));
        assert_eq!(offsets.len(), 257);
    }
}
