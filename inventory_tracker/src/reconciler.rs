//! Catalog reconciliation
//!
//! One pass fetches a remote snapshot, walks the union of remote and local
//! SKUs in order, and commits each resolved record through the store. The
//! merge policy per SKU:
//!
//! | local vs remote                       | action                                   | outcome           |
//! |---------------------------------------|------------------------------------------|-------------------|
//! | remote only                           | create local record                      | `Applied`         |
//! | local only                            | keep, never delete                       | `Unchanged`       |
//! | same version, clean                   | nothing                                  | `Unchanged`       |
//! | same version, dirty                   | push local change (bounded retries)      | `Applied`/`Failed`|
//! | different version, clean              | overwrite from remote                    | `Applied`         |
//! | different version, dirty              | name/price from remote, quantity local   | `ConflictSkipped` |
//!
//! Only a failed fetch aborts a pass, and it does so before touching the
//! store. Per-SKU failures are reported and the pass moves on.

use crate::error::{GatewayError, InventoryError};
use crate::gateway::{CatalogGateway, PushAck, RemoteSnapshotEntry};
use crate::product::{validate_name, validate_price, validate_quantity, ProductRecord, Sku};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};

const DEFAULT_MAX_PUSH_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;
const DEFAULT_MAX_RETRY_AFTER_SECS: u64 = 60;

/// Retry settings for pushing local edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Total push attempts per SKU per pass, including the first one
    pub max_push_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on a server-supplied `Retry-After`
    pub max_retry_after: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_push_attempts: DEFAULT_MAX_PUSH_ATTEMPTS,
            base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            max_retry_after: Duration::from_secs(DEFAULT_MAX_RETRY_AFTER_SECS),
        }
    }
}

impl SyncPolicy {
    /// Exponential backoff after the given failed attempt (1-based), capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1_u32 << exp)
            .min(self.max_backoff)
    }

    /// Backoff that also honours a server-supplied `Retry-After`, capped at `max_retry_after`
    fn delay_after(&self, attempt: u32, err: &GatewayError) -> Duration {
        let backoff = self.backoff(attempt);
        match err {
            GatewayError::RateLimited {
                retry_after: Some(retry_after),
            } => backoff.max((*retry_after).min(self.max_retry_after)),
            _ => backoff,
        }
    }
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    wake: Notify,
}

/// Cooperative cancellation, checked before each SKU and raced against retry waits
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.wake.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            // Registered before the check so a concurrent cancel is not missed
            let notified = self.0.wake.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Result of reconciling one SKU
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOutcome {
    Applied,
    /// Both sides changed; remote kept for name/price, local kept for quantity.
    /// Both inputs are retained for inspection.
    ConflictSkipped {
        local: ProductRecord,
        remote: RemoteSnapshotEntry,
    },
    Failed {
        reason: String,
    },
    Unchanged,
}

impl SyncOutcome {
    fn failed(reason: impl Into<String>) -> Self {
        SyncOutcome::Failed {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkuOutcome {
    pub sku: Sku,
    pub outcome: SyncOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub applied: usize,
    pub conflict_skipped: usize,
    pub failed: usize,
    pub unchanged: usize,
}

impl OutcomeCounts {
    fn tally(outcomes: &[SkuOutcome]) -> Self {
        let mut counts = Self::default();
        for item in outcomes {
            match item.outcome {
                SyncOutcome::Applied => counts.applied += 1,
                SyncOutcome::ConflictSkipped { .. } => counts.conflict_skipped += 1,
                SyncOutcome::Failed { .. } => counts.failed += 1,
                SyncOutcome::Unchanged => counts.unchanged += 1,
            }
        }
        counts
    }
}

/// How a pass ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassStatus {
    Completed,
    /// The snapshot could not be fetched; nothing was applied
    Failed { reason: String },
    /// Stopped between SKUs; outcomes hold what was done before the stop
    Cancelled,
}

/// Report of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub status: PassStatus,
    /// Ordered by SKU
    pub outcomes: Vec<SkuOutcome>,
    pub counts: OutcomeCounts,
}

impl PassSummary {
    pub fn outcome_for(&self, sku: &str) -> Option<&SyncOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.sku.as_str() == sku)
            .map(|o| &o.outcome)
    }
}

/// Merges a remote snapshot into the local store
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn CatalogGateway>,
    policy: SyncPolicy,
    /// Held for a whole pass so passes never interleave
    pass_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn CatalogGateway>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            policy,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run one full pass. A pass already in progress is waited for first.
    pub async fn run_pass(&self, cancel: &CancelFlag) -> PassSummary {
        let _guard = self.pass_lock.lock().await;
        let started_at = Utc::now();
        let clock = Instant::now();

        log::info!("Starting reconciliation pass");

        let snapshot = match self.gateway.fetch_snapshot(None).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Failed to fetch catalog snapshot: {}", e);
                return PassSummary {
                    started_at,
                    elapsed: clock.elapsed(),
                    status: PassStatus::Failed {
                        reason: e.to_string(),
                    },
                    outcomes: Vec::new(),
                    counts: OutcomeCounts::default(),
                };
            }
        };

        let (outcomes, status) = self.apply_snapshot(snapshot, cancel).await;
        let counts = OutcomeCounts::tally(&outcomes);
        let elapsed = clock.elapsed();

        log::info!(
            "Reconciliation pass {:?} in {:?}: {} applied, {} conflicts, {} failed, {} unchanged",
            status,
            elapsed,
            counts.applied,
            counts.conflict_skipped,
            counts.failed,
            counts.unchanged
        );
        match self.store.count() {
            Ok(n) => log::info!("Local store holds {} product(s) after the pass", n),
            Err(e) => log::warn!("Failed to count local records: {}", e),
        }

        PassSummary {
            started_at,
            elapsed,
            status,
            outcomes,
            counts,
        }
    }

    async fn apply_snapshot(
        &self,
        snapshot: Vec<RemoteSnapshotEntry>,
        cancel: &CancelFlag,
    ) -> (Vec<SkuOutcome>, PassStatus) {
        let mut remote: BTreeMap<Sku, RemoteSnapshotEntry> = BTreeMap::new();
        for entry in snapshot {
            if let Some(previous) = remote.insert(entry.sku.clone(), entry) {
                log::warn!(
                    "Duplicate SKU {} in catalog snapshot, keeping the later entry",
                    previous.sku
                );
            }
        }

        let mut skus: BTreeSet<Sku> = remote.keys().cloned().collect();
        match self.store.list_all() {
            Ok(records) => skus.extend(records.into_iter().map(|r| r.sku)),
            Err(e) => {
                // Local-only SKUs would be reported Unchanged anyway; remote
                // SKUs are still reconciled one by one.
                log::error!("Failed to list local records: {}", e);
            }
        }

        let mut outcomes = Vec::with_capacity(skus.len());
        for sku in skus {
            if cancel.is_cancelled() {
                log::warn!("Reconciliation pass cancelled before {}", sku);
                return (outcomes, PassStatus::Cancelled);
            }
            let outcome = self.reconcile_sku(&sku, remote.get(&sku), cancel).await;
            log::debug!("{}: {:?}", sku, outcome);
            outcomes.push(SkuOutcome { sku, outcome });
        }

        // A cancel that interrupted the last SKU still ends the pass as cancelled
        let status = if cancel.is_cancelled() {
            PassStatus::Cancelled
        } else {
            PassStatus::Completed
        };
        (outcomes, status)
    }

    async fn reconcile_sku(
        &self,
        sku: &Sku,
        remote: Option<&RemoteSnapshotEntry>,
        cancel: &CancelFlag,
    ) -> SyncOutcome {
        // Read the record at the moment this SKU is examined
        let local = match self.store.get(sku) {
            Ok(record) => Some(record),
            Err(InventoryError::NotFound(_)) => None,
            Err(e) => return SyncOutcome::failed(e.to_string()),
        };

        match (local, remote) {
            (None, Some(remote)) => self.create_from_remote(remote),
            (Some(_), None) | (None, None) => SyncOutcome::Unchanged,
            (Some(local), Some(remote)) => {
                let same_version = local.remote_version.as_deref() == Some(remote.remote_version.as_str());
                match (same_version, local.dirty) {
                    (true, false) => SyncOutcome::Unchanged,
                    (true, true) => self.push_local(local, cancel).await,
                    (false, false) => self.overwrite_from_remote(local, remote),
                    (false, true) => self.resolve_conflict(local, remote),
                }
            }
        }
    }

    fn commit(&self, record: ProductRecord, outcome: SyncOutcome) -> SyncOutcome {
        match self.store.upsert(record) {
            Ok(_) => outcome,
            Err(e) => SyncOutcome::failed(e.to_string()),
        }
    }

    fn create_from_remote(&self, remote: &RemoteSnapshotEntry) -> SyncOutcome {
        let record = match record_from_remote(remote) {
            Ok(record) => record,
            Err(reason) => return SyncOutcome::failed(reason),
        };
        self.commit(record, SyncOutcome::Applied)
    }

    fn overwrite_from_remote(
        &self,
        local: ProductRecord,
        remote: &RemoteSnapshotEntry,
    ) -> SyncOutcome {
        let record = match record_from_remote(remote) {
            Ok(record) => record,
            Err(reason) => return SyncOutcome::failed(reason),
        };
        if record.same_catalog_fields(&local) {
            log::debug!("{}: remote version moved without field changes", local.sku);
        }
        self.commit(record, SyncOutcome::Applied)
    }

    fn resolve_conflict(&self, local: ProductRecord, remote: &RemoteSnapshotEntry) -> SyncOutcome {
        // The whole remote entry must be valid, including the quantity we do not adopt
        let mut resolved = match record_from_remote(remote) {
            Ok(record) => record,
            Err(reason) => return SyncOutcome::failed(reason),
        };

        log::warn!(
            "{}: conflicting edits (local {:?}, remote {}), keeping remote name/price and local quantity",
            local.sku,
            local.remote_version,
            remote.remote_version
        );

        // The local count still has to reach the remote on a later pass
        resolved.dirty = resolved.quantity_on_hand != local.quantity_on_hand;
        resolved.quantity_on_hand = local.quantity_on_hand;

        self.commit(
            resolved,
            SyncOutcome::ConflictSkipped {
                local,
                remote: remote.clone(),
            },
        )
    }

    async fn push_local(&self, pushed: ProductRecord, cancel: &CancelFlag) -> SyncOutcome {
        let ack = match self.push_with_retry(&pushed, cancel).await {
            Ok(ack) => ack,
            Err(reason) => return SyncOutcome::failed(reason),
        };

        // The user may have edited the record while the push was in flight
        let committed = self
            .store
            .update(&pushed.sku, &mut |current: &mut ProductRecord| {
                current.dirty = !current.same_catalog_fields(&pushed);
                current.remote_version = Some(ack.remote_version.clone());
                current.last_synced_at = Some(Utc::now());
                Ok(())
            });

        match committed {
            Ok(_) => SyncOutcome::Applied,
            Err(InventoryError::NotFound(_)) => {
                SyncOutcome::failed("Record removed locally while push was in flight")
            }
            Err(e) => SyncOutcome::failed(e.to_string()),
        }
    }

    async fn push_with_retry(
        &self,
        record: &ProductRecord,
        cancel: &CancelFlag,
    ) -> Result<PushAck, String> {
        let max_attempts = self.policy.max_push_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.gateway.push_local_change(record).await {
                Ok(ack) => return Ok(ack),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt, &e);
                    log::warn!(
                        "Push of {} failed (attempt {}/{}): {}, retrying in {:?}",
                        record.sku,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            log::warn!("Push of {} abandoned, pass cancelled", record.sku);
                            return Err("cancelled".to_string());
                        }
                    }
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    log::error!(
                        "Giving up on push of {} after {} attempts: {}",
                        record.sku,
                        attempt,
                        e
                    );
                    return Err(format!("transient: {} (after {} attempts)", e, attempt));
                }
                Err(e) => {
                    log::error!("Push of {} rejected: {}", record.sku, e);
                    return Err(e.to_string());
                }
            }
        }
    }
}

/// Build a clean, synced record from a remote entry
fn record_from_remote(remote: &RemoteSnapshotEntry) -> Result<ProductRecord, String> {
    let invalid = |e: InventoryError| format!("Invalid remote entry: {}", e);
    Ok(ProductRecord {
        sku: remote.sku.clone(),
        display_name: validate_name(&remote.display_name).map_err(invalid)?,
        unit_price: validate_price(remote.unit_price).map_err(invalid)?,
        quantity_on_hand: validate_quantity(remote.quantity_on_hand).map_err(invalid)?,
        remote_version: Some(remote.remote_version.clone()),
        last_synced_at: Some(Utc::now()),
        dirty: false,
    })
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
