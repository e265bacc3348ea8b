//! Transactional application of a [`MovePlan`].
//!
//! ```text
//! Idle -> SessionStarted -> TransactionStarted -> Applying -> Committed -> SessionEnded
//!                                                          \-> Aborted  -/
//! ```
//!
//! Container prepends are applied first, in plan order, then item prepends.
//! Any failure while applying or committing aborts the transaction, so the
//! store is left exactly as it was, and the original error is returned after
//! the session has been released. Nothing is retried here: the plan was built
//! from a snapshot that may be stale once a conflict is seen, so a retry means
//! re-reading and re-planning.

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use tree_inventory::{MovePlan, PrependOutcome};

use crate::store::{DocumentStore, StoreError, StoreSession};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPhase {
    Idle,
    SessionStarted,
    TransactionStarted,
    Applying,
    Committed,
    Aborted,
    SessionEnded,
}

/// Per-collection prepend counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyCounts {
    pub prepended: usize,
    pub already_current: usize,
}

impl ApplyCounts {
    fn record(&mut self, outcome: PrependOutcome) {
        match outcome {
            PrependOutcome::Prepended => self.prepended += 1,
            PrependOutcome::AlreadyCurrent => self.already_current += 1,
        }
    }
}

/// Outcome of a committed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub containers: ApplyCounts,
    pub items: ApplyCounts,
    /// Phases walked through, in order.
    pub phases: Vec<TransactionPhase>,
    /// Set when the commit succeeded but releasing the session did not.
    pub release_fault: Option<String>,
}

#[derive(Debug)]
struct PhaseLog {
    phases: Vec<TransactionPhase>,
}

impl PhaseLog {
    fn new() -> Self {
        Self {
            phases: vec![TransactionPhase::Idle],
        }
    }

    fn advance(&mut self, next: TransactionPhase) {
        if let Some(current) = self.phases.last() {
            debug!(from = ?current, to = ?next, "transaction phase");
        }
        self.phases.push(next);
    }
}

/// Applies move plans against a [`DocumentStore`], one transaction per plan.
#[derive(Debug)]
pub struct TransactionalApplier<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S> TransactionalApplier<'s, S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    #[instrument(
        skip(self, plan),
        fields(
            container_updates = plan.container_updates.len(),
            item_updates = plan.item_updates.len()
        ),
        err
    )]
    pub async fn apply(&self, plan: &MovePlan) -> Result<ApplyReport, StoreError> {
        let mut log = PhaseLog::new();

        info!("starting session...");
        let mut session = self.store.start_session().await?;
        log.advance(TransactionPhase::SessionStarted);

        let outcome = run_transaction(&mut session, plan, &mut log).await;

        // Exactly one release on every path; `end_session` consumes the session.
        let released = session.end_session().await;
        log.advance(TransactionPhase::SessionEnded);

        match (outcome, released) {
            (Ok(counts), Ok(())) => Ok(report(counts, log, None)),
            (Ok(counts), Err(fault)) => {
                warn!(error = %fault, "transaction committed but session release failed");
                Ok(report(counts, log, Some(fault.to_string())))
            }
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(fault)) => {
                warn!(error = %fault, "session release failed after aborted transaction");
                Err(err)
            }
        }
    }
}

fn report(
    (containers, items): (ApplyCounts, ApplyCounts),
    log: PhaseLog,
    release_fault: Option<String>,
) -> ApplyReport {
    ApplyReport {
        containers,
        items,
        phases: log.phases,
        release_fault,
    }
}

async fn run_transaction<T: StoreSession>(
    session: &mut T,
    plan: &MovePlan,
    log: &mut PhaseLog,
) -> Result<(ApplyCounts, ApplyCounts), StoreError> {
    info!("starting transaction...");
    session.start_transaction().await?;
    log.advance(TransactionPhase::TransactionStarted);

    log.advance(TransactionPhase::Applying);
    let applied = match apply_updates(session, plan).await {
        Ok(counts) => {
            info!("committing transaction...");
            session.commit_transaction().await.map(|()| counts)
        }
        Err(err) => Err(err),
    };

    match applied {
        Ok(counts) => {
            log.advance(TransactionPhase::Committed);
            info!(
                containers_prepended = counts.0.prepended,
                items_prepended = counts.1.prepended,
                "transaction complete!"
            );
            Ok(counts)
        }
        Err(err) => {
            error!(error = %err, "there was a problem with the transaction; aborting");
            if let Err(abort_err) = session.abort_transaction().await {
                warn!(error = %abort_err, "abort failed");
            }
            log.advance(TransactionPhase::Aborted);
            Err(err)
        }
    }
}

async fn apply_updates<T: StoreSession>(
    session: &mut T,
    plan: &MovePlan,
) -> Result<(ApplyCounts, ApplyCounts), StoreError> {
    let mut containers = ApplyCounts::default();
    for update in &plan.container_updates {
        containers.record(session.prepend_container_history(update).await?);
    }

    let mut items = ApplyCounts::default();
    for update in &plan.item_updates {
        items.record(session.prepend_item_history(update).await?);
    }

    Ok((containers, items))
}
