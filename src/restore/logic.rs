// glacierrestore/src/restore/logic.rs
use uuid::Uuid;

use crate::config::RestoreOptions;
use crate::errors::{AppError, Result};
use crate::manifest::{self, LoadedManifest, RestoreRequest};
use crate::notify::{AlertKind, Event, Notify, RunContext};
use crate::restore::poller::{PollSettings, PollVerdict, poll_until_restored};
use crate::restore::promote::promote_object;
use crate::restore::resolver::resolve_object;
use crate::restore::store::{ObjectStore, RestoreOutcome};

/// Lifecycle of one restore job. Transitions are strictly forward; no phase
/// is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobPhase {
    Validating,
    Resolving,
    Initiating,
    InProgress,
    Copying,
    Done,
    Failed,
}

/// Runtime state bound to one manifest row. Owned by the batch loop; a job is
/// never shared, so no two control flows ever poll or copy the same key.
#[derive(Debug)]
pub struct RestoreJob {
    pub id: Uuid,
    pub request: RestoreRequest,
    pub object_key: Option<String>,
    pub phase: JobPhase,
    pub history: Vec<JobPhase>,
}

impl RestoreJob {
    pub fn new(request: RestoreRequest) -> Self {
        RestoreJob {
            id: Uuid::new_v4(),
            request,
            object_key: None,
            phase: JobPhase::Validating,
            history: vec![JobPhase::Validating],
        }
    }

    fn advance(&mut self, next: JobPhase) {
        debug_assert!(next >= self.phase, "job phases only move forward");
        self.phase = next;
        self.history.push(next);
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub rejected: usize,
}

/// Drives one job from resolution through promotion. Errors bubble up to the
/// batch loop, which classifies them for notification.
pub async fn run_job<S: ObjectStore, N: Notify>(
    store: &S,
    notifier: &N,
    ctx: &RunContext,
    job: &mut RestoreJob,
    poll: &PollSettings,
    restore_days: i32,
) -> Result<()> {
    let bucket = job.request.s3_bucket_name.clone();

    job.advance(JobPhase::Resolving);
    let key = resolve_object(store, &mut job.request).await?;
    job.object_key = Some(key.clone());

    job.advance(JobPhase::Initiating);
    let outcome = store
        .initiate_restore(&bucket, &key, job.request.retrieval_tier, restore_days)
        .await?;
    match outcome {
        RestoreOutcome::AlreadyRestored => {
            println!(
                "ℹ️ [{}] s3://{}/{} is already outside the Glacier tier; skipping the wait.",
                job.id, bucket, key
            );
        }
        RestoreOutcome::Accepted => {
            println!(
                "🧊 [{}] Restore of s3://{}/{} accepted ({:?} tier, {} day(s)).",
                job.id, bucket, key, job.request.retrieval_tier, restore_days
            );
            job.advance(JobPhase::InProgress);
            match poll_until_restored(store, job.id, &bucket, &key, poll).await? {
                PollVerdict::NeverArchived => {
                    notify_best_effort(
                        notifier,
                        ctx,
                        &Event::new(
                            AlertKind::NeverArchived,
                            format!(
                                "File '{}' was not in the Glacier storage class.",
                                job.request.label()
                            ),
                        ),
                    )
                    .await;
                    job.advance(JobPhase::Done);
                    return Ok(());
                }
                PollVerdict::Restored => {}
            }
        }
    }

    job.advance(JobPhase::Copying);
    promote_object(store, job.id, &bucket, &key).await?;
    notify_best_effort(
        notifier,
        ctx,
        &Event::new(
            AlertKind::Completion,
            format!(
                "File '{}' has been restored from the Glacier storage class.",
                job.request.label()
            ),
        ),
    )
    .await;
    job.advance(JobPhase::Done);
    Ok(())
}

/// Processes a loaded manifest sequentially. Each record is validated and run
/// in isolation; only a storage-level failure while listing the bucket aborts
/// the whole batch.
pub async fn run_batch<S: ObjectStore, N: Notify>(
    store: &S,
    notifier: &N,
    manifest: LoadedManifest,
    options: &RestoreOptions,
) -> Result<BatchSummary> {
    let mut ctx = RunContext::new();
    for request in &manifest.records {
        ctx.add_recipient(&request.email);
    }
    println!(
        "📋 [{}] Manifest holds {} parseable record(s), {} malformed.",
        ctx.run_id,
        manifest.records.len(),
        manifest.malformed.len()
    );

    let mut summary = BatchSummary::default();

    for (row, reason) in &manifest.malformed {
        summary.rejected += 1;
        eprintln!(
            "❌ [{}] Manifest row {} could not be parsed: {}",
            ctx.run_id, row, reason
        );
        notify_best_effort(
            notifier,
            &ctx,
            &Event::new(
                AlertKind::ValidationFailure,
                format!("Manifest row {} could not be parsed: {}.", row, reason),
            ),
        )
        .await;
    }

    let mut accepted = Vec::new();
    for request in manifest.records {
        if let Err(e) = manifest::check_required_fields(&request) {
            summary.rejected += 1;
            eprintln!("❌ [{}] {}", ctx.run_id, e);
            notify_best_effort(
                notifier,
                &ctx,
                &Event::new(AlertKind::ValidationFailure, e.to_string()),
            )
            .await;
            continue;
        }

        // An unreachable storage service is the one genuinely global failure;
        // let it abort the run instead of rejecting every record one by one.
        let prefix = request.partial_prefix();
        let keys = store.list_keys(&request.s3_bucket_name, &prefix).await?;
        if keys.is_empty() {
            summary.rejected += 1;
            let detail = format!(
                "No backup objects exist under '{}' in bucket '{}'.",
                prefix, request.s3_bucket_name
            );
            eprintln!("❌ [{}] {}", ctx.run_id, detail);
            notify_best_effort(notifier, &ctx, &Event::new(AlertKind::NotFound, detail)).await;
            continue;
        }

        accepted.push(request);
    }

    if accepted.is_empty() {
        println!("ℹ️ [{}] No restorable records; nothing to do.", ctx.run_id);
        return Ok(summary);
    }

    let poll = PollSettings {
        interval: options.poll_interval,
        max_attempts: options.max_poll_attempts,
    };
    for request in accepted {
        let mut job = RestoreJob::new(request);
        println!(
            "🚀 [{}] Processing restore of '{}'.",
            job.id,
            job.request.label()
        );
        match run_job(store, notifier, &ctx, &mut job, &poll, options.restore_days).await {
            Ok(()) => summary.completed += 1,
            Err(e) => {
                job.advance(JobPhase::Failed);
                summary.failed += 1;
                let target = job
                    .object_key
                    .clone()
                    .unwrap_or_else(|| job.request.label());
                eprintln!("❌ [{}] Restore of '{}' failed: {}", job.id, target, e);
                if let Some(event) = failure_event(&job.request, &e) {
                    notify_best_effort(notifier, &ctx, &event).await;
                }
            }
        }
    }

    println!(
        "🏁 [{}] Batch finished: {} completed, {} failed, {} rejected.",
        ctx.run_id, summary.completed, summary.failed, summary.rejected
    );
    Ok(summary)
}

fn failure_event(request: &RestoreRequest, err: &AppError) -> Option<Event> {
    match err {
        AppError::Validation(msg) => Some(Event::new(AlertKind::ValidationFailure, msg.clone())),
        AppError::NotFound(_) => Some(Event::new(
            AlertKind::NotFound,
            format!(
                "File name provided '{}' does not exist in this S3 bucket.",
                request.label()
            ),
        )),
        // A failed date match is logged but produces no email.
        AppError::Resolution(_) => None,
        other => Some(Event::new(
            AlertKind::GenericFailure,
            format!(
                "Restore of '{}' did not complete ({})",
                request.label(),
                other
            ),
        )),
    }
}

async fn notify_best_effort<N: Notify>(notifier: &N, ctx: &RunContext, event: &Event) {
    if let Err(e) = notifier.send(ctx, event).await {
        eprintln!("⚠️ [{}] Failed to send notification: {}", ctx.run_id, e);
    }
}
