//! Reminder Scheduler: in-memory registry of pending medicine occurrences.
//!
//! Every future occurrence of every medicine becomes one tokio task that
//! sleeps until its firing time. The task handles are kept per reminder set
//! so rescheduling and deactivation can abort the ones that have not fired.
//!
//! Lifecycle of one occurrence:
//! `Pending → Fired → Delivered | DeliveryFailed`, or `Pending → Cancelled`.
//! A job leaves the registry as soon as it reaches a terminal state. The
//! `Pending → Fired` step and cancellation both happen under the registry
//! lock, so a cancelled job never sends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db::repository::{mark_medicine_sent, record_delivery};
use crate::db::Database;
use crate::models::enums::DeliveryStatus;
use crate::models::{DeliveryRecord, ReminderSet};
use crate::notify::{NotificationGateway, NotificationResult};

/// SMS text for one reminder.
pub fn reminder_message(medicine_name: &str) -> String {
    format!("It's time to take your medicine: {medicine_name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Fired,
    Delivered,
    DeliveryFailed,
    Cancelled,
}

/// One registered occurrence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub job_id: Uuid,
    pub reminder_set_id: Uuid,
    pub medicine_id: Uuid,
    pub medicine_name: String,
    /// Day offset from the medicine's first time, `0..reminder_days`.
    pub occurrence_index: u32,
    pub firing_time: DateTime<Utc>,
    pub state: JobState,
}

struct JobEntry {
    job: ScheduledJob,
    handle: JoinHandle<JobState>,
}

type Registry = HashMap<Uuid, Vec<JobEntry>>;

struct SchedulerInner {
    db: Database,
    gateway: Arc<NotificationGateway>,
    jobs: Mutex<Registry>,
}

/// Cheap to clone; every clone shares the same registry.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<SchedulerInner>,
}

impl ReminderScheduler {
    pub fn new(db: Database, gateway: Arc<NotificationGateway>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                db,
                gateway,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Replace every pending job of `set` with a fresh schedule.
    ///
    /// Occurrences at or before now are skipped. An inactive set only has
    /// its jobs cancelled. Returns the number of jobs registered.
    pub fn schedule(&self, set: &ReminderSet) -> usize {
        let now = Utc::now();
        let mut jobs = self.lock_jobs();

        let cancelled = cancel_locked(&mut jobs, &set.id);
        if cancelled > 0 {
            tracing::info!(reminder_id = %set.id, cancelled, "Cancelled previous reminder jobs");
        }

        if !set.is_active {
            return 0;
        }

        let mut count = 0;
        let entries = jobs.entry(set.id).or_default();
        for medicine in &set.medicines {
            for offset in 0..set.reminder_days {
                let firing_time = medicine.time + chrono::Duration::days(i64::from(offset));
                if firing_time <= now {
                    tracing::debug!(
                        reminder_id = %set.id,
                        medicine = %medicine.name,
                        %firing_time,
                        "Skipping past reminder"
                    );
                    continue;
                }

                let job = ScheduledJob {
                    job_id: Uuid::new_v4(),
                    reminder_set_id: set.id,
                    medicine_id: medicine.id,
                    medicine_name: medicine.name.clone(),
                    occurrence_index: offset,
                    firing_time,
                    state: JobState::Pending,
                };
                let delay = (firing_time - now).to_std().unwrap_or_default();
                // Spawned under the registry lock: the task cannot look
                // itself up before its entry exists.
                let handle = tokio::spawn(run_job(
                    Arc::clone(&self.inner),
                    job.clone(),
                    set.phone_number.clone(),
                    delay,
                ));
                tracing::info!(
                    reminder_id = %set.id,
                    medicine = %medicine.name,
                    %firing_time,
                    "Scheduled reminder"
                );
                entries.push(JobEntry { job, handle });
                count += 1;
            }
        }

        if entries.is_empty() {
            jobs.remove(&set.id);
        }
        count
    }

    /// Abort every job of the set that has not fired yet.
    /// In-flight sends are left to complete.
    pub fn cancel(&self, reminder_set_id: &Uuid) -> usize {
        let mut jobs = self.lock_jobs();
        let cancelled = cancel_locked(&mut jobs, reminder_set_id);
        if cancelled > 0 {
            tracing::info!(reminder_id = %reminder_set_id, cancelled, "Cancelled reminder jobs");
        }
        cancelled
    }

    /// Jobs of the set still in the registry, earliest first.
    pub fn pending_jobs(&self, reminder_set_id: &Uuid) -> Vec<ScheduledJob> {
        let jobs = self.lock_jobs();
        let mut list: Vec<ScheduledJob> = jobs
            .get(reminder_set_id)
            .map(|entries| entries.iter().map(|e| e.job.clone()).collect())
            .unwrap_or_default();
        list.sort_by_key(|j| j.firing_time);
        list
    }

    pub fn pending_count(&self, reminder_set_id: &Uuid) -> usize {
        self.lock_jobs().get(reminder_set_id).map_or(0, Vec::len)
    }

    /// Jobs across all sets.
    pub fn total_pending(&self) -> usize {
        self.lock_jobs().values().map(Vec::len).sum()
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner.lock_jobs()
    }
}

impl SchedulerInner {
    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.jobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Move the job from `Pending` to `Fired` under the registry lock.
    /// False when a cancel removed it first; the job must not send.
    fn claim(&self, job: &ScheduledJob) -> bool {
        let mut jobs = self.lock_jobs();
        match jobs
            .get_mut(&job.reminder_set_id)
            .and_then(|entries| entries.iter_mut().find(|e| e.job.job_id == job.job_id))
        {
            Some(entry) if entry.job.state == JobState::Pending => {
                entry.job.state = JobState::Fired;
                true
            }
            _ => false,
        }
    }

    /// Drop a finished job from the registry.
    fn finish(&self, job: &ScheduledJob) {
        let mut jobs = self.lock_jobs();
        if let Some(entries) = jobs.get_mut(&job.reminder_set_id) {
            entries.retain(|e| e.job.job_id != job.job_id);
            if entries.is_empty() {
                jobs.remove(&job.reminder_set_id);
            }
        }
    }

    fn persist_outcome(&self, job: &ScheduledJob, result: &NotificationResult) {
        if result.success {
            match self
                .db
                .with_conn(|conn| mark_medicine_sent(conn, &job.reminder_set_id, &job.medicine_id))
            {
                Ok(true) => {
                    tracing::debug!(reminder_id = %job.reminder_set_id, medicine = %job.medicine_name, "Updated sent status");
                }
                Ok(false) => {
                    tracing::warn!(
                        reminder_id = %job.reminder_set_id,
                        medicine = %job.medicine_name,
                        "Medicine no longer exists, sent status not updated"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        reminder_id = %job.reminder_set_id,
                        medicine = %job.medicine_name,
                        error = %e,
                        "Failed to update sent status"
                    );
                }
            }
        }

        let status = if !result.success {
            DeliveryStatus::Failed
        } else if result.simulated {
            DeliveryStatus::Simulated
        } else {
            DeliveryStatus::Delivered
        };
        let record = DeliveryRecord {
            id: Uuid::new_v4(),
            reminder_set_id: job.reminder_set_id,
            medicine_id: job.medicine_id,
            occurrence_index: job.occurrence_index,
            occurrence_date: job.firing_time.date_naive(),
            status,
            provider_id: result.provider_id.clone(),
            error: result.error.clone(),
            attempted_at: Utc::now(),
        };
        if let Err(e) = self.db.with_conn(|conn| record_delivery(conn, &record)) {
            tracing::error!(reminder_id = %job.reminder_set_id, error = %e, "Failed to record delivery");
        }
    }
}

/// Abort the set's pending jobs; fired ones stay registered until done.
fn cancel_locked(jobs: &mut Registry, reminder_set_id: &Uuid) -> usize {
    let Some(entries) = jobs.remove(reminder_set_id) else {
        return 0;
    };

    let (pending, in_flight): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| e.job.state == JobState::Pending);
    if !in_flight.is_empty() {
        jobs.insert(*reminder_set_id, in_flight);
    }

    for entry in &pending {
        entry.handle.abort();
        tracing::debug!(
            job_id = %entry.job.job_id,
            medicine = %entry.job.medicine_name,
            state = ?JobState::Cancelled,
            "Reminder job cancelled"
        );
    }
    pending.len()
}

async fn run_job(
    inner: Arc<SchedulerInner>,
    job: ScheduledJob,
    phone_number: String,
    delay: std::time::Duration,
) -> JobState {
    tokio::time::sleep(delay).await;
    // `abort` only lands at the next await, so a cancel racing the timer
    // is settled here.
    if !inner.claim(&job) {
        tracing::debug!(job_id = %job.job_id, medicine = %job.medicine_name, "Reminder job cancelled before sending");
        return JobState::Cancelled;
    }

    tracing::info!(
        reminder_id = %job.reminder_set_id,
        medicine = %job.medicine_name,
        occurrence = job.occurrence_index,
        "Sending reminder"
    );
    let result = inner
        .gateway
        .send(&phone_number, &reminder_message(&job.medicine_name))
        .await;
    inner.persist_outcome(&job, &result);

    let state = if result.success {
        JobState::Delivered
    } else {
        tracing::warn!(
            reminder_id = %job.reminder_set_id,
            medicine = %job.medicine_name,
            error = result.error.as_deref().unwrap_or("unknown"),
            "Reminder delivery failed"
        );
        JobState::DeliveryFailed
    };
    inner.finish(&job);
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{
        get_reminder_set, insert_reminder_set, list_deliveries, set_reminder_active, NewMedicine,
    };
    use crate::models::enums::Recurrence;
    use crate::notify::{MockSmsProvider, ProviderError};
    use crate::config::RuntimeEnv;
    use std::time::Duration;

    fn medicine(name: &str, time: DateTime<Utc>) -> NewMedicine {
        NewMedicine {
            name: name.into(),
            time,
            sent_status: false,
            recurrence: Recurrence::Daily,
        }
    }

    fn store(db: &Database, medicines: &[NewMedicine], days: u32) -> ReminderSet {
        db.with_conn(|conn| insert_reminder_set(conn, "9876543210", medicines, days, Utc::now()))
            .unwrap()
    }

    fn scheduler_with(provider: Option<Arc<MockSmsProvider>>) -> (Database, ReminderScheduler) {
        let db = Database::in_memory().unwrap();
        let provider = provider.map(|p| p as Arc<dyn crate::notify::SmsProvider>);
        let gateway = Arc::new(NotificationGateway::new(provider, "91", RuntimeEnv::Development));
        let scheduler = ReminderScheduler::new(db.clone(), gateway);
        (db, scheduler)
    }

    /// Advance paused time until the set has no jobs left.
    async fn drain(scheduler: &ReminderScheduler, set_id: &Uuid) {
        for _ in 0..24 * 40 {
            if scheduler.pending_count(set_id) == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        panic!("jobs never drained");
    }

    #[test]
    fn message_names_the_medicine() {
        assert_eq!(reminder_message("Aspirin"), "It's time to take your medicine: Aspirin");
    }

    #[tokio::test(start_paused = true)]
    async fn registers_one_job_per_day() {
        let (db, scheduler) = scheduler_with(None);
        let set = store(&db, &[medicine("Aspirin", Utc::now() + chrono::Duration::hours(1))], 3);

        assert_eq!(scheduler.schedule(&set), 3);
        let jobs = scheduler.pending_jobs(&set.id);
        assert_eq!(jobs.len(), 3);
        let indices: Vec<_> = jobs.iter().map(|j| j.occurrence_index).collect();
        assert_eq!(indices, [0, 1, 2]);
        assert!(jobs.iter().all(|j| j.state == JobState::Pending));
        assert_eq!(jobs[1].firing_time - jobs[0].firing_time, chrono::Duration::days(1));
    }

    #[tokio::test(start_paused = true)]
    async fn past_occurrences_are_skipped() {
        let (db, scheduler) = scheduler_with(None);
        // Yesterday: offset 0 is in the past, offsets 1 and 2 are not.
        let yesterday = Utc::now() - chrono::Duration::days(1) + chrono::Duration::hours(1);
        let set = store(&db, &[medicine("Metformin", yesterday)], 3);

        assert_eq!(scheduler.schedule(&set), 2);
        let jobs = scheduler.pending_jobs(&set.id);
        assert!(jobs.iter().all(|j| j.occurrence_index != 0));

        let long_ago = Utc::now() - chrono::Duration::days(10);
        let stale = store(&db, &[medicine("Old", long_ago)], 3);
        assert_eq!(scheduler.schedule(&stale), 0);
        assert_eq!(scheduler.pending_count(&stale.id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_previous_jobs() {
        let (db, scheduler) = scheduler_with(None);
        let set = store(
            &db,
            &[
                medicine("Aspirin", Utc::now() + chrono::Duration::hours(1)),
                medicine("Vitamin D", Utc::now() + chrono::Duration::hours(2)),
            ],
            2,
        );

        assert_eq!(scheduler.schedule(&set), 4);
        assert_eq!(scheduler.schedule(&set), 4);
        assert_eq!(scheduler.pending_count(&set.id), 4);
        assert_eq!(scheduler.total_pending(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_pending_jobs() {
        let provider = Arc::new(MockSmsProvider::new());
        let (db, scheduler) = scheduler_with(Some(provider.clone()));
        let set = store(&db, &[medicine("Aspirin", Utc::now() + chrono::Duration::hours(1))], 2);

        scheduler.schedule(&set);
        assert_eq!(scheduler.cancel(&set.id), 2);
        assert_eq!(scheduler.pending_count(&set.id), 0);
        assert_eq!(scheduler.cancel(&set.id), 0);

        tokio::time::sleep(Duration::from_secs(3 * 86_400)).await;
        assert!(provider.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn claim_and_cancel_are_exclusive() {
        let provider = Arc::new(MockSmsProvider::new());
        let (db, scheduler) = scheduler_with(Some(provider.clone()));
        let first = store(&db, &[medicine("Aspirin", Utc::now() + chrono::Duration::hours(1))], 1);
        let second = store(&db, &[medicine("Vitamin D", Utc::now() + chrono::Duration::hours(1))], 1);
        scheduler.schedule(&first);
        scheduler.schedule(&second);

        // Cancelled while its timer completes: the job can no longer fire.
        let cancelled = scheduler.pending_jobs(&first.id).remove(0);
        assert_eq!(scheduler.cancel(&first.id), 1);
        assert!(!scheduler.inner.claim(&cancelled));

        // Claimed first: cancel leaves it in flight.
        let claimed = scheduler.pending_jobs(&second.id).remove(0);
        assert!(scheduler.inner.claim(&claimed));
        assert!(!scheduler.inner.claim(&claimed));
        assert_eq!(scheduler.cancel(&second.id), 0);
        assert_eq!(scheduler.pending_jobs(&second.id)[0].state, JobState::Fired);

        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert!(provider.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_set_is_only_cancelled() {
        let (db, scheduler) = scheduler_with(None);
        let mut set = store(&db, &[medicine("Aspirin", Utc::now() + chrono::Duration::hours(1))], 2);
        scheduler.schedule(&set);

        db.with_conn(|conn| set_reminder_active(conn, &set.id, false, Utc::now()))
            .unwrap();
        set.is_active = false;
        assert_eq!(scheduler.schedule(&set), 0);
        assert_eq!(scheduler.pending_count(&set.id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn firing_sends_and_marks_sent() {
        let provider = Arc::new(MockSmsProvider::new());
        let (db, scheduler) = scheduler_with(Some(provider.clone()));
        let set = store(&db, &[medicine("Aspirin", Utc::now() + chrono::Duration::hours(1))], 2);

        scheduler.schedule(&set);
        drain(&scheduler, &set.id).await;

        let sent = provider.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.to == "+919876543210"));
        assert_eq!(sent[0].body, "It's time to take your medicine: Aspirin");

        let stored = db.with_conn(|conn| get_reminder_set(conn, &set.id)).unwrap().unwrap();
        assert!(stored.medicines[0].sent_status);

        let log = db.with_conn(|conn| list_deliveries(conn, &set.id)).unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|r| r.status == DeliveryStatus::Delivered));
        assert!(log.iter().all(|r| r.provider_id.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_is_logged_not_marked() {
        let provider = Arc::new(MockSmsProvider::failing(ProviderError::new(Some(30003), "unreachable")));
        let (db, scheduler) = scheduler_with(Some(provider));
        let set = store(&db, &[medicine("Insulin", Utc::now() + chrono::Duration::minutes(5))], 1);

        scheduler.schedule(&set);
        drain(&scheduler, &set.id).await;

        let stored = db.with_conn(|conn| get_reminder_set(conn, &set.id)).unwrap().unwrap();
        assert!(!stored.medicines[0].sent_status);

        let log = db.with_conn(|conn| list_deliveries(conn, &set.id)).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, DeliveryStatus::Failed);
        assert_eq!(log[0].error.as_deref(), Some("unreachable"));
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_gateway_records_simulated_delivery() {
        let (db, scheduler) = scheduler_with(None);
        let set = store(&db, &[medicine("Aspirin", Utc::now() + chrono::Duration::minutes(1))], 1);

        scheduler.schedule(&set);
        drain(&scheduler, &set.id).await;

        let log = db.with_conn(|conn| list_deliveries(conn, &set.id)).unwrap();
        assert_eq!(log[0].status, DeliveryStatus::Simulated);
        let stored = db.with_conn(|conn| get_reminder_set(conn, &set.id)).unwrap().unwrap();
        assert!(stored.medicines[0].sent_status);
    }
}
