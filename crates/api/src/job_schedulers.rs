use crate::{
    reminders::send_due_reminders::{ScanReport, SendDueRemindersUseCase},
    shared::usecase::execute,
};
use actix_web::rt::time::{interval_at, timeout, Instant};
use remindr_domain::ReminderJob;
use remindr_infra::{Config, ISys, RemindrContext};
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Time left until the next multiple of `interval_secs` since the epoch, so
/// that every instance scans at the same wall clock instants
pub fn get_start_delay(now_ts: i64, interval_secs: u64) -> Duration {
    let interval_millis = interval_secs.max(1) as i64 * 1000;
    let millis_to_next_run = interval_millis - now_ts.rem_euclid(interval_millis);
    Duration::from_millis(millis_to_next_run as u64)
}

/// Bounds the runs of one job: how many execute at once, how many may wait
/// for a permit and how long a single run may take.
#[derive(Clone)]
pub struct RunLimits {
    runs: Arc<Semaphore>,
    // Executing plus waiting runs
    slots: Arc<Semaphore>,
    run_timeout: Duration,
}

impl RunLimits {
    pub fn new(max_concurrent_runs: usize, max_queued_runs: usize, run_timeout: Duration) -> Self {
        let max_concurrent_runs = max_concurrent_runs.max(1);
        Self {
            runs: Arc::new(Semaphore::new(max_concurrent_runs)),
            slots: Arc::new(Semaphore::new(max_concurrent_runs + max_queued_runs)),
            run_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_concurrent_runs,
            config.max_queued_runs,
            Duration::from_secs(config.run_timeout_secs),
        )
    }
}

pub fn start_reminder_job_schedulers(ctx: RemindrContext) {
    for job in ctx.config.reminder_jobs() {
        start_reminder_job_scheduler(job, ctx.clone());
    }
}

fn start_reminder_job_scheduler(job: ReminderJob, ctx: RemindrContext) {
    actix_web::rt::spawn(async move {
        let interval_secs = ctx.config.scan_interval_secs;
        let limits = RunLimits::from_config(&ctx.config);

        let now = ctx.sys.get_timestamp_millis();
        let start = Instant::now() + get_start_delay(now, interval_secs);
        info!(
            job = %job.name(),
            "Scanning for due reminders every {} secs",
            interval_secs
        );

        let mut scan_interval = interval_at(start, Duration::from_secs(interval_secs));
        loop {
            scan_interval.tick().await;
            // Captured before waiting for a permit so that a delayed run still
            // scans the window of its own tick
            let triggered_ts = ctx.sys.get_timestamp_millis();
            actix_web::rt::spawn(run_reminder_job(
                job.clone(),
                triggered_ts,
                limits.clone(),
                ctx.clone(),
            ));
        }
    });
}

/// Runs one scan once a permit is available. Returns `None` if the run was
/// skipped because too many runs are waiting already, if it timed out or if
/// the scan failed.
pub async fn run_reminder_job(
    job: ReminderJob,
    triggered_ts: i64,
    limits: RunLimits,
    ctx: RemindrContext,
) -> Option<ScanReport> {
    let job_name = job.name();
    let _slot = match limits.slots.clone().try_acquire_owned() {
        Ok(slot) => slot,
        Err(_) => {
            warn!(
                job = %job_name,
                triggered_ts,
                "Too many runs of this job are in flight, skipping this one"
            );
            return None;
        }
    };
    let _permit = limits.runs.acquire().await.ok()?;

    let usecase = SendDueRemindersUseCase {
        job,
        now_ts: triggered_ts,
    };
    match timeout(limits.run_timeout, execute(usecase, &ctx)).await {
        Ok(res) => res.ok(),
        Err(_) => {
            error!(
                job = %job_name,
                triggered_ts,
                "Scan did not finish within {:?} and was abandoned",
                limits.run_timeout
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use remindr_domain::{DeliveryOutcome, LeadTime, Notification, RecordKind, ReminderRecord, ID};
    use remindr_infra::{
        AcknowledgeResult, DueRecordsQuery, IPushGateway, IReminderRecordRepo, InMemoryPushGateway,
        Repos,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NOW: i64 = 1613862000000;

    /// Gives other tasks a chance to run before every call, so that
    /// concurrent scans interleave between their query and their write
    struct YieldingRepo {
        inner: Arc<dyn IReminderRecordRepo>,
    }

    #[async_trait::async_trait]
    impl IReminderRecordRepo for YieldingRepo {
        async fn insert(&self, record: &ReminderRecord) -> anyhow::Result<()> {
            self.inner.insert(record).await
        }

        async fn find(&self, kind: RecordKind, record_id: &ID) -> Option<ReminderRecord> {
            self.inner.find(kind, record_id).await
        }

        async fn find_due(&self, query: &DueRecordsQuery) -> anyhow::Result<Vec<ReminderRecord>> {
            actix_web::rt::task::yield_now().await;
            self.inner.find_due(query).await
        }

        async fn acknowledge(
            &self,
            kind: RecordKind,
            record_id: &ID,
            ack_flag: &str,
        ) -> anyhow::Result<AcknowledgeResult> {
            actix_web::rt::task::yield_now().await;
            self.inner.acknowledge(kind, record_id, ack_flag).await
        }
    }

    /// Never answers, like a push transport that stopped responding
    #[derive(Default)]
    struct HangingGateway {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl IPushGateway for HangingGateway {
        async fn send(&self, _notification: &Notification, _tokens: &[String]) -> Vec<DeliveryOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            futures::future::pending::<Vec<DeliveryOutcome>>().await
        }
    }

    fn task_job(ctx: &RemindrContext) -> ReminderJob {
        ReminderJob::task(LeadTime::from_minutes(0), ctx.config.tolerance_millis)
    }

    #[test]
    fn start_delay_works() {
        assert_eq!(get_start_delay(50 * 1000, 60), Duration::from_secs(10));
        assert_eq!(get_start_delay(60 * 1000, 60), Duration::from_secs(60));
        assert_eq!(get_start_delay(59 * 1000 + 500, 60), Duration::from_millis(500));
        assert_eq!(get_start_delay(61 * 1000, 30), Duration::from_secs(29));
        assert_eq!(get_start_delay(0, 300), Duration::from_secs(300));
        assert_eq!(get_start_delay(1500, 0), Duration::from_millis(500));
    }

    #[actix_web::main]
    #[test]
    async fn interleaved_runs_acknowledge_once() {
        let mut ctx = RemindrContext::create_inmemory();
        let push = Arc::new(InMemoryPushGateway::new());
        ctx.push = push.clone();
        let inner = ctx.repos.reminder_records.clone();
        ctx.repos = Repos {
            reminder_records: Arc::new(YieldingRepo {
                inner: inner.clone(),
            }),
        };

        let job = task_job(&ctx);
        let record = ReminderRecord::task(NOW).with_tokens(&["t1", "t2"]);
        inner.insert(&record).await.unwrap();

        let limits = RunLimits::new(3, 0, Duration::from_secs(10));
        let reports = join_all(
            (0..3).map(|_| run_reminder_job(job.clone(), NOW, limits.clone(), ctx.clone())),
        )
        .await
        .into_iter()
        .map(|report| report.expect("Every run to finish"))
        .collect::<Vec<_>>();

        // Every run queried before any of them acknowledged
        assert!(reports.iter().all(|r| r.matched == 1));
        assert_eq!(push.sent().len(), 3);
        assert_eq!(reports.iter().map(|r| r.acknowledged).sum::<usize>(), 1);
        assert_eq!(
            reports
                .iter()
                .map(|r| r.acknowledgment_conflicts)
                .sum::<usize>(),
            2
        );
        assert!(inner
            .find(record.kind(), &record.id)
            .await
            .unwrap()
            .is_acknowledged(&job.ack_flag));
    }

    #[actix_web::main]
    #[test]
    async fn hung_runs_are_abandoned_and_extra_ticks_skipped() {
        let mut ctx = RemindrContext::create_inmemory();
        let push = Arc::new(HangingGateway::default());
        ctx.push = push.clone();

        let job = task_job(&ctx);
        let record = ReminderRecord::task(NOW).with_tokens(&["t1"]);
        ctx.repos.reminder_records.insert(&record).await.unwrap();

        let limits = RunLimits::new(1, 1, Duration::from_millis(200));
        let running = actix_web::rt::spawn(run_reminder_job(
            job.clone(),
            NOW,
            limits.clone(),
            ctx.clone(),
        ));
        let queued = actix_web::rt::spawn(run_reminder_job(
            job.clone(),
            NOW,
            limits.clone(),
            ctx.clone(),
        ));
        actix_web::rt::time::sleep(Duration::from_millis(20)).await;

        // One run holds the permit and one waits for it, so a third is skipped right away
        let skipped = timeout(
            Duration::from_millis(50),
            run_reminder_job(job.clone(), NOW, limits.clone(), ctx.clone()),
        )
        .await;
        assert_eq!(skipped, Ok(None));

        assert_eq!(running.await.unwrap(), None);
        // The queued run got the permit once the first one timed out
        assert_eq!(queued.await.unwrap(), None);
        assert_eq!(push.calls.load(Ordering::SeqCst), 2);

        let stored = ctx
            .repos
            .reminder_records
            .find(record.kind(), &record.id)
            .await
            .unwrap();
        assert!(!stored.is_acknowledged(&job.ack_flag));
    }
}
