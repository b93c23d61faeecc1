//! Recurring plugin jobs.

use {
    crate::{Error, Result},
    chrono::{DateTime, Local, Utc},
    futures::FutureExt,
    std::{
        fmt,
        panic::AssertUnwindSafe,
        str::FromStr,
        sync::Mutex,
        time::Duration,
    },
    tokio::task::JoinHandle,
    tracing::{debug, warn},
};

/// Clock a cron expression is read against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Zone {
    /// The host's local time.
    #[default]
    Local,
    Named(chrono_tz::Tz),
}

impl Zone {
    /// `None` selects local time; otherwise an IANA name such as
    /// `Asia/Shanghai`.
    pub fn from_name(name: Option<&str>) -> Result<Self> {
        match name {
            None => Ok(Self::Local),
            Some(name) => name
                .parse::<chrono_tz::Tz>()
                .map(Self::Named)
                .map_err(|_| Error::invalid_schedule(name, "unknown timezone")),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Named(tz) => write!(f, "{tz}"),
        }
    }
}

/// When a job fires.
#[derive(Debug, Clone)]
pub enum Schedule {
    Cron {
        expr: String,
        schedule: Box<cron::Schedule>,
        zone: Zone,
    },
    Every(Duration),
}

impl Schedule {
    /// Parse a cron expression evaluated in local time.
    ///
    /// Accepts the common 5-field form (`min hour dom month dow`, Sunday is
    /// `0` or `7`) and the `cron` crate's 6/7-field form with seconds, where
    /// weekdays count from `1` = Sunday.
    pub fn cron(expr: &str) -> Result<Self> {
        Self::cron_in(expr, Zone::Local)
    }

    pub fn cron_in(expr: &str, zone: Zone) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let parsed = match fields.as_slice() {
            [min, hour, dom, month, dow] => {
                let padded = format!("0 {min} {hour} {dom} {month} {} *", standard_weekdays(dow));
                cron::Schedule::from_str(&padded)
            },
            _ => cron::Schedule::from_str(expr),
        };
        let schedule = parsed.map_err(|e| Error::invalid_schedule(expr, e))?;
        Ok(Self::Cron {
            expr: expr.to_string(),
            schedule: Box::new(schedule),
            zone,
        })
    }

    pub fn every(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::invalid_schedule("every 0s", "interval must be non-zero"));
        }
        Ok(Self::Every(interval))
    }

    /// Next fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron { schedule, zone, .. } => match zone {
                Zone::Local => schedule
                    .after(&now.with_timezone(&Local))
                    .next()
                    .map(|t| t.with_timezone(&Utc)),
                Zone::Named(tz) => schedule
                    .after(&now.with_timezone(tz))
                    .next()
                    .map(|t| t.with_timezone(&Utc)),
            },
            Self::Every(interval) => chrono::Duration::from_std(*interval)
                .ok()
                .and_then(|d| now.checked_add_signed(d)),
        }
    }

    fn wait_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::Every(interval) => Some(*interval),
            Self::Cron { .. } => {
                let next = self.next_after(now)?;
                Some((next - now).to_std().unwrap_or_default())
            },
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cron { expr, zone, .. } => write!(f, "cron '{expr}' ({zone})"),
            Self::Every(interval) => write!(f, "every {interval:?}"),
        }
    }
}

/// Rewrite a standard weekday field (`0`-`7`, Sunday at both ends) into the
/// `cron` crate's numbering (`1`-`7`, `1` = Sunday). Names pass through.
fn standard_weekdays(field: &str) -> String {
    field
        .split(',')
        .map(standard_weekday_item)
        .collect::<Vec<_>>()
        .join(",")
}

fn standard_weekday_item(item: &str) -> String {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    let suffix = step.map(|s| format!("/{s}")).unwrap_or_default();
    let day = |s: &str| s.parse::<u8>().ok().filter(|d| *d <= 7);

    match base.split_once('-') {
        Some((start, end)) => {
            let (Some(start), Some(end)) = (day(start), day(end)) else {
                return item.to_string();
            };
            match (start, end) {
                (0, 7) => format!("1-7{suffix}"),
                (7, 7) => "1".to_string(),
                (start, 7) => {
                    // Saturday is the crate's last day; Sunday wraps to 1.
                    let hits_sunday = step
                        .map(|s| s.parse::<u8>().is_ok_and(|s| s > 0 && (7 - start) % s == 0))
                        .unwrap_or(true);
                    let mut out = format!("{}-7{suffix}", start + 1);
                    if hits_sunday {
                        out.push_str(",1");
                    }
                    out
                },
                (start, end) => format!("{}-{}{suffix}", start + 1, end + 1),
            }
        },
        None => match day(base) {
            Some(d) => format!("{}{suffix}", d % 7 + 1),
            None => item.to_string(),
        },
    }
}

/// Passed to each job run.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub at: DateTime<Utc>,
    /// 1 for the first run.
    pub count: u64,
}

/// A running job. Dropping the handle does not stop the job; call
/// [`TaskHandle::cancel`].
#[derive(Debug)]
pub struct TaskHandle {
    label: String,
    schedule: Schedule,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TaskHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Stop the job. Idempotent.
    pub fn cancel(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.abort();
            debug!(job = %self.label, "job cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

/// Run `job` on `schedule` until cancelled. Failures and panics of one run are
/// logged and do not stop the job.
pub(crate) fn spawn<F, Fut>(label: String, schedule: Schedule, job: F) -> TaskHandle
where
    F: Fn(Tick) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let job_label = label.clone();
    let handle_schedule = schedule.clone();
    let task = tokio::spawn(async move {
        let mut count = 0;
        loop {
            let Some(wait) = schedule.wait_from(Utc::now()) else {
                debug!(job = %job_label, %schedule, "schedule has no future runs");
                return;
            };
            tokio::time::sleep(wait).await;
            count += 1;
            let tick = Tick {
                at: Utc::now(),
                count,
            };
            match AssertUnwindSafe(job(tick)).catch_unwind().await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => warn!(job = %job_label, error = %e, "scheduled job failed"),
                Err(_) => warn!(job = %job_label, "scheduled job panicked"),
            }
        }
    });
    TaskHandle {
        label,
        schedule: handle_schedule,
        task: Mutex::new(Some(task)),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        chrono::TimeZone,
        rstest::rstest,
        std::sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
    };

    #[rstest]
    #[case("0 * * * * *")]
    #[case("*/3 * * * * *")]
    #[case("30 9 * * *")]
    #[case("0 0 12 * * * 2099")]
    fn parses_supported_forms(#[case] expr: &str) {
        assert!(Schedule::cron(expr).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("not a schedule")]
    #[case("61 * * * *")]
    #[case("0 9 * * 8")]
    fn rejects_bad_expressions(#[case] expr: &str) {
        assert!(matches!(
            Schedule::cron(expr),
            Err(Error::InvalidSchedule { .. })
        ));
    }

    fn utc() -> Zone {
        Zone::Named(chrono_tz::Tz::UTC)
    }

    #[test]
    fn five_field_form_fires_at_second_zero() {
        let schedule = Schedule::cron_in("30 9 * * *", utc()).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(now).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
        );
    }

    // 2026-10-18 is a Sunday.
    #[rstest]
    #[case("0 9 * * 0", (2026, 10, 25))]
    #[case("0 9 * * 1", (2026, 10, 19))]
    #[case("0 9 * * 7", (2026, 10, 25))]
    #[case("0 9 * * 1-5", (2026, 10, 19))]
    #[case("0 9 * * 5-7", (2026, 10, 23))]
    #[case("0 9 * * 6,0", (2026, 10, 24))]
    fn five_field_weekdays_count_from_sunday_zero(
        #[case] expr: &str,
        #[case] date: (i32, u32, u32),
    ) {
        let (y, m, d) = date;
        let schedule = Schedule::cron_in(expr, utc()).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(now).unwrap(),
            Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
        );
    }

    #[rstest]
    #[case("0", "1")]
    #[case("7", "1")]
    #[case("1-5", "2-6")]
    #[case("0-7", "1-7")]
    #[case("5-7", "6-7,1")]
    #[case("1-7/2", "2-7/2,1")]
    #[case("2-7/2", "3-7/2")]
    #[case("*/2", "*/2")]
    #[case("MON-FRI", "MON-FRI")]
    fn weekday_field_is_renumbered(#[case] field: &str, #[case] expected: &str) {
        assert_eq!(standard_weekdays(field), expected);
    }

    #[test]
    fn named_zone_shifts_fire_time() {
        let shanghai = Zone::from_name(Some("Asia/Shanghai")).unwrap();
        let schedule = Schedule::cron_in("0 9 * * *", shanghai).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(now).unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 19, 1, 0, 0).unwrap()
        );
        assert_eq!(schedule.to_string(), "cron '0 9 * * *' (Asia/Shanghai)");
        assert_eq!(Zone::from_name(None).unwrap(), Zone::Local);
        assert!(Zone::from_name(Some("Nowhere/City")).is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Schedule::every(Duration::ZERO).is_err());
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let every = Schedule::every(Duration::from_secs(90)).unwrap();
        assert_eq!(
            every.next_after(now).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 1, 30).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interval_job_runs_until_cancelled() {
        let runs = Arc::new(AtomicU64::new(0));
        let handle = spawn(
            "test".into(),
            Schedule::every(Duration::from_secs(10)).unwrap(),
            {
                let runs = Arc::clone(&runs);
                move |tick| {
                    let runs = Arc::clone(&runs);
                    async move {
                        runs.store(tick.count, Ordering::SeqCst);
                        if tick.count == 2 {
                            anyhow::bail!("second run fails");
                        }
                        Ok(())
                    }
                }
            },
        );

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
