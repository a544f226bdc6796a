//! Schedule parsing and the tick loop
//!
//! Accepted expressions:
//! - standard 5-field cron (`minute hour day-of-month month day-of-week`,
//!   day-of-week `0`-`6` with `0` meaning Sunday, or `SUN`-`SAT`)
//! - descriptors: `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
//!   `@midnight`, `@hourly`
//! - `@every <duration>` with a Go-style duration (`90s`, `1h30m`)
//!
//! When both day-of-month and day-of-week are restricted, a day matching
//! either one fires. `@every` intervals are whole seconds, at least one.
//!
//! Cron ticks are evaluated in local time.

use crate::engine::Reconciler;
use crate::error::{Error, Result};
use chrono::{DateTime, Local, TimeZone};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// A parsed schedule expression
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Calendar-based cron schedule
    Cron(CronSchedule),
    /// Fixed interval between ticks
    Every(Duration),
}

impl Schedule {
    /// Parse a schedule expression
    ///
    /// # Returns
    ///
    /// - `Ok(Schedule)`: The parsed schedule
    /// - `Err(Error::Config)`: The expression is not understood
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();

        if let Some(rest) = expression.strip_prefix("@every") {
            let interval = parse_go_duration(rest.trim())?;
            return Ok(Schedule::Every(whole_seconds(interval)));
        }

        let branches = normalize_cron(expression)?
            .iter()
            .map(|normalized| cron::Schedule::from_str(normalized))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::config(format!("invalid schedule '{}': {}", expression, e)))?;

        Ok(Schedule::Cron(CronSchedule { branches }))
    }

    /// Time remaining until the next tick, from now
    ///
    /// `None` means the schedule has no future ticks.
    pub fn delay_until_next(&self) -> Option<Duration> {
        match self {
            Schedule::Every(interval) => Some(*interval),
            Schedule::Cron(schedule) => {
                let now = Local::now();
                let next = schedule.next_after(&now)?;
                Some((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }
}

impl FromStr for Schedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Calendar schedule made of one or more cron branches
///
/// A single branch covers the usual case. A restricted day-of-month together
/// with a restricted day-of-week becomes two branches, and the earliest
/// instant of either wins.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    branches: Vec<cron::Schedule>,
}

impl CronSchedule {
    /// The first instant strictly after `after`
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.branches
            .iter()
            .filter_map(|branch| branch.after(after).next())
            .min()
    }

    /// Successive instants strictly after `after`
    pub fn iter_after<Tz: TimeZone>(
        &self,
        after: DateTime<Tz>,
    ) -> impl Iterator<Item = DateTime<Tz>> {
        std::iter::successors(self.next_after(&after), move |prev| self.next_after(prev))
    }
}

/// Rewrite an expression into the 6-field branches the cron parser expects
fn normalize_cron(expression: &str) -> Result<Vec<String>> {
    let descriptor = match expression.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Some("0 0 0 1 1 *"),
        "@monthly" => Some("0 0 0 1 * *"),
        "@weekly" => Some("0 0 0 * * SUN"),
        "@daily" | "@midnight" => Some("0 0 0 * * *"),
        "@hourly" => Some("0 0 * * * *"),
        _ => None,
    };
    if let Some(descriptor) = descriptor {
        return Ok(vec![descriptor.to_string()]);
    }
    if expression.starts_with('@') {
        return Err(Error::config(format!(
            "invalid schedule '{}': unknown descriptor",
            expression
        )));
    }

    let fields: Vec<&str> = expression.split_whitespace().collect();
    let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
        return Err(Error::config(format!(
            "invalid schedule '{}': expected 5 fields, got {}",
            expression,
            fields.len()
        )));
    };

    let day_of_month = day_of_month.replace('?', "*");
    let day_of_week = translate_day_of_week(&day_of_week.replace('?', "*"))
        .map_err(|e| Error::config(format!("invalid schedule '{}': {}", expression, e)))?;

    let branch = |dom: &str, dow: &str| {
        format!("0 {} {} {} {} {}", minute, hour, dom, month, dow)
    };

    if is_wildcard(&day_of_month) || is_wildcard(&day_of_week) {
        Ok(vec![branch(&day_of_month, &day_of_week)])
    } else {
        Ok(vec![branch(&day_of_month, "*"), branch("*", &day_of_week)])
    }
}

/// Whether a day field places no restriction (`*`, `*/1`, or a list holding one)
fn is_wildcard(field: &str) -> bool {
    field.split(',').any(|part| match part.split_once('/') {
        None => part == "*",
        Some((range, step)) => range == "*" && step.parse::<u32>() == Ok(1),
    })
}

/// Replace numeric weekdays (0 = Sunday) with names, leaving step values alone
fn translate_day_of_week(field: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(field.len() * 2);
    let mut chars = field.chars().peekable();
    let mut after_slash = false;

    while let Some(c) = chars.next() {
        if !c.is_ascii_digit() {
            after_slash = c == '/';
            out.push(c);
            continue;
        }

        let mut digits = String::from(c);
        while let Some(&d) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }

        if after_slash {
            out.push_str(&digits);
        } else {
            let day = digits
                .parse::<usize>()
                .ok()
                .and_then(|n| DAY_NAMES.get(n))
                .ok_or_else(|| format!("day-of-week {} out of range 0-6", digits))?;
            out.push_str(day);
        }
        after_slash = false;
    }

    Ok(out)
}

/// Truncate to whole seconds with a one second floor
fn whole_seconds(interval: Duration) -> Duration {
    Duration::from_secs(interval.as_secs().max(1))
}

/// Parse a Go-style duration such as `1h30m`, `90s` or `250ms`
fn parse_go_duration(text: &str) -> Result<Duration> {
    let invalid = || Error::config(format!("invalid duration '{}'", text));

    if text.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = text;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        total_nanos += value * unit_nanos;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Drives the reconciler on a schedule
///
/// ## Lifecycle
///
/// 1. Create with [`Scheduler::new()`] (invalid expressions fail here)
/// 2. Start with [`Scheduler::run_until()`]
/// 3. The first tick runs immediately, then on every scheduled instant
/// 4. Returns when the shutdown future completes
///
/// Ticks run sequentially on the caller's task, so two ticks never overlap.
#[derive(Debug, Clone)]
pub struct Scheduler {
    expression: String,
    schedule: Schedule,
}

impl Scheduler {
    /// Create a scheduler from an expression
    pub fn new(expression: impl Into<String>) -> Result<Self> {
        let expression = expression.into();
        let schedule = Schedule::parse(&expression)?;
        Ok(Self {
            expression,
            schedule,
        })
    }

    /// The expression as configured
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The parsed schedule
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Run ticks until `shutdown` completes
    ///
    /// # Returns
    ///
    /// The number of ticks that ran to completion
    pub async fn run_until<F>(&self, reconciler: &Reconciler, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticks = 0usize;

        info!("Running on schedule: {}", self.expression);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                outcome = reconciler.run_once() => {
                    ticks += 1;
                    debug!("Tick {} finished: {:?}", ticks, outcome);
                }
            }

            let Some(delay) = self.schedule.delay_until_next() else {
                warn!("Schedule '{}' has no upcoming ticks", self.expression);
                shutdown.as_mut().await;
                break;
            };
            debug!("Next tick in {:?}", delay);

            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Scheduler stopped after {} tick(s)", ticks);
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc, Weekday};

    fn cron(expression: &str) -> CronSchedule {
        match Schedule::parse(expression).unwrap() {
            Schedule::Cron(schedule) => schedule,
            other => panic!("{} parsed as {:?}", expression, other),
        }
    }

    #[test]
    fn test_five_field_gets_seconds() {
        assert_eq!(normalize_cron("*/5 * * * *").unwrap(), vec!["0 */5 * * * *"]);
    }

    #[test]
    fn test_day_of_week_translation() {
        assert_eq!(normalize_cron("0 9 * * 1-5").unwrap(), vec!["0 0 9 * * MON-FRI"]);
        assert_eq!(normalize_cron("0 9 * * 0,6").unwrap(), vec!["0 0 9 * * SUN,SAT"]);
        assert_eq!(normalize_cron("0 9 * * */2").unwrap(), vec!["0 0 9 * * */2"]);
        assert_eq!(normalize_cron("0 9 * * 1-5/2").unwrap(), vec!["0 0 9 * * MON-FRI/2"]);
        assert_eq!(normalize_cron("0 9 ? * MON").unwrap(), vec!["0 0 9 * * MON"]);
    }

    #[test]
    fn test_day_of_week_seven_rejected() {
        assert!(normalize_cron("0 9 * * 7").is_err());
        assert!(normalize_cron("0 9 * * 8").is_err());
    }

    #[test]
    fn test_restricted_days_split_into_branches() {
        assert_eq!(
            normalize_cron("0 0 1 * MON").unwrap(),
            vec!["0 0 0 1 * *", "0 0 0 * * MON"]
        );
        assert_eq!(normalize_cron("0 0 1 * *").unwrap(), vec!["0 0 0 1 * *"]);
        assert_eq!(normalize_cron("0 0 */1 * 1").unwrap(), vec!["0 0 0 */1 * MON"]);
    }

    #[test]
    fn test_day_of_month_or_day_of_week_fires() {
        let schedule = cron("0 0 1 * MON");
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();

        let days: Vec<(u32, u32)> = schedule
            .iter_after(start)
            .take(6)
            .map(|t| (t.month(), t.day()))
            .collect();

        // Mondays in October, then Sunday the 1st, then Monday the 2nd
        assert_eq!(days, vec![(10, 5), (10, 12), (10, 19), (10, 26), (11, 1), (11, 2)]);
        assert_eq!(schedule.next_after(&start).unwrap().weekday(), Weekday::Mon);
    }

    #[test]
    fn test_single_restricted_day_field_is_plain() {
        let schedule = cron("30 4 1 * *");
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();

        let next = schedule.next_after(&start).unwrap();
        assert_eq!((next.month(), next.day()), (11, 1));
    }

    #[test]
    fn test_descriptors() {
        assert!(matches!(Schedule::parse("@hourly").unwrap(), Schedule::Cron(_)));
        assert!(matches!(Schedule::parse("@daily").unwrap(), Schedule::Cron(_)));
        assert!(matches!(Schedule::parse("@annually").unwrap(), Schedule::Cron(_)));
        assert!(Schedule::parse("@fortnightly").is_err());
    }

    #[test]
    fn test_standard_expressions_parse() {
        for expr in ["*/5 * * * *", "0 */2 * * *", "30 4 1 * *", "0 9 * * 1-5"] {
            let schedule = Schedule::parse(expr)
                .unwrap_or_else(|e| panic!("{} should parse: {}", expr, e));
            let delay = schedule.delay_until_next().unwrap();
            assert!(delay <= Duration::from_secs(32 * 24 * 3600));
        }
    }

    #[test]
    fn test_seconds_field_rejected() {
        assert!(Schedule::parse("*/10 * * * * *").is_err());
        assert!(Schedule::parse("0 */5 * * * *").is_err());
        assert!(Schedule::parse("0 0 12 * * * 2030").is_err());
    }

    #[test]
    fn test_invalid_expressions() {
        for expr in ["", "not a cron", "* * *", "61 * * * *", "@every", "@every 5x"] {
            let err = Schedule::parse(expr).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{:?} should be a config error", expr);
        }
    }

    #[test]
    fn test_every_durations() {
        let cases = [
            ("@every 90s", Duration::from_secs(90)),
            ("@every 5m", Duration::from_secs(300)),
            ("@every 1h30m", Duration::from_secs(5400)),
            ("@every 1.5h", Duration::from_secs(5400)),
            ("@every 2500ms", Duration::from_secs(2)),
        ];
        for (expr, expected) in cases {
            match Schedule::parse(expr).unwrap() {
                Schedule::Every(d) => assert_eq!(d, expected, "{}", expr),
                other => panic!("{} parsed as {:?}", expr, other),
            }
        }
    }

    #[test]
    fn test_every_has_one_second_floor() {
        for expr in ["@every 250ms", "@every 0s", "@every 999ms"] {
            match Schedule::parse(expr).unwrap() {
                Schedule::Every(d) => assert_eq!(d, Duration::from_secs(1), "{}", expr),
                other => panic!("{} parsed as {:?}", expr, other),
            }
        }
    }

    #[test]
    fn test_scheduler_keeps_expression() {
        let scheduler = Scheduler::new("@every 1m").unwrap();
        assert_eq!(scheduler.expression(), "@every 1m");
        assert!(Scheduler::new("bogus").is_err());
    }
}
