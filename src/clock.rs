use chrono::{DateTime, NaiveDate, Utc};

/// Injectable time source. The attendance ledger keys records by calendar
/// day; `today` must return the same UTC-midnight boundary for the lookup
/// and the insert, so it is derived from a single `now` reading.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant, for tests and backfill tooling.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn today_is_the_utc_date_of_now() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).unwrap());
        assert_eq!(
            clock.today(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }
}
