use chrono::{Days, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wall-clock run times: every listed minute of every hour in
/// `first_hour..=last_hour`, local time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub minutes: Vec<u32>,
    pub first_hour: u32,
    pub last_hour: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            minutes: vec![11, 41],
            first_hour: 10,
            last_hour: 21,
        }
    }
}

impl Schedule {
    /// The first scheduled instant strictly after `now`, today or tomorrow.
    /// `None` if the schedule has no valid hour or minute.
    pub fn next_run_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut minutes: Vec<u32> = self.minutes.iter().copied().filter(|&m| m < 60).collect();
        minutes.sort_unstable();
        minutes.dedup();
        let last_hour = self.last_hour.min(23);

        for offset in 0..=1 {
            let date = now.date().checked_add_days(Days::new(offset))?;
            for hour in self.first_hour..=last_hour {
                for &minute in &minutes {
                    let Some(candidate) = date.and_hms_opt(hour, minute, 0) else {
                        continue;
                    };
                    if candidate > now {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }

    /// How long to sleep from `now` until the next run.
    pub fn wait_from(&self, now: NaiveDateTime) -> Option<(NaiveDateTime, Duration)> {
        let next = self.next_run_after(now)?;
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        Some((next, wait))
    }
}
