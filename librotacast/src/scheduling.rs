//! Cycle scheduling
//!
//! Parses the `schedule.interval` setting into a [`Schedule`] that yields the
//! delay before each trigger. Two forms are accepted:
//! - Fixed durations: "30m", "1h", "1h 30m"
//! - Random ranges: "random:20m-40m", re-drawn for every cycle

use rand::Rng;
use std::time::Duration;

use crate::{Result, RotacastError};

const MIN_INTERVAL_SECONDS: u64 = 30;
const MAX_INTERVAL_SECONDS: u64 = 30 * 24 * 3600; // 30 days

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Fixed(Duration),
    Random { min: Duration, max: Duration },
}

impl Schedule {
    /// Parse an interval string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty, cannot be parsed, or falls
    /// outside the 30 second to 30 day window.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(RotacastError::InvalidInput(
                "Schedule interval cannot be empty".to_string(),
            ));
        }

        if let Some(range) = input.strip_prefix("random:") {
            return parse_random_schedule(range);
        }

        let interval = parse_duration(input)?;
        validate_bounds(interval, interval)?;
        Ok(Schedule::Fixed(interval))
    }

    /// Delay before the next cycle
    pub fn next_delay(&self) -> Duration {
        match *self {
            Schedule::Fixed(interval) => interval,
            Schedule::Random { min, max } => generate_random_duration(min, max),
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Fixed(interval) => {
                write!(f, "every {}", humantime::format_duration(*interval))
            }
            Schedule::Random { min, max } => write!(
                f,
                "every {} to {}",
                humantime::format_duration(*min),
                humantime::format_duration(*max)
            ),
        }
    }
}

fn parse_duration(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| RotacastError::InvalidInput(format!("Could not parse duration '{}': {}", input, e)))
}

/// Parse the part after "random:", which must be "MIN-MAX"
fn parse_random_schedule(range: &str) -> Result<Schedule> {
    let parts: Vec<&str> = range.split('-').collect();
    if parts.len() != 2 {
        return Err(RotacastError::InvalidInput(
            "Random format must be MIN-MAX".to_string(),
        ));
    }

    let min = parse_duration(parts[0])?;
    let max = parse_duration(parts[1])?;

    if min >= max {
        return Err(RotacastError::InvalidInput(
            "Minimum must be less than maximum".to_string(),
        ));
    }
    validate_bounds(min, max)?;

    Ok(Schedule::Random { min, max })
}

fn validate_bounds(min: Duration, max: Duration) -> Result<()> {
    if min.as_secs() < MIN_INTERVAL_SECONDS {
        return Err(RotacastError::InvalidInput(format!(
            "Interval must be at least {} seconds",
            MIN_INTERVAL_SECONDS
        )));
    }

    if max.as_secs() > MAX_INTERVAL_SECONDS {
        return Err(RotacastError::InvalidInput(format!(
            "Interval must be less than {} days",
            MAX_INTERVAL_SECONDS / (24 * 3600)
        )));
    }

    Ok(())
}

fn generate_random_duration(min: Duration, max: Duration) -> Duration {
    let random_secs = rand::thread_rng().gen_range(min.as_secs()..=max.as_secs());
    Duration::from_secs(random_secs)
}
