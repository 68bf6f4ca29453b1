use chrono::{DateTime, TimeDelta, Timelike, Utc};
use rand::Rng;

use crate::config::{DeliveryPhrasing, Window};

/// How a delivery time is phrased in an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phrasing {
    /// `19:05`
    Clock24,
    /// `07:05 pm`
    Clock12,
    /// `7 o'clock`
    OClock,
    /// `7 in the evening`
    PartOfDay,
}

impl DeliveryPhrasing {
    /// Map a uniform draw in `[0, 1)` to a phrasing bin.
    #[must_use]
    pub fn bin(&self, draw: f64) -> Phrasing {
        if draw < self.clock_24h {
            Phrasing::Clock24
        } else if draw < self.clock_12h {
            Phrasing::Clock12
        } else if draw < self.oclock {
            Phrasing::OClock
        } else {
            Phrasing::PartOfDay
        }
    }
}

/// Render `time` in the given phrasing.
#[must_use]
pub fn render(time: DateTime<Utc>, phrasing: Phrasing) -> String {
    let (_, hour12) = time.hour12();
    match phrasing {
        Phrasing::Clock24 => time.format("%H:%M").to_string(),
        Phrasing::Clock12 => time.format("%I:%M %p").to_string().to_lowercase(),
        Phrasing::OClock => format!("{hour12} o'clock"),
        Phrasing::PartOfDay => {
            let period = match time.hour() {
                0..=11 => "in the morning",
                12..=17 => "in the afternoon",
                _ => "in the evening",
            };
            format!("{hour12} {period}")
        }
    }
}

/// A delivery time between `offset_minutes` from `now`, phrased at random.
pub fn delivery_time<R: Rng + ?Sized>(
    now: DateTime<Utc>,
    offset_minutes: Window,
    phrasing: &DeliveryPhrasing,
    rng: &mut R,
) -> String {
    let minutes = rng.gen_range(offset_minutes.min..=offset_minutes.max);
    let time = now + TimeDelta::minutes(i64::from(minutes));
    render(time, phrasing.bin(rng.gen_range(0.0..1.0)))
}
