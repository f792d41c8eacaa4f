//! Simulated clock — maps wall-clock time to in-game minutes.
//!
//! The clock derives total simulated minutes from
//! `(now - real_start) * time_scale + manual_offset` and exposes the
//! monotonic total-minutes counter every other subsystem keys on.
//! Weather advances on a 30-minute stride via a categorical prior
//! selected by climate.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::enums::{Climate, Daytime, Weather};
use crate::errors::ActionError;

/// Wall-clock-derived in-game time plus environmental state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameClock {
    /// Epoch seconds of the real anchor; set lazily on first recompute.
    pub real_start_ts: Option<f64>,
    /// Simulated minutes per real second.
    pub time_scale: f64,
    /// Manual advancement (wait, event effects). Starts the game at 06:00.
    pub manual_offset_minutes: i64,
    /// Minutes into the current day, `[0, 1440)`. Derived.
    pub time_minutes: i64,
    /// Completed days. Derived.
    pub day_count: i64,
    pub daytime: Daytime,
    pub weather: Weather,
    pub climate: Climate,
    /// Total-minutes of the last weather evaluation.
    pub last_weather_eval_total: i64,
}

impl Default for GameClock {
    fn default() -> Self {
        Self {
            real_start_ts: None,
            time_scale: 1.0,
            manual_offset_minutes: START_OF_DAY_OFFSET_MINUTES,
            time_minutes: START_OF_DAY_OFFSET_MINUTES,
            day_count: 0,
            daytime: Daytime::Morning,
            weather: Weather::Clear,
            climate: Climate::Temperate,
            last_weather_eval_total: START_OF_DAY_OFFSET_MINUTES,
        }
    }
}

impl GameClock {
    pub fn with_time_scale(time_scale: f64) -> Self {
        Self {
            time_scale,
            ..Self::default()
        }
    }

    /// Monotonic simulated-minute counter: `day_count * 1440 + time_minutes`.
    pub fn total_minutes(&self) -> i64 {
        self.day_count * MINUTES_PER_DAY + self.time_minutes
    }

    /// Recompute derived fields from a wall-clock instant.
    ///
    /// Idempotent for a fixed `now_ts`. Returns the total-minutes counter.
    pub fn recompute(&mut self, now_ts: f64) -> i64 {
        let start = *self.real_start_ts.get_or_insert(now_ts);
        let elapsed_secs = now_ts - start;
        let total = (elapsed_secs * self.time_scale) as i64 + self.manual_offset_minutes;
        self.day_count = total / MINUTES_PER_DAY;
        self.time_minutes = total % MINUTES_PER_DAY;
        self.daytime = daytime_of(self.time_minutes);
        total
    }

    /// Change the time scale, rebasing the real anchor so the current
    /// total-minutes stays invariant.
    pub fn set_time_scale(&mut self, scale: f64, now_ts: f64) -> Result<(), ActionError> {
        if scale <= 0.0 {
            return Err(ActionError::InvalidArgument(
                "time scale must be > 0".into(),
            ));
        }
        let current_total = self.recompute(now_ts);
        self.time_scale = scale;
        // total = (now - start) * scale + offset  =>  solve for start.
        let simulated_without_offset = (current_total - self.manual_offset_minutes) as f64;
        self.real_start_ts = Some(now_ts - simulated_without_offset / scale);
        self.recompute(now_ts);
        Ok(())
    }

    /// Advance simulated time by adding to the manual offset. Never
    /// busy-waits; callers must recompute afterwards.
    pub fn wait(&mut self, minutes: i64) {
        self.manual_offset_minutes += minutes;
    }

    /// Re-evaluate weather for every elapsed 30-minute stride since the
    /// last evaluation. A long wait applies several transitions.
    pub fn advance_weather_if_due<R: Rng>(&mut self, total_minutes: i64, rng: &mut R) {
        while total_minutes - self.last_weather_eval_total >= WEATHER_EVAL_STRIDE_MINUTES {
            self.last_weather_eval_total += WEATHER_EVAL_STRIDE_MINUTES;
            let new_weather = sample_weather(self.climate, rng);
            if self.weather == Weather::Rain
                && new_weather == Weather::Rain
                && rng.gen::<f64>() < RAIN_TO_HUMID_CHANCE
            {
                self.climate = Climate::Humid;
            }
            self.weather = new_weather;
        }
    }

    /// `HH:MM` of the current simulated time.
    pub fn time_string(&self) -> String {
        let h = (self.time_minutes / 60) % 24;
        let m = self.time_minutes % 60;
        format!("{h:02}:{m:02}")
    }

    /// Minutes to wait until the start of the requested phase band,
    /// wrapping past midnight. Zero if already inside the band.
    pub fn minutes_until(&self, phase: Daytime) -> i64 {
        if self.daytime == phase {
            return 0;
        }
        let target = phase.band_start_minutes();
        let mut delta = target - self.time_minutes;
        if delta <= 0 {
            delta += MINUTES_PER_DAY;
        }
        delta
    }
}

/// Phase band for a minutes-of-day value.
pub fn daytime_of(time_minutes: i64) -> Daytime {
    let m = time_minutes;
    if (6 * 60..12 * 60).contains(&m) {
        Daytime::Morning
    } else if (12 * 60..18 * 60).contains(&m) {
        Daytime::Day
    } else if (18 * 60..22 * 60).contains(&m) {
        Daytime::Evening
    } else {
        Daytime::Night
    }
}

/// Weather priors per climate over (clear, cloudy, rain, fog).
fn weather_weights(climate: Climate) -> [f64; 4] {
    match climate {
        Climate::Temperate => [0.55, 0.25, 0.15, 0.05],
        Climate::Humid => [0.25, 0.25, 0.40, 0.10],
        Climate::Cold => [0.35, 0.25, 0.10, 0.30],
        Climate::Hot => [0.60, 0.25, 0.10, 0.05],
    }
}

/// Sample a new weather from the climate's categorical prior.
pub fn sample_weather<R: Rng>(climate: Climate, rng: &mut R) -> Weather {
    let weights = weather_weights(climate);
    let conditions = [Weather::Clear, Weather::Cloudy, Weather::Rain, Weather::Fog];
    let roll: f64 = rng.gen::<f64>() * weights.iter().sum::<f64>();
    let mut acc = 0.0;
    for (condition, w) in conditions.iter().zip(weights) {
        acc += w;
        if roll < acc {
            return *condition;
        }
    }
    *conditions.last().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn phase_bands() {
        assert_eq!(daytime_of(6 * 60), Daytime::Morning);
        assert_eq!(daytime_of(11 * 60 + 59), Daytime::Morning);
        assert_eq!(daytime_of(12 * 60), Daytime::Day);
        assert_eq!(daytime_of(18 * 60), Daytime::Evening);
        assert_eq!(daytime_of(22 * 60), Daytime::Night);
        assert_eq!(daytime_of(3 * 60), Daytime::Night);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut clock = GameClock::with_time_scale(0.25);
        let now = 1_700_000_000.0;
        let a = clock.recompute(now);
        let snapshot = clock.clone();
        let b = clock.recompute(now);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&clock).unwrap(),
            serde_json::to_string(&snapshot).unwrap()
        );
    }

    #[test]
    fn starts_at_six_in_the_morning() {
        let mut clock = GameClock::default();
        clock.recompute(1_700_000_000.0);
        assert_eq!(clock.time_string(), "06:00");
        assert_eq!(clock.daytime, Daytime::Morning);
        assert_eq!(clock.day_count, 0);
    }

    #[test]
    fn wait_advances_and_wraps_days() {
        let mut clock = GameClock::default();
        let now = 1_700_000_000.0;
        clock.recompute(now);
        clock.wait(MINUTES_PER_DAY + 30);
        clock.recompute(now);
        assert_eq!(clock.day_count, 1);
        assert_eq!(clock.time_string(), "06:30");
    }

    #[test]
    fn set_time_scale_keeps_total_invariant() {
        let mut clock = GameClock::with_time_scale(1.0);
        let now = 1_700_000_000.0;
        clock.recompute(now);
        clock.wait(120);
        let before = clock.recompute(now + 90.0);
        clock.set_time_scale(0.25, now + 90.0).unwrap();
        let after = clock.recompute(now + 90.0);
        assert_eq!(before, after);
    }

    #[test]
    fn set_time_scale_rejects_non_positive() {
        let mut clock = GameClock::default();
        assert!(matches!(
            clock.set_time_scale(0.0, 1_700_000_000.0),
            Err(ActionError::InvalidArgument(_))
        ));
        assert!(clock.set_time_scale(-1.0, 1_700_000_000.0).is_err());
    }

    #[test]
    fn weather_is_deterministic_per_seed() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            assert_eq!(
                sample_weather(Climate::Humid, &mut a),
                sample_weather(Climate::Humid, &mut b)
            );
        }
    }

    #[test]
    fn long_wait_applies_multiple_weather_evals() {
        let mut clock = GameClock::default();
        let now = 1_700_000_000.0;
        clock.recompute(now);
        clock.wait(95);
        let total = clock.recompute(now);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        clock.advance_weather_if_due(total, &mut rng);
        // 95 minutes cover three full 30-minute strides.
        assert_eq!(
            clock.last_weather_eval_total,
            START_OF_DAY_OFFSET_MINUTES + 90
        );
    }

    #[test]
    fn minutes_until_wraps_past_midnight() {
        let mut clock = GameClock::default();
        clock.recompute(1_700_000_000.0); // 06:00, morning
        assert_eq!(clock.minutes_until(Daytime::Morning), 0);
        assert_eq!(clock.minutes_until(Daytime::Day), 6 * 60);
        assert_eq!(clock.minutes_until(Daytime::Night), 16 * 60);
        // From 23:00 the next morning is 7 hours away.
        clock.wait(17 * 60);
        clock.recompute(1_700_000_000.0);
        assert_eq!(clock.daytime, Daytime::Night);
        assert_eq!(clock.minutes_until(Daytime::Morning), 7 * 60);
    }
}
