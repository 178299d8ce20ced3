use ember_types::Vec3d;

/// How often, in simulated milliseconds, `WorldClock::advance` signals that
/// an `UpdateTime` broadcast is due (§4.5: "every 1 s of simulated time").
/// Tracked against an internal deadline rather than wall-clock time, so a
/// paused or heavily-dilated world still broadcasts on a steady cadence.
const BROADCAST_INTERVAL_MILLIS: u64 = 1_000;

/// Number of distinct moon phases in one lunar cycle (8 per day-length
/// multiple, matching the classic "full/waning/new/waxing" octant split).
const MOON_PHASE_COUNT: u64 = 8;

/// How far above/below the horizon the sun sits while sunlight is blending
/// linearly between full daylight and full darkness.
const TWILIGHT_BAND: f64 = 0.1;

/// The quantities derived from a `WorldClock`'s instant, recomputed only on
/// advance (§4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSnapshot {
    pub day_fraction: f32,
    pub sun_direction: Vec3d,
    pub sunlight_factor: f32,
    pub moon_phase: u8,
}

fn solar_direction(day_fraction: f64) -> Vec3d {
    let angle = day_fraction * std::f64::consts::TAU;
    Vec3d::new(angle.cos(), angle.sin(), 0.0)
}

fn solar_elevation(day_fraction: f64) -> f64 {
    (day_fraction * std::f64::consts::TAU).sin()
}

fn sunlight_factor_from_elevation(elevation: f64) -> f32 {
    if elevation >= TWILIGHT_BAND {
        1.0
    } else if elevation <= -TWILIGHT_BAND {
        0.0
    } else {
        (((elevation + TWILIGHT_BAND) / (2.0 * TWILIGHT_BAND)).clamp(0.0, 1.0)) as f32
    }
}

/// Single-owner world time authority (§4.5). One instance per loaded world,
/// mutated only by that world's executor; every other reader sees the cached
/// `TimeSnapshot` from the last advance.
#[derive(Debug, Clone)]
pub struct WorldClock {
    instant: u64,
    day_length: u64,
    night_length: u64,
    dilation: f32,
    paused: bool,
    broadcast_accum_millis: u64,
    snapshot: TimeSnapshot,
}

impl WorldClock {
    pub fn new(day_length: u64, night_length: u64, dilation: f32) -> Self {
        let mut clock = Self {
            instant: 0,
            day_length: day_length.max(1),
            night_length,
            dilation,
            paused: false,
            broadcast_accum_millis: 0,
            snapshot: TimeSnapshot {
                day_fraction: 0.0,
                sun_direction: Vec3d::ZERO,
                sunlight_factor: 0.0,
                moon_phase: 0,
            },
        };
        clock.recompute();
        clock
    }

    pub fn instant(&self) -> u64 {
        self.instant
    }

    pub fn day_length(&self) -> u64 {
        self.day_length
    }

    pub fn night_length(&self) -> u64 {
        self.night_length
    }

    pub fn dilation(&self) -> f32 {
        self.dilation
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn snapshot(&self) -> TimeSnapshot {
        self.snapshot
    }

    /// Advance the clock by `dt_millis` of real tick time. Returns `true`
    /// exactly when a simulated second has elapsed since the last `true`,
    /// signaling the caller to prepare and dispatch an `UpdateTime` (§4.5).
    pub fn advance(&mut self, dt_millis: u64) -> bool {
        if !self.paused {
            let delta = (dt_millis as f64 * self.dilation as f64) as u64;
            self.instant = self.instant.wrapping_add(delta);
            self.recompute();
        }
        self.broadcast_accum_millis += dt_millis;
        if self.broadcast_accum_millis >= BROADCAST_INTERVAL_MILLIS {
            self.broadcast_accum_millis -= BROADCAST_INTERVAL_MILLIS;
            true
        } else {
            false
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Force the clock to an absolute instant, recomputing derivatives
    /// immediately rather than waiting for the next tick (§4.5: "must run on
    /// the world's owning executor; they recompute derivatives and force an
    /// immediate broadcast"). The caller is responsible for the broadcast.
    pub fn set_instant(&mut self, instant: u64) {
        self.instant = instant;
        self.recompute();
    }

    /// Like `set_instant`, but expressed as a day fraction in `[0, 1)`.
    pub fn set_day_fraction(&mut self, fraction: f64) {
        self.instant = (fraction.clamp(0.0, 1.0) * self.day_length as f64) as u64;
        self.recompute();
    }

    fn recompute(&mut self) {
        let day_fraction = (self.instant % self.day_length) as f64 / self.day_length as f64;
        let elevation = solar_elevation(day_fraction);
        self.snapshot = TimeSnapshot {
            day_fraction: day_fraction as f32,
            sun_direction: solar_direction(day_fraction),
            sunlight_factor: sunlight_factor_from_elevation(elevation),
            moon_phase: ((self.instant / self.day_length) % MOON_PHASE_COUNT) as u8,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_fraction_wraps_at_day_length() {
        let mut clock = WorldClock::new(1_000, 500, 1.0);
        clock.set_instant(1_500);
        assert_eq!(clock.snapshot().day_fraction, 0.5);
    }

    #[test]
    fn paused_clock_does_not_advance_instant() {
        let mut clock = WorldClock::new(1_000, 500, 1.0);
        clock.set_paused(true);
        clock.advance(200);
        assert_eq!(clock.instant(), 0);
    }

    #[test]
    fn dilation_scales_instant_advance() {
        let mut clock = WorldClock::new(10_000, 5_000, 2.0);
        clock.advance(100);
        assert_eq!(clock.instant(), 200);
    }

    #[test]
    fn broadcast_deadline_fires_every_simulated_second() {
        let mut clock = WorldClock::new(10_000, 5_000, 1.0);
        assert!(!clock.advance(400));
        assert!(!clock.advance(400));
        assert!(clock.advance(400));
    }

    #[test]
    fn moon_phase_cycles_through_eight_values() {
        let mut clock = WorldClock::new(1_000, 500, 1.0);
        let phases: Vec<u8> = (0..8)
            .map(|i| {
                clock.set_instant(i * 1_000);
                clock.snapshot().moon_phase
            })
            .collect();
        assert_eq!(phases, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }
}
