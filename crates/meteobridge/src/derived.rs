//! Derived weather metrics.
//!
//! Inputs and outputs are canonical: Celsius, m/s, %RH and millibar. Results
//! are not rounded here; output precision is applied once, in the sink.

use std::collections::VecDeque;

use crate::error::{Error, Result};

/// m/s to mph.
pub const MPS_TO_MPH: f64 = 2.23694;

/// Standard atmosphere, used by [`sea_level_pressure`].
const GAS_CONSTANT: f64 = 287.05; // J/(kg·K), dry air
const GRAVITY: f64 = 9.80665; // m/s²
const LAPSE_RATE: f64 = 0.0065; // K/m
const SEA_LEVEL_PRESSURE: f64 = 1013.35; // mb
const SEA_LEVEL_TEMPERATURE: f64 = 288.15; // K

/// Number of station pressure samples kept for the trend.
pub const TREND_WINDOW: usize = 180;

fn c_to_f(t: f64) -> f64 {
    t * 1.8 + 32.0
}

fn f_to_c(t: f64) -> f64 {
    (t - 32.0) / 1.8
}

/// Dewpoint using the Magnus approximation.
///
/// Humidity above 100% is clamped; zero or negative humidity has no dewpoint.
pub fn dewpoint(temp_c: f64, rh_pct: f64) -> Result<f64> {
    if rh_pct.is_nan() || rh_pct <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "dewpoint needs positive humidity, got {rh_pct}"
        )));
    }
    let b = (17.625 * temp_c) / (243.04 + temp_c);
    let c = (rh_pct.min(100.0) / 100.0).ln();
    Ok((243.04 * (c + b)) / (17.625 - c - b))
}

/// Steadman apparent temperature from vapor pressure and wind.
pub fn apparent_temperature(temp_c: f64, wind_ms: f64, rh_pct: f64) -> f64 {
    let vapor = rh_pct / 100.0 * 6.105 * (17.27 * temp_c / (237.7 + temp_c)).exp();
    temp_c + 0.33 * vapor - 0.70 * wind_ms - 4.0
}

/// NWS wind chill. Ambient temperature is returned unless it is at most
/// 50 °F with wind of at least 5 mph.
pub fn wind_chill(temp_c: f64, wind_ms: f64) -> f64 {
    let tf = c_to_f(temp_c);
    let mph = wind_ms * MPS_TO_MPH;
    if tf > 50.0 || mph < 5.0 {
        return temp_c;
    }
    let v = mph.powf(0.16);
    f_to_c(35.74 + 0.6215 * tf - 35.75 * v + 0.4275 * tf * v)
}

/// Rothfusz heat index. Ambient temperature is returned below 80 °F or
/// below 40% humidity.
pub fn heat_index(temp_c: f64, rh_pct: f64) -> f64 {
    let tf = c_to_f(temp_c);
    if tf < 80.0 || rh_pct < 40.0 {
        return temp_c;
    }
    let h = rh_pct;
    let hi = -42.379 + 2.04901523 * tf + 10.1433127 * h
        - 0.22475541 * tf * h
        - 6.83783e-3 * tf * tf
        - 5.481717e-2 * h * h
        + 1.22874e-3 * tf * tf * h
        + 8.5282e-4 * tf * h * h
        - 1.99e-6 * tf * tf * h * h;
    f_to_c(hi)
}

/// Reduce station pressure to sea level with the barometric formula.
pub fn sea_level_pressure(station_mb: f64, elevation_m: f64) -> Result<f64> {
    if station_mb.is_nan() || station_mb <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "station pressure must be positive, got {station_mb}"
        )));
    }
    let c = GAS_CONSTANT * LAPSE_RATE / GRAVITY;
    let exponent = 1.0 / c;
    let scale = (SEA_LEVEL_PRESSURE / station_mb).powf(c) * (LAPSE_RATE * elevation_m)
        / SEA_LEVEL_TEMPERATURE;
    Ok(station_mb * (1.0 + scale).powf(exponent))
}

/// Direction of the pressure change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Steady,
    Falling,
}

impl Trend {
    /// Hub trend index.
    pub fn value(self) -> f64 {
        match self {
            Trend::Rising => 1.0,
            Trend::Steady => 0.0,
            Trend::Falling => -1.0,
        }
    }
}

/// Station pressure history, most recent first.
#[derive(Debug, Clone, Default)]
pub struct PressureTrendWindow {
    samples: VecDeque<f64>,
}

impl PressureTrendWindow {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(TREND_WINDOW + 1),
        }
    }

    /// Record `current_mb` and report the trend against the history.
    ///
    /// The reference is the oldest sample once the window is full, otherwise
    /// the previous sample. An empty window is steady.
    pub fn update(&mut self, current_mb: f64) -> Trend {
        let reference = if self.samples.len() >= TREND_WINDOW {
            self.samples.back()
        } else {
            self.samples.front()
        };

        let trend = match reference.map(|past| past - current_mb) {
            Some(diff) if diff < -1.0 => Trend::Rising,
            Some(diff) if diff > 1.0 => Trend::Falling,
            _ => Trend::Steady,
        };

        self.samples.push_front(current_mb);
        while self.samples.len() > TREND_WINDOW {
            self.samples.pop_back();
        }
        trend
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples from newest to oldest.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

/// Free-function form of [`PressureTrendWindow::update`].
pub fn pressure_trend(window: &mut PressureTrendWindow, current_mb: f64) -> Trend {
    window.update(current_mb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn test_dewpoint_known_value() {
        let d = dewpoint(20.0, 55.0).unwrap();
        assert!(approx(d, 10.7, 0.1), "{d}");
    }

    #[test]
    fn test_dewpoint_never_above_temperature() {
        for t in [-30.0, -5.5, 0.0, 12.3, 25.0, 41.7] {
            for h in [0.5, 10.0, 45.0, 80.0, 99.9, 100.0] {
                let d = dewpoint(t, h).unwrap();
                assert!(d <= t + 1e-9, "t={t} h={h} d={d}");
            }
        }
    }

    #[test]
    fn test_dewpoint_saturated_equals_temperature() {
        assert!(approx(dewpoint(15.0, 100.0).unwrap(), 15.0, 1e-9));
    }

    #[test]
    fn test_dewpoint_rejects_non_positive_humidity() {
        assert!(matches!(dewpoint(20.0, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(dewpoint(20.0, -3.0), Err(Error::InvalidInput(_))));
        assert!(matches!(dewpoint(20.0, f64::NAN), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_apparent_temperature() {
        // 25 °C, 50%, 2 m/s: vapor pressure ~15.8 hPa
        let at = apparent_temperature(25.0, 2.0, 50.0);
        assert!(approx(at, 24.8, 0.1), "{at}");
        assert!(apparent_temperature(10.0, 8.0, 50.0) < apparent_temperature(10.0, 0.0, 50.0));
    }

    #[test]
    fn test_wind_chill_applies_when_cold_and_windy() {
        // -5 °C and 10 m/s
        let wc = wind_chill(-5.0, 10.0);
        assert!(wc < -5.0);
        assert!(approx(wc, -13.65, 0.05), "{wc}");
    }

    #[test]
    fn test_wind_chill_passthrough_when_warm() {
        // 11 °C is 51.8 °F
        assert_eq!(wind_chill(11.0, 20.0), 11.0);
    }

    #[test]
    fn test_wind_chill_passthrough_when_calm() {
        // 2 m/s is ~4.47 mph
        assert_eq!(wind_chill(-10.0, 2.0), -10.0);
    }

    #[test]
    fn test_heat_index_applies_when_hot_and_humid() {
        // 32 °C (89.6 °F) at 60% is ~98.7 °F
        let hi = heat_index(32.0, 60.0);
        assert!(hi > 32.0);
        assert!(approx(hi, 37.1, 0.2), "{hi}");
    }

    #[test]
    fn test_heat_index_passthrough() {
        assert_eq!(heat_index(26.0, 90.0), 26.0); // 78.8 °F
        assert_eq!(heat_index(35.0, 39.9), 35.0);
    }

    #[test]
    fn test_sea_level_pressure_at_sea_level() {
        assert!(approx(sea_level_pressure(1013.0, 0.0).unwrap(), 1013.0, 1e-9));
    }

    #[test]
    fn test_sea_level_pressure_increases_with_elevation() {
        let p = sea_level_pressure(900.0, 1000.0).unwrap();
        assert!(approx(p, 1014.7, 1.0), "{p}");
        assert!(sea_level_pressure(900.0, 500.0).unwrap() < p);
    }

    #[test]
    fn test_sea_level_pressure_rejects_zero() {
        assert!(sea_level_pressure(0.0, 100.0).is_err());
    }

    #[test]
    fn test_trend_first_sample_is_steady() {
        let mut w = PressureTrendWindow::new();
        assert_eq!(w.update(1013.0), Trend::Steady);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_trend_against_previous_sample() {
        let mut w = PressureTrendWindow::new();
        w.update(1013.0);
        assert_eq!(w.update(1014.5), Trend::Rising);
        assert_eq!(w.update(1013.2), Trend::Falling);
        assert_eq!(w.update(1013.9), Trend::Steady);
    }

    #[test]
    fn test_trend_against_oldest_when_full() {
        let mut w = PressureTrendWindow::new();
        w.update(1000.0);
        for _ in 1..TREND_WINDOW {
            w.update(1010.0);
        }
        assert_eq!(w.len(), TREND_WINDOW);
        // Previous sample is 1010 (steady), oldest is 1000 (rising).
        assert_eq!(pressure_trend(&mut w, 1010.0), Trend::Rising);
    }

    #[test]
    fn test_trend_window_evicts_oldest_first() {
        let mut w = PressureTrendWindow::new();
        for i in 0..=TREND_WINDOW {
            w.update(i as f64);
        }
        assert_eq!(w.len(), TREND_WINDOW);
        let samples: Vec<f64> = w.samples().collect();
        assert_eq!(samples[0], TREND_WINDOW as f64);
        assert_eq!(*samples.last().unwrap(), 1.0);
    }
}
