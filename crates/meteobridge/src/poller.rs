//! Poll orchestrator: fetch → parse → compute → convert → emit, on a timer.

use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::accumulation::AccumulationTracker;
use crate::config::PollConfig;
use crate::derived::{
    apparent_temperature, dewpoint, heat_index, sea_level_pressure, wind_chill,
    PressureTrendWindow,
};
use crate::error::Result;
use crate::fetch::fetch;
use crate::parser::{parse, SensorRecord, Thermo};
use crate::sink::{DriverPublisher, SensorReading, UnitSink};
use crate::units::{Category, ChannelMap};

/// Where the current cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Parsing,
    Computing,
    Emitting,
}

/// How a cycle ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No device address configured; nothing was attempted.
    Skipped,
    Completed {
        /// Updates accepted by the publisher.
        emitted: usize,
        /// Updates the publisher rejected.
        failed: usize,
        /// Elements dropped by the parser.
        rejected: usize,
    },
}

/// Owns everything that lives across cycles: the configuration, the output
/// handlers, rain accumulation and the pressure history.
pub struct Poller {
    config: PollConfig,
    sink: UnitSink,
    rain: AccumulationTracker,
    pressure: PressureTrendWindow,
    state: CycleState,
}

impl Poller {
    pub fn new(config: PollConfig) -> Self {
        let sink = UnitSink::new(&config);
        Self {
            config,
            sink,
            rain: AccumulationTracker::new(),
            pressure: PressureTrendWindow::new(),
            state: CycleState::Idle,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn channel_maps(&self) -> Vec<ChannelMap> {
        self.sink.channel_maps()
    }

    pub fn rain(&self) -> &AccumulationTracker {
        &self.rain
    }

    pub fn pressure_history(&self) -> &PressureTrendWindow {
        &self.pressure
    }

    /// Swap in a new configuration and rebuild every channel map.
    /// Rain totals and pressure history are kept.
    pub fn reconfigure(&mut self, config: PollConfig) {
        log::info!(
            "Reconfiguring: {:?} units, device {}:{}",
            config.system,
            config.device.host,
            config.device.port
        );
        self.sink = UnitSink::new(&config);
        self.config = config;
    }

    /// Run one cycle.
    ///
    /// A fetch or parse failure ends the cycle before anything is emitted.
    pub async fn poll_once(&mut self, publisher: &dyn DriverPublisher) -> Result<CycleOutcome> {
        if !self.config.device.is_configured() {
            log::debug!("MeteoBridge address not configured, skipping poll");
            return Ok(CycleOutcome::Skipped);
        }

        self.state = CycleState::Fetching;
        let raw = match fetch(&self.config.device).await {
            Ok(raw) => raw,
            Err(e) => {
                self.state = CycleState::Idle;
                return Err(e);
            }
        };
        log::debug!("Received {} bytes", raw.len());

        self.state = CycleState::Parsing;
        let telemetry = match parse(&raw, self.config.device.sensor_index) {
            Ok(t) => t,
            Err(e) => {
                self.state = CycleState::Idle;
                return Err(e);
            }
        };

        self.state = CycleState::Computing;
        let readings = self.compute(&telemetry.records, Local::now().naive_local());

        self.state = CycleState::Emitting;
        let (emitted, failed) = self.emit(&readings, publisher).await;

        self.state = CycleState::Idle;
        Ok(CycleOutcome::Completed {
            emitted,
            failed,
            rejected: telemetry.rejected.len(),
        })
    }

    /// Turn parsed records into canonical readings, updating rain totals and
    /// pressure history.
    pub fn compute(&mut self, records: &[SensorRecord], now: NaiveDateTime) -> Vec<SensorReading> {
        let mut out = Vec::new();

        // THB carries the same thermo data as TH, plus pressure.
        let thermo = records
            .iter()
            .find_map(|r| match r {
                SensorRecord::Thb { thermo, .. } => Some(thermo),
                _ => None,
            })
            .or_else(|| {
                records.iter().find_map(|r| match r {
                    SensorRecord::Th(thermo) => Some(thermo),
                    _ => None,
                })
            });
        let wind_speed = records.iter().find_map(|r| match r {
            SensorRecord::Wind { speed, .. } => Some(*speed),
            _ => None,
        });

        if let Some(t) = thermo {
            self.thermo_readings(&mut out, t, wind_speed.unwrap_or(0.0));
        }

        for record in records {
            match record {
                SensorRecord::Thb {
                    press, seapress, ..
                } => {
                    push(&mut out, Category::Pressure, "station", *press);
                    let sealevel = match seapress {
                        Some(p) => Ok(*p),
                        None => sea_level_pressure(*press, self.config.elevation_m),
                    };
                    match sealevel {
                        Ok(p) => push(&mut out, Category::Pressure, "sealevel", p),
                        Err(e) => log::warn!("No sea-level pressure: {}", e),
                    }
                    let trend = self.pressure.update(*press);
                    push(&mut out, Category::Pressure, "trend", trend.value());
                }
                SensorRecord::Wind {
                    speed,
                    gust,
                    dir,
                    chill,
                } => {
                    push(&mut out, Category::Wind, "windspeed", *speed);
                    push(&mut out, Category::Wind, "gustspeed", *gust);
                    push(&mut out, Category::Wind, "winddir", *dir);
                    let chill = chill.or_else(|| thermo.map(|t| wind_chill(t.temp, *speed)));
                    if let Some(c) = chill {
                        push(&mut out, Category::Temperature, "windchill", c);
                    }
                }
                SensorRecord::Rain { rate, delta, total } => {
                    push(&mut out, Category::Precipitation, "rate", *rate);
                    push(&mut out, Category::Precipitation, "total", *total);
                    if let Some(delta) = delta {
                        match self.rain.add(*delta, now) {
                            Ok(()) => {
                                for (period, value) in self.rain.totals() {
                                    push(&mut out, Category::Precipitation, period.channel(), value);
                                }
                            }
                            Err(e) => log::warn!("Rain accumulation skipped: {}", e),
                        }
                    }
                }
                SensorRecord::Uv { index } => push(&mut out, Category::Light, "uv", *index),
                SensorRecord::Solar { radiation } => {
                    push(&mut out, Category::Light, "solar_radiation", *radiation)
                }
                SensorRecord::Th(_) => {}
            }
        }
        out
    }

    fn thermo_readings(&self, out: &mut Vec<SensorReading>, t: &Thermo, wind_ms: f64) {
        push(out, Category::Temperature, "main", t.temp);
        push(out, Category::Humidity, "main", t.hum);
        match t.dew.map(Ok).unwrap_or_else(|| dewpoint(t.temp, t.hum)) {
            Ok(dew) => push(out, Category::Temperature, "dewpoint", dew),
            Err(e) => log::warn!("No dewpoint: {}", e),
        }
        push(out, Category::Temperature, "heatindex", heat_index(t.temp, t.hum));
        push(
            out,
            Category::Temperature,
            "apparent",
            apparent_temperature(t.temp, wind_ms, t.hum),
        );
    }

    async fn emit(
        &self,
        readings: &[SensorReading],
        publisher: &dyn DriverPublisher,
    ) -> (usize, usize) {
        let mut emitted = 0;
        let mut failed = 0;
        for reading in readings {
            let Some(update) = self.sink.emit(reading) else {
                continue;
            };
            log::debug!(
                "{}.{} [{}] = {} {}",
                update.category,
                update.channel,
                update.slot,
                update.value,
                update.editor
            );
            match publisher.set_driver(&update).await {
                Ok(()) => emitted += 1,
                Err(e) => {
                    log::warn!("Failed to set {}.{}: {}", update.category, update.slot, e);
                    failed += 1;
                }
            }
        }
        (emitted, failed)
    }

    /// Reserved; the short-poll tick does no work.
    fn short_poll(&self) {
        log::trace!("Short poll");
    }

    /// Poll on the long interval until shutdown. A failed cycle is logged
    /// and the next one runs on schedule.
    pub async fn run(
        mut self,
        publisher: Arc<dyn DriverPublisher>,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let mut long = interval(self.config.long_poll());
        let mut short = interval(self.config.short_poll());
        log::info!(
            "Polling MeteoBridge every {:?} ({:?} units)",
            self.config.long_poll(),
            self.config.system
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    log::info!("Shutdown signal received");
                    break;
                }
                _ = long.tick() => {
                    // An in-flight fetch is dropped on shutdown, closing its socket.
                    let result = tokio::select! {
                        biased;
                        _ = shutdown.changed() => {
                            log::info!("Shutdown signal received during poll");
                            break;
                        }
                        result = self.poll_once(publisher.as_ref()) => result,
                    };
                    match result {
                        Ok(CycleOutcome::Completed { emitted, failed, rejected }) => log::info!(
                            "Poll complete: {} updates, {} failed, {} elements rejected",
                            emitted,
                            failed,
                            rejected
                        ),
                        Ok(CycleOutcome::Skipped) => {}
                        Err(e) => log::warn!("Poll failed: {}", e),
                    }
                }
                _ = short.tick() => self.short_poll(),
            }
        }
        Ok(())
    }
}

fn interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn push(out: &mut Vec<SensorReading>, category: Category, channel: &str, value: f64) {
    match SensorReading::new(category, channel, value) {
        Ok(reading) => out.push(reading),
        Err(e) => log::error!("{}", e),
    }
}
