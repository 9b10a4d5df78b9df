//! Output conversion and the hand-off to the hub's driver update.
//!
//! Readings arrive in canonical metric units. The sink converts them to the
//! configured measurement system, rounds them to the per-unit precision and
//! resolves the driver slot they are written to.
//!
//! | unit        | us conversion     | decimals |
//! |-------------|-------------------|----------|
//! | °C          | × 1.8 + 32        | 1        |
//! | mb          | × 0.02952998751   | 3        |
//! | m/s         | × 2.23694         | 2        |
//! | mm, mm/h    | × 0.03937         | 2        |
//! | km          | ÷ 1.609344        | 1        |
//! | trend       | none              | 0        |
//! | others      | none              | as read  |

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::PollConfig;
use crate::derived::MPS_TO_MPH;
use crate::error::Result;
use crate::units::{
    driver_slot_for, unit_for, CanonicalUnit, Category, ChannelMap, MeasurementSystem, Uom,
};

pub const MB_TO_INHG: f64 = 0.02952998751;
pub const MM_TO_INCH: f64 = 0.03937;
pub const KM_PER_MILE: f64 = 1.609344;

/// A canonical value for one channel, produced and consumed within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub category: Category,
    pub channel: &'static str,
    pub value: f64,
    pub unit: CanonicalUnit,
}

impl SensorReading {
    /// Fails with `UnknownChannel` when the channel is not in the category template.
    pub fn new(category: Category, channel: &str, value: f64) -> Result<Self> {
        let template = category.channel_template(channel)?;
        Ok(Self {
            category,
            channel: template.channel,
            value,
            unit: template.unit,
        })
    }
}

/// A converted value ready to be written to a driver slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverUpdate {
    pub category: Category,
    pub channel: &'static str,
    pub slot: &'static str,
    pub value: f64,
    #[serde(serialize_with = "serialize_uom")]
    pub uom: Uom,
    pub editor: &'static str,
}

fn serialize_uom<S: serde::Serializer>(uom: &Uom, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u16(uom.code())
}

/// Convert a canonical value into `system` without rounding.
pub fn convert(unit: CanonicalUnit, value: f64, system: MeasurementSystem) -> f64 {
    if system == MeasurementSystem::Metric {
        return value;
    }
    match unit {
        CanonicalUnit::Celsius => value * 1.8 + 32.0,
        CanonicalUnit::Millibar => value * MB_TO_INHG,
        CanonicalUnit::MetersPerSecond => value * MPS_TO_MPH,
        CanonicalUnit::Millimeters | CanonicalUnit::MillimetersPerHour => value * MM_TO_INCH,
        CanonicalUnit::Kilometers => value / KM_PER_MILE,
        CanonicalUnit::RelativeHumidity
        | CanonicalUnit::DegreesCompass
        | CanonicalUnit::UvIndex
        | CanonicalUnit::WattsPerSquareMeter
        | CanonicalUnit::Strikes
        | CanonicalUnit::Trend => value,
    }
}

/// Decimal places kept for a unit, `None` to pass the value through.
pub fn precision(unit: CanonicalUnit) -> Option<i32> {
    match unit {
        CanonicalUnit::Celsius => Some(1),
        CanonicalUnit::Millibar => Some(3),
        CanonicalUnit::MetersPerSecond
        | CanonicalUnit::Millimeters
        | CanonicalUnit::MillimetersPerHour => Some(2),
        CanonicalUnit::Kilometers => Some(1),
        CanonicalUnit::Trend => Some(0),
        _ => None,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Convert and address one reading, regardless of which channels are active.
pub fn emit(reading: &SensorReading, system: MeasurementSystem) -> Result<DriverUpdate> {
    let slot = driver_slot_for(reading.category, reading.channel)?;
    let converted = convert(reading.unit, reading.value, system);
    let value = match precision(reading.unit) {
        Some(decimals) => round_to(converted, decimals),
        None => converted,
    };
    let uom = unit_for(reading.unit, system);
    Ok(DriverUpdate {
        category: reading.category,
        channel: reading.channel,
        slot,
        value,
        uom,
        editor: uom.editor(),
    })
}

/// One sensor category: its active channels under the configured system.
#[derive(Debug, Clone)]
pub struct CategoryHandler {
    channels: ChannelMap,
}

impl CategoryHandler {
    pub fn new(channels: ChannelMap) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    /// `None` when the reading's channel is not active for this category.
    pub fn emit(&self, reading: &SensorReading) -> Option<DriverUpdate> {
        self.channels.get(reading.channel)?;
        match emit(reading, self.channels.system()) {
            Ok(update) => Some(update),
            Err(e) => {
                log::warn!("Dropping reading: {}", e);
                None
            }
        }
    }
}

/// Routes readings to their category handler.
#[derive(Debug, Clone)]
pub struct UnitSink {
    handlers: BTreeMap<Category, CategoryHandler>,
}

impl UnitSink {
    pub fn new(config: &PollConfig) -> Self {
        let handlers = config
            .channel_maps()
            .into_iter()
            .map(|map| (map.category(), CategoryHandler::new(map)))
            .collect();
        Self { handlers }
    }

    pub fn channel_maps(&self) -> Vec<ChannelMap> {
        self.handlers.values().map(|h| h.channels().clone()).collect()
    }

    pub fn emit(&self, reading: &SensorReading) -> Option<DriverUpdate> {
        let update = self.handlers.get(&reading.category)?.emit(reading);
        if update.is_none() {
            log::trace!("{}.{} is not active", reading.category, reading.channel);
        }
        update
    }
}

/// Receives every driver update, unconditionally and without de-duplication.
#[async_trait]
pub trait DriverPublisher: Send + Sync {
    async fn set_driver(&self, update: &DriverUpdate) -> Result<()>;
}
