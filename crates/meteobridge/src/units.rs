//! Unit registry: sensor categories, their channel templates, and the mapping
//! from canonical units to the ISY unit of measure shown on the hub.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Output measurement system, global for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementSystem {
    #[default]
    Metric,
    Us,
}

/// Sensor categories exposed to the hub, one device node each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Temperature,
    Humidity,
    Pressure,
    Wind,
    #[serde(alias = "rain")]
    Precipitation,
    Light,
    Lightning,
}

/// Internal metric representation every reading arrives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalUnit {
    Celsius,
    RelativeHumidity,
    Millibar,
    MetersPerSecond,
    DegreesCompass,
    Millimeters,
    MillimetersPerHour,
    UvIndex,
    WattsPerSquareMeter,
    Strikes,
    Kilometers,
    /// Pressure trend index: -1 falling, 0 steady, 1 rising.
    Trend,
}

/// ISY unit of measure, identified on the hub by an editor id and a UOM number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uom {
    TempC,
    TempF,
    Humidity,
    Millibar,
    InHg,
    Trend,
    Kph,
    Mph,
    Mps,
    Degree,
    MmPerHour,
    InPerHour,
    Mm,
    Inch,
    UvIndex,
    Lux,
    Radiation,
    Strikes,
    Km,
    Mile,
}

impl Uom {
    /// Editor id used in node definitions.
    pub fn editor(self) -> &'static str {
        match self {
            Uom::TempC => "TEMP_C",
            Uom::TempF => "TEMP_F",
            Uom::Humidity => "I_HUMIDITY",
            Uom::Millibar => "I_MB",
            Uom::InHg => "I_INHG",
            Uom::Trend => "I_TREND",
            Uom::Kph => "I_KPH",
            Uom::Mph => "I_MPH",
            Uom::Mps => "I_MPS",
            Uom::Degree => "I_DEGREE",
            Uom::MmPerHour => "I_MMHR",
            Uom::InPerHour => "I_INHR",
            Uom::Mm => "I_MM",
            Uom::Inch => "I_INCH",
            Uom::UvIndex => "I_UV",
            Uom::Lux => "I_LUX",
            Uom::Radiation => "I_RADIATION",
            Uom::Strikes => "I_STRIKES",
            Uom::Km => "I_KM",
            Uom::Mile => "I_MILE",
        }
    }

    /// ISY UOM number.
    pub fn code(self) -> u16 {
        match self {
            Uom::TempC => 4,
            Uom::TempF => 17,
            Uom::Humidity => 51,
            Uom::Millibar => 117,
            Uom::InHg => 23,
            Uom::Trend => 25,
            Uom::Kph => 32,
            Uom::Mph => 48,
            Uom::Mps => 49,
            Uom::Degree => 14,
            Uom::MmPerHour => 46,
            Uom::InPerHour => 24,
            Uom::Mm => 82,
            Uom::Inch => 105,
            Uom::UvIndex => 71,
            Uom::Lux => 36,
            Uom::Radiation => 74,
            Uom::Strikes => 56,
            Uom::Km => 83,
            Uom::Mile => 116,
        }
    }
}

/// Output unit for a canonical unit under the given measurement system.
///
/// Only temperature, pressure, speed, rain and distance follow the system;
/// degree, percentage, index and count units never change.
pub fn unit_for(unit: CanonicalUnit, system: MeasurementSystem) -> Uom {
    let us = system == MeasurementSystem::Us;
    match unit {
        CanonicalUnit::Celsius if us => Uom::TempF,
        CanonicalUnit::Celsius => Uom::TempC,
        CanonicalUnit::Millibar if us => Uom::InHg,
        CanonicalUnit::Millibar => Uom::Millibar,
        CanonicalUnit::MetersPerSecond if us => Uom::Mph,
        CanonicalUnit::MetersPerSecond => Uom::Mps,
        CanonicalUnit::MillimetersPerHour if us => Uom::InPerHour,
        CanonicalUnit::MillimetersPerHour => Uom::MmPerHour,
        CanonicalUnit::Millimeters if us => Uom::Inch,
        CanonicalUnit::Millimeters => Uom::Mm,
        CanonicalUnit::Kilometers if us => Uom::Mile,
        CanonicalUnit::Kilometers => Uom::Km,
        CanonicalUnit::RelativeHumidity => Uom::Humidity,
        CanonicalUnit::DegreesCompass => Uom::Degree,
        CanonicalUnit::UvIndex => Uom::UvIndex,
        CanonicalUnit::WattsPerSquareMeter => Uom::Radiation,
        CanonicalUnit::Strikes => Uom::Strikes,
        CanonicalUnit::Trend => Uom::Trend,
    }
}

/// One channel of a category template.
#[derive(Debug, Clone, Copy)]
pub struct ChannelTemplate {
    pub channel: &'static str,
    pub slot: &'static str,
    pub unit: CanonicalUnit,
    /// Instantiated when the configuration does not list channels explicitly.
    pub default_active: bool,
}

const fn tmpl(
    channel: &'static str,
    slot: &'static str,
    unit: CanonicalUnit,
    default_active: bool,
) -> ChannelTemplate {
    ChannelTemplate {
        channel,
        slot,
        unit,
        default_active,
    }
}

const TEMPERATURE: &[ChannelTemplate] = &[
    tmpl("main", "ST", CanonicalUnit::Celsius, true),
    tmpl("dewpoint", "GV0", CanonicalUnit::Celsius, true),
    tmpl("windchill", "GV1", CanonicalUnit::Celsius, true),
    tmpl("heatindex", "GV2", CanonicalUnit::Celsius, true),
    tmpl("apparent", "GV3", CanonicalUnit::Celsius, true),
];

const HUMIDITY: &[ChannelTemplate] = &[tmpl("main", "ST", CanonicalUnit::RelativeHumidity, true)];

const PRESSURE: &[ChannelTemplate] = &[
    tmpl("station", "ST", CanonicalUnit::Millibar, true),
    tmpl("sealevel", "GV0", CanonicalUnit::Millibar, true),
    tmpl("trend", "GV1", CanonicalUnit::Trend, true),
];

const WIND: &[ChannelTemplate] = &[
    tmpl("windspeed", "ST", CanonicalUnit::MetersPerSecond, true),
    tmpl("winddir", "GV0", CanonicalUnit::DegreesCompass, true),
    tmpl("gustspeed", "GV1", CanonicalUnit::MetersPerSecond, true),
    tmpl("gustdir", "GV2", CanonicalUnit::DegreesCompass, false),
];

const PRECIPITATION: &[ChannelTemplate] = &[
    tmpl("rate", "ST", CanonicalUnit::MillimetersPerHour, true),
    tmpl("hourly", "GV0", CanonicalUnit::Millimeters, true),
    tmpl("daily", "GV1", CanonicalUnit::Millimeters, true),
    tmpl("weekly", "GV2", CanonicalUnit::Millimeters, true),
    tmpl("monthly", "GV3", CanonicalUnit::Millimeters, true),
    tmpl("yearly", "GV4", CanonicalUnit::Millimeters, true),
    tmpl("total", "GV5", CanonicalUnit::Millimeters, true),
];

const LIGHT: &[ChannelTemplate] = &[
    tmpl("uv", "ST", CanonicalUnit::UvIndex, true),
    tmpl("solar_radiation", "GV0", CanonicalUnit::WattsPerSquareMeter, true),
];

const LIGHTNING: &[ChannelTemplate] = &[
    tmpl("strikes", "ST", CanonicalUnit::Strikes, false),
    tmpl("distance", "GV0", CanonicalUnit::Kilometers, false),
];

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Temperature,
        Category::Humidity,
        Category::Pressure,
        Category::Wind,
        Category::Precipitation,
        Category::Light,
        Category::Lightning,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Temperature => "temperature",
            Category::Humidity => "humidity",
            Category::Pressure => "pressure",
            Category::Wind => "wind",
            Category::Precipitation => "precipitation",
            Category::Light => "light",
            Category::Lightning => "lightning",
        }
    }

    /// Fixed channel template of this category.
    pub fn template(self) -> &'static [ChannelTemplate] {
        match self {
            Category::Temperature => TEMPERATURE,
            Category::Humidity => HUMIDITY,
            Category::Pressure => PRESSURE,
            Category::Wind => WIND,
            Category::Precipitation => PRECIPITATION,
            Category::Light => LIGHT,
            Category::Lightning => LIGHTNING,
        }
    }

    /// Template entry of `channel`, `UnknownChannel` when it has none.
    pub fn channel_template(self, channel: &str) -> Result<&'static ChannelTemplate> {
        self.template()
            .iter()
            .find(|t| t.channel == channel)
            .ok_or_else(|| Error::UnknownChannel {
                category: self.name().to_string(),
                channel: channel.to_string(),
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Driver slot a channel is written to.
pub fn driver_slot_for(category: Category, channel: &str) -> Result<&'static str> {
    category.channel_template(channel).map(|t| t.slot)
}

/// A configured channel: where it is written and in what unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEntry {
    pub channel: &'static str,
    pub slot: &'static str,
    pub unit: CanonicalUnit,
    pub uom: Uom,
}

/// Active channels of one category, built at configuration time.
#[derive(Debug, Clone)]
pub struct ChannelMap {
    category: Category,
    system: MeasurementSystem,
    entries: Vec<ChannelEntry>,
}

impl ChannelMap {
    /// Build from an explicit channel list.
    ///
    /// Channels missing from the category template are logged and left out;
    /// duplicates collapse to a single entry.
    pub fn build<S: AsRef<str>>(
        category: Category,
        channels: &[S],
        system: MeasurementSystem,
    ) -> Self {
        let mut map = Self {
            category,
            system,
            entries: Vec::with_capacity(channels.len()),
        };
        for channel in channels {
            if let Err(e) = map.insert(channel.as_ref()) {
                log::warn!("Skipping channel: {}", e);
            }
        }
        map
    }

    /// Build from the template's default active channels.
    pub fn defaults(category: Category, system: MeasurementSystem) -> Self {
        let channels: Vec<&str> = category
            .template()
            .iter()
            .filter(|t| t.default_active)
            .map(|t| t.channel)
            .collect();
        Self::build(category, &channels, system)
    }

    /// Activate one template channel.
    pub fn insert(&mut self, channel: &str) -> Result<()> {
        let t = self.category.channel_template(channel)?;
        if self.get(t.channel).is_none() {
            self.entries.push(ChannelEntry {
                channel: t.channel,
                slot: t.slot,
                unit: t.unit,
                uom: unit_for(t.unit, self.system),
            });
        }
        Ok(())
    }

    pub fn get(&self, channel: &str) -> Option<&ChannelEntry> {
        self.entries.iter().find(|e| e.channel == channel)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn system(&self) -> MeasurementSystem {
        self.system
    }

    pub fn entries(&self) -> &[ChannelEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
