//! Decoding of the MeteoBridge XML feed into typed sensor records.
//!
//! A feed looks like:
//!
//! ```text
//! <logger>
//!   <THB id="thb0" temp="20.0" hum="55.0" dew="11.2" press="1013.0" seapress="1015.0"/>
//!   <WIND id="wind0" dir="180" gust="4.2" wind="2.1" chill="20.0"/>
//!   <RAIN id="rain0" rate="0.0" total="120.4" delta="0.0"/>
//!   <UV index="1.2"/>
//!   <SOL rad="410.0"/>
//! </logger>
//! ```
//!
//! Only the primary sensor of each kind is kept (`thb0`, `wind0`, ... for
//! index 0). A broken element is dropped on its own; a broken document fails
//! as a whole.

use roxmltree::{Document, Node};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Temperature and humidity shared by `TH` and `THB`.
#[derive(Debug, Clone, PartialEq)]
pub struct Thermo {
    pub temp: f64,
    pub hum: f64,
    pub dew: Option<f64>,
}

/// One consumed element, values in canonical units.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorRecord {
    Uv {
        index: f64,
    },
    Solar {
        radiation: f64,
    },
    Rain {
        rate: f64,
        delta: Option<f64>,
        total: f64,
    },
    Th(Thermo),
    Thb {
        thermo: Thermo,
        press: f64,
        seapress: Option<f64>,
    },
    Wind {
        speed: f64,
        gust: f64,
        dir: f64,
        chill: Option<f64>,
    },
}

/// Result of decoding one document.
#[derive(Debug, Default)]
pub struct Telemetry {
    pub records: Vec<SensorRecord>,
    /// Element-level failures; the elements were skipped.
    pub rejected: Vec<Error>,
}

/// Decode a raw feed, keeping sensors whose id ends in `sensor_index`.
///
/// Only the first element of each kind that decodes is kept; later copies
/// are skipped.
pub fn parse(raw: &[u8], sensor_index: u32) -> Result<Telemetry> {
    let text = std::str::from_utf8(raw).map_err(|e| Error::Parse(e.to_string()))?;
    let doc = Document::parse(text.trim())?;

    let mut telemetry = Telemetry::default();
    // Tags already turned into a record; each kind is consumed once.
    let mut consumed: HashSet<&str> = HashSet::new();
    for node in doc.root_element().children().filter(Node::is_element) {
        let tag = node.tag_name().name();
        if !is_known(tag) {
            log::debug!("Ignoring <{}>", tag);
            continue;
        }
        if let Some(id) = node.attribute("id") {
            let primary = format!("{}{}", tag.to_ascii_lowercase(), sensor_index);
            if !id.eq_ignore_ascii_case(&primary) {
                log::debug!("Skipping <{} id=\"{}\">, primary is {}", tag, id, primary);
                continue;
            }
        }

        if consumed.contains(tag) {
            log::debug!("Skipping repeated <{}>, already consumed", tag);
            continue;
        }

        match decode(node, tag) {
            Ok(record) => {
                consumed.insert(tag);
                telemetry.records.push(record);
            }
            Err(e) => {
                log::warn!("Skipping element: {}", e);
                telemetry.rejected.push(e);
            }
        }
    }
    Ok(telemetry)
}

fn is_known(tag: &str) -> bool {
    matches!(tag, "UV" | "SOL" | "RAIN" | "TH" | "THB" | "WIND")
}

fn decode(node: Node, tag: &str) -> Result<SensorRecord> {
    let record = match tag {
        "UV" => SensorRecord::Uv {
            index: required(node, "index")?,
        },
        "SOL" => SensorRecord::Solar {
            radiation: required(node, "rad")?,
        },
        "RAIN" => SensorRecord::Rain {
            rate: required(node, "rate")?,
            delta: optional(node, "delta")?,
            total: required(node, "total")?,
        },
        "TH" => SensorRecord::Th(thermo(node)?),
        "THB" => SensorRecord::Thb {
            thermo: thermo(node)?,
            press: required(node, "press")?,
            seapress: optional(node, "seapress")?,
        },
        "WIND" => SensorRecord::Wind {
            speed: required(node, "wind")?,
            gust: required(node, "gust")?,
            dir: required(node, "dir")?,
            chill: optional(node, "chill")?,
        },
        other => return Err(Error::Parse(format!("unsupported element <{other}>"))),
    };
    Ok(record)
}

fn thermo(node: Node) -> Result<Thermo> {
    Ok(Thermo {
        temp: required(node, "temp")?,
        hum: required(node, "hum")?,
        dew: optional(node, "dew")?,
    })
}

fn required(node: Node, attribute: &'static str) -> Result<f64> {
    optional(node, attribute)?.ok_or_else(|| Error::MissingAttribute {
        tag: node.tag_name().name().to_string(),
        attribute,
    })
}

fn optional(node: Node, attribute: &'static str) -> Result<Option<f64>> {
    let Some(raw) = node.attribute(attribute) else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(Error::InvalidAttribute {
            tag: node.tag_name().name().to_string(),
            attribute,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<logger>
  <THB id="thb0" temp="20.0" hum="55.0" dew="11.2" press="1013.0" seapress="1015.0" fc="2"/>
  <TH id="th0" temp="19.5" hum="57.0" dew="10.8"/>
  <WIND id="wind0" dir="225" gust="6.3" wind="3.1" chill="19.8"/>
  <RAIN id="rain0" rate="1.2" total="340.5" delta="0.4"/>
  <UV index="2.1"/>
  <SOL rad="512.0"/>
</logger>"#;

    #[test]
    fn test_parse_full_feed() {
        let t = parse(FEED.as_bytes(), 0).unwrap();
        assert!(t.rejected.is_empty());
        assert_eq!(t.records.len(), 6);
        assert_eq!(
            t.records[0],
            SensorRecord::Thb {
                thermo: Thermo {
                    temp: 20.0,
                    hum: 55.0,
                    dew: Some(11.2)
                },
                press: 1013.0,
                seapress: Some(1015.0),
            }
        );
        assert_eq!(
            t.records[2],
            SensorRecord::Wind {
                speed: 3.1,
                gust: 6.3,
                dir: 225.0,
                chill: Some(19.8)
            }
        );
        assert_eq!(
            t.records[3],
            SensorRecord::Rain {
                rate: 1.2,
                delta: Some(0.4),
                total: 340.5
            }
        );
        assert_eq!(t.records[4], SensorRecord::Uv { index: 2.1 });
        assert_eq!(t.records[5], SensorRecord::Solar { radiation: 512.0 });
    }

    #[test]
    fn test_unknown_tags_are_ignored() {
        let xml = r#"<logger><LGT id="lgt0" cnt="3"/><UV index="4.0"/><FOO/></logger>"#;
        let t = parse(xml.as_bytes(), 0).unwrap();
        assert_eq!(t.records, vec![SensorRecord::Uv { index: 4.0 }]);
        assert!(t.rejected.is_empty());
    }

    #[test]
    fn test_secondary_sensor_is_skipped() {
        let xml = r#"<logger>
  <RAIN id="rain1" rate="9.0" total="9.0" delta="9.0"/>
  <RAIN id="rain0" rate="0.5" total="12.0" delta="0.1"/>
</logger>"#;
        let t = parse(xml.as_bytes(), 0).unwrap();
        assert_eq!(
            t.records,
            vec![SensorRecord::Rain {
                rate: 0.5,
                delta: Some(0.1),
                total: 12.0
            }]
        );
    }

    #[test]
    fn test_repeated_primary_is_consumed_once() {
        let xml = r#"<logger>
  <RAIN id="rain0" rate="1.0" total="10.0" delta="2.0"/>
  <RAIN id="rain0" rate="5.0" total="50.0" delta="2.0"/>
  <UV index="1.0"/>
  <UV index="9.0"/>
</logger>"#;
        let t = parse(xml.as_bytes(), 0).unwrap();
        assert_eq!(
            t.records,
            vec![
                SensorRecord::Rain {
                    rate: 1.0,
                    delta: Some(2.0),
                    total: 10.0
                },
                SensorRecord::Uv { index: 1.0 },
            ]
        );
    }

    #[test]
    fn test_rejected_primary_does_not_block_next_copy() {
        let xml = r#"<logger>
  <THB id="thb0" temp="x" hum="50" press="1000"/>
  <THB id="thb0" temp="12.0" hum="50" press="1000"/>
</logger>"#;
        let t = parse(xml.as_bytes(), 0).unwrap();
        assert_eq!(t.rejected.len(), 1);
        assert_eq!(t.records.len(), 1);
        assert!(matches!(&t.records[0], SensorRecord::Thb { thermo, .. } if thermo.temp == 12.0));
    }

    #[test]
    fn test_only_secondary_sensor_yields_nothing() {
        let xml = r#"<logger><RAIN id="rain1" rate="1.0" total="2.0" delta="0.0"/></logger>"#;
        let t = parse(xml.as_bytes(), 0).unwrap();
        assert!(t.records.is_empty());
    }

    #[test]
    fn test_configured_sensor_index() {
        let xml = r#"<logger>
  <TH id="th0" temp="1.0" hum="50"/>
  <TH id="th1" temp="2.0" hum="60"/>
</logger>"#;
        let t = parse(xml.as_bytes(), 1).unwrap();
        assert_eq!(
            t.records,
            vec![SensorRecord::Th(Thermo {
                temp: 2.0,
                hum: 60.0,
                dew: None
            })]
        );
    }

    #[test]
    fn test_missing_attribute_skips_only_that_element() {
        let xml = r#"<logger>
  <WIND id="wind0" dir="90" wind="2.0"/>
  <SOL rad="100"/>
</logger>"#;
        let t = parse(xml.as_bytes(), 0).unwrap();
        assert_eq!(t.records, vec![SensorRecord::Solar { radiation: 100.0 }]);
        assert_eq!(t.rejected.len(), 1);
        assert!(matches!(
            &t.rejected[0],
            Error::MissingAttribute { tag, attribute: "gust" } if tag == "WIND"
        ));
    }

    #[test]
    fn test_non_numeric_attribute_skips_element() {
        let xml = r#"<logger><UV index="--"/><SOL rad="7"/></logger>"#;
        let t = parse(xml.as_bytes(), 0).unwrap();
        assert_eq!(t.records.len(), 1);
        assert!(matches!(&t.rejected[0], Error::InvalidAttribute { attribute: "index", .. }));
    }

    #[test]
    fn test_optional_attributes_may_be_absent() {
        let xml = r#"<logger><THB id="thb0" temp="5.0" hum="80" press="990.0"/></logger>"#;
        let t = parse(xml.as_bytes(), 0).unwrap();
        assert_eq!(
            t.records,
            vec![SensorRecord::Thb {
                thermo: Thermo {
                    temp: 5.0,
                    hum: 80.0,
                    dew: None
                },
                press: 990.0,
                seapress: None,
            }]
        );
    }

    #[test]
    fn test_malformed_document_fails() {
        let xml = r#"<logger><UV index="1.0"/><SOL rad="3""#;
        assert!(matches!(parse(xml.as_bytes(), 0), Err(Error::Parse(_))));
    }

    #[test]
    fn test_truncated_document_fails() {
        let truncated = &FEED.as_bytes()[..FEED.len() / 2];
        assert!(matches!(parse(truncated, 0), Err(Error::Parse(_))));
    }

    #[test]
    fn test_invalid_utf8_fails() {
        assert!(matches!(parse(&[0x3c, 0xff, 0xfe, 0x3e], 0), Err(Error::Parse(_))));
    }

    #[test]
    fn test_surrounding_whitespace_is_tolerated() {
        let t = parse(b"\r\n  <logger><UV index=\"0.5\"/></logger>\n", 0).unwrap();
        assert_eq!(t.records.len(), 1);
    }
}
