//! Geographic coordinates from infobox fields.
//!
//! Two layouts are understood:
//! - a `coordinates` field holding `{{coord|D|M|S|NS|D|M|S|EW}}` (seconds optional)
//! - the older split fields `latd` / `latm` / `lats` / `latNS` and
//!   `longd` / `longm` / `longs` / `longEW`, where the minor parts may also be
//!   written inline inside the `latd` / `longd` value

use std::collections::HashMap;

use lazy_regex::regex;
use serde::{Deserialize, Serialize};

use crate::infobox::fields::FieldMap;

pub const NO_COORDINATES: &str = "No coordinates on page.";

/// Where a coordinate pair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateFormat {
    /// `{{coord}}` template in the `coordinates` field.
    Modern,
    /// Split `latd` / `longd` fields.
    Deprecated,
    /// Returned by the API's `coordinates` property.
    Geodata,
}

/// Signed decimal degrees, rounded to 4 places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
    pub format: CoordinateFormat,
}

/// Result of coordinate parsing. A page without coordinates is not an error
/// for the caller, it is a value carrying a message. Both shapes serialise
/// with `lat` and `lon` keys; a missing pair has them as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Found(Coordinate),
    Missing {
        lat: Option<f64>,
        lon: Option<f64>,
        error: String,
    },
}

impl Coordinates {
    pub fn missing() -> Self {
        Coordinates::Missing {
            lat: None,
            lon: None,
            error: NO_COORDINATES.to_string(),
        }
    }

    pub fn lat(&self) -> Option<f64> {
        match self {
            Coordinates::Found(c) => Some(c.lat),
            Coordinates::Missing { .. } => None,
        }
    }

    pub fn lon(&self) -> Option<f64> {
        match self {
            Coordinates::Found(c) => Some(c.lon),
            Coordinates::Missing { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Coordinates::Found(_))
    }
}

/// Round to 4 decimal places.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Convert degrees / minutes / seconds and a hemisphere letter to signed decimal
/// degrees. `S` and `W` are negative, anything else positive.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, direction: &str) -> f64 {
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    let sign = match direction.trim().to_ascii_uppercase().as_str() {
        "S" | "W" => -1.0,
        _ => 1.0,
    };
    round4(sign * value)
}

/// Numeric part of a coordinate component. Missing or unparsable is 0.
fn number(part: Option<&str>) -> f64 {
    part.map(str::trim)
        .filter(|p| !p.is_empty())
        .and_then(|p| p.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parse coordinates out of `fields`.
pub fn parse_coordinates(fields: &FieldMap) -> Coordinates {
    if let Some(found) = fields.get("coordinates").and_then(parse_coord_template) {
        return Coordinates::Found(found);
    }
    match parse_split_fields(fields) {
        Some(found) => Coordinates::Found(found),
        None => Coordinates::missing(),
    }
}

/// `{{coord|38|54|N|16|36|E}}` style values.
fn parse_coord_template(value: &str) -> Option<Coordinate> {
    let caps = regex!(
        r"(\d{1,2})\|(\d{1,2})\|(\d{1,2}(?:\.\d+)?)?\|?([NSEW])\|(\d{1,3})\|(\d{1,2})\|(\d{1,2}(?:\.\d+)?)?\|?([NSEW])"
    )
    .captures(value)?;
    let part = |i: usize| caps.get(i).map(|m| m.as_str());

    let lat = dms_to_decimal(number(part(1)), number(part(2)), number(part(3)), part(4)?);
    let lon = dms_to_decimal(number(part(5)), number(part(6)), number(part(7)), part(8)?);
    Some(Coordinate {
        lat,
        lon,
        format: CoordinateFormat::Modern,
    })
}

/// Fields written inline as `latd = 0 |latm = 47 |...` on one line.
fn inline_fields(value: &str) -> HashMap<String, String> {
    regex!(r"\|\s*(\w+)\s*=\s*([^|]*)")
        .captures_iter(value)
        .map(|c| (c[1].to_lowercase(), c[2].trim().to_string()))
        .collect()
}

/// Split `latd` / `longd` fields, with the minor parts looked up first as their
/// own fields and then inline in the degree value.
fn parse_split_fields(fields: &FieldMap) -> Option<Coordinate> {
    let latd = fields.get("latd")?;
    let longd = fields.get("longd")?;

    let lat_inline = inline_fields(latd);
    let long_inline = inline_fields(longd);
    let component = |name: &str, inline: &HashMap<String, String>| -> Option<String> {
        fields
            .get(name)
            .map(str::to_string)
            .or_else(|| inline.get(&name.to_lowercase()).cloned())
    };

    let leading = |value: &str| value.split('|').next().unwrap_or(value).trim().to_string();
    let lat_deg = leading(latd);
    let long_deg = leading(longd);
    if lat_deg.is_empty() || long_deg.is_empty() {
        return None;
    }

    let lat = dms_to_decimal(
        number(Some(&lat_deg)),
        number(component("latm", &lat_inline).as_deref()),
        number(component("lats", &lat_inline).as_deref()),
        &component("latNS", &lat_inline).unwrap_or_default(),
    );
    let lon = dms_to_decimal(
        number(Some(&long_deg)),
        number(component("longm", &long_inline).as_deref()),
        number(component("longs", &long_inline).as_deref()),
        &component("longEW", &long_inline).unwrap_or_default(),
    );
    Some(Coordinate {
        lat,
        lon,
        format: CoordinateFormat::Deprecated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_template_without_seconds() {
        let fields: FieldMap = [("coordinates", "{{coord|38|54|N|16|36|E}}")]
            .into_iter()
            .collect();
        let coords = parse_coordinates(&fields);
        assert_eq!(coords.lat(), Some(38.9));
        assert_eq!(coords.lon(), Some(16.6));
    }

    #[test]
    fn coord_template_with_seconds_southwest() {
        let fields: FieldMap = [("coordinates", "{{Coord|33|51|35.9|S|151|12|40|E|type:city}}")]
            .into_iter()
            .collect();
        let coords = parse_coordinates(&fields);
        assert_eq!(coords.lat(), Some(-33.8600));
        assert_eq!(coords.lon(), Some(151.2111));
    }

    #[test]
    fn deprecated_inline_minor_parts() {
        let fields: FieldMap = [
            ("latd", "0 |latm=47 |lats=59 |latNS=S"),
            ("longd", "100 |longm=39 |longs=58 |longEW=E"),
        ]
        .into_iter()
        .collect();
        match parse_coordinates(&fields) {
            Coordinates::Found(c) => {
                assert_eq!(c.lat, -0.7997);
                assert_eq!(c.lon, 100.6661);
                assert_eq!(c.format, CoordinateFormat::Deprecated);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn deprecated_separate_fields() {
        let fields: FieldMap = [
            ("latd", "51"),
            ("latm", "30"),
            ("latNS", "N"),
            ("longd", "0"),
            ("longm", "7"),
            ("longEW", "W"),
        ]
        .into_iter()
        .collect();
        let coords = parse_coordinates(&fields);
        assert_eq!(coords.lat(), Some(51.5));
        assert_eq!(coords.lon(), Some(-0.1167));
    }

    #[test]
    fn unmatched_coordinates_fall_through() {
        let fields: FieldMap = [
            ("coordinates", "somewhere nice"),
            ("latd", "10"),
            ("longd", "20"),
        ]
        .into_iter()
        .collect();
        let coords = parse_coordinates(&fields);
        assert_eq!(coords.lat(), Some(10.0));
        assert_eq!(coords.lon(), Some(20.0));
    }

    #[test]
    fn no_coordinates() {
        let fields: FieldMap = [("name", "Dublin")].into_iter().collect();
        assert_eq!(parse_coordinates(&fields), Coordinates::missing());
        let json = serde_json::to_value(Coordinates::missing()).unwrap();
        assert_eq!(json["error"], NO_COORDINATES);
        assert!(json["lat"].is_null());
        assert!(json["lon"].is_null());
        assert!(json.as_object().unwrap().contains_key("lat"));
        let back: Coordinates = serde_json::from_value(json).unwrap();
        assert!(!back.is_found());
    }

    #[test]
    fn hemisphere_signs() {
        assert_eq!(dms_to_decimal(10.0, 30.0, 0.0, "S"), -10.5);
        assert_eq!(dms_to_decimal(10.0, 30.0, 0.0, "w"), -10.5);
        assert_eq!(dms_to_decimal(10.0, 30.0, 0.0, ""), 10.5);
    }

    #[test]
    fn seconds_count_in_every_hemisphere() {
        let expected = round4(12.0 + 34.0 / 60.0 + 56.0 / 3600.0);
        assert_eq!(expected, 12.5822);
        assert_eq!(dms_to_decimal(12.0, 34.0, 56.0, "N"), expected);
        assert_eq!(dms_to_decimal(12.0, 34.0, 56.0, "E"), expected);
        assert_eq!(dms_to_decimal(12.0, 34.0, 56.0, "S"), -expected);
        assert_eq!(dms_to_decimal(12.0, 34.0, 56.0, "W"), -expected);
    }
}
