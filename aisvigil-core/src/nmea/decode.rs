//! Decoders for the own-ship sentence set
//!
//! Only the handful of sentence types the position cache and the replay
//! time reference need: RMC, GGA, VTG, HDT and ZDA. Empty fields decode to
//! `None`; a malformed mandatory field fails the whole sentence.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use super::{NmeaSentence, SentenceId};
use crate::error::ParseError;
use crate::geo::GeoPosition;

/// Recommended minimum navigation data (position, SOG, COG, date+time)
#[derive(Debug, Clone, PartialEq)]
pub struct RmcData {
    /// Full UTC timestamp composed from the time and date fields
    pub time: Option<DateTime<Utc>>,
    /// Receiver status field was "A" (valid fix)
    pub valid: bool,
    pub position: Option<GeoPosition>,
    /// Speed over ground in knots
    pub speed_over_ground: Option<f64>,
    /// Course over ground in degrees true
    pub course_over_ground: Option<f64>,
}

/// Global positioning fix data (position + fix quality)
#[derive(Debug, Clone, PartialEq)]
pub struct GgaData {
    pub time: Option<NaiveTime>,
    pub position: Option<GeoPosition>,
    /// 0 = no fix
    pub fix_quality: u32,
}

/// Course and speed over ground
#[derive(Debug, Clone, PartialEq)]
pub struct VtgData {
    pub course_true: Option<f64>,
    pub speed_knots: Option<f64>,
}

/// True heading
#[derive(Debug, Clone, PartialEq)]
pub struct HdtData {
    pub heading_true: Option<f64>,
}

/// Time and date: the replay time reference sentence
#[derive(Debug, Clone, PartialEq)]
pub struct ZdaData {
    pub time: DateTime<Utc>,
}

fn expect_id(sentence: &NmeaSentence, expected: SentenceId) -> Result<(), ParseError> {
    if sentence.id != expected {
        return Err(ParseError::WrongSentenceType {
            expected: match expected {
                SentenceId::RMC => "RMC",
                SentenceId::GGA => "GGA",
                SentenceId::VTG => "VTG",
                SentenceId::HDT => "HDT",
                SentenceId::ZDA => "ZDA",
                _ => "known sentence",
            },
            actual: sentence.id.to_string(),
        });
    }
    Ok(())
}

fn opt_f64(field: &'static str, value: &str) -> Result<Option<f64>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|e| ParseError::invalid_field(field, e.to_string()))
}

fn opt_u32(field: &'static str, value: &str) -> Result<Option<u32>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<u32>()
        .map(Some)
        .map_err(|e| ParseError::invalid_field(field, e.to_string()))
}

/// Parse one "ddmm.mmm" + hemisphere coordinate pair.
/// Empty value or hemisphere yields `None` (no fix).
fn parse_coordinate(
    field: &'static str,
    value: &str,
    hemisphere: &str,
) -> Result<Option<f64>, ParseError> {
    if value.is_empty() || hemisphere.is_empty() {
        return Ok(None);
    }
    let raw = value
        .parse::<f64>()
        .map_err(|e| ParseError::invalid_field(field, e.to_string()))?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let mut result = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => {}
        "S" | "W" => result = -result,
        other => {
            return Err(ParseError::invalid_field(
                field,
                format!("bad hemisphere '{}'", other),
            ))
        }
    }
    Ok(Some(result))
}

fn parse_position(
    sentence: &NmeaSentence,
    lat_index: usize,
) -> Result<Option<GeoPosition>, ParseError> {
    let lat = parse_coordinate(
        "latitude",
        sentence.field(lat_index),
        sentence.field(lat_index + 1),
    )?;
    let lon = parse_coordinate(
        "longitude",
        sentence.field(lat_index + 2),
        sentence.field(lat_index + 3),
    )?;
    Ok(match (lat, lon) {
        (Some(lat), Some(lon)) => Some(GeoPosition::new(lat, lon, 0.0)),
        _ => None,
    })
}

/// Parse "hhmmss" or "hhmmss.sss"
fn parse_time(field: &'static str, value: &str) -> Result<Option<NaiveTime>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.len() != 6 || !whole.is_ascii() {
        return Err(ParseError::invalid_field(field, value.to_string()));
    }
    let numeric = |s: &str| {
        s.parse::<u32>()
            .map_err(|e| ParseError::invalid_field(field, e.to_string()))
    };
    let (h, m, s) = (
        numeric(&whole[0..2])?,
        numeric(&whole[2..4])?,
        numeric(&whole[4..6])?,
    );
    let millis = if frac.is_empty() {
        0
    } else {
        (format!("0.{}", frac).parse::<f64>().unwrap_or(0.0) * 1000.0) as u32
    };
    NaiveTime::from_hms_milli_opt(h, m, s, millis)
        .map(Some)
        .ok_or_else(|| ParseError::invalid_field(field, value.to_string()))
}

pub fn decode_rmc(sentence: &NmeaSentence) -> Result<RmcData, ParseError> {
    expect_id(sentence, SentenceId::RMC)?;

    let time_of_day = parse_time("time", sentence.field(0))?;
    let valid = sentence.field(1) == "A";
    let position = parse_position(sentence, 2)?;
    let speed_over_ground = opt_f64("sog", sentence.field(6))?;
    let course_over_ground = opt_f64("cog", sentence.field(7))?;

    // Date field is ddmmyy
    let date = {
        let raw = sentence.field(8);
        if raw.len() == 6 && raw.is_ascii() {
            let day = raw[0..2].parse::<u32>().ok();
            let month = raw[2..4].parse::<u32>().ok();
            let year = raw[4..6].parse::<i32>().ok().map(|y| 2000 + y);
            match (day, month, year) {
                (Some(d), Some(m), Some(y)) => NaiveDate::from_ymd_opt(y, m, d),
                _ => None,
            }
        } else {
            None
        }
    };

    let time = match (date, time_of_day) {
        (Some(date), Some(time)) => Some(Utc.from_utc_datetime(&date.and_time(time))),
        _ => None,
    };

    Ok(RmcData {
        time,
        valid,
        position,
        speed_over_ground,
        course_over_ground,
    })
}

pub fn decode_gga(sentence: &NmeaSentence) -> Result<GgaData, ParseError> {
    expect_id(sentence, SentenceId::GGA)?;

    Ok(GgaData {
        time: parse_time("time", sentence.field(0))?,
        position: parse_position(sentence, 1)?,
        fix_quality: opt_u32("quality", sentence.field(5))?.unwrap_or(0),
    })
}

pub fn decode_vtg(sentence: &NmeaSentence) -> Result<VtgData, ParseError> {
    expect_id(sentence, SentenceId::VTG)?;

    Ok(VtgData {
        course_true: opt_f64("course", sentence.field(0))?,
        speed_knots: opt_f64("speed", sentence.field(4))?,
    })
}

pub fn decode_hdt(sentence: &NmeaSentence) -> Result<HdtData, ParseError> {
    expect_id(sentence, SentenceId::HDT)?;

    Ok(HdtData {
        heading_true: opt_f64("heading", sentence.field(0))?,
    })
}

pub fn decode_zda(sentence: &NmeaSentence) -> Result<ZdaData, ParseError> {
    expect_id(sentence, SentenceId::ZDA)?;

    let time = parse_time("time", sentence.field(0))?
        .ok_or_else(|| ParseError::invalid_field("time", "missing"))?;
    let day = opt_u32("day", sentence.field(1))?
        .ok_or_else(|| ParseError::invalid_field("day", "missing"))?;
    let month = opt_u32("month", sentence.field(2))?
        .ok_or_else(|| ParseError::invalid_field("month", "missing"))?;
    let year = opt_u32("year", sentence.field(3))?
        .ok_or_else(|| ParseError::invalid_field("year", "missing"))? as i32;

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ParseError::invalid_field("date", "out of range"))?;

    Ok(ZdaData {
        time: Utc.from_utc_datetime(&date.and_time(time)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn parse(line: &str) -> NmeaSentence {
        NmeaSentence::parse(line, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()).unwrap()
    }

    #[test]
    fn test_decode_rmc() {
        let rmc = decode_rmc(&parse(
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
        ))
        .unwrap();
        assert!(rmc.valid);
        let pos = rmc.position.unwrap();
        assert!((pos.latitude - (48.0 + 7.038 / 60.0)).abs() < 1e-9);
        assert!((pos.longitude - (11.0 + 31.0 / 60.0)).abs() < 1e-9);
        assert_eq!(rmc.speed_over_ground, Some(22.4));
        assert_eq!(rmc.course_over_ground, Some(84.4));
        let time = rmc.time.unwrap();
        assert_eq!((time.year(), time.month(), time.day()), (1994, 3, 23));
        assert_eq!((time.hour(), time.minute(), time.second()), (12, 35, 19));
    }

    #[test]
    fn test_decode_rmc_no_fix() {
        let rmc = decode_rmc(&parse("$GPRMC,123519,V,,,,,,,230394,,")).unwrap();
        assert!(!rmc.valid);
        assert_eq!(rmc.position, None);
        assert_eq!(rmc.speed_over_ground, None);
    }

    #[test]
    fn test_decode_gga() {
        let gga = decode_gga(&parse(
            "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
        ))
        .unwrap();
        assert_eq!(gga.fix_quality, 1);
        assert!(gga.position.is_some());
    }

    #[test]
    fn test_decode_vtg() {
        let vtg = decode_vtg(&parse("$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K")).unwrap();
        assert_eq!(vtg.course_true, Some(54.7));
        assert_eq!(vtg.speed_knots, Some(5.5));
    }

    #[test]
    fn test_decode_hdt() {
        let hdt = decode_hdt(&parse("$GPHDT,274.07,T*03")).unwrap();
        assert_eq!(hdt.heading_true, Some(274.07));
    }

    #[test]
    fn test_decode_zda() {
        let zda = decode_zda(&parse("$GPZDA,160012.71,11,03,2004,-1,00*7D")).unwrap();
        assert_eq!(
            (zda.time.year(), zda.time.month(), zda.time.day()),
            (2004, 3, 11)
        );
        assert_eq!(zda.time.hour(), 16);
    }

    #[test]
    fn test_decode_zda_missing_date_fails() {
        assert!(decode_zda(&parse("$GPZDA,160012.71,,,,,")).is_err());
    }

    #[test]
    fn test_southern_western_hemispheres() {
        let rmc = decode_rmc(&parse("$GPRMC,123519,A,3351.000,S,15112.000,W,0.0,0.0,230394,,"))
            .unwrap();
        let pos = rmc.position.unwrap();
        assert!(pos.latitude < 0.0);
        assert!(pos.longitude < 0.0);
    }
}
