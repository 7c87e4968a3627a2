//! Own-ship sentence cache
//!
//! Retains the freshest position, course, speed and heading decoded from
//! the sentence stream so the manager and the surveillance loop can ask
//! "where are we right now" without replaying history. This is the stock
//! [`PositionProvider`] implementation.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use aisvigil_core::codec::{OwnPositionFix, PositionProvider};
use aisvigil_core::geo::GeoPosition;
use aisvigil_core::nmea::decode::{decode_gga, decode_hdt, decode_rmc, decode_vtg};
use aisvigil_core::nmea::{NmeaSentence, SentenceId};

#[derive(Debug, Default)]
struct CacheInner {
    /// Freshest valid position and the timestamp of the sentence carrying it
    position: Option<(GeoPosition, DateTime<Utc>)>,
    course_over_ground: Option<f64>,
    speed_over_ground: Option<f64>,
    heading: Option<f64>,
}

/// Thread-safe cache of the most recent own-ship navigation data
#[derive(Debug, Default)]
pub struct SentenceCache {
    inner: RwLock<CacheInner>,
}

impl SentenceCache {
    pub fn new() -> Self {
        SentenceCache::default()
    }

    /// Feed one sentence. Non-navigation sentences and decode failures are
    /// ignored; a stream full of AIVDM traffic costs one id comparison per
    /// sentence.
    pub fn handle_sentence(&self, sentence: &NmeaSentence) {
        match sentence.id {
            SentenceId::RMC => match decode_rmc(sentence) {
                Ok(rmc) => {
                    let mut inner = self.inner.write().unwrap();
                    if rmc.valid {
                        if let Some(position) = rmc.position {
                            inner.position = Some((position, sentence.timestamp));
                        }
                    }
                    if let Some(sog) = rmc.speed_over_ground {
                        inner.speed_over_ground = Some(sog);
                    }
                    if let Some(cog) = rmc.course_over_ground {
                        inner.course_over_ground = Some(cog);
                    }
                }
                Err(e) => log::trace!("Ignoring bad RMC: {}", e),
            },
            SentenceId::GGA => match decode_gga(sentence) {
                Ok(gga) => {
                    if gga.fix_quality > 0 {
                        if let Some(position) = gga.position {
                            let mut inner = self.inner.write().unwrap();
                            inner.position = Some((position, sentence.timestamp));
                        }
                    }
                }
                Err(e) => log::trace!("Ignoring bad GGA: {}", e),
            },
            SentenceId::VTG => match decode_vtg(sentence) {
                Ok(vtg) => {
                    let mut inner = self.inner.write().unwrap();
                    if let Some(cog) = vtg.course_true {
                        inner.course_over_ground = Some(cog);
                    }
                    if let Some(sog) = vtg.speed_knots {
                        inner.speed_over_ground = Some(sog);
                    }
                }
                Err(e) => log::trace!("Ignoring bad VTG: {}", e),
            },
            SentenceId::HDT => match decode_hdt(sentence) {
                Ok(hdt) => {
                    if let Some(heading) = hdt.heading_true {
                        self.inner.write().unwrap().heading = Some(heading);
                    }
                }
                Err(e) => log::trace!("Ignoring bad HDT: {}", e),
            },
            _ => {}
        }
    }
}

impl PositionProvider for SentenceCache {
    fn try_get_current_position(&self, _now: DateTime<Utc>) -> Option<OwnPositionFix> {
        let inner = self.inner.read().unwrap();
        let (position, message_time) = inner.position?;
        Some(OwnPositionFix {
            position,
            course_over_ground: inner.course_over_ground,
            speed_over_ground: inner.speed_over_ground,
            heading: inner.heading,
            message_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, s).unwrap()
    }

    fn sentence(line: &str, at: DateTime<Utc>) -> NmeaSentence {
        NmeaSentence::parse(line, at).unwrap()
    }

    #[test]
    fn test_empty_cache_has_no_fix() {
        let cache = SentenceCache::new();
        assert!(cache.try_get_current_position(ts(0)).is_none());
    }

    #[test]
    fn test_rmc_populates_fix() {
        let cache = SentenceCache::new();
        cache.handle_sentence(&sentence(
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
            ts(0),
        ));

        let fix = cache.try_get_current_position(ts(1)).unwrap();
        assert!((fix.position.latitude - 48.1173).abs() < 0.001);
        assert_eq!(fix.speed_over_ground, Some(22.4));
        assert_eq!(fix.course_over_ground, Some(84.4));
        assert_eq!(fix.message_time, ts(0));
    }

    #[test]
    fn test_invalid_rmc_keeps_previous_position() {
        let cache = SentenceCache::new();
        cache.handle_sentence(&sentence(
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
            ts(0),
        ));
        // Receiver lost its fix; status V carries no position
        cache.handle_sentence(&sentence("$GPRMC,123529,V,,,,,,,230394,,", ts(10)));

        let fix = cache.try_get_current_position(ts(11)).unwrap();
        assert_eq!(fix.message_time, ts(0));
    }

    #[test]
    fn test_heading_merges_into_fix() {
        let cache = SentenceCache::new();
        cache.handle_sentence(&sentence(
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
            ts(0),
        ));
        cache.handle_sentence(&sentence("$GPHDT,274.07,T*03", ts(1)));

        let fix = cache.try_get_current_position(ts(2)).unwrap();
        assert_eq!(fix.heading, Some(274.07));
    }

    #[test]
    fn test_unrelated_sentences_ignored() {
        let cache = SentenceCache::new();
        cache.handle_sentence(&sentence(
            "!AIVDM,1,1,,A,13u?etPv2;0n:dDPwUM1U1Cb069D,0*24",
            ts(0),
        ));
        assert!(cache.try_get_current_position(ts(1)).is_none());
    }
}
