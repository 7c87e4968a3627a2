//! The AIS manager
//!
//! Consumes the NMEA stream, maintains the target database, raises warning
//! broadcasts for emergency transmitters, prunes stale targets and runs the
//! background CPA/TCPA surveillance loop. One instance per vessel; cheap to
//! clone, all clones share state.
//!
//! # Locking
//!
//! A single manager mutex serializes sentence dispatch, compound target
//! updates, the surveillance write-back and cleanup. It is never held
//! across codec encodes or user callbacks: broadcast encoding can be slow
//! and callbacks may re-enter the manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use aisvigil_core::clock::Clock;
use aisvigil_core::codec::{AisCodec, GeneratedSentencesId, PositionProvider};
use aisvigil_core::error::ParseError;
use aisvigil_core::geo::GeoPosition;
use aisvigil_core::messages::{
    AisMessage, Dimensions, NavigationStatus, PositionReport, PositionReportType,
    SafetyRelatedBroadcastMessage, TransceiverClass,
};
use aisvigil_core::mmsi::Mmsi;
use aisvigil_core::nmea::NmeaSentence;
use aisvigil_core::store::TargetStore;
use aisvigil_core::target::{
    rate_of_turn_from_raw, rate_of_turn_to_raw, AisTarget, Ship, TrackEstimationParameters,
};
use aisvigil_core::warnings::WarningLedger;

use crate::cache::SentenceCache;

/// Stale-target pruning runs at most this often
pub const CLEANUP_LATENCY: Duration = Duration::from_secs(30);

/// The surveillance loop always sleeps at least this long between passes,
/// even when a pass overran its interval
pub const MIN_SAFETY_CHECK_SLEEP: Duration = Duration::from_millis(20);

/// Errors surfaced by the manager's public API
#[derive(Error, Debug)]
pub enum AisError {
    /// The codec produced a message type the manager does not handle and
    /// the configuration demands strictness
    #[error("Unsupported AIS message type {message_type} from {mmsi}")]
    UnsupportedMessage { mmsi: Mmsi, message_type: u8 },

    /// Outbound Class A encoding must yield exactly one sentence
    #[error("Position report encoding produced {0} sentences, expected exactly one")]
    EncodeFailure(usize),

    /// Only transceiver class A position reports can be generated
    #[error("Cannot encode position report for transceiver class other than A")]
    UnsupportedEncoding,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Manager configuration. Everything here is fixed at construction except
/// the track estimation parameters, which `enable_ais_alarms` may replace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AisManagerConfig {
    /// MMSI of the local vessel
    pub own_mmsi: Mmsi,
    pub own_ship_name: String,
    /// Own-ship geometry relative to the GNSS antenna
    pub dimensions: Dimensions,
    /// Gate on exceptional-target and proximity warning broadcasts
    pub auto_send_warnings: bool,
    /// Targets older than this are pruned; zero keeps them forever
    pub delete_target_after_timeout: Duration,
    pub track_estimation: TrackEstimationParameters,
    /// Fail `send_sentence` on unknown AIS message types instead of
    /// skipping them
    pub throw_on_unknown_message: bool,
    /// NMEA identifier for internally generated sentences
    pub generated_sentences_id: GeneratedSentencesId,
}

impl AisManagerConfig {
    pub fn new(own_mmsi: Mmsi, own_ship_name: impl Into<String>) -> Self {
        AisManagerConfig {
            own_mmsi,
            own_ship_name: own_ship_name.into(),
            dimensions: Dimensions::default(),
            auto_send_warnings: true,
            delete_target_after_timeout: Duration::ZERO,
            track_estimation: TrackEstimationParameters::default(),
            throw_on_unknown_message: false,
            generated_sentences_id: GeneratedSentencesId::default(),
        }
    }
}

/// An incoming or internally generated safety-related text message.
/// `destination_mmsi` is zero for broadcasts; `received` is false for
/// messages this manager generated itself.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub received: bool,
    pub source_mmsi: Mmsi,
    pub destination_mmsi: Mmsi,
    pub text: String,
}

type MessageCallback = Box<dyn Fn(&MessageEvent) + Send + Sync>;
type SentenceCallback = Box<dyn Fn(&NmeaSentence) + Send + Sync>;

/// Why the own-ship fix is unusable, when it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OwnShipStatus {
    Current,
    Stale,
    Missing,
}

struct AlarmWorker {
    enabled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Default for AlarmWorker {
    fn default() -> Self {
        AlarmWorker {
            enabled: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

struct ManagerInner {
    config: RwLock<AisManagerConfig>,
    clock: Arc<dyn Clock>,
    codec: Arc<dyn AisCodec>,
    cache: Arc<SentenceCache>,
    position_provider: Arc<dyn PositionProvider>,
    targets: TargetStore,
    warnings: WarningLedger,
    /// The manager mutex; see the module documentation
    lock: Mutex<()>,
    last_cleanup: Mutex<Option<DateTime<Utc>>>,
    message_callbacks: RwLock<Vec<MessageCallback>>,
    sentence_callbacks: RwLock<Vec<SentenceCallback>>,
    alarm: Mutex<AlarmWorker>,
}

/// Shared handle to the AIS manager; clones are views of the same state
#[derive(Clone)]
pub struct AisManager {
    inner: Arc<ManagerInner>,
}

impl AisManager {
    /// Create a manager whose own-ship position comes from the built-in
    /// sentence cache.
    pub fn new(config: AisManagerConfig, codec: Arc<dyn AisCodec>, clock: Arc<dyn Clock>) -> Self {
        let cache = Arc::new(SentenceCache::new());
        Self::with_position_provider(config, codec, clock, cache.clone(), cache)
    }

    /// Create a manager with an explicit position source. The sentence
    /// cache is still fed (so it can serve other consumers) but the fix
    /// used for surveillance comes from `position_provider`.
    pub fn with_position_provider(
        config: AisManagerConfig,
        codec: Arc<dyn AisCodec>,
        clock: Arc<dyn Clock>,
        cache: Arc<SentenceCache>,
        position_provider: Arc<dyn PositionProvider>,
    ) -> Self {
        AisManager {
            inner: Arc::new(ManagerInner {
                config: RwLock::new(config),
                clock,
                codec,
                cache,
                position_provider,
                targets: TargetStore::new(),
                warnings: WarningLedger::new(),
                lock: Mutex::new(()),
                last_cleanup: Mutex::new(None),
                message_callbacks: RwLock::new(Vec::new()),
                sentence_callbacks: RwLock::new(Vec::new()),
                alarm: Mutex::new(AlarmWorker::default()),
            }),
        }
    }

    /// Register a callback for safety-related text messages, incoming and
    /// internally generated. Runs on the emitting thread; keep it short
    /// and do not call back into the manager's ingestion path.
    pub fn on_message(&self, callback: impl Fn(&MessageEvent) + Send + Sync + 'static) {
        self.inner
            .message_callbacks
            .write()
            .unwrap()
            .push(Box::new(callback));
    }

    /// Register a callback for internally generated outbound sentences
    pub fn on_sentence(&self, callback: impl Fn(&NmeaSentence) + Send + Sync + 'static) {
        self.inner
            .sentence_callbacks
            .write()
            .unwrap()
            .push(Box::new(callback));
    }

    pub fn config(&self) -> AisManagerConfig {
        self.inner.config.read().unwrap().clone()
    }

    /// The shared target database
    pub fn targets(&self) -> TargetStore {
        self.inner.targets.clone()
    }

    /// The sentence cache being fed by `send_sentence`
    pub fn cache(&self) -> Arc<SentenceCache> {
        self.inner.cache.clone()
    }

    pub fn get_target(&self, mmsi: Mmsi) -> Option<AisTarget> {
        self.inner.targets.try_get(mmsi)
    }

    pub fn get_targets(&self) -> Vec<AisTarget> {
        self.inner.targets.snapshot()
    }

    /// Ingest one sentence from `source`.
    ///
    /// Runs entirely on the caller's thread: caches own-ship data, prunes
    /// stale targets, decodes the AIS payload through the codec seam and
    /// applies it to the target database.
    pub fn send_sentence(&self, source: &str, sentence: &NmeaSentence) -> Result<(), AisError> {
        self.inner.cache.handle_sentence(sentence);
        self.do_cleanup(sentence.timestamp);

        let message = match self.inner.codec.parse(sentence) {
            Some(message) => message,
            None => return Ok(()),
        };
        log::trace!("{}: decoded {:?}", source, message.source_mmsi());

        match &message {
            AisMessage::AddressedSafetyRelatedMessage(m) => {
                self.emit_message_event(&MessageEvent {
                    received: true,
                    source_mmsi: m.mmsi,
                    destination_mmsi: m.destination_mmsi,
                    text: m.text.clone(),
                });
                Ok(())
            }
            AisMessage::SafetyRelatedBroadcastMessage(m) => {
                self.emit_message_event(&MessageEvent {
                    received: true,
                    source_mmsi: m.mmsi,
                    destination_mmsi: Mmsi(0),
                    text: m.text.clone(),
                });
                Ok(())
            }
            AisMessage::Interrogation { .. } | AisMessage::DataLinkManagement { .. } => Ok(()),
            AisMessage::Unknown(unknown) => {
                if self.inner.config.read().unwrap().throw_on_unknown_message {
                    Err(AisError::UnsupportedMessage {
                        mmsi: unknown.mmsi,
                        message_type: unknown.message_type,
                    })
                } else {
                    log::debug!(
                        "Ignoring unsupported AIS message type {} from {}",
                        unknown.message_type,
                        unknown.mmsi
                    );
                    Ok(())
                }
            }
            _ => {
                // Target-updating messages run under the manager mutex; any
                // resulting warning is broadcast after the mutex is dropped.
                let pending_warning = {
                    let _guard = self.inner.lock.lock().unwrap();
                    self.apply_target_update(&message, sentence.timestamp)
                };
                if let Some((message_id, text)) = pending_warning {
                    let own_mmsi = self.inner.config.read().unwrap().own_mmsi;
                    self.send_warning_message(&message_id, own_mmsi, &text, sentence.timestamp);
                }
                Ok(())
            }
        }
    }

    /// Apply one target-updating message. Caller holds the manager mutex.
    /// Returns a pending exceptional-target warning, if any.
    fn apply_target_update(
        &self,
        message: &AisMessage,
        timestamp: DateTime<Utc>,
    ) -> Option<(String, String)> {
        let targets = &self.inner.targets;
        match message {
            AisMessage::PositionReportClassA(m) => {
                let ship = targets.update_ship(m.mmsi, timestamp, |ship| {
                    apply_class_a_position_report(ship, m);
                });
                self.check_exceptional_target(&ship, timestamp)
            }
            AisMessage::StaticDataReportPartA(m) => {
                targets.update_ship(m.mmsi, timestamp, |ship| {
                    if let Some(name) = non_empty(&m.ship_name) {
                        ship.name = Some(name);
                    }
                });
                None
            }
            AisMessage::StaticDataReportPartB(m) => {
                targets.update_ship(m.mmsi, timestamp, |ship| {
                    if let Some(call_sign) = non_empty(&m.call_sign) {
                        ship.call_sign = Some(call_sign);
                    }
                    ship.ship_type = m.ship_type;
                    ship.dimensions = m.dimensions;
                });
                None
            }
            AisMessage::StaticAndVoyageRelatedData(m) => {
                let eta = eta_from_parts(timestamp, m.eta_month, m.eta_day, m.eta_hour, m.eta_minute);
                targets.update_ship(m.mmsi, timestamp, |ship| {
                    if let Some(name) = non_empty(&m.ship_name) {
                        ship.name = Some(name);
                    }
                    if let Some(call_sign) = non_empty(&m.call_sign) {
                        ship.call_sign = Some(call_sign);
                    }
                    if let Some(destination) = non_empty(&m.destination) {
                        ship.destination = Some(destination);
                    }
                    ship.draught = m.draught;
                    ship.imo_number = m.imo_number;
                    ship.ship_type = m.ship_type;
                    ship.dimensions = m.dimensions;
                    ship.estimated_time_of_arrival = eta;
                });
                None
            }
            AisMessage::StandardClassBCsPositionReport(m) => {
                targets.update_ship(m.mmsi, timestamp, |ship| {
                    if m.position.is_valid() {
                        ship.position = Some(m.position);
                    }
                    ship.course_over_ground = m.course_over_ground;
                    ship.speed_over_ground = m.speed_over_ground;
                    ship.true_heading = m.true_heading;
                    ship.rate_of_turn = None;
                    ship.transceiver_class = TransceiverClass::B;
                });
                None
            }
            AisMessage::ExtendedClassBCsPositionReport(m) => {
                targets.update_ship(m.mmsi, timestamp, |ship| {
                    if m.position.is_valid() {
                        ship.position = Some(m.position);
                    }
                    ship.course_over_ground = m.course_over_ground;
                    ship.speed_over_ground = m.speed_over_ground;
                    ship.true_heading = m.true_heading;
                    ship.rate_of_turn = None;
                    ship.transceiver_class = TransceiverClass::B;
                    ship.ship_type = m.ship_type;
                    ship.dimensions = m.dimensions;
                    if let Some(name) = non_empty(&m.ship_name) {
                        ship.name = Some(name);
                    }
                });
                None
            }
            AisMessage::BaseStationReport(m) => {
                targets.update_base_station(m.mmsi, timestamp, |station| {
                    if m.position.is_valid() {
                        station.position = Some(m.position);
                    }
                });
                None
            }
            AisMessage::StandardSarAircraftPositionReport(m) => {
                targets.update_sar_aircraft(m.mmsi, timestamp, |aircraft| {
                    if m.position.is_valid() {
                        aircraft.position = Some(m.position);
                    }
                    aircraft.course_over_ground = m.course_over_ground;
                    aircraft.speed_over_ground = m.speed_over_ground;
                    aircraft.rate_of_turn = 0.0;
                });
                None
            }
            AisMessage::AidToNavigationReport(m) => {
                targets.update_aid_to_navigation(m.mmsi, timestamp, |aid| {
                    if m.position.is_valid() {
                        aid.position = Some(m.position);
                    }
                    let full_name = format!("{}{}", m.name, m.name_extension);
                    if let Some(name) = non_empty(&full_name) {
                        aid.name = Some(name);
                    }
                    aid.dimensions = m.dimensions;
                    aid.off_position = m.off_position;
                    aid.virtual_aid = m.virtual_aid;
                    aid.navigational_aid_type = m.navigational_aid_type;
                });
                None
            }
            // Remaining variants are handled before the mutex is taken
            _ => None,
        }
    }

    /// SART/MOB/EPIRB transmitters and targets broadcasting "AIS-SART
    /// active" raise an immediate warning, deduplicated per MMSI.
    fn check_exceptional_target(
        &self,
        ship: &Ship,
        now: DateTime<Utc>,
    ) -> Option<(String, String)> {
        if !self.inner.config.read().unwrap().auto_send_warnings {
            return None;
        }
        let mmsi_type = ship.mmsi.mmsi_type();
        let active_sart = ship.navigation_status == NavigationStatus::AisSartIsActive;
        if !active_sart && !mmsi_type.is_emergency_beacon() {
            return None;
        }

        let label = if mmsi_type.is_emergency_beacon() {
            mmsi_type.beacon_label()
        } else {
            "AIS SART"
        };
        let mut text = match ship.position {
            Some(position) => format!(
                "{} Target activated: MMSI {} in Position {}!",
                label, ship.mmsi, position
            ),
            None => format!("{} Target activated: MMSI {}!", label, ship.mmsi),
        };
        if let (Some(position), Some(fix)) = (
            ship.position,
            self.inner.position_provider.try_get_current_position(now),
        ) {
            let distance = fix.position.distance_to(&position);
            text.push_str(&format!(" Distance {:.0} m", distance));
        }
        Some((ship.mmsi.to_string(), text))
    }

    /// Prune targets older than the configured timeout. At most one pass
    /// per [`CLEANUP_LATENCY`], so calling this for every sentence is
    /// cheap.
    pub fn do_cleanup(&self, now: DateTime<Utc>) {
        let timeout = self.inner.config.read().unwrap().delete_target_after_timeout;
        if timeout.is_zero() {
            return;
        }
        {
            let mut last = self.inner.last_cleanup.lock().unwrap();
            if let Some(previous) = *last {
                if now.signed_duration_since(previous) < chrono_duration(CLEANUP_LATENCY) {
                    return;
                }
            }
            *last = Some(now);
        }

        let _guard = self.inner.lock.lock().unwrap();
        let max_age = chrono_duration(timeout);
        let before = self.inner.targets.len();
        self.inner
            .targets
            .retain(|target| now.signed_duration_since(target.last_seen()) <= max_age);
        let removed = before - self.inner.targets.len();
        if removed > 0 {
            log::debug!("Cleanup removed {} stale targets", removed);
        }
    }

    /// Issue a warning broadcast unless the same `message_id` was issued
    /// within the repeat window. Returns whether it was sent.
    pub fn send_warning_message(
        &self,
        message_id: &str,
        source_mmsi: Mmsi,
        text: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.inner.warnings.should_send(message_id, text, now) {
            return false;
        }
        log::info!("AIS warning '{}': {}", message_id, text);
        if let Err(e) = self.send_broadcast_message(source_mmsi, text) {
            log::error!("Failed to broadcast warning '{}': {}", message_id, e);
        }
        true
    }

    /// Build a safety-related broadcast, fire the message callback and
    /// dispatch the encoded sentences on the outbound event.
    ///
    /// The text must stay within the AIS 6-bit character set; the codec
    /// rejects anything else.
    pub fn send_broadcast_message(&self, source_mmsi: Mmsi, text: &str) -> Result<(), AisError> {
        let message = AisMessage::SafetyRelatedBroadcastMessage(SafetyRelatedBroadcastMessage {
            mmsi: source_mmsi,
            text: text.to_string(),
        });
        self.emit_message_event(&MessageEvent {
            received: false,
            source_mmsi,
            destination_mmsi: Mmsi(0),
            text: text.to_string(),
        });

        let id = self.inner.config.read().unwrap().generated_sentences_id;
        let sentences = self.inner.codec.encode(&message, id)?;
        for sentence in &sentences {
            self.emit_sentence(sentence);
        }
        Ok(())
    }

    /// Encode the own ship (or any class A ship) as a single outbound
    /// position report sentence.
    pub fn send_ship_position_report(&self, ship: &Ship) -> Result<(), AisError> {
        if ship.transceiver_class != TransceiverClass::A {
            return Err(AisError::UnsupportedEncoding);
        }
        let report = ship_to_position_report(ship);
        let id = self.inner.config.read().unwrap().generated_sentences_id;
        let sentences = self
            .inner
            .codec
            .encode(&AisMessage::PositionReportClassA(report), id)?;
        if sentences.len() != 1 {
            return Err(AisError::EncodeFailure(sentences.len()));
        }
        self.emit_sentence(&sentences[0]);
        Ok(())
    }

    /// The own ship as currently known: identity from configuration,
    /// kinematics from the position provider.
    ///
    /// The boolean is false when no position is known or the fix is older
    /// than `maximum_position_age`; the ship is still populated with
    /// whatever the provider returned.
    pub fn get_own_ship_data(&self, now: DateTime<Utc>) -> (Ship, bool) {
        let (ship, status) = self.own_ship_with_status(now);
        (ship, status == OwnShipStatus::Current)
    }

    fn own_ship_with_status(&self, now: DateTime<Utc>) -> (Ship, OwnShipStatus) {
        let config = self.inner.config.read().unwrap();
        let mut ship = Ship::new(config.own_mmsi, now);
        ship.name = non_empty(&config.own_ship_name);
        ship.dimensions = config.dimensions;
        ship.transceiver_class = TransceiverClass::A;
        let max_age = chrono_duration(config.track_estimation.maximum_position_age);
        drop(config);

        match self.inner.position_provider.try_get_current_position(now) {
            Some(fix) => {
                ship.position = Some(fix.position);
                ship.course_over_ground = fix.course_over_ground;
                ship.speed_over_ground = fix.speed_over_ground;
                ship.true_heading = fix.heading.map(|h| h.round() as u16);
                ship.last_seen = fix.message_time;
                if fix.message_time + max_age < now {
                    (ship, OwnShipStatus::Stale)
                } else {
                    (ship, OwnShipStatus::Current)
                }
            }
            None => (ship, OwnShipStatus::Missing),
        }
    }

    /// Start or stop the background surveillance worker.
    ///
    /// Enabling while the worker is alive is a no-op (the new parameters
    /// are NOT applied in that case). Disabling signals the worker and
    /// joins it; the worker observes the flag after its current sleep, so
    /// this can block for up to `ais_safety_check_interval`.
    pub fn enable_ais_alarms(&self, enable: bool, parameters: Option<TrackEstimationParameters>) {
        let mut worker = self.inner.alarm.lock().unwrap();
        if enable {
            if worker
                .handle
                .as_ref()
                .map(|handle| !handle.is_finished())
                .unwrap_or(false)
            {
                return;
            }
            if let Some(parameters) = parameters {
                self.inner.config.write().unwrap().track_estimation = parameters;
            }
            let enabled = Arc::new(AtomicBool::new(true));
            worker.enabled = enabled.clone();
            let manager = self.clone();
            match std::thread::Builder::new()
                .name("ais-alarms".to_string())
                .spawn(move || manager.alarm_loop(enabled))
            {
                Ok(handle) => worker.handle = Some(handle),
                Err(e) => {
                    log::error!("Cannot start AIS alarm thread: {}", e);
                    worker.enabled.store(false, Ordering::SeqCst);
                }
            }
        } else {
            worker.enabled.store(false, Ordering::SeqCst);
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    log::error!("AIS alarm thread panicked");
                }
            }
        }
    }

    pub fn ais_alarms_enabled(&self) -> bool {
        let worker = self.inner.alarm.lock().unwrap();
        worker.enabled.load(Ordering::SeqCst)
            && worker
                .handle
                .as_ref()
                .map(|handle| !handle.is_finished())
                .unwrap_or(false)
    }

    /// Release the surveillance worker and forget issued warnings
    pub fn stop(&self) {
        self.enable_ais_alarms(false, None);
        self.inner.warnings.clear();
    }

    pub fn clear_warnings(&self) {
        self.inner.warnings.clear();
    }

    fn alarm_loop(&self, enabled: Arc<AtomicBool>) {
        log::debug!("AIS alarm surveillance started");
        // Do-while: one pass always runs, so a disable racing the startup
        // still produces a complete surveillance cycle.
        loop {
            self.run_surveillance_pass();
            if !enabled.load(Ordering::SeqCst) {
                break;
            }
        }
        log::debug!("AIS alarm surveillance stopped");
    }

    /// One surveillance cycle: own fix, geometry over a target snapshot,
    /// proximity warnings, write-back, compensated sleep.
    fn run_surveillance_pass(&self) {
        let config = self.inner.config.read().unwrap();
        let params = config.track_estimation.clone();
        let own_mmsi = config.own_mmsi;
        let auto_send = config.auto_send_warnings;
        drop(config);

        let now = self.inner.clock.now();
        let (own_ship, status) = self.own_ship_with_status(now);
        if status != OwnShipStatus::Current {
            if params.warn_if_gnss_missing {
                let (id, text) = match status {
                    OwnShipStatus::Missing => ("NOGNSS", "No GNSS position available"),
                    _ => ("GNSSOLD", "GNSS position is outdated"),
                };
                self.send_warning_message(id, own_mmsi, text, now);
            }
            self.inner.clock.sleep(params.ais_safety_check_interval);
            return;
        }

        let stopwatch = Instant::now();

        // Geometry runs over a detached snapshot; the store stays free for
        // the ingestion path.
        let snapshot = self.inner.targets.snapshot();
        let differences = own_ship.relative_positions_to(&snapshot, now, &params);

        if auto_send {
            for difference in &differences {
                let cpa = match difference.closest_point_of_approach {
                    Some(cpa) => cpa,
                    None => continue,
                };
                let tcpa = match difference.time_to_closest_point_of_approach(now) {
                    Some(tcpa) => tcpa,
                    None => continue,
                };
                if cpa < params.warning_distance
                    && tcpa > -ChronoDuration::minutes(1)
                    && tcpa < chrono_duration(params.warning_time)
                {
                    let name = snapshot
                        .iter()
                        .find(|t| t.mmsi() == difference.to)
                        .map(|t| t.display_name())
                        .unwrap_or_else(|| difference.to.to_string());
                    let seconds = tcpa.num_seconds().max(0);
                    let text = format!(
                        "{} is dangerously close. CPA {:.0} m; TCPA {:02}:{:02}",
                        name,
                        cpa,
                        seconds / 60,
                        seconds % 60
                    );
                    self.send_warning_message(
                        &format!("DANGEROUS VESSEL-{}", difference.to),
                        own_mmsi,
                        &text,
                        now,
                    );
                }
            }
        }

        {
            let _guard = self.inner.lock.lock().unwrap();
            for difference in differences {
                self.inner
                    .targets
                    .set_relative_position(difference.to, difference);
            }
        }

        let remaining = params
            .ais_safety_check_interval
            .saturating_sub(stopwatch.elapsed())
            .max(MIN_SAFETY_CHECK_SLEEP);
        self.inner.clock.sleep(remaining);
    }

    fn emit_message_event(&self, event: &MessageEvent) {
        for callback in self.inner.message_callbacks.read().unwrap().iter() {
            callback(event);
        }
    }

    fn emit_sentence(&self, sentence: &NmeaSentence) {
        log::trace!("Outbound: {}", sentence);
        for callback in self.inner.sentence_callbacks.read().unwrap().iter() {
            callback(sentence);
        }
    }
}

/// Apply a Class A position report to a ship.
///
/// The raw rate of turn is converted to degrees per minute; out-of-range
/// positions leave the stored position unchanged; an absent heading clears
/// the stored one.
fn apply_class_a_position_report(ship: &mut Ship, report: &PositionReport) {
    if report.position.is_valid() {
        ship.position = Some(GeoPosition::new(
            report.position.latitude,
            report.position.longitude,
            0.0,
        ));
    }
    ship.rate_of_turn = report.rate_of_turn.map(rate_of_turn_from_raw);
    ship.true_heading = report.true_heading;
    ship.course_over_ground = report.course_over_ground;
    ship.speed_over_ground = report.speed_over_ground;
    ship.navigation_status = report.navigation_status;
    ship.transceiver_class = TransceiverClass::A;
}

/// Inverse of [`apply_class_a_position_report`] for outbound encoding
fn ship_to_position_report(ship: &Ship) -> PositionReport {
    PositionReport {
        report_type: PositionReportType::Scheduled,
        mmsi: ship.mmsi,
        navigation_status: ship.navigation_status,
        rate_of_turn: ship.rate_of_turn.map(rate_of_turn_to_raw),
        speed_over_ground: ship.speed_over_ground,
        // Lat 91 / lon 181 is the wire convention for "not available"
        position: ship
            .position
            .unwrap_or_else(|| GeoPosition::new(91.0, 181.0, 0.0)),
        course_over_ground: ship.course_over_ground,
        true_heading: ship.true_heading,
    }
}

/// Compose an ETA from the month/day/hour/minute the voyage data carries.
///
/// The wire format has no year: it is the next occurrence of that
/// month/day relative to `now`. Unavailable parts (month or day zero,
/// hour 24, minute 60) and impossible dates yield `None`.
fn eta_from_parts(
    now: DateTime<Utc>,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Utc>> {
    if month == 0 || day == 0 {
        return None;
    }
    let mut year = now.year();
    if (month, day) < (now.month(), now.day()) {
        year += 1;
    }
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).single()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn chrono_duration(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::days(3650))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use aisvigil_core::clock::{ManualClock, SystemClock};
    use aisvigil_core::codec::OwnPositionFix;
    use aisvigil_core::messages::{
        BaseStationReport, ShipType, StaticAndVoyageRelatedData, UnknownMessage,
    };
    use aisvigil_core::nmea::SentenceId;

    /// Scripted codec: hands out queued messages for AIS sentences and
    /// records everything it is asked to encode.
    struct TestCodec {
        queue: Mutex<VecDeque<AisMessage>>,
        encoded: Mutex<Vec<AisMessage>>,
        parts_per_encode: usize,
    }

    impl TestCodec {
        fn new() -> Arc<Self> {
            Self::with_parts(1)
        }

        fn with_parts(parts_per_encode: usize) -> Arc<Self> {
            Arc::new(TestCodec {
                queue: Mutex::new(VecDeque::new()),
                encoded: Mutex::new(Vec::new()),
                parts_per_encode,
            })
        }

        fn push(&self, message: AisMessage) {
            self.queue.lock().unwrap().push_back(message);
        }

        fn encoded(&self) -> Vec<AisMessage> {
            self.encoded.lock().unwrap().clone()
        }
    }

    impl AisCodec for TestCodec {
        fn parse(&self, sentence: &NmeaSentence) -> Option<AisMessage> {
            if !sentence.is_ais_payload() {
                return None;
            }
            self.queue.lock().unwrap().pop_front()
        }

        fn encode(
            &self,
            message: &AisMessage,
            id: GeneratedSentencesId,
        ) -> Result<Vec<NmeaSentence>, ParseError> {
            self.encoded.lock().unwrap().push(message.clone());
            let sentence_id = match id {
                GeneratedSentencesId::Vdm => SentenceId::VDM,
                GeneratedSentencesId::Vdo => SentenceId::VDO,
            };
            Ok((0..self.parts_per_encode)
                .map(|_| {
                    NmeaSentence::assemble(
                        '!',
                        "AI",
                        sentence_id,
                        &["1", "1", "", "A", "TEST", "0"],
                        Utc::now(),
                    )
                })
                .collect())
        }
    }

    struct FixedProvider {
        fix: Mutex<Option<OwnPositionFix>>,
    }

    impl FixedProvider {
        fn new(fix: Option<OwnPositionFix>) -> Arc<Self> {
            Arc::new(FixedProvider {
                fix: Mutex::new(fix),
            })
        }
    }

    impl PositionProvider for FixedProvider {
        fn try_get_current_position(&self, _now: DateTime<Utc>) -> Option<OwnPositionFix> {
            *self.fix.lock().unwrap()
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    fn ais_sentence(timestamp: DateTime<Utc>) -> NmeaSentence {
        NmeaSentence::parse("!AIVDM,1,1,,A,13u?etPv2;0n:dDPwUM1U1Cb069D,0*24", timestamp).unwrap()
    }

    fn test_manager(codec: Arc<TestCodec>) -> AisManager {
        AisManager::new(
            AisManagerConfig::new(Mmsi(244000000), "OWN SHIP"),
            codec,
            Arc::new(ManualClock::new(at(12, 0, 0))),
        )
    }

    fn manager_with_provider(
        codec: Arc<TestCodec>,
        provider: Arc<FixedProvider>,
    ) -> AisManager {
        AisManager::with_position_provider(
            AisManagerConfig::new(Mmsi(244000000), "OWN SHIP"),
            codec,
            Arc::new(ManualClock::new(at(12, 0, 0))),
            Arc::new(SentenceCache::new()),
            provider,
        )
    }

    fn class_a(mmsi: u32, lat: f64, lon: f64, cog: f64, sog: f64, heading: u16) -> AisMessage {
        AisMessage::PositionReportClassA(PositionReport {
            report_type: PositionReportType::Scheduled,
            mmsi: Mmsi(mmsi),
            navigation_status: NavigationStatus::UnderWayUsingEngine,
            rate_of_turn: None,
            speed_over_ground: Some(sog),
            position: GeoPosition::new(lat, lon, 0.0),
            course_over_ground: Some(cog),
            true_heading: Some(heading),
        })
    }

    fn own_fix(lat: f64, lon: f64, cog: f64, sog: f64, message_time: DateTime<Utc>) -> OwnPositionFix {
        OwnPositionFix {
            position: GeoPosition::new(lat, lon, 0.0),
            course_over_ground: Some(cog),
            speed_over_ground: Some(sog),
            heading: Some(cog),
            message_time,
        }
    }

    #[test]
    fn test_class_a_position_report_creates_ship() {
        let codec = TestCodec::new();
        let manager = test_manager(codec.clone());

        codec.push(class_a(244670123, 47.5, 9.5, 270.0, 5.0, 271));
        manager
            .send_sentence("test", &ais_sentence(at(12, 0, 0)))
            .unwrap();

        let ship = match manager.get_target(Mmsi(244670123)) {
            Some(AisTarget::Ship(ship)) => ship,
            other => panic!("expected ship, got {:?}", other),
        };
        let position = ship.position.unwrap();
        assert_eq!(position.latitude, 47.5);
        assert_eq!(position.longitude, 9.5);
        assert_eq!(ship.course_over_ground, Some(270.0));
        assert_eq!(ship.speed_over_ground, Some(5.0));
        assert_eq!(ship.true_heading, Some(271));
        assert_eq!(ship.transceiver_class, TransceiverClass::A);
        assert_eq!(ship.last_seen, at(12, 0, 0));
    }

    #[test]
    fn test_out_of_range_position_not_stored() {
        let codec = TestCodec::new();
        let manager = test_manager(codec.clone());

        codec.push(class_a(244670123, 47.5, 9.5, 270.0, 5.0, 271));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 0))).unwrap();

        // Sentinel "position not available"
        codec.push(class_a(244670123, 91.0, 181.0, 90.0, 6.0, 90));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 10))).unwrap();

        let ship = match manager.get_target(Mmsi(244670123)) {
            Some(AisTarget::Ship(ship)) => ship,
            other => panic!("expected ship, got {:?}", other),
        };
        // Position unchanged, the rest of the update went through
        assert_eq!(ship.position.unwrap().latitude, 47.5);
        assert_eq!(ship.course_over_ground, Some(90.0));
        assert_eq!(ship.last_seen, at(12, 0, 10));
    }

    #[test]
    fn test_variant_collision_resolved_by_replacement() {
        let codec = TestCodec::new();
        let manager = test_manager(codec.clone());

        codec.push(class_a(2442000, 47.5, 9.5, 0.0, 0.0, 0));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 0))).unwrap();

        codec.push(AisMessage::BaseStationReport(BaseStationReport {
            mmsi: Mmsi(2442000),
            position: GeoPosition::new(47.6, 9.6, 0.0),
        }));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 10))).unwrap();

        match manager.get_target(Mmsi(2442000)) {
            Some(AisTarget::BaseStation(station)) => {
                assert_eq!(station.position.unwrap().latitude, 47.6);
            }
            other => panic!("expected base station, got {:?}", other),
        }
        assert_eq!(manager.get_targets().len(), 1);
    }

    #[test]
    fn test_warning_debounce() {
        let manager = test_manager(TestCodec::new());
        let t = at(12, 0, 0);

        assert!(manager.send_warning_message("X", Mmsi(0), "a", t));
        assert!(!manager.send_warning_message("X", Mmsi(0), "a", t + ChronoDuration::minutes(5)));
        assert!(manager.send_warning_message("X", Mmsi(0), "a", t + ChronoDuration::minutes(11)));
    }

    #[test]
    fn test_eta_rollover_into_next_year() {
        let codec = TestCodec::new();
        let manager = test_manager(codec.clone());

        codec.push(AisMessage::StaticAndVoyageRelatedData(StaticAndVoyageRelatedData {
            mmsi: Mmsi(244670123),
            imo_number: Some(9811000),
            call_sign: "PD2439".to_string(),
            ship_name: "CARGO ONE".to_string(),
            ship_type: ShipType::Cargo,
            dimensions: Dimensions::new(90.0, 30.0, 10.0, 12.0),
            eta_month: 2,
            eta_day: 10,
            eta_hour: 0,
            eta_minute: 0,
            draught: Some(7.5),
            destination: "ROTTERDAM".to_string(),
        }));
        let december = Utc.with_ymd_and_hms(2024, 12, 15, 10, 0, 0).unwrap();
        manager.send_sentence("test", &ais_sentence(december)).unwrap();

        let ship = match manager.get_target(Mmsi(244670123)) {
            Some(AisTarget::Ship(ship)) => ship,
            other => panic!("expected ship, got {:?}", other),
        };
        assert_eq!(
            ship.estimated_time_of_arrival,
            Some(Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap())
        );
        assert_eq!(ship.destination.as_deref(), Some("ROTTERDAM"));
        assert_eq!(ship.draught, Some(7.5));
    }

    #[test]
    fn test_eta_impossible_date_yields_none() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(eta_from_parts(now, 2, 31, 0, 0), None);
        assert_eq!(eta_from_parts(now, 0, 10, 0, 0), None);
        assert_eq!(eta_from_parts(now, 6, 15, 24, 60), None);
        // Same-day ETA stays in the current year
        assert_eq!(
            eta_from_parts(now, 1, 1, 6, 30),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 6, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_sart_detection_broadcasts_once() {
        let codec = TestCodec::new();
        let provider = FixedProvider::new(Some(own_fix(47.0, 9.0, 0.0, 10.0, at(12, 0, 0))));
        let manager = manager_with_provider(codec.clone(), provider);

        let events: Arc<Mutex<Vec<MessageEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        manager.on_message(move |event| captured.lock().unwrap().push(event.clone()));

        let outbound = Arc::new(Mutex::new(Vec::new()));
        let captured = outbound.clone();
        manager.on_sentence(move |sentence| captured.lock().unwrap().push(sentence.clone()));

        codec.push(class_a(972000001, 47.01, 9.0, 0.0, 0.0, 0));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 0))).unwrap();

        let snapshot = events.lock().unwrap().clone();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].received);
        assert_eq!(snapshot[0].destination_mmsi, Mmsi(0));
        assert!(
            snapshot[0].text.starts_with("AIS SART"),
            "text was '{}'",
            snapshot[0].text
        );
        assert!(snapshot[0].text.contains("972000001"));
        assert!(snapshot[0].text.contains("Distance"));
        assert_eq!(outbound.lock().unwrap().len(), 1);

        // The beacon keeps transmitting; the warning must not repeat
        codec.push(class_a(972000001, 47.01, 9.0, 0.0, 0.0, 0));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 10))).unwrap();
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_sart_navigation_status_triggers_warning() {
        let codec = TestCodec::new();
        let manager = test_manager(codec.clone());

        let events: Arc<Mutex<Vec<MessageEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        manager.on_message(move |event| captured.lock().unwrap().push(event.clone()));

        // Ordinary ship MMSI, but transmitting "AIS-SART active"
        codec.push(AisMessage::PositionReportClassA(PositionReport {
            navigation_status: NavigationStatus::AisSartIsActive,
            ..match class_a(244999999, 47.5, 9.5, 0.0, 0.0, 0) {
                AisMessage::PositionReportClassA(report) => report,
                _ => unreachable!(),
            }
        }));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 0))).unwrap();

        let snapshot = events.lock().unwrap().clone();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].text.starts_with("AIS SART"));
    }

    #[test]
    fn test_position_report_round_trip() {
        let codec = TestCodec::new();
        let manager = test_manager(codec.clone());

        let mut ship = Ship::new(Mmsi(244670123), at(12, 0, 0));
        ship.transceiver_class = TransceiverClass::A;
        ship.position = Some(GeoPosition::new(47.5, 9.5, 0.0));
        ship.course_over_ground = Some(270.0);
        ship.speed_over_ground = Some(5.0);
        ship.true_heading = Some(271);
        ship.navigation_status = NavigationStatus::UnderWayUsingEngine;
        ship.rate_of_turn = Some(rate_of_turn_from_raw(20));

        manager.send_ship_position_report(&ship).unwrap();

        let encoded = codec.encoded();
        assert_eq!(encoded.len(), 1);
        let report = match &encoded[0] {
            AisMessage::PositionReportClassA(report) => report.clone(),
            other => panic!("expected position report, got {:?}", other),
        };

        let mut round_tripped = Ship::new(Mmsi(244670123), at(12, 0, 0));
        apply_class_a_position_report(&mut round_tripped, &report);

        assert_eq!(round_tripped.position, ship.position);
        assert_eq!(round_tripped.course_over_ground, ship.course_over_ground);
        assert_eq!(round_tripped.speed_over_ground, ship.speed_over_ground);
        assert_eq!(round_tripped.true_heading, ship.true_heading);
        assert_eq!(round_tripped.navigation_status, ship.navigation_status);
        // Rate of turn survives to within the wire quantization
        assert_eq!(
            round_tripped.rate_of_turn.map(rate_of_turn_to_raw),
            ship.rate_of_turn.map(rate_of_turn_to_raw)
        );
    }

    #[test]
    fn test_position_report_class_b_rejected() {
        let manager = test_manager(TestCodec::new());
        let mut ship = Ship::new(Mmsi(244670123), at(12, 0, 0));
        ship.transceiver_class = TransceiverClass::B;

        assert!(matches!(
            manager.send_ship_position_report(&ship),
            Err(AisError::UnsupportedEncoding)
        ));
    }

    #[test]
    fn test_position_report_multi_sentence_rejected() {
        let manager = test_manager(TestCodec::with_parts(2));
        let mut ship = Ship::new(Mmsi(244670123), at(12, 0, 0));
        ship.transceiver_class = TransceiverClass::A;

        assert!(matches!(
            manager.send_ship_position_report(&ship),
            Err(AisError::EncodeFailure(2))
        ));
    }

    #[test]
    fn test_unknown_message_policy() {
        let codec = TestCodec::new();
        let manager = test_manager(codec.clone());

        codec.push(AisMessage::Unknown(UnknownMessage {
            mmsi: Mmsi(244670123),
            message_type: 27,
        }));
        // Lenient by default
        assert!(manager.send_sentence("test", &ais_sentence(at(12, 0, 0))).is_ok());

        let mut config = AisManagerConfig::new(Mmsi(244000000), "OWN SHIP");
        config.throw_on_unknown_message = true;
        let strict = AisManager::new(
            config,
            codec.clone(),
            Arc::new(ManualClock::new(at(12, 0, 0))),
        );
        codec.push(AisMessage::Unknown(UnknownMessage {
            mmsi: Mmsi(244670123),
            message_type: 27,
        }));
        assert!(matches!(
            strict.send_sentence("test", &ais_sentence(at(12, 0, 0))),
            Err(AisError::UnsupportedMessage { message_type: 27, .. })
        ));
    }

    #[test]
    fn test_safety_messages_fire_callbacks() {
        let codec = TestCodec::new();
        let manager = test_manager(codec.clone());

        let events: Arc<Mutex<Vec<MessageEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        manager.on_message(move |event| captured.lock().unwrap().push(event.clone()));

        codec.push(AisMessage::AddressedSafetyRelatedMessage(
            aisvigil_core::messages::AddressedSafetyRelatedMessage {
                mmsi: Mmsi(244670123),
                destination_mmsi: Mmsi(244000000),
                text: "PLEASE RESPOND".to_string(),
            },
        ));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 0))).unwrap();

        codec.push(AisMessage::SafetyRelatedBroadcastMessage(
            SafetyRelatedBroadcastMessage {
                mmsi: Mmsi(244670124),
                text: "SECURITE".to_string(),
            },
        ));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 1))).unwrap();

        let snapshot = events.lock().unwrap().clone();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].received);
        assert_eq!(snapshot[0].destination_mmsi, Mmsi(244000000));
        assert_eq!(snapshot[0].text, "PLEASE RESPOND");
        assert!(snapshot[1].received);
        assert_eq!(snapshot[1].destination_mmsi, Mmsi(0));
        // Neither message touches the target store
        assert!(manager.get_targets().is_empty());
    }

    #[test]
    fn test_cleanup_prunes_and_respects_latency() {
        let mut config = AisManagerConfig::new(Mmsi(244000000), "OWN SHIP");
        config.delete_target_after_timeout = Duration::from_secs(60);
        let manager = AisManager::new(
            config,
            TestCodec::new(),
            Arc::new(ManualClock::new(at(12, 0, 0))),
        );
        let store = manager.targets();

        store.update_ship(Mmsi(1), at(12, 0, 0), |_| {});
        manager.do_cleanup(at(12, 2, 0));
        assert!(store.try_get(Mmsi(1)).is_none());

        // Another stale target, but the previous pass was 10 s ago
        store.update_ship(Mmsi(2), at(12, 0, 0), |_| {});
        manager.do_cleanup(at(12, 2, 10));
        assert!(store.try_get(Mmsi(2)).is_some());

        // Past the latency window the pass runs again
        manager.do_cleanup(at(12, 2, 31));
        assert!(store.try_get(Mmsi(2)).is_none());
    }

    #[test]
    fn test_cleanup_disabled_by_default() {
        let manager = test_manager(TestCodec::new());
        let store = manager.targets();
        store.update_ship(Mmsi(1), at(0, 0, 0), |_| {});
        manager.do_cleanup(at(23, 0, 0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_gnss_missing_warning() {
        let codec = TestCodec::new();
        let provider = FixedProvider::new(None);
        let manager = manager_with_provider(codec, provider);

        let events: Arc<Mutex<Vec<MessageEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        manager.on_message(move |event| captured.lock().unwrap().push(event.clone()));

        manager.run_surveillance_pass();

        let snapshot = events.lock().unwrap().clone();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].received);
        assert!(snapshot[0].text.contains("No GNSS"));
    }

    #[test]
    fn test_gnss_stale_warning() {
        let codec = TestCodec::new();
        // Fix is two minutes old against a 30 s maximum age
        let provider = FixedProvider::new(Some(own_fix(47.0, 9.0, 0.0, 10.0, at(11, 58, 0))));
        let manager = manager_with_provider(codec, provider);

        let events: Arc<Mutex<Vec<MessageEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        manager.on_message(move |event| captured.lock().unwrap().push(event.clone()));

        manager.run_surveillance_pass();

        let snapshot = events.lock().unwrap().clone();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].text.contains("outdated"));
    }

    #[test]
    fn test_dangerous_vessel_warning_and_write_back() {
        let codec = TestCodec::new();
        let provider = FixedProvider::new(Some(own_fix(47.0, 9.0, 0.0, 10.0, at(12, 0, 0))));
        let manager = manager_with_provider(codec.clone(), provider);

        let events: Arc<Mutex<Vec<MessageEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        manager.on_message(move |event| captured.lock().unwrap().push(event.clone()));

        // Target one nautical mile ahead, steaming straight at us: CPA ~0,
        // TCPA three minutes
        manager.targets().update_ship(Mmsi(244670123), at(12, 0, 0), |ship| {
            ship.name = Some("HMS COLLISION".to_string());
            ship.position = Some(GeoPosition::new(47.0 + 1.0 / 60.0, 9.0, 0.0));
            ship.course_over_ground = Some(180.0);
            ship.speed_over_ground = Some(10.0);
        });

        manager.run_surveillance_pass();

        let snapshot = events.lock().unwrap().clone();
        assert_eq!(snapshot.len(), 1);
        assert!(
            snapshot[0].text.contains("HMS COLLISION is dangerously close"),
            "text was '{}'",
            snapshot[0].text
        );
        assert!(snapshot[0].text.contains("CPA 0 m"));
        assert!(snapshot[0].text.contains("TCPA 0"));

        // Geometry was written back onto the target
        let target = manager.get_target(Mmsi(244670123)).unwrap();
        let relative = target.relative_position().unwrap();
        assert_eq!(relative.from, Mmsi(244000000));
        assert!(relative.closest_point_of_approach.unwrap() < 10.0);
        assert!((relative.distance - 1852.0).abs() < 5.0);

        // Second pass inside the repeat window: geometry updates, no new warning
        manager.run_surveillance_pass();
        assert_eq!(events.lock().unwrap().len(), 1);
        assert!(manager
            .get_target(Mmsi(244670123))
            .unwrap()
            .relative_position()
            .is_some());
    }

    #[test]
    fn test_distant_vessel_raises_no_warning() {
        let codec = TestCodec::new();
        let provider = FixedProvider::new(Some(own_fix(47.0, 9.0, 0.0, 10.0, at(12, 0, 0))));
        let manager = manager_with_provider(codec, provider);

        let events: Arc<Mutex<Vec<MessageEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        manager.on_message(move |event| captured.lock().unwrap().push(event.clone()));

        // Parallel course a mile to starboard; CPA stays at a mile
        manager.targets().update_ship(Mmsi(244670123), at(12, 0, 0), |ship| {
            ship.position = Some(GeoPosition::new(47.0, 9.0 + 1.0 / 40.0, 0.0));
            ship.course_over_ground = Some(0.0);
            ship.speed_over_ground = Some(10.0);
        });

        manager.run_surveillance_pass();
        assert!(events.lock().unwrap().is_empty());

        // Geometry is still recorded for API consumers
        let target = manager.get_target(Mmsi(244670123)).unwrap();
        assert!(target.relative_position().is_some());
    }

    #[test]
    fn test_targets_snapshot_serializes_for_api_consumers() {
        let codec = TestCodec::new();
        let manager = test_manager(codec.clone());

        codec.push(class_a(244670123, 47.5, 9.5, 270.0, 5.0, 271));
        manager.send_sentence("test", &ais_sentence(at(12, 0, 0))).unwrap();

        let value = serde_json::to_value(manager.get_targets()).unwrap();
        assert_eq!(value[0]["targetClass"], "ship");
        assert_eq!(value[0]["mmsi"], 244670123);
        assert_eq!(value[0]["courseOverGround"], 270.0);
    }

    #[test]
    fn test_alarm_thread_lifecycle() {
        let _ = env_logger::builder().is_test(true).try_init();
        let codec = TestCodec::new();
        let provider = FixedProvider::new(None);
        let manager = AisManager::with_position_provider(
            AisManagerConfig::new(Mmsi(244000000), "OWN SHIP"),
            codec,
            Arc::new(SystemClock),
            Arc::new(SentenceCache::new()),
            provider,
        );

        let mut params = TrackEstimationParameters::default();
        params.ais_safety_check_interval = Duration::from_millis(10);
        params.warn_if_gnss_missing = false;

        manager.enable_ais_alarms(true, Some(params));
        assert!(manager.ais_alarms_enabled());

        // Enabling again while alive is a no-op
        manager.enable_ais_alarms(true, None);
        assert!(manager.ais_alarms_enabled());

        std::thread::sleep(Duration::from_millis(30));

        manager.enable_ais_alarms(false, None);
        assert!(!manager.ais_alarms_enabled());

        // Restart works
        manager.enable_ais_alarms(true, None);
        assert!(manager.ais_alarms_enabled());
        manager.stop();
        assert!(!manager.ais_alarms_enabled());
    }

    #[test]
    fn test_own_ship_data_partial_when_not_ok() {
        let codec = TestCodec::new();
        let provider = FixedProvider::new(Some(own_fix(47.0, 9.0, 90.0, 8.0, at(11, 0, 0))));
        let manager = manager_with_provider(codec, provider);

        let (ship, ok) = manager.get_own_ship_data(at(12, 0, 0));
        assert!(!ok);
        // Stale, but still populated
        assert_eq!(ship.mmsi, Mmsi(244000000));
        assert_eq!(ship.name.as_deref(), Some("OWN SHIP"));
        assert_eq!(ship.position.unwrap().latitude, 47.0);
        assert_eq!(ship.speed_over_ground, Some(8.0));
    }
}
