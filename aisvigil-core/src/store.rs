//! Concurrent target database
//!
//! One shared store per tracker, accessed from the ingestion path, the
//! surveillance thread and any number of API readers. Reads clone values
//! out under the read lock so iteration never blocks writers for long;
//! compound read-modify-write flows are additionally serialized by the
//! manager's own mutex.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::mmsi::Mmsi;
use crate::target::{
    AidToNavigation, AisTarget, BaseStation, SarAircraft, Ship, ShipRelativePosition,
};

/// Shared, thread-safe map MMSI -> target
#[derive(Clone, Debug, Default)]
pub struct TargetStore {
    targets: Arc<RwLock<HashMap<u32, AisTarget>>>,
}

impl TargetStore {
    pub fn new() -> Self {
        TargetStore::default()
    }

    /// Look up a target by MMSI
    pub fn try_get(&self, mmsi: Mmsi) -> Option<AisTarget> {
        self.targets.read().unwrap().get(&mmsi.0).cloned()
    }

    /// Get or create the ship with this MMSI, refresh its `last_seen`,
    /// and apply `update` to it, all under the write lock.
    ///
    /// If the MMSI currently names a different target class the old entry
    /// is dropped and a fresh ship replaces it; an MMSI being reused across
    /// station classes is rare but does happen.
    pub fn update_ship<F>(&self, mmsi: Mmsi, last_seen: DateTime<Utc>, update: F) -> Ship
    where
        F: FnOnce(&mut Ship),
    {
        let mut targets = self.targets.write().unwrap();
        let mut ship = match targets.remove(&mmsi.0) {
            Some(AisTarget::Ship(ship)) => ship,
            Some(_) => {
                log::debug!("MMSI {} changed target class to ship; replacing entry", mmsi);
                Ship::new(mmsi, last_seen)
            }
            None => Ship::new(mmsi, last_seen),
        };
        ship.last_seen = last_seen;
        update(&mut ship);
        targets.insert(mmsi.0, AisTarget::Ship(ship.clone()));
        ship
    }

    /// As [`TargetStore::update_ship`], for base stations
    pub fn update_base_station<F>(
        &self,
        mmsi: Mmsi,
        last_seen: DateTime<Utc>,
        update: F,
    ) -> BaseStation
    where
        F: FnOnce(&mut BaseStation),
    {
        let mut targets = self.targets.write().unwrap();
        let mut station = match targets.remove(&mmsi.0) {
            Some(AisTarget::BaseStation(station)) => station,
            Some(_) => BaseStation::new(mmsi, last_seen),
            None => BaseStation::new(mmsi, last_seen),
        };
        station.last_seen = last_seen;
        update(&mut station);
        targets.insert(mmsi.0, AisTarget::BaseStation(station.clone()));
        station
    }

    /// As [`TargetStore::update_ship`], for SAR aircraft
    pub fn update_sar_aircraft<F>(
        &self,
        mmsi: Mmsi,
        last_seen: DateTime<Utc>,
        update: F,
    ) -> SarAircraft
    where
        F: FnOnce(&mut SarAircraft),
    {
        let mut targets = self.targets.write().unwrap();
        let mut aircraft = match targets.remove(&mmsi.0) {
            Some(AisTarget::SarAircraft(aircraft)) => aircraft,
            _ => SarAircraft::new(mmsi, last_seen),
        };
        aircraft.last_seen = last_seen;
        update(&mut aircraft);
        targets.insert(mmsi.0, AisTarget::SarAircraft(aircraft.clone()));
        aircraft
    }

    /// As [`TargetStore::update_ship`], for aids to navigation
    pub fn update_aid_to_navigation<F>(
        &self,
        mmsi: Mmsi,
        last_seen: DateTime<Utc>,
        update: F,
    ) -> AidToNavigation
    where
        F: FnOnce(&mut AidToNavigation),
    {
        let mut targets = self.targets.write().unwrap();
        let mut aid = match targets.remove(&mmsi.0) {
            Some(AisTarget::AidToNavigation(aid)) => aid,
            _ => AidToNavigation::new(mmsi, last_seen),
        };
        aid.last_seen = last_seen;
        update(&mut aid);
        targets.insert(mmsi.0, AisTarget::AidToNavigation(aid.clone()));
        aid
    }

    /// Store the surveillance loop's computed geometry on a target.
    /// No-op when the target has been pruned in the meantime.
    pub fn set_relative_position(&self, mmsi: Mmsi, relative: ShipRelativePosition) {
        let mut targets = self.targets.write().unwrap();
        if let Some(target) = targets.get_mut(&mmsi.0) {
            target.set_relative_position(Some(relative));
        }
    }

    /// A stable copy of all targets, safe to iterate without any lock
    pub fn snapshot(&self) -> Vec<AisTarget> {
        self.targets.read().unwrap().values().cloned().collect()
    }

    /// Remove one target; returns whether it existed
    pub fn remove(&self, mmsi: Mmsi) -> bool {
        self.targets.write().unwrap().remove(&mmsi.0).is_some()
    }

    /// Keep only the targets for which `keep` returns true
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&AisTarget) -> bool,
    {
        self.targets.write().unwrap().retain(|_, t| keep(t));
    }

    pub fn len(&self) -> usize {
        self.targets.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.read().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.targets.write().unwrap().clear();
    }
}
