//! Particle event model.
//!
//! Defines [`ParticleEvent`], the immutable record flowing through the
//! pipeline, and [`ParticleKind`], the closed set of detected particle
//! categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Energy cutoff (GeV) above which an event counts as high-energy.
///
/// Used both by the aggregator's running count and as the default
/// filter threshold for queries.
pub const HIGH_ENERGY_THRESHOLD_GEV: f64 = 50.0;

/// Particle category recorded by the detector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ParticleKind {
    Electron,
    Positron,
    Muon,
    Photon,
    Proton,
    Neutrino,
}

impl ParticleKind {
    /// All known particle kinds, in declaration order.
    pub const ALL: [ParticleKind; 6] = [
        ParticleKind::Electron,
        ParticleKind::Positron,
        ParticleKind::Muon,
        ParticleKind::Photon,
        ParticleKind::Proton,
        ParticleKind::Neutrino,
    ];
}

/// One detected particle interaction.
///
/// Events are immutable after construction: created by a producer,
/// moved into the buffer, consumed exactly once, then owned by the
/// store. Invariant: `energy_gev >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticleEvent {
    /// Globally unique identifier, assigned at creation.
    pub event_id: Uuid,
    /// Observation timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// Measured energy in GeV. Never negative.
    pub energy_gev: f64,
    /// Particle category.
    pub particle_type: ParticleKind,
    /// Detector-specific marker.
    pub flag: bool,
}

impl ParticleEvent {
    /// Create a new event observed now, with a fresh id.
    ///
    /// Negative energies are clamped to zero to uphold the model
    /// invariant; detectors do not report negative energy.
    pub fn new(energy_gev: f64, particle_type: ParticleKind, flag: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            energy_gev: energy_gev.max(0.0),
            particle_type,
            flag,
        }
    }

    /// Create an event with an explicit timestamp.
    pub fn observed_at(
        timestamp: DateTime<Utc>,
        energy_gev: f64,
        particle_type: ParticleKind,
        flag: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp,
            energy_gev: energy_gev.max(0.0),
            particle_type,
            flag,
        }
    }

    /// Whether this event meets the high-energy cutoff.
    pub fn is_high_energy(&self) -> bool {
        self.energy_gev >= HIGH_ENERGY_THRESHOLD_GEV
    }
}
