//! Erosion simulation parameters and configuration

use serde::{Deserialize, Serialize};

use crate::erosion::ErosionError;

/// Droplets simulated when a request does not name a count.
pub const DEFAULT_ITERATIONS: usize = 50_000;

/// Largest accepted brush radius.
pub const MAX_EROSION_RADIUS: usize = 64;

/// Droplet physics parameters.
///
/// Deserialises from camelCase keys. Missing keys take their default and
/// unknown keys are ignored, so a partial object is merged key-by-key over
/// [`ErosionConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErosionConfig {
    /// Radius (in cells) of the erosion/deposition brush
    pub erosion_radius: usize,

    /// How much of the previous direction survives each step (0.0-1.0)
    pub inertia: f32,

    /// Sediment carrying capacity multiplier
    pub sediment_capacity_factor: f32,

    /// Floor on carrying capacity, so droplets on gentle slopes still erode
    pub min_sediment_capacity: f32,

    /// Fraction of the free capacity eroded per step (0.0-1.0)
    pub erode_speed: f32,

    /// Fraction of surplus sediment deposited per step (0.0-1.0)
    pub deposit_speed: f32,

    /// Fraction of water lost per step (0.0-1.0)
    pub evaporate_speed: f32,

    /// Downhill acceleration
    pub gravity: f32,

    /// Maximum steps per droplet
    pub max_droplet_lifetime: usize,

    /// Water volume a droplet spawns with
    pub initial_water_volume: f32,

    /// Speed a droplet spawns with
    pub initial_speed: f32,
}

impl Default for ErosionConfig {
    fn default() -> Self {
        Self {
            erosion_radius: 3,
            inertia: 0.05,
            sediment_capacity_factor: 4.0,
            min_sediment_capacity: 0.01,
            erode_speed: 0.3,
            deposit_speed: 0.3,
            evaporate_speed: 0.02,
            gravity: 4.0,
            max_droplet_lifetime: 30,
            initial_water_volume: 1.0,
            initial_speed: 1.0,
        }
    }
}

impl ErosionConfig {
    /// Check every parameter is finite and within its physical range.
    pub fn validate(&self) -> Result<(), ErosionError> {
        if self.erosion_radius > MAX_EROSION_RADIUS {
            return Err(ErosionError::InvalidConfig(format!(
                "erosionRadius must be at most {}, got {}",
                MAX_EROSION_RADIUS, self.erosion_radius
            )));
        }

        let unit = [
            ("inertia", self.inertia),
            ("erodeSpeed", self.erode_speed),
            ("depositSpeed", self.deposit_speed),
            ("evaporateSpeed", self.evaporate_speed),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ErosionError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        let non_negative = [
            ("sedimentCapacityFactor", self.sediment_capacity_factor),
            ("minSedimentCapacity", self.min_sediment_capacity),
            ("gravity", self.gravity),
            ("initialSpeed", self.initial_speed),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ErosionError::InvalidConfig(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        if !self.initial_water_volume.is_finite() || self.initial_water_volume <= 0.0 {
            return Err(ErosionError::InvalidConfig(format!(
                "initialWaterVolume must be positive, got {}",
                self.initial_water_volume
            )));
        }

        Ok(())
    }

    /// Config and droplet count for a preset.
    pub fn from_preset(preset: ErosionPreset) -> (Self, usize) {
        match preset {
            ErosionPreset::Light => (
                Self {
                    erode_speed: 0.15,
                    max_droplet_lifetime: 20,
                    ..Default::default()
                },
                10_000,
            ),
            ErosionPreset::Normal => (Self::default(), DEFAULT_ITERATIONS),
            ErosionPreset::Heavy => (
                Self {
                    erode_speed: 0.5,
                    sediment_capacity_factor: 8.0,
                    ..Default::default()
                },
                150_000,
            ),
            ErosionPreset::Realistic => (
                Self {
                    erosion_radius: 2,
                    inertia: 0.1,
                    evaporate_speed: 0.01,
                    max_droplet_lifetime: 64,
                    ..Default::default()
                },
                250_000,
            ),
        }
    }
}

/// Erosion intensity preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ErosionPreset {
    /// Few droplets, gentle carving
    Light,
    /// Balanced defaults
    #[default]
    Normal,
    /// Aggressive carving - deep gullies
    Heavy,
    /// Long-lived droplets with a narrow brush
    Realistic,
}

impl ErosionPreset {
    pub fn all() -> &'static [Self] {
        &[Self::Light, Self::Normal, Self::Heavy, Self::Realistic]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Light => "Subtle smoothing",
            Self::Normal => "Balanced erosion",
            Self::Heavy => "Deep gullies and fans",
            Self::Realistic => "Long droplet paths, narrow channels",
        }
    }
}

impl std::fmt::Display for ErosionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Normal => write!(f, "normal"),
            Self::Heavy => write!(f, "heavy"),
            Self::Realistic => write!(f, "realistic"),
        }
    }
}
