//! Erosion simulation module
//!
//! [`HydraulicErosion`] drops a fixed number of water droplets on a square
//! heightmap, one after another, and lets each one carve and fill terrain
//! until it runs off the grid, stalls, evaporates or runs out of steps.
//! Droplets never overlap in time: droplet N sees every change made by
//! droplets 0..N.

pub mod hydraulic;
pub mod params;
pub mod utils;

pub use hydraulic::{Droplet, DropletReport, Termination};
pub use params::{ErosionConfig, ErosionPreset, DEFAULT_ITERATIONS, MAX_EROSION_RADIUS};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::heightmap::HeightmapError;
use crate::tilemap::Tilemap;
use utils::ErosionBrush;

/// Hydraulic erosion driver.
#[derive(Clone, Debug)]
pub struct HydraulicErosion {
    grid_size: usize,
    config: ErosionConfig,
    iterations: usize,
    seed: Option<u64>,
}

impl HydraulicErosion {
    pub fn new(grid_size: usize, config: ErosionConfig) -> Self {
        Self {
            grid_size,
            config,
            iterations: DEFAULT_ITERATIONS,
            seed: None,
        }
    }

    /// Number of droplets per [`apply`](Self::apply).
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Seed droplet placement so runs are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn config(&self) -> &ErosionConfig {
        &self.config
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Check the config and the heightmap before any cell is touched.
    pub fn validate(&self, heightmap: &Tilemap<f32>) -> Result<(), ErosionError> {
        self.config.validate()?;

        if self.grid_size == 0 {
            return Err(HeightmapError::EmptyGrid.into());
        }
        if heightmap.width != self.grid_size || heightmap.height != self.grid_size {
            return Err(HeightmapError::SizeMismatch {
                expected: self.grid_size,
                width: heightmap.width,
                height: heightmap.height,
            }
            .into());
        }
        if let Some((x, y, value)) = heightmap.find_non_finite() {
            return Err(HeightmapError::NonFiniteCell { x, y, value }.into());
        }

        Ok(())
    }

    /// Erode `heightmap` in place.
    ///
    /// Uses the configured seed, or a fresh random one (logged at debug level).
    pub fn apply(&self, heightmap: &mut Tilemap<f32>) -> Result<ErosionStats, ErosionError> {
        let seed = self.seed.unwrap_or_else(rand::random);
        if self.seed.is_none() {
            log::debug!("hydraulic erosion using random seed {}", seed);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.apply_with_rng(heightmap, &mut rng)
    }

    /// Erode `heightmap` in place, drawing droplet start positions from `rng`.
    pub fn apply_with_rng<R: Rng + ?Sized>(
        &self,
        heightmap: &mut Tilemap<f32>,
        rng: &mut R,
    ) -> Result<ErosionStats, ErosionError> {
        self.validate(heightmap)?;

        let mut stats = ErosionStats::default();

        // Bilinear sampling needs a cell on both sides
        let span = self.grid_size as f32 - 1.0;
        if self.grid_size < 2 {
            log::debug!("grid size {} has no interior; skipping erosion", self.grid_size);
            return Ok(stats);
        }

        log::debug!(
            "running {} droplets on {}x{} grid (radius {}, lifetime {})",
            self.iterations,
            self.grid_size,
            self.grid_size,
            self.config.erosion_radius,
            self.config.max_droplet_lifetime
        );

        let brush = ErosionBrush::new(self.config.erosion_radius);

        for _ in 0..self.iterations {
            let x = rng.gen_range(0.0..span);
            let y = rng.gen_range(0.0..span);
            let report = hydraulic::simulate_droplet(
                Droplet::new(x, y, &self.config),
                heightmap,
                &brush,
                &self.config,
            );
            stats.record(&report);
        }

        if let Some((x, y, _)) = heightmap.find_non_finite() {
            return Err(ErosionError::NumericFault { x, y });
        }

        log::debug!(
            "erosion done: {} steps, eroded {:.3}, deposited {:.3}",
            stats.steps_taken,
            stats.total_eroded,
            stats.total_deposited
        );

        Ok(stats)
    }

    /// Run a single droplet from a caller-chosen start position.
    pub fn simulate_droplet(
        &self,
        heightmap: &mut Tilemap<f32>,
        x: f32,
        y: f32,
    ) -> Result<DropletReport, ErosionError> {
        self.config.validate()?;
        let brush = ErosionBrush::new(self.config.erosion_radius);
        Ok(hydraulic::simulate_droplet(
            Droplet::new(x, y, &self.config),
            heightmap,
            &brush,
            &self.config,
        ))
    }
}

/// How many droplets ended for each reason.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TerminationCounts {
    pub out_of_bounds: usize,
    pub stalled: usize,
    pub evaporated: usize,
    pub lifetime_exceeded: usize,
}

impl TerminationCounts {
    pub fn record(&mut self, termination: Termination) {
        match termination {
            Termination::OutOfBounds => self.out_of_bounds += 1,
            Termination::Stalled => self.stalled += 1,
            Termination::Evaporated => self.evaporated += 1,
            Termination::LifetimeExceeded => self.lifetime_exceeded += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.out_of_bounds + self.stalled + self.evaporated + self.lifetime_exceeded
    }
}

/// Statistics from erosion simulation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErosionStats {
    /// Total material eroded (in height units)
    pub total_eroded: f64,
    /// Total material deposited
    pub total_deposited: f64,
    /// Total number of droplet steps taken
    pub steps_taken: u64,
    /// Number of droplets processed
    pub iterations: usize,
    /// Largest erosion from a single step
    pub max_erosion: f32,
    /// Largest deposition from a single step
    pub max_deposition: f32,
    pub terminations: TerminationCounts,
}

impl ErosionStats {
    fn record(&mut self, report: &DropletReport) {
        self.iterations += 1;
        self.steps_taken += report.steps as u64;
        self.total_eroded += report.eroded as f64;
        self.total_deposited += report.deposited as f64;
        self.max_erosion = self.max_erosion.max(report.max_erosion);
        self.max_deposition = self.max_deposition.max(report.max_deposition);
        self.terminations.record(report.termination);
    }
}

/// Errors that stop an erosion run.
#[derive(Debug, Clone, PartialEq)]
pub enum ErosionError {
    /// Heightmap is structurally invalid for the declared grid size
    Heightmap(HeightmapError),
    /// A configuration value is non-finite or out of range
    InvalidConfig(String),
    /// Simulation produced a non-finite height
    NumericFault { x: usize, y: usize },
}

impl std::fmt::Display for ErosionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErosionError::Heightmap(e) => write!(f, "Invalid heightmap: {}", e),
            ErosionError::InvalidConfig(e) => write!(f, "Invalid erosion config: {}", e),
            ErosionError::NumericFault { x, y } => {
                write!(f, "Numeric fault: height at \"{},{}\" became non-finite", x, y)
            }
        }
    }
}

impl std::error::Error for ErosionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ErosionError::Heightmap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HeightmapError> for ErosionError {
    fn from(e: HeightmapError) -> Self {
        ErosionError::Heightmap(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap;

    fn bits(map: &Tilemap<f32>) -> Vec<u32> {
        map.as_slice().iter().map(|h| h.to_bits()).collect()
    }

    #[test]
    fn test_droplets_carve_and_fill_basin() {
        // Droplets pick up sediment on the walls and drop it on the flat floor
        let mut heightmap = heightmap::bowl(32, 40.0);
        let erosion = HydraulicErosion::new(32, ErosionConfig::default())
            .with_iterations(1000)
            .with_seed(12345);

        let stats = erosion.apply(&mut heightmap).unwrap();

        assert!(stats.total_eroded > 0.0);
        assert!(stats.total_deposited > 0.0);
        assert_eq!(stats.iterations, 1000);
        assert_eq!(stats.terminations.total(), 1000);
    }

    fn column_sum(map: &Tilemap<f32>, x: usize) -> f32 {
        (0..map.height).map(|y| *map.get(x, y)).sum()
    }

    fn assert_slope_stays_bounded(size: usize, drop: f32, config: ErosionConfig) {
        let original = heightmap::slope(size, 10.0, drop);
        let (lo, hi) = original.min_max().unwrap();
        let mut heightmap = original.clone();

        let stats = HydraulicErosion::new(size, config)
            .with_iterations(1000)
            .with_seed(5)
            .apply(&mut heightmap)
            .unwrap();

        assert!(stats.total_eroded > 0.0);
        for (x, y, &h) in heightmap.iter() {
            assert!(
                h >= lo - 1.0 && h <= hi + 1.0,
                "{}x{} cell ({}, {}) drifted to {}",
                size,
                size,
                x,
                y,
                h
            );
        }
        assert!(column_sum(&heightmap, 0) < column_sum(&original, 0));
    }

    #[test]
    fn test_many_droplets_on_small_slope_stay_bounded() {
        assert_slope_stays_bounded(5, 2.0, ErosionConfig::default());
    }

    #[test]
    fn test_many_droplets_on_larger_slope_stay_bounded() {
        assert_slope_stays_bounded(16, 10.0 / 15.0, ErosionConfig::default());
        assert_slope_stays_bounded(
            16,
            10.0 / 15.0,
            ErosionConfig {
                erosion_radius: 1,
                ..Default::default()
            },
        );
    }

    #[test]
    fn test_oversized_radius_rejected_before_run() {
        let mut heightmap = heightmap::slope(5, 10.0, 1.0);
        let original = heightmap.clone();
        let config = ErosionConfig {
            erosion_radius: MAX_EROSION_RADIUS + 1,
            ..Default::default()
        };
        let erosion = HydraulicErosion::new(5, config);

        let err = erosion.apply(&mut heightmap).unwrap_err();
        assert!(err.to_string().contains("erosionRadius"));
        assert!(erosion.simulate_droplet(&mut heightmap, 1.0, 1.0).is_err());
        assert_eq!(heightmap, original);
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let base = heightmap::generate_noise_terrain(48, 5, &Default::default());
        let erosion = HydraulicErosion::new(48, ErosionConfig::default())
            .with_iterations(2000)
            .with_seed(42);

        let mut a = base.clone();
        let mut b = base.clone();
        let stats_a = erosion.apply(&mut a).unwrap();
        let stats_b = erosion.apply(&mut b).unwrap();

        assert_eq!(bits(&a), bits(&b));
        assert_eq!(stats_a, stats_b);
        assert_ne!(bits(&a), bits(&base));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let base = heightmap::generate_noise_terrain(48, 5, &Default::default());
        let mut a = base.clone();
        let mut b = base;
        HydraulicErosion::new(48, ErosionConfig::default())
            .with_iterations(500)
            .with_seed(1)
            .apply(&mut a)
            .unwrap();
        HydraulicErosion::new(48, ErosionConfig::default())
            .with_iterations(500)
            .with_seed(2)
            .apply(&mut b)
            .unwrap();
        assert_ne!(bits(&a), bits(&b));
    }

    #[test]
    fn test_injected_rng_matches_seed() {
        let base = heightmap::slope(16, 30.0, 1.5);
        let erosion = HydraulicErosion::new(16, ErosionConfig::default()).with_iterations(300);

        let mut a = base.clone();
        let mut b = base;
        erosion.clone().with_seed(7).apply(&mut a).unwrap();
        erosion.apply_with_rng(&mut b, &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_empty_config_matches_default() {
        let from_empty: ErosionConfig = serde_json::from_str("{}").unwrap();
        let a = HydraulicErosion::new(8, from_empty);
        let b = HydraulicErosion::new(8, ErosionConfig::default());
        assert_eq!(a.config(), b.config());
        assert_eq!(a.iterations(), b.iterations());
        assert_eq!(a.iterations(), DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_steps_bounded_by_lifetime() {
        let mut heightmap = heightmap::bowl(24, 30.0);
        let config = ErosionConfig {
            evaporate_speed: 0.0,
            max_droplet_lifetime: 40,
            ..Default::default()
        };
        let stats = HydraulicErosion::new(24, config)
            .with_iterations(200)
            .with_seed(3)
            .apply(&mut heightmap)
            .unwrap();
        assert!(stats.steps_taken <= 200 * 40);
        assert_eq!(stats.terminations.evaporated, 0);
    }

    #[test]
    fn test_flat_grid_unchanged() {
        let mut heightmap = heightmap::flat(3, 1.0);
        let erosion = HydraulicErosion::new(3, ErosionConfig::default()).with_seed(0);

        let report = erosion.simulate_droplet(&mut heightmap, 1.0, 1.0).unwrap();
        assert_eq!(report.termination, Termination::Stalled);

        let stats = erosion.with_iterations(100).apply(&mut heightmap).unwrap();
        assert_eq!(stats.terminations.stalled, 100);
        assert_eq!(heightmap, heightmap::flat(3, 1.0));
    }

    #[test]
    fn test_tiny_grids_are_left_alone() {
        let mut heightmap = heightmap::flat(1, 4.0);
        let stats = HydraulicErosion::new(1, ErosionConfig::default())
            .with_seed(1)
            .apply(&mut heightmap)
            .unwrap();
        assert_eq!(stats.iterations, 0);
        assert_eq!(*heightmap.get(0, 0), 4.0);
    }

    #[test]
    fn test_size_mismatch_rejected_without_mutation() {
        let mut heightmap = heightmap::slope(5, 10.0, 1.0);
        let original = heightmap.clone();
        let err = HydraulicErosion::new(6, ErosionConfig::default())
            .apply(&mut heightmap)
            .unwrap_err();
        assert!(matches!(
            err,
            ErosionError::Heightmap(HeightmapError::SizeMismatch { expected: 6, .. })
        ));
        assert_eq!(heightmap, original);
    }

    #[test]
    fn test_non_finite_cell_rejected() {
        let mut heightmap = heightmap::slope(5, 10.0, 1.0);
        heightmap.set(2, 2, f32::NAN);
        let err = HydraulicErosion::new(5, ErosionConfig::default())
            .apply(&mut heightmap)
            .unwrap_err();
        assert!(matches!(
            err,
            ErosionError::Heightmap(HeightmapError::NonFiniteCell { x: 2, y: 2, .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut heightmap = heightmap::slope(5, 10.0, 1.0);
        let config = ErosionConfig {
            erode_speed: -0.5,
            ..Default::default()
        };
        let err = HydraulicErosion::new(5, config).apply(&mut heightmap).unwrap_err();
        assert!(matches!(err, ErosionError::InvalidConfig(_)));
        assert!(err.to_string().contains("erodeSpeed"));
    }
}
