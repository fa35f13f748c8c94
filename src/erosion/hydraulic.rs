//! Hydraulic erosion simulation using particle-based water droplets.
//!
//! Each droplet follows the terrain gradient, picking up sediment while it
//! runs downhill with spare capacity and dropping it when it slows, overflows
//! or climbs. Droplets live on a hard-edged grid: walking off the sampling
//! area ends the droplet rather than wrapping or clamping it.

use crate::erosion::params::ErosionConfig;
use crate::erosion::utils::{apply_deposit_brush, apply_erosion_brush, gradient_at, height_at, ErosionBrush};
use crate::tilemap::Tilemap;

/// Droplets with less water than this have evaporated.
pub const MIN_WATER_VOLUME: f32 = 1e-4;

/// Blended directions shorter than this count as zero.
const MIN_DIRECTION_LENGTH: f32 = 1e-6;

/// A water droplet for hydraulic erosion simulation
#[derive(Clone, Debug, PartialEq)]
pub struct Droplet {
    /// Position (floating point for interpolation)
    pub x: f32,
    pub y: f32,
    /// Movement direction (normalized, or zero before the first step)
    pub dir_x: f32,
    pub dir_y: f32,
    pub speed: f32,
    pub water: f32,
    /// Carried sediment
    pub sediment: f32,
}

impl Droplet {
    pub fn new(x: f32, y: f32, config: &ErosionConfig) -> Self {
        Self {
            x,
            y,
            dir_x: 0.0,
            dir_y: 0.0,
            speed: config.initial_speed,
            water: config.initial_water_volume,
            sediment: 0.0,
        }
    }
}

/// Why a droplet stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Termination {
    /// The next position left the sampling area
    OutOfBounds,
    /// No gradient and no momentum
    Stalled,
    /// Water volume fell below [`MIN_WATER_VOLUME`]
    Evaporated,
    /// Hit `maxDropletLifetime`
    LifetimeExceeded,
}

/// Result of advancing a droplet by one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    /// The droplet moved; material it removed from and added to the terrain.
    Moved { eroded: f32, deposited: f32 },
    /// The droplet stopped before moving. The heightmap is untouched.
    Terminated(Termination),
}

/// Summary of one droplet's life.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DropletReport {
    pub steps: usize,
    pub termination: Termination,
    pub eroded: f32,
    pub deposited: f32,
    /// Largest single-step erosion
    pub max_erosion: f32,
    /// Largest single-step deposition
    pub max_deposition: f32,
    /// Sediment still held when the droplet stopped
    pub sediment: f32,
}

/// True if `(x, y)` can be bilinearly sampled without touching a cell outside the grid.
pub fn in_sampling_area(heightmap: &Tilemap<f32>, x: f32, y: f32) -> bool {
    x >= 0.0 && y >= 0.0 && x < (heightmap.width as f32 - 1.0) && y < (heightmap.height as f32 - 1.0)
}

/// Advance a droplet by one step.
///
/// 1. Blend the previous direction with the downhill gradient using inertia
/// 2. Move one unit; stop if the direction is zero or the droplet leaves the grid
/// 3. Update speed from the height change and evaporate some water
/// 4. Deposit when over capacity or climbing, otherwise erode
pub fn step(
    droplet: &mut Droplet,
    heightmap: &mut Tilemap<f32>,
    brush: &ErosionBrush,
    config: &ErosionConfig,
) -> StepOutcome {
    let (grad_x, grad_y) = gradient_at(heightmap, droplet.x, droplet.y);

    let dir_x = droplet.dir_x * config.inertia - grad_x * (1.0 - config.inertia);
    let dir_y = droplet.dir_y * config.inertia - grad_y * (1.0 - config.inertia);
    let dir_len = (dir_x * dir_x + dir_y * dir_y).sqrt();
    if dir_len.is_nan() || dir_len < MIN_DIRECTION_LENGTH {
        return StepOutcome::Terminated(Termination::Stalled);
    }
    droplet.dir_x = dir_x / dir_len;
    droplet.dir_y = dir_y / dir_len;

    let new_x = droplet.x + droplet.dir_x;
    let new_y = droplet.y + droplet.dir_y;
    if !in_sampling_area(heightmap, new_x, new_y) {
        return StepOutcome::Terminated(Termination::OutOfBounds);
    }

    let old_height = height_at(heightmap, droplet.x, droplet.y);
    let new_height = height_at(heightmap, new_x, new_y);
    let height_diff = new_height - old_height;

    droplet.speed = (droplet.speed * droplet.speed + height_diff * config.gravity)
        .max(0.0)
        .sqrt();
    droplet.water *= 1.0 - config.evaporate_speed;

    let capacity = (-height_diff * droplet.speed * droplet.water * config.sediment_capacity_factor)
        .max(config.min_sediment_capacity);

    // Brush is centred on the cell the droplet is leaving
    let cell_x = droplet.x as usize;
    let cell_y = droplet.y as usize;

    let mut eroded = 0.0;
    let mut deposited = 0.0;

    if droplet.sediment > capacity || height_diff > 0.0 {
        let amount = if height_diff > 0.0 {
            // Fill the pit behind us, as far as the load allows
            height_diff.min(droplet.sediment)
        } else {
            (droplet.sediment - capacity) * config.deposit_speed
        };
        if amount > 0.0 {
            droplet.sediment -= amount;
            apply_deposit_brush(heightmap, brush, cell_x, cell_y, amount);
            deposited = amount;
        }
    } else {
        // Never dig deeper than the drop we just made
        let amount = ((capacity - droplet.sediment) * config.erode_speed).min(-height_diff);
        if amount > 0.0 {
            droplet.sediment += amount;
            apply_erosion_brush(heightmap, brush, cell_x, cell_y, amount);
            eroded = amount;
        }
    }

    droplet.x = new_x;
    droplet.y = new_y;

    StepOutcome::Moved { eroded, deposited }
}

/// Run a droplet until it terminates.
///
/// Always stops within `max_droplet_lifetime` steps.
pub fn simulate_droplet(
    mut droplet: Droplet,
    heightmap: &mut Tilemap<f32>,
    brush: &ErosionBrush,
    config: &ErosionConfig,
) -> DropletReport {
    let mut report = DropletReport {
        steps: 0,
        termination: Termination::LifetimeExceeded,
        eroded: 0.0,
        deposited: 0.0,
        max_erosion: 0.0,
        max_deposition: 0.0,
        sediment: 0.0,
    };

    if !in_sampling_area(heightmap, droplet.x, droplet.y) {
        report.termination = Termination::OutOfBounds;
        return report;
    }

    while report.steps < config.max_droplet_lifetime {
        match step(&mut droplet, heightmap, brush, config) {
            StepOutcome::Terminated(reason) => {
                report.termination = reason;
                break;
            }
            StepOutcome::Moved { eroded, deposited } => {
                report.steps += 1;
                report.eroded += eroded;
                report.deposited += deposited;
                report.max_erosion = report.max_erosion.max(eroded);
                report.max_deposition = report.max_deposition.max(deposited);
            }
        }

        if droplet.water < MIN_WATER_VOLUME {
            report.termination = Termination::Evaporated;
            break;
        }
    }

    report.sediment = droplet.sediment;
    report
}
