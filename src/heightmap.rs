//! Heightmap encoding and synthetic terrain.
//!
//! Hosts exchange heightmaps as a flat object keyed by `"x,y"` strings. The
//! simulator works on a dense [`Tilemap<f32>`]; this module converts between
//! the two and provides a handful of generated terrains for tools and tests.

use std::collections::BTreeMap;

use noise::{NoiseFn, Perlin};

use crate::tilemap::Tilemap;

/// Wire form of a heightmap: `"x,y"` -> elevation.
pub type GridMap = BTreeMap<String, f32>;

/// Key for cell `(x, y)` in a [`GridMap`].
pub fn grid_key(x: usize, y: usize) -> String {
    format!("{},{}", x, y)
}

/// Parse a `"x,y"` key. Whitespace around either number is tolerated.
pub fn parse_grid_key(key: &str) -> Option<(usize, usize)> {
    let (x, y) = key.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Decode a keyed grid into a dense `grid_size x grid_size` tilemap.
///
/// Every in-range cell must be present and finite. Keys outside the grid are
/// ignored.
pub fn from_grid_map(grid: &GridMap, grid_size: usize) -> Result<Tilemap<f32>, HeightmapError> {
    if grid_size == 0 {
        return Err(HeightmapError::EmptyGrid);
    }

    // Fewer keys than cells: one of the first `grid.len() + 1` cells is absent,
    // so report it without allocating the declared size
    if grid_size.checked_mul(grid_size).map_or(true, |cells| cells > grid.len()) {
        let (x, y) = (0..grid_size)
            .flat_map(|y| (0..grid_size).map(move |x| (x, y)))
            .find(|&(x, y)| !grid.contains_key(&grid_key(x, y)))
            .unwrap_or((0, 0));
        return Err(HeightmapError::MissingCell { x, y });
    }

    let mut heightmap = Tilemap::new_with(grid_size, grid_size, 0.0f32);
    for y in 0..grid_size {
        for x in 0..grid_size {
            let value = *grid
                .get(&grid_key(x, y))
                .ok_or(HeightmapError::MissingCell { x, y })?;
            if !value.is_finite() {
                return Err(HeightmapError::NonFiniteCell { x, y, value });
            }
            heightmap.set(x, y, value);
        }
    }

    let foreign = grid
        .keys()
        .filter(|k| !matches!(parse_grid_key(k), Some((x, y)) if x < grid_size && y < grid_size))
        .count();
    if foreign > 0 {
        log::debug!("ignoring {} keys outside the {}x{} grid", foreign, grid_size, grid_size);
    }

    Ok(heightmap)
}

/// Overwrite every in-range cell of `grid` with the tilemap's values.
/// Keys the tilemap does not cover are left as they were.
pub fn write_grid_map(heightmap: &Tilemap<f32>, grid: &mut GridMap) {
    for (x, y, &h) in heightmap.iter() {
        grid.insert(grid_key(x, y), h);
    }
}

/// Encode a tilemap as a fresh keyed grid.
pub fn to_grid_map(heightmap: &Tilemap<f32>) -> GridMap {
    let mut grid = GridMap::new();
    write_grid_map(heightmap, &mut grid);
    grid
}

/// Structural problems with a heightmap.
#[derive(Debug, Clone, PartialEq)]
pub enum HeightmapError {
    /// `gridSize` of zero
    EmptyGrid,
    /// A required `"x,y"` key is absent
    MissingCell { x: usize, y: usize },
    /// A cell holds NaN or infinity
    NonFiniteCell { x: usize, y: usize, value: f32 },
    /// Tilemap dimensions differ from the declared grid size
    SizeMismatch { expected: usize, width: usize, height: usize },
}

impl std::fmt::Display for HeightmapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeightmapError::EmptyGrid => write!(f, "grid size must be at least 1"),
            HeightmapError::MissingCell { x, y } => {
                write!(f, "heightmap is missing cell \"{},{}\"", x, y)
            }
            HeightmapError::NonFiniteCell { x, y, value } => {
                write!(f, "heightmap cell \"{},{}\" is not finite ({})", x, y, value)
            }
            HeightmapError::SizeMismatch { expected, width, height } => write!(
                f,
                "heightmap is {}x{} but grid size is {}",
                width, height, expected
            ),
        }
    }
}

impl std::error::Error for HeightmapError {}

// =============================================================================
// SYNTHETIC TERRAIN
// =============================================================================

/// Uniform terrain at a single elevation.
pub fn flat(size: usize, elevation: f32) -> Tilemap<f32> {
    Tilemap::new_with(size, size, elevation)
}

/// Plane falling along +x: `top - drop * x`.
pub fn slope(size: usize, top: f32, drop: f32) -> Tilemap<f32> {
    Tilemap::from_fn(size, size, |x, _| top - drop * x as f32)
}

/// Radial basin with its lowest point in the centre.
pub fn bowl(size: usize, depth: f32) -> Tilemap<f32> {
    let c = (size as f32 - 1.0) / 2.0;
    let max_r = (2.0 * c * c).sqrt().max(1.0);
    Tilemap::from_fn(size, size, |x, y| {
        let dx = x as f32 - c;
        let dy = y as f32 - c;
        depth * (dx * dx + dy * dy).sqrt() / max_r
    })
}

/// Parameters for noise terrain
#[derive(Clone, Debug)]
pub struct TerrainParams {
    /// Features per grid side at the base octave
    pub base_frequency: f64,
    /// Number of noise octaves
    pub octaves: u32,
    /// Amplitude decay per octave (0.0-1.0)
    pub persistence: f64,
    /// Frequency multiplier per octave
    pub lacunarity: f64,
    /// Peak-to-trough elevation range
    pub relief: f32,
    /// Ridge sharpening exponent (1.0 = plain fBm)
    pub ridge_power: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            base_frequency: 3.0,
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
            relief: 100.0,
            ridge_power: 1.5,
        }
    }
}

/// Rolling fBm terrain in `[0, relief]`.
pub fn generate_noise_terrain(size: usize, seed: u64, params: &TerrainParams) -> Tilemap<f32> {
    let perlin = Perlin::new(seed as u32);
    let scale = params.base_frequency / size.max(1) as f64;

    Tilemap::from_fn(size, size, |x, y| {
        let n = fbm(
            &perlin,
            x as f64 * scale,
            y as f64 * scale,
            params.octaves,
            params.persistence,
            params.lacunarity,
        );
        // fbm is roughly in [-1, 1]; remap, then sharpen ridges
        let t = ((n + 1.0) * 0.5).clamp(0.0, 1.0).powf(params.ridge_power);
        t as f32 * params.relief
    })
}

/// Fractional Brownian Motion - multi-octave noise
fn fbm(noise: &Perlin, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    if max_value > 0.0 {
        total / max_value
    } else {
        0.0
    }
}
