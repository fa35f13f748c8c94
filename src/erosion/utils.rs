//! Utility functions for erosion calculations
//!
//! Provides bilinear height/gradient sampling and the erosion brush.

use crate::tilemap::Tilemap;

/// Corner cells and fractional offsets for bilinear sampling at `(x, y)`.
///
/// Positions are clamped so the four corners always exist; droplets only ever
/// sample inside `[0, size - 1)`, where the clamp is a no-op.
fn bilinear_cell(heightmap: &Tilemap<f32>, x: f32, y: f32) -> ([f32; 4], f32, f32) {
    let x0 = (x.max(0.0).floor() as usize).min(heightmap.width.saturating_sub(2));
    let y0 = (y.max(0.0).floor() as usize).min(heightmap.height.saturating_sub(2));
    let x1 = (x0 + 1).min(heightmap.width - 1);
    let y1 = (y0 + 1).min(heightmap.height - 1);

    let fx = (x - x0 as f32).clamp(0.0, 1.0);
    let fy = (y - y0 as f32).clamp(0.0, 1.0);

    let corners = [
        *heightmap.get(x0, y0),
        *heightmap.get(x1, y0),
        *heightmap.get(x0, y1),
        *heightmap.get(x1, y1),
    ];
    (corners, fx, fy)
}

/// Sample height at a floating-point position using bilinear interpolation.
pub fn height_at(heightmap: &Tilemap<f32>, x: f32, y: f32) -> f32 {
    let ([h00, h10, h01, h11], fx, fy) = bilinear_cell(heightmap, x, y);

    let h0 = h00 * (1.0 - fx) + h10 * fx;
    let h1 = h01 * (1.0 - fx) + h11 * fx;
    h0 * (1.0 - fy) + h1 * fy
}

/// Calculate gradient at a floating-point position using bilinear interpolation.
/// Returns (grad_x, grad_y) pointing in the direction of steepest ascent.
pub fn gradient_at(heightmap: &Tilemap<f32>, x: f32, y: f32) -> (f32, f32) {
    let ([h00, h10, h01, h11], fx, fy) = bilinear_cell(heightmap, x, y);

    // dh/dx along the top and bottom edges, interpolated in y
    let grad_x = (h10 - h00) * (1.0 - fy) + (h11 - h01) * fy;
    // dh/dy along the left and right edges, interpolated in x
    let grad_y = (h01 - h00) * (1.0 - fx) + (h11 - h10) * fx;

    (grad_x, grad_y)
}

/// Circular brush spreading erosion and deposition over neighbouring cells.
///
/// Cells within Euclidean distance `radius` of the centre get weight
/// `1 - d / (radius + 1)`, normalised to sum to 1. When the brush hangs over
/// a grid edge, the in-bounds weights are renormalised so the full amount is
/// still applied.
#[derive(Clone, Debug)]
pub struct ErosionBrush {
    radius: usize,
    offsets: Vec<(i64, i64, f32)>,
}

impl ErosionBrush {
    pub fn new(radius: usize) -> Self {
        let r = radius as i64;
        let falloff = radius as f32 + 1.0;
        let mut offsets = Vec::new();
        let mut total_weight = 0.0;

        for dy in -r..=r {
            for dx in -r..=r {
                let dist = ((dx * dx + dy * dy) as f64).sqrt() as f32;
                if dist <= radius as f32 {
                    let weight = 1.0 - dist / falloff;
                    offsets.push((dx, dy, weight));
                    total_weight += weight;
                }
            }
        }

        for (_, _, w) in offsets.iter_mut() {
            *w /= total_weight;
        }

        Self { radius, offsets }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// `(dx, dy, weight)` for every cell of the unclipped brush.
    pub fn offsets(&self) -> &[(i64, i64, f32)] {
        &self.offsets
    }

    /// In-bounds cells around `(cx, cy)` with weights renormalised to sum to 1.
    pub fn footprint<'a>(
        &'a self,
        width: usize,
        height: usize,
        cx: usize,
        cy: usize,
    ) -> impl Iterator<Item = (usize, usize, f32)> + 'a {
        let clip = move |&(dx, dy, w): &(i64, i64, f32)| {
            let nx = cx as i64 + dx;
            let ny = cy as i64 + dy;
            if nx >= 0 && ny >= 0 && (nx as usize) < width && (ny as usize) < height {
                Some((nx as usize, ny as usize, w))
            } else {
                None
            }
        };

        let in_bounds: f32 = self.offsets.iter().filter_map(clip).map(|(_, _, w)| w).sum();
        let scale = if in_bounds > 0.0 { 1.0 / in_bounds } else { 0.0 };

        self.offsets
            .iter()
            .filter_map(clip)
            .map(move |(x, y, w)| (x, y, w * scale))
    }
}

/// Remove `amount` of material spread over the brush around `(x, y)`.
pub fn apply_erosion_brush(
    heightmap: &mut Tilemap<f32>,
    brush: &ErosionBrush,
    x: usize,
    y: usize,
    amount: f32,
) {
    let (width, height) = (heightmap.width, heightmap.height);
    for (nx, ny, weight) in brush.footprint(width, height, x, y) {
        *heightmap.get_mut(nx, ny) -= amount * weight;
    }
}

/// Add `amount` of material spread over the brush around `(x, y)`.
pub fn apply_deposit_brush(
    heightmap: &mut Tilemap<f32>,
    brush: &ErosionBrush,
    x: usize,
    y: usize,
    amount: f32,
) {
    let (width, height) = (heightmap.width, heightmap.height);
    for (nx, ny, weight) in brush.footprint(width, height, x, y) {
        *heightmap.get_mut(nx, ny) += amount * weight;
    }
}
