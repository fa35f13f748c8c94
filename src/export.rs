//! PNG export for inspecting erosion results.

use std::path::Path;

use image::{ImageBuffer, Rgb, RgbImage};

use crate::tilemap::Tilemap;

/// Render a heightmap as hill-shaded relief, tinted from lowland green to snow.
pub fn render_shaded_heightmap(heightmap: &Tilemap<f32>) -> RgbImage {
    let width = heightmap.width;
    let height = heightmap.height;

    let (min_h, max_h) = heightmap.min_max().unwrap_or((0.0, 0.0));
    let range = (max_h - min_h).max(1e-6);

    // Light direction (from upper-left)
    let light_x = -0.7f32;
    let light_y = -0.7f32;
    let light_z = 0.5f32;
    let light_len = (light_x * light_x + light_y * light_y + light_z * light_z).sqrt();
    let (lx, ly, lz) = (light_x / light_len, light_y / light_len, light_z / light_len);

    // Normals are scaled relative to relief so small test maps still show shading
    let relief_scale = 8.0 / range;

    let mut img = ImageBuffer::new(width as u32, height as u32);

    for y in 0..height {
        for x in 0..width {
            let h = *heightmap.get(x, y);
            let normalized = (h - min_h) / range;

            let h_left = if x > 0 { *heightmap.get(x - 1, y) } else { h };
            let h_right = if x < width - 1 { *heightmap.get(x + 1, y) } else { h };
            let h_up = if y > 0 { *heightmap.get(x, y - 1) } else { h };
            let h_down = if y < height - 1 { *heightmap.get(x, y + 1) } else { h };

            let nx = (h_left - h_right) * relief_scale;
            let ny = (h_up - h_down) * relief_scale;
            let nz = 1.0f32;
            let nlen = (nx * nx + ny * ny + nz * nz).sqrt();
            let (nx, ny, nz) = (nx / nlen, ny / nlen, nz / nlen);

            let diffuse = (nx * lx + ny * ly + nz * lz).max(0.0);
            let ambient = 0.3;
            let lighting = (ambient + (1.0 - ambient) * diffuse).min(1.0);

            let base = elevation_color(normalized);
            let shade = |c: u8| (c as f32 * lighting) as u8;
            img.put_pixel(x as u32, y as u32, Rgb([shade(base[0]), shade(base[1]), shade(base[2])]));
        }
    }

    img
}

fn elevation_color(normalized: f32) -> Rgb<u8> {
    if normalized < 0.3 {
        Rgb([80, 140, 60])
    } else if normalized < 0.6 {
        let t = (normalized - 0.3) / 0.3;
        Rgb([
            (80.0 + t * 80.0) as u8,
            (140.0 - t * 60.0) as u8,
            (60.0 - t * 20.0) as u8,
        ])
    } else if normalized < 0.85 {
        let t = (normalized - 0.6) / 0.25;
        let v = (160.0 - t * 40.0) as u8;
        Rgb([v, v - 10, v - 20])
    } else {
        Rgb([240, 240, 245])
    }
}

/// Render where material left (red) and arrived (blue), scaled to the largest change.
///
/// Returns `None` if the maps differ in size.
pub fn render_erosion_delta(before: &Tilemap<f32>, after: &Tilemap<f32>) -> Option<RgbImage> {
    if before.width != after.width || before.height != after.height {
        return None;
    }

    let max_change = before
        .as_slice()
        .iter()
        .zip(after.as_slice())
        .map(|(a, b)| (b - a).abs())
        .fold(0.0f32, f32::max)
        .max(1e-6);

    let img = ImageBuffer::from_fn(before.width as u32, before.height as u32, |x, y| {
        let delta = *after.get(x as usize, y as usize) - *before.get(x as usize, y as usize);
        // sqrt keeps faint changes visible next to deep gullies
        let t = (delta.abs() / max_change).sqrt();
        let fade = (255.0 * (1.0 - t)) as u8;
        if delta < 0.0 {
            Rgb([255, fade, fade])
        } else if delta > 0.0 {
            Rgb([fade, fade, 255])
        } else {
            Rgb([255, 255, 255])
        }
    });

    Some(img)
}

/// Lay out equally sized images on a grid, row by row.
pub fn create_grid(images: &[RgbImage], cols: usize, padding: u32) -> RgbImage {
    let Some(first) = images.first() else {
        return ImageBuffer::new(1, 1);
    };
    let cols = cols.max(1);
    let rows = (images.len() + cols - 1) / cols;

    let cell_width = first.width();
    let cell_height = first.height();
    let grid_width = cell_width * cols as u32 + padding * (cols as u32 + 1);
    let grid_height = cell_height * rows as u32 + padding * (rows as u32 + 1);

    let mut grid: RgbImage = ImageBuffer::from_pixel(grid_width, grid_height, Rgb([40, 40, 40]));

    for (idx, img) in images.iter().enumerate() {
        let col = (idx % cols) as u32;
        let row = (idx / cols) as u32;
        let x_offset = padding + col * (cell_width + padding);
        let y_offset = padding + row * (cell_height + padding);

        for y in 0..img.height().min(cell_height) {
            for x in 0..img.width().min(cell_width) {
                grid.put_pixel(x_offset + x, y_offset + y, *img.get_pixel(x, y));
            }
        }
    }

    grid
}

/// Save an image as PNG.
pub fn save_png(img: &RgbImage, path: impl AsRef<Path>) -> Result<(), image::ImageError> {
    img.save_with_format(path, image::ImageFormat::Png)
}
