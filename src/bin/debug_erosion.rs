//! Debug tool for comparing erosion presets visually
//! Erodes one base terrain with every preset and writes two comparison sheets:
//! shaded relief and the erosion/deposition delta.

use rayon::prelude::*;

use terrain_erosion::erosion::{ErosionConfig, ErosionPreset, ErosionStats, HydraulicErosion};
use terrain_erosion::export;
use terrain_erosion::heightmap::{self, TerrainParams};
use terrain_erosion::tilemap::Tilemap;

const SIZE: usize = 256;
const SEED: u64 = 42;

fn main() {
    println!("Generating erosion comparison grid...");

    let base = heightmap::generate_noise_terrain(SIZE, SEED, &TerrainParams::default());

    // Each preset erodes its own copy, so variants can run side by side
    let results: Vec<(ErosionPreset, Tilemap<f32>, ErosionStats)> = ErosionPreset::all()
        .par_iter()
        .map(|&preset| {
            let (config, iterations) = ErosionConfig::from_preset(preset);
            let mut hm = base.clone();
            let stats = HydraulicErosion::new(SIZE, config)
                .with_iterations(iterations)
                .with_seed(SEED)
                .apply(&mut hm)
                .expect("preset configs are valid");
            (preset, hm, stats)
        })
        .collect();

    let mut relief = vec![export::render_shaded_heightmap(&base)];
    let mut deltas = Vec::new();

    println!("  0. base terrain");
    for (i, (preset, hm, stats)) in results.iter().enumerate() {
        println!(
            "  {}. {:<10} {:<38} eroded {:>10.1}  deposited {:>10.1}  steps {:>9}",
            i + 1,
            preset.to_string(),
            preset.description(),
            stats.total_eroded,
            stats.total_deposited,
            stats.steps_taken
        );
        relief.push(export::render_shaded_heightmap(hm));
        if let Some(delta) = export::render_erosion_delta(&base, hm) {
            deltas.push(delta);
        }
    }

    export::save_png(&export::create_grid(&relief, 3, 4), "erosion_comparison.png")
        .expect("Failed to save relief grid");
    export::save_png(&export::create_grid(&deltas, 2, 4), "erosion_delta.png")
        .expect("Failed to save delta grid");

    println!("Saved erosion_comparison.png and erosion_delta.png");
}
