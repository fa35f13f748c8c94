//! Profiling tool to measure erosion throughput across grid sizes

use std::time::Instant;

use terrain_erosion::erosion::{ErosionConfig, HydraulicErosion};
use terrain_erosion::heightmap::{self, TerrainParams};
use terrain_erosion::worker::{ErosionRequest, ErosionWorker};

fn main() {
    let seed = 1337u64;
    let iterations = 50_000;
    let config = ErosionConfig::default();

    println!("=== Erosion Profiling ===");
    println!("Droplets per run: {}", iterations);
    println!(
        "Radius {}, lifetime {}, inertia {}",
        config.erosion_radius, config.max_droplet_lifetime, config.inertia
    );
    println!();

    for &size in &[64usize, 128, 256, 512] {
        let start = Instant::now();
        let base = heightmap::generate_noise_terrain(size, seed, &TerrainParams::default());
        let terrain_time = start.elapsed();

        let mut hm = base.clone();
        let start = Instant::now();
        let stats = HydraulicErosion::new(size, config.clone())
            .with_iterations(iterations)
            .with_seed(seed)
            .apply(&mut hm)
            .expect("default config is valid");
        let erosion_time = start.elapsed();

        let steps_per_sec = stats.steps_taken as f64 / erosion_time.as_secs_f64().max(1e-9);
        println!("{}x{}:", size, size);
        println!("  Terrain generation: {:?}", terrain_time);
        println!("  Erosion:            {:?} ({:.0} steps/s)", erosion_time, steps_per_sec);
        println!(
            "  Terminations: {} off-grid, {} stalled, {} evaporated, {} lifetime",
            stats.terminations.out_of_bounds,
            stats.terminations.stalled,
            stats.terminations.evaporated,
            stats.terminations.lifetime_exceeded
        );

        // Same run through the worker, including keyed-map encode/decode
        let request = ErosionRequest {
            iterations: Some(iterations),
            seed: Some(seed),
            ..ErosionRequest::new(heightmap::to_grid_map(&base), size)
        };
        let mut worker = ErosionWorker::spawn().expect("Failed to spawn worker");
        let start = Instant::now();
        let response = worker.run_blocking(request).expect("Worker disconnected");
        let worker_time = start.elapsed();
        worker.shutdown().expect("Worker panicked");

        println!(
            "  Worker round trip:  {:?} (overhead {:?}, success: {})",
            worker_time,
            worker_time.saturating_sub(erosion_time),
            response.is_success()
        );
        println!();
    }
}
