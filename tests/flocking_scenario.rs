use gpu_flocking::simulation::flocking;
use gpu_flocking::simulation::{ParticleGrid, SimulationParameters};
use rand::SeedableRng;
use rand::rngs::StdRng;

const SEED: u64 = 0x5eed_f10c;
const STEPS: usize = 100;

fn run(tex_size: u32, cohesion: f32) -> (ParticleGrid, ParticleGrid) {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut grid = ParticleGrid::initialize(tex_size).unwrap();
    grid.randomize(&mut rng);
    let initial = grid.clone();

    let params = SimulationParameters {
        cohesion,
        ..SimulationParameters::default()
    };
    let mut next = grid.clone();
    for _ in 0..STEPS {
        flocking::step_into(&grid, &params, &mut next);
        std::mem::swap(&mut grid, &mut next);
    }
    (initial, grid)
}

fn assert_cohesion_tightens(tex_size: u32) {
    let (initial, cohesive) = run(tex_size, 1000.0);
    let (_, loose) = run(tex_size, 0.0);

    assert!(cohesive.is_finite());
    assert!(loose.is_finite());
    assert_eq!(cohesive.len(), (tex_size * tex_size) as usize);

    let tight = cohesive.spread();
    let baseline = loose.spread();
    println!(
        "{tex_size}x{tex_size}: initial spread {:.3}, cohesion 1000 -> {tight:.3}, cohesion 0 -> {baseline:.3}",
        initial.spread()
    );
    assert!(
        tight < baseline,
        "cohesive flock ({tight}) is not tighter than the baseline ({baseline})"
    );
}

// The full 64x64 flock runs on the GPU in gpu_headless.rs
#[test]
fn cohesion_tightens_small_flock() {
    assert_cohesion_tightens(16);
}

#[test]
fn colors_fade_in_over_the_run() {
    let (initial, grid) = run(16, 1000.0);
    for (before, after) in initial.colors().iter().zip(grid.colors()) {
        assert_eq!(before[3], 0.0);
        // 100 steps * 0.01 * 0.5
        assert!((after[3] - 0.5).abs() < 1e-4);
        assert_eq!(&before[..3], &after[..3]);
    }
}
