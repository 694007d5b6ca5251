use rand::Rng;
use rand_distr::StandardNormal;
use thiserror::Error;

use crate::simulation::types::{StateChannel, TEXEL_SIZE, WORKGROUP_SIZE};

// Initial layout of a freshly randomized flock
pub const SPAWN_HALF_EXTENT: f32 = 1.0;
pub const VELOCITY_STD_DEV: f32 = 2.8;

// Largest grid edge whose channel (tex_size² texels of 16 bytes) fits the
// 256 MiB buffer limit every wgpu device supports by default.
pub const MAX_TEX_SIZE: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid size must be greater than zero")]
    Empty,

    #[error("grid size {tex_size} is not a multiple of the workgroup size {WORKGROUP_SIZE}")]
    Misaligned { tex_size: u32 },

    #[error("grid size {tex_size} exceeds the largest supported size {limit}")]
    TooLarge { tex_size: u32, limit: u32 },

    #[error("{channel} channel holds {actual} records, expected {expected}")]
    ChannelLength {
        channel: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Host copy of the flock, `tex_size * tex_size` particles in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleGrid {
    tex_size: u32,
    positions: Vec<[f32; 4]>,
    velocities: Vec<[f32; 4]>,
    colors: Vec<[f32; 4]>,
}

impl ParticleGrid {
    /// Allocates a grid with every particle at the origin, at rest and invisible.
    pub fn initialize(tex_size: u32) -> Result<Self, GridError> {
        let count = particle_count(tex_size)?;
        Ok(Self {
            tex_size,
            positions: vec![[0.0, 0.0, 0.0, 1.0]; count],
            velocities: vec![[0.0; 4]; count],
            colors: vec![[0.0; 4]; count],
        })
    }

    pub fn from_channels(
        tex_size: u32,
        positions: Vec<[f32; 4]>,
        velocities: Vec<[f32; 4]>,
        colors: Vec<[f32; 4]>,
    ) -> Result<Self, GridError> {
        let expected = particle_count(tex_size)?;
        for (channel, len) in [
            (StateChannel::Position, positions.len()),
            (StateChannel::Velocity, velocities.len()),
            (StateChannel::Color, colors.len()),
        ] {
            if len != expected {
                return Err(GridError::ChannelLength {
                    channel: channel.label(),
                    expected,
                    actual: len,
                });
            }
        }
        Ok(Self {
            tex_size,
            positions,
            velocities,
            colors,
        })
    }

    /// Scatters the flock through the spawn cube with normally distributed
    /// velocities and a dim blue palette. Alpha starts at 0 so particles
    /// fade in as the simulation runs.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        let h = SPAWN_HALF_EXTENT;
        for p in &mut self.positions {
            *p = [
                rng.gen_range(-h..=h),
                rng.gen_range(-h..=h),
                rng.gen_range(-h..=h),
                1.0,
            ];
        }

        for v in &mut self.velocities {
            let mut normal = || rng.sample::<f32, _>(StandardNormal) * VELOCITY_STD_DEV;
            *v = [normal(), normal(), normal(), 0.0];
        }

        for c in &mut self.colors {
            *c = [
                rng.gen_range(0.0..0.1),
                rng.gen_range(0.0..0.1),
                rng.gen_range(0.5..0.6),
                0.0,
            ];
        }
    }

    pub fn tex_size(&self) -> u32 {
        self.tex_size
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn channel(&self, channel: StateChannel) -> &[[f32; 4]] {
        match channel {
            StateChannel::Position => &self.positions,
            StateChannel::Velocity => &self.velocities,
            StateChannel::Color => &self.colors,
        }
    }

    pub fn channel_mut(&mut self, channel: StateChannel) -> &mut [[f32; 4]] {
        match channel {
            StateChannel::Position => &mut self.positions,
            StateChannel::Velocity => &mut self.velocities,
            StateChannel::Color => &mut self.colors,
        }
    }

    pub fn positions(&self) -> &[[f32; 4]] {
        &self.positions
    }

    pub fn velocities(&self) -> &[[f32; 4]] {
        &self.velocities
    }

    pub fn colors(&self) -> &[[f32; 4]] {
        &self.colors
    }

    pub fn is_finite(&self) -> bool {
        StateChannel::ALL
            .iter()
            .flat_map(|&c| self.channel(c).iter())
            .all(|texel| texel.iter().all(|v| v.is_finite()))
    }

    /// Mean of all particle positions.
    pub fn centroid(&self) -> [f32; 3] {
        let mut sum = [0.0f64; 3];
        for p in &self.positions {
            for axis in 0..3 {
                sum[axis] += p[axis] as f64;
            }
        }
        let n = self.positions.len().max(1) as f64;
        [
            (sum[0] / n) as f32,
            (sum[1] / n) as f32,
            (sum[2] / n) as f32,
        ]
    }

    /// Mean distance of the particles from their centroid.
    pub fn spread(&self) -> f32 {
        let c = self.centroid();
        let total: f64 = self
            .positions
            .iter()
            .map(|p| {
                let d = [p[0] - c[0], p[1] - c[1], p[2] - c[2]];
                ((d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()) as f64
            })
            .sum();
        (total / self.positions.len().max(1) as f64) as f32
    }
}

/// Checks that `tex_size` is a usable grid edge: non-zero, a multiple of the
/// workgroup size and no larger than [`MAX_TEX_SIZE`].
pub fn check_tex_size(tex_size: u32) -> Result<(), GridError> {
    if tex_size == 0 {
        return Err(GridError::Empty);
    }
    if tex_size % WORKGROUP_SIZE != 0 {
        return Err(GridError::Misaligned { tex_size });
    }
    if tex_size > MAX_TEX_SIZE {
        return Err(GridError::TooLarge {
            tex_size,
            limit: MAX_TEX_SIZE,
        });
    }
    Ok(())
}

/// Number of particles in a grid of edge `tex_size`.
pub fn particle_count(tex_size: u32) -> Result<usize, GridError> {
    check_tex_size(tex_size)?;
    (tex_size as usize)
        .checked_mul(tex_size as usize)
        .ok_or(GridError::TooLarge {
            tex_size,
            limit: MAX_TEX_SIZE,
        })
}

/// Size in bytes of one channel of a grid of edge `tex_size`.
pub fn channel_bytes(tex_size: u32) -> u64 {
    u64::from(tex_size) * u64::from(tex_size) * TEXEL_SIZE
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn rejects_zero_and_misaligned_sizes() {
        assert_eq!(ParticleGrid::initialize(0), Err(GridError::Empty));
        assert_eq!(
            ParticleGrid::initialize(24),
            Err(GridError::Misaligned { tex_size: 24 })
        );
    }

    #[test]
    fn rejects_sizes_beyond_the_buffer_limit() {
        assert_eq!(
            ParticleGrid::initialize(65536),
            Err(GridError::TooLarge {
                tex_size: 65536,
                limit: MAX_TEX_SIZE
            })
        );
        assert!(matches!(
            ParticleGrid::initialize(MAX_TEX_SIZE + WORKGROUP_SIZE),
            Err(GridError::TooLarge { .. })
        ));
        assert!(ParticleGrid::from_channels(65536, vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn largest_grid_fits_default_buffer_limit() {
        assert_eq!(particle_count(MAX_TEX_SIZE), Ok(4096 * 4096));
        assert!(channel_bytes(MAX_TEX_SIZE) <= wgpu::Limits::default().max_buffer_size);
        assert!(MAX_TEX_SIZE <= wgpu::Limits::default().max_texture_dimension_2d);
        // no u32 wrap-around for edges past the limit
        assert_eq!(channel_bytes(65536), 65536 * 65536 * 16);
    }

    #[test]
    fn randomize_fills_every_particle() {
        for tex_size in [16, 32, 64] {
            let mut grid = ParticleGrid::initialize(tex_size).unwrap();
            grid.randomize(&mut StdRng::seed_from_u64(7));

            assert_eq!(grid.len(), (tex_size * tex_size) as usize);
            assert!(grid.is_finite());
            for p in grid.positions() {
                assert!(p[..3].iter().all(|v| (-1.0..=1.0).contains(v)));
                assert_eq!(p[3], 1.0);
            }
            assert!(grid.velocities().iter().all(|v| v[3] == 0.0));
        }
    }

    #[test]
    fn randomized_particles_start_invisible() {
        let mut grid = ParticleGrid::initialize(16).unwrap();
        grid.randomize(&mut StdRng::seed_from_u64(1));
        for c in grid.colors() {
            assert_eq!(c[3], 0.0);
            assert!((0.5..0.6).contains(&c[2]));
        }
    }

    #[test]
    fn velocity_spread_matches_distribution() {
        let mut grid = ParticleGrid::initialize(64).unwrap();
        grid.randomize(&mut StdRng::seed_from_u64(3));

        let samples: Vec<f32> = grid.velocities().iter().flat_map(|v| v[..3].to_vec()).collect();
        let n = samples.len() as f32;
        let mean = samples.iter().sum::<f32>() / n;
        let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;

        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - VELOCITY_STD_DEV).abs() < 0.1, "stddev {}", var.sqrt());
    }

    #[test]
    fn same_seed_same_flock() {
        let mut a = ParticleGrid::initialize(16).unwrap();
        let mut b = ParticleGrid::initialize(16).unwrap();
        a.randomize(&mut StdRng::seed_from_u64(42));
        b.randomize(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn from_channels_checks_lengths() {
        let err = ParticleGrid::from_channels(16, vec![[0.0; 4]; 256], vec![[0.0; 4]; 255], vec![[0.0; 4]; 256])
            .unwrap_err();
        assert_eq!(
            err,
            GridError::ChannelLength {
                channel: "velocity",
                expected: 256,
                actual: 255
            }
        );
    }
}
