//! Host-side reference of the flocking step in `shader/flocking.wgsl`.
//!
//! Both sides apply the same rules in the same order so a GPU step can be
//! checked against this one texel for texel (within float tolerance).

use glam::Vec3;

use crate::simulation::grid::ParticleGrid;
use crate::simulation::params::{BoundaryPolicy, SimulationParameters};
use crate::simulation::types::StateChannel;

/// Advances `current` by one time step into a freshly allocated grid.
///
/// Every particle scans every other particle; the input is never modified,
/// so each particle sees the same snapshot regardless of iteration order.
pub fn step(current: &ParticleGrid, params: &SimulationParameters) -> ParticleGrid {
    let mut next = current.clone();
    step_into(current, params, &mut next);
    next
}

/// Same as [`step`], writing into an existing grid of the same size.
pub fn step_into(current: &ParticleGrid, params: &SimulationParameters, next: &mut ParticleGrid) {
    debug_assert_eq!(current.tex_size(), next.tex_size());

    let positions: Vec<Vec3> = current.positions().iter().map(|p| xyz(*p)).collect();
    let velocities: Vec<Vec3> = current.velocities().iter().map(|v| xyz(*v)).collect();
    let colors = current.colors();

    let mut new_positions = Vec::with_capacity(positions.len());
    let mut new_velocities = Vec::with_capacity(positions.len());
    let mut new_colors = Vec::with_capacity(positions.len());

    for i in 0..positions.len() {
        let forces = accumulate_forces(i, &positions, &velocities, params);
        let velocity = integrate_velocity(velocities[i], forces, params);
        let position = apply_boundary(positions[i] + velocity * params.time_step, params);

        new_positions.push([position.x, position.y, position.z, 1.0]);
        new_velocities.push([velocity.x, velocity.y, velocity.z, 0.0]);
        new_colors.push(fade_in(colors[i], params));
    }

    next.channel_mut(StateChannel::Position).copy_from_slice(&new_positions);
    next.channel_mut(StateChannel::Velocity).copy_from_slice(&new_velocities);
    next.channel_mut(StateChannel::Color).copy_from_slice(&new_colors);
}

/// Steering contributions acting on one particle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Forces {
    pub cohesion: Vec3,
    pub alignment: Vec3,
    pub separation: Vec3,
    pub neighbors: u32,
}

pub fn accumulate_forces(
    index: usize,
    positions: &[Vec3],
    velocities: &[Vec3],
    params: &SimulationParameters,
) -> Forces {
    let p = positions[index];
    let mut separation = Vec3::ZERO;
    let mut velocity_sum = Vec3::ZERO;
    let mut position_sum = Vec3::ZERO;
    let mut neighbors = 0u32;

    for (j, (&q, &vq)) in positions.iter().zip(velocities).enumerate() {
        if j == index {
            continue;
        }
        let offset = p - q;
        let dist = offset.length();

        if dist < params.collision_radius {
            let clamped = dist.max(params.min_distance);
            separation += offset / (clamped * clamped);
        }
        if dist < params.neighbor_radius {
            velocity_sum += vq;
            position_sum += q;
            neighbors += 1;
        }
    }

    if neighbors == 0 {
        return Forces {
            separation,
            ..Default::default()
        };
    }

    let n = neighbors as f32;
    Forces {
        cohesion: position_sum / n - p,
        alignment: velocity_sum / n - velocities[index],
        separation,
        neighbors,
    }
}

pub fn integrate_velocity(velocity: Vec3, forces: Forces, params: &SimulationParameters) -> Vec3 {
    let steering = forces.cohesion * params.cohesion
        + forces.alignment * params.alignment
        + forces.separation;
    clamp_speed(velocity + steering * params.time_step, params.max_speed)
}

pub fn clamp_speed(velocity: Vec3, max_speed: f32) -> Vec3 {
    let speed = velocity.length();
    if speed > max_speed {
        velocity * (max_speed / speed)
    } else {
        velocity
    }
}

pub fn apply_boundary(position: Vec3, params: &SimulationParameters) -> Vec3 {
    match params.boundary {
        BoundaryPolicy::Unbounded => position,
        BoundaryPolicy::Wrap => {
            let h = params.domain_half_extent;
            let wrap = |x: f32| {
                if x < -h || x >= h {
                    x - 2.0 * h * ((x + h) / (2.0 * h)).floor()
                } else {
                    x
                }
            };
            Vec3::new(wrap(position.x), wrap(position.y), wrap(position.z))
        }
    }
}

/// Colors keep their hue and gain opacity over time.
pub fn fade_in(color: [f32; 4], params: &SimulationParameters) -> [f32; 4] {
    let alpha = (color[3] + params.fade_in_rate * params.time_step).min(1.0);
    [color[0], color[1], color[2], alpha]
}

fn xyz(v: [f32; 4]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const TEX: u32 = 16;

    // Particles on a lattice far wider than any interaction radius
    fn isolated_grid() -> ParticleGrid {
        let n = (TEX * TEX) as usize;
        let positions = (0..n)
            .map(|i| {
                let x = (i % TEX as usize) as f32 * 5.0 - 40.0;
                let y = (i / TEX as usize) as f32 * 5.0 - 40.0;
                [x, y, 0.0, 1.0]
            })
            .collect();
        let velocities = (0..n).map(|i| [0.1 * (i % 7) as f32, -0.2, 0.05, 0.0]).collect();
        let colors = vec![[0.05, 0.05, 0.55, 0.0]; n];
        ParticleGrid::from_channels(TEX, positions, velocities, colors).unwrap()
    }

    fn unbounded() -> SimulationParameters {
        SimulationParameters {
            boundary: BoundaryPolicy::Unbounded,
            ..Default::default()
        }
    }

    #[test]
    fn zero_time_step_keeps_positions() {
        let mut grid = ParticleGrid::initialize(TEX).unwrap();
        grid.randomize(&mut StdRng::seed_from_u64(11));
        let params = SimulationParameters {
            time_step: 0.0,
            ..Default::default()
        };

        let next = step(&grid, &params);

        for (a, b) in grid.positions().iter().zip(next.positions()) {
            for axis in 0..3 {
                assert!((a[axis] - b[axis]).abs() < 1e-6);
            }
        }
        // no time passed, so nothing faded in either
        assert_eq!(grid.colors(), next.colors());
        // velocities are still clamped even without time passing
        for v in next.velocities() {
            assert!(xyz(*v).length() <= params.max_speed + 1e-4);
        }
    }

    #[test]
    fn isolated_particles_keep_velocity() {
        let grid = isolated_grid();
        let next = step(&grid, &unbounded());
        assert_eq!(grid.velocities(), next.velocities());
    }

    #[test]
    fn isolated_particles_drift_by_velocity() {
        let grid = isolated_grid();
        let params = unbounded();
        let next = step(&grid, &params);
        for (i, p) in next.positions().iter().enumerate() {
            let expected = xyz(grid.positions()[i]) + xyz(grid.velocities()[i]) * params.time_step;
            assert!((xyz(*p) - expected).length() < 1e-5);
        }
    }

    #[test]
    fn close_pair_repels_symmetrically() {
        let params = SimulationParameters {
            cohesion: 0.0,
            alignment: 0.0,
            ..unbounded()
        };
        let mut grid = isolated_grid();
        let gap = params.collision_radius - 1e-3;
        for v in grid.channel_mut(StateChannel::Velocity) {
            *v = [0.0; 4];
        }
        let positions = grid.channel_mut(StateChannel::Position);
        positions[0] = [100.0, 100.0, 100.0, 1.0];
        positions[1] = [100.0 + gap, 100.0, 100.0, 1.0];

        let next = step(&grid, &params);
        let v0 = xyz(next.velocities()[0]);
        let v1 = xyz(next.velocities()[1]);

        assert!(v0.x < 0.0, "first particle pushed away: {v0}");
        assert!(v1.x > 0.0, "second particle pushed away: {v1}");
        assert!((v0 + v1).length() < 1e-5);
        assert!((v0.length() - v1.length()).abs() < 1e-5);
    }

    #[test]
    fn coincident_particles_stay_finite() {
        let mut grid = isolated_grid();
        let positions = grid.channel_mut(StateChannel::Position);
        positions[0] = [100.0, 0.0, 0.0, 1.0];
        positions[1] = [100.0, 0.0, 0.0, 1.0];
        let next = step(&grid, &SimulationParameters::default());
        assert!(next.is_finite());
    }

    #[test]
    fn speed_is_clamped() {
        let mut grid = isolated_grid();
        grid.channel_mut(StateChannel::Velocity)[3] = [300.0, 400.0, 0.0, 0.0];
        let params = unbounded();
        let next = step(&grid, &params);
        let v = xyz(next.velocities()[3]);
        assert!((v.length() - params.max_speed).abs() < 1e-4);
        assert!((v.normalize() - Vec3::new(0.6, 0.8, 0.0)).length() < 1e-5);
    }

    #[test]
    fn cohesion_pulls_toward_neighbor_centroid() {
        let positions = vec![Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.5, 0.4, 0.0)];
        let velocities = vec![Vec3::ZERO; 3];
        let forces = accumulate_forces(0, &positions, &velocities, &SimulationParameters::default());
        assert_eq!(forces.neighbors, 2);
        assert!((forces.cohesion - Vec3::new(0.5, 0.2, 0.0)).length() < 1e-6);
        assert_eq!(forces.separation, Vec3::ZERO);
    }

    #[test]
    fn alignment_matches_neighbor_velocity() {
        let positions = vec![Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0)];
        let velocities = vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)];
        let forces = accumulate_forces(0, &positions, &velocities, &SimulationParameters::default());
        assert!((forces.alignment - Vec3::new(-1.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn wrap_keeps_particles_in_domain() {
        let params = SimulationParameters::default();
        let h = params.domain_half_extent;
        let wrapped = apply_boundary(Vec3::new(h + 1.0, -h - 2.0, 3.0), &params);
        assert!((wrapped - Vec3::new(-h + 1.0, h - 2.0, 3.0)).length() < 1e-4);
    }

    #[test]
    fn alpha_fades_in_and_saturates() {
        let params = SimulationParameters::default();
        let faded = fade_in([0.1, 0.1, 0.5, 0.0], &params);
        assert!((faded[3] - params.fade_in_rate * params.time_step).abs() < 1e-7);
        assert_eq!(faded[..3], [0.1, 0.1, 0.5]);
        assert_eq!(fade_in([0.1, 0.1, 0.5, 0.999], &params)[3], 1.0);
    }
}
