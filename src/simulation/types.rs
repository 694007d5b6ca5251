use bytemuck::{Pod, Zeroable};

// Edge of the square compute workgroup. A grid edge must be a multiple of it,
// which also keeps texture rows (16 texels * 16 bytes) on the 256-byte copy
// alignment the transfer stage needs.
pub const WORKGROUP_SIZE: u32 = 16;

// One RGBA32F texel / vertex record
pub const TEXEL_SIZE: u64 = 4 * std::mem::size_of::<f32>() as u64;

/// The three per-particle state channels, each stored in its own texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChannel {
    Position,
    Velocity,
    Color,
}

impl StateChannel {
    pub const ALL: [StateChannel; 3] = [
        StateChannel::Position,
        StateChannel::Velocity,
        StateChannel::Color,
    ];

    pub fn index(self) -> usize {
        match self {
            StateChannel::Position => 0,
            StateChannel::Velocity => 1,
            StateChannel::Color => 2,
        }
    }

    /// Binding of the sampled (read) texture in the compute shader.
    pub fn input_binding(self) -> u32 {
        self.index() as u32
    }

    /// Binding of the storage (write) texture in the compute shader.
    pub fn output_binding(self) -> u32 {
        3 + self.index() as u32
    }

    pub fn label(self) -> &'static str {
        match self {
            StateChannel::Position => "position",
            StateChannel::Velocity => "velocity",
            StateChannel::Color => "color",
        }
    }
}

// Binding of the parameter block, right after the six state textures
pub const PARAMS_BINDING: u32 = 6;

/// Parameter block of `shader/flocking.wgsl`, field for field.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FlockingUniforms {
    pub time_step: f32,
    pub cohesion: f32,
    pub alignment: f32,
    pub neighbor_radius: f32,
    pub collision_radius: f32,
    pub max_speed: f32,
    pub min_distance: f32,
    pub fade_in_rate: f32,
    pub domain_half_extent: f32,
    pub boundary_mode: u32, // 0 = unbounded, 1 = wrap
    pub tex_size: u32,
    pub _padding: u32,
}

const _: () = assert!(std::mem::size_of::<FlockingUniforms>() == 48);
