//! WGSL programs for the scene modes. Each program is prefixed with the
//! shared frame uniform block.

pub const LIT_INSTANCED: &str = concat!(
    include_str!("shaders/frame.wgsl"),
    include_str!("shaders/lit_instanced.wgsl"),
);

pub const POINT_SPRITES: &str = concat!(
    include_str!("shaders/frame.wgsl"),
    include_str!("shaders/points.wgsl"),
);

pub const PLASMA: &str = concat!(
    include_str!("shaders/frame.wgsl"),
    include_str!("shaders/fullscreen.wgsl"),
    include_str!("shaders/plasma.wgsl"),
);

pub const MANDELBULB: &str = concat!(
    include_str!("shaders/frame.wgsl"),
    include_str!("shaders/fullscreen.wgsl"),
    include_str!("shaders/mandelbulb.wgsl"),
);

pub const FLUX_BLOOM: &str = concat!(
    include_str!("shaders/frame.wgsl"),
    include_str!("shaders/fullscreen.wgsl"),
    include_str!("shaders/flux_bloom.wgsl"),
);
