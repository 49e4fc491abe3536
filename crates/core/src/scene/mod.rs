//! Scene graph owned by a single 3D mode.
//!
//! Every GPU resource is allocated through the scene so that
//! [`SceneGraph::dispose`] can release all of them, whatever state the mode
//! was in when it was torn down.

pub mod geometry;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::render::{
    BufferId, BufferUsage, DrawCall, GpuDevice, ProgramId, Rgba, TextureId, Topology, Viewport,
};
use crate::{NormalizedBands, Result};

pub use geometry::Vertex;

/// Per-instance transform and colour.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceRaw {
    pub fn new(model: Mat4, color: Rgba) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

/// Point-cloud element.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointRaw {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
}

/// Uniform block shared by every draw of a frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub light_position: [f32; 4],
    /// rgb + intensity
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
    /// bass, mid, treble, rms in `[0, 1]`
    pub audio: [f32; 4],
    /// time, resolution x, resolution y, mode specific
    pub params: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn new(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            fov_y_degrees,
            aspect,
            near,
            far,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        self.eye = eye;
        self.target = target;
    }

    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, Vec3::Y);
        let proj = Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        );
        proj * view
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient { color: Rgba, intensity: f32 },
    Point { position: Vec3, color: Rgba, intensity: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Mesh,
    Instanced,
    Points,
    FullscreenQuad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: &'static str,
    pub kind: NodeKind,
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    pub vertex_count: u32,
    pub instance_buffer: Option<BufferId>,
    pub instance_count: u32,
    pub textures: Vec<TextureId>,
    pub topology: Topology,
    pub visible: bool,
}

/// Everything allocated on behalf of one scene.
#[derive(Debug, Default)]
struct ResourceLedger {
    buffers: Vec<BufferId>,
    programs: Vec<ProgramId>,
    textures: Vec<TextureId>,
}

impl ResourceLedger {
    fn len(&self) -> usize {
        self.buffers.len() + self.programs.len() + self.textures.len()
    }

    fn release_all(&mut self, gpu: &mut dyn GpuDevice) {
        for buffer in self.buffers.drain(..) {
            gpu.release_buffer(buffer);
        }
        for program in self.programs.drain(..) {
            gpu.release_program(program);
        }
        for texture in self.textures.drain(..) {
            gpu.release_texture(texture);
        }
    }
}

#[derive(Debug)]
pub struct SceneGraph {
    pub camera: PerspectiveCamera,
    pub lights: Vec<Light>,
    nodes: Vec<SceneNode>,
    frame_buffer: BufferId,
    uniforms: FrameUniforms,
    viewport: Viewport,
    resources: ResourceLedger,
}

impl SceneGraph {
    /// Creates an empty scene with its frame uniform buffer.
    pub fn new(gpu: &mut dyn GpuDevice, viewport: Viewport) -> Result<Self> {
        let frame_buffer = gpu.create_buffer(
            "frame-uniforms",
            std::mem::size_of::<FrameUniforms>(),
            BufferUsage::Uniform,
        )?;
        let (width, height) = viewport.physical_size();
        let mut uniforms = FrameUniforms::zeroed();
        uniforms.params = [0.0, width as f32, height as f32, 0.0];

        Ok(Self {
            camera: PerspectiveCamera::new(60.0, viewport.aspect(), 0.1, 200.0),
            lights: Vec::new(),
            nodes: Vec::new(),
            frame_buffer,
            uniforms,
            viewport,
            resources: ResourceLedger {
                buffers: vec![frame_buffer],
                ..Default::default()
            },
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn uniforms(&self) -> &FrameUniforms {
        &self.uniforms
    }

    pub fn frame_buffer(&self) -> BufferId {
        self.frame_buffer
    }

    /// Number of GPU resources currently owned by the scene.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn create_buffer(
        &mut self,
        gpu: &mut dyn GpuDevice,
        label: &str,
        contents: &[u8],
        usage: BufferUsage,
    ) -> Result<BufferId> {
        let buffer = gpu.create_buffer(label, contents.len(), usage)?;
        self.resources.buffers.push(buffer);
        gpu.write_buffer(buffer, 0, contents)?;
        Ok(buffer)
    }

    pub fn create_program(
        &mut self,
        gpu: &mut dyn GpuDevice,
        label: &str,
        source: &str,
    ) -> Result<ProgramId> {
        let program = gpu.create_program(label, source)?;
        self.resources.programs.push(program);
        Ok(program)
    }

    pub fn create_texture(
        &mut self,
        gpu: &mut dyn GpuDevice,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<TextureId> {
        let texture = gpu.create_texture(label, width, height)?;
        self.resources.textures.push(texture);
        Ok(texture)
    }

    /// Releases a texture early, e.g. a render target replaced on resize.
    pub fn release_texture(&mut self, gpu: &mut dyn GpuDevice, texture: TextureId) {
        self.resources.textures.retain(|owned| *owned != texture);
        gpu.release_texture(texture);
    }

    pub fn add_mesh(
        &mut self,
        gpu: &mut dyn GpuDevice,
        name: &'static str,
        program: ProgramId,
        vertices: &[Vertex],
        topology: Topology,
    ) -> Result<NodeId> {
        let vertex_buffer =
            self.create_buffer(gpu, name, bytemuck::cast_slice(vertices), BufferUsage::Vertex)?;
        Ok(self.push_node(SceneNode {
            name,
            kind: NodeKind::Mesh,
            program,
            vertex_buffer,
            vertex_count: vertices.len() as u32,
            instance_buffer: None,
            instance_count: 1,
            textures: Vec::new(),
            topology,
            visible: true,
        }))
    }

    /// Adds one geometry drawn `count` times with per-instance data.
    pub fn add_instanced(
        &mut self,
        gpu: &mut dyn GpuDevice,
        name: &'static str,
        program: ProgramId,
        vertices: &[Vertex],
        count: usize,
    ) -> Result<NodeId> {
        let vertex_buffer =
            self.create_buffer(gpu, name, bytemuck::cast_slice(vertices), BufferUsage::Vertex)?;
        let instances = vec![InstanceRaw::zeroed(); count];
        let instance_buffer = self.create_buffer(
            gpu,
            name,
            bytemuck::cast_slice(&instances),
            BufferUsage::Instance,
        )?;
        Ok(self.push_node(SceneNode {
            name,
            kind: NodeKind::Instanced,
            program,
            vertex_buffer,
            vertex_count: vertices.len() as u32,
            instance_buffer: Some(instance_buffer),
            instance_count: count as u32,
            textures: Vec::new(),
            topology: Topology::Triangles,
            visible: true,
        }))
    }

    pub fn add_points(
        &mut self,
        gpu: &mut dyn GpuDevice,
        name: &'static str,
        program: ProgramId,
        count: usize,
        textures: Vec<TextureId>,
    ) -> Result<NodeId> {
        let sprite = geometry::point_sprite();
        let vertex_buffer =
            self.create_buffer(gpu, name, bytemuck::cast_slice(&sprite), BufferUsage::Vertex)?;
        let points = vec![PointRaw::zeroed(); count];
        let instance_buffer = self.create_buffer(
            gpu,
            name,
            bytemuck::cast_slice(&points),
            BufferUsage::Instance,
        )?;
        Ok(self.push_node(SceneNode {
            name,
            kind: NodeKind::Points,
            program,
            vertex_buffer,
            vertex_count: sprite.len() as u32,
            instance_buffer: Some(instance_buffer),
            instance_count: count as u32,
            textures,
            topology: Topology::Points,
            visible: true,
        }))
    }

    pub fn add_fullscreen_quad(
        &mut self,
        gpu: &mut dyn GpuDevice,
        name: &'static str,
        program: ProgramId,
        textures: Vec<TextureId>,
    ) -> Result<NodeId> {
        let quad = geometry::fullscreen_quad();
        let vertex_buffer =
            self.create_buffer(gpu, name, bytemuck::cast_slice(&quad), BufferUsage::Vertex)?;
        Ok(self.push_node(SceneNode {
            name,
            kind: NodeKind::FullscreenQuad,
            program,
            vertex_buffer,
            vertex_count: quad.len() as u32,
            instance_buffer: None,
            instance_count: 1,
            textures,
            topology: Topology::Triangles,
            visible: true,
        }))
    }

    pub fn write_instances(
        &mut self,
        gpu: &mut dyn GpuDevice,
        node: NodeId,
        instances: &[InstanceRaw],
    ) -> Result<()> {
        self.write_instance_stream(gpu, node, bytemuck::cast_slice(instances))
    }

    pub fn write_points(
        &mut self,
        gpu: &mut dyn GpuDevice,
        node: NodeId,
        points: &[PointRaw],
    ) -> Result<()> {
        self.write_instance_stream(gpu, node, bytemuck::cast_slice(points))
    }

    fn write_instance_stream(
        &mut self,
        gpu: &mut dyn GpuDevice,
        node: NodeId,
        bytes: &[u8],
    ) -> Result<()> {
        let buffer = self
            .node(node)
            .and_then(|node| node.instance_buffer)
            .ok_or(crate::MusicVizError::InvalidInput("node has no instance stream"))?;
        gpu.write_buffer(buffer, 0, bytes)
    }

    /// Applies a new output size: camera projection, device viewport and
    /// the resolution uniform change together.
    pub fn resize(&mut self, gpu: &mut dyn GpuDevice, viewport: Viewport) -> Result<()> {
        let (width, height) = viewport.physical_size();
        gpu.set_viewport(width, height)?;
        self.viewport = viewport;
        self.camera.set_aspect(viewport.aspect());
        self.uniforms.params[1] = width as f32;
        self.uniforms.params[2] = height as f32;
        self.uniforms.view_proj = self.camera.view_proj().to_cols_array_2d();
        gpu.write_buffer(self.frame_buffer, 0, bytemuck::bytes_of(&self.uniforms))
    }

    /// Uploads the frame uniforms and draws every visible node.
    pub fn render(
        &mut self,
        gpu: &mut dyn GpuDevice,
        audio: NormalizedBands,
        time: f32,
        mode_param: f32,
    ) -> Result<()> {
        self.uniforms.view_proj = self.camera.view_proj().to_cols_array_2d();
        self.uniforms.camera_position = self.camera.eye.extend(1.0).to_array();
        self.uniforms.audio = [audio.bass, audio.mid, audio.treble, audio.rms];
        self.uniforms.params[0] = time;
        self.uniforms.params[3] = mode_param;

        for light in &self.lights {
            match *light {
                Light::Ambient { color, intensity } => {
                    self.uniforms.ambient = [color.r, color.g, color.b, intensity];
                }
                Light::Point {
                    position,
                    color,
                    intensity,
                } => {
                    self.uniforms.light_position = position.extend(1.0).to_array();
                    self.uniforms.light_color = [color.r, color.g, color.b, intensity];
                }
            }
        }

        gpu.write_buffer(self.frame_buffer, 0, bytemuck::bytes_of(&self.uniforms))?;

        for node in self.nodes.iter().filter(|node| node.visible) {
            gpu.draw(&DrawCall {
                program: node.program,
                vertex_buffer: node.vertex_buffer,
                vertex_count: node.vertex_count,
                instance_buffer: node.instance_buffer,
                instance_count: node.instance_count,
                uniform_buffers: vec![self.frame_buffer],
                textures: node.textures.clone(),
                topology: node.topology,
            })?;
        }
        Ok(())
    }

    /// Releases every resource the scene allocated.
    pub fn dispose(mut self, gpu: &mut dyn GpuDevice) {
        tracing::debug!(resources = self.resources.len(), "disposing scene");
        self.nodes.clear();
        self.resources.release_all(gpu);
    }

    fn push_node(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessGpu;

    #[test]
    fn dispose_releases_everything() {
        let mut gpu = HeadlessGpu::new(320, 240);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(320, 240)).unwrap();
        let program = scene.create_program(&mut gpu, "lit", "shader").unwrap();
        scene
            .add_instanced(&mut gpu, "gems", program, &geometry::octahedron(1.0), 16)
            .unwrap();
        scene.create_texture(&mut gpu, "sprite", 8, 8).unwrap();
        assert_eq!(gpu.live_resources(), scene.resource_count());

        scene.dispose(&mut gpu);
        assert_eq!(gpu.live_resources(), 0);
    }

    #[test]
    fn render_issues_one_draw_per_visible_node() {
        let mut gpu = HeadlessGpu::new(320, 240);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(320, 240)).unwrap();
        let program = scene.create_program(&mut gpu, "quad", "shader").unwrap();
        let first = scene
            .add_fullscreen_quad(&mut gpu, "a", program, Vec::new())
            .unwrap();
        scene
            .add_fullscreen_quad(&mut gpu, "b", program, Vec::new())
            .unwrap();
        scene.node_mut(first).unwrap().visible = false;

        scene
            .render(&mut gpu, NormalizedBands::default(), 1.0, 0.0)
            .unwrap();
        assert_eq!(gpu.frame_draws().len(), 1);
        scene.dispose(&mut gpu);
    }

    #[test]
    fn resize_updates_resolution_and_viewport_together() {
        let mut gpu = HeadlessGpu::new(320, 240);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(320, 240)).unwrap();
        scene.resize(&mut gpu, Viewport::new(1000, 500)).unwrap();

        assert_eq!(gpu.viewport(), (1000, 500));
        assert_eq!(scene.uniforms().params[1..3], [1000.0, 500.0]);
        let stored: FrameUniforms =
            bytemuck::pod_read_unaligned(gpu.buffer_contents(scene.frame_buffer()).unwrap());
        assert_eq!(stored.params[1..3], [1000.0, 500.0]);
        assert!((scene.camera.aspect - 2.0).abs() < 1e-6);
        scene.dispose(&mut gpu);
    }

    #[test]
    fn instance_writes_must_fit() {
        let mut gpu = HeadlessGpu::new(32, 32);
        let mut scene = SceneGraph::new(&mut gpu, Viewport::new(32, 32)).unwrap();
        let program = scene.create_program(&mut gpu, "lit", "shader").unwrap();
        let node = scene
            .add_instanced(&mut gpu, "gems", program, &geometry::octahedron(1.0), 2)
            .unwrap();
        let instance = InstanceRaw::new(Mat4::IDENTITY, Rgba::WHITE);

        scene.write_instances(&mut gpu, node, &[instance; 2]).unwrap();
        assert!(scene.write_instances(&mut gpu, node, &[instance; 3]).is_err());
        scene.dispose(&mut gpu);
    }
}
