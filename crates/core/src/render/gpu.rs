//! Graphics device abstraction used by the 3D modes.
//!
//! Resources are plain typed ids; whoever allocates one must release it.
//! [`HeadlessGpu`] keeps every live resource in memory so leaks and
//! use-after-release show up in tests.

use std::collections::HashMap;

use serde::Serialize;

use crate::{MusicVizError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BufferId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProgramId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BufferUsage {
    Vertex,
    Instance,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Topology {
    Triangles,
    Lines,
    Points,
}

/// One draw submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawCall {
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    pub vertex_count: u32,
    pub instance_buffer: Option<BufferId>,
    pub instance_count: u32,
    pub uniform_buffers: Vec<BufferId>,
    pub textures: Vec<TextureId>,
    pub topology: Topology,
}

pub trait GpuDevice {
    fn create_buffer(&mut self, label: &str, size: usize, usage: BufferUsage) -> Result<BufferId>;
    /// Writes `data` at `offset`; grows nothing, so out-of-range writes fail.
    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<()>;
    fn create_program(&mut self, label: &str, source: &str) -> Result<ProgramId>;
    fn create_texture(&mut self, label: &str, width: u32, height: u32) -> Result<TextureId>;
    /// Replaces the RGBA8 contents of a texture.
    fn write_texture(&mut self, texture: TextureId, rgba: &[u8]) -> Result<()>;
    fn release_buffer(&mut self, buffer: BufferId);
    fn release_program(&mut self, program: ProgramId);
    fn release_texture(&mut self, texture: TextureId);
    fn set_viewport(&mut self, width: u32, height: u32) -> Result<()>;
    fn draw(&mut self, call: &DrawCall) -> Result<()>;
}

#[derive(Debug, Clone)]
struct BufferSlot {
    label: String,
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct TextureSlot {
    label: String,
    width: u32,
    height: u32,
    texels: Vec<u8>,
}

/// In-memory device used by headless runs and tests.
#[derive(Debug, Default)]
pub struct HeadlessGpu {
    next_id: u64,
    buffers: HashMap<BufferId, BufferSlot>,
    programs: HashMap<ProgramId, String>,
    textures: HashMap<TextureId, TextureSlot>,
    viewport: (u32, u32),
    draws_this_frame: Vec<DrawCall>,
    total_draws: u64,
    lost: bool,
}

impl HeadlessGpu {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: (width, height),
            ..Default::default()
        }
    }

    /// Simulates a context loss; every following call fails.
    pub fn lose_context(&mut self) {
        self.lost = true;
    }

    pub fn restore_context(&mut self) {
        self.lost = false;
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_resources(&self) -> usize {
        self.live_buffers() + self.live_programs() + self.live_textures()
    }

    pub fn total_draws(&self) -> u64 {
        self.total_draws
    }

    /// Draw calls recorded since the last [`HeadlessGpu::begin_frame`].
    pub fn frame_draws(&self) -> &[DrawCall] {
        &self.draws_this_frame
    }

    pub fn begin_frame(&mut self) {
        self.draws_this_frame.clear();
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|slot| slot.data.as_slice())
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures
            .get(&texture)
            .map(|slot| (slot.width, slot.height))
    }

    /// Labels of every resource still alive, for leak reports.
    pub fn live_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .buffers
            .values()
            .map(|slot| format!("buffer:{}:{:?}", slot.label, slot.usage))
            .chain(self.programs.values().map(|label| format!("program:{label}")))
            .chain(
                self.textures
                    .values()
                    .map(|slot| format!("texture:{}", slot.label)),
            )
            .collect();
        labels.sort();
        labels
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.lost {
            Err(MusicVizError::SurfaceLost)
        } else {
            Ok(())
        }
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuDevice for HeadlessGpu {
    fn create_buffer(&mut self, label: &str, size: usize, usage: BufferUsage) -> Result<BufferId> {
        self.ensure_alive()?;
        let id = BufferId(self.allocate_id());
        self.buffers.insert(
            id,
            BufferSlot {
                label: label.to_string(),
                usage,
                data: vec![0; size],
            },
        );
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<()> {
        self.ensure_alive()?;
        let slot = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| MusicVizError::UnknownResource(format!("{buffer:?}")))?;
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= slot.data.len())
            .ok_or(MusicVizError::InvalidInput("buffer write out of range"))?;
        slot.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn create_program(&mut self, label: &str, source: &str) -> Result<ProgramId> {
        self.ensure_alive()?;
        if source.trim().is_empty() {
            return Err(MusicVizError::InvalidInput("empty shader source"));
        }
        let id = ProgramId(self.allocate_id());
        self.programs.insert(id, label.to_string());
        Ok(id)
    }

    fn create_texture(&mut self, label: &str, width: u32, height: u32) -> Result<TextureId> {
        self.ensure_alive()?;
        let id = TextureId(self.allocate_id());
        self.textures.insert(
            id,
            TextureSlot {
                label: label.to_string(),
                width: width.max(1),
                height: height.max(1),
                texels: vec![0; width.max(1) as usize * height.max(1) as usize * 4],
            },
        );
        Ok(id)
    }

    fn write_texture(&mut self, texture: TextureId, rgba: &[u8]) -> Result<()> {
        self.ensure_alive()?;
        let slot = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| MusicVizError::UnknownResource(format!("{texture:?}")))?;
        if rgba.len() != slot.texels.len() {
            return Err(MusicVizError::InvalidInput("texture data size mismatch"));
        }
        slot.texels.copy_from_slice(rgba);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn release_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn set_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        self.ensure_alive()?;
        self.viewport = (width.max(1), height.max(1));
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> Result<()> {
        self.ensure_alive()?;
        if !self.programs.contains_key(&call.program) {
            return Err(MusicVizError::UnknownResource(format!("{:?}", call.program)));
        }
        let buffers = std::iter::once(call.vertex_buffer)
            .chain(call.instance_buffer)
            .chain(call.uniform_buffers.iter().copied());
        for buffer in buffers {
            if !self.buffers.contains_key(&buffer) {
                return Err(MusicVizError::UnknownResource(format!("{buffer:?}")));
            }
        }
        if let Some(texture) = call.textures.iter().find(|t| !self.textures.contains_key(*t)) {
            return Err(MusicVizError::UnknownResource(format!("{texture:?}")));
        }

        self.draws_this_frame.push(call.clone());
        self.total_draws += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_and_releases_resources() {
        let mut gpu = HeadlessGpu::new(64, 64);
        let buffer = gpu.create_buffer("verts", 16, BufferUsage::Vertex).unwrap();
        let program = gpu.create_program("flat", "fn main() {}").unwrap();
        let texture = gpu.create_texture("sprite", 2, 2).unwrap();
        assert_eq!(gpu.live_resources(), 3);

        gpu.release_buffer(buffer);
        gpu.release_program(program);
        gpu.release_texture(texture);
        assert_eq!(gpu.live_resources(), 0);
    }

    #[test]
    fn writes_after_release_fail() {
        let mut gpu = HeadlessGpu::new(64, 64);
        let buffer = gpu.create_buffer("u", 8, BufferUsage::Uniform).unwrap();
        gpu.write_buffer(buffer, 0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&gpu.buffer_contents(buffer).unwrap()[..4], &[1, 2, 3, 4]);

        assert!(gpu.write_buffer(buffer, 6, &[0; 4]).is_err());
        gpu.release_buffer(buffer);
        assert!(matches!(
            gpu.write_buffer(buffer, 0, &[0]),
            Err(MusicVizError::UnknownResource(_))
        ));
    }

    #[test]
    fn lost_context_fails_closed() {
        let mut gpu = HeadlessGpu::new(64, 64);
        gpu.lose_context();
        assert!(matches!(
            gpu.create_buffer("x", 4, BufferUsage::Vertex),
            Err(MusicVizError::SurfaceLost)
        ));
        gpu.restore_context();
        assert!(gpu.create_buffer("x", 4, BufferUsage::Vertex).is_ok());
    }

    #[test]
    fn draw_validates_handles() {
        let mut gpu = HeadlessGpu::new(64, 64);
        let program = gpu.create_program("p", "src").unwrap();
        let vertices = gpu.create_buffer("v", 12, BufferUsage::Vertex).unwrap();
        let call = DrawCall {
            program,
            vertex_buffer: vertices,
            vertex_count: 3,
            instance_buffer: None,
            instance_count: 1,
            uniform_buffers: vec![BufferId(999)],
            textures: Vec::new(),
            topology: Topology::Triangles,
        };
        assert!(gpu.draw(&call).is_err());

        let call = DrawCall {
            uniform_buffers: Vec::new(),
            ..call
        };
        gpu.draw(&call).unwrap();
        assert_eq!(gpu.frame_draws().len(), 1);
    }
}
