//! Draw-data transport between a widget layer and the renderer.
//! The widget layer fills these each frame; a backend records them into the
//! frame's command buffer.

use std::any::Any;

/// Texture referenced by a draw command. Zero is the font atlas by
/// convention.
pub type TextureId = u64;

/// One GUI vertex: position and UV in points, packed RGBA color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawVert {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: u32,
}

/// One draw call: a clipped, textured range of the list's index buffer.
#[derive(Clone, Copy, Debug)]
pub struct DrawCommand {
    /// Scissor rectangle (min x, min y, max x, max y) in framebuffer pixels.
    pub clip_rect: [f32; 4],
    pub texture: TextureId,
    /// First index of this command within the list.
    pub index_offset: u32,
    pub index_count: u32,
}

/// Vertex and index data plus the commands that consume it.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    pub vertices: Vec<DrawVert>,
    pub indices: Vec<u32>,
    pub commands: Vec<DrawCommand>,
}

/// Everything one frame draws, in submission order.
#[derive(Clone, Debug)]
pub struct DrawData {
    /// Layout size in points.
    pub display_size: [f32; 2],
    /// Pixels per point.
    pub framebuffer_scale: f32,
    pub lists: Vec<DrawList>,
}

impl Default for DrawData {
    fn default() -> Self {
        Self {
            display_size: [0.0, 0.0],
            framebuffer_scale: 1.0,
            lists: Vec::new(),
        }
    }
}

impl DrawData {
    /// True when the layout area is empty and there is nothing to rasterize.
    pub fn is_degenerate(&self) -> bool {
        self.display_size[0] <= 0.0 || self.display_size[1] <= 0.0
    }

    pub fn total_vertices(&self) -> usize {
        self.lists.iter().map(|l| l.vertices.len()).sum()
    }

    pub fn total_indices(&self) -> usize {
        self.lists.iter().map(|l| l.indices.len()).sum()
    }
}

/// Consumer of a frame's draw data. `cmd` is the backend's active command
/// buffer; a Vulkan widget renderer downcasts it to its own buffer type.
pub trait DrawBackend: Send + std::fmt::Debug {
    fn record_draw_data(&mut self, draw: &DrawData, cmd: &dyn Any) -> Result<(), String>;
}

/// Backend that records nothing. Windows using it present the clear color
/// only.
#[derive(Debug, Default)]
pub struct NullDrawBackend;

impl DrawBackend for NullDrawBackend {
    fn record_draw_data(&mut self, _draw: &DrawData, _cmd: &dyn Any) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_packed() {
        assert_eq!(std::mem::size_of::<DrawVert>(), 20);
    }

    #[test]
    fn degenerate_draw_data() {
        let mut draw = DrawData::default();
        assert!(draw.is_degenerate());
        draw.display_size = [800.0, 0.0];
        assert!(draw.is_degenerate());
        draw.display_size = [800.0, 600.0];
        assert!(!draw.is_degenerate());
    }

    #[test]
    fn totals_sum_across_lists() {
        let list = DrawList {
            vertices: vec![DrawVert::default(); 4],
            indices: vec![0, 1, 2, 2, 3, 0],
            commands: Vec::new(),
        };
        let draw = DrawData {
            display_size: [100.0, 100.0],
            framebuffer_scale: 1.0,
            lists: vec![list.clone(), list],
        };
        assert_eq!(draw.total_vertices(), 8);
        assert_eq!(draw.total_indices(), 12);
    }
}
