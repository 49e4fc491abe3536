use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Straight (non premultiplied) colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Hue in degrees (any value, wrapped), saturation and lightness in
    /// `[0, 1]`.
    pub fn hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 360.0;
        let s = saturation.clamp(0.0, 1.0);
        let l = lightness.clamp(0.0, 1.0);
        if s == 0.0 {
            return Self::rgb(l, l, l);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        Self::rgb(
            hue_channel(p, q, h + 1.0 / 3.0),
            hue_channel(p, q, h),
            hue_channel(p, q, h - 1.0 / 3.0),
        )
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: alpha.clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

fn hue_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f32,
}

impl Stroke {
    pub fn new(color: Rgba, width: f32) -> Self {
        Self { color, width }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    SourceOver,
    /// Additive glow.
    Lighter,
}

/// How a 2D mode gets rid of the previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClearPolicy {
    /// Crisp redraw.
    Full,
    /// Low-opacity black overlay that leaves motion trails.
    Fade { alpha: f32 },
}

/// Immediate-mode 2D drawing surface.
pub trait Canvas {
    fn size(&self) -> Vec2;
    fn resize(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Rgba);
    fn stroke_line(&mut self, from: Vec2, to: Vec2, stroke: Stroke);
    fn stroke_path(&mut self, points: &[Vec2], closed: bool, stroke: Stroke);
    fn fill_path(&mut self, points: &[Vec2], color: Rgba);
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba);
    fn stroke_circle(&mut self, center: Vec2, radius: f32, stroke: Stroke);
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, offset: Vec2);
    fn rotate(&mut self, radians: f32);
    fn set_blend(&mut self, mode: BlendMode);

    /// Applies a mode's clear policy over the whole surface.
    fn apply_clear(&mut self, policy: ClearPolicy) {
        match policy {
            ClearPolicy::Full => self.clear(),
            ClearPolicy::Fade { alpha } => {
                let size = self.size();
                self.fill_rect(Vec2::ZERO, size, Rgba::BLACK.with_alpha(alpha));
            }
        }
    }
}

/// Recorded canvas operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear,
    FillRect { origin: Vec2, size: Vec2, color: Rgba },
    Line { from: Vec2, to: Vec2, stroke: Stroke },
    Path { points: Vec<Vec2>, closed: bool, stroke: Stroke },
    FillPath { points: Vec<Vec2>, color: Rgba },
    FillCircle { center: Vec2, radius: f32, color: Rgba },
    StrokeCircle { center: Vec2, radius: f32, stroke: Stroke },
    Save,
    Restore,
    Translate { offset: Vec2 },
    Rotate { radians: f32 },
    Blend { mode: BlendMode },
}

/// Canvas that records one frame of commands instead of rasterising.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayList {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
    #[serde(skip)]
    depth: usize,
}

impl DisplayList {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
            depth: 0,
        }
    }

    /// Drops the commands of the previous frame.
    pub fn begin_frame(&mut self) {
        self.commands.clear();
        self.depth = 0;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Current save/restore nesting.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn count(&self, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|command| predicate(command)).count()
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Canvas for DisplayList {
    fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Rgba) {
        self.commands.push(DrawCommand::FillRect {
            origin,
            size,
            color,
        });
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, stroke: Stroke) {
        self.commands.push(DrawCommand::Line { from, to, stroke });
    }

    fn stroke_path(&mut self, points: &[Vec2], closed: bool, stroke: Stroke) {
        if points.len() < 2 {
            return;
        }
        self.commands.push(DrawCommand::Path {
            points: points.to_vec(),
            closed,
            stroke,
        });
    }

    fn fill_path(&mut self, points: &[Vec2], color: Rgba) {
        if points.len() < 3 {
            return;
        }
        self.commands.push(DrawCommand::FillPath {
            points: points.to_vec(),
            color,
        });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius: radius.max(0.0),
            color,
        });
    }

    fn stroke_circle(&mut self, center: Vec2, radius: f32, stroke: Stroke) {
        self.commands.push(DrawCommand::StrokeCircle {
            center,
            radius: radius.max(0.0),
            stroke,
        });
    }

    fn save(&mut self) {
        self.depth += 1;
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        // Unbalanced restores are ignored, as on a browser canvas.
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        self.commands.push(DrawCommand::Restore);
    }

    fn translate(&mut self, offset: Vec2) {
        self.commands.push(DrawCommand::Translate { offset });
    }

    fn rotate(&mut self, radians: f32) {
        self.commands.push(DrawCommand::Rotate { radians });
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.commands.push(DrawCommand::Blend { mode });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsl_primaries() {
        let red = Rgba::hsl(0.0, 1.0, 0.5);
        assert!((red.r - 1.0).abs() < 1e-5 && red.g.abs() < 1e-5 && red.b.abs() < 1e-5);
        let blue = Rgba::hsl(600.0, 1.0, 0.5);
        assert!(blue.b > 0.99 && blue.r < 1e-4);
        assert_eq!(Rgba::hsl(42.0, 0.0, 0.25), Rgba::rgb(0.25, 0.25, 0.25));
    }

    #[test]
    fn fade_policy_overlays_instead_of_clearing() {
        let mut canvas = DisplayList::new(100, 50);
        canvas.apply_clear(ClearPolicy::Fade { alpha: 0.2 });

        match &canvas.commands()[0] {
            DrawCommand::FillRect { size, color, .. } => {
                assert_eq!(*size, Vec2::new(100.0, 50.0));
                assert_eq!(color.a, 0.2);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(canvas.count(|c| matches!(c, DrawCommand::Clear)), 0);
    }

    #[test]
    fn unbalanced_restore_is_ignored() {
        let mut canvas = DisplayList::new(10, 10);
        canvas.restore();
        canvas.save();
        canvas.restore();
        assert_eq!(canvas.depth(), 0);
        assert_eq!(canvas.commands().len(), 2);
    }

    #[test]
    fn serialises_to_tagged_json() {
        let mut canvas = DisplayList::new(10, 10);
        canvas.clear();
        let json = canvas.to_json().unwrap();
        assert!(json.contains("\"op\": \"clear\""));
    }
}
