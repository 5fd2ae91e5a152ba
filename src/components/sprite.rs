use serde::{Deserialize, Serialize};

/// Region of a sprite sheet, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Sprite is identified by a texture key and its size. `source` selects the
/// frame from the spritesheet; sprite animations rewrite it as they advance
/// and the renderer reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    pub tex_key: String,
    pub width: f32,
    pub height: f32,
    pub source: SourceRect,
}

impl Sprite {
    pub fn new(tex_key: impl Into<String>, width: f32, height: f32) -> Self {
        Self {
            tex_key: tex_key.into(),
            width,
            height,
            source: SourceRect {
                x: 0.0,
                y: 0.0,
                width,
                height,
            },
        }
    }
}
