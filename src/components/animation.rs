//! Sprite animation data.
//!
//! A [`SpriteAnimation`] cycles through an ordered list of sprite-sheet frame
//! numbers at a fixed rate and, when bound to a sprite, keeps that sprite's
//! source rectangle on the current frame. Animations live in the
//! [`AnimationCoordinator`](crate::resources::animationcoordinator::AnimationCoordinator)
//! and are created from an [`AnimationSpec`].

use serde::{Deserialize, Serialize};

use crate::components::sprite::SourceRect;
use crate::resources::handletable::Handle;

/// Size of one frame and how many frames fit in a sheet row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: f32,
    pub height: f32,
    pub columns: u32,
}

impl FrameGeometry {
    pub fn new(width: f32, height: f32, columns: u32) -> Self {
        Self {
            width,
            height,
            columns,
        }
    }

    /// Source rectangle of sheet frame `frame`. Zero columns counts as one.
    pub fn source_rect(&self, frame: u32) -> SourceRect {
        let columns = self.columns.max(1);
        SourceRect {
            x: (frame % columns) as f32 * self.width,
            y: (frame / columns) as f32 * self.height,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpriteAnimation<V> {
    pub sprite: Option<Handle>,
    /// Sheet frame numbers, in playback order.
    pub frames: Vec<u32>,
    /// Index into `frames`. Always `< frames.len()` when frames is non-empty.
    pub current_index: usize,
    pub fps: f32,
    pub frame_duration: f32,
    pub elapsed: f32,
    pub geometry: FrameGeometry,
    pub looping: bool,
    pub playing: bool,
    pub completed: bool,
    /// Bumped on every restart.
    pub generation: u32,
    /// Called with `(handle, index, frame)` for every index change.
    pub on_frame: Option<V>,
    /// Called with the animation handle in the completion pass.
    pub on_complete: Option<V>,
}

impl<V> SpriteAnimation<V> {
    /// Build from a spec. Empty frame lists and non-positive rates produce
    /// an animation that completes on its first update, whatever `autoplay`
    /// says, so `on_complete` still fires once.
    pub fn from_spec(spec: AnimationSpec<V>) -> Self {
        let valid_rate = spec.fps.is_finite() && spec.fps > 0.0;
        let malformed = spec.frames.is_empty() || !valid_rate;
        SpriteAnimation {
            sprite: spec.sprite,
            frames: spec.frames,
            current_index: 0,
            fps: spec.fps,
            frame_duration: if valid_rate { 1.0 / spec.fps } else { 0.0 },
            elapsed: 0.0,
            geometry: spec.geometry,
            looping: spec.looping,
            playing: spec.autoplay || malformed,
            completed: false,
            generation: 0,
            on_frame: spec.on_frame,
            on_complete: spec.on_complete,
        }
    }

    /// Sheet frame number currently shown.
    pub fn current_frame(&self) -> Option<u32> {
        self.frames.get(self.current_index).copied()
    }

    pub fn current_source(&self) -> Option<SourceRect> {
        self.current_frame().map(|f| self.geometry.source_rect(f))
    }

    /// No frames or no usable rate.
    pub fn is_malformed(&self) -> bool {
        self.frames.is_empty() || self.frame_duration <= 0.0
    }

    /// Removed by the sweep: completed and either non-looping or malformed.
    pub fn is_finished(&self) -> bool {
        self.completed && (!self.looping || self.is_malformed())
    }

    /// Rewind to the first frame and start playing.
    ///
    /// A malformed animation only resumes toward its single completion.
    pub fn restart(&mut self) {
        if self.is_malformed() {
            self.playing = !self.completed;
            return;
        }
        self.current_index = 0;
        self.elapsed = 0.0;
        self.completed = false;
        self.playing = true;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn snapshot(&self) -> AnimationSnapshot {
        AnimationSnapshot {
            sprite: self.sprite,
            frame_count: self.frames.len(),
            current_index: self.current_index,
            current_frame: self.current_frame(),
            fps: self.fps,
            elapsed: self.elapsed,
            looping: self.looping,
            playing: self.playing,
            completed: self.completed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationSpec<V> {
    pub sprite: Option<Handle>,
    pub frames: Vec<u32>,
    pub fps: f32,
    pub looping: bool,
    pub geometry: FrameGeometry,
    pub autoplay: bool,
    pub on_frame: Option<V>,
    pub on_complete: Option<V>,
}

impl<V> AnimationSpec<V> {
    pub fn new(frames: Vec<u32>, fps: f32, geometry: FrameGeometry) -> Self {
        AnimationSpec {
            sprite: None,
            frames,
            fps,
            looping: false,
            geometry,
            autoplay: true,
            on_frame: None,
            on_complete: None,
        }
    }
    pub fn with_sprite(mut self, sprite: Handle) -> Self {
        self.sprite = Some(sprite);
        self
    }
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }
    pub fn with_on_frame(mut self, callback: V) -> Self {
        self.on_frame = Some(callback);
        self
    }
    pub fn with_on_complete(mut self, callback: V) -> Self {
        self.on_complete = Some(callback);
        self
    }
}

/// Read-only copy of an animation's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationSnapshot {
    pub sprite: Option<Handle>,
    pub frame_count: usize,
    pub current_index: usize,
    pub current_frame: Option<u32>,
    pub fps: f32,
    pub elapsed: f32,
    pub looping: bool,
    pub playing: bool,
    pub completed: bool,
}
