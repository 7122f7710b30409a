//! Boundaries to the outside world: frames out, input in.

pub mod input;
pub mod render;

pub use input::{InputSample, InputSource, Key, NoInput, ScriptedEvent, ScriptedInput};
pub use render::{
    Color, FrameRecorder, NullRenderer, RecordedFrame, RecordingHeader, Renderer, Shape, Sprite,
};
