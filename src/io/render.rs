//! Render-facing projection of the flock and the sinks that consume it.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::flock::{Boid, Family};
use crate::vector::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Triangle,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Predator red; other families step around the hue wheel.
    pub fn for_family(family: Family) -> Self {
        if family.is_predator() {
            return Self::new(220, 40, 40);
        }
        let hue = (family.0 as f64 * 137.5 + 200.0) % 360.0;
        hsv(hue, 0.55, 0.95)
    }
}

fn hsv(hue: f64, saturation: f64, value: f64) -> Color {
    let chroma = value * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let channel = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Color::new(channel(r), channel(g), channel(b))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    pub id: u64,
    pub center: Vec2,
    /// Heading in radians; zero for a boid at rest.
    pub heading: f64,
    pub shape: Shape,
    pub radius: f64,
    pub color: Color,
}

impl Sprite {
    pub fn from_boid(boid: &Boid) -> Self {
        let (shape, radius) = if boid.is_predator() {
            (Shape::Circle, 8.0)
        } else {
            (Shape::Triangle, 5.0)
        };
        Self {
            id: boid.id,
            center: boid.position,
            heading: boid.velocity.angle(),
            shape,
            radius,
            color: Color::for_family(boid.family),
        }
    }
}

/// Consumer of one complete frame per round.
pub trait Renderer {
    fn draw(&mut self, round: u64, sprites: &[Sprite]) -> Result<()>;

    /// Flush anything buffered. Called once when the run ends.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw(&mut self, _round: u64, _sprites: &[Sprite]) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordingHeader {
    pub scenario: String,
    pub started_at: String,
    pub every_rounds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub round: u64,
    pub sprites: Vec<Sprite>,
}

/// Writes a header line, then one JSON line per sampled frame.
pub struct FrameRecorder<W: Write> {
    writer: W,
    scenario: String,
    every_rounds: u64,
    header_written: bool,
    frames_written: u64,
}

impl<W: Write> FrameRecorder<W> {
    pub fn new(writer: W, scenario: impl Into<String>, every_rounds: u64) -> Self {
        Self {
            writer,
            scenario: scenario.into(),
            every_rounds: every_rounds.max(1),
            header_written: false,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record).context("Failed to encode frame")?;
        self.writer
            .write_all(b"\n")
            .context("Failed to write frame")?;
        Ok(())
    }
}

impl FrameRecorder<BufWriter<File>> {
    /// Record into a new file at `path`, creating parent directories.
    pub fn create(path: impl AsRef<Path>, scenario: &str, every_rounds: u64) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create frame file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file), scenario, every_rounds))
    }
}

impl<W: Write> Renderer for FrameRecorder<W> {
    fn draw(&mut self, round: u64, sprites: &[Sprite]) -> Result<()> {
        if !self.header_written {
            let header = RecordingHeader {
                scenario: self.scenario.clone(),
                started_at: chrono::Utc::now().to_rfc3339(),
                every_rounds: self.every_rounds,
            };
            self.write_line(&header)?;
            self.header_written = true;
        }
        if round % self.every_rounds != 0 {
            return Ok(());
        }
        let frame = RecordedFrame {
            round,
            sprites: sprites.to_vec(),
        };
        self.write_line(&frame)?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush frames")
    }
}
