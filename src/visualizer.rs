use eframe::egui::{self, Color32, CornerRadius, Mesh, Pos2, Rect};

use crate::audio::SpectrumTap;

/// Bar count on the synthetic path. The sampled path draws one bar per
/// frequency bin instead (also 128 with the 256-point FFT).
pub const SYNTHETIC_BARS: usize = 128;

/// Bars reach at most 80% of the canvas height.
const HEIGHT_SCALE: f32 = 0.8;
/// Alpha of the per-frame dark fill that leaves motion trails behind.
const TRAIL_ALPHA: u8 = 26;
const PARTICLE_SLOTS: usize = 5;
/// Per-slot chance of a particle appearing on a given frame.
const PARTICLE_PROBABILITY: f32 = 0.3;
const HUE_STEP_PER_BAR: f32 = 3.0;
const HUE_DRIFT_PER_SECOND: f32 = 50.0;

/// Where bar heights come from. Selected once when the visualizer starts;
/// a session that failed to bind an analyzer stays synthetic.
enum SpectrumSource {
    Sampled(SpectrumTap),
    Synthetic,
}

#[derive(Debug, Clone, Copy)]
pub struct BarSample {
    /// Normalized height, 0..=1 (scaled by `HEIGHT_SCALE` at paint time).
    pub level: f32,
    /// Gradient hue in degrees, 0..360.
    pub hue: f32,
}

/// A decorative dot, alive for exactly one frame.
#[derive(Debug, Clone, Copy)]
pub struct ParticleDot {
    /// Position normalized to the canvas rect.
    pub pos: Pos2,
    pub radius: f32,
    pub color: Color32,
}

/// Per-frame derived data, discarded after painting.
pub struct VisualizerFrame {
    pub bars: Vec<BarSample>,
    pub particles: Vec<ParticleDot>,
}

/// The animated bar display shown in audio mode. Not a thread: the owning
/// app calls `frame` + `paint` once per repaint while `is_running`, and the
/// mode controller stops it on the way back to video mode.
pub struct Visualizer {
    running: bool,
    source: SpectrumSource,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            running: false,
            source: SpectrumSource::Synthetic,
        }
    }

    /// Starts the loop, picking the sampled source when an analyzer tap is
    /// available and the synthetic waveform otherwise.
    pub fn start(&mut self, tap: Option<SpectrumTap>) {
        self.source = match tap {
            Some(tap) => SpectrumSource::Sampled(tap),
            None => SpectrumSource::Synthetic,
        };
        self.running = true;
    }

    /// Idempotent; the next frame check terminates the loop.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.source, SpectrumSource::Synthetic)
    }

    /// Computes this frame's bars and particles. `now_secs` is wall-clock
    /// seconds; it only drives the synthetic waveform and the hue sweep.
    pub fn frame(&self, now_secs: f64) -> VisualizerFrame {
        let t = now_secs as f32;
        let bars = match &self.source {
            SpectrumSource::Sampled(tap) => match tap.frequency_bins() {
                Some(bins) => bins
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| BarSample {
                        level: f32::from(v) / 255.0,
                        hue: sampled_hue(i),
                    })
                    .collect(),
                // Tap bound but no full window yet: silent bars.
                None => (0..crate::audio::FREQUENCY_BINS)
                    .map(|i| BarSample {
                        level: 0.0,
                        hue: sampled_hue(i),
                    })
                    .collect(),
            },
            SpectrumSource::Synthetic => (0..SYNTHETIC_BARS)
                .map(|i| BarSample {
                    level: synthetic_level(i, t),
                    hue: synthetic_hue(i, t),
                })
                .collect(),
        };

        let mut particles = Vec::new();
        for _ in 0..PARTICLE_SLOTS {
            if rand::random::<f32>() < PARTICLE_PROBABILITY {
                let hue = rand::random::<f32>() * 360.0;
                particles.push(ParticleDot {
                    pos: Pos2::new(rand::random::<f32>(), rand::random::<f32>()),
                    radius: rand::random::<f32>() * 2.0 + 1.0,
                    color: hsl_color(hue, 1.0, 0.8, 0.4),
                });
            }
        }

        VisualizerFrame { bars, particles }
    }

    pub fn paint(&self, painter: &egui::Painter, rect: Rect, frame: &VisualizerFrame) {
        // Low-alpha fill instead of a clear: previous frames bleed through
        // as motion trails.
        painter.rect_filled(
            rect,
            CornerRadius::ZERO,
            Color32::from_black_alpha(TRAIL_ALPHA),
        );

        if frame.bars.is_empty() {
            return;
        }

        let bar_width = rect.width() / frame.bars.len() as f32;
        let mut mesh = Mesh::default();
        for (i, bar) in frame.bars.iter().enumerate() {
            let height = bar.level.clamp(0.0, 1.0) * rect.height() * HEIGHT_SCALE;
            if height <= 0.0 {
                continue;
            }
            let left = rect.left() + i as f32 * bar_width;
            let bar_rect = Rect::from_min_max(
                Pos2::new(left, rect.bottom() - height),
                Pos2::new(left + (bar_width - 1.0).max(1.0), rect.bottom()),
            );
            let top = hsl_color(bar.hue, 0.7, 0.8, 1.0);
            let bottom = hsl_color(bar.hue, 0.7, 0.4, 1.0);

            let base = mesh.vertices.len() as u32;
            mesh.colored_vertex(bar_rect.left_top(), top);
            mesh.colored_vertex(bar_rect.right_top(), top);
            mesh.colored_vertex(bar_rect.right_bottom(), bottom);
            mesh.colored_vertex(bar_rect.left_bottom(), bottom);
            mesh.add_triangle(base, base + 1, base + 2);
            mesh.add_triangle(base, base + 2, base + 3);
        }
        painter.add(egui::Shape::mesh(mesh));

        for particle in &frame.particles {
            let center = Pos2::new(
                rect.left() + particle.pos.x * rect.width(),
                rect.top() + particle.pos.y * rect.height(),
            );
            painter.circle_filled(center, particle.radius, particle.color);
        }
    }
}

/// Two out-of-phase sinusoids over bar index and time; tuned to resemble
/// spectral motion without a real signal.
fn synthetic_level(index: usize, t: f32) -> f32 {
    let i = index as f32;
    ((i * 0.1 + t).sin() * 0.5 + 0.5) * ((i * 0.05 + t * 1.3).cos() * 0.3 + 0.7)
}

fn synthetic_hue(index: usize, t: f32) -> f32 {
    (index as f32 * HUE_STEP_PER_BAR + t * HUE_DRIFT_PER_SECOND).rem_euclid(360.0)
}

fn sampled_hue(index: usize) -> f32 {
    (index as f32 * HUE_STEP_PER_BAR).rem_euclid(360.0)
}

/// HSL with alpha to premultiplied-free Color32. Hue in degrees.
fn hsl_color(hue: f32, saturation: f32, lightness: f32, alpha: f32) -> Color32 {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    Color32::from_rgba_unmultiplied(
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}
