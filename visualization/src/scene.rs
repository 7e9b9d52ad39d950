//! Turning frequency bins into something to paint.
//!
//! A [`Scene`] is a display list in canvas coordinates (origin top-left, y
//! down). The shell paints it with whatever backend it has.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Colour with straight alpha in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Linear blend towards `other`, `t` in `[0, 1]`.
    pub fn mix(self, other: Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgba {
            r: lerp(self.r, other.r),
            g: lerp(self.g, other.g),
            b: lerp(self.b, other.b),
            a: self.a + (other.a - self.a) * t,
        }
    }
}

pub const ACCENT: Rgba = Rgba::rgb(124, 92, 255);
pub const GRADIENT_BOTTOM: Rgba = Rgba::rgb(0, 212, 255);
pub const GRADIENT_TOP: Rgba = Rgba::rgb(178, 0, 255);

/// Fixed vertical gradient applied to every bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    pub top: Rgba,
    pub bottom: Rgba,
}

impl Gradient {
    /// Colour at `height_fraction` of the canvas (0 = bottom, 1 = top).
    pub fn at(&self, height_fraction: f32) -> Rgba {
        self.bottom.mix(self.top, height_fraction)
    }
}

impl Default for Gradient {
    fn default() -> Self {
        Self {
            top: GRADIENT_TOP,
            bottom: GRADIENT_BOTTOM,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle {
        x: f32,
        y: f32,
        radius: f32,
        fill: Rgba,
    },
    Ray {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Rgba,
    },
    Bar {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        gradient: Gradient,
    },
}

/// One painted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    /// Mean bin magnitude scaled to `[0, 1]`
    pub pulse: f32,
    pub shapes: Vec<Shape>,
}

impl Scene {
    pub fn empty(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            pulse: 0.0,
            shapes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationStyle {
    /// Pulsing orb with one ray per indicator
    #[default]
    Radial,
    /// Classic spectrum bars
    Bars,
}

/// Mean magnitude of `bins` mapped to `[0, 1]`.
pub fn pulse(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    sum as f32 / bins.len() as f32 / 255.0
}

/// Proportions of the radial drawing relative to the smaller canvas side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialGeometry {
    pub base_radius: f32,
    pub pulse_growth: f32,
    pub min_ray: f32,
    pub ray_extent: f32,
    pub ray_count: usize,
}

impl RadialGeometry {
    pub fn for_canvas(width: f32, height: f32, ray_count: usize) -> Self {
        let side = width.min(height);
        Self {
            base_radius: side * 0.18,
            pulse_growth: side * 0.10,
            min_ray: side * 0.02,
            ray_extent: side * 0.22,
            ray_count,
        }
    }

    /// Length of a ray driven by `bin`.
    pub fn ray_length(&self, bin: u8) -> f32 {
        self.min_ray + (bin as f32 / 255.0) * self.ray_extent
    }
}

/// Radial policy: a pulse-sized orb plus `ray_count` rays around it, ray `i`
/// driven by bin `i % bins.len()`.
pub fn render_radial(bins: &[u8], width: f32, height: f32, ray_count: usize) -> Scene {
    let geometry = RadialGeometry::for_canvas(width, height, ray_count);
    let level = pulse(bins);
    let (cx, cy) = (width / 2.0, height / 2.0);

    let mut shapes = Vec::with_capacity(ray_count + 1);
    shapes.push(Shape::Circle {
        x: cx,
        y: cy,
        radius: geometry.base_radius + level * geometry.pulse_growth,
        fill: ACCENT.with_alpha(0.35 + 0.65 * level),
    });

    if !bins.is_empty() {
        for i in 0..ray_count {
            let bin = bins[i % bins.len()];
            let angle = i as f32 / ray_count as f32 * 2.0 * PI;
            let (sin, cos) = angle.sin_cos();
            let inner = geometry.base_radius;
            let outer = inner + geometry.ray_length(bin);
            shapes.push(Shape::Ray {
                x1: cx + cos * inner,
                y1: cy + sin * inner,
                x2: cx + cos * outer,
                y2: cy + sin * outer,
                width: 2.0,
                color: ACCENT.with_alpha(0.4 + 0.6 * bin as f32 / 255.0),
            });
        }
    }

    Scene {
        width,
        height,
        pulse: level,
        shapes,
    }
}

/// Bar policy: canvas width split evenly across all bins, bar height
/// proportional to magnitude, bars standing on the bottom edge.
pub fn render_bars(bins: &[u8], width: f32, height: f32) -> Scene {
    let gradient = Gradient::default();
    let bar_width = if bins.is_empty() {
        0.0
    } else {
        width / bins.len() as f32
    };
    let shapes = bins
        .iter()
        .enumerate()
        .map(|(i, &bin)| {
            let bar_height = bin as f32 / 255.0 * height;
            Shape::Bar {
                x: i as f32 * bar_width,
                y: height - bar_height,
                width: bar_width,
                height: bar_height,
                gradient,
            }
        })
        .collect();

    Scene {
        width,
        height,
        pulse: pulse(bins),
        shapes,
    }
}

/// Render `bins` with `style`.
pub fn render(
    style: VisualizationStyle,
    bins: &[u8],
    width: f32,
    height: f32,
    ray_count: usize,
) -> Scene {
    match style {
        VisualizationStyle::Radial => render_radial(bins, width, height, ray_count),
        VisualizationStyle::Bars => render_bars(bins, width, height),
    }
}
