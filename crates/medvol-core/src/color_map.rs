//! 1D lookup tables mapping intensities to colors.

use glam::Vec4;

use crate::huv::Huv;

/// RGBA color with 8 bits per channel.
pub type Rgba8 = [u8; 4];

/// Fully transparent black.
pub const BLACK_NO_ALPHA: Rgba8 = [0, 0, 0, 0];

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_rgba8(color: Vec4) -> Rgba8 {
    let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
}

/// Converts a stored color back to `[0, 1]` floats.
pub fn to_vec4(color: Rgba8) -> Vec4 {
    Vec4::new(
        f32::from(color[0]),
        f32::from(color[1]),
        f32::from(color[2]),
        f32::from(color[3]),
    ) / 255.0
}

/// Color lookup table over the intensity range `[0, 1]`.
///
/// Every write marks the map dirty; the renderer uploads it at most once per
/// frame when [`take_dirty`](Self::take_dirty) reports a change.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    colors: Vec<Rgba8>,
    dirty: bool,
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RESOLUTION)
    }
}

impl ColorMap {
    /// One entry per Hounsfield unit.
    pub const DEFAULT_RESOLUTION: usize = 4096;

    /// Creates a transparent map with `resolution` entries (at least two).
    pub fn new(resolution: usize) -> Self {
        Self {
            colors: vec![BLACK_NO_ALPHA; resolution.max(2)],
            dirty: true,
        }
    }

    pub fn resolution(&self) -> usize {
        self.colors.len()
    }

    /// Table entries, lowest intensity first.
    pub fn colors(&self) -> &[Rgba8] {
        &self.colors
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn location(&self, intensity: f32) -> usize {
        let max_location = self.colors.len() - 1;
        let location = intensity.clamp(0.0, 1.0) * max_location as f32 + 0.5;
        (location as usize).min(max_location)
    }

    /// Color for `intensity` by nearest lookup.
    pub fn lookup(&self, intensity: f32) -> Rgba8 {
        self.colors[self.location(intensity)]
    }

    /// Resets every entry to transparent black.
    pub fn clear(&mut self) -> &mut Self {
        self.colors.fill(BLACK_NO_ALPHA);
        self.dirty = true;
        self
    }

    /// Linearly interpolates from `from` at `first` to `to` at `last`.
    ///
    /// A reversed range is written reversed, so `from` always lands at
    /// `first`.
    #[allow(clippy::cast_precision_loss)]
    pub fn write_linear_segment(&mut self, first: f32, last: f32, from: Vec4, to: Vec4) -> &mut Self {
        let (first, last, from, to) = if first <= last {
            (first, last, from, to)
        } else {
            (last, first, to, from)
        };
        let lo = self.location(first);
        let hi = self.location(last);
        let count = hi - lo + 1;
        for offset in 0..count {
            let lambda = if count == 1 {
                0.5
            } else {
                offset as f32 / (count - 1) as f32
            };
            self.colors[lo + offset] = to_rgba8(from.lerp(to, lambda));
        }
        self.dirty = true;
        self
    }

    /// Writes a segment over a Hounsfield-unit span.
    pub fn write_hu_segment(&mut self, first: Huv, last: Huv, from: Vec4, to: Vec4) -> &mut Self {
        self.write_linear_segment(first.to_intensity(), last.to_intensity(), from, to)
    }

    /// Spreads `colors` evenly over the whole intensity range.
    ///
    /// A single color fills the map; an empty slice leaves it unchanged.
    #[allow(clippy::cast_precision_loss)]
    pub fn write_linear_spline(&mut self, colors: &[Vec4]) -> &mut Self {
        match colors {
            [] => self,
            [only] => self.write_linear_segment(0.0, 1.0, *only, *only),
            _ => {
                let segments = (colors.len() - 1) as f32;
                for (i, pair) in colors.windows(2).enumerate() {
                    let first = i as f32 / segments;
                    let last = (i + 1) as f32 / segments;
                    self.write_linear_segment(first, last, pair[0], pair[1]);
                }
                self
            }
        }
    }

    /// Resamples the table to `resolution` entries if it is larger.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample_down_to(&mut self, resolution: usize) {
        let resolution = resolution.max(2);
        if resolution >= self.colors.len() {
            return;
        }
        log::warn!(
            "color map of {} entries sampled down to {resolution}",
            self.colors.len()
        );
        let colors = (0..resolution)
            .map(|i| self.lookup(i as f32 / (resolution - 1) as f32))
            .collect();
        self.colors = colors;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forces an upload on the next frame.
    pub fn force_rebuild(&mut self) {
        self.dirty = true;
    }

    /// Returns whether the map changed since the last call and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}
