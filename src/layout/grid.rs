// Occupancy grid for word masks.
//
// The surface is unbounded: pixels live in 64x64 chunks created on first
// write, so masks can be stamped at any (possibly negative) coordinate.

use super::types::{Aspect, GridBounds};
use crate::raster::GlyphMask;
use std::collections::HashMap;
use std::f64::consts::TAU;

const CHUNK_SIZE: i32 = 64;
/// Distance between neighbouring spiral arms along the longer axis.
const SPIRAL_PITCH: f64 = 1.0;
const SPIRAL_MAX_ANGLE_STEP: f64 = 0.5;
/// Upper bound on the distance travelled along the spiral per step.
const SPIRAL_ARC_STEP: f64 = 0.5;

type Chunk = [u64; CHUNK_SIZE as usize];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl PixelRect {
    fn intersects(&self, other: &PixelRect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    fn union(&self, other: &PixelRect) -> PixelRect {
        PixelRect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// Set pixels of a mask, optionally dilated, relative to the mask's top-left.
#[derive(Debug, Clone)]
pub(crate) struct Footprint {
    offsets: Vec<(i32, i32)>,
    extent: Option<PixelRect>,
}

impl Footprint {
    pub(crate) fn new(mask: &GlyphMask, padding: u32) -> Self {
        let offsets = if padding == 0 {
            mask.occupied()
        } else {
            dilate(mask, padding as usize)
        };
        let extent = offsets.iter().fold(None, |acc: Option<PixelRect>, &(x, y)| {
            let pixel = PixelRect {
                left: x,
                top: y,
                right: x + 1,
                bottom: y + 1,
            };
            Some(match acc {
                Some(rect) => rect.union(&pixel),
                None => pixel,
            })
        });
        Self { offsets, extent }
    }

    pub(crate) fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }

    fn extent_at(&self, left: i32, top: i32) -> Option<PixelRect> {
        self.extent.map(|rect| PixelRect {
            left: rect.left + left,
            top: rect.top + top,
            right: rect.right + left,
            bottom: rect.bottom + top,
        })
    }
}

// Square dilation: every pixel within `radius` (Chebyshev) of a set pixel.
fn dilate(mask: &GlyphMask, radius: usize) -> Vec<(i32, i32)> {
    let width = mask.width + 2 * radius;
    let height = mask.height + 2 * radius;
    let mut horizontal = vec![false; width * height];
    for y in 0..mask.height {
        for x in 0..mask.width {
            if mask.get(x, y) {
                let row = (y + radius) * width;
                for dx in x..=x + 2 * radius {
                    horizontal[row + dx] = true;
                }
            }
        }
    }
    let mut dilated = vec![false; width * height];
    for y in 0..height {
        for x in 0..width {
            if horizontal[y * width + x] {
                let lo = y.saturating_sub(radius);
                let hi = (y + radius).min(height - 1);
                for dy in lo..=hi {
                    dilated[dy * width + x] = true;
                }
            }
        }
    }
    let shift = radius as i32;
    let mut out = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if dilated[y * width + x] {
                out.push((x as i32 - shift, y as i32 - shift));
            }
        }
    }
    out
}

/// Archimedean spiral stretched to the grid aspect, yielding integer offsets
/// from its center. The first offset is always `(0, 0)`.
#[derive(Debug, Clone)]
pub(crate) struct Spiral {
    aspect: Aspect,
    angle: f64,
    last: Option<(i32, i32)>,
}

impl Spiral {
    pub(crate) fn new(aspect: Aspect) -> Self {
        Self {
            aspect,
            angle: 0.0,
            last: None,
        }
    }

    pub(crate) fn next_offset(&mut self) -> (i32, i32) {
        let stretch = self.aspect.x.max(self.aspect.y);
        loop {
            let radius = self.angle * SPIRAL_PITCH / (TAU * stretch);
            let (sin, cos) = self.angle.sin_cos();
            let point = (
                (radius * cos * self.aspect.x).round() as i32,
                (radius * sin * self.aspect.y).round() as i32,
            );
            // Sub-pixel steps: consecutive points are never more than one
            // pixel apart on either axis.
            self.angle +=
                (SPIRAL_ARC_STEP / (radius * stretch).max(SPIRAL_ARC_STEP)).min(SPIRAL_MAX_ANGLE_STEP);
            if self.last != Some(point) {
                self.last = Some(point);
                return point;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PixelGrid {
    aspect: Aspect,
    chunks: HashMap<(i32, i32), Chunk>,
    occupied: Option<PixelRect>,
}

impl PixelGrid {
    pub fn new(aspect: Aspect) -> Self {
        Self {
            aspect,
            chunks: HashMap::new(),
            occupied: None,
        }
    }

    pub fn init(&mut self, aspect: Aspect) {
        self.aspect = aspect;
        self.clear();
    }

    pub fn aspect(&self) -> Aspect {
        self.aspect
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.occupied = None;
    }

    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        let key = (x.div_euclid(CHUNK_SIZE), y.div_euclid(CHUNK_SIZE));
        let Some(chunk) = self.chunks.get(&key) else {
            return false;
        };
        let row = chunk[y.rem_euclid(CHUNK_SIZE) as usize];
        row & (1u64 << x.rem_euclid(CHUNK_SIZE)) != 0
    }

    fn or_row(&mut self, chunk_x: i32, y: i32, bits: u64) {
        let chunk = self
            .chunks
            .entry((chunk_x, y.div_euclid(CHUNK_SIZE)))
            .or_insert([0u64; CHUNK_SIZE as usize]);
        chunk[y.rem_euclid(CHUNK_SIZE) as usize] |= bits;
    }

    /// OR `mask` into the grid with its top-left pixel at `(left, top)`.
    pub fn put(&mut self, mask: &GlyphMask, left: i32, top: i32) {
        for y in 0..mask.height {
            let row = &mask.pixels[y * mask.width..(y + 1) * mask.width];
            let (Some(first), Some(last)) = (
                row.iter().position(|set| *set),
                row.iter().rposition(|set| *set),
            ) else {
                continue;
            };
            let gy = top + y as i32;
            // Bits are gathered per chunk row and written once.
            let mut pending: Option<(i32, u64)> = None;
            for (x, set) in row.iter().enumerate().take(last + 1).skip(first) {
                if !*set {
                    continue;
                }
                let gx = left + x as i32;
                let chunk_x = gx.div_euclid(CHUNK_SIZE);
                let bit = 1u64 << gx.rem_euclid(CHUNK_SIZE);
                if let Some((pending_x, bits)) = pending.as_mut() {
                    if *pending_x == chunk_x {
                        *bits |= bit;
                        continue;
                    }
                }
                if let Some((pending_x, bits)) = pending.replace((chunk_x, bit)) {
                    self.or_row(pending_x, gy, bits);
                }
            }
            if let Some((pending_x, bits)) = pending {
                self.or_row(pending_x, gy, bits);
            }
            let extent = PixelRect {
                left: left + first as i32,
                top: gy,
                right: left + last as i32 + 1,
                bottom: gy + 1,
            };
            self.occupied = Some(match self.occupied {
                Some(rect) => rect.union(&extent),
                None => extent,
            });
        }
    }

    fn fits(&self, footprint: &Footprint, left: i32, top: i32) -> bool {
        let (Some(occupied), Some(extent)) = (self.occupied, footprint.extent_at(left, top)) else {
            return true;
        };
        if !occupied.intersects(&extent) {
            return true;
        }
        footprint
            .offsets()
            .iter()
            .all(|&(dx, dy)| !self.is_occupied(left + dx, top + dy))
    }

    /// Nearest position to `(left, top)`, in spiral order, where the mask
    /// dilated by `padding` pixels touches no stamped pixel.
    pub fn find_fit(&self, mask: &GlyphMask, left: i32, top: i32, padding: u32) -> (i32, i32) {
        let footprint = Footprint::new(mask, padding);
        let mut spiral = Spiral::new(self.aspect);
        loop {
            let (dx, dy) = spiral.next_offset();
            if self.fits(&footprint, left + dx, top + dy) {
                return (left + dx, top + dy);
            }
        }
    }

    pub fn bounds(&self) -> GridBounds {
        match self.occupied {
            Some(rect) => GridBounds {
                left: rect.left,
                top: rect.top,
                width: rect.right - rect.left,
                height: rect.bottom - rect.top,
            },
            None => GridBounds::default(),
        }
    }
}
