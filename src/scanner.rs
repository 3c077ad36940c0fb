//! Low-level barcode line scanner
//!
//! Processes one scan line of pixel intensities and detects bar/space
//! transitions, reporting the width of each completed element. Widths are in
//! fixed-point pixel units with [`ZBAR_FIXED`] fractional bits.

use crate::color::Color;

pub(crate) const ZBAR_FIXED: i32 = 5;
const ROUND: u32 = 1 << (ZBAR_FIXED - 1); // 16
const THRESH_FADE: u64 = 8;
const THRESH_MIN: u32 = 4;

// EWMA_WEIGHT = (unsigned)((0.78 * (1 << 6) + 1) / 2) = 25
const EWMA_WEIGHT: i32 = 25;

// THRESH_INIT = (unsigned)((0.44 * (1 << 6) + 1) / 2) = 14
const THRESH_INIT: u32 = 14;

// intensities are clamped to this magnitude so the filter arithmetic fits i32
const MAX_INTENSITY: i32 = 1 << 16;

/// Pixel-to-width scanner for one scan path
///
/// ```
/// use zedscan::Scanner;
///
/// let mut scn = Scanner::new();
/// let line = [255u8; 8].iter().chain(&[0u8; 4]).chain(&[255u8; 8]);
/// let widths: Vec<u32> = line.filter_map(|&y| scn.scan_pixel(y.into())).collect();
/// assert_eq!(widths.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Scanner {
    y1_min_thresh: u32,
    x: u32,
    y0: [i32; 4],
    y1_sign: i32,
    y1_thresh: u32,
    cur_edge: u32,
    last_edge: u32,
    width: u32,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            y1_min_thresh: THRESH_MIN,
            x: 0,
            y0: [0; 4],
            y1_sign: 0,
            y1_thresh: THRESH_MIN,
            cur_edge: 0,
            last_edge: 0,
            width: 0,
        }
    }

    /// Set the minimum edge slope; intensity excursions below it never
    /// produce a transition
    pub fn set_min_threshold(&mut self, thresh: u32) {
        self.y1_min_thresh = thresh.max(1);
        if self.y1_thresh < self.y1_min_thresh {
            self.y1_thresh = self.y1_min_thresh;
        }
    }

    pub fn min_threshold(&self) -> u32 {
        self.y1_min_thresh
    }

    /// Color of the element currently being accumulated
    pub fn color(&self) -> Color {
        if self.y1_sign <= 0 {
            Color::Space
        } else {
            Color::Bar
        }
    }

    /// Width of the most recently completed element
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Interpolated position of the last edge, `offset` fixed-point units
    /// back, with `prec` fractional bits
    pub fn edge(&self, offset: u32, prec: i32) -> u32 {
        let edge = self
            .last_edge
            .wrapping_sub(offset)
            .wrapping_sub(1 << ZBAR_FIXED)
            .wrapping_sub(ROUND);
        let prec = ZBAR_FIXED - prec;

        match prec {
            1.. => edge >> prec,
            0 => edge,
            _ => edge << (-prec),
        }
    }

    /// Threshold for edge detection, slowly fading back to the minimum
    fn calc_thresh(&mut self) -> u32 {
        let thresh = self.y1_thresh;

        if thresh <= self.y1_min_thresh || self.width == 0 {
            return self.y1_min_thresh;
        }

        let dx = (self.x << ZBAR_FIXED).wrapping_sub(self.last_edge);
        let t = thresh as u64 * dx as u64 / self.width as u64 / THRESH_FADE;

        if (thresh as u64) > t {
            let new_thresh = thresh - t as u32;
            if new_thresh > self.y1_min_thresh {
                return new_thresh;
            }
        }

        self.y1_thresh = self.y1_min_thresh;
        self.y1_min_thresh
    }

    fn process_edge(&mut self) -> u32 {
        if self.y1_sign == 0 {
            self.last_edge = (1 << ZBAR_FIXED) + ROUND;
            self.cur_edge = self.last_edge;
        } else if self.last_edge == 0 {
            self.last_edge = self.cur_edge;
        }

        self.width = self.cur_edge.wrapping_sub(self.last_edge);
        self.last_edge = self.cur_edge;
        self.width
    }

    /// Process a single pixel intensity value
    ///
    /// Returns the width of the element that ended at a newly confirmed
    /// edge, if any.
    pub fn scan_pixel(&mut self, y: i32) -> Option<u32> {
        let y = y.clamp(-MAX_INTENSITY, MAX_INTENSITY);

        // retrieve short value history
        let x = self.x;
        let mut y0_1 = self.y0[(x.wrapping_sub(1) & 3) as usize];
        let mut y0_0 = y0_1;

        if x != 0 {
            // update weighted moving average
            y0_0 += ((y - y0_1) * EWMA_WEIGHT) >> ZBAR_FIXED;
            self.y0[(x & 3) as usize] = y0_0;
        } else {
            y0_0 = y;
            y0_1 = y;
            self.y0 = [y; 4];
        }

        let y0_2 = self.y0[(x.wrapping_sub(2) & 3) as usize];
        let y0_3 = self.y0[(x.wrapping_sub(3) & 3) as usize];

        // 1st differential @ x-1
        let mut y1_1 = y0_1 - y0_2;
        {
            let y1_2 = y0_2 - y0_3;
            if y1_1.abs() < y1_2.abs() && ((y1_1 >= 0) == (y1_2 >= 0)) {
                y1_1 = y1_2;
            }
        }

        // 2nd differentials @ x-1 & x-2
        let y2_1 = y0_0 - (y0_1 * 2) + y0_2;
        let y2_2 = y0_1 - (y0_2 * 2) + y0_3;

        let mut edge = None;

        // 2nd zero-crossing is 1st local min/max - could be edge
        let crossing = y2_1 == 0 || (y2_1 > 0 && y2_2 < 0) || (y2_1 < 0 && y2_2 > 0);
        if crossing && self.calc_thresh() <= y1_1.unsigned_abs() {
            // check for 1st sign change
            let y1_rev = if self.y1_sign > 0 { y1_1 < 0 } else { y1_1 > 0 };

            if y1_rev {
                // intensity change reversal - finalize previous edge
                edge = Some(self.process_edge());
            }

            if y1_rev || self.y1_sign.abs() < y1_1.abs() {
                self.y1_sign = y1_1;

                // adaptive thresholding
                // start at multiple of new min/max
                self.y1_thresh = (y1_1.unsigned_abs() * THRESH_INIT + ROUND) >> ZBAR_FIXED;
                if self.y1_thresh < self.y1_min_thresh {
                    self.y1_thresh = self.y1_min_thresh;
                }

                // update current edge
                let d = y2_1 - y2_2;
                self.cur_edge = 1 << ZBAR_FIXED;
                if d == 0 {
                    self.cur_edge >>= 1;
                } else if y2_1 != 0 {
                    // interpolate zero crossing
                    self.cur_edge = self
                        .cur_edge
                        .wrapping_sub((((y2_1 << ZBAR_FIXED) + 1) / d) as u32);
                }
                self.cur_edge = self.cur_edge.wrapping_add(x << ZBAR_FIXED);
            }
        }

        self.x = x.wrapping_add(1);
        edge
    }

    /// Finish the current element at the current position
    ///
    /// Returns `None` once there is nothing left to flush; a trailing
    /// `Some(0)` marks the end of the scan path.
    pub fn flush(&mut self) -> Option<u32> {
        if self.y1_sign == 0 {
            return None;
        }

        let x = (self.x << ZBAR_FIXED).wrapping_add(ROUND);

        if self.cur_edge != x || self.y1_sign > 0 {
            let width = self.process_edge();
            self.cur_edge = x;
            self.y1_sign = -self.y1_sign;
            return Some(width);
        }

        self.y1_sign = 0;
        self.width = 0;
        Some(0)
    }

    /// Start a new scan path, discarding any partially accumulated element
    pub fn new_scan(&mut self) {
        self.x = 0;
        self.y0 = [0; 4];
        self.y1_sign = 0;
        self.y1_thresh = self.y1_min_thresh;
        self.cur_edge = 0;
        self.last_edge = 0;
        self.width = 0;
    }

    /// Reset all scan state; the minimum threshold is kept
    pub fn reset(&mut self) {
        self.new_scan();
    }
}
