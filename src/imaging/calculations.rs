//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::FitMode;

/// Largest width or height a transform may produce.
pub const MAX_DIMENSION: u32 = 16_383;

/// Largest pixel count a transform may produce.
pub const MAX_PIXELS: u64 = MAX_DIMENSION as u64 * MAX_DIMENSION as u64;

/// Whether a `(width, height)` canvas stays within [`MAX_DIMENSION`] and [`MAX_PIXELS`].
///
/// # Examples
/// ```
/// # use imagician::imaging::calculations::{within_limits, MAX_DIMENSION};
/// assert!(within_limits((MAX_DIMENSION, MAX_DIMENSION)));
/// assert!(!within_limits((MAX_DIMENSION + 1, 1)));
/// ```
pub fn within_limits((width, height): (u32, u32)) -> bool {
    width <= MAX_DIMENSION
        && height <= MAX_DIMENSION
        && u64::from(width) * u64::from(height) <= MAX_PIXELS
}

/// How a resized image is placed onto its final canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The resized image is the output.
    Exact,
    /// Center-crop the resized image down to `(width, height)`.
    Crop { width: u32, height: u32 },
    /// Center the resized image on a `(width, height)` canvas.
    Pad { width: u32, height: u32 },
}

/// Result of [`plan_resize`]: scale to `(width, height)`, then apply `placement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub width: u32,
    pub height: u32,
    pub placement: Placement,
}

impl ResizePlan {
    /// Final output dimensions after placement.
    pub fn output(&self) -> (u32, u32) {
        match self.placement {
            Placement::Exact => (self.width, self.height),
            Placement::Crop { width, height } | Placement::Pad { width, height } => {
                (width, height)
            }
        }
    }
}

fn scaled(value: u32, scale: f64) -> u32 {
    ((value as f64 * scale).round() as u32).max(1)
}

/// Calculate resize dimensions and placement for a fit mode.
///
/// `None` on an axis means it does not constrain the result; with a single
/// constrained axis every fit mode scales proportionally to that axis.
/// With `without_enlargement` no scale factor exceeds 1. For `Contain`,
/// a clamped scale also drops the letterbox so the output never exceeds the source.
///
/// # Examples
/// ```
/// # use imagician::imaging::calculations::{plan_resize, Placement};
/// # use imagician::imaging::FitMode;
/// // 1920x1080 covering 800x800 → scale to 1422x800, crop to 800x800
/// let plan = plan_resize((1920, 1080), (Some(800), Some(800)), FitMode::Cover, true);
/// assert_eq!((plan.width, plan.height), (1422, 800));
/// assert_eq!(plan.placement, Placement::Crop { width: 800, height: 800 });
/// ```
pub fn plan_resize(
    source: (u32, u32),
    target: (Option<u32>, Option<u32>),
    fit: FitMode,
    without_enlargement: bool,
) -> ResizePlan {
    let (src_w, src_h) = source;
    let clamp = |scale: f64| {
        if without_enlargement {
            scale.min(1.0)
        } else {
            scale
        }
    };
    let proportional = |scale: f64| ResizePlan {
        width: scaled(src_w, scale),
        height: scaled(src_h, scale),
        placement: Placement::Exact,
    };

    let (tgt_w, tgt_h) = match target {
        (None, None) => return proportional(1.0),
        (Some(w), None) => return proportional(clamp(w as f64 / src_w as f64)),
        (None, Some(h)) => return proportional(clamp(h as f64 / src_h as f64)),
        (Some(w), Some(h)) => (w, h),
    };

    let ratio_w = tgt_w as f64 / src_w as f64;
    let ratio_h = tgt_h as f64 / src_h as f64;

    match fit {
        FitMode::Fill => {
            let (w, h) = if without_enlargement {
                (tgt_w.min(src_w), tgt_h.min(src_h))
            } else {
                (tgt_w, tgt_h)
            };
            ResizePlan {
                width: w,
                height: h,
                placement: Placement::Exact,
            }
        }
        FitMode::Inside => proportional(clamp(ratio_w.min(ratio_h))),
        FitMode::Outside => proportional(clamp(ratio_w.max(ratio_h))),
        FitMode::Cover => {
            let plan = proportional(clamp(ratio_w.max(ratio_h)));
            let crop = (tgt_w.min(plan.width), tgt_h.min(plan.height));
            if crop == (plan.width, plan.height) {
                plan
            } else {
                ResizePlan {
                    placement: Placement::Crop {
                        width: crop.0,
                        height: crop.1,
                    },
                    ..plan
                }
            }
        }
        FitMode::Contain => {
            let scale = ratio_w.min(ratio_h);
            let plan = proportional(clamp(scale));
            if (without_enlargement && scale > 1.0) || (plan.width, plan.height) == (tgt_w, tgt_h)
            {
                plan
            } else {
                ResizePlan {
                    placement: Placement::Pad {
                        width: tgt_w,
                        height: tgt_h,
                    },
                    ..plan
                }
            }
        }
    }
}

/// Offset that centers `inner` within `outer` along one axis.
pub fn center_offset(outer: u32, inner: u32) -> u32 {
    outer.saturating_sub(inner) / 2
}

/// Normalize an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Number of clockwise quarter turns if `degrees` is a right-angle multiple.
pub fn quarter_turns(degrees: f64) -> Option<u8> {
    let normalized = normalize_degrees(degrees);
    let turns = normalized / 90.0;
    let rounded = turns.round();
    ((turns - rounded).abs() < 1e-9).then_some((rounded as u8) % 4)
}

/// Canvas size that fully contains a `(width, height)` image rotated by `degrees`.
pub fn rotated_bounds(source: (u32, u32), degrees: f64) -> (u32, u32) {
    let (w, h) = (source.0 as f64, source.1 as f64);
    if let Some(turns) = quarter_turns(degrees) {
        return if turns % 2 == 0 {
            source
        } else {
            (source.1, source.0)
        };
    }
    let radians = normalize_degrees(degrees).to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    // Shave float noise so e.g. 100.0000000001 does not round up to 101
    let bound = |v: f64| ((v - 1e-9).ceil() as u32).max(1);
    (bound(w * cos + h * sin), bound(w * sin + h * cos))
}
