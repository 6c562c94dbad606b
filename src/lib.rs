//! This crate overlays a configurable grid (rows, columns, line thickness,
//! color, opacity, optional cell numbering) onto a raster image and exports
//! the composited result as a PNG. It uses the `image` and `imageproc` crates
//! for image manipulation and `insta` for snapshot testing.

/// Embedded 5x7 bitmap digits used for cell numbering.
pub mod font;
/// The grid renderer: compositing of grid lines and cell numbers over a
/// source image.
///
/// # Example
/// ```
/// use image::{DynamicImage, RgbaImage};
/// use overgrid::{render::render, RenderParams};
///
/// let source = DynamicImage::ImageRgba8(RgbaImage::new(100, 50));
/// let result = render(&source, &RenderParams::default()).unwrap();
/// assert_eq!(result.dimensions(), (100, 50));
/// ```
pub mod render;
/// Session state: image loading, reset, PNG export and drag-and-drop depth
/// tracking.
pub mod session;

use smallvec::SmallVec;
use thiserror::Error;
use tracing::*;

// Determined through benchmarking typical use cases
const DEFAULT_SMALLVEC_SIZE: usize = 32;

pub const MIN_ROWS: u32 = 1;
pub const MAX_ROWS: u32 = 200;
pub const MIN_COLS: u32 = 1;
pub const MAX_COLS: u32 = 200;
pub const MIN_THICKNESS: u32 = 1;
pub const MAX_THICKNESS: u32 = 100;
pub const MIN_OPACITY: f64 = 0.1;
pub const MAX_OPACITY: f64 = 1.0;

// Cell numbers scale with the smaller cell dimension, within fixed bounds.
const FONT_SIZE_RATIO: f32 = 0.22;
const MIN_FONT_SIZE: f32 = 10.0;
const MAX_FONT_SIZE: f32 = 72.0;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Invalid hex color: {0}")]
    InvalidColor(String),

    #[error("Invalid image dimensions: width={width}, height={height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Failed to encode PNG: {0}")]
    PngEncoding(String),
}

/// A type alias for SmallVec with an optimized stack-allocated buffer size.
pub type SmallVecLine<T> = SmallVec<[T; DEFAULT_SMALLVEC_SIZE]>;

/// An RGB color parsed from a `#RRGGBB` hex string.
///
/// # Example
/// ```
/// use overgrid::Rgb;
///
/// let color = Rgb::from_hex("#ff8800").unwrap();
/// assert_eq!(color, Rgb { r: 255, g: 136, b: 0 });
/// assert_eq!(color.to_hex(), "#ff8800");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// Parses a `#RRGGBB` hex string (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self, GridError> {
        let value = hex.strip_prefix('#').unwrap_or(hex);
        if value.len() != 6 || !value.is_ascii() {
            return Err(GridError::InvalidColor(hex.to_string()));
        }
        let channel = |range| {
            u8::from_str_radix(&value[range], 16)
                .map_err(|_| GridError::InvalidColor(hex.to_string()))
        };
        Ok(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl std::str::FromStr for Rgb {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgb::from_hex(s)
    }
}

/// Clamps an integer control value to its valid range.
///
/// `None` stands for unparseable or non-finite input and falls back to the
/// minimum of the range, matching the input-sanitization policy of the
/// controls.
///
/// # Example
/// ```
/// use overgrid::clamp_int;
///
/// assert_eq!(clamp_int(Some(500), 1, 200), 200);
/// assert_eq!(clamp_int(Some(-5), 1, 200), 1);
/// assert_eq!(clamp_int(None, 1, 200), 1);
/// ```
pub fn clamp_int(value: Option<i64>, min: u32, max: u32) -> u32 {
    match value {
        Some(v) => v.clamp(min as i64, max as i64) as u32,
        None => min,
    }
}

/// Clamps an opacity value to `[0.1, 1.0]`; non-finite or missing input
/// falls back to the minimum.
///
/// # Example
/// ```
/// use overgrid::clamp_opacity;
///
/// assert_eq!(clamp_opacity(Some(2.0)), 1.0);
/// assert_eq!(clamp_opacity(Some(0.0)), 0.1);
/// assert_eq!(clamp_opacity(Some(f64::NAN)), 0.1);
/// ```
pub fn clamp_opacity(value: Option<f64>) -> f32 {
    match value {
        Some(v) if v.is_finite() => v.clamp(MIN_OPACITY, MAX_OPACITY) as f32,
        _ => MIN_OPACITY as f32,
    }
}

/// Parameters for a single render call.
///
/// Immutable per render; re-derived from user input before each render with
/// every field independently clamped to its valid range.
///
/// # Example
/// ```
/// use overgrid::{RenderParams, Rgb};
///
/// let params = RenderParams::default();
/// assert_eq!(params.rows, 3);
/// assert_eq!(params.cols, 3);
/// assert_eq!(params.thickness, 2);
/// assert_eq!(params.color, Rgb::WHITE);
/// assert_eq!(params.opacity, 0.7);
/// assert!(!params.show_numbers);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RenderParams {
    /// Number of grid rows (1..=200)
    pub rows: u32,
    /// Number of grid columns (1..=200)
    pub cols: u32,
    /// Line thickness in pixels (1..=100)
    pub thickness: u32,
    /// Grid line color
    pub color: Rgb,
    /// Grid line opacity (0.1..=1.0)
    pub opacity: f32,
    /// Number the cells in row-major order starting at 1
    pub show_numbers: bool,
}

impl RenderParams {
    /// Builds params from raw control values, clamping each field
    /// independently.
    ///
    /// # Example
    /// ```
    /// use overgrid::{RenderParams, Rgb};
    ///
    /// let params = RenderParams::clamped(0, 500, 1, Rgb::WHITE, 2.0, true);
    /// assert_eq!(params.rows, 1);
    /// assert_eq!(params.cols, 200);
    /// assert_eq!(params.opacity, 1.0);
    /// ```
    pub fn clamped(
        rows: i64,
        cols: i64,
        thickness: i64,
        color: Rgb,
        opacity: f64,
        show_numbers: bool,
    ) -> Self {
        Self {
            rows: clamp_int(Some(rows), MIN_ROWS, MAX_ROWS),
            cols: clamp_int(Some(cols), MIN_COLS, MAX_COLS),
            thickness: clamp_int(Some(thickness), MIN_THICKNESS, MAX_THICKNESS),
            color,
            opacity: clamp_opacity(Some(opacity)),
            show_numbers,
        }
    }

    /// Alpha used for cell numbers: slightly more opaque than the lines.
    pub fn text_alpha(&self) -> f32 {
        (self.opacity + 0.25).min(1.0)
    }

    /// Opacity formatted the way the controls display it (two decimals).
    pub fn opacity_label(&self) -> String {
        format!("{:.2}", self.opacity)
    }
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 3,
            thickness: 2,
            color: Rgb::WHITE,
            opacity: 0.7,
            show_numbers: false,
        }
    }
}

/// Grid line and cell-numbering geometry for a source image of a given size.
///
/// Only interior dividing lines are produced; the outer image edges are never
/// stroked, so `rows = 1` or `cols = 1` yields no lines on that axis.
///
/// # Example
/// ```
/// use overgrid::{make_params, GridGeometry};
///
/// let params = make_params!(rows: 2, cols: 5);
/// let geometry = GridGeometry::compute(100, 50, &params).unwrap();
/// assert_eq!(geometry.vertical_xs.as_slice(), [20.0, 40.0, 60.0, 80.0]);
/// assert_eq!(geometry.horizontal_ys.as_slice(), [25.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GridGeometry {
    pub rows: u32,
    pub cols: u32,
    pub cell_width: f32,
    pub cell_height: f32,
    /// X coordinates of the interior vertical lines, left to right.
    pub vertical_xs: SmallVecLine<f32>,
    /// Y coordinates of the interior horizontal lines, top to bottom.
    pub horizontal_ys: SmallVecLine<f32>,
    /// Cell-number font size in pixels.
    pub font_size: u32,
}

impl GridGeometry {
    /// Computes the grid geometry for a `width` x `height` image.
    pub fn compute(width: u32, height: u32, params: &RenderParams) -> Result<Self, GridError> {
        trace!("Computing grid geometry for {}x{}", width, height);
        if width == 0 || height == 0 {
            error!(
                "Invalid image dimensions: width={}, height={}",
                width, height
            );
            return Err(GridError::InvalidDimensions { width, height });
        }

        let cell_width = width as f32 / params.cols as f32;
        let cell_height = height as f32 / params.rows as f32;

        let vertical_xs = (1..params.cols).map(|i| cell_width * i as f32).collect();
        let horizontal_ys = (1..params.rows).map(|i| cell_height * i as f32).collect();

        let font_size = (cell_width.min(cell_height) * FONT_SIZE_RATIO)
            .clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
            .round() as u32;

        Ok(Self {
            rows: params.rows,
            cols: params.cols,
            cell_width,
            cell_height,
            vertical_xs,
            horizontal_ys,
            font_size,
        })
    }

    /// Iterates over cell labels in row-major order starting at 1, yielding
    /// `(label, center_x, center_y)` for each cell.
    ///
    /// # Example
    /// ```
    /// use overgrid::{make_params, GridGeometry};
    ///
    /// let params = make_params!(rows: 2, cols: 2);
    /// let geometry = GridGeometry::compute(100, 100, &params).unwrap();
    /// let labels: Vec<_> = geometry.cell_centers().collect();
    /// assert_eq!(labels[0], (1, 25.0, 25.0));
    /// assert_eq!(labels[3], (4, 75.0, 75.0));
    /// ```
    pub fn cell_centers(&self) -> impl Iterator<Item = (u32, f32, f32)> + '_ {
        (0..self.rows).flat_map(move |row| {
            (0..self.cols).map(move |col| {
                (
                    row * self.cols + col + 1,
                    (col as f32 + 0.5) * self.cell_width,
                    (row as f32 + 0.5) * self.cell_height,
                )
            })
        })
    }
}

/// Creates a [`RenderParams`] with the defaults overridden field by field.
///
/// # Examples
///
/// ```
/// use overgrid::make_params;
///
/// let params = make_params!(rows: 2, cols: 5, show_numbers: true);
/// assert_eq!(params.rows, 2);
/// assert_eq!(params.cols, 5);
/// assert_eq!(params.thickness, 2); // default
/// ```
#[macro_export]
macro_rules! make_params {
    () => { $crate::RenderParams::default() };
    ($($field:ident : $value:expr),* $(,)?) => {
        $crate::RenderParams {
            $($field: $value,)*
            ..$crate::RenderParams::default()
        }
    };
}
