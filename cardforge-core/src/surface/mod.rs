//! Render Surface - The narrow interface to whatever owns the document
//!
//! Fitting and distribution only measure and move elements through this
//! trait. A host automation bridge, a native canvas or the bundled
//! `HeadlessSurface` can all sit behind it.

mod headless;

pub use headless::HeadlessSurface;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::markup::FormattedString;

/// Handle of an element (text layer, shape, reference placeholder) owned by
/// the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u32);

impl ElementId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({})", self.0)
    }
}

/// Axis-aligned rectangle in document pixels. `top < bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn from_size(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Every coordinate multiplied by `factor`, e.g. to move between resolutions.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.left * factor, self.top * factor, self.right * factor, self.bottom * factor)
    }

    /// Vertical overlap with `other`; zero when they are apart.
    pub fn vertical_overlap(&self, other: &Rect) -> f64 {
        (self.bottom.min(other.bottom) - self.top.max(other.top)).max(0.0)
    }

    pub fn overlaps_horizontally(&self, other: &Rect) -> bool {
        self.left < other.right && other.left < self.right
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Fixed point kept in place by `resize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    TopLeft,
    Top,
    Center,
    Bottom,
    BottomRight,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Unknown element: {0}")]
    UnknownElement(ElementId),

    #[error("{0} is not a text element")]
    NotText(ElementId),

    #[error("Host error: {0}")]
    Host(String),
}

/// Measurement and mutation primitives the layout engine relies on.
///
/// Measurements are post-rasterization ink bounds, not nominal box bounds.
/// Every point-valued constant goes through `scale_by_dpi` before it is
/// compared with a measurement.
pub trait RenderSurface {
    fn measure(&self, element: ElementId) -> Result<Size, SurfaceError>;

    fn set_font(
        &mut self,
        element: ElementId,
        family: &str,
        size: f64,
        leading: f64,
    ) -> Result<(), SurfaceError>;

    fn set_text(&mut self, element: ElementId, content: &FormattedString)
        -> Result<(), SurfaceError>;

    fn bounds(&self, element: ElementId) -> Result<Rect, SurfaceError>;

    fn translate(&mut self, element: ElementId, dx: f64, dy: f64) -> Result<(), SurfaceError>;

    fn resize(
        &mut self,
        element: ElementId,
        scale_percent: f64,
        anchor: Anchor,
    ) -> Result<(), SurfaceError>;

    fn duplicate(&mut self, element: ElementId) -> Result<ElementId, SurfaceError>;

    fn set_visible(&mut self, element: ElementId, visible: bool) -> Result<(), SurfaceError>;

    /// Vertical baseline shift in points, positive moves text up.
    fn set_baseline_shift(&mut self, element: ElementId, shift: f64) -> Result<(), SurfaceError>;

    /// Points to document pixels.
    fn scale_by_dpi(&self, points: f64) -> f64;
}
