//! Layout errors raised by the fitter and the distributor

use thiserror::Error;

use crate::surface::{ElementId, SurfaceError};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("{element} still overflows by {overflow:.1}px at the {floor}pt font floor")]
    FitImpossible {
        element: ElementId,
        floor: f64,
        overflow: f64,
    },

    #[error("Obstacle still overlaps by {overlap:.1}px after {iterations} iterations")]
    ObstacleUnresolvable { iterations: u32, overlap: f64 },

    #[error("Fit step must be positive, got {0}")]
    InvalidStep(f64),
}
