//! CardForge Core - Card text layout and frame color engine
//!
//! # Guarantees
//! 1. Frame resolution is total: every card gets named slots
//! 2. Symbol substitution always terminates
//! 3. Fitting only ever shrinks text, never below the font floor
//! 4. Blocks keep their text order
//! 5. Every plan is validated before it leaves the engine

pub mod card;
pub mod color;
pub mod config;
pub mod distribute;
pub mod error;
pub mod fitter;
pub mod frame;
pub mod hashing;
pub mod markup;
pub mod pipeline;
pub mod print;
pub mod surface;
pub mod symbols;
pub mod templates;
pub mod validation;

pub use card::CardLayout;
pub use color::{ColorSet, ManaColor};
pub use config::{ConfigError, EngineConfig, FitConfig, FrameConfig, MarkupConfig};
pub use distribute::{nudge_for_obstacle, position_dividers, spread_even, DistributionPlan};
pub use error::LayoutError;
pub use fitter::{avoid_overlap, fit_height, fit_multiple, fit_width, FitOutcome, LayoutBlock};
pub use frame::{resolve_frame, FrameSpec};
pub use hashing::{canonical_json, compute_job_hash, compute_plan_hash};
pub use markup::{format_text, parse_text, strip_reminder_text, FormattedString, ParsedText};
pub use pipeline::{CancelToken, FailurePolicy, PipelineError, RenderPipeline, RenderPlan};
pub use print::{PrintAuthority, PrintSpec};
pub use surface::{ElementId, HeadlessSurface, Rect, RenderSurface, SurfaceError};
pub use symbols::{Palette, SymbolColor, SymbolTable};
pub use templates::{TemplateDescriptor, TemplateId, TemplateRegistry};
pub use validation::{LayoutRule, ValidationResult, ValidationViolation, ViolationSeverity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_TEMPLATE_VERSION: &str = "1.0.0";
