//! Print Authority System
//!
//! Decides which document resolution point-valued constants are scaled to.

use serde::{Deserialize, Serialize};

/// PrintAuthority determines where the document resolution comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintAuthority {
    /// System defaults (fallback)
    #[default]
    System,
    /// Template-declared resolution
    Template,
    /// User-provided override (validated)
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrintSpec {
    pub authority: PrintAuthority,
    pub dpi: u32,
}

pub const POINTS_PER_INCH: f64 = 72.0;

impl Default for PrintSpec {
    fn default() -> Self {
        Self {
            authority: PrintAuthority::System,
            dpi: 300,
        }
    }
}

impl PrintSpec {
    pub fn from_template(dpi: u32) -> Self {
        Self {
            authority: PrintAuthority::Template,
            dpi,
        }
    }

    /// Create from user with validation
    pub fn from_user(dpi: u32) -> Result<Self, &'static str> {
        if !(72..=1200).contains(&dpi) {
            return Err("DPI must be between 72 and 1200");
        }
        Ok(Self {
            authority: PrintAuthority::User,
            dpi,
        })
    }

    /// User override wins over the template, the template over the system.
    pub fn resolve(template_dpi: Option<u32>, user: Option<PrintSpec>) -> Self {
        match (user, template_dpi) {
            (Some(user), _) => user,
            (None, Some(dpi)) => Self::from_template(dpi),
            (None, None) => Self::default(),
        }
    }

    pub fn scale(&self, points: f64) -> f64 {
        points * f64::from(self.dpi) / POINTS_PER_INCH
    }
}
