//! Layout Validation - Rule/Policy Separation
//!
//! Rules inspect a finished layout and produce structured violations.
//! The template's failure mode maps violations to pass/fail.

use serde::{Deserialize, Serialize};

use crate::markup::Diagnostic;
use crate::surface::{ElementId, Rect};
use crate::templates::{FailureMode, TemplateDescriptor};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub element: Option<ElementId>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub template_id: String,
    pub template_version: String,
}

impl ValidationResult {
    pub fn success(template: &TemplateDescriptor) -> Self {
        Self {
            valid: true,
            violations: vec![],
            template_id: template.id.clone(),
            template_version: template.template_version.clone(),
        }
    }

    pub fn failure(template: &TemplateDescriptor, violations: Vec<ValidationViolation>) -> Self {
        Self {
            valid: false,
            violations,
            template_id: template.id.clone(),
            template_version: template.template_version.clone(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Measured state of one laid-out block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSnapshot {
    pub element: ElementId,
    pub bounds: Rect,
    pub original_size: f64,
    pub font_size: f64,
}

/// Input for validation: the rules box after fitting and distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSnapshot {
    pub region: Rect,
    /// In the order they were laid out.
    pub blocks: Vec<BlockSnapshot>,
    #[serde(default)]
    pub obstacle: Option<Rect>,
    pub min_font_size: f64,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// Layout rule trait - produces violations
pub trait LayoutRule {
    fn name(&self) -> &'static str;
    fn validate(
        &self,
        layout: &LayoutSnapshot,
        template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation>;
}

fn violation(
    rule: &str,
    severity: ViolationSeverity,
    message: String,
    element: Option<ElementId>,
    remediation: &str,
) -> ValidationViolation {
    ValidationViolation {
        rule: rule.to_string(),
        severity,
        message,
        element,
        expected: None,
        actual: None,
        remediation: vec![remediation.to_string()],
    }
}

// --- Concrete Rules ---

pub struct RegionOverflowRule;

impl LayoutRule for RegionOverflowRule {
    fn name(&self) -> &'static str { "region_overflow" }

    fn validate(
        &self,
        layout: &LayoutSnapshot,
        template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        let tolerance = template.validation.tolerance;
        layout
            .blocks
            .iter()
            .filter(|b| {
                b.bounds.top < layout.region.top - tolerance
                    || b.bounds.bottom > layout.region.bottom + tolerance
            })
            .map(|b| ValidationViolation {
                expected: Some(format!("{:.1}..{:.1}", layout.region.top, layout.region.bottom)),
                actual: Some(format!("{:.1}..{:.1}", b.bounds.top, b.bounds.bottom)),
                ..violation(
                    self.name(),
                    ViolationSeverity::Error,
                    format!("{} extends past the rules box", b.element),
                    Some(b.element),
                    "Shorten the text or lower the template's base font size",
                )
            })
            .collect()
    }
}

pub struct BlockOverlapRule;

impl LayoutRule for BlockOverlapRule {
    fn name(&self) -> &'static str { "block_overlap" }

    fn validate(
        &self,
        layout: &LayoutSnapshot,
        template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        let tolerance = template.validation.tolerance;
        layout
            .blocks
            .windows(2)
            .filter(|pair| pair[0].bounds.vertical_overlap(&pair[1].bounds) > tolerance)
            .map(|pair| {
                violation(
                    self.name(),
                    ViolationSeverity::Error,
                    format!("{} overlaps {}", pair[0].element, pair[1].element),
                    Some(pair[1].element),
                    "Increase the rules box or reduce the number of blocks",
                )
            })
            .collect()
    }
}

pub struct BlockOrderRule;

impl LayoutRule for BlockOrderRule {
    fn name(&self) -> &'static str { "block_order" }

    fn validate(
        &self,
        layout: &LayoutSnapshot,
        _template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        layout
            .blocks
            .windows(2)
            .filter(|pair| pair[1].bounds.top < pair[0].bounds.top)
            .map(|pair| {
                violation(
                    self.name(),
                    ViolationSeverity::Error,
                    format!("{} was placed above {}", pair[1].element, pair[0].element),
                    Some(pair[1].element),
                    "Report this layout; blocks must keep their text order",
                )
            })
            .collect()
    }
}

pub struct ObstacleClearanceRule;

impl LayoutRule for ObstacleClearanceRule {
    fn name(&self) -> &'static str { "obstacle_clearance" }

    fn validate(
        &self,
        layout: &LayoutSnapshot,
        template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        let (Some(obstacle), Some(last)) = (layout.obstacle, layout.blocks.last()) else {
            return vec![];
        };
        if !last.bounds.overlaps_horizontally(&obstacle) {
            return vec![];
        }
        let overlap = last.bounds.vertical_overlap(&obstacle);
        if overlap <= template.validation.tolerance {
            return vec![];
        }
        vec![ValidationViolation {
            actual: Some(format!("{overlap:.1}px")),
            ..violation(
                self.name(),
                ViolationSeverity::Error,
                "Last block runs into the power/toughness box".to_string(),
                Some(last.element),
                "Shorten the rules text",
            )
        }]
    }
}

pub struct FontFloorRule;

impl LayoutRule for FontFloorRule {
    fn name(&self) -> &'static str { "font_floor" }

    fn validate(
        &self,
        layout: &LayoutSnapshot,
        _template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        layout
            .blocks
            .iter()
            .filter(|b| b.font_size <= layout.min_font_size + 1e-6)
            .map(|b| ValidationViolation {
                expected: Some(format!("> {}pt", layout.min_font_size)),
                actual: Some(format!("{:.2}pt", b.font_size)),
                ..violation(
                    self.name(),
                    ViolationSeverity::Warning,
                    format!("{} shrank to the font floor", b.element),
                    Some(b.element),
                    "Text at this size may be unreadable in print",
                )
            })
            .collect()
    }
}

pub struct UnresolvedSymbolRule;

impl LayoutRule for UnresolvedSymbolRule {
    fn name(&self) -> &'static str { "unresolved_symbol" }

    fn validate(
        &self,
        layout: &LayoutSnapshot,
        _template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        layout
            .diagnostics
            .iter()
            .map(|d| match d {
                Diagnostic::UnresolvableSymbolToken { token, offset } => violation(
                    self.name(),
                    ViolationSeverity::Warning,
                    format!("Symbol token {token} at {offset} has no glyph"),
                    None,
                    "Add the token to the symbol table or fix the card text",
                ),
            })
            .collect()
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn LayoutRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(RegionOverflowRule),
                Box::new(BlockOverlapRule),
                Box::new(BlockOrderRule),
                Box::new(ObstacleClearanceRule),
                Box::new(FontFloorRule),
                Box::new(UnresolvedSymbolRule),
            ],
        }
    }

    pub fn with_rule(mut self, rule: Box<dyn LayoutRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn validate(
        &self,
        layout: &LayoutSnapshot,
        template: &TemplateDescriptor,
    ) -> ValidationResult {
        let all_violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(layout, template))
            .collect();

        match template.validation.failure_mode {
            FailureMode::Block => {
                // Warnings never block
                let errors: Vec<_> = all_violations
                    .iter()
                    .filter(|v| v.severity == ViolationSeverity::Error)
                    .cloned()
                    .collect();
                if errors.is_empty() {
                    ValidationResult {
                        violations: all_violations,
                        ..ValidationResult::success(template)
                    }
                } else {
                    ValidationResult::failure(template, all_violations)
                }
            }
            FailureMode::Warn | FailureMode::Log => ValidationResult {
                violations: all_violations,
                ..ValidationResult::success(template)
            },
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: u32, top: f64, bottom: f64, size: f64) -> BlockSnapshot {
        BlockSnapshot {
            element: ElementId::new(id),
            bounds: Rect::new(10.0, top, 200.0, bottom),
            original_size: 9.5,
            font_size: size,
        }
    }

    fn layout(blocks: Vec<BlockSnapshot>) -> LayoutSnapshot {
        LayoutSnapshot {
            region: Rect::new(0.0, 0.0, 300.0, 300.0),
            blocks,
            obstacle: None,
            min_font_size: 4.0,
            diagnostics: vec![],
        }
    }

    fn rules_of(result: &ValidationResult) -> Vec<&str> {
        result.violations.iter().map(|v| v.rule.as_str()).collect()
    }

    #[test]
    fn test_clean_layout_passes() {
        let template = TemplateDescriptor::classic();
        let blocks = vec![block(0, 10.0, 90.0, 9.5), block(1, 100.0, 200.0, 9.5)];
        let result = Validator::new().validate(&layout(blocks), &template);
        assert!(result.valid);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_overflow_and_overlap_block() {
        let template = TemplateDescriptor::classic();
        let snapshot = layout(vec![block(0, 10.0, 150.0, 9.5), block(1, 120.0, 320.0, 9.5)]);
        let result = Validator::new().validate(&snapshot, &template);
        assert!(!result.valid);
        assert_eq!(rules_of(&result), vec!["region_overflow", "block_overlap"]);
    }

    #[test]
    fn test_order_violation() {
        let template = TemplateDescriptor::classic();
        let snapshot = layout(vec![block(0, 150.0, 200.0, 9.5), block(1, 10.0, 60.0, 9.5)]);
        let result = Validator::new().validate(&snapshot, &template);
        assert_eq!(rules_of(&result), vec!["block_order"]);
        assert!(!result.valid);
    }

    #[test]
    fn test_obstacle_clearance() {
        let template = TemplateDescriptor::classic();
        let mut snapshot = layout(vec![block(0, 200.0, 290.0, 9.5)]);
        snapshot.obstacle = Some(Rect::new(150.0, 280.0, 300.0, 300.0));
        let result = Validator::new().validate(&snapshot, &template);
        assert_eq!(rules_of(&result), vec!["obstacle_clearance"]);
    }

    #[test]
    fn test_warnings_do_not_block() {
        let template = TemplateDescriptor::classic();
        let mut snapshot = layout(vec![block(0, 10.0, 90.0, 4.0)]);
        snapshot.diagnostics.push(Diagnostic::UnresolvableSymbolToken {
            token: "{ZZ}".to_string(),
            offset: 3,
        });
        let result = Validator::new().validate(&snapshot, &template);
        assert!(result.valid);
        assert!(!result.has_errors());
        assert_eq!(rules_of(&result), vec!["font_floor", "unresolved_symbol"]);
    }

    #[test]
    fn test_warn_mode_never_blocks() {
        let mut template = TemplateDescriptor::classic();
        template.validation.failure_mode = FailureMode::Warn;
        let snapshot = layout(vec![block(0, 10.0, 400.0, 9.5)]);
        let result = Validator::new().validate(&snapshot, &template);
        assert!(result.valid);
        assert!(result.has_errors());
    }
}
