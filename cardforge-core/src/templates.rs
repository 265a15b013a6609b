//! Template System - Data-described card frames
//!
//! A template names its reference regions, fonts and capability flags. One
//! generic pipeline reads these instead of each frame style carrying its own
//! layout code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::surface::Rect;

pub type TemplateId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template_version: String,
    pub engine_min_version: String,
    #[serde(default)]
    pub deprecated: bool,
    /// Document resolution the regions are expressed in.
    #[serde(default)]
    pub dpi: Option<u32>,
    #[serde(default)]
    pub capabilities: Capabilities,
    pub regions: Regions,
    #[serde(default)]
    pub fonts: Fonts,
    /// Background slots that take light rules text (dark frames).
    #[serde(default)]
    pub light_text_backgrounds: Vec<String>,
    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_true() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Place dividers between blocks. Flavor text becomes its own block.
    #[serde(default = "default_true")]
    pub flavor_divider: bool,
    /// Each oracle line is its own block, spread over the rules box.
    #[serde(default)]
    pub staged_abilities: bool,
    /// Keep the last rules line clear of the power/toughness box.
    #[serde(default = "default_true")]
    pub avoid_pt_box: bool,
    #[serde(default = "default_true")]
    pub center_short_text: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            flavor_divider: true,
            staged_abilities: false,
            avoid_pt_box: true,
            center_short_text: true,
        }
    }
}

/// Reference regions, in document pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Regions {
    pub rules: Rect,
    #[serde(default)]
    pub name: Option<Rect>,
    #[serde(default)]
    pub type_line: Option<Rect>,
    #[serde(default)]
    pub mana_cost: Option<Rect>,
    #[serde(default)]
    pub expansion_symbol: Option<Rect>,
    #[serde(default)]
    pub pt_box: Option<Rect>,
    /// Divider template, hidden once the copies are placed.
    #[serde(default)]
    pub divider: Option<Rect>,
    /// Area staged blocks must stay below when nudged upward.
    #[serde(default)]
    pub top_clearance: Option<Rect>,
}

impl Regions {
    /// Same regions at another resolution.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |r: Option<Rect>| r.map(|r| r.scaled(factor));
        Self {
            rules: self.rules.scaled(factor),
            name: scale(self.name),
            type_line: scale(self.type_line),
            mana_cost: scale(self.mana_cost),
            expansion_symbol: scale(self.expansion_symbol),
            pt_box: scale(self.pt_box),
            divider: scale(self.divider),
            top_clearance: scale(self.top_clearance),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    pub family: String,
    /// Points.
    pub size: f64,
    #[serde(default)]
    pub leading: Option<f64>,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size: f64) -> Self {
        Self { family: family.into(), size, leading: None }
    }

    /// Leading falls back to 120% of the size.
    pub fn leading(&self) -> f64 {
        self.leading.unwrap_or(self.size * 1.2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fonts {
    #[serde(default = "default_rules_font")]
    pub rules: FontSpec,
    #[serde(default = "default_title_font")]
    pub name: FontSpec,
    #[serde(default = "default_type_font")]
    pub type_line: FontSpec,
}

fn default_rules_font() -> FontSpec { FontSpec::new("PlantinMTPro-Regular", 9.5) }
fn default_title_font() -> FontSpec { FontSpec::new("Beleren Bold", 10.0) }
fn default_type_font() -> FontSpec { FontSpec::new("Beleren Bold", 8.5) }

impl Default for Fonts {
    fn default() -> Self {
        Self {
            rules: default_rules_font(),
            name: default_title_font(),
            type_line: default_type_font(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(default)]
    pub failure_mode: FailureMode,
    /// Pixels a block may poke past its region before it counts as overflow.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 { 0.5 }

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            failure_mode: FailureMode::default(),
            tolerance: default_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    #[default]
    Block,
    Warn,
    Log,
}

impl TemplateDescriptor {
    /// Built-in modern frame at 300 dpi (2.5in x 3.5in card, 750x1050px).
    pub fn classic() -> Self {
        Self {
            id: "classic".to_string(),
            name: "Classic Frame".to_string(),
            description: "Modern-border frame with a power/toughness box".to_string(),
            template_version: "1.0.0".to_string(),
            engine_min_version: crate::MIN_TEMPLATE_VERSION.to_string(),
            deprecated: false,
            dpi: Some(300),
            capabilities: Capabilities::default(),
            regions: Regions {
                rules: Rect::new(64.0, 640.0, 686.0, 950.0),
                name: Some(Rect::new(64.0, 50.0, 560.0, 100.0)),
                type_line: Some(Rect::new(64.0, 585.0, 640.0, 625.0)),
                mana_cost: Some(Rect::new(560.0, 50.0, 686.0, 100.0)),
                expansion_symbol: Some(Rect::new(650.0, 588.0, 686.0, 622.0)),
                pt_box: Some(Rect::new(560.0, 930.0, 700.0, 990.0)),
                divider: Some(Rect::new(90.0, 0.0, 660.0, 4.0)),
                top_clearance: None,
            },
            fonts: Fonts::default(),
            light_text_backgrounds: vec!["B".to_string(), "Land".to_string()],
            validation: ValidationConfig::default(),
        }
    }

    /// Saga-style frame: one block per chapter, no power/toughness box.
    pub fn staged() -> Self {
        let classic = Self::classic();
        Self {
            id: "staged".to_string(),
            name: "Staged Abilities".to_string(),
            description: "One block per ability, spread down the rules box".to_string(),
            capabilities: Capabilities {
                staged_abilities: true,
                avoid_pt_box: false,
                center_short_text: false,
                ..Capabilities::default()
            },
            regions: Regions {
                pt_box: None,
                top_clearance: Some(Rect::new(64.0, 600.0, 686.0, 640.0)),
                ..classic.regions
            },
            ..classic
        }
    }
}

/// Template registry - loads and caches templates
pub struct TemplateRegistry {
    templates: HashMap<TemplateId, TemplateDescriptor>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self { templates: HashMap::new() }
    }

    /// Registry holding the frames that ship with the engine.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(TemplateDescriptor::classic());
        registry.register(TemplateDescriptor::staged());
        registry
    }

    /// Loads every `*.json` descriptor in `dir`. Files that fail to read or
    /// parse are skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::new();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map_or(false, |e| e == "json") {
                    let parsed = fs::read_to_string(&path).map_err(|e| e.to_string()).and_then(|c| {
                        serde_json::from_str::<TemplateDescriptor>(&c).map_err(|e| e.to_string())
                    });
                    match parsed {
                        Ok(template) => registry.register(template),
                        Err(e) => warn!(path = %path.display(), error = %e, "skipping template"),
                    }
                }
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&TemplateDescriptor> {
        self.templates.get(id)
    }

    /// Templates sorted by id.
    pub fn list(&self) -> Vec<&TemplateDescriptor> {
        let mut list: Vec<_> = self.templates.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn register(&mut self, template: TemplateDescriptor) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "id": "borderless",
        "name": "Borderless",
        "templateVersion": "1.2.0",
        "engineMinVersion": "1.0.0",
        "regions": {"rules": {"left": 0, "top": 600, "right": 700, "bottom": 900}}
    }"#;

    #[test]
    fn test_minimal_descriptor_defaults() {
        let t: TemplateDescriptor = serde_json::from_str(MINIMAL).unwrap();
        assert!(t.capabilities.flavor_divider);
        assert!(!t.capabilities.staged_abilities);
        assert_eq!(t.validation.failure_mode, FailureMode::Block);
        assert_eq!(t.fonts.rules.leading(), 9.5 * 1.2);
        assert_eq!(t.regions.rules.height(), 300.0);
        assert!(t.regions.pt_box.is_none());
    }

    #[test]
    fn test_validation_block_round_trips_policy_only() {
        let json = MINIMAL.replacen(
            "\"regions\"",
            "\"validation\": {\"failureMode\": \"warn\", \"tolerance\": 2.0},\n        \"regions\"",
            1,
        );
        let t: TemplateDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(t.validation.failure_mode, FailureMode::Warn);
        assert_eq!(t.validation.tolerance, 2.0);

        let value = serde_json::to_value(&TemplateDescriptor::classic()).unwrap();
        let validation = value["validation"].as_object().unwrap();
        let mut keys: Vec<_> = validation.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["failureMode", "tolerance"]);
        assert!(value.get("supersededBy").is_none());
    }

    #[test]
    fn test_load_from_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("borderless.json"), MINIMAL).unwrap();
        let mut bad = fs::File::create(dir.path().join("broken.json")).unwrap();
        bad.write_all(b"{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = TemplateRegistry::load_from_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("borderless").unwrap().template_version, "1.2.0");
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let registry =
            TemplateRegistry::load_from_dir(Path::new("/nonexistent/cardforge")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_builtin_registry() {
        let registry = TemplateRegistry::builtin();
        let ids: Vec<_> = registry.list().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["classic", "staged"]);
        let staged = registry.get("staged").unwrap();
        assert!(staged.capabilities.staged_abilities);
        assert!(staged.regions.pt_box.is_none());
    }
}
