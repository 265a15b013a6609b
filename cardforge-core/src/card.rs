//! Card Data - Read-only layout of one card face

use serde::{Deserialize, Serialize};

use crate::color::ColorSet;

/// Card data as delivered by the external provider. Field names follow the
/// usual card-database JSON (snake_case).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardLayout {
    pub name: String,
    #[serde(default)]
    pub mana_cost: String,
    #[serde(default)]
    pub type_line: String,
    #[serde(default)]
    pub oracle_text: String,
    #[serde(default)]
    pub flavor_text: String,
    #[serde(default)]
    pub power: Option<String>,
    #[serde(default)]
    pub toughness: Option<String>,
    #[serde(default)]
    pub loyalty: Option<String>,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub color_identity: ColorSet,
    #[serde(default)]
    pub color_indicator: Option<ColorSet>,
    #[serde(default)]
    pub frame_effects: Vec<String>,
    #[serde(default, rename = "set")]
    pub set_code: String,
    #[serde(default)]
    pub artist: String,
    /// Face of a transforming or modal double-faced card.
    #[serde(default)]
    pub multi_faced: bool,
}

impl CardLayout {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cost(mut self, mana_cost: impl Into<String>) -> Self {
        self.mana_cost = mana_cost.into();
        self
    }

    #[must_use]
    pub fn with_type(mut self, type_line: impl Into<String>) -> Self {
        self.type_line = type_line.into();
        self
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle_text: impl Into<String>) -> Self {
        self.oracle_text = oracle_text.into();
        self
    }

    #[must_use]
    pub fn with_flavor(mut self, flavor_text: impl Into<String>) -> Self {
        self.flavor_text = flavor_text.into();
        self
    }

    #[must_use]
    pub fn with_identity(mut self, letters: &str) -> Self {
        self.color_identity = ColorSet::from_letters(letters);
        self
    }

    #[must_use]
    pub fn with_indicator(mut self, letters: &str) -> Self {
        self.color_indicator = Some(ColorSet::from_letters(letters));
        self
    }

    #[must_use]
    pub fn with_frame_effect(mut self, effect: impl Into<String>) -> Self {
        self.frame_effects.push(effect.into());
        self
    }

    #[must_use]
    pub fn with_pt(mut self, power: &str, toughness: &str) -> Self {
        self.power = Some(power.to_string());
        self.toughness = Some(toughness.to_string());
        self
    }

    #[must_use]
    pub fn multi_faced(mut self) -> Self {
        self.multi_faced = true;
        self
    }

    pub fn is_land(&self) -> bool {
        self.type_line.contains("Land")
    }

    pub fn is_artifact(&self) -> bool {
        self.type_line.contains("Artifact")
    }

    pub fn is_creature(&self) -> bool {
        self.power.is_some() && self.toughness.is_some()
    }

    pub fn has_frame_effect(&self, effect: &str) -> bool {
        self.frame_effects.iter().any(|e| e.eq_ignore_ascii_case(effect))
    }
}
