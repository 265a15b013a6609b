//! Frame Resolver - Card colors to frame slot names
//!
//! Total and deterministic: every branch ends in a named slot, ambiguous
//! cases fall back to the generic slots below.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::card::CardLayout;
use crate::color::{ColorSet, ManaColor};
use crate::config::FrameConfig;

pub mod slots {
    pub const LAND: &str = "Land";
    pub const ARTIFACT: &str = "Artifact";
    pub const GOLD: &str = "Gold";
    pub const VEHICLE: &str = "Vehicle";
    pub const COLORLESS: &str = "Colorless";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub background: String,
    pub pinlines: String,
    pub twins: String,
    pub is_colorless: bool,
}

impl FrameSpec {
    fn new(background: &str, pinlines: &str, twins: &str) -> Self {
        Self {
            background: background.to_string(),
            pinlines: pinlines.to_string(),
            twins: twins.to_string(),
            is_colorless: false,
        }
    }

    fn land(pinlines: &str, twins: &str) -> Self {
        Self::new(slots::LAND, pinlines, twins)
    }
}

/// Resolve the frame slots for one card face.
pub fn resolve_frame(card: &CardLayout, config: &FrameConfig) -> FrameSpec {
    let spec = if card.is_land() {
        resolve_land(card, config)
    } else {
        resolve_nonland(card, config)
    };
    debug!(
        card = %card.name,
        background = %spec.background,
        pinlines = %spec.pinlines,
        twins = %spec.twins,
        colorless = spec.is_colorless,
        "resolved frame"
    );
    spec
}

// --- Lands ---

fn resolve_land(card: &CardLayout, config: &FrameConfig) -> FrameSpec {
    let basics = basic_types_in(&card.type_line);
    match basics.len() {
        1 => {
            let mono = canonical_slot(basics);
            return FrameSpec::land(mono, mono);
        }
        2 => return FrameSpec::land(canonical_slot(basics), slots::LAND),
        3 if config.limit() >= 3 => return FrameSpec::land(canonical_slot(basics), slots::LAND),
        _ => {}
    }

    let mut tapped = ColorSet::EMPTY;
    for line in card.oracle_text.lines() {
        let lower = line.to_lowercase();

        if lower.contains("search your library") && !lower.contains("cycling") {
            let fetched = basic_types_in(line);
            match fetched.len() {
                0 => {}
                1 => {
                    let mono = canonical_slot(fetched);
                    return FrameSpec::land(mono, mono);
                }
                2 => return FrameSpec::land(canonical_slot(fetched), slots::LAND),
                _ => return FrameSpec::land(slots::GOLD, slots::GOLD),
            }
        }

        if let Some(rest) = lower.split("each land is a").nth(1) {
            if let Some(color) = first_basic_or_color(rest) {
                let mono = canonical_slot(ColorSet::EMPTY.with(color));
                return FrameSpec::land(mono, mono);
            }
        }

        if lower.contains("add one mana of any color")
            || lower.contains("add one mana of any one color")
        {
            return FrameSpec::land(slots::GOLD, slots::GOLD);
        }

        if let Some(added) = tapped_colors(line) {
            for c in added.iter() {
                tapped.insert(c);
            }
        }
    }

    match tapped.len() {
        0 => FrameSpec::land(slots::LAND, slots::LAND),
        1 => {
            let mono = canonical_slot(tapped);
            FrameSpec::land(mono, mono)
        }
        2 => FrameSpec::land(canonical_slot(tapped), slots::LAND),
        _ => FrameSpec::land(slots::GOLD, slots::GOLD),
    }
}

fn basic_types_in(text: &str) -> ColorSet {
    ManaColor::ALL
        .into_iter()
        .filter(|c| text.contains(c.basic_land_type()))
        .fold(ColorSet::EMPTY, ColorSet::with)
}

fn first_basic_or_color(text: &str) -> Option<ManaColor> {
    ManaColor::ALL
        .into_iter()
        .filter_map(|c| {
            let by_type = text.find(&c.basic_land_type().to_lowercase());
            let by_name = text.find(c.name());
            by_type.into_iter().chain(by_name).min().map(|at| (at, c))
        })
        .min_by_key(|(at, _)| *at)
        .map(|(_, c)| c)
}

/// Colors added by a "{T}: Add ..." line. The tap symbol must come before the
/// line's first colon.
fn tapped_colors(line: &str) -> Option<ColorSet> {
    let colon = line.find(':')?;
    let tap = line.find("{T}")?;
    if tap > colon {
        return None;
    }
    let effect = &line[colon..];
    if !effect.contains("Add") {
        return None;
    }
    let added = ManaColor::ALL
        .into_iter()
        .filter(|c| effect.contains(&format!("{{{}}}", c.letter())))
        .fold(ColorSet::EMPTY, ColorSet::with);
    Some(added)
}

// --- Nonlands ---

fn resolve_nonland(card: &CardLayout, config: &FrameConfig) -> FrameSpec {
    let cost = card.mana_cost.as_str();
    let artifact = card.is_artifact();
    let limit = config.limit();

    let mut identity = if cost.is_empty() || (cost == "{0}" && !artifact) {
        card.color_indicator.unwrap_or(card.color_identity)
    } else {
        cost_colors(cost)
    };
    if card.oracle_text.contains("is all colors") {
        identity = ColorSet::WUBRG;
    }

    let devoid = card.has_frame_effect("devoid") || has_keyword(&card.oracle_text, "Devoid");
    if (identity.is_empty() && !artifact) || (devoid && !identity.is_empty()) {
        let tint = match identity.len() {
            0 => slots::COLORLESS,
            1 => canonical_slot(identity),
            _ => slots::GOLD,
        };
        let mut spec = FrameSpec::new(tint, slots::COLORLESS, tint);
        spec.is_colorless = true;
        return spec;
    }

    let hybrid = identity.len() == 2
        && (has_hybrid_symbol(cost) || (cost.is_empty() && card.multi_faced));

    let mut background = if artifact {
        slots::ARTIFACT
    } else if hybrid {
        canonical_slot(identity)
    } else {
        by_count(identity, limit)
    };
    if card.type_line.contains("Vehicle") {
        background = slots::VEHICLE;
    }

    let pinlines = match identity.len() {
        0 => slots::ARTIFACT,
        1 | 2 => canonical_slot(identity),
        _ => by_count(identity, limit),
    };

    let twins = if hybrid { slots::LAND } else { by_count(identity, limit) };

    FrameSpec::new(background, pinlines, twins)
}

/// Colors literally present in the cost, ignoring color identity.
fn cost_colors(cost: &str) -> ColorSet {
    ColorSet::from_letters(cost)
}

/// A `{X/Y}` symbol with two colored halves, Phyrexian or not.
fn has_hybrid_symbol(cost: &str) -> bool {
    cost.split('{').filter_map(|s| s.split('}').next()).any(|symbol| {
        let colored = symbol
            .split('/')
            .filter(|part| {
                part.len() == 1 && part.chars().all(|c| ManaColor::from_letter(c).is_some())
            })
            .count();
        colored == 2
    })
}

fn has_keyword(oracle_text: &str, keyword: &str) -> bool {
    oracle_text.lines().any(|line| {
        line.split(',')
            .map(str::trim)
            .any(|part| part == keyword || part.starts_with(&format!("{keyword} (")))
    })
}

/// Empty → artifact, mono, combination within the limit, gold beyond it.
fn by_count(identity: ColorSet, limit: usize) -> &'static str {
    match identity.len() {
        0 => slots::ARTIFACT,
        1 => canonical_slot(identity),
        n if n <= limit => canonical_slot(identity),
        _ => slots::GOLD,
    }
}

/// Canonical letters for 1-3 colors, gold for anything wider.
fn canonical_slot(set: ColorSet) -> &'static str {
    set.canonical().unwrap_or(slots::GOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(card: &CardLayout) -> FrameSpec {
        resolve_frame(card, &FrameConfig::default())
    }

    #[test]
    fn test_two_color_creature() {
        let card = CardLayout::new("Azorius Guard")
            .with_cost("{1}{W}{U}")
            .with_type("Creature \u{2014} Human Soldier")
            .with_identity("WU");
        let spec = resolve(&card);
        assert_eq!(spec, FrameSpec::new("WU", "WU", "WU"));
    }

    #[test]
    fn test_mono_color_ignores_wider_identity() {
        let card = CardLayout::new("Noble Hierarch")
            .with_cost("{G}")
            .with_type("Creature \u{2014} Human Druid")
            .with_identity("GWU")
            .with_oracle("{T}: Add {G}, {W}, or {U}.");
        let spec = resolve(&card);
        assert_eq!(spec, FrameSpec::new("G", "G", "G"));
    }

    #[test]
    fn test_three_colors_gold_unless_limit_allows() {
        let card = CardLayout::new("Esper Charm").with_cost("{W}{U}{B}").with_type("Instant");
        assert_eq!(resolve(&card), FrameSpec::new("Gold", "Gold", "Gold"));

        let wide = FrameConfig { multicolor_limit: 3 };
        assert_eq!(resolve_frame(&card, &wide), FrameSpec::new("WUB", "WUB", "WUB"));
    }

    #[test]
    fn test_hybrid_cost() {
        let card = CardLayout::new("Boros Reckoner")
            .with_cost("{R/W}{R/W}{R/W}")
            .with_type("Creature \u{2014} Minotaur Wizard");
        let spec = resolve(&card);
        assert_eq!(spec, FrameSpec::new("RW", "RW", "Land"));
    }

    #[test]
    fn test_generic_hybrid_is_not_two_color_hybrid() {
        assert!(!has_hybrid_symbol("{2/W}{2/W}"));
        assert!(has_hybrid_symbol("{1}{G/U/P}"));
        assert!(!has_hybrid_symbol("{W/P}"));
    }

    #[test]
    fn test_colorless_back_face_uses_indicator() {
        let card = CardLayout::new("Insectile Aberration")
            .with_type("Creature \u{2014} Human Insect")
            .with_identity("U")
            .with_indicator("U")
            .multi_faced();
        assert_eq!(resolve(&card), FrameSpec::new("U", "U", "U"));
    }

    #[test]
    fn test_empty_cost_multi_faced_pair_is_hybrid() {
        let card = CardLayout::new("Back Face")
            .with_type("Creature \u{2014} Spirit")
            .with_indicator("UB")
            .multi_faced();
        assert_eq!(resolve(&card), FrameSpec::new("UB", "UB", "Land"));
    }

    #[test]
    fn test_devoid_two_colors() {
        let card = CardLayout::new("Ruination Guide")
            .with_cost("{2}{B}{R}")
            .with_type("Creature \u{2014} Eldrazi Drone")
            .with_oracle("Devoid (This card has no color.)\nFlying");
        let spec = resolve(&card);
        assert!(spec.is_colorless);
        assert_eq!(spec.background, "Gold");
        assert_eq!(spec.twins, "Gold");
    }

    #[test]
    fn test_devoid_frame_effect_mono() {
        let card = CardLayout::new("Eldrazi Skyspawner")
            .with_cost("{2}{U}")
            .with_type("Creature \u{2014} Eldrazi Drone")
            .with_frame_effect("devoid");
        let spec = resolve(&card);
        assert!(spec.is_colorless);
        assert_eq!(spec.background, "U");
        assert_eq!(spec.pinlines, "Colorless");
    }

    #[test]
    fn test_colorless_non_artifact() {
        let card = CardLayout::new("Kozilek's Return").with_cost("{2}").with_type("Instant");
        let spec = resolve(&card);
        assert!(spec.is_colorless);
        assert_eq!(spec.background, "Colorless");
    }

    #[test]
    fn test_artifact_and_vehicle() {
        let card = CardLayout::new("Sol Ring").with_cost("{1}").with_type("Artifact");
        assert_eq!(resolve(&card), FrameSpec::new("Artifact", "Artifact", "Artifact"));

        let card = CardLayout::new("Smuggler's Copter")
            .with_cost("{2}")
            .with_type("Artifact \u{2014} Vehicle");
        assert_eq!(resolve(&card).background, "Vehicle");

        let card = CardLayout::new("Esika's Chariot")
            .with_cost("{3}{G}")
            .with_type("Legendary Artifact \u{2014} Vehicle");
        assert_eq!(resolve(&card), FrameSpec::new("Vehicle", "G", "G"));
    }

    #[test]
    fn test_all_colors() {
        let card = CardLayout::new("Transguild Courier")
            .with_cost("{4}")
            .with_type("Artifact Creature \u{2014} Golem")
            .with_oracle("Transguild Courier is all colors.");
        let spec = resolve(&card);
        assert_eq!(spec, FrameSpec::new("Artifact", "Gold", "Gold"));
    }

    #[test]
    fn test_zero_cost_non_artifact_uses_identity() {
        let card = CardLayout::new("Ancestral Vision")
            .with_cost("{0}")
            .with_type("Sorcery")
            .with_indicator("U");
        assert_eq!(resolve(&card), FrameSpec::new("U", "U", "U"));
    }

    #[test]
    fn test_dual_land_by_type() {
        let card = CardLayout::new("Tundra").with_type("Land \u{2014} Plains Island");
        assert_eq!(resolve(&card), FrameSpec::new("Land", "WU", "Land"));

        let card = CardLayout::new("Plains").with_type("Basic Land \u{2014} Plains");
        assert_eq!(resolve(&card), FrameSpec::new("Land", "W", "W"));
    }

    #[test]
    fn test_triome_by_type() {
        let card = CardLayout::new("Raugrin Triome")
            .with_type("Land \u{2014} Island Mountain Plains")
            .with_oracle("({T}: Add {U}, {R}, or {W}.)\nCycling {3}");
        assert_eq!(resolve(&card), FrameSpec::new("Land", "Gold", "Gold"));

        let wide = FrameConfig { multicolor_limit: 3 };
        assert_eq!(resolve_frame(&card, &wide), FrameSpec::new("Land", "URW", "Land"));
    }

    #[test]
    fn test_tap_land_two_colors() {
        let card = CardLayout::new("Adarkar Wastes").with_type("Land").with_oracle(
            "{T}: Add {C}.\n{T}: Add {W} or {U}. Adarkar Wastes deals 1 damage to you.",
        );
        assert_eq!(resolve(&card), FrameSpec::new("Land", "WU", "Land"));
    }

    #[test]
    fn test_tap_symbol_after_colon_ignored() {
        assert_eq!(tapped_colors("Whenever you tap: {T} Add {G}"), None);
        assert_eq!(
            tapped_colors("{T}, Pay 1 life: Add {B}.").map(|s| s.wubrg_string()),
            Some("B".into())
        );
    }

    #[test]
    fn test_fetch_lands() {
        let card = CardLayout::new("Flooded Strand").with_type("Land").with_oracle(
            "{T}, Pay 1 life, Sacrifice Flooded Strand: Search your library for a Plains or Island card, put it onto the battlefield, then shuffle.",
        );
        assert_eq!(resolve(&card), FrameSpec::new("Land", "WU", "Land"));

        let card = CardLayout::new("Grasslands").with_type("Land").with_oracle(
            "Search your library for a Forest or Plains card, put it onto the battlefield, then shuffle.",
        );
        assert_eq!(resolve(&card), FrameSpec::new("Land", "GW", "Land"));

        let card = CardLayout::new("Bant Panorama").with_type("Land").with_oracle(
            "{T}: Add {C}.\n{1}, {T}, Sacrifice Bant Panorama: Search your library for a basic Forest, Plains, or Island card, put it onto the battlefield tapped, then shuffle.",
        );
        assert_eq!(resolve(&card), FrameSpec::new("Land", "Gold", "Gold"));
    }

    #[test]
    fn test_cycling_search_is_not_a_fetch() {
        let card = CardLayout::new("Desert Cycler").with_type("Land").with_oracle(
            "{T}: Add {R}.\nBasic landcycling {1}, Swamp cycling: search your library for a Swamp card.",
        );
        assert_eq!(resolve(&card), FrameSpec::new("Land", "R", "R"));
    }

    #[test]
    fn test_each_land_is_a() {
        let card = CardLayout::new("Urborg, Tomb of Yawgmoth")
            .with_type("Legendary Land")
            .with_oracle("Each land is a Swamp in addition to its other land types.");
        assert_eq!(resolve(&card), FrameSpec::new("Land", "B", "B"));
    }

    #[test]
    fn test_any_color_land() {
        let card = CardLayout::new("Command Tower")
            .with_type("Land")
            .with_oracle("{T}: Add one mana of any color in your commander's color identity.");
        assert_eq!(resolve(&card), FrameSpec::new("Land", "Gold", "Gold"));
    }

    #[test]
    fn test_plain_land_fallback() {
        let card = CardLayout::new("Wasteland")
            .with_type("Land")
            .with_oracle("{T}: Add {C}.\n{T}, Sacrifice Wasteland: Destroy target nonbasic land.");
        assert_eq!(resolve(&card), FrameSpec::new("Land", "Land", "Land"));
    }
}
