//! Component classification and display-value derivation.
//!
//! Supplier data only carries free text, so the kind of component is guessed
//! from keywords in its category names and introduction, and the display
//! value is pulled out of that text accordingly:
//!
//! | Kind | Display value |
//! |------|---------------|
//! | Resistor | first resistance in the introduction (`10kΩ`) |
//! | Capacitor / Inductor | first capacitance or inductance (`10µF`, `1µH`) |
//! | Active | model with manufacturer suffixes stripped |
//! | Unknown | raw model |
//!
//! Passive kinds fall back to the raw model when no quantity is found.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::supplier::ApiDetails;

/// Micro sign used for the `u` multiplier.
pub const MICRO_SIGN: char = '\u{b5}';

/// Broad component kind, decided from supplier text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Resistors of any construction.
    Resistor,
    /// Capacitors of any dielectric.
    Capacitor,
    /// Inductors, coils and chokes.
    Inductor,
    /// Semiconductors and ICs.
    Active,
    /// Nothing matched.
    Unknown,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resistor => "resistor",
            Self::Capacitor => "capacitor",
            Self::Inductor => "inductor",
            Self::Active => "active",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

fn active_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:transistors?|mosfets?|diodes?|leds?|regulators?|microcontrollers?|mcus?|ics?|amplifiers?|op-?amps?|converters?|drivers?|sensors?|optocouplers?|crystals?|oscillators?|interface)\b",
        )
        .expect("active keyword pattern is valid")
    })
}

fn resistance_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)([kMG]?)\s?(?:Ω|Ohms?\b|ohms?\b)")
            .expect("resistance pattern is valid")
    })
}

fn reactance_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)([pnumµ]?)([FH])\b").expect("capacitance pattern is valid")
    })
}

fn trailing_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,_-][A-Za-z0-9]{1,4}$").expect("suffix pattern is valid"))
}

fn trailing_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[_-]?C\d{3,}$").expect("id suffix pattern is valid"))
}

fn part_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_,-]+$").expect("part number pattern is valid"))
}

/// Classifies a component from its category names and introduction.
///
/// Passive keywords are checked first, so a "Ceramic Capacitor" that also
/// mentions an IC package is still a capacitor.
#[must_use]
pub fn classify(details: &ApiDetails) -> ComponentKind {
    let text = [
        details.category(),
        details.parent_category(),
        details.introduction(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");
    let lower = text.to_lowercase();

    if lower.contains("resistor") {
        ComponentKind::Resistor
    } else if lower.contains("capacitor") {
        ComponentKind::Capacitor
    } else if ["inductor", "coil", "choke"].iter().any(|k| lower.contains(k)) {
        ComponentKind::Inductor
    } else if active_re().is_match(&text) {
        ComponentKind::Active
    } else {
        ComponentKind::Unknown
    }
}

/// First resistance quantity in `text`, normalised to `Ω`.
#[must_use]
pub fn extract_resistance(text: &str) -> Option<String> {
    resistance_re()
        .captures(text)
        .map(|caps| format!("{}{}Ω", &caps[1], &caps[2]))
}

/// First capacitance or inductance quantity in `text`.
///
/// A `u` multiplier is rendered as the micro sign.
#[must_use]
pub fn extract_reactance(text: &str) -> Option<String> {
    reactance_re().captures(text).map(|caps| {
        let multiplier = match &caps[2] {
            "u" => MICRO_SIGN.to_string(),
            other => other.to_string(),
        };
        format!("{}{multiplier}{}", &caps[1], &caps[3])
    })
}

/// Strips manufacturer ordering suffixes from a model string.
///
/// Removes one trailing `[,_-]` + 1-4 alphanumerics and one trailing
/// supplier-id-shaped suffix (`-C15`). Returns the model unchanged if
/// stripping would leave nothing.
#[must_use]
pub fn strip_model_suffix(model: &str) -> String {
    let stripped = trailing_suffix_re().replace(model, "");
    let stripped = trailing_id_re().replace(&stripped, "");
    if stripped.is_empty() {
        model.to_string()
    } else {
        stripped.into_owned()
    }
}

/// Display value for a component of `kind`.
///
/// Returns `None` only when nothing kind-specific matched and there is no
/// model to fall back to.
#[must_use]
pub fn display_value(details: &ApiDetails, kind: ComponentKind) -> Option<String> {
    let intro = details.introduction().unwrap_or_default();
    let model = details.model().filter(|m| !m.is_empty());

    let derived = match kind {
        ComponentKind::Resistor => extract_resistance(intro),
        ComponentKind::Capacitor | ComponentKind::Inductor => extract_reactance(intro),
        ComponentKind::Active => model.map(strip_model_suffix),
        ComponentKind::Unknown => None,
    };

    derived.or_else(|| model.map(str::to_string))
}

/// Heuristic: does `value` look like a raw manufacturer part number?
///
/// Only such values are replaced, so a value someone already cleaned up
/// (or a proper electrical value like `10kΩ`) is left alone.
#[must_use]
pub fn looks_like_part_number(value: &str) -> bool {
    value.chars().count() > 6 && part_number_re().is_match(value)
}

/// Supplier introduction with trailing RoHS markers removed.
#[must_use]
pub fn clean_description(intro: &str) -> String {
    let mut text = intro.trim();
    loop {
        let before = text;
        for marker in ["RoHS", "ROHS"] {
            if let Some(rest) = text.strip_suffix(marker) {
                text = rest.trim_end();
            }
        }
        if text == before {
            return text.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(value: serde_json::Value) -> ApiDetails {
        ApiDetails::from_result(value).unwrap()
    }

    #[test]
    fn classify_resistor() {
        let d = details(json!({
            "productIntroEn": "10kΩ ±1% 1/8W 0805 Thick Film Resistors",
            "parentCatalogName": "Resistors",
            "catalogName": "Chip Resistor",
        }));
        assert_eq!(classify(&d), ComponentKind::Resistor);
    }

    #[test]
    fn classify_capacitor() {
        let d = details(json!({
            "productIntroEn": "100nF 50V X7R ±10% 0805 Multilayer Ceramic Capacitors",
            "parentCatalogName": "Capacitors",
            "catalogName": "MLCC",
        }));
        assert_eq!(classify(&d), ComponentKind::Capacitor);
    }

    #[test]
    fn classify_inductor() {
        let d = details(json!({
            "productIntroEn": "1uH ±20% 3A 0805 Power Inductors",
            "parentCatalogName": "Inductors",
            "catalogName": "Power Inductor",
        }));
        assert_eq!(classify(&d), ComponentKind::Inductor);
    }

    #[test]
    fn classify_active() {
        let d = details(json!({
            "productIntroEn": "Buck Converter IC 3.5V-40V 3A TO-263",
            "parentCatalogName": "Power Management",
            "catalogName": "Voltage Regulator",
        }));
        assert_eq!(classify(&d), ComponentKind::Active);

        let d = details(json!({
            "productIntroEn": "N-Channel MOSFET 30V 5A SOT-23",
            "parentCatalogName": "Transistors",
        }));
        assert_eq!(classify(&d), ComponentKind::Active);
    }

    #[test]
    fn classify_unknown() {
        let d = details(json!({
            "productIntroEn": "Some unknown component",
            "parentCatalogName": "Other",
            "catalogName": "Misc",
        }));
        assert_eq!(classify(&d), ComponentKind::Unknown);
    }

    #[test]
    fn led_keyword_needs_word_boundary() {
        let d = details(json!({ "productIntroEn": "Controlled enclosure" }));
        assert_eq!(classify(&d), ComponentKind::Unknown);
    }

    #[test]
    fn resistor_values() {
        assert_eq!(
            extract_resistance("10kΩ ±1% 1/8W 0805 Thick Film Resistors RoHS").as_deref(),
            Some("10kΩ")
        );
        assert_eq!(extract_resistance("1MΩ ±5% 1/4W 1206").as_deref(), Some("1MΩ"));
        assert_eq!(extract_resistance("4.7kOhm 0603").as_deref(), Some("4.7kΩ"));
        assert_eq!(extract_resistance("no quantity here"), None);
    }

    #[test]
    fn capacitor_and_inductor_values() {
        assert_eq!(extract_reactance("10uF 25V X5R ±10% 0805").as_deref(), Some("10µF"));
        assert_eq!(extract_reactance("100nF 50V X7R").as_deref(), Some("100nF"));
        assert_eq!(extract_reactance("1uH ±20% 3A").as_deref(), Some("1µH"));
        assert_eq!(extract_reactance("2.2pF 50V").as_deref(), Some("2.2pF"));
        assert_eq!(extract_reactance("25V 0805"), None);
    }

    #[test]
    fn model_suffixes() {
        assert_eq!(strip_model_suffix("LM358DR-C15"), "LM358DR");
        assert_eq!(strip_model_suffix("LM2596S-5.0/TR"), "LM2596S-5.0/TR");
        assert_eq!(strip_model_suffix("AO3400A_C20917"), "AO3400A");
        assert_eq!(strip_model_suffix("STM32F103C8T6"), "STM32F103C8T6");
        assert_eq!(strip_model_suffix("-R"), "-R");
    }

    #[test]
    fn display_value_per_kind() {
        let d = details(json!({
            "productIntroEn": "10kΩ ±1% 1/8W 0805 Thick Film Resistors",
            "productModel": "0805W8F1002T5E",
        }));
        assert_eq!(display_value(&d, ComponentKind::Resistor).as_deref(), Some("10kΩ"));

        let d = details(json!({
            "productIntroEn": "10uF 25V X5R ±10% 0805 Multilayer Ceramic Capacitors",
            "productModel": "CL21A106KPFNNNE",
        }));
        assert_eq!(display_value(&d, ComponentKind::Capacitor).as_deref(), Some("10µF"));

        let d = details(json!({
            "productIntroEn": "Operational Amplifier",
            "productModel": "LM358DR-C15",
        }));
        assert_eq!(display_value(&d, ComponentKind::Active).as_deref(), Some("LM358DR"));
    }

    #[test]
    fn display_value_falls_back_to_model() {
        let d = details(json!({
            "productIntroEn": "Some component without value",
            "productModel": "TEST123",
        }));
        assert_eq!(display_value(&d, ComponentKind::Resistor).as_deref(), Some("TEST123"));
        assert_eq!(display_value(&d, ComponentKind::Unknown).as_deref(), Some("TEST123"));
    }

    #[test]
    fn display_value_without_model() {
        let d = details(json!({
            "productIntroEn": "Component description",
            "productModel": "",
        }));
        assert_eq!(display_value(&d, ComponentKind::Unknown), None);
    }

    #[test]
    fn part_number_heuristic() {
        assert!(looks_like_part_number("0805W8F1002T5E"));
        assert!(looks_like_part_number("CL21A106KAYNNNE"));
        assert!(!looks_like_part_number("10kΩ"));
        assert!(!looks_like_part_number("LM358"));
        assert!(!looks_like_part_number("LM2596S-5.0/TR"));
    }

    #[test]
    fn rohs_markers_removed() {
        assert_eq!(clean_description("Buck Converter IC RoHS"), "Buck Converter IC");
        assert_eq!(clean_description("  Diode ROHS  "), "Diode");
        assert_eq!(clean_description("Plain"), "Plain");
        assert_eq!(clean_description("RoHS"), "");
    }
}
