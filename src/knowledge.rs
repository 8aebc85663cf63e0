//! Static cause/remedy knowledge for common crop conditions, plus the
//! crop-to-scientific-name table. Both tables are baked in at compile time
//! and only ever read.

/// Cause and remedy text for one disease family.
pub struct ConditionKnowledge {
    pub reason: &'static str,
    pub solutions: &'static [&'static str],
}

/// Keyed by lowercase disease name. Matching is by substring containment,
/// so keys must stay lowercase.
static DISEASE_KNOWLEDGE: &[(&str, ConditionKnowledge)] = &[
    (
        "leaf spot",
        ConditionKnowledge {
            reason: "Caused by fungal pathogens that thrive in humid conditions with poor air circulation",
            solutions: &[
                "Apply copper-based fungicide",
                "Remove affected leaves",
                "Improve air circulation around plants",
                "Avoid overhead watering",
            ],
        },
    ),
    (
        "blight",
        ConditionKnowledge {
            reason: "Caused by fungal spores that spread rapidly in wet conditions and high humidity",
            solutions: &[
                "Use resistant varieties",
                "Apply preventive fungicide",
                "Ensure proper drainage",
                "Rotate crops annually",
            ],
        },
    ),
    (
        "powdery mildew",
        ConditionKnowledge {
            reason: "Caused by fungal spores that develop in dry conditions with high humidity at night",
            solutions: &[
                "Increase air circulation",
                "Apply sulfur-based fungicide",
                "Avoid high humidity",
                "Prune affected areas",
            ],
        },
    ),
    (
        "rust",
        ConditionKnowledge {
            reason: "Caused by rust fungi that spread through wind-borne spores in humid weather",
            solutions: &[
                "Apply fungicide containing triazole",
                "Remove infected plant parts",
                "Improve air circulation",
                "Avoid overhead irrigation",
            ],
        },
    ),
    (
        "downy mildew",
        ConditionKnowledge {
            reason: "Caused by water molds that thrive in cool, wet conditions",
            solutions: &[
                "Apply copper fungicide",
                "Ensure good drainage",
                "Space plants properly",
                "Use resistant varieties",
            ],
        },
    ),
    (
        "bacterial spot",
        ConditionKnowledge {
            reason: "Caused by bacterial pathogens that enter through wounds or natural openings",
            solutions: &[
                "Apply copper-based bactericide",
                "Avoid overhead watering",
                "Remove infected leaves",
                "Use disease-free seeds",
            ],
        },
    ),
    (
        "fungal infection",
        ConditionKnowledge {
            reason: "Caused by various fungal pathogens that infect through spores in moist conditions",
            solutions: &[
                "Apply appropriate fungicide",
                "Improve soil drainage",
                "Reduce humidity",
                "Prune affected areas",
            ],
        },
    ),
    (
        "virus infection",
        ConditionKnowledge {
            reason: "Caused by viral pathogens transmitted by insects or contaminated tools",
            solutions: &[
                "Remove infected plants",
                "Control insect vectors",
                "Use virus-free seeds",
                "Practice crop rotation",
            ],
        },
    ),
    (
        "nutrient deficiency",
        ConditionKnowledge {
            reason: "Caused by insufficient nutrients in soil or poor nutrient uptake",
            solutions: &[
                "Apply balanced fertilizer",
                "Soil testing recommended",
                "Adjust pH levels",
                "Foliar feeding",
            ],
        },
    ),
    (
        "pest damage",
        ConditionKnowledge {
            reason: "Caused by insect pests feeding on plant tissues",
            solutions: &[
                "Apply organic pesticide",
                "Use beneficial insects",
                "Regular monitoring",
                "Companion planting",
            ],
        },
    ),
];

/// Lowercase crop name to scientific name.
static CROP_SCIENTIFIC_NAMES: &[(&str, &str)] = &[
    ("tomato", "Solanum lycopersicum"),
    ("potato", "Solanum tuberosum"),
    ("corn", "Zea mays"),
    ("maize", "Zea mays"),
    ("rice", "Oryza sativa"),
    ("wheat", "Triticum aestivum"),
    ("apple", "Malus domestica"),
    ("grape", "Vitis vinifera"),
    ("cherry", "Prunus avium"),
    ("peach", "Prunus persica"),
    ("strawberry", "Fragaria × ananassa"),
    ("pepper", "Capsicum annuum"),
    ("cotton", "Gossypium hirsutum"),
];

const HEALTHY_REASON: &str = "Plant appears healthy with no visible disease symptoms.";
const HEALTHY_SOLUTIONS: &[&str] = &["Continue regular care", "Monitor for pests"];

const UNKNOWN_REASON: &str = "Disease detected but specific cause unknown";
const UNKNOWN_SOLUTIONS: &[&str] = &[
    "Consult agricultural expert",
    "Monitor plant health regularly",
    "Maintain proper irrigation",
];

/// Looks up cause and remedy text for a condition label.
///
/// A label containing "healthy" short-circuits to the healthy pair before any
/// table lookup. Otherwise the table keys are matched by substring
/// containment against the lowercased label; when several keys are embedded
/// in the same label (compound names like "Rust Blight"), the longest key
/// wins so the outcome does not depend on table order. Unmatched labels get
/// generic consult-an-expert advice.
pub fn enrich(condition: &str) -> (&'static str, &'static [&'static str]) {
    let needle = condition.to_lowercase();

    if needle.contains("healthy") {
        return (HEALTHY_REASON, HEALTHY_SOLUTIONS);
    }

    let best = DISEASE_KNOWLEDGE
        .iter()
        .filter(|(key, _)| needle.contains(key))
        .max_by_key(|(key, _)| key.len());

    match best {
        Some((_, entry)) => (entry.reason, entry.solutions),
        None => (UNKNOWN_REASON, UNKNOWN_SOLUTIONS),
    }
}

/// Scientific name for a crop, or `"<Crop> spp."` for crops not in the table.
pub fn scientific_name_for(crop: &str) -> String {
    let key = crop.to_lowercase();
    CROP_SCIENTIFIC_NAMES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, scientific)| (*scientific).to_string())
        .unwrap_or_else(|| format!("{} spp.", title_case(crop)))
}

/// Capitalizes the first letter of each whitespace-separated word.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_label_short_circuits() {
        let (reason, solutions) = enrich("Healthy");
        assert!(reason.contains("healthy"));
        assert_eq!(solutions, HEALTHY_SOLUTIONS);
    }

    #[test]
    fn healthy_never_matches_disease_keys() {
        // "Bacterial Spot Healthy" embeds a table key but healthy wins.
        let (reason, _) = enrich("Bacterial Spot Healthy");
        assert!(reason.contains("healthy"));
    }

    #[test]
    fn exact_key_matches_table_entry() {
        let (reason, solutions) = enrich("Leaf Spot");
        assert!(reason.contains("fungal pathogens"));
        assert_eq!(solutions[0], "Apply copper-based fungicide");
    }

    #[test]
    fn compound_label_matches_embedded_key() {
        let (reason, _) = enrich("Early Blight");
        assert!(reason.contains("fungal spores that spread rapidly"));
    }

    #[test]
    fn longest_key_wins_on_overlap() {
        // Embeds both "rust" and "blight"; the longer key decides.
        let (reason, _) = enrich("Rust Blight Complex");
        assert!(reason.contains("spread rapidly in wet conditions"));
    }

    #[test]
    fn unmatched_condition_gets_generic_advice() {
        let (reason, solutions) = enrich("Mosaic");
        assert_eq!(reason, UNKNOWN_REASON);
        assert_eq!(solutions.len(), 3);
    }

    #[test]
    fn known_crop_scientific_name() {
        assert_eq!(scientific_name_for("tomato"), "Solanum lycopersicum");
        assert_eq!(scientific_name_for("Corn"), "Zea mays");
    }

    #[test]
    fn unknown_crop_falls_back_to_spp() {
        assert_eq!(scientific_name_for("durian"), "Durian spp.");
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("leaf spot"), "Leaf Spot");
        assert_eq!(title_case("TOMATO"), "Tomato");
    }
}
