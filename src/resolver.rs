//! Fallback-chain diagnosis resolver.
//!
//! Strategies are tried in fixed priority order (local classifier, then the
//! species API); the first one to produce candidates wins. When every
//! strategy fails or comes back empty, a canned sample diagnosis keeps the
//! response non-empty, so the only hard error a caller can see is an image
//! that does not decode.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::knowledge::{self, title_case};
use crate::mock;
use crate::model::Model;
use crate::plantnet::{PlantNetClient, SpeciesMatch};

/// One plant/condition classification result with remedy text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub plant: String,
    pub scientific_name: String,
    pub disease: String,
    pub confidence: u8,
    pub reason: String,
    pub solutions: Vec<String>,
}

/// Result of one analyze call. `note` is set when the detections came from
/// the sample pool after the real strategies failed.
#[derive(Debug)]
pub struct Analysis {
    pub detections: Vec<DiagnosisRecord>,
    pub note: Option<String>,
}

/// The request image did not decode; the caller sees this as a client error.
#[derive(Debug, thiserror::Error)]
#[error("invalid image data: {0}")]
pub struct ImageDecodeError(#[from] image::ImageError);

/// Request image in the two shapes strategies consume: raw bytes for upload,
/// decoded RGB for local inference.
pub struct CropImage<'a> {
    pub raw: &'a [u8],
    pub rgb: RgbImage,
}

/// One way of producing diagnoses. An error or an empty result sends the
/// resolver on to the next strategy.
#[async_trait]
pub trait DiagnosisStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn diagnose(&self, image: &CropImage<'_>) -> Result<Vec<DiagnosisRecord>>;
}

// ---------------------------------------------------------------------------
// Local classifier strategy
// ---------------------------------------------------------------------------

/// In-process classification over the pretrained disease model. Holds no
/// model when startup initialization failed, in which case every call errors
/// and the chain moves on.
pub struct LocalModelStrategy {
    model: Option<Model>,
}

impl LocalModelStrategy {
    pub fn new(model: Option<Model>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl DiagnosisStrategy for LocalModelStrategy {
    fn name(&self) -> &'static str {
        "local classifier"
    }

    async fn diagnose(&self, image: &CropImage<'_>) -> Result<Vec<DiagnosisRecord>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("classifier was not initialized"))?;
        let predictions = model.classify(&image.rgb)?;
        Ok(predictions
            .into_iter()
            .map(|(label, score)| record_from_label(&label, score))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Species API strategy
// ---------------------------------------------------------------------------

/// Network species identification. Only knows the species, not its
/// condition, so records come back flagged for expert follow-up.
pub struct RemoteApiStrategy {
    client: PlantNetClient,
}

impl RemoteApiStrategy {
    pub fn new(client: PlantNetClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiagnosisStrategy for RemoteApiStrategy {
    fn name(&self) -> &'static str {
        "species api"
    }

    async fn diagnose(&self, image: &CropImage<'_>) -> Result<Vec<DiagnosisRecord>> {
        let matches = self.client.identify(image.raw).await?;
        Ok(matches.into_iter().map(species_record).collect())
    }
}

// ---------------------------------------------------------------------------
// Record assembly
// ---------------------------------------------------------------------------

/// Builds a full record from a classifier label of the form
/// `"<Crop>___<Condition>"`. Labels without the separator are treated as a
/// bare condition on an unknown crop.
fn record_from_label(label: &str, score: f32) -> DiagnosisRecord {
    let (crop, condition) = match label.split_once("___") {
        Some((crop, condition)) => (crop.trim().to_lowercase(), condition.trim()),
        None => ("unknown".to_string(), label),
    };

    let disease = title_case(&condition.replace('_', " "));
    let scientific_name = knowledge::scientific_name_for(&crop);

    let mut plant = title_case(&crop);
    if plant.contains("Corn") {
        plant = "Maize (Corn)".to_string();
    }

    let (reason, solutions) = knowledge::enrich(&disease);

    DiagnosisRecord {
        plant,
        scientific_name,
        disease,
        confidence: confidence_percent(score),
        reason: reason.to_string(),
        solutions: solutions.iter().map(|s| (*s).to_string()).collect(),
    }
}

/// Species identification gives no condition; the record says so.
fn species_record(species: SpeciesMatch) -> DiagnosisRecord {
    DiagnosisRecord {
        plant: title_case(&species.common_name),
        scientific_name: species.scientific_name,
        disease: "Analysis Required".to_string(),
        confidence: confidence_percent(species.score),
        reason: "Plant species identified via PlantNet API.".to_string(),
        solutions: vec!["Consult agricultural expert for species-specific advice".to_string()],
    }
}

fn confidence_percent(score: f32) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub struct CropDiagnosisResolver {
    strategies: Vec<Box<dyn DiagnosisStrategy>>,
}

impl CropDiagnosisResolver {
    pub fn new(model: Option<Model>, plantnet: PlantNetClient) -> Self {
        Self::with_strategies(vec![
            Box::new(LocalModelStrategy::new(model)),
            Box::new(RemoteApiStrategy::new(plantnet)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn DiagnosisStrategy>>) -> Self {
        Self { strategies }
    }

    /// Decodes the image and walks the strategy chain. Strategy failures are
    /// absorbed; the sample pool is the floor, so the detections list is
    /// never empty.
    pub async fn analyze(&self, image_data: &[u8]) -> Result<Analysis, ImageDecodeError> {
        let rgb = image::load_from_memory(image_data)?.to_rgb8();
        let image = CropImage {
            raw: image_data,
            rgb,
        };

        let mut failures = Vec::new();
        for strategy in &self.strategies {
            match strategy.diagnose(&image).await {
                Ok(detections) if !detections.is_empty() => {
                    info!(
                        "{} produced {} detections",
                        strategy.name(),
                        detections.len()
                    );
                    return Ok(Analysis {
                        detections,
                        note: None,
                    });
                }
                Ok(_) => {
                    warn!("{} produced no candidates", strategy.name());
                    failures.push(format!("{}: no candidates", strategy.name()));
                }
                Err(err) => {
                    warn!("{} failed: {err:#}", strategy.name());
                    failures.push(format!("{}: {err}", strategy.name()));
                }
            }
        }

        let note = (!failures.is_empty()).then(|| {
            format!(
                "Automatic analysis unavailable ({}); returning a sample diagnosis",
                failures.join("; ")
            )
        });
        Ok(Analysis {
            detections: vec![mock::sample_detection()],
            note,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Scripted {
        Records,
        Empty,
        Fail,
    }

    struct ScriptedStrategy {
        calls: Arc<AtomicUsize>,
        outcome: Scripted,
    }

    #[async_trait]
    impl DiagnosisStrategy for ScriptedStrategy {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn diagnose(&self, _image: &CropImage<'_>) -> Result<Vec<DiagnosisRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Scripted::Records => Ok(vec![record_from_label("Tomato___Leaf_Spot", 0.9)]),
                Scripted::Empty => Ok(Vec::new()),
                Scripted::Fail => Err(anyhow!("simulated timeout")),
            }
        }
    }

    fn scripted(outcome: Scripted) -> (Box<dyn DiagnosisStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = ScriptedStrategy {
            calls: Arc::clone(&calls),
            outcome,
        };
        (Box::new(strategy), calls)
    }

    fn png_bytes() -> Vec<u8> {
        let img =
            image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 4, image::Rgb([60, 140, 40])));
        let mut buf = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
        buf
    }

    #[tokio::test]
    async fn first_success_skips_remaining_strategies() {
        let (first, first_calls) = scripted(Scripted::Records);
        let (second, second_calls) = scripted(Scripted::Records);
        let resolver = CropDiagnosisResolver::with_strategies(vec![first, second]);

        let analysis = resolver.analyze(&png_bytes()).await.unwrap();
        assert_eq!(analysis.detections.len(), 1);
        assert_eq!(analysis.detections[0].plant, "Tomato");
        assert!(analysis.note.is_none());
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_output_falls_through_to_next() {
        let (first, _) = scripted(Scripted::Empty);
        let (second, second_calls) = scripted(Scripted::Records);
        let resolver = CropDiagnosisResolver::with_strategies(vec![first, second]);

        let analysis = resolver.analyze(&png_bytes()).await.unwrap();
        assert_eq!(analysis.detections[0].disease, "Leaf Spot");
        assert!(analysis.note.is_none());
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failures_fall_back_to_sample_pool() {
        let (first, _) = scripted(Scripted::Fail);
        let (second, _) = scripted(Scripted::Fail);
        let resolver = CropDiagnosisResolver::with_strategies(vec![first, second]);

        let analysis = resolver.analyze(&png_bytes()).await.unwrap();
        assert_eq!(analysis.detections.len(), 1);
        let plant = analysis.detections[0].plant.as_str();
        assert!(["Tomato", "Potato", "Maize (Corn)"].contains(&plant));
        let note = analysis.note.expect("fallback should carry a note");
        assert!(note.contains("simulated timeout"));
    }

    #[tokio::test]
    async fn confidence_always_within_percent_range() {
        let (only, _) = scripted(Scripted::Fail);
        let resolver = CropDiagnosisResolver::with_strategies(vec![only]);
        let analysis = resolver.analyze(&png_bytes()).await.unwrap();
        assert!(analysis.detections[0].confidence <= 100);
    }

    #[tokio::test]
    async fn garbage_bytes_are_a_decode_error() {
        let resolver = CropDiagnosisResolver::with_strategies(Vec::new());
        assert!(resolver.analyze(b"definitely not an image").await.is_err());
    }

    #[test]
    fn corn_leaf_spot_record() {
        let record = record_from_label("Corn___Leaf_Spot", 0.87);
        assert_eq!(record.plant, "Maize (Corn)");
        assert_eq!(record.scientific_name, "Zea mays");
        assert_eq!(record.disease, "Leaf Spot");
        assert_eq!(record.confidence, 87);
        assert!(record.reason.contains("fungal pathogens"));
        assert_eq!(record.solutions[0], "Apply copper-based fungicide");
    }

    #[test]
    fn healthy_label_enriches_to_healthy_text() {
        let record = record_from_label("Tomato___healthy", 0.99);
        assert_eq!(record.plant, "Tomato");
        assert_eq!(record.disease, "Healthy");
        assert!(record.reason.contains("healthy"));
        assert!(!record.reason.contains("fungal"));
    }

    #[test]
    fn label_without_separator_is_unknown_crop() {
        let record = record_from_label("Late_Blight", 0.5);
        assert_eq!(record.plant, "Unknown");
        assert_eq!(record.scientific_name, "Unknown spp.");
        assert_eq!(record.disease, "Late Blight");
    }

    #[test]
    fn confidence_is_rounded_and_clamped() {
        assert_eq!(record_from_label("Tomato___healthy", 0.876).confidence, 88);
        assert_eq!(record_from_label("Tomato___healthy", 1.2).confidence, 100);
        assert_eq!(record_from_label("Tomato___healthy", 0.0).confidence, 0);
    }

    #[test]
    fn species_record_flags_analysis_required() {
        let record = species_record(SpeciesMatch {
            common_name: "garden tomato".to_string(),
            scientific_name: "Solanum lycopersicum".to_string(),
            score: 0.42,
        });
        assert_eq!(record.plant, "Garden Tomato");
        assert_eq!(record.disease, "Analysis Required");
        assert_eq!(record.confidence, 42);
        assert_eq!(record.solutions.len(), 1);
    }
}
