//! PlantNet species-identification client, the network fallback when the
//! local classifier cannot produce a diagnosis. Identifies species only;
//! disease assessment is out of its hands.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::info;

const IDENTIFY_URL: &str = "https://my-api.plantnet.org/v2/identify/all";
/// One shot, no retries; a timeout here sends the caller to the next strategy.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOP_K: usize = 3;

/// One species candidate from the identification service.
#[derive(Debug, Clone)]
pub struct SpeciesMatch {
    pub common_name: String,
    pub scientific_name: String,
    pub score: f32,
}

pub struct PlantNetClient {
    client: reqwest::Client,
    api_key: String,
}

impl PlantNetClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building PlantNet HTTP client")?;
        Ok(Self { client, api_key })
    }

    /// Uploads the image and returns the top species candidates, best first.
    pub async fn identify(&self, image_data: &[u8]) -> Result<Vec<SpeciesMatch>> {
        let image_part = Part::bytes(image_data.to_vec())
            .file_name("crop_image.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .part("images", image_part)
            .text("modifiers", r#"["crops"]"#)
            .text("api-key", self.api_key.clone());

        let response = self
            .client
            .post(IDENTIFY_URL)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json::<IdentifyResponse>()
            .await?;

        let matches = to_species_matches(response);
        info!("PlantNet returned {} species candidates", matches.len());
        Ok(matches)
    }
}

#[derive(Debug, Deserialize)]
struct IdentifyResponse {
    #[serde(default)]
    results: Vec<IdentifyResult>,
}

#[derive(Debug, Deserialize)]
struct IdentifyResult {
    #[serde(default)]
    score: f32,
    species: SpeciesInfo,
}

#[derive(Debug, Deserialize)]
struct SpeciesInfo {
    #[serde(rename = "scientificNameWithoutAuthor")]
    scientific_name: String,
    #[serde(rename = "commonNames", default)]
    common_names: Vec<String>,
}

fn to_species_matches(response: IdentifyResponse) -> Vec<SpeciesMatch> {
    response
        .results
        .into_iter()
        .take(TOP_K)
        .map(|result| {
            let scientific_name = result.species.scientific_name;
            let common_name = result
                .species
                .common_names
                .into_iter()
                .next()
                .unwrap_or_else(|| {
                    scientific_name
                        .split_whitespace()
                        .next()
                        .unwrap_or("Unknown Species")
                        .to_string()
                });
            SpeciesMatch {
                common_name,
                scientific_name,
                score: result.score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "results": [
            {
                "score": 0.91,
                "species": {
                    "scientificNameWithoutAuthor": "Solanum lycopersicum",
                    "commonNames": ["Tomato", "Garden tomato"]
                }
            },
            {
                "score": 0.04,
                "species": {
                    "scientificNameWithoutAuthor": "Solanum tuberosum",
                    "commonNames": []
                }
            },
            {
                "score": 0.02,
                "species": {
                    "scientificNameWithoutAuthor": "Capsicum annuum",
                    "commonNames": ["Pepper"]
                }
            },
            {
                "score": 0.01,
                "species": {
                    "scientificNameWithoutAuthor": "Zea mays",
                    "commonNames": ["Maize"]
                }
            }
        ]
    }"#;

    #[test]
    fn parses_candidates_and_caps_at_three() {
        let response: IdentifyResponse = serde_json::from_str(SAMPLE).unwrap();
        let matches = to_species_matches(response);
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].common_name, "Tomato");
        assert_eq!(matches[0].scientific_name, "Solanum lycopersicum");
        assert!((matches[0].score - 0.91).abs() < f32::EPSILON);
    }

    #[test]
    fn common_name_falls_back_to_genus() {
        let response: IdentifyResponse = serde_json::from_str(SAMPLE).unwrap();
        let matches = to_species_matches(response);
        assert_eq!(matches[1].common_name, "Solanum");
    }

    #[test]
    fn empty_results_parse_to_no_matches() {
        let response: IdentifyResponse = serde_json::from_str("{}").unwrap();
        assert!(to_species_matches(response).is_empty());
    }
}
