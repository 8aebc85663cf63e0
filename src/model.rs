//! Local plant-disease classifier backed by a TensorFlow frozen graph.
//!
//! The graph and its class list are loaded once at startup; inference is
//! read-only afterwards, so the model can be shared across requests without
//! locking.

use std::fs::File;
use std::io::Read;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};

/// Input side length expected by the classifier.
const INPUT_SIZE: u32 = 224;
/// Frozen-graph operation names.
const INPUT_OP: &str = "x";
const OUTPUT_OP: &str = "Identity";
/// Scores below this are noise and never reported.
const MIN_SCORE: f32 = 1e-4;
/// At most this many candidates are reported per image.
const TOP_K: usize = 3;

pub struct Model {
    session: Session,
    graph: Graph,
    labels: Vec<String>,
}

impl Model {
    pub fn new(model_path: &str, labels_path: &str) -> Result<Self> {
        let mut graph = Graph::new();
        let mut model_bytes = Vec::new();
        File::open(model_path)
            .with_context(|| format!("opening model graph {model_path}"))?
            .read_to_end(&mut model_bytes)?;
        graph
            .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
            .map_err(|status| anyhow!("importing model graph: {status}"))?;

        let session = Session::new(&SessionOptions::new(), &graph)
            .map_err(|status| anyhow!("creating session: {status}"))?;

        let labels: Vec<String> = std::fs::read_to_string(labels_path)
            .with_context(|| format!("reading class list {labels_path}"))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        Ok(Model {
            session,
            graph,
            labels,
        })
    }

    /// Number of classes the model distinguishes.
    pub fn class_count(&self) -> usize {
        self.labels.len()
    }

    /// Runs the classifier over an already-decoded RGB image and returns the
    /// top scored (label, score) pairs, best first, scores in [0, 1].
    pub fn classify(&self, image: &RgbImage) -> Result<Vec<(String, f32)>> {
        let input = self.image_to_tensor(image)?;

        let mut args = SessionRunArgs::new();
        let input_op = self
            .graph
            .operation_by_name_required(INPUT_OP)
            .map_err(|status| anyhow!("input operation missing from graph: {status}"))?;
        let output_op = self
            .graph
            .operation_by_name_required(OUTPUT_OP)
            .map_err(|status| anyhow!("output operation missing from graph: {status}"))?;

        args.add_feed(&input_op, 0, &input);
        let output_token = args.request_fetch(&output_op, 0);
        self.session
            .run(&mut args)
            .map_err(|status| anyhow!("inference failed: {status}"))?;

        let scores: Vec<f32> = args
            .fetch::<f32>(output_token)
            .map_err(|status| anyhow!("fetching output tensor: {status}"))?
            .to_vec();
        Ok(top_predictions(&scores, &self.labels))
    }

    /// Resizes to the model's square input and scales pixels to [0, 1],
    /// NHWC layout.
    fn image_to_tensor(&self, image: &RgbImage) -> Result<Tensor<f32>> {
        let resized = image::imageops::resize(
            image,
            INPUT_SIZE,
            INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );

        let mut pixels = Vec::with_capacity((INPUT_SIZE * INPUT_SIZE * 3) as usize);
        for pixel in resized.pixels() {
            pixels.push(pixel[0] as f32 / 255.0);
            pixels.push(pixel[1] as f32 / 255.0);
            pixels.push(pixel[2] as f32 / 255.0);
        }

        let tensor = Tensor::new(&[1, INPUT_SIZE as u64, INPUT_SIZE as u64, 3])
            .with_values(&pixels)
            .map_err(|status| anyhow!("building input tensor: {status}"))?;
        Ok(tensor)
    }
}

/// Pairs raw output scores with class labels and keeps the strongest few.
fn top_predictions(scores: &[f32], labels: &[String]) -> Vec<(String, f32)> {
    let mut scored: Vec<(String, f32)> = scores
        .iter()
        .enumerate()
        .filter(|(_, &score)| score > MIN_SCORE)
        .map(|(i, &score)| {
            let label = labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            (label, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(TOP_K);
    scored
}
