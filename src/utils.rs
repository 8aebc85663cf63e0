use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use tracing::{info, warn};

/// Placeholder that fails remote authentication; requests made with it end up
/// on the sample-diagnosis path.
const PLANTNET_API_KEY_PLACEHOLDER: &str = "your_plantnet_api_key_here";

/// Runtime settings read once at startup.
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub plantnet_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let body_limit_bytes = env::var("BODY_LIMIT_MB")
            .unwrap_or_else(|_| "5".into())
            .parse::<usize>()
            .context("BODY_LIMIT_MB must be a valid integer")?
            * 1024
            * 1024;

        let plantnet_api_key = env::var("PLANTNET_API_KEY")
            .unwrap_or_else(|_| PLANTNET_API_KEY_PLACEHOLDER.into());
        if plantnet_api_key == PLANTNET_API_KEY_PLACEHOLDER {
            warn!("PLANTNET_API_KEY not set; species identification will fail over to sample diagnoses");
        }

        Ok(Config {
            port,
            body_limit_bytes,
            plantnet_api_key,
        })
    }
}

async fn download_file(url: &str, path: &str) -> Result<()> {
    info!("Downloading {} from {}", path, url);

    let mut headers = HeaderMap::new();
    if let Ok(token) = env::var("GITHUB_TOKEN") {
        let auth_value = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("Invalid GITHUB_TOKEN format")?;
        headers.insert(AUTHORIZATION, auth_value);
    }
    headers.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .headers(headers)
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?
        .error_for_status()
        .with_context(|| format!("downloading {url}"))?;

    let bytes = response.bytes().await?;
    fs::write(path, bytes).with_context(|| format!("writing {path}"))?;
    Ok(())
}

/// Makes sure the classifier's frozen graph and class list are on disk,
/// fetching them when a download URL is configured. Returns false when the
/// assets cannot be provided; the service then runs without the local
/// classifier.
pub async fn ensure_model_files(model_path: &str, class_list_path: &str) -> bool {
    for (path, url_var) in [(model_path, "MODEL_URL"), (class_list_path, "CLASS_LIST_URL")] {
        if Path::new(path).exists() {
            continue;
        }
        let Ok(url) = env::var(url_var) else {
            warn!("{path} is missing and {url_var} is not set; continuing without the local classifier");
            return false;
        };
        if let Err(err) = download_file(&url, path).await {
            warn!("failed to fetch {path}: {err:#}");
            return false;
        }
    }
    true
}
