//! Client for the results server's OCR routes.
//!
//! The service reads images from its own `public/` directory, so each
//! request first writes the image under `public/ocr-inputs/` and then asks
//! for it by web path: `GET /api/ocr?img=/ocr-inputs/<name>.png`.

use anyhow::{Context, Result, anyhow};
use image::GrayImage;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::recognizer::{OcrText, Recognizer, TextBox};

/// Subdirectory of the public dir that holds images awaiting recognition.
const INPUT_DIR: &str = "ocr-inputs";

static NEXT_INPUT: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Deserialize)]
struct TextResponse {
    ok: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoxesResponse {
    ok: bool,
    #[serde(default)]
    items: Vec<BoxItem>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoxItem {
    #[serde(default)]
    text: String,
    #[serde(rename = "box", default)]
    vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

/// An image written under the public dir for one request. Removed on drop.
struct StagedImage {
    path: PathBuf,
    web_path: String,
}

impl Drop for StagedImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Recognition over HTTP against the results server's OCR routes.
pub struct HttpRecognizer {
    client: reqwest::blocking::Client,
    base_url: String,
    public_dir: PathBuf,
    timeout: Duration,
}

impl HttpRecognizer {
    /// `public_dir` must be the directory the service serves `?img=` paths
    /// from.
    pub fn new(base_url: impl Into<String>, public_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OCR HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            public_dir: public_dir.into(),
            timeout,
        })
    }

    fn stage(&self, img: &GrayImage) -> Result<StagedImage> {
        let dir = self.public_dir.join(INPUT_DIR);
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let name = format!(
            "{}-{}.png",
            std::process::id(),
            NEXT_INPUT.fetch_add(1, Ordering::Relaxed)
        );
        let path = dir.join(&name);
        img.save(&path)
            .with_context(|| format!("Failed to write OCR input {}", path.display()))?;

        Ok(StagedImage {
            path,
            web_path: format!("/{}/{}", INPUT_DIR, name),
        })
    }

    fn request(&self, route: &str, web_path: &str, limit: Option<Duration>) -> Result<reqwest::blocking::Request> {
        let timeout = limit.map_or(self.timeout, |limit| limit.min(self.timeout));
        self.client
            .get(format!("{}{}", self.base_url, route))
            .query(&[("img", web_path)])
            .header("User-Agent", "pick-reader")
            .timeout(timeout)
            .build()
            .context("Failed to build OCR request")
    }

    fn get_json<T: DeserializeOwned>(&self, route: &str, img: &GrayImage, limit: Option<Duration>) -> Result<T> {
        let staged = self.stage(img)?;
        let request = self.request(route, &staged.web_path, limit)?;
        let url = request.url().clone();

        let response = self
            .client
            .execute(request)
            .with_context(|| format!("OCR request to {} failed", url))?;
        let status = response.status();

        // Error bodies carry `{ok:false,error}` too
        response
            .json()
            .with_context(|| format!("Invalid OCR response from {} (HTTP {})", url, status))
    }
}

impl Recognizer for HttpRecognizer {
    fn name(&self) -> &str {
        "http"
    }

    fn recognize_text(&self, img: &GrayImage, limit: Option<Duration>) -> Result<OcrText> {
        let response: TextResponse = self.get_json("/api/ocr", img, limit)?;
        if !response.ok {
            return Err(anyhow!(
                "OCR service error: {}",
                response.error.as_deref().unwrap_or("unknown")
            ));
        }
        Ok(OcrText::new(response.text))
    }

    fn recognize_boxes(&self, img: &GrayImage, limit: Option<Duration>) -> Result<Vec<TextBox>> {
        let response: BoxesResponse = self.get_json("/api/ocr/boxes", img, limit)?;
        if !response.ok {
            return Err(anyhow!(
                "OCR service error: {}",
                response.error.as_deref().unwrap_or("unknown")
            ));
        }
        Ok(response.items.into_iter().filter_map(to_text_box).collect())
    }
}

/// Bounding box of a polygon. Items without vertices are dropped.
fn to_text_box(item: BoxItem) -> Option<TextBox> {
    let first = item.vertices.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for v in &item.vertices[1..] {
        min_x = min_x.min(v.x);
        min_y = min_y.min(v.y);
        max_x = max_x.max(v.x);
        max_y = max_y.max(v.y);
    }

    let left = min_x.max(0.0).round() as u32;
    let top = min_y.max(0.0).round() as u32;
    Some(TextBox {
        text: item.text,
        left,
        top,
        width: (max_x.max(0.0).round() as u32).saturating_sub(left),
        height: (max_y.max(0.0).round() as u32).saturating_sub(top),
        confidence: None,
    })
}
