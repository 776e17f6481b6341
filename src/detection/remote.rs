// src/detection/remote.rs
//
// FaceLocator backed by an HTTP detection service.
//
// Each call ships the normalized frame (or face crop) as a base64 JPEG and
// gets back a list of [x, y, w, h] boxes:
//
//   POST {url}/detect/faces   { image_base64, width, height, scale_factor,
//   POST {url}/detect/eyes      min_neighbors, min_size }
//   ← { "boxes": [[x, y, w, h], ...] }
//
// Blocking on purpose: the locator contract is synchronous and the session
// runner already executes analysis on a blocking worker.

use super::locator::{BoundingBox, FaceLocator, SearchParams};
use crate::analysis::GrayFrame;
use crate::types::LocatorConfig;
use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct LocateRequest {
    image_base64: String,
    width: usize,
    height: usize,
    scale_factor: f32,
    min_neighbors: u32,
    min_size: [u32; 2],
}

#[derive(Debug, Deserialize)]
struct LocateResponse {
    boxes: Vec<[u32; 4]>,
}

pub struct HttpFaceLocator {
    http_client: reqwest::blocking::Client,
    server_url: String,
    jpeg_quality: u8,
}

impl HttpFaceLocator {
    pub fn new(config: &LocatorConfig) -> Result<Self> {
        let http_client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            server_url: config.url.trim_end_matches('/').to_string(),
            jpeg_quality: config.jpeg_quality,
        })
    }

    fn locate(&self, kind: &str, frame: &GrayFrame, params: &SearchParams) -> Result<Vec<BoundingBox>> {
        let jpeg = encode_gray_to_jpeg(frame, self.jpeg_quality)?;
        let request = LocateRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(&jpeg),
            width: frame.width,
            height: frame.height,
            scale_factor: params.scale_factor,
            min_neighbors: params.min_neighbors,
            min_size: [params.min_size.0, params.min_size.1],
        };

        let url = format!("{}/detect/{}", self.server_url, kind);
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Detection service rejected {} request", kind))?;

        let body: LocateResponse = response
            .json()
            .context("Failed to parse detection response")?;

        debug!("{} → {} {} box(es)", url, body.boxes.len(), kind);
        Ok(body
            .boxes
            .into_iter()
            .map(|[x, y, w, h]| BoundingBox::new(x, y, w, h))
            .collect())
    }
}

impl FaceLocator for HttpFaceLocator {
    fn locate_faces(&self, frame: &GrayFrame, params: &SearchParams) -> Result<Vec<BoundingBox>> {
        self.locate("faces", frame, params)
    }

    fn locate_eyes(&self, region: &GrayFrame, params: &SearchParams) -> Result<Vec<BoundingBox>> {
        self.locate("eyes", region, params)
    }
}

/// Encode a grayscale frame to JPEG bytes using the `image` crate.
fn encode_gray_to_jpeg(frame: &GrayFrame, quality: u8) -> Result<Vec<u8>> {
    use image::{GrayImage, ImageBuffer};

    let img: GrayImage = ImageBuffer::from_raw(frame.width as u32, frame.height as u32, frame.data.clone())
        .context("Frame buffer does not match its dimensions")?;

    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .context("JPEG encoding failed")?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_roundtrip_dimensions() {
        let frame = GrayFrame::filled(48, 32, 128);
        let jpeg = encode_gray_to_jpeg(&frame, 90).unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (48, 32));
    }

    #[test]
    fn test_response_parsing() {
        let body: LocateResponse = serde_json::from_str(r#"{"boxes": [[1, 2, 30, 40]]}"#).unwrap();
        assert_eq!(body.boxes, vec![[1, 2, 30, 40]]);
    }

    #[test]
    fn test_unreachable_service_is_an_error() {
        let locator = HttpFaceLocator::new(&LocatorConfig {
            url: "http://127.0.0.1:9/".to_string(),
            timeout_secs: 1,
            jpeg_quality: 80,
        })
        .unwrap();

        let frame = GrayFrame::filled(16, 16, 0);
        let params = SearchParams::faces(&Default::default());
        assert!(locator.locate_faces(&frame, &params).is_err());
    }
}
