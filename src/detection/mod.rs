// src/detection/mod.rs

pub mod locator;
pub mod remote;

pub use locator::{largest_face, BoundingBox, FaceLocator, SearchParams};
pub use remote::HttpFaceLocator;
