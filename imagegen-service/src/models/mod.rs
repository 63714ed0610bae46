pub mod image;

pub use image::{GenerateImagesRequest, GenerateImagesResponse, GenerationInput};
