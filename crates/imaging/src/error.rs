#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Image has no pixels")]
    Empty,
}
