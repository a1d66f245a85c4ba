pub mod assets;
pub mod enhancements;
pub mod jobs;
pub mod photos;
