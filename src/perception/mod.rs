pub mod annotator;
pub mod decode;
pub mod resolver;
pub mod screenshot;
pub mod types;
