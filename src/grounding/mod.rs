pub mod openai_compatible;
pub mod parse;
pub mod provider;
pub mod registry;
pub mod sse_parser;
pub mod types;
