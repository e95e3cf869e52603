pub mod audit;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod distill;
pub mod llm;
pub mod model;
pub mod paths;
pub mod pipeline;
pub mod publish;
pub mod report;
pub mod rollup;
pub mod timeline;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;
