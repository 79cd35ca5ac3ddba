//! Pipeline assembly: subgraph factories, the shared mix stage, and the
//! pause-bracketed topology operations that splice them into the live graph.

pub mod decode;
pub mod mixer;
pub mod output;
pub mod topology;

pub use mixer::MixStage;
