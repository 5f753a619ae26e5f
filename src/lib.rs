//! MALDI-TOF spectrum preprocessing and 2-D embedding of bacterial species.
//!
//! ```text
//!   data::discovery ─► data::loader ─► processing::Pipeline ─► processing::Resampler
//!                                                                      │
//!                                   corpus::CorpusBuilder ◄────────────┘
//!                                             │
//!                                             ▼
//!                     embedding::embed ─► plot::render_scatter
//! ```
//!
//! [`workflow::run`] drives the whole chain from a [`config::RunConfig`].

pub mod color;
pub mod config;
pub mod corpus;
pub mod data;
pub mod embedding;
pub mod error;
pub mod plot;
pub mod processing;
pub mod workflow;
