/// Data layer: core types, raw-file loading, discovery and export.
///
/// Architecture:
/// ```text
///  <root>/<Genus>/<Species>/…/acqu + fid
///        │
///        ▼
///   ┌───────────┐
///   │ discovery  │  walk species dir → Vec<SamplePair>
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  acqu + fid → Spectrum (calibrated m/z)
///   └──────────┘
///        │
///        ▼  (processing, resampling)
///   ┌──────────┐
///   │  Corpus   │  feature rows + labels + sources
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  Parquet corpus, embedding CSV, run report
///   └──────────┘
/// ```
pub mod discovery;
pub mod export;
pub mod loader;
pub mod model;
pub mod synthetic;
