/// Data layer: record types, file loading/writing, and selection cuts.
///
/// Architecture:
/// ```text
///  light_curves.csv          features.parquet
///        │                          │
///        ▼                          ▼
///   ┌──────────┐             ┌──────────┐
///   │  loader   │             │  loader   │  parse file → records
///   └──────────┘             └──────────┘
///        │                          │
///        ▼                          ▼
///   ┌──────────────┐         ┌───────────────────┐
///   │ LightCurves   │         │ Vec<OfflineRecord> │
///   └──────────────┘         └───────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  per-band point-count cut → object ids
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod writer;
