/// Data layer: tabular loading shared by prediction and statistics.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Table    │  columns in file order, Vec<Row>
///   └──────────┘
///        │
///        ├──────────────► schema::reconcile / normalize → inference
///        └──────────────► stats
/// ```

pub mod loader;
pub mod model;

pub use loader::load_table;
pub use model::{CellValue, Row, Table};
