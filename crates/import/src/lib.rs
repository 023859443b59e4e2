pub mod charges;
pub mod snapshot;
pub mod table;
pub mod workbook;

pub use charges::{load_charges_config, ChargesConfig, ChargesError, REQUIRED_KEYS};
pub use snapshot::SnapshotError;
pub use table::{extract_by_position, slice_from_row, Cell, EvolutionRow, Matrix, ReportRow, Table};
pub use workbook::{ScratchCopy, Unavailable, WorkbookExtractor};
