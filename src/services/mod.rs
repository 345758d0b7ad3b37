//! Business-operation services for the casework API.

mod cases;
mod documents;

pub use cases::{CasesService, SortDirection};
pub use documents::DocumentsService;
