pub mod cache;
pub mod listing;
mod resources;

pub use cache::{CachedRepository, Resource};
pub use listing::{paginate, ListQuery, Page, Searchable, SortDirection};
