//! Narrative preparation for the offline indexing step.
//!
//! These helpers turn raw CFPB complaint exports into the cleaned narratives
//! that get embedded into the vector index. Queries are never cleaned; the
//! embedding model sees them as the user typed them.

mod clean;
mod filter;

pub use clean::{
    clean_text, lowercase_text, remove_boilerplate, remove_special_characters, BOILERPLATE_PHRASES,
};
pub use filter::{
    apply_text_cleaning, drop_empty_narratives, filter_by_product, Complaint, ALLOWED_PRODUCTS,
};
