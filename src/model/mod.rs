pub mod common;
pub mod document;
pub mod error;
pub mod path;
pub mod row;
pub mod schema;
pub mod structured_type;
pub mod write;

pub use common::*;
pub use document::*;
pub use error::*;
pub use path::*;
pub use row::*;
pub use schema::*;
pub use structured_type::*;
pub use write::*;
