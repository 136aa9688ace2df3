pub mod convert;
pub mod expand;
pub mod keys;
pub mod path_resolver;
pub mod update_path;
pub mod write_processor;

pub use convert::*;
pub use expand::*;
pub use keys::{build_identity, build_key};
pub use path_resolver::*;
pub use update_path::*;
pub use write_processor::*;
