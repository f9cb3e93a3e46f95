mod demangle;
pub mod source_index;

pub use demangle::demangle_symbol;
pub use source_index::{extract_methods_from_source, DeclaredFn, SourceIndex};
