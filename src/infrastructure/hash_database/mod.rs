//! Hash database implementations

mod hash_list_file;

pub use hash_list_file::HashListFile;
