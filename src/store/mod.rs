pub mod dir_archive;
pub mod repo;
