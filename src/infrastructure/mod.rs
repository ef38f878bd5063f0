pub mod archive;
pub mod detection;
pub mod parsers;
pub mod sqlite;
