pub mod library;
pub mod rotamer;
