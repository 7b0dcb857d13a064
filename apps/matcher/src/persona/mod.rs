pub mod archive;
pub mod handlers;
pub mod signature;
pub mod sync;
