pub mod aggregate;
pub mod constraints;
pub mod gap;
pub mod handlers;
pub mod keywords;
pub mod locks;
pub mod pipeline;
