pub mod bridge;
pub mod buffers;
pub mod context;
pub mod registry;
