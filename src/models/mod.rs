pub mod notification;
pub mod product;

// Re-exports for convenience
pub use notification::*;
pub use product::*;
