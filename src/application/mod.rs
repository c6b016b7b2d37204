pub mod catalog;
pub mod content;
pub mod identity;

pub use catalog::*;
pub use content::*;
pub use identity::*;
