pub mod content;
pub mod plan;
pub mod user;

pub use content::*;
pub use plan::*;
pub use user::*;
