pub mod errors;
pub mod ids;
pub mod messages;
pub mod room;
pub mod user;
pub mod word;

// Re-export all types
pub use errors::*;
pub use ids::*;
pub use messages::*;
pub use room::*;
pub use user::*;
pub use word::*;
