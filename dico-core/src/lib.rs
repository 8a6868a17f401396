pub mod obfuscation;
pub mod room_events;
pub mod scoring;
pub mod settings;
pub mod store;
pub mod turn_order;
pub mod words;

// Re-export main components
pub use obfuscation::*;
pub use room_events::*;
pub use scoring::*;
pub use settings::*;
pub use store::*;
pub use turn_order::*;
pub use words::*;
