pub mod error;
pub mod state;
pub mod types;

pub use error::*;
pub use state::*;
pub use types::*;
