mod agorot;
mod helpers;
pub mod op;

pub use agorot::Agorot;
pub use helpers::parse_boolean_flag;
