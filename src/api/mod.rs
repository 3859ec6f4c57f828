pub mod dto;
pub mod wasm;

pub use dto::*;
pub use wasm::*;
