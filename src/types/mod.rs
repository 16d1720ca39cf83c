//! Type model shared by the frontend and the semantic passes

mod type_system;

pub use type_system::{PrimitiveType, Type};
