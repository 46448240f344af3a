#![allow(dead_code)]

pub mod builders;
pub mod handlers;
pub mod strategies;

pub use builders::*;
pub use handlers::*;
pub use strategies::*;
