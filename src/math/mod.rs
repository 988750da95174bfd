mod price;
mod swap;
mod variable_fee;

pub use price::*;
pub use swap::*;
pub use variable_fee::*;
