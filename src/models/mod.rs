pub mod alarm;
pub mod enums;
pub mod medicine;

pub use alarm::*;
pub use enums::*;
pub use medicine::*;
