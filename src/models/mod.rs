pub mod enums;
pub mod profile;
pub mod reminder;

pub use profile::*;
pub use reminder::*;
