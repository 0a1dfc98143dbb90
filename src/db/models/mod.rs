//! Database models, one file per table group.

pub mod account;
pub mod share;
pub mod trip;

pub use self::account::*;
pub use self::share::*;
pub use self::trip::*;
