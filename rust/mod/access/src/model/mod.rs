mod account;
mod document;
mod invitation;
mod permission;
mod principal;
mod role;

pub use account::*;
pub use document::*;
pub use invitation::*;
pub use permission::*;
pub use principal::*;
pub use role::*;
