pub mod access;
pub mod admin;
pub mod logs;
pub mod sync;

pub use access::*;
pub use admin::*;
pub use logs::*;
pub use sync::*;
