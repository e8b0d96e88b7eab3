pub mod authentication;
pub mod permissions;
pub mod profile;
pub mod user;

pub use authentication::*;
pub use permissions::*;
pub use profile::*;
pub use user::*;
