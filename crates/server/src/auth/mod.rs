pub mod jwt;
pub mod middleware;

pub use middleware::{AuthUser, MaybeAuthUser};
