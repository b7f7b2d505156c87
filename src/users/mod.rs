pub mod domain;
pub mod repository;

pub use domain::{NewUser, PublicUser, User, UserPatch};
pub use repository::{SqliteUserDirectory, UserDirectory};
