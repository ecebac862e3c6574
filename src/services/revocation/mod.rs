pub mod postgres;
pub mod store;
pub mod valkey;

pub use postgres::PostgresUserDisabledStore;
pub use store::{RevocationError, UserDisabledStore};
pub use valkey::ValkeyUserDisabledStore;
