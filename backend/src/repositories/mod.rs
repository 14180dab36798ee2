pub mod device_token;
pub mod memory_session_store;
pub mod pg_session_store;
pub mod session_store;
pub mod transaction;
pub mod user;

pub use device_token::{DeviceTokenStore, MemoryDeviceTokenStore, PgDeviceTokenStore};
pub use memory_session_store::MemorySessionStore;
pub use pg_session_store::PgSessionStore;
pub use session_store::{MarkerClaim, SessionStore, StoreError};
