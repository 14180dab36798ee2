pub mod devices;
pub mod fulfillment;
pub mod health;
pub mod tick;

pub use devices::register_device;
pub use fulfillment::fulfillment;
pub use health::health;
pub use tick::run_tick;
