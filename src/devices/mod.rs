//! Device models: synthetic load and solar profiles, and battery parameters.

/// Synthetic site load profiles.
pub mod baseload;
/// Stationary battery storage parameters.
pub mod battery;
/// Solar photovoltaic generation profile.
pub mod solar;
pub mod types;

// Re-export the main types for convenience
pub use baseload::{ProfileLoad, UniformLoad};
pub use battery::BatterySpec;
pub use solar::SolarPv;
pub use types::Device;
pub use types::DeviceContext;
