//! Property Manager resources

pub mod resource_property_activation;

pub use resource_property_activation::{PollConfig, PropertyActivationResource};
