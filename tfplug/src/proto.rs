//! Protocol buffer types for Terraform Plugin Protocol v6
//!
//! The generated types are included from the build output. Request and
//! response messages are nested in snake_case modules named after their RPC
//! (e.g. `plan_resource_change::Request`). Several generated names collide
//! with framework types, so refer to them with the `proto::` prefix.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

/// go-plugin controller service, used by the host to ask for shutdown
pub mod plugin {
    include!(concat!(env!("OUT_DIR"), "/plugin.rs"));
}

pub use provider_server::{Provider as ProviderService, ProviderServer};
