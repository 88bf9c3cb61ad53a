pub mod config;
pub mod features;
pub mod shared;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ComputeBackend, ControllerConfig};
pub use features::instance_provisioning::service::InstanceProvisioner;
pub use features::viewership::controller::ViewershipController;
pub use features::viewership::service::ViewershipService;
