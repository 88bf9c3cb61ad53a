pub mod instance_provisioning;
pub mod viewership;
