pub mod features;

pub use features::compute_provider::repo::ec2::Ec2ComputeRepository;
pub use features::compute_provider::repo::sigv4::AwsCredentials;
pub use features::compute_provider::repo::{ComputeRepository, InMemoryComputeRepository};
pub use features::compute_provider::{ComputeError, LaunchParams, TagFilter};
pub use features::stream_provider::repo::helix::{HelixCredentials, HelixStreamRepository};
pub use features::stream_provider::repo::StreamRepository;
#[cfg(any(test, feature = "mocks"))]
pub use features::stream_provider::repo::MockStreamRepository;
pub use features::stream_provider::{ChannelUser, LiveStream, StreamError};
