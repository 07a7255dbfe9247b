//! Test helpers for crates that resolve URLs through a [`StorageGateway`](crate::StorageGateway).

mod mock_presigner;

pub use mock_presigner::MockPresigner;
