pub mod balancer;

pub use balancer::{balance, PlacementQueue};
