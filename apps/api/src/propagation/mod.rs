pub mod handlers;
pub mod mutations;
pub mod propagator;
pub mod table;

pub use propagator::Propagator;
