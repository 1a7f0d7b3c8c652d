//! Elementwise kernel generation and execution.
//!
//! A kernel is a chain of nodes built at call time against the concrete
//! operand types: dimension-peeling nodes iterate over leading dimensions
//! (inserting stride-0 broadcasting), and a leaf node invokes the
//! user-supplied callable through repointable shell array handles under the
//! interpreter lock.

pub mod assign;
pub mod elwise_dim;
pub mod generator;
pub mod kernel;
pub mod map;
pub mod user_call;

pub use generator::{ExprKernelGenerator, UserCallableGenerator};
pub use kernel::{KernelChain, KernelRequest};
pub use map::elwise_map;
pub use user_call::UserCallable;
