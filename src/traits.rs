//! Re-exports of the crate's traits

pub use crate::datatype::FixedSizeValue;
pub use crate::transport::Transport;
