pub mod counts;
pub mod error;
pub mod follow;
pub mod transitions;
pub mod visibility;
