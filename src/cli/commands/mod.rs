pub mod ping;
pub mod sweep;
pub mod token;
pub mod transitions;
