//! loanrisk-cli: batch stages and interactive front-ends behind the `loanrisk` binary.
pub mod app;
pub mod explain;
pub mod predict;
pub mod prepare;
pub mod train;
pub mod util;
