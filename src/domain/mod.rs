pub mod errors;
pub mod input;
pub mod prediction;
pub mod session;
pub mod verdict;
