pub mod build_index;
pub mod check_drugs;
mod context;
pub mod search;
pub mod serve;
pub mod status;
