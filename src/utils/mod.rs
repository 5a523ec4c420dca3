// Shared utility modules
pub mod constants;
mod wait_for_element;

pub use wait_for_element::{LocateError, wait_for_input};
