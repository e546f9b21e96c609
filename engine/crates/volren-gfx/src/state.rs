pub mod resource_state;
pub mod state_tracker;
