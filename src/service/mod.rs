pub mod autosave;
pub mod backend;
pub mod cache;
pub mod generation;
pub mod practice;
pub mod revision;
pub mod script_store;
pub mod task;
pub mod timer;
pub mod undo;
