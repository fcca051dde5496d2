//! Windows backend
//!
//! Window search and focus go through UI Automation via the uiautomation crate,
//! low-level window control through the Win32 API, and process management through sysinfo.

pub mod engine;
pub mod input;
pub mod process;
pub mod types;
pub mod utils;

pub use engine::WindowsBackend;
pub use process::{find_process_ids, kill_processes, launch_process};
