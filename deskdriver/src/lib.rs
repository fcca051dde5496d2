//! Keyboard-driven automation for desktop applications that expose no automation API.
//!
//! The driver finds the application's window through the accessibility tree, makes
//! sure it has focus, and then replays synthetic keystrokes, waiting after each one
//! for the application to catch up. It is built to tolerate the things such
//! applications do: slow launches, modal dialogs, leftover autosave files, and UI
//! trees that change shape between versions.

pub mod activation;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod dialog;
pub mod driver;
pub mod errors;
pub mod locator;
pub mod platforms;
pub mod timing;

pub use activation::Activator;
pub use cleanup::{CleanupReport, CopiedFiles, RecoveryCleaner};
pub use commands::{CellRef, CommandPlan, InputAction, PlanExecutor};
pub use config::DriverConfig;
pub use dialog::{DialogOutcome, DialogWatcher};
pub use driver::{AppDriver, ApplicationHandle, DriverBuilder, DriverState};
pub use errors::{AutomationError, ErrorKind};
pub use locator::WindowLocator;
pub use platforms::{
    AutomationBackend, ChildQuery, ControlKind, SearchScope, SearchSpec, WindowRef,
};
pub use timing::{Phase, Sleeper, ThreadSleeper, TimingProfile};
