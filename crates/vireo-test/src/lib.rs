//! Test harness for the Vireo UI layer.
//!
//! Provides GPU-free doubles for every collaborator of [`vireo_ui::UiLayer`]:
//! a [`MockTarget`] that models fences, frame slots and semaphores and records
//! every protocol violation it sees, a [`MockUi`], and a [`MockWindow`] whose
//! size can be changed from the outside.

pub mod target;
pub mod ui;
pub mod window;

#[cfg(test)]
mod scenarios;

pub use target::{Call, CallLog, FenceState, MockTarget, Scripted};
pub use ui::{MockPayload, MockUi};
pub use window::MockWindow;
