//! Scripted browser recordings with narration kept in step with the action.

pub mod api;
pub mod config;
pub mod driver;
pub mod error;
pub mod files;
pub mod narration;
pub mod scene;
pub mod script;
pub mod session;
pub mod video;

#[cfg(test)]
mod testing;

pub use config::{Pacing, SessionConfig};
pub use error::{ElmoError, Result};
pub use scene::callout::CalloutId;
pub use scene::metadata::{NarrationEntry, SceneKind, SceneMetadata};
pub use scene::{Scene, SceneState};
pub use session::Elmo;
