//! Four-panel overlay that darkens everything around one element.

use serde_json::{json, Value};

pub(crate) const POINTER_SCRIPT: &str = include_str!("js/pointer.js");
pub(crate) const SHOW_SCRIPT: &str = include_str!("js/callout_show.js");
pub(crate) const FADE_SCRIPT: &str = include_str!("js/callout_fade.js");
pub(crate) const REMOVE_SCRIPT: &str = include_str!("js/callout_remove.js");

const SIDES: [&str; 4] = ["top", "bottom", "left", "right"];

/// Token for a shown callout. Handing it back dismisses that callout only if
/// it is still the active one.
#[derive(Debug, PartialEq, Eq)]
pub struct CalloutId(u64);

/// The scene's record of the overlay elements currently in the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CalloutHandle {
    serial: u64,
    masks: [String; 4],
}

impl CalloutHandle {
    pub(crate) fn new(scene: &str, serial: u64) -> Self {
        Self {
            serial,
            masks: SIDES.map(|side| format!("elmo-callout-{}-{}-{}", scene, serial, side)),
        }
    }

    pub(crate) fn id(&self) -> CalloutId {
        CalloutId(self.serial)
    }

    pub(crate) fn is(&self, id: &CalloutId) -> bool {
        self.serial == id.0
    }

    pub(crate) fn mask_ids(&self) -> &[String; 4] {
        &self.masks
    }

    pub(crate) fn show_args(&self, selector: &str, offset: f64, fade_ms: u64) -> Value {
        json!([selector, self.masks, offset, fade_ms])
    }

    pub(crate) fn mask_args(&self) -> Value {
        json!([self.mask_ids()])
    }
}
