pub mod system;

pub use system::*;

use serde::{Deserialize, Serialize};

use crate::platform::Bounds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    BoundsChanged(Bounds),
    Closed,
    PageComposed { url: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::BoundsChanged(_) => "boundschanged",
            Event::Closed => "closed",
            Event::PageComposed { .. } => "pagecomposed",
        }
    }
}
