// motion_core: scroll-speed parallax and viewport entrance animations, Rust/WASM.
// Controllers are generic over `Host`; the browser binding lives in `web`, tests run on `MemoryHost`.

mod config;
mod easing;
mod entrance;
mod error;
mod host;
mod memory;
mod parallax;
mod ticker;
mod transform;
mod types;
mod visibility;
#[cfg(target_arch = "wasm32")]
mod web;

use wasm_bindgen::prelude::*;

pub use config::{EntranceConfig, ParallaxConfig};
pub use easing::CubicBezier;
pub use entrance::{attribute_candidates, AnimationKind, EntranceController, EntranceRecord, Phase};
pub use error::{HostError, MotionError};
pub use host::{added_nodes_match, first_attribute, Host, ScanRoot};
pub use memory::{MemoryHost, NodeId};
pub use parallax::{MotionRecord, ParallaxController};
pub use ticker::{FrameClient, InstanceId, Ticker};
pub use transform::{compose, decompose, Decomposed, Matrix2d, Residual, Scale};
pub use types::*;
pub use visibility::{visibility_ratio, ActivationMargin, IntersectionEntry, MarginLength};
#[cfg(target_arch = "wasm32")]
pub use web::{MotionRuntime, WebHost};

/// Install the panic hook and route `log` output to the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(target_arch = "wasm32")]
    console_log::init_with_level(log::Level::Info).ok();
}
