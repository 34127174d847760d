//! Loss terms of the detection + pose head.
//!
//! Four terms are accumulated over a batch by summation and normalised by
//! the number of positive priors (at least one):
//!
//! ```text
//! L = w_cls·L_cls + w_bbox·L_bbox + w_obj·L_obj + w_aux·L_bbox_aux + w_kpt·L_kpt
//! ```
//!
//! `L_bbox_aux` only contributes during the first training stage.

mod components;
pub mod functional;
mod params;

pub use components::LossComponents;
pub use params::{LossParams, LossWeights, OksMode};
