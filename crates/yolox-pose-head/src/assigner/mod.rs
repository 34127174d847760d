//! SimOTA label assignment.
//!
//! Per image, priors whose centers fall inside a ground-truth box or near
//! its center become candidates; a cost blending classification and IoU
//! terms ranks them, and every ground truth takes its `k` cheapest
//! candidates with `k` estimated from its best IoUs. A prior claimed by
//! several ground truths keeps the cheapest one.

mod params;
mod result;
mod sim_ota;

pub use params::SimOtaParams;
pub use result::AssignResult;
pub use sim_ota::{AssignInput, SimOtaAssigner};
