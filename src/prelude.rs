//!
//! globally-available parts
//!
pub use crate::em::{Fit, Learner, LearnerBuilder, TrainParams};
pub use crate::error::{CtHmmError, Result};
pub use crate::model::{ModelState, Topology};
pub use crate::sequence::Sequence;
pub use crate::stats::{EigenMode, StatsMethod};
