//! Domain model (IDs, payloads, job records, failure classification).

pub mod ids;
pub mod job;
pub mod payload;
pub mod policy;

pub use ids::{JobId, OwnerId};
pub use job::{Job, JobStatus, TransitionError};
pub use payload::{
    AutoTagInput, AutoTagOutput, BatchInput, BatchOutput, HeadshotInput, ImageOutput, JobInput,
    JobKind, JobOutput, OutfitMannequinInput, OutfitRenderInput, ProductShotInput,
};
pub use policy::{FailureClass, classify_failure, is_policy_block};
