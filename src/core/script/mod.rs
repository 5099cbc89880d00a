pub mod batch;
pub mod host;
pub mod sequencer;

pub use batch::{
    classify, is_allowed_script_type, partition, Batch, CandidateKind, ScriptCandidate,
    ALLOWED_SCRIPT_TYPES,
};
pub use host::{
    LoadOutcome, NetworkResourceHost, ResourceHost, ResourceKind, ResourceRequest,
    ScriptEvaluator, TracingEvaluator,
};
pub use sequencer::{BatchReport, MemberReport, ScriptSequencer, SequenceReport};
