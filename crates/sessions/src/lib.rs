pub mod buffer;
pub mod context_store;
pub mod debounce;
pub mod epoch;
pub mod escalation;
pub mod key;
pub mod lifecycle;
pub mod store;
pub mod transcript;

pub use buffer::{BufferedMessage, InboundBuffer};
pub use context_store::{ContextStore, SessionMeta};
pub use debounce::{DebounceManager, DebounceOutcome};
pub use epoch::CancellationEpoch;
pub use escalation::EscalationTracker;
pub use key::KeyBuilder;
pub use lifecycle::{LifecycleManager, ResetReason};
pub use store::{InMemoryStore, KeyValueStore};
pub use transcript::{TranscriptLine, TranscriptWriter};
