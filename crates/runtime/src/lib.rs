//! Chat runtime of the workbench: guardrails, lexicon retrieval and offline
//! character-level fallbacks.
//!
//! Nothing here performs network I/O; every answer is derived from files
//! under the workspace root.

pub mod babble;
pub mod cache;
pub mod chat;
pub mod counters;
pub mod error;
pub mod guardrails;
pub mod lexicon;
pub mod ngram;
pub mod wordnet;

pub use babble::BabbleModel;
pub use chat::{AnswerMeta, ChatAnswer, ChatReply, ChatRuntime};
pub use error::{RuntimeError, RuntimeResult};
pub use guardrails::{GuardedText, GuardrailAction};
pub use lexicon::{LexiconIndex, LexiconRecord};
pub use ngram::{NgramModel, NgramStats};
