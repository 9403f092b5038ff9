//! Built-in job bodies.

pub mod bubbles;
pub mod dpo;
pub mod evaluate;
pub mod forecast;
pub mod rl;
pub mod self_eval;
pub mod sft;
pub mod synth;
pub mod train;
pub mod training;

pub const LEXICON_MODULE_ID: &str = "lexicon-wordnet3";
pub const CHAT_MODULE_ID: &str = "chat-core";
pub use workbench_core::layout::PREDICTOR_MODULE_ID;

/// Model id `train` registers for a module, seed and optional neural net.
pub fn default_model_id(module_id: &str, seed: u64, nn_id: Option<&str>) -> Option<String> {
    match (module_id, nn_id) {
        (CHAT_MODULE_ID, None) => Some(format!("chat_retrieval_{seed}")),
        (CHAT_MODULE_ID, Some(nn)) => Some(format!("chat_{nn}_{seed}")),
        (PREDICTOR_MODULE_ID, None) => Some(format!("predictor_ma_{seed}")),
        (PREDICTOR_MODULE_ID, Some(nn)) => Some(format!("predictor_{nn}_{seed}")),
        _ => None,
    }
}
