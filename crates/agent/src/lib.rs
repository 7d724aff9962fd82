//! Reply pipeline for the outreach bot.
//!
//! Each inbound message flows through a fixed sequence:
//! 1. **Intent** (`intent`) - keyword rules over normalized text
//! 2. **Decision** (`decision`) - link/tone policy from intent and stored history
//! 3. **Generation** (`engine`) - ordered models with bounded retries over a `GenerationProvider`
//! 4. **Fallback** (`fallback`) - template replies when every model fails
//! 5. **Enforcement** (`guardrails`) - link and greeting repairs on whatever is returned
//!
//! `AgentRuntime` in `runtime` wires the sequence together and is the only entry point.
//!
//! # Safety Principle
//!
//! Provider output is never trusted to honour the link policy. The decision is computed
//! deterministically and the enforcer rewrites every reply to match it.

pub mod decision;
pub mod engine;
pub mod enrichment;
pub mod fallback;
pub mod gemini;
pub mod guardrails;
pub mod intent;
pub mod llm;
pub mod prompt;
pub mod runtime;

pub use decision::{DecisionRecord, FallbackCategory, HistoryFlags};
pub use engine::{Generation, GenerationEngine, GenerationError, RetryPolicy};
pub use gemini::GeminiClient;
pub use guardrails::ResponsePolicy;
pub use intent::{IntentClassifier, IntentSignals};
pub use llm::{GenerationProvider, ProviderError, ProviderErrorKind};
pub use runtime::AgentRuntime;
