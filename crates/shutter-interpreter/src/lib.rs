//! # shutter-interpreter
//!
//! Turns free text into one validated, executable command.
//!
//! ```text
//! text -> FeatureExtractor -> IntentRecognizer -> Translator -> Dispatcher
//!                                                   ^   |
//!                                       ConversationStore (per session)
//! ```
//!
//! [`Interpreter::interpret`] is the single natural-language entry point. It
//! returns an [`Interpretation`](shutter_core::Interpretation): a `Ready`
//! command, a clarification request to answer in the next turn of the same
//! session, or a rejection with a reason code. Ready commands are run with
//! [`Interpreter::dispatch`]; UI and agent callers that already know the
//! action use [`Interpreter::execute`] directly.

pub mod conversation;
pub mod error;
pub mod interpreter;
pub mod translator;

pub use conversation::{ConversationStore, PendingClarification};
pub use error::InterpreterError;
pub use interpreter::Interpreter;
pub use translator::{ACTION_PARAMETER, FollowUp, Translator, Turn};
