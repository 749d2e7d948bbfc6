//! Conversation handling: parsing, conversion, the wizard and routing

pub mod dispatch;
pub mod engine;
pub mod parser;
pub mod pump;
pub mod replies;
pub mod wizard;

pub use dispatch::{Command, Dispatcher};
pub use engine::{Conversion, ConversionError, Converter};
pub use pump::ReplySink;
pub use wizard::{ConversationStore, WizardError};
