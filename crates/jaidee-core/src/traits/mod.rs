//! Collaborator traits. Every component receives these as `Arc<dyn _>`
//! handles so tests can substitute doubles.

pub mod completion;
pub mod kv;
pub mod push;
pub mod store;

pub use completion::{CompletionOptions, TextCompletion};
pub use kv::KeyValueStore;
pub use push::PushChannel;
pub use store::ConversationStore;
