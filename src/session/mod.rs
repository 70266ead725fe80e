//! Client-side conversation driver: optimistic sends, debounced persistence,
//! background voice generation and single-clip playback.

mod audio;
mod backend;
mod conversation;
mod debounce;

pub use audio::{from_data_url, to_data_url, AudioOutput};
pub use backend::{HttpBackend, SessionBackend, SessionError};
pub use conversation::{ConversationSession, SessionOptions, SessionStatus};
pub use debounce::Debouncer;
