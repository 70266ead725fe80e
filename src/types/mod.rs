mod character;
mod chat;
mod conversation;
mod voice;

pub use character::*;
pub use chat::*;
pub use conversation::*;
pub use voice::*;
