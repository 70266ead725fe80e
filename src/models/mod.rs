pub mod character;
pub mod conversation;
pub mod subscription;

pub use character::{Category, Character};
pub use conversation::{Conversation, ConversationSummary, Message, Role};
pub use subscription::{Subscription, SubscriptionStatus};
