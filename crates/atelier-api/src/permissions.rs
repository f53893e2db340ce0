//! Pure decision logic for "may user A message user B".
//!
//! Callers gather the inputs (policy, block edges, follow relation) and
//! the functions here decide. First contact and sends into an existing
//! conversation are governed by different contracts: permission *level*
//! is evaluated only when no conversation exists yet, while block edges
//! and the `none` kill-switch apply to every send.

use atelier_types::models::MessagePermission;

/// The recipient's messaging configuration.
#[derive(Debug, Clone, Copy)]
pub struct RecipientPolicy {
    pub message_permission: MessagePermission,
    pub allow_messages: bool,
}

/// Block edges between the two parties, both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockState {
    pub sender_blocks_recipient: bool,
    pub recipient_blocks_sender: bool,
}

impl BlockState {
    pub fn any(&self) -> bool {
        self.sender_blocks_recipient || self.recipient_blocks_sender
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    SelfContact,
    Blocked,
    MessagesDisabled,
    RequiresExistingConversation,
    RequiresFollow,
}

impl Denial {
    pub fn message(&self) -> &'static str {
        match self {
            Self::SelfContact => "you cannot message yourself",
            Self::Blocked => "messaging is not available between these users",
            Self::MessagesDisabled => "this user is not accepting messages",
            Self::RequiresExistingConversation => {
                "this user only accepts messages in existing conversations"
            }
            Self::RequiresFollow => "this user only accepts messages from followers",
        }
    }
}

/// Gate for opening a new conversation. Callers skip this entirely when a
/// conversation between the pair already exists.
///
/// `related` is true when a follow edge exists in either direction.
pub fn check_first_contact(
    is_self: bool,
    policy: RecipientPolicy,
    blocks: BlockState,
    related: bool,
) -> Result<(), Denial> {
    if is_self {
        return Err(Denial::SelfContact);
    }
    if blocks.any() {
        return Err(Denial::Blocked);
    }
    if !policy.allow_messages {
        return Err(Denial::MessagesDisabled);
    }
    match policy.message_permission {
        MessagePermission::None => Err(Denial::MessagesDisabled),
        // No conversation exists yet, so this level can never admit a
        // first contact.
        MessagePermission::Existing => Err(Denial::RequiresExistingConversation),
        MessagePermission::Followers if !related => Err(Denial::RequiresFollow),
        MessagePermission::Followers | MessagePermission::Everyone => Ok(()),
    }
}

/// Gate for sending into an existing conversation, re-checked on every
/// send: settings may have changed since the conversation was created.
pub fn check_send(policy: RecipientPolicy, blocks: BlockState) -> Result<(), Denial> {
    if blocks.any() {
        return Err(Denial::Blocked);
    }
    if !policy.allow_messages || policy.message_permission == MessagePermission::None {
        return Err(Denial::MessagesDisabled);
    }
    Ok(())
}
