//! Real-time side of the core: match sessions and the subscription registry.

mod match_session;
mod registry;

pub use match_session::{
    InputEvent, Key, MatchSession, SessionError, Snapshot, BALL_RADIUS, FIELD_HEIGHT, FIELD_WIDTH,
    PADDLE_HEIGHT, PADDLE_INSET,
};
pub use registry::{
    MatchEntry, Outbound, RegistryError, SessionRegistry, SubscriptionHandle, SubscriptionId, Topic,
};
