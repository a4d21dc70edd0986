pub mod audit;
pub mod claim;
pub mod consumer;
pub mod router;
pub mod session;

pub use audit::AuditPublisher;
pub use claim::{ClaimProcessor, ClaimStats, Delivery, OffsetCommitter};
pub use consumer::AlertConsumer;
pub use router::TopicRouter;
pub use session::{Membership, SessionEnd, SessionHandle};

#[cfg(test)]
mod session_tests;
