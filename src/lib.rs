//! MPN Channel - reliable push-notification control requests.
//!
//! Control requests for mobile/web push notifications (device registration,
//! subscription activation and deactivation) travel over a lossy streaming
//! session. This crate makes them reliable: every request is paired with a
//! [`Tutor`] that re-issues it on timeout until a response arrives or the
//! owning session ends.
//!
//! # Architecture
//!
//! - **RequestManager** - Facade: builds request/tutor pairs, rotates sessions, flushes queues
//! - **Tutor** - Per-request retry agent, answers "should I stop?" and recovers
//! - **RetrySession** - Session-wide dismissal token shared by tutors
//! - **ControlTransport** - Boundary with the engine that delivers requests
//! - **RetryScheduler** - Timeout bookkeeping for hosts without a scheduler
//!
//! # Modules
//!
//! - [`request`] - Request kinds, wire parameters and id allocation
//! - [`manager`] - Request manager
//! - [`notification`] - Notification format builders
//! - [`config`] - Configuration loading/saving

// Library modules
pub mod config;
pub mod constants;
pub mod manager;
pub mod model;
pub mod notification;
pub mod queue;
pub mod request;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod tutor;

// Re-export commonly used types
pub use config::Config;
pub use manager::{ManagerError, RequestManager, RequestManagerBuilder};
pub use model::{Device, Platform, RequestedLimit, StatusFilter, Subscription, SubscriptionMode};
pub use notification::{NotificationFormat, WebPushFormat};
pub use queue::{FilterQueue, FilterUnsubscribeQueue, MemoryQueue, PendingQueue};
pub use request::{Request, RequestError, RequestIdGenerator, RequestKind, RequestParams};
pub use scheduler::{PollOutcome, RetryScheduler};
pub use session::RetrySession;
pub use transport::{ChannelTransport, ControlTransport, OutgoingControl};
pub use tutor::{Tutor, TutorState, TutorTarget};
