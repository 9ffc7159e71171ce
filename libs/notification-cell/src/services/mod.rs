pub mod center;
pub mod feed;
pub mod poller;
pub mod projection;
pub mod read_state;

pub use center::NotificationCenter;
pub use feed::{AppointmentFeed, HttpAppointmentFeed, LifecycleFeed};
pub use poller::{spawn_poller, PollerHandle, DEFAULT_POLL_INTERVAL};
pub use projection::{project, NEW_REQUEST_WINDOW_HOURS};
pub use read_state::{InMemoryReadState, ReadStateBackend, ReadStateTracker, RedisReadState};
