pub mod clock;
pub mod directory;
pub mod lifecycle;
pub mod store;
pub mod supabase_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{DoctorDirectory, InMemoryDirectory, PatientDirectory, SupabaseDirectory};
pub use lifecycle::{AppointmentLifecycleService, CompletionPolicy, LifecycleRules, TransitionPolicy};
pub use store::{AppointmentStore, HistoryStore, InMemoryStore, StoreError};
pub use supabase_store::SupabaseStore;
