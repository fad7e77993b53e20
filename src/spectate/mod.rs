//! Delayed spectator broadcast
//!
//! Lets non-players watch a live table while enforcing a per-room delay
//! between the authoritative state and what spectators can see, plus a
//! per-room spectator cap. Each room owns its policy, its spectator set and
//! a rolling five minute snapshot history behind its own lock.

pub mod clock;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod policy;
pub mod registry;
pub mod room;
pub mod service;
pub mod view;

use uuid::Uuid;

pub type RoomId = Uuid;
pub type SpectatorId = Uuid;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SpectateError;
pub use history::{DelayedStateBuffer, RecordOutcome, Snapshot, RETENTION_WINDOW};
pub use policy::RoomPolicy;
pub use registry::{Spectator, SpectatorRegistry};
pub use service::{DelayedFrame, SpectateService};
pub use view::{SeatView, Street, TableView};
