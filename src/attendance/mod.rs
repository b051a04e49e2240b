//! Attendance-scan workflow: the per-session draft, dirty tracking, the save coordinator and
//! the scanner boundary.

pub mod dirty;
pub mod draft;
pub mod record;
pub mod save;
pub mod scan;
pub mod session;

pub use draft::DraftAction;
pub use record::{AttendanceRecord, AttendanceStatus, ViolationKind};
pub use save::{save, SaveError, SaveReport};
pub use session::{AttendanceSession, DraftError};
