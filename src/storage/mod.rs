//!  Storage is organized through [walk_storage::WalkStorageImpl].
//!  The basic idea is:
//!   - There is a directory with all the walks.
//!   - Each month gets its own file named `YYYY-MM`.
//!   - Files contain one JSON encoded [entities::WalkEntity] per line. Writes only append, and
//!     the last line of a date is its current value.

pub mod entities;
pub mod walk_storage;
