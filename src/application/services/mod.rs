//! Application services
//!
//! Each service orchestrates domain logic and uses I/O traits.

pub mod family;
pub mod members;

pub use family::{FamilyService, MemberDetails};
pub use members::{MemberService, NewMember};
