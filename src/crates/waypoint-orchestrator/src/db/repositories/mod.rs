//! Database repositories

pub mod approval_repo;
pub mod session_repo;

pub use approval_repo::ApprovalRepository;
pub use session_repo::SessionRepository;
