pub mod avatar;
pub mod credential;
pub mod gateway;
pub mod session;
pub mod status;
pub mod vendor;

use vendor::SessionEvent;

/// Messages delivered to the session controller from its own background
/// tasks (timers, event forwarding).
///
/// The controller is driven from a single owner through `&mut self`, so these
/// tasks never touch it directly; the owner drains the channel and hands each
/// command to [`session::AvatarSessionController::handle_command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// The per-session duration ceiling elapsed.
    SessionExpired { generation: u64 },
    /// An event reported by the vendor for a running session.
    Session { generation: u64, event: SessionEvent },
}
