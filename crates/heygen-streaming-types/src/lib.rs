//now people using the types library can use these types
pub mod envelope;
pub mod events;
pub mod session;
pub mod task;

//re-export types for easier access
pub use envelope::{ApiResponse, ErrorBody};
pub use events::ServerEvent;
pub use session::{AvatarQuality, NewSessionRequest, SessionIdRequest, SessionInfo, VoiceSetting};
pub use task::{TaskInfo, TaskMode, TaskRequest, TaskType};
