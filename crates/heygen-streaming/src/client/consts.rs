pub const BASE_URL: &str = "https://api.heygen.com";

pub const NEW_SESSION_PATH: &str = "/v1/streaming.new";
pub const START_SESSION_PATH: &str = "/v1/streaming.start";
pub const TASK_PATH: &str = "/v1/streaming.task";
pub const STOP_SESSION_PATH: &str = "/v1/streaming.stop";
pub const INTERRUPT_PATH: &str = "/v1/streaming.interrupt";
pub const KEEP_ALIVE_PATH: &str = "/v1/streaming.keep_alive";
pub const EVENTS_PATH: &str = "/v1/ws/streaming.chat";
