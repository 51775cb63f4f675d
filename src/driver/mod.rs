pub mod options;
pub mod protocol;
pub mod session;

pub use options::{AgentOptions, ImageAttachment, LoadedImage, MediaType, PermissionMode};
pub use protocol::AgentEvent;
pub use session::AgentSession;
