//! vl-client: VR client session manager for vrlink
//!
//! The client keeps one persistent websocket session to the tracking and
//! haptics server, classifies inbound JSON frames by their `cmd` field and
//! keeps the latest state for the render loop. Outbound commands are
//! fire-and-forget.

pub mod frame_loop;
pub mod restart;
pub mod session;
pub mod transport;

pub use frame_loop::{FrameLoop, FrameSink, FrameStats, StatusSink};
pub use session::{SendOutcome, SessionExit, SessionHandle, SessionManager, SessionOptions};
pub use transport::WsConnector;
