//! Coordinator side of the tracker: wire protocol, request dispatch and the
//! single-threaded socket server.

pub mod dispatch;
pub mod protocol;
mod server;

pub use dispatch::{ArgumentError, DispatchError, Dispatcher, Reply};
pub use protocol::{read_frame, write_frame, Frame, FrameBuffer, Operation, ProtocolError};
pub use server::{ShutdownHandle, TrackerServer};
