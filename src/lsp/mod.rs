// LSP protocol layer
// - framing.rs: Content-Length frame splitting and writing
// - message.rs: JSON-RPC envelopes and error objects
// - client.rs: outbound messages to the client
// - dispatcher.rs: method-name routing and per-method counters
// - diagnostics.rs: publishDiagnostics push with size cap
// - backend.rs: method handlers over documents and analysis
// - server.rs: session state machine and read loop

pub mod backend;
pub mod client;
pub mod diagnostics;
pub mod dispatcher;
pub mod framing;
pub mod message;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::Backend;
pub use client::Client;
pub use dispatcher::{Dispatcher, RegistrationError};
pub use framing::{
    ByteSource, FramingError, MessageStreamSplitter, ReadStatus, ReaderSource, write_frame,
};
pub use message::{Message, Response, ResponseError};
pub use server::{ExitReason, Session, SessionReport, SessionState, run_stdio};
