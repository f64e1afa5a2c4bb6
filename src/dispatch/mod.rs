//! Request dispatch.
//!
//! ## Contents
//! - [`DispatchQueue`] unbounded FIFO with "work available or stop" waits
//! - [`Transport`], [`Listener`], [`Connection`], [`Exchange`] request plumbing;
//!   [`TcpTransport`] and [`ChannelTransport`] implementations
//! - [`Handler`], [`NotificationHandler`] per-request logic and wire types
//! - [`Dispatcher`] the job tying the accept loop to the worker pool

mod dispatcher;
mod handler;
mod queue;
mod transport;

pub use dispatcher::Dispatcher;
pub use handler::{Handler, NotificationHandler, NotificationRequest, NotificationResponse};
pub use queue::DispatchQueue;
pub use transport::{
    ChannelClient, ChannelTransport, Connection, Exchange, Listener, TcpTransport, Transport,
    tcp_request,
};
