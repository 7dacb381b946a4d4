//! # timecast-core
//!
//! Shared library for timecast containing the live-connection registry and
//! the fan-out broadcaster.
//!
//! This crate is used by the server binary and by anything else that wants to
//! push text to a set of live sessions.  It has zero dependencies on network
//! sockets or async runtimes: a connection is just something that implements
//! [`Connection`].
//!
//! # Architecture overview
//!
//! ```text
//! hosting layer (WebSocket server)
//!   on open / close / error ──►  ConnectionLifecycle ──►  ConnectionRegistry
//!                                                                ▲
//! periodic trigger (ticker) ──►  Broadcaster::send ── snapshot ──┘
//!                                      │
//!                                      └── Connection::send_text (one per handle)
//! ```
//!
//! - **`connection`** – The handle abstraction (`Connection`), its identity
//!   (`ConnectionId`) and the per-delivery error (`DeliveryFailure`).
//!
//! - **`registry`** – The authoritative set of live handles.  Safe for
//!   concurrent add/remove and iteration from any number of threads.
//!
//! - **`broadcaster`** – Sends one message to every handle in a registry
//!   snapshot.  One failing connection never aborts delivery to the rest.
//!
//! - **`lifecycle`** – Maps the hosting layer's open/close/error
//!   notifications onto the registry.
//!
//! - **`mock`** – An in-memory connection that records what it was sent.

pub mod broadcaster;
pub mod connection;
pub mod lifecycle;
pub mod mock;
pub mod registry;

pub use broadcaster::{BroadcastError, Broadcaster, DeliveryReport};
pub use connection::{Connection, ConnectionId, DeliveryFailure};
pub use lifecycle::{ConnectionLifecycle, CONNECTION_ESTABLISHED};
pub use registry::{ConnectionRegistry, RegistryError, Snapshot};
