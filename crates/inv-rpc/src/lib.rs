//! Request dispatch and session plumbing for the inventory object store.
//!
//! Server side, a [`ServerRequest`] carries one inbound document to the
//! [`Dispatcher`], which routes each call by its first namespace segment
//! and answers through the originating [`ServerSession`]. Client side, a
//! [`ClientRequest`] drives one document through a [`ClientSession`],
//! blocking or on the [`Workqueue`].

pub mod call;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod local;
pub mod registry;
pub mod session;
pub mod workqueue;

pub use call::{respond, BatchCall, ServerRequest, SingleCall};
pub use client::{
    BatchClientRequest, ClientRequest, CompleteCallback, EntryHandler, RequestState,
    ResponseHandler, Shared, SharedVec, WeakShared,
};
pub use dispatch::{
    CallContext, DatamodelHandler, Dispatcher, NamespaceHandler, ObjectHandler,
    DATAMODEL_NAMESPACE,
};
pub use error::{RpcError, RpcResult};
pub use local::LocalClientSession;
pub use registry::{Client, Registry, Server, SessionId};
pub use session::{ClientSession, ReplyHandler, ServerSession, Session};
pub use workqueue::Workqueue;
