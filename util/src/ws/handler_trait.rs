use super::runtime::WsContext;
use serde::de::DeserializeOwned;
use std::future::Future;

pub trait WsHandler: Send + Sync + 'static {
    /// Incoming client message type (a tagged enum works best).
    type In: DeserializeOwned + Send;

    /// Called once the socket is subscribed and presence is registered.
    fn on_open(&self, ctx: &WsContext) -> impl Future<Output = ()> + Send {
        async move {
            let _ = ctx;
        }
    }

    fn on_message(&self, ctx: &WsContext, msg: Self::In) -> impl Future<Output = ()> + Send;

    /// Called when the connection closes; presence is unregistered afterwards.
    fn on_close(&self, ctx: &WsContext) -> impl Future<Output = ()> + Send {
        async move {
            let _ = ctx;
        }
    }
}
