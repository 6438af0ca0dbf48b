use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Returns a linked pair. The rpc server stops once the handle is shut down or dropped.
pub fn shutdown_signal() -> (RpcServerShutdownHandle, RpcServerShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (RpcServerShutdownHandle { tx }, RpcServerShutdownSignal { rx })
}

pub struct RpcServerShutdownHandle {
    tx: oneshot::Sender<()>,
}

impl RpcServerShutdownHandle {
    pub fn shutdown(self) {
        let _ = self.tx.send(());
    }
}

pub struct RpcServerShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for RpcServerShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Sent or dropped, either way we stop.
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}
