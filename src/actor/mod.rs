use crate::execution::PrimaryExecution;
use crate::reactor::{Blueprint, Reactor, Role, RoutingError};
use crate::region::{Key, Region};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub fn create(buffer_size: usize, logger: slog::Logger, reactor: Reactor) -> (ReactorClient, ReactorActor) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let client = ReactorClient { sender: tx };
    let actor = ReactorActor {
        logger,
        receiver: rx,
        reactor,
    };

    (client, actor)
}

enum Event {
    // Stop executions that lost their role, start new ones, hand new contracts to the rest.
    UpdateBlueprint(Blueprint, oneshot::Sender<()>),

    // Route a query to the primary execution holding the key.
    PrimaryForKey(Key, Callback<Arc<PrimaryExecution>, RoutingError>),

    Roles(oneshot::Sender<Vec<(Region, Role)>>),

    // Stop everything. The event loop exits once every execution has.
    Shutdown(oneshot::Sender<()>),
}

struct Callback<O, E: Error>(oneshot::Sender<Result<O, E>>);

impl<O, E: Error> Callback<O, E> {
    pub fn send(self, message: Result<O, E>) {
        let _ = self.0.send(message);
    }
}

#[derive(Clone)]
pub struct ReactorClient {
    sender: mpsc::Sender<Event>,
}

impl ReactorClient {
    pub async fn update_blueprint(&self, blueprint: Blueprint) {
        let (tx, rx) = oneshot::channel();
        self.send(Event::UpdateBlueprint(blueprint, tx)).await;

        rx.await.expect("Reactor event loop actor dropped our channel. WTF!")
    }

    pub async fn primary_for_key(&self, key: Key) -> Result<Arc<PrimaryExecution>, RoutingError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::PrimaryForKey(key, Callback(tx))).await;

        rx.await.expect("Reactor event loop actor dropped our channel. WTF!")
    }

    pub async fn roles(&self) -> Vec<(Region, Role)> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Roles(tx)).await;

        rx.await.expect("Reactor event loop actor dropped our channel. WTF!")
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Shutdown(tx)).await;

        rx.await.expect("Reactor event loop actor dropped our channel. WTF!")
    }

    async fn send(&self, event: Event) {
        if self.sender.send(event).await.is_err() {
            panic!("Reactor event loop actor is dead. WTF!!");
        }
    }
}

/// ReactorActor is the reactor in actor model. Blueprint updates and query routing are
/// serialized through its queue.
pub struct ReactorActor {
    logger: slog::Logger,
    receiver: mpsc::Receiver<Event>,
    reactor: Reactor,
}

impl ReactorActor {
    pub async fn run_event_loop(mut self) {
        let mut shutdown_done = None;
        while let Some(event) = self.receiver.recv().await {
            if let Event::Shutdown(done) = event {
                shutdown_done = Some(done);
                break;
            }
            self.handle_event(event);
        }

        self.reactor.shutdown().await;
        slog::info!(self.logger, "Reactor event loop exited");
        if let Some(done) = shutdown_done {
            let _ = done.send(());
        }
    }

    // This must NOT be async. Executions do their long running work in their own tasks.
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::UpdateBlueprint(blueprint, done) => {
                self.reactor.update_blueprint(blueprint);
                let _ = done.send(());
            }
            Event::PrimaryForKey(key, callback) => {
                callback.send(self.reactor.primary_for_key(&key));
            }
            Event::Roles(tx) => {
                let _ = tx.send(self.reactor.roles());
            }
            Event::Shutdown(_) => unreachable!("Shutdown is handled by the event loop"),
        }
    }
}
