//! Shared utilities for integration tests.

use std::net::SocketAddr;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use wireguard_server::lifecycle::{BoxError, GroupError, RunGroup, StopSignal, Task};
use wireguard_server::observability::Logger;
use wireguard_server::{ServerBuilder, ServerRuntime};

/// Builder bound to an ephemeral loopback port with logging off.
pub fn local(router: &str) -> ServerBuilder {
    ServerBuilder::new()
        .host("127.0.0.1")
        .port(0)
        .router_name(router)
        .logger(Logger::nil())
}

/// A server running in its own run group.
pub struct TestServer {
    pub addr: SocketAddr,
    pub server: ServerRuntime,
    trigger: oneshot::Sender<()>,
    group: JoinHandle<Result<(), GroupError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop the group and wait for every task.
    pub async fn stop(self) -> Result<(), GroupError> {
        let _ = self.trigger.send(());
        self.group.await.unwrap()
    }
}

/// Run `server` together with a task the test can end through `stop`.
pub async fn start(server: ServerRuntime) -> TestServer {
    let (trigger, triggered) = oneshot::channel::<()>();

    let mut group = RunGroup::new();
    group.add(Task::new("test-stop", move |stop: StopSignal| async move {
        tokio::select! {
            _ = triggered => {}
            _ = stop.fired() => {}
        }
        Ok::<(), BoxError>(())
    }));
    for task in server.runnables() {
        group.add(task);
    }

    let group = tokio::spawn(group.run());
    let addr = server.local_addr().await.expect("server should bind");

    TestServer {
        addr,
        server,
        trigger,
        group,
    }
}
