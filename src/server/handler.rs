//! Connection handler callback and task spawning.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::net::BoxConn;

/// Future returned by a [`ConnectionHandler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handles one connection. Each call runs on its own task.
///
/// Implemented for any `Fn(BoxConn) -> impl Future<Output = ()>`:
///
/// ```ignore
/// let server = Server::new("udp", "127.0.0.1:0", |mut conn: BoxConn| async move {
///     let mut buf = [0u8; 1024];
///     while let Ok(n) = conn.read(&mut buf).await {
///         if n == 0 || conn.write_all(&buf[..n]).await.is_err() {
///             break;
///         }
///     }
/// })?;
/// ```
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serve `conn` until done. Dropping `conn` closes it.
    fn handle(&self, conn: BoxConn) -> HandlerFuture;
}

impl<F, Fut> ConnectionHandler for F
where
    F: Fn(BoxConn) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, conn: BoxConn) -> HandlerFuture {
        Box::pin(self(conn))
    }
}

/// Launches fire-and-forget handler tasks.
///
/// With a limit, at most that many handlers run at once; the rest wait for
/// a permit inside their own task so the accept/dispatch loop never blocks.
#[derive(Clone)]
pub(crate) struct HandlerSpawner {
    handler: Arc<dyn ConnectionHandler>,
    limit: Option<Arc<Semaphore>>,
}

impl HandlerSpawner {
    pub(crate) fn new(handler: Arc<dyn ConnectionHandler>, max_concurrent: Option<usize>) -> Self {
        Self {
            handler,
            limit: max_concurrent.map(|max| Arc::new(Semaphore::new(max))),
        }
    }

    pub(crate) fn spawn(&self, conn: BoxConn) {
        let serve = self.handler.handle(conn);

        match &self.limit {
            None => {
                tokio::spawn(serve);
            },
            Some(limit) => {
                let limit = Arc::clone(limit);
                tokio::spawn(async move {
                    // The semaphore is never closed.
                    let Ok(_permit) = limit.acquire_owned().await else {
                        return;
                    };
                    serve.await;
                });
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn pipe_conn() -> BoxConn {
        use crate::net::{AddrOverride, NetAddr};
        let (_, pipe) = tokio::io::duplex(16);
        let addr = NetAddr::Unix(None);
        Box::new(AddrOverride::new(pipe, addr.clone(), addr))
    }

    #[tokio::test]
    async fn test_unbounded_spawner_runs_all() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = Arc::new(move |_conn: BoxConn| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let spawner = HandlerSpawner::new(handler, None);
        for _ in 0..5 {
            spawner.spawn(pipe_conn());
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_limited_spawner_caps_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (active_c, peak_c) = (Arc::clone(&active), Arc::clone(&peak));
        let handler = Arc::new(move |_conn: BoxConn| {
            let active = Arc::clone(&active_c);
            let peak = Arc::clone(&peak_c);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        });

        let spawner = HandlerSpawner::new(handler, Some(2));
        for _ in 0..6 {
            spawner.spawn(pipe_conn());
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(active.load(Ordering::SeqCst), 0);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
