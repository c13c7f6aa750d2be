use std::panic;
use std::sync::Arc;
use std::sync::mpsc::channel;

use anyhow::Result;
use scoped_thread_pool::{Pool, ThreadConfig};

/// A pool with `n` threads named `prefix`...
pub fn new_threadpool(n: usize, prefix: &str) -> Arc<Pool> {
    Arc::new(Pool::with_thread_config(n, ThreadConfig::new().prefix(prefix)))
}

/// Execute function inside thread pool and return its result. A panic
/// in `f` is resumed in the calling thread.
pub fn in_threadpool<F, R>(threadpool: Arc<Pool>, f: F) -> Result<R>
where F: FnOnce() -> R + Send,
      R: Send
{
    let (tx, rx) = channel();
    threadpool.scoped(move |scope| {
        scope.execute(move || {
            // Note that we always resume unwinding afterwards.
            let result = panic::catch_unwind(panic::AssertUnwindSafe(f));
            // The receiver is only gone if the caller has given up.
            let _ = tx.send(result);
        });
        match rx.recv()? {
            Ok(r) => Ok(r),
            Err(payload) => panic::resume_unwind(payload),
        }
    })
}
