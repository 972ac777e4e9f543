//! A small runtime-agnostic spawn capability, so the prefetcher doesn't hard-code a particular
//! async executor.

use std::future::Future;
use std::sync::Arc;

use futures::task::SpawnExt;
use futures::FutureExt;

pub trait Spawn {
    type JoinHandle<T>;

    fn spawn<F>(&self, future: F) -> Self::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static;
}

impl Spawn for futures::executor::ThreadPool {
    type JoinHandle<T> = ();

    fn spawn<F>(&self, future: F) -> Self::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let future = future.map(|_| ());
        SpawnExt::spawn(self, future).expect("failed to spawn onto thread pool");
    }
}

impl Spawn for tokio::runtime::Handle {
    type JoinHandle<T> = tokio::task::JoinHandle<T>;

    fn spawn<F>(&self, future: F) -> Self::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::runtime::Handle::spawn(self, future)
    }
}

impl<S: Spawn> Spawn for Arc<S> {
    type JoinHandle<T> = S::JoinHandle<T>;

    fn spawn<F>(&self, future: F) -> Self::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.as_ref().spawn(future)
    }
}
