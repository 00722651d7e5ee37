/*!
 * Thread-Safe Driver Handle
 *
 * `Driver` has no internal locking. `SharedDriver` puts one behind a mutex so
 * several threads can issue commands over the same connection; the lock is
 * held for the whole exchange, which keeps exactly one command in flight.
 */

use crate::driver::{Driver, KvsDriver};
use crate::error::Result;
use crate::protocol::{Command, Reply};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable, mutex-guarded handle to a single driver
pub struct SharedDriver<T: Transport> {
    inner: Arc<Mutex<Driver<T>>>,
}

impl<T: Transport> Clone for SharedDriver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> SharedDriver<T> {
    pub fn new(driver: Driver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    pub fn open(&self, host: &str, port: u16) -> Result<()> {
        self.inner.lock().open(host, port)
    }

    pub fn close(&self) {
        self.inner.lock().close()
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().is_open()
    }

    /// Run one full exchange while holding the lock
    pub fn request(&self, command: &Command) -> Result<Reply> {
        self.inner.lock().request(command)
    }

    /// Run `f` with exclusive access to the underlying driver
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut Driver<T>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<T: Transport> KvsDriver for SharedDriver<T> {
    fn open(&mut self, host: &str, port: u16) -> Result<()> {
        SharedDriver::open(self, host, port)
    }

    fn close(&mut self) {
        SharedDriver::close(self)
    }

    fn is_open(&self) -> bool {
        SharedDriver::is_open(self)
    }

    fn request(&mut self, command: &Command) -> Result<Reply> {
        SharedDriver::request(self, command)
    }
}
