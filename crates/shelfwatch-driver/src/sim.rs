//! In-process SUT backed by [`SimLibrary`].

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use shelfwatch_harness::{SimFault, SimLibrary};
use tracing::trace;

use crate::{error::SutError, sut::Sut};

/// [`SimLibrary`] behind the [`Sut`] trait.
///
/// Answers synchronously, so an empty queue means the library has nothing
/// more to say and `next_line` times out at once.
#[derive(Debug)]
pub struct SimSut {
    library: SimLibrary,
    pending: VecDeque<String>,
    closed: bool,
}

impl SimSut {
    /// Simulated library with `fault` injected.
    pub fn new(fault: SimFault) -> Self {
        Self { library: SimLibrary::new(fault), pending: VecDeque::new(), closed: false }
    }

    /// The wrapped library.
    pub fn library(&self) -> &SimLibrary {
        &self.library
    }
}

#[async_trait]
impl Sut for SimSut {
    async fn send_line(&mut self, line: &str) -> Result<(), SutError> {
        if self.closed {
            return Err(SutError::Closed);
        }
        let output = self.library.feed_line(line)?;
        trace!(line, answered = output.len(), "simulated SUT");
        self.pending.extend(output);
        Ok(())
    }

    async fn next_line(&mut self, timeout: Duration) -> Result<String, SutError> {
        self.pending.pop_front().ok_or(SutError::Timeout { after: timeout })
    }

    async fn shutdown(&mut self) -> Result<(), SutError> {
        self.closed = true;
        Ok(())
    }
}
