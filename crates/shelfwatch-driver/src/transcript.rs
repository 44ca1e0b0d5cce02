//! Stdin/stdout logs of a run.
//!
//! The two files replay with `shelfwatch check INPUT OUTPUT`.

use std::{io, path::Path};

use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};

/// Optional mirrors of everything sent to and read from the SUT.
#[derive(Debug, Default)]
pub struct Transcript {
    input: Option<BufWriter<File>>,
    output: Option<BufWriter<File>>,
}

impl Transcript {
    /// A transcript that records nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create (truncating) the log files that are given.
    pub async fn create(input: Option<&Path>, output: Option<&Path>) -> io::Result<Self> {
        Ok(Self { input: open(input).await?, output: open(output).await? })
    }

    /// Record a line written to the SUT.
    pub async fn sent(&mut self, line: &str) -> io::Result<()> {
        append(self.input.as_mut(), line).await
    }

    /// Record a line read from the SUT.
    pub async fn received(&mut self, line: &str) -> io::Result<()> {
        append(self.output.as_mut(), line).await
    }

    /// Push buffered lines to disk.
    pub async fn flush(&mut self) -> io::Result<()> {
        for log in [self.input.as_mut(), self.output.as_mut()].into_iter().flatten() {
            log.flush().await?;
        }
        Ok(())
    }
}

async fn open(path: Option<&Path>) -> io::Result<Option<BufWriter<File>>> {
    match path {
        Some(path) => Ok(Some(BufWriter::new(File::create(path).await?))),
        None => Ok(None),
    }
}

async fn append(log: Option<&mut BufWriter<File>>, line: &str) -> io::Result<()> {
    if let Some(log) = log {
        log.write_all(line.as_bytes()).await?;
        log.write_all(b"\n").await?;
    }
    Ok(())
}
