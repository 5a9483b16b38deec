//! Read adapter that records when the peer last made progress.
//!
//! `ActivityReader` wraps the inbound half of a viewer connection and stamps
//! the time of every read that returns data or end-of-stream. The client uses
//! the stamp to tell a stalled server apart from a large frame arriving
//! slowly.

use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::{
    io::{AsyncRead, ReadBuf},
    time::Instant,
};

/// Stream adapter that tracks the last read which made progress.
#[derive(Debug)]
pub(crate) struct ActivityReader<T> {
    inner: T,
    last_progress: Instant,
}

impl<T> ActivityReader<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self {
            inner,
            last_progress: Instant::now(),
        }
    }

    /// Instant of the most recent read that returned data or EOF.
    pub(crate) fn last_progress(&self) -> Instant { self.last_progress }

    /// Restart the inactivity clock.
    pub(crate) fn touch(&mut self) { self.last_progress = Instant::now(); }
}

impl<T: AsyncRead + Unpin> AsyncRead for ActivityReader<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        // A ready read either carries data or reports EOF; both are progress.
        if let Poll::Ready(Ok(())) = poll {
            self.touch();
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn reads_with_data_advance_the_clock() {
        let (local, mut remote) = duplex(16);
        let mut reader = ActivityReader::new(local);
        let start = reader.last_progress();

        tokio::time::advance(Duration::from_millis(40)).await;
        remote.write_all(&[1, 2]).await.expect("write");
        let mut buf = [0_u8; 2];
        reader.read_exact(&mut buf).await.expect("read");

        assert_eq!(buf, [1, 2]);
        assert_eq!(reader.last_progress() - start, Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn touch_restarts_the_clock() {
        let (local, _remote) = duplex(16);
        let mut reader = ActivityReader::new(local);
        let start = reader.last_progress();
        tokio::time::advance(Duration::from_millis(25)).await;
        reader.touch();
        assert_eq!(reader.last_progress() - start, Duration::from_millis(25));
    }
}
