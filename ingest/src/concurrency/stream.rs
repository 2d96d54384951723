use core::pin::Pin;
use core::task::{Context, Poll};
use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::IngestResult;
use crate::types::{Batch, Record};

pin_project! {
    /// A stream adapter that groups records into [`Batch`]es of at most `max_batch_size` items.
    ///
    /// Records are pulled from the inner stream only while this stream is being polled, so the
    /// reader never gets ahead of the consumer by more than one batch. A full batch is emitted
    /// as soon as it reaches capacity and the non-empty remainder is emitted when the inner
    /// stream ends.
    ///
    /// An error from the inner stream discards the records buffered since the last emitted
    /// batch, is forwarded as is and ends the stream.
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub struct BatchStream<S: Stream<Item = IngestResult<Record>>> {
        #[pin]
        stream: S,
        source: Arc<Path>,
        items: Vec<Record>,
        max_batch_size: usize,
        next_row: u64,
        stream_ended: bool,
    }
}

impl<S: Stream<Item = IngestResult<Record>>> BatchStream<S> {
    /// Creates a new [`BatchStream`].
    ///
    /// A `max_batch_size` of zero is treated as one.
    pub fn wrap(stream: S, source: Arc<Path>, max_batch_size: usize) -> Self {
        let max_batch_size = max_batch_size.max(1);

        BatchStream {
            stream,
            source,
            items: Vec::with_capacity(max_batch_size),
            max_batch_size,
            next_row: 0,
            stream_ended: false,
        }
    }

    fn take_batch(items: &mut Vec<Record>, source: &Arc<Path>, next_row: &mut u64) -> Batch {
        let records = std::mem::take(items);
        let first_row = *next_row;
        *next_row += records.len() as u64;

        Batch::new(source.clone(), first_row, records)
    }
}

impl<S: Stream<Item = IngestResult<Record>>> Stream for BatchStream<S> {
    type Item = IngestResult<Batch>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.stream_ended {
            return Poll::Ready(None);
        }

        loop {
            if this.items.is_empty() {
                this.items.reserve_exact(*this.max_batch_size);
            }

            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(record)) => {
                    this.items.push(record);

                    if this.items.len() >= *this.max_batch_size {
                        return Poll::Ready(Some(Ok(Self::take_batch(
                            this.items,
                            this.source,
                            this.next_row,
                        ))));
                    }
                }
                Some(Err(err)) => {
                    if !this.items.is_empty() {
                        debug!(
                            path = %this.source.display(),
                            discarded_rows = this.items.len(),
                            "discarding partial batch after read error"
                        );
                        this.items.clear();
                    }

                    *this.stream_ended = true;

                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    *this.stream_ended = true;

                    if this.items.is_empty() {
                        return Poll::Ready(None);
                    }

                    return Poll::Ready(Some(Ok(Self::take_batch(
                        this.items,
                        this.source,
                        this.next_row,
                    ))));
                }
            }
        }
    }
}
