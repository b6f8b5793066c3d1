//! Console source and sink for the pipeline's edges.

use crate::context::StageContext;
use crate::error::Result;
use crate::stream::{stream, Stream};
use crossbeam::channel::select;
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

/// Read one integer per line from `reader` into a new stream.
///
/// The stream closes at end of input or at the first line that is not an
/// integer; both count as a normal end of input for the pipeline. Each send
/// races against the context's cancellation signal, so the reader thread
/// never outlives a cancelled run by more than one blocking read.
pub fn spawn_line_source<R>(reader: R, ctx: &StageContext) -> Stream<i64>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = stream();
    let cancel = ctx.cancellation().clone();

    ctx.spawn("line source", move || {
        let mut sent = 0u64;
        'lines: for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "failed to read input line");
                    break;
                }
            };
            let value = match line.trim().parse::<i64>() {
                Ok(value) => value,
                Err(_) => {
                    info!(input = %line.trim(), "non-numeric input, closing source");
                    break;
                }
            };
            debug!(value, "read value from input");

            select! {
                send(tx, value) -> res => {
                    if res.is_err() {
                        debug!("pipeline input reader dropped, closing source");
                        break 'lines;
                    }
                    sent += 1;
                },
                recv(cancel.signal()) -> _ => {
                    debug!("cancelled, closing source");
                    break 'lines;
                },
            }
        }
        info!(sent, "line source finished");
    });

    rx
}

/// Writes every value of a stream as a line of text.
pub struct ConsoleSink<W: Write> {
    writer: W,
    prefix: String,
    count: u64,
}

impl<W: Write> ConsoleSink<W> {
    /// Create a sink writing `Processed: <value>` lines
    pub fn new(writer: W) -> Self {
        Self::with_prefix(writer, "Processed: ")
    }

    /// Create a sink with a custom line prefix
    pub fn with_prefix(writer: W, prefix: impl Into<String>) -> Self {
        Self {
            writer,
            prefix: prefix.into(),
            count: 0,
        }
    }

    /// Get the number of values written
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Write every value until the stream closes. Returns the number of
    /// values written by this call.
    pub fn drain<T: std::fmt::Display>(&mut self, stream: &Stream<T>) -> Result<u64> {
        let mut written = 0;
        for value in stream.iter() {
            writeln!(self.writer, "{}{}", self.prefix, value)?;
            self.writer.flush()?;
            written += 1;
        }
        self.count += written;
        info!(written, "final stream closed");
        Ok(written)
    }

    /// Consume the sink and return the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use std::io::Cursor;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_source_stops_at_non_numeric_line() {
        let ctx = StageContext::new(CancellationToken::new());
        let input = Cursor::new("1\n-2\n 3 \nstop\n4\n");
        let values: Vec<i64> = spawn_line_source(input, &ctx).iter().collect();
        ctx.join().unwrap();
        assert_eq!(values, vec![1, -2, 3]);
    }

    #[test]
    fn test_source_closes_on_empty_input() {
        let ctx = StageContext::new(CancellationToken::new());
        let stream = spawn_line_source(Cursor::new(""), &ctx);
        assert!(stream.recv().is_err());
        ctx.join().unwrap();
    }

    #[test]
    fn test_source_does_not_block_after_cancel() {
        let ctx = StageContext::new(CancellationToken::new());
        let stream = spawn_line_source(Cursor::new("1\n2\n3\n"), &ctx);

        // Nobody reads, so the source blocks on its first send.
        thread::sleep(Duration::from_millis(20));
        ctx.cancellation().cancel();
        ctx.join().unwrap();
        drop(stream);
    }

    #[test]
    fn test_sink_writes_lines() {
        let (tx, rx) = stream();
        let producer = thread::spawn(move || {
            for v in [3i64, 6, 9] {
                tx.send(v).unwrap();
            }
        });

        let mut sink = ConsoleSink::new(Vec::new());
        assert_eq!(sink.drain(&rx).unwrap(), 3);
        producer.join().unwrap();

        assert_eq!(sink.count(), 3);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "Processed: 3\nProcessed: 6\nProcessed: 9\n");
    }
}
