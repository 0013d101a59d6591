//! Mutable state of one carve run.
//!
//! The run holds a single working buffer together with the absolute stream
//! offset of its first byte. Every active signature gets a [`Lane`] with a
//! cursor into that buffer: the first local index where a header of that
//! signature could still start. After each scan the buffer is trimmed to the
//! smallest cursor across all lanes, so memory stays near the largest
//! `max_span` plus one chunk however long the input is.

use crate::error::{Error, Result};
use crate::registry::Signature;
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, Input};
use std::io::{ErrorKind, Read};
use std::ops::Range;
use tracing::trace;

/// A located header/footer pair, in absolute stream offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Match {
    pub(crate) type_tag: &'static str,
    pub(crate) absolute_start_offset: u64,
    /// One past the last footer byte
    pub(crate) absolute_end_offset: u64,
}

/// Per-signature scan progress
#[derive(Debug)]
struct Lane<'r> {
    signature: &'r Signature,
    headers: AhoCorasick,
    footers: AhoCorasick,
    /// Local index where the next header search starts. While a header is
    /// undecided this points at that header.
    cursor: usize,
    /// Set while the header at `cursor` is undecided: local index where the
    /// footer search resumes once more data arrives.
    footer_from: Option<usize>,
}

impl<'r> Lane<'r> {
    fn new(signature: &'r Signature) -> Result<Self> {
        Ok(Self {
            signature,
            headers: matcher(signature, signature.header())?,
            footers: matcher(signature, signature.footer())?,
            cursor: 0,
            footer_from: None,
        })
    }

    fn is_undecided(&self) -> bool {
        self.footer_from.is_some()
    }

    /// Walks headers from the cursor until the buffer is exhausted or a
    /// header needs more data to be decided.
    fn scan<F>(
        &mut self,
        buffer: &[u8],
        base_offset: u64,
        found: &mut u64,
        emit: &mut F,
    ) -> Result<()>
    where
        F: FnMut(u64, &Match, &[u8]) -> Result<()>,
    {
        let signature = self.signature;
        let header_len = signature.header().len();
        let footer_len = signature.footer().len();

        loop {
            let start = if self.is_undecided() {
                self.cursor
            } else {
                match find(&self.headers, buffer, self.cursor..buffer.len()) {
                    Some(start) => {
                        trace!(
                            "{} header candidate at offset {}",
                            signature.tag(),
                            base_offset + start as u64
                        );
                        start
                    }
                    None => {
                        // a header may straddle the end of the buffer
                        let tail = (buffer.len() + 1).saturating_sub(header_len);
                        self.cursor = self.cursor.max(tail);
                        return Ok(());
                    }
                }
            };

            // the footer window opens at the header itself, so a footer
            // overlapping the header's tail still counts
            let window_end = buffer.len().min(start.saturating_add(signature.max_span()));
            let search_from = self.footer_from.take().unwrap_or(start);

            match find(&self.footers, buffer, search_from..window_end) {
                Some(footer_start) => {
                    let end = footer_start + footer_len;
                    let found_match = Match {
                        type_tag: signature.tag(),
                        absolute_start_offset: base_offset + start as u64,
                        absolute_end_offset: base_offset + end as u64,
                    };
                    *found += 1;
                    emit(*found, &found_match, &buffer[start..end])?;
                    self.cursor = end;
                }
                None if window_end - start >= signature.max_span() => {
                    trace!(
                        "{} header at offset {} has no footer within {} bytes, abandoning",
                        signature.tag(),
                        base_offset + start as u64,
                        signature.max_span()
                    );
                    self.cursor = start + header_len;
                }
                None => {
                    self.cursor = start;
                    let resume = window_end.saturating_sub(footer_len - 1);
                    self.footer_from = Some(resume.max(start));
                    return Ok(());
                }
            }
        }
    }
}

/// Buffer and bookkeeping owned by a single carve run
#[derive(Debug)]
pub(crate) struct ScanState<'r> {
    buffer: Vec<u8>,
    buffer_base_offset: u64,
    bytes_consumed_total: u64,
    found_count: u64,
    peak_buffer_bytes: usize,
    /// Read failure that cut the last chunk short
    read_error: Option<Error>,
    lanes: Vec<Lane<'r>>,
}

impl<'r> ScanState<'r> {
    pub(crate) fn new(signatures: Vec<&'r Signature>) -> Result<Self> {
        Ok(Self {
            buffer: Vec::new(),
            buffer_base_offset: 0,
            bytes_consumed_total: 0,
            found_count: 0,
            peak_buffer_bytes: 0,
            read_error: None,
            lanes: signatures
                .into_iter()
                .map(Lane::new)
                .collect::<Result<_>>()?,
        })
    }

    /// Appends up to `chunk_size` bytes from `reader` to the buffer.
    ///
    /// Short reads are retried until the chunk is full or the reader reports
    /// end of stream. Returns the number of bytes appended, zero at the end.
    /// A read error with nothing appended is returned directly. One that
    /// strikes after part of the chunk arrived keeps that part and is held
    /// back until [`ScanState::take_read_error`], so the part gets scanned.
    pub(crate) fn fill<R: Read>(&mut self, reader: &mut R, chunk_size: usize) -> Result<usize> {
        let start = self.buffer.len();
        // exact, so capacity tracks the peak length instead of doubling
        self.buffer.reserve_exact(chunk_size);
        self.buffer.resize(start + chunk_size, 0);

        let mut filled = 0;
        while filled < chunk_size {
            match reader.read(&mut self.buffer[start + filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    let error = Error::input_read(self.bytes_consumed_total + filled as u64, e);
                    if filled == 0 {
                        self.buffer.truncate(start);
                        return Err(error);
                    }
                    self.read_error = Some(error);
                    break;
                }
            }
        }

        self.buffer.truncate(start + filled);
        self.bytes_consumed_total += filled as u64;
        self.peak_buffer_bytes = self.peak_buffer_bytes.max(self.buffer.len());
        Ok(filled)
    }

    /// Read failure held back by the last [`ScanState::fill`]
    pub(crate) fn take_read_error(&mut self) -> Option<Error> {
        self.read_error.take()
    }
    /// Runs every lane over the current buffer.
    ///
    /// `emit` receives the artifact ordinal, the match and its bytes. An error
    /// from `emit` stops the scan and is returned as is.
    pub(crate) fn scan<F>(&mut self, mut emit: F) -> Result<()>
    where
        F: FnMut(u64, &Match, &[u8]) -> Result<()>,
    {
        for lane in &mut self.lanes {
            lane.scan(
                &self.buffer,
                self.buffer_base_offset,
                &mut self.found_count,
                &mut emit,
            )?;
        }
        Ok(())
    }

    /// Drops every byte no lane can still use
    pub(crate) fn trim(&mut self) {
        let keep_from = self
            .lanes
            .iter()
            .map(|lane| lane.cursor)
            .min()
            .unwrap_or(self.buffer.len());
        if keep_from == 0 {
            return;
        }

        self.buffer.drain(..keep_from);
        self.buffer_base_offset += keep_from as u64;
        for lane in &mut self.lanes {
            lane.cursor -= keep_from;
            if let Some(footer_from) = lane.footer_from.as_mut() {
                *footer_from -= keep_from;
            }
        }
        trace!(
            "trimmed {} bytes, buffer now holds {} bytes from offset {}",
            keep_from,
            self.buffer.len(),
            self.buffer_base_offset
        );
    }

    /// Tags of the active signatures, in scan order
    pub(crate) fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.lanes.iter().map(|lane| lane.signature.tag())
    }

    /// Number of headers still waiting for a footer
    pub(crate) fn undecided(&self) -> usize {
        self.lanes.iter().filter(|lane| lane.is_undecided()).count()
    }

    pub(crate) fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed_total
    }

    pub(crate) fn peak_buffer_bytes(&self) -> usize {
        self.peak_buffer_bytes
    }

    #[cfg(test)]
    fn buffer_base_offset(&self) -> u64 {
        self.buffer_base_offset
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Single-pattern searcher for one signature boundary
fn matcher(signature: &Signature, pattern: &[u8]) -> Result<AhoCorasick> {
    AhoCorasickBuilder::new()
        .build([pattern])
        .map_err(|e| Error::invalid_signature(signature.tag(), e.to_string()))
}

/// Leftmost match of `searcher` inside `buffer[range]`, as an index into `buffer`
fn find(searcher: &AhoCorasick, buffer: &[u8], range: Range<usize>) -> Option<usize> {
    searcher
        .find(Input::new(buffer).span(range))
        .map(|m| m.start())
}
