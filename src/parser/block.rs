//! Block sources: fixed-size chunks of input fed to the tokenizer.

use crate::{Error, Result};
use std::io::{ErrorKind, Read};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::trace;

/// Produces input in blocks, strictly in order.
pub trait BlockSource {
    /// Replaces `block` with the next chunk of input.
    ///
    /// Returns `false` once the input is exhausted; a `true` return always
    /// leaves a non-empty block.
    fn next_block(&mut self, block: &mut Vec<u8>) -> Result<bool>;
}

/// Blocks cut from an in-memory buffer.
pub struct SliceSource<'a> {
    data: &'a [u8],
    position: usize,
    block_size: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8], block_size: usize) -> Self {
        SliceSource {
            data,
            position: 0,
            block_size: block_size.max(1),
        }
    }
}

impl BlockSource for SliceSource<'_> {
    fn next_block(&mut self, block: &mut Vec<u8>) -> Result<bool> {
        if self.position >= self.data.len() {
            return Ok(false);
        }
        let end = (self.position + self.block_size).min(self.data.len());
        block.clear();
        block.extend_from_slice(&self.data[self.position..end]);
        self.position = end;
        Ok(true)
    }
}

fn read_block<R: Read>(reader: &mut R, block: &mut Vec<u8>, block_size: usize) -> std::io::Result<usize> {
    block.resize(block_size, 0);
    let mut filled = 0;
    while filled < block_size {
        match reader.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    block.truncate(filled);
    Ok(filled)
}

/// Blocks read synchronously from any [`Read`].
pub struct ReadSource<R> {
    reader: R,
    block_size: usize,
}

impl<R: Read> ReadSource<R> {
    pub fn new(reader: R, block_size: usize) -> Self {
        ReadSource {
            reader,
            block_size: block_size.max(1),
        }
    }
}

impl<R: Read> BlockSource for ReadSource<R> {
    fn next_block(&mut self, block: &mut Vec<u8>) -> Result<bool> {
        Ok(read_block(&mut self.reader, block, self.block_size)? > 0)
    }
}

/// Blocks read ahead on a background thread.
///
/// The thread stays one block ahead of the consumer. Dropping the source
/// closes the channel, which stops the thread after its in-flight read.
pub struct PrefetchSource {
    receiver: Receiver<std::io::Result<Vec<u8>>>,
    done: bool,
}

impl PrefetchSource {
    pub fn new<R: Read + Send + 'static>(mut reader: R, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let (sender, receiver) = mpsc::sync_channel(1);
        thread::spawn(move || loop {
            let mut block = Vec::with_capacity(block_size);
            let result = read_block(&mut reader, &mut block, block_size);
            let last = !matches!(result, Ok(n) if n > 0);
            if sender.send(result.map(|_| block)).is_err() || last {
                break;
            }
        });
        PrefetchSource {
            receiver,
            done: false,
        }
    }
}

impl BlockSource for PrefetchSource {
    fn next_block(&mut self, block: &mut Vec<u8>) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        match self.receiver.recv() {
            Ok(Ok(next)) if !next.is_empty() => {
                trace!(len = next.len(), "prefetched block");
                *block = next;
                Ok(true)
            }
            Ok(Ok(_)) => {
                self.done = true;
                Ok(false)
            }
            Ok(Err(e)) => {
                self.done = true;
                Err(Error::from(e))
            }
            Err(_) => {
                self.done = true;
                Err(Error::io("prefetch thread terminated"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut dyn BlockSource) -> Vec<Vec<u8>> {
        let mut blocks = Vec::new();
        let mut block = Vec::new();
        while source.next_block(&mut block).unwrap() {
            blocks.push(block.clone());
        }
        blocks
    }

    #[test]
    fn test_slice_source_blocks() {
        let mut source = SliceSource::new(b"abcdefghij", 4);
        assert_eq!(drain(&mut source), [b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]);
    }

    #[test]
    fn test_read_and_prefetch_agree() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let mut sync = ReadSource::new(std::io::Cursor::new(data.clone()), 64);
        let mut prefetch = PrefetchSource::new(std::io::Cursor::new(data.clone()), 64);
        let a = drain(&mut sync);
        let b = drain(&mut prefetch);
        assert_eq!(a, b);
        assert_eq!(a.concat(), data);
    }
}
