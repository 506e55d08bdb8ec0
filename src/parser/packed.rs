//! The packed binary token stream.
//!
//! Every token the tokenizer produces is mirrored here together with its
//! data bytes, so views keep working after the tokenizer has dropped the
//! token and the input block it came from. Data of consecutive tokens is
//! stored back to back in one buffer; only the last token can still be
//! growing. A token's data starts where the buffer ends when its first
//! byte arrives, not when the token is pushed.

use super::tokenizer::{Token, TokenType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedToken {
    pub token_type: TokenType,
    pub parent: i32,
    pub data_start: usize,
    pub data_len: usize,
    /// One past the last descendant, `-1` while the subtree is open.
    pub subtree_end: i32,
    pub data_complete: bool,
}

impl PackedToken {
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.subtree_end >= 0 && self.data_complete
    }
}

#[derive(Debug, Default)]
pub struct PackedBinaryStream {
    tokens: Vec<PackedToken>,
    data: Vec<u8>,
}

impl PackedBinaryStream {
    #[must_use]
    pub fn with_capacity(data_capacity: usize) -> Self {
        PackedBinaryStream {
            tokens: Vec::new(),
            data: Vec::with_capacity(data_capacity),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn token(&self, index: usize) -> &PackedToken {
        &self.tokens[index]
    }

    #[inline]
    #[must_use]
    pub fn data(&self, index: usize) -> &[u8] {
        let token = &self.tokens[index];
        &self.data[token.data_start..token.data_start + token.data_len]
    }

    /// Bytes of token data currently retained.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    fn push(&mut self, token_type: TokenType, parent: i32) -> usize {
        let index = self.tokens.len();
        self.tokens.push(PackedToken {
            token_type,
            parent,
            data_start: 0,
            data_len: 0,
            subtree_end: -1,
            data_complete: !token_type.has_data(),
        });
        index
    }

    /// Pins the start of a token that has no data yet to the buffer end.
    fn anchor(&mut self, index: usize) {
        if self.tokens[index].data_len == 0 {
            self.tokens[index].data_start = self.data.len();
        }
    }

    fn append_data(&mut self, index: usize, bytes: &[u8]) {
        self.anchor(index);
        debug_assert_eq!(
            self.tokens[index].data_start + self.tokens[index].data_len,
            self.data.len()
        );
        self.data.extend_from_slice(bytes);
        self.tokens[index].data_len += bytes.len();
    }

    /// Compacts the stream to the tokens flagged in `keep` and returns the
    /// old-to-new index table (`-1` for dropped tokens).
    ///
    /// Parents of kept tokens must be kept as well.
    pub(crate) fn retain(&mut self, keep: &[bool]) -> Vec<i32> {
        let n = self.tokens.len();
        let mut prefix = Vec::with_capacity(n + 1);
        let mut remap = vec![-1; n];
        let mut kept = 0i32;
        for i in 0..n {
            prefix.push(kept);
            if keep[i] {
                remap[i] = kept;
                kept += 1;
            }
        }
        prefix.push(kept);

        let mut tokens = Vec::with_capacity(kept as usize);
        let mut data = Vec::with_capacity(self.data.capacity());
        for (i, token) in self.tokens.iter().enumerate() {
            if !keep[i] {
                continue;
            }
            let mut token = *token;
            let bytes = &self.data[token.data_start..token.data_start + token.data_len];
            token.data_start = data.len();
            data.extend_from_slice(bytes);
            if token.parent >= 0 {
                token.parent = remap[token.parent as usize];
            }
            if token.subtree_end >= 0 {
                token.subtree_end = prefix[token.subtree_end as usize];
            }
            tokens.push(token);
        }
        self.tokens = tokens;
        self.data = data;
        remap
    }
}

/// Mirrors tokenizer output into a [`PackedBinaryStream`].
#[derive(Debug, Default)]
pub struct PackedBinaryWriter {
    /// Tokenizer buffer index to packed index.
    map: Vec<i32>,
}

impl PackedBinaryWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors the tokenizer state after it tokenized `block[from..to]`.
    pub fn write(
        &mut self,
        stream: &mut PackedBinaryStream,
        tokens: &[Token],
        block: &[u8],
        from: usize,
        to: usize,
    ) {
        for token in &tokens[self.map.len()..] {
            let parent = if token.parent >= 0 {
                self.map[token.parent as usize]
            } else {
                -1
            };
            let index = stream.push(token.token_type, parent);
            self.map.push(index as i32);
        }

        for (i, token) in tokens.iter().enumerate() {
            let packed = self.map[i] as usize;
            if !stream.tokens[packed].data_complete {
                stream.anchor(packed);
                let start = if token.start < 0 { 0 } else { token.start as usize }.max(from);
                let end = if token.end < 0 { to } else { (token.end as usize).min(to) };
                if start < end {
                    stream.append_data(packed, &block[start..end]);
                }
                if token.end >= 0 {
                    stream.tokens[packed].data_complete = true;
                }
            }
            if token.next >= 0 && stream.tokens[packed].subtree_end < 0 {
                let next = token.next as usize;
                stream.tokens[packed].subtree_end = match self.map.get(next) {
                    Some(&index) => index,
                    None => stream.len() as i32,
                };
            }
        }
    }

    /// Applies a tokenizer discard table.
    pub fn remap_tokens(&mut self, remap: &[i32]) {
        let mut map = vec![0; remap.iter().filter(|r| **r >= 0).count()];
        for (old, &new) in remap.iter().enumerate() {
            if new >= 0 {
                map[new as usize] = self.map[old];
            }
        }
        self.map = map;
    }

    /// Applies a packed stream compaction table.
    pub fn remap_packed(&mut self, remap: &[i32]) {
        for index in &mut self.map {
            *index = remap[*index as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenizer::Tokenizer;
    use crate::JsonValidationType;

    fn pack_in_blocks(input: &[u8], block_size: usize) -> PackedBinaryStream {
        let mut tokenizer = Tokenizer::new(16, JsonValidationType::Standard);
        let mut writer = PackedBinaryWriter::new();
        let mut stream = PackedBinaryStream::default();
        for block in input.chunks(block_size) {
            let mut from = 0;
            while from < block.len() {
                let to = tokenizer.write(block, from).unwrap();
                writer.write(&mut stream, tokenizer.tokens(), block, from, to);
                let remap = tokenizer.discard_completed();
                writer.remap_tokens(&remap);
                from = to;
            }
        }
        tokenizer.finish().unwrap();
        writer.write(&mut stream, tokenizer.tokens(), &[], 0, 0);
        stream
    }

    #[test]
    fn test_block_size_does_not_change_stream() {
        let input = br#"{"name": "a\"b", "list": [1, 22, 333, {"x": null}], "n": -4.5e3}"#;
        let whole = pack_in_blocks(input, input.len());
        for size in [1, 2, 3, 7] {
            let chunked = pack_in_blocks(input, size);
            assert_eq!(whole.len(), chunked.len());
            for i in 0..whole.len() {
                assert_eq!(whole.token(i), chunked.token(i), "block size {size}, token {i}");
                assert_eq!(whole.data(i), chunked.data(i));
            }
        }
        assert_eq!(whole.data(1), b"name");
        assert_eq!(whole.data(2), br#"a\"b"#);
        assert_eq!(whole.token(0).subtree_end, whole.len() as i32);
    }

    #[test]
    fn test_sibling_tokens_keep_their_own_data() {
        for size in [1, 4, 64] {
            let stream = pack_in_blocks(br#"["a","bb","",7,"ccc"]"#, size);
            assert_eq!(stream.len(), 6);
            assert_eq!(stream.data(1), b"a");
            assert_eq!(stream.data(2), b"bb");
            assert_eq!(stream.data(3), b"");
            assert_eq!(stream.data(4), b"7");
            assert_eq!(stream.data(5), b"ccc");
        }
    }

    #[test]
    fn test_retain_remaps_indices() {
        let mut stream = pack_in_blocks(b"[[1,2],[3]]", 4);
        // 0:[ 1:[ 2:1 3:2 4:[ 5:3
        let keep = [true, false, false, false, true, true];
        let remap = stream.retain(&keep);
        assert_eq!(remap, [0, -1, -1, -1, 1, 2]);
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.token(1).parent, 0);
        assert_eq!(stream.token(1).subtree_end, 3);
        assert_eq!(stream.token(0).subtree_end, 3);
        assert_eq!(stream.data(2), b"3");
    }
}
