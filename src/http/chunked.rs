//! Chunked transfer coding
//!
//! Incremental decoder for `Transfer-Encoding: chunked` bodies. The server
//! never produces chunked responses; it decodes chunked request bodies, and
//! the client decodes chunked response bodies from other servers.

use super::{Error, Result};

/// Chunked decoder
///
/// Decodes HTTP chunked transfer encoding format. Input may arrive in
/// arbitrary slices; the decoder keeps its position between calls.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: DecoderState,
    chunk_size: usize,
    chunk_read: usize,
    max_trailer_bytes: usize,
    trailer_read: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    ChunkSize,
    ChunkData,
    ChunkEnd,
    Trailer,
    Complete,
}

/// Longest chunk-size line (size plus extensions) accepted
const MAX_CHUNK_LINE: usize = 4096;

impl ChunkedDecoder {
    /// Create a decoder that accepts at most `max_trailer_bytes` of trailer
    /// fields after the last chunk
    pub fn with_trailer_limit(max_trailer_bytes: usize) -> Self {
        ChunkedDecoder {
            state: DecoderState::ChunkSize,
            chunk_size: 0,
            chunk_read: 0,
            max_trailer_bytes,
            trailer_read: 0,
        }
    }

    /// Decode as much of `input` as possible, appending payload to `output`
    ///
    /// Returns (bytes_consumed, is_complete). Bytes after the terminating
    /// empty line are left unconsumed for the next message.
    pub fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<(usize, bool)> {
        let mut input_pos = 0;

        while input_pos < input.len() {
            match self.state {
                DecoderState::ChunkSize => {
                    let Some(crlf_pos) = find_crlf(&input[input_pos..]) else {
                        if input.len() - input_pos > MAX_CHUNK_LINE {
                            return Err(Error::InvalidChunkSize("line too long".to_string()));
                        }
                        break;
                    };

                    let line = String::from_utf8_lossy(&input[input_pos..input_pos + crlf_pos]);
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    self.chunk_size = usize::from_str_radix(size_str, 16)
                        .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;

                    input_pos += crlf_pos + 2;
                    self.chunk_read = 0;

                    self.state = if self.chunk_size == 0 {
                        DecoderState::Trailer
                    } else {
                        DecoderState::ChunkData
                    };
                }

                DecoderState::ChunkData => {
                    let remaining_in_chunk = self.chunk_size - self.chunk_read;
                    let to_copy = remaining_in_chunk.min(input.len() - input_pos);

                    output.extend_from_slice(&input[input_pos..input_pos + to_copy]);
                    input_pos += to_copy;
                    self.chunk_read += to_copy;

                    if self.chunk_read == self.chunk_size {
                        self.state = DecoderState::ChunkEnd;
                    }
                }

                DecoderState::ChunkEnd => {
                    if input.len() - input_pos < 2 {
                        break;
                    }
                    if &input[input_pos..input_pos + 2] != b"\r\n" {
                        return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
                    }
                    input_pos += 2;
                    self.state = DecoderState::ChunkSize;
                }

                DecoderState::Trailer => {
                    let rest = &input[input_pos..];
                    if rest.starts_with(b"\r\n") {
                        input_pos += 2;
                        self.state = DecoderState::Complete;
                        continue;
                    }

                    // trailer fields are discarded, but count against the limit
                    let line = find_crlf(rest).map(|pos| pos + 2);
                    let pending = line.unwrap_or(rest.len());
                    if self.trailer_read + pending > self.max_trailer_bytes {
                        return Err(Error::HeaderTooLarge(self.max_trailer_bytes));
                    }
                    match line {
                        Some(len) => {
                            input_pos += len;
                            self.trailer_read += len;
                        }
                        None => break,
                    }
                }

                DecoderState::Complete => break,
            }
        }

        Ok((input_pos, self.is_complete()))
    }

    /// Check if decoding is complete
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }
}

/// Find CRLF in buffer
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Result<(Vec<u8>, usize)> {
        let mut decoder = ChunkedDecoder::with_trailer_limit(MAX_CHUNK_LINE);
        let mut output = Vec::new();
        let (consumed, complete) = decoder.decode(input, &mut output)?;
        if !complete {
            return Err(Error::Incomplete);
        }
        Ok((output, consumed))
    }

    #[test]
    fn test_decode_single_chunk() {
        let (output, consumed) = decode_all(b"5\r\nHello\r\n0\r\n\r\n").unwrap();
        assert_eq!(output, b"Hello");
        assert_eq!(consumed, 15);
    }

    #[test]
    fn test_decode_multiple_chunks() {
        let (output, _) = decode_all(b"5\r\nHello\r\n5\r\nWorld\r\n0\r\n\r\n").unwrap();
        assert_eq!(output, b"HelloWorld");
    }

    #[test]
    fn test_decode_with_extension() {
        // Chunk extensions (after semicolon) should be ignored
        let (output, _) = decode_all(b"5;extension=value\r\nHello\r\n0\r\n\r\n").unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_skips_trailers() {
        let (output, _) = decode_all(b"3\r\nabc\r\n0\r\nX-Checksum: 1\r\n\r\n").unwrap();
        assert_eq!(output, b"abc");
    }

    #[test]
    fn test_trailer_limit() {
        let mut decoder = ChunkedDecoder::with_trailer_limit(16);
        let mut output = Vec::new();
        let result = decoder.decode(b"0\r\nX-Long-Trailer: 0123456789\r\n\r\n", &mut output);
        assert!(matches!(result, Err(Error::HeaderTooLarge(16))));

        // an unterminated trailer line is refused before its CRLF arrives
        let mut decoder = ChunkedDecoder::with_trailer_limit(16);
        let unterminated = [b"0\r\nX: ".as_slice(), &[b'a'; 32]].concat();
        assert!(matches!(
            decoder.decode(&unterminated, &mut output),
            Err(Error::HeaderTooLarge(16))
        ));

        let mut decoder = ChunkedDecoder::with_trailer_limit(16);
        let (_, complete) = decoder.decode(b"0\r\nX-A: 1\r\n\r\n", &mut output).unwrap();
        assert!(complete);
    }

    #[test]
    fn test_leaves_following_bytes() {
        let input = b"2\r\nhi\r\n0\r\n\r\nGET / HTTP/1.1\r\n";
        let (output, consumed) = decode_all(input).unwrap();
        assert_eq!(output, b"hi");
        assert_eq!(&input[consumed..], b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn test_invalid_size() {
        assert!(matches!(
            decode_all(b"zz\r\nHello\r\n0\r\n\r\n"),
            Err(Error::InvalidChunkSize(_))
        ));
    }

    #[test]
    fn test_missing_crlf_after_data() {
        assert!(matches!(
            decode_all(b"2\r\nhiXX0\r\n\r\n"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_decoder_incremental() {
        let input = b"5\r\nHello\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::with_trailer_limit(MAX_CHUNK_LINE);
        let mut output = Vec::new();
        let mut pending = Vec::new();

        for piece in input.chunks(3) {
            pending.extend_from_slice(piece);
            let (consumed, _) = decoder.decode(&pending, &mut output).unwrap();
            pending.drain(..consumed);
        }

        assert_eq!(output, b"Hello");
        assert!(decoder.is_complete());
        assert!(pending.is_empty());
    }
}
