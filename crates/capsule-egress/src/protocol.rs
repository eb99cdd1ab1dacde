//! Framed egress protocol: splits a recording file into bounded chunks that
//! fit the negotiated link MTU, each carrying a small header so the peer can
//! detect gaps and know when the transfer is done.

/// Hard ceiling on chunk payload size, independent of MTU.
pub const MAX_CHUNK: usize = 200;
/// Per-chunk header: 2-byte sequence, 2-byte length, 1-byte EOF flag.
pub const CHUNK_HEADER_LEN: usize = 5;
/// ATT operation overhead subtracted from the negotiated MTU.
const ATT_OVERHEAD: usize = 3;

/// A single chunk of a framed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub seq: u16,
    pub eof: bool,
    pub payload: Vec<u8>,
}

impl Chunk {
    /// Serializes the chunk to its wire form: header followed by payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHUNK_HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.seq.to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        out.push(u8::from(self.eof));
        out.extend_from_slice(&self.payload);
        out
    }
}

/// How many payload bytes fit in one chunk at the given peer MTU: bounded
/// above by `MAX_CHUNK` minus the chunk header, below by 1 byte.
pub fn payload_budget(peer_mtu: u16) -> usize {
    let mtu_budget = (peer_mtu as usize).saturating_sub(ATT_OVERHEAD + CHUNK_HEADER_LEN);
    let ceiling = MAX_CHUNK - CHUNK_HEADER_LEN;
    mtu_budget.min(ceiling).max(1)
}

/// Splits `data` into a sequence of chunks, each carrying up to
/// `payload_budget(peer_mtu)` bytes, with the last chunk's `eof` flag set.
/// An empty `data` yields a single zero-length EOF chunk, matching the
/// literal "empty file" transfer case.
pub fn build_chunks(data: &[u8], peer_mtu: u16) -> Vec<Chunk> {
    let budget = payload_budget(peer_mtu);
    if data.is_empty() {
        return vec![Chunk {
            seq: 0,
            eof: true,
            payload: Vec::new(),
        }];
    }

    let mut chunks = Vec::with_capacity(data.len().div_ceil(budget));
    let mut seq: u16 = 0;
    for window in data.chunks(budget) {
        chunks.push(Chunk {
            seq,
            eof: false,
            payload: window.to_vec(),
        });
        seq = seq.wrapping_add(1);
    }
    if let Some(last) = chunks.last_mut() {
        last.eof = true;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_budget_is_bounded_by_mtu_and_ceiling() {
        assert_eq!(payload_budget(23), 15);
        assert_eq!(payload_budget(185), 177);
        assert_eq!(payload_budget(10_000), MAX_CHUNK - CHUNK_HEADER_LEN);
        assert_eq!(payload_budget(0), 1);
    }

    #[test]
    fn build_chunks_splits_and_marks_last_chunk_eof() {
        let data = vec![7u8; 50];
        let chunks = build_chunks(&data, 23);
        assert!(chunks.len() > 1);
        assert!(chunks[..chunks.len() - 1].iter().all(|c| !c.eof));
        assert!(chunks.last().unwrap().eof);
        let total: usize = chunks.iter().map(|c| c.payload.len()).sum();
        assert_eq!(total, data.len());
    }

    #[test]
    fn empty_file_yields_one_eof_chunk() {
        let chunks = build_chunks(&[], 23);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].eof);
        assert!(chunks[0].payload.is_empty());
    }

    #[test]
    fn encode_round_trips_header_fields() {
        let chunk = Chunk {
            seq: 9,
            eof: true,
            payload: vec![1, 2, 3],
        };
        let bytes = chunk.encode();
        assert_eq!(&bytes[0..2], &9u16.to_le_bytes());
        assert_eq!(&bytes[2..4], &3u16.to_le_bytes());
        assert_eq!(bytes[4], 1);
        assert_eq!(&bytes[5..], &[1, 2, 3]);
    }
}
