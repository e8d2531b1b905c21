use crate::algo::common::StreamCipher;
use crate::error::{DecoderError, DecoderResult};
use crate::internal::pool::BoxPool;

const FIRST_SEGMENT_SIZE: usize = 128;
const SEGMENT_SIZE: usize = 5120;

/// Segmented RC4 variant for QMC files whose derived key exceeds 300 bytes.
///
/// Three zones: the first 128 bytes use a key-indexed mask, later bytes run
/// a per-segment PRGA over a fresh copy of the KSA state with a
/// hash-derived skip. The S-box copies come from the shared box pool.
#[derive(Clone)]
pub struct Rc4Cipher {
    key: Vec<u8>,
    state: Vec<u8>,
    hash: u32,
    n: usize,
}

impl Rc4Cipher {
    pub fn new(key: Vec<u8>) -> DecoderResult<Self> {
        if key.is_empty() {
            return Err(DecoderError::key_unavailable("qmc", "rc4 cipher key is empty"));
        }
        let n = key.len();
        let mut state = vec![0u8; n];
        for (i, x) in state.iter_mut().enumerate() {
            *x = (i & 0xff) as u8;
        }
        let mut j = 0usize;
        for i in 0..n {
            j = (j + state[i] as usize + key[i % n] as usize) % n;
            state.swap(i, j);
        }
        let mut cipher = Self {
            key,
            state,
            hash: 0,
            n,
        };
        cipher.hash = cipher.hash_base();
        Ok(cipher)
    }

    fn hash_base(&self) -> u32 {
        let mut hash: u32 = 1;
        for i in 0..self.n {
            let v = self.key[i] as u32;
            if v == 0 {
                continue;
            }
            let next = hash.wrapping_mul(v);
            if next == 0 || next <= hash {
                break;
            }
            hash = next;
        }
        hash
    }

    /// The float division and truncation are part of the protocol.
    fn get_segment_skip(&self, id: usize) -> usize {
        let seed = self.key[id % self.n] as f64;
        let idx = self.hash as f64 / ((id as f64 + 1.0) * seed) * 100.0;
        (idx as usize) % self.n
    }

    fn decrypt_segment_run(&self, buf: &mut [u8], start_pos: usize, seg: usize) {
        let n = self.n;
        let mut sbox = BoxPool::global().acquire(&self.state);
        let mut j = 0usize;
        let mut k = 0usize;
        let discard = self.get_segment_skip(seg) + (start_pos - seg * SEGMENT_SIZE);
        for _ in 0..discard {
            j = (j + 1) % n;
            k = (sbox[j] as usize + k) % n;
            sbox.swap(j, k);
        }
        for b in buf.iter_mut() {
            j = (j + 1) % n;
            k = (sbox[j] as usize + k) % n;
            sbox.swap(j, k);
            *b ^= sbox[(sbox[j] as usize + sbox[k] as usize) % n];
        }
    }
}

impl StreamCipher for Rc4Cipher {
    fn decrypt(&self, buf: &mut [u8], offset: usize) {
        let mut i = 0usize;
        while i < buf.len() {
            let pos = offset + i;
            if pos < FIRST_SEGMENT_SIZE {
                buf[i] ^= self.key[self.get_segment_skip(pos)];
                i += 1;
                continue;
            }
            let seg = pos / SEGMENT_SIZE;
            let seg_end_pos = (seg + 1) * SEGMENT_SIZE;
            let run_end = buf.len().min(seg_end_pos - offset);
            self.decrypt_segment_run(&mut buf[i..run_end], pos, seg);
            i = run_end;
        }
    }
}
