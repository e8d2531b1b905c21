use crate::algo::common::StreamCipher;

/// Single-byte XOR mask, applied from `encrypt_start_at` onward.
#[derive(Clone, Copy)]
pub struct XmCipher {
    mask: u8,
    encrypt_start_at: usize,
}

impl XmCipher {
    pub fn new(mask: u8, encrypt_start_at: usize) -> Self {
        Self {
            mask,
            encrypt_start_at,
        }
    }
}

impl StreamCipher for XmCipher {
    fn decrypt(&self, buf: &mut [u8], offset: usize) {
        for (i, b) in buf.iter_mut().enumerate() {
            if offset + i >= self.encrypt_start_at {
                *b ^= self.mask;
            }
        }
    }
}
