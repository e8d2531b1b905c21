use crate::algo::common::StreamCipher;

/// Box-XOR cipher over the 256-byte NCM key box.
#[derive(Clone)]
pub struct NcmCipher {
    keybox: [u8; 256],
}

impl NcmCipher {
    pub fn new(key: &[u8]) -> Self {
        Self {
            keybox: Self::build_keybox(key),
        }
    }

    /// Two-round permutation: a standard KSA pass over the RC4-like key,
    /// then a collapse with the shifted index pattern the client uses.
    pub fn build_keybox(key: &[u8]) -> [u8; 256] {
        let mut keybox = [0u8; 256];
        for (i, b) in keybox.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut j = 0u8;
        for i in 0u8..=255 {
            j = keybox[i as usize]
                .wrapping_add(j)
                .wrapping_add(key[(i as usize) % key.len()]);
            keybox.swap(i as usize, j as usize);
        }

        let mut ret = [0u8; 256];
        for i in 0u8..=255 {
            let i_ = i.wrapping_add(1);
            let si = keybox[i_ as usize];
            let sj = keybox[i_.wrapping_add(si) as usize];
            ret[i as usize] = keybox[si.wrapping_add(sj) as usize];
        }
        ret
    }
}

impl StreamCipher for NcmCipher {
    fn decrypt(&self, buf: &mut [u8], offset: usize) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b ^= self.keybox[(offset + i) & 0xff];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_invariance() {
        let cipher = NcmCipher::new(b"0123456789abcdef");
        let plain: Vec<u8> = (0u32..2048).map(|i| (i % 239) as u8).collect();
        let mut whole = plain.clone();
        cipher.decrypt(&mut whole, 0);

        let mut chunked = plain.clone();
        let mut offset = 0;
        for size in [1usize, 255, 256, 257, 100] {
            let end = (offset + size).min(chunked.len());
            cipher.decrypt(&mut chunked[offset..end], offset);
            offset = end;
        }
        cipher.decrypt(&mut chunked[offset..], offset);
        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_symmetry() {
        let cipher = NcmCipher::new(b"some ncm core key bytes");
        let plain = b"the quick brown fox".to_vec();
        let mut buf = plain.clone();
        cipher.decrypt(&mut buf, 7);
        cipher.decrypt(&mut buf, 7);
        assert_eq!(buf, plain);
    }
}
