use crypto::buffer::{BufferResult, ReadBuffer, RefReadBuffer, RefWriteBuffer, WriteBuffer};

pub fn pkcs7_unpadding(data: &[u8]) -> &[u8] {
    if data.is_empty() {
        return data;
    }
    let unpadding = data[data.len() - 1] as usize;
    if unpadding > data.len() {
        return data;
    }
    &data[..data.len() - unpadding]
}

pub fn decrypt_aes128_ecb(data: &[u8], key: &[u8; 16]) -> Result<Vec<u8>, String> {
    let mut de = crypto::aes::ecb_decryptor(
        crypto::aes::KeySize::KeySize128,
        key,
        crypto::blockmodes::NoPadding,
    );
    let mut final_result = Vec::<u8>::new();
    let mut read_buffer = RefReadBuffer::new(data);
    let mut buffer = [0u8; 4096];
    let mut write_buffer = RefWriteBuffer::new(&mut buffer);
    loop {
        let result = de
            .decrypt(&mut read_buffer, &mut write_buffer, true)
            .map_err(|e| format!("aes128-ecb decrypt failed: {:?}", e))?;
        final_result.extend(
            write_buffer
                .take_read_buffer()
                .take_remaining()
                .iter()
                .copied(),
        );
        match result {
            BufferResult::BufferUnderflow => break,
            BufferResult::BufferOverflow => {}
        }
    }
    Ok(final_result)
}

pub fn md5_digest(b: &[u8]) -> [u8; 16] {
    use crypto::digest::Digest;
    let mut md5 = crypto::md5::Md5::new();
    let mut digest = [0u8; 16];
    md5.input(b);
    md5.result(&mut digest);
    digest
}
