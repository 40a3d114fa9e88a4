//! Seekable upload buffer
//!
//! Callers hand the router a plain async stream. The write path needs to read
//! it up to three times (content hash, local mirror, provider), so the stream
//! is first drained into memory and every pass starts from a rewound cursor.

use md5::{Digest, Md5};
use std::io::{Cursor, SeekFrom};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

const HASH_CHUNK_SIZE: usize = 8192;

pub struct UploadBuffer {
    cursor: Cursor<Vec<u8>>,
}

impl UploadBuffer {
    /// Drain `reader` into memory.
    pub async fn from_reader<R>(mut reader: R) -> std::io::Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        Ok(Self {
            cursor: Cursor::new(data),
        })
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position the next pass at the first byte.
    pub async fn rewind(&mut self) -> std::io::Result<()> {
        self.cursor.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// Lowercase hex MD5 of the whole upload. Leaves the buffer rewound.
    pub async fn md5_hex(&mut self) -> std::io::Result<String> {
        self.rewind().await?;
        let mut hasher = Md5::new();
        let mut chunk = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let read = self.cursor.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            hasher.update(&chunk[..read]);
        }
        self.rewind().await?;
        Ok(hex::encode(hasher.finalize()))
    }

    /// Reader for one pass over the upload, starting at the current position.
    pub fn reader(&mut self) -> &mut Cursor<Vec<u8>> {
        &mut self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_md5_matches_known_digest() {
        let mut buffer = UploadBuffer::from_reader(&b"a"[..]).await.unwrap();
        assert_eq!(buffer.md5_hex().await.unwrap(), "0cc175b9c0f1b6a831c399e269772661");

        let mut empty = UploadBuffer::from_reader(&b""[..]).await.unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.md5_hex().await.unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn test_multiple_passes_see_all_bytes() {
        let data = vec![7u8; HASH_CHUNK_SIZE * 3 + 5];
        let mut buffer = UploadBuffer::from_reader(&data[..]).await.unwrap();
        buffer.md5_hex().await.unwrap();

        for _ in 0..2 {
            let mut pass = Vec::new();
            buffer.reader().read_to_end(&mut pass).await.unwrap();
            assert_eq!(pass, data);
            buffer.rewind().await.unwrap();
        }
        assert_eq!(buffer.len(), data.len());
    }
}
