use anyhow::Context;
use std::io::{BufRead, Cursor, Read};

/// 持有一次文件读取得到的全部字节
///
/// IO 完成后 manager 把读缓冲的所有权交给它，再传给解析回调。
pub struct ByteReader {
    cursor: Cursor<Vec<u8>>,
}

impl ByteReader {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    /// 缓冲区总长度（与读取位置无关）
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 完整的缓冲区
    pub fn as_bytes(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    /// 尚未读取的部分
    pub fn remaining(&self) -> &[u8] {
        let pos = (self.cursor.position() as usize).min(self.len());
        &self.cursor.get_ref()[pos..]
    }

    /// 按 UTF-8 解释完整缓冲区
    pub fn as_str(&self) -> anyhow::Result<&str> {
        std::str::from_utf8(self.as_bytes()).context("payload is not valid UTF-8")
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl Read for ByteReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl BufRead for ByteReader {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_advances_remaining_only() {
        let mut reader = ByteReader::new(b"hello world".to_vec());
        let mut head = [0u8; 5];
        reader.read_exact(&mut head).unwrap();

        assert_eq!(&head, b"hello");
        assert_eq!(reader.remaining(), b" world");
        assert_eq!(reader.as_bytes(), b"hello world");
        assert_eq!(reader.len(), 11);
    }

    #[test]
    fn test_lines() {
        let reader = ByteReader::new(b"a\nb\n".to_vec());
        let lines: Vec<String> = reader.lines().map(Result::unwrap).collect();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_utf8() {
        let reader = ByteReader::new(vec![0xff, 0xfe]);
        assert!(reader.as_str().is_err());
    }
}
