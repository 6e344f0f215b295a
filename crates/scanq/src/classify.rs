//! Content-type sniffing from file header bytes
//!
//! Labels come from the bytes, never from the file name:
//! known signatures first, then a text heuristic, then
//! `application/octet-stream`.

use crate::error::Result;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Header bytes read per file.
pub const DEFAULT_SNIFF_LEN: usize = 3072;

pub const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct FileClassifier {
    sniff_len: usize,
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SNIFF_LEN)
    }
}

impl FileClassifier {
    pub fn new(sniff_len: usize) -> Self {
        Self { sniff_len }
    }

    /// Label for the file at `path`, or an empty label if it cannot be read.
    pub async fn classify(&self, path: &Path) -> String {
        self.try_classify(path).await.unwrap_or_default()
    }

    /// Like [`classify`](Self::classify), but surfaces the read error.
    pub async fn try_classify(&self, path: &Path) -> Result<String> {
        let header = self.read_header(path).await?;
        Ok(self.classify_bytes(&header))
    }

    pub fn classify_bytes(&self, header: &[u8]) -> String {
        let header = &header[..header.len().min(self.sniff_len)];

        if let Some(kind) = infer::get(header) {
            return kind.mime_type().to_string();
        }
        if let Some(charset) = text_charset(header) {
            return format!("text/plain; charset={charset}");
        }
        OCTET_STREAM.to_string()
    }

    async fn read_header(&self, path: &Path) -> Result<Vec<u8>> {
        let file = tokio::fs::File::open(path).await?;
        let mut header = Vec::with_capacity(self.sniff_len);
        file.take(self.sniff_len as u64)
            .read_to_end(&mut header)
            .await?;
        Ok(header)
    }
}

/// Charset of a text-looking header, `None` for binary data.
fn text_charset(header: &[u8]) -> Option<&'static str> {
    if header.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some("utf-8");
    }
    if header.starts_with(&[0xFE, 0xFF]) {
        return Some("utf-16be");
    }
    if header.starts_with(&[0xFF, 0xFE]) {
        return Some("utf-16le");
    }

    if header.iter().any(|&b| is_binary_byte(b)) {
        return None;
    }

    match std::str::from_utf8(header) {
        Ok(_) => Some("utf-8"),
        // multi-byte sequence cut by the sniff window
        Err(e) if e.error_len().is_none() => Some("utf-8"),
        Err(_) => Some("iso-8859-1"),
    }
}

/// WHATWG mime-sniffing "binary data byte".
fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R',
    ];

    #[test]
    fn test_png_signature() {
        let classifier = FileClassifier::default();
        assert_eq!(classifier.classify_bytes(PNG_HEADER), "image/png");
    }

    #[test]
    fn test_pdf_signature() {
        let classifier = FileClassifier::default();
        assert_eq!(
            classifier.classify_bytes(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n"),
            "application/pdf"
        );
    }

    #[test]
    fn test_plain_text() {
        let classifier = FileClassifier::default();
        assert_eq!(
            classifier.classify_bytes(b"hello world\nsecond line\n"),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_latin1_text() {
        let classifier = FileClassifier::default();
        assert_eq!(
            classifier.classify_bytes(b"caf\xe9 cr\xe8me"),
            "text/plain; charset=iso-8859-1"
        );
    }

    #[test]
    fn test_utf16_bom() {
        let classifier = FileClassifier::default();
        assert_eq!(
            classifier.classify_bytes(&[0xFF, 0xFE, b'h', 0x00, b'i', 0x00]),
            "text/plain; charset=utf-16le"
        );
    }

    #[test]
    fn test_binary_falls_back_to_octet_stream() {
        let classifier = FileClassifier::default();
        assert_eq!(
            classifier.classify_bytes(&[0x00, 0x01, 0x02, 0x03, 0xFF, 0x10]),
            OCTET_STREAM
        );
    }

    #[test]
    fn test_empty_is_text() {
        let classifier = FileClassifier::default();
        assert_eq!(classifier.classify_bytes(&[]), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_utf8_cut_by_window_is_still_utf8() {
        let classifier = FileClassifier::new(4);
        // "aé€" = 61 c3 a9 e2 82 ac, cut after the first byte of '€'
        assert_eq!(
            classifier.classify_bytes("aé€".as_bytes()),
            "text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_classify_reads_only_the_header() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mixed.dat");
        let mut content = vec![b'a'; 16];
        content.extend_from_slice(&[0x00; 64]);
        std::fs::write(&path, &content).unwrap();

        let classifier = FileClassifier::new(16);
        assert_eq!(
            classifier.classify(&path).await,
            "text/plain; charset=utf-8"
        );
        let classifier = FileClassifier::new(64);
        assert_eq!(classifier.classify(&path).await, OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_classify_ignores_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("picture.txt");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let classifier = FileClassifier::default();
        assert_eq!(classifier.classify(&path).await, "image/png");
    }

    #[tokio::test]
    async fn test_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        let classifier = FileClassifier::default();
        assert_eq!(classifier.classify(&path).await, "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn test_unreadable_file_gives_empty_label() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.bin");

        let classifier = FileClassifier::default();
        assert_eq!(classifier.classify(&path).await, "");
        assert!(classifier.try_classify(&path).await.is_err());
    }
}
