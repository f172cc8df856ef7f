//! Stored document bodies of a segment
//!
//! Record format, one record per doc id in order:
//! - u32 length (little endian)
//! - u32 crc32 of payload
//! - payload: the stored fields as an interchange JSON object

use crc32fast::Hasher;

use super::types::DocId;
use crate::document::Document;
use crate::error::ShowdexError;
use crate::schema::Schema;
use crate::Result;

const RECORD_HEADER: usize = 8;

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Appends stored documents into the store file bytes
#[derive(Default)]
pub struct DocStoreWriter {
    data: Vec<u8>,
    num_docs: u32,
}

impl DocStoreWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, stored: &Document) -> Result<()> {
        let payload = serde_json::to_vec(&stored.to_dict())?;
        self.data
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.data.extend_from_slice(&checksum(&payload).to_le_bytes());
        self.data.extend_from_slice(&payload);
        self.num_docs += 1;
        Ok(())
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Random access over the store file bytes
pub struct DocStoreReader {
    data: Vec<u8>,
    /// Payload start offset and length per doc id
    records: Vec<(usize, usize)>,
}

impl DocStoreReader {
    /// Index the record boundaries; checksums are verified on read
    pub fn open(data: Vec<u8>) -> Result<Self> {
        let mut records = Vec::new();
        let mut pos = 0usize;
        while pos < data.len() {
            if pos + RECORD_HEADER > data.len() {
                return Err(ShowdexError::Corrupt(
                    "truncated doc store record header".to_string(),
                ));
            }
            let mut len_buf = [0u8; 4];
            len_buf.copy_from_slice(&data[pos..pos + 4]);
            let len = u32::from_le_bytes(len_buf) as usize;
            let start = pos + RECORD_HEADER;
            if start + len > data.len() {
                return Err(ShowdexError::Corrupt(
                    "truncated doc store record".to_string(),
                ));
            }
            records.push((start, len));
            pos = start + len;
        }
        Ok(Self { data, records })
    }

    pub fn num_docs(&self) -> u32 {
        self.records.len() as u32
    }

    /// Read the stored fields of a document, validating the checksum
    pub fn get(&self, doc: DocId, schema: &Schema) -> Result<Document> {
        let &(start, len) = self.records.get(doc as usize).ok_or_else(|| {
            ShowdexError::Internal(format!("doc {} is out of the store range", doc))
        })?;
        let mut crc_buf = [0u8; 4];
        crc_buf.copy_from_slice(&self.data[start - 4..start]);
        let payload = &self.data[start..start + len];
        if checksum(payload) != u32::from_le_bytes(crc_buf) {
            return Err(ShowdexError::Corrupt(format!(
                "doc store checksum mismatch for doc {}",
                doc
            )));
        }
        let json: serde_json::Value = serde_json::from_slice(payload)?;
        Document::from_dict(&json, schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TextOptions;

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder
            .add_text_field("title", TextOptions::text().with_stored())
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_write_and_read() {
        let schema = schema();
        let mut writer = DocStoreWriter::new();
        for title in ["red apple", "green apple"] {
            let mut doc = Document::new();
            doc.add_text("title", title);
            writer.append(&doc).unwrap();
        }
        writer.append(&Document::new()).unwrap();
        assert_eq!(writer.num_docs(), 3);

        let reader = DocStoreReader::open(writer.into_data()).unwrap();
        assert_eq!(reader.num_docs(), 3);
        let doc = reader.get(1, &schema).unwrap();
        assert_eq!(doc.get_first("title").and_then(|v| v.as_str()), Some("green apple"));
        assert!(reader.get(2, &schema).unwrap().is_empty());
        assert!(reader.get(3, &schema).is_err());
    }

    #[test]
    fn test_corruption_detected() {
        let schema = schema();
        let mut writer = DocStoreWriter::new();
        let mut doc = Document::new();
        doc.add_text("title", "apple");
        writer.append(&doc).unwrap();

        let mut data = writer.into_data();
        let last = data.len() - 2;
        data[last] ^= 0xFF;
        let reader = DocStoreReader::open(data.clone()).unwrap();
        assert!(matches!(reader.get(0, &schema), Err(ShowdexError::Corrupt(_))));

        data.truncate(data.len() - 1);
        assert!(DocStoreReader::open(data).is_err());
    }
}
