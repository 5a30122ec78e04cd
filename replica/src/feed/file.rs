//! JSON block files.
//!
//! A block file is a JSON array of blocks:
//!
//! ```json
//! [
//!   {
//!     "number": 10,
//!     "transactions": [
//!       {
//!         "sender": "0xaaaa...",
//!         "payload": {"action":"transfer","amount":"30","receiver":"0xbbbb..."},
//!         "hash": "0x01"
//!       }
//!     ]
//!   }
//! ]
//! ```
//!
//! A payload given as a JSON object is carried as its serialized text; a
//! payload given as a string is carried verbatim, which allows feeding
//! malformed payloads.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::{ChainBlock, FeedError};

#[derive(Deserialize)]
struct BlockRecord {
    number: u64,
    #[serde(default)]
    transactions: Vec<TransactionRecord>,
}

#[derive(Deserialize)]
struct TransactionRecord {
    sender: String,
    payload: Value,
    #[serde(default)]
    hash: Option<String>,
}

/// Reads and parses a block file.
pub fn load_blocks(path: impl AsRef<Path>) -> Result<Vec<ChainBlock>, FeedError> {
    let text = std::fs::read_to_string(path)?;
    parse_blocks(&text)
}

pub fn parse_blocks(text: &str) -> Result<Vec<ChainBlock>, FeedError> {
    let records: Vec<BlockRecord> = serde_json::from_str(text)?;

    let mut blocks = Vec::with_capacity(records.len());
    let mut last = None;
    for record in records {
        if let Some(last) = last {
            if record.number <= last {
                return Err(FeedError::OutOfOrder {
                    last,
                    got: record.number,
                });
            }
        }
        last = Some(record.number);

        let mut block = ChainBlock::new(record.number);
        for tx in record.transactions {
            let payload = match tx.payload {
                Value::String(s) => s.into_bytes(),
                other => serde_json::to_vec(&other)?,
            };
            block = block.with_transaction(tx.sender, payload, tx.hash);
        }
        blocks.push(block);
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn object_and_string_payloads_are_accepted() {
        let text = r#"[
            {"number": 3, "transactions": [
                {"sender": "0xaa", "payload": {"action": "transfer", "amount": "5"}},
                {"sender": "0xbb", "payload": "not json", "hash": "0x02"}
            ]},
            {"number": 4}
        ]"#;

        let blocks = parse_blocks(text).unwrap();
        assert_eq!(blocks.len(), 2);

        let txs = &blocks[0].transactions;
        let first: Value = serde_json::from_slice(&txs[0].payload).unwrap();
        assert_eq!(first["amount"], "5");
        assert_eq!(txs[1].payload, b"not json");
        assert_eq!((txs[1].block_number, txs[1].sequence), (3, 1));
        assert_eq!(txs[1].hash.as_deref(), Some("0x02"));
        assert!(blocks[1].transactions.is_empty());
    }

    #[test]
    fn decreasing_block_numbers_are_rejected() {
        let text = r#"[{"number": 2}, {"number": 1}]"#;
        assert!(matches!(
            parse_blocks(text),
            Err(FeedError::OutOfOrder { last: 2, got: 1 })
        ));
    }

    #[test]
    fn load_blocks_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"[{{"number": 1, "transactions": []}}]"#).unwrap();

        let blocks = load_blocks(file.path()).unwrap();
        assert_eq!(blocks, vec![ChainBlock::new(1)]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_blocks(dir.path().join("absent.json")),
            Err(FeedError::Io(_))
        ));
    }
}
