//! Two-byte namespace codes and composite key layout.
//!
//! Every stored key starts with a registered two-byte namespace code.
//! Height-encoded suffixes are fixed-width 20-digit zero-padded decimal so
//! lexicographic order equals numeric order across the full u64 range.

use crate::errors::StoreError;

pub const SCHEMA_VERSION: u8 = 1;

/// Separator between variable-length key segments (addresses never contain it).
const SEP: u8 = b'-';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Internal,
    BlockHash,
    BlockHeight,
    TransactionHash,
    TransactionBlock,
    TransactionSource,
    TransactionAccount,
    AccountAddress,
    OperationHash,
    OperationAccount,
}

impl Namespace {
    pub const ALL: [Namespace; 10] = [
        Namespace::Internal,
        Namespace::BlockHash,
        Namespace::BlockHeight,
        Namespace::TransactionHash,
        Namespace::TransactionBlock,
        Namespace::TransactionSource,
        Namespace::TransactionAccount,
        Namespace::AccountAddress,
        Namespace::OperationHash,
        Namespace::OperationAccount,
    ];

    pub fn code(self) -> [u8; 2] {
        match self {
            Namespace::Internal => *b"00",
            Namespace::BlockHash => *b"bh",
            Namespace::BlockHeight => *b"bn",
            Namespace::TransactionHash => *b"th",
            Namespace::TransactionBlock => *b"tb",
            Namespace::TransactionSource => *b"ts",
            Namespace::TransactionAccount => *b"ta",
            Namespace::AccountAddress => *b"aa",
            Namespace::OperationHash => *b"oh",
            Namespace::OperationAccount => *b"oa",
        }
    }

    pub fn from_code(code: [u8; 2]) -> Option<Namespace> {
        Namespace::ALL.into_iter().find(|ns| ns.code() == code)
    }

    pub fn prefix(self) -> Vec<u8> {
        self.code().to_vec()
    }

    pub fn key(self, rest: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(2 + rest.len());
        key.extend_from_slice(&self.code());
        key.extend_from_slice(rest);
        key
    }
}

/// Versioned declaration of the namespaces a backend must carry. Backends
/// validate their physical layout against this at startup instead of
/// inferring collections from key prefixes on the fly.
#[derive(Debug, Clone)]
pub struct KeySchema {
    version: u8,
    namespaces: Vec<Namespace>,
}

impl KeySchema {
    pub fn v1() -> Self {
        KeySchema { version: SCHEMA_VERSION, namespaces: Namespace::ALL.to_vec() }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn contains(&self, code: [u8; 2]) -> bool {
        self.namespaces.iter().any(|ns| ns.code() == code)
    }

    pub fn namespace_of(&self, key: &[u8]) -> Result<Namespace, StoreError> {
        if key.len() < 2 {
            return Err(StoreError::UnknownNamespace(hex::encode(key)));
        }
        let code = [key[0], key[1]];
        match Namespace::from_code(code) {
            Some(ns) if self.contains(code) => Ok(ns),
            _ => Err(StoreError::UnknownNamespace(String::from_utf8_lossy(&code).into_owned())),
        }
    }
}

pub fn encode_height(height: u64) -> Vec<u8> {
    format!("{:020}", height).into_bytes()
}

pub fn decode_height(bytes: &[u8]) -> Result<u64, StoreError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| StoreError::DecodeValueFailed(e.to_string()))?;
    text.parse::<u64>().map_err(|e| StoreError::DecodeValueFailed(e.to_string()))
}

pub fn block_hash_key(hash: &str) -> Vec<u8> {
    Namespace::BlockHash.key(hash.as_bytes())
}

pub fn block_height_key(height: u64) -> Vec<u8> {
    Namespace::BlockHeight.key(&encode_height(height))
}

pub fn transaction_hash_key(hash: &str) -> Vec<u8> {
    Namespace::TransactionHash.key(hash.as_bytes())
}

pub fn transaction_block_key(height: u64, hash: &str) -> Vec<u8> {
    let mut rest = encode_height(height);
    rest.push(SEP);
    rest.extend_from_slice(hash.as_bytes());
    Namespace::TransactionBlock.key(&rest)
}

pub fn transaction_block_prefix(height: u64) -> Vec<u8> {
    let mut rest = encode_height(height);
    rest.push(SEP);
    Namespace::TransactionBlock.key(&rest)
}

pub fn transaction_source_key(source: &str, height: u64, hash: &str) -> Vec<u8> {
    scoped_key(Namespace::TransactionSource, source, height, hash)
}

pub fn transaction_source_prefix(source: &str) -> Vec<u8> {
    scoped_prefix(Namespace::TransactionSource, source)
}

pub fn transaction_account_key(address: &str, height: u64, hash: &str) -> Vec<u8> {
    scoped_key(Namespace::TransactionAccount, address, height, hash)
}

pub fn transaction_account_prefix(address: &str) -> Vec<u8> {
    scoped_prefix(Namespace::TransactionAccount, address)
}

pub fn account_key(address: &str) -> Vec<u8> {
    Namespace::AccountAddress.key(address.as_bytes())
}

pub fn operation_hash_key(hash: &str) -> Vec<u8> {
    Namespace::OperationHash.key(hash.as_bytes())
}

pub fn operation_account_key(address: &str, height: u64, hash: &str) -> Vec<u8> {
    scoped_key(Namespace::OperationAccount, address, height, hash)
}

pub fn operation_account_prefix(address: &str) -> Vec<u8> {
    scoped_prefix(Namespace::OperationAccount, address)
}

pub fn schema_meta_key() -> Vec<u8> {
    Namespace::Internal.key(b"schema")
}

/// ns + scope + SEP + height(20) + SEP + hash; the embedded height keeps the
/// per-scope range in block order.
fn scoped_key(ns: Namespace, scope: &str, height: u64, hash: &str) -> Vec<u8> {
    let mut rest = Vec::with_capacity(scope.len() + 22 + hash.len());
    rest.extend_from_slice(scope.as_bytes());
    rest.push(SEP);
    rest.extend_from_slice(&encode_height(height));
    rest.push(SEP);
    rest.extend_from_slice(hash.as_bytes());
    ns.key(&rest)
}

fn scoped_prefix(ns: Namespace, scope: &str) -> Vec<u8> {
    let mut rest = Vec::with_capacity(scope.len() + 1);
    rest.extend_from_slice(scope.as_bytes());
    rest.push(SEP);
    ns.key(&rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_encoding_preserves_order() {
        let heights = [0u64, 1, 9, 10, 99, 1_000, 123_456_789, u64::MAX];
        let mut encoded: Vec<Vec<u8>> = heights.iter().map(|h| encode_height(*h)).collect();
        let sorted = encoded.clone();
        encoded.sort();
        assert_eq!(encoded, sorted, "lexicographic order must equal numeric order");
        for h in heights {
            assert_eq!(decode_height(&encode_height(h)).unwrap(), h);
        }
    }

    #[test]
    fn schema_v1_registers_all_namespaces() {
        let schema = KeySchema::v1();
        assert_eq!(schema.version(), SCHEMA_VERSION);
        assert_eq!(schema.namespaces().len(), 10);
        for ns in Namespace::ALL {
            assert!(schema.contains(ns.code()));
            assert_eq!(Namespace::from_code(ns.code()), Some(ns));
        }
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        let schema = KeySchema::v1();
        assert!(matches!(schema.namespace_of(b"zz-key"), Err(StoreError::UnknownNamespace(_))));
        assert!(matches!(schema.namespace_of(b"x"), Err(StoreError::UnknownNamespace(_))));
        assert_eq!(schema.namespace_of(&block_hash_key("abc")).unwrap(), Namespace::BlockHash);
    }

    #[test]
    fn scoped_prefix_does_not_match_longer_scope() {
        let a = transaction_account_key("GA", 5, "tx1");
        let b = transaction_account_key("GAB", 5, "tx1");
        let prefix = transaction_account_prefix("GA");
        assert!(a.starts_with(&prefix));
        assert!(!b.starts_with(&prefix));
    }
}
