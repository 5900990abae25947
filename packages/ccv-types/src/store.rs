//! Helpers over the host key-value store.

use cosmwasm_std::{Order, Record, Storage};
use prost::Message;

use crate::CcvError;

/// Returns the smallest key strictly greater than every key starting with `prefix`,
/// or `None` when no such key exists (the prefix is all `0xff`).
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Iterates every record whose key starts with `prefix`, in ascending key order.
/// Keys are returned in full, prefix included.
pub fn range_prefix<'a>(
    storage: &'a dyn Storage,
    prefix: &[u8],
) -> Box<dyn Iterator<Item = Record> + 'a> {
    let end = prefix_end(prefix);
    storage.range(Some(prefix), end.as_deref(), Order::Ascending)
}

/// Collects every record under `prefix` so the caller can mutate the store
/// while walking the result.
#[must_use]
pub fn collect_prefix(storage: &dyn Storage, prefix: &[u8]) -> Vec<Record> {
    range_prefix(storage, prefix).collect()
}

/// Reads a UTF-8 string value.
/// # Errors
/// Returns an error if the stored bytes are not valid UTF-8
pub fn get_string(storage: &dyn Storage, key: &[u8]) -> Result<Option<String>, CcvError> {
    storage
        .get(key)
        .map(|bz| String::from_utf8(bz).map_err(|e| CcvError::CorruptStore(e.to_string())))
        .transpose()
}

/// Writes a UTF-8 string value.
pub fn set_string(storage: &mut dyn Storage, key: &[u8], value: &str) {
    storage.set(key, value.as_bytes());
}

/// Reads a big-endian `u64` value.
/// # Errors
/// Returns an error if the stored value is not eight bytes long
pub fn get_u64(storage: &dyn Storage, key: &[u8]) -> Result<Option<u64>, CcvError> {
    storage
        .get(key)
        .map(|bz| crate::keys::decode_u64(&bz))
        .transpose()
}

/// Writes a big-endian `u64` value.
pub fn set_u64(storage: &mut dyn Storage, key: &[u8], value: u64) {
    storage.set(key, &value.to_be_bytes());
}

/// Reads a protobuf message.
/// # Errors
/// Returns an error if the stored bytes do not decode as `T`
pub fn get_proto<T: Message + Default>(
    storage: &dyn Storage,
    key: &[u8],
) -> Result<Option<T>, CcvError> {
    storage
        .get(key)
        .map(|bz| T::decode(bz.as_slice()).map_err(CcvError::from))
        .transpose()
}

/// Writes a protobuf message.
pub fn set_proto<T: Message>(storage: &mut dyn Storage, key: &[u8], value: &T) {
    storage.set(key, &value.encode_to_vec());
}

#[cfg(test)]
mod tests {
    use cosmwasm_std::testing::MockStorage;

    use super::*;

    #[test]
    fn prefix_end_carries_over_max_bytes() {
        assert_eq!(prefix_end(b"abc"), Some(b"abd".to_vec()));
        assert_eq!(prefix_end(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
    }

    #[test]
    fn range_prefix_stays_within_prefix() {
        let mut storage = MockStorage::new();
        storage.set(b"chaintochannel/a", b"1");
        storage.set(b"chaintochannel/b", b"2");
        storage.set(b"chaintochanneX", b"outside");
        storage.set(b"chaintoclient/a", b"outside");

        let keys: Vec<Vec<u8>> = range_prefix(&storage, b"chaintochannel/")
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![b"chaintochannel/a".to_vec(), b"chaintochannel/b".to_vec()]
        );
    }

    #[test]
    fn string_and_u64_values() {
        let mut storage = MockStorage::new();
        set_string(&mut storage, b"parentchain", "parent-1");
        set_u64(&mut storage, b"seq", 7);

        assert_eq!(
            get_string(&storage, b"parentchain").unwrap(),
            Some("parent-1".to_string())
        );
        assert_eq!(get_u64(&storage, b"seq").unwrap(), Some(7));
        assert_eq!(get_string(&storage, b"missing").unwrap(), None);

        storage.set(b"seq", &[1, 2, 3]);
        assert!(get_u64(&storage, b"seq").is_err());
    }
}
