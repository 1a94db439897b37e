use std::marker::PhantomData;
use std::ops::Range;

use rocksdb::{DB, DBIteratorWithThreadMode};

use crate::error::Error;

use super::encdec::{Decode, Encode, EncodeBuilder, prefix_key_range};

/// Unique u8 prefix for each persisted table, used in the key encodings. Do
/// not modify existing values, only add new variants.
#[derive(Clone, Copy)]
#[repr(u8)]
pub enum TableId {
    UtxoByTxoRef = 0,
    InscriptionByTxoRef = 1,
    UtxoByAddress = 2,
    HeightByHash = 3,
    Cursor = 4,
}

/// Defines a persisted table.
///
/// # Example
/// ```
/// define_table! {
///     name: UtxoByTxoRefKV,
///     key_type: TxoRef,
///     value_type: Utxo,
///     id: TableId::UtxoByTxoRef
/// }
/// ```
#[macro_export]
macro_rules! define_table {
    {
        name: $name:ident,
        key_type: $key_type:ty,
        value_type: $value_type:ty,
        id: $table_id:expr
    } => {
        pub struct $name;

        impl $crate::storage::table::Table for $name {
            type Key = $key_type;
            type Value = $value_type;

            const TABLE_ID: u8 = $table_id as u8;
        }
    };
}

/// A common trait for tables with a unique prefix and key-value types.
pub trait Table {
    /// Key type for the table.
    type Key: Encode + Decode;

    /// Value type for the table.
    type Value: Encode + Decode;

    /// The unique prefix for this table.
    const TABLE_ID: u8;

    /// Encodes the full key by combining the table prefix and the encoded key.
    fn encode_key(key: &Self::Key) -> Vec<u8> {
        let mut enc = EncodeBuilder::new();
        enc = enc.append(&Self::TABLE_ID);
        enc = enc.append(key);
        enc.build()
    }

    /// Range of all keys whose encoding begins with the encoded partial key.
    fn prefix_range<P: Encode>(prefix: &P) -> Range<Vec<u8>> {
        prefix_key_range(&[vec![Self::TABLE_ID], prefix.encode()].concat())
    }
}

pub struct TableIterator<'a, T> {
    inner: DBIteratorWithThreadMode<'a, DB>,
    phantom: PhantomData<T>,
}

impl<'a, T: Table> TableIterator<'a, T> {
    pub fn new(inner: DBIteratorWithThreadMode<'a, DB>) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }

    fn decode_kv(
        kv: Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>,
    ) -> Result<(T::Key, T::Value), Error> {
        let (raw_key, raw_value) = kv?;

        // strip the table prefix byte before decoding
        let key = T::Key::decode_all(&raw_key[1..])?;
        let value = T::Value::decode_all(&raw_value)?;

        Ok((key, value))
    }
}

impl<T: Table> Iterator for TableIterator<'_, T> {
    type Item = Result<(T::Key, T::Value), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Self::decode_kv)
    }
}
