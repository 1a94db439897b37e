use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, Txid};
use cardinal_macros::{Decode, Encode};

use crate::define_table;
use crate::storage::table::TableId;

/// Reference to a specific transaction output. `tx_hash` holds the txid in
/// its internal byte order (`to_byte_array`); the reversed-hex display form
/// is only produced at the API boundary.
#[derive(Encode, Decode, PartialEq, Hash, Eq, Clone, Copy, Debug)]
pub struct TxoRef {
    pub tx_hash: [u8; 32],
    pub txo_index: u32,
}

impl TxoRef {
    pub fn txid(&self) -> Txid {
        Txid::from_byte_array(self.tx_hash)
    }
}

impl From<bitcoin::OutPoint> for TxoRef {
    fn from(outpoint: bitcoin::OutPoint) -> Self {
        Self {
            tx_hash: outpoint.txid.to_byte_array(),
            txo_index: outpoint.vout,
        }
    }
}

#[derive(Encode, Decode, PartialEq, Eq, Clone, Debug)]
pub struct Utxo {
    /// Owner derived from the output script, if the script has a standard
    /// address form. Address-less outputs are still tracked as spendable.
    pub address: Option<String>,
    /// Amount of satoshis in the UTxO
    pub value: u64,
}

/// Envelope marker kinds, in classification precedence order.
#[derive(Encode, Decode, PartialEq, Eq, Clone, Copy, Debug)]
pub enum EnvelopeKind {
    Ordinal,
    Satribute,
    Rune,
}

/// Provenance record for an output carrying an inscription envelope. Rows
/// are written once and never deleted, independent of spend status.
#[derive(Encode, Decode, PartialEq, Eq, Clone, Debug)]
pub struct Inscription {
    pub kind: EnvelopeKind,
    /// Raw script bytes of the envelope output, kept as evidence
    pub payload: Vec<u8>,
    /// Unix millis at which the envelope was first observed
    pub observed_at: u64,
}

/// Identity of the last block folded into the ledger.
#[derive(Encode, Decode, PartialEq, Eq, Clone, Copy, Debug)]
pub struct Cursor {
    pub height: u64,
    pub hash: [u8; 32],
}

impl Cursor {
    pub fn block_hash(&self) -> BlockHash {
        BlockHash::from_byte_array(self.hash)
    }
}

/// Secondary-index key for address-scoped UTxO queries. The length-prefixed
/// address encoding makes per-address prefix scans unambiguous.
#[derive(Encode, Decode, PartialEq, Eq, Clone, Debug)]
pub struct AddressUtxoKey {
    pub address: String,
    pub txo_ref: TxoRef,
}

define_table! {
    name: UtxoByTxoRefKV,
    key_type: TxoRef,
    value_type: Utxo,
    id: TableId::UtxoByTxoRef
}

define_table! {
    name: InscriptionByTxoRefKV,
    key_type: TxoRef,
    value_type: Inscription,
    id: TableId::InscriptionByTxoRef
}

define_table! {
    name: UtxoByAddressKV,
    key_type: AddressUtxoKey,
    value_type: (), // utxo data lives in UtxoByTxoRef
    id: TableId::UtxoByAddress
}

define_table! {
    name: HeightByHashKV,
    key_type: [u8; 32],
    value_type: u64,
    id: TableId::HeightByHash
}

define_table! {
    name: CursorKV,
    key_type: (),
    value_type: Cursor,
    id: TableId::Cursor
}
