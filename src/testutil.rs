//! Block and transaction builders shared by the in-module tests.

use bitcoin::absolute::LockTime;
use bitcoin::block::{Header, Version};
use bitcoin::hashes::Hash;
use bitcoin::opcodes::OP_FALSE;
use bitcoin::opcodes::all::{OP_ENDIF, OP_IF};
use bitcoin::script::{Builder, ScriptBuf};
use bitcoin::transaction::{self, OutPoint, Sequence, Transaction, TxIn, TxOut};
use bitcoin::{Amount, Block, BlockHash, CompactTarget, PubkeyHash, TxMerkleNode, Txid, Witness};

pub fn test_block(prev: BlockHash, txdata: Vec<Transaction>) -> Block {
    let mut block = Block {
        header: Header {
            version: Version::TWO,
            prev_blockhash: prev,
            merkle_root: TxMerkleNode::all_zeros(),
            time: 0,
            bits: CompactTarget::from_consensus(0x1d00ffff),
            nonce: 0,
        },
        txdata,
    };

    // the header must commit to the transactions so sibling blocks on the
    // same parent get distinct hashes
    if let Some(root) = block.compute_merkle_root() {
        block.header.merkle_root = root;
    }

    block
}

pub fn tx(inputs: Vec<OutPoint>, outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: transaction::Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs
            .into_iter()
            .map(|previous_output| TxIn {
                previous_output,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: outputs,
    }
}

pub fn coinbase(outputs: Vec<TxOut>) -> Transaction {
    tx(vec![OutPoint::null()], outputs)
}

pub fn p2pkh_script(owner_byte: u8) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array([owner_byte; 20]))
}

pub fn p2pkh_output(owner_byte: u8, value: u64) -> TxOut {
    TxOut {
        value: Amount::from_sat(value),
        script_pubkey: p2pkh_script(owner_byte),
    }
}

pub fn envelope_output(magic: &[u8; 4], value: u64) -> TxOut {
    TxOut {
        value: Amount::from_sat(value),
        script_pubkey: Builder::new()
            .push_opcode(OP_FALSE)
            .push_opcode(OP_IF)
            .push_slice(magic)
            .push_opcode(OP_ENDIF)
            .into_script(),
    }
}

pub fn external(byte: u8, vout: u32) -> OutPoint {
    OutPoint {
        txid: Txid::from_byte_array([byte; 32]),
        vout,
    }
}

pub fn outpoint(tx: &Transaction, vout: u32) -> OutPoint {
    OutPoint {
        txid: tx.compute_txid(),
        vout,
    }
}
