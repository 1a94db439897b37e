use std::collections::{HashMap, HashSet};

use bitcoin::hashes::Hash;
use bitcoin::{Block, Network};

use crate::classify::{classify_script, output_address};
use crate::error::Error;
use crate::storage::tables::{Inscription, TxoRef, Utxo};

/// Pure, in-memory description of the ledger effects of one block, prior to
/// atomic commit. Entry order carries no meaning; the sets are disjoint.
#[derive(Debug, Clone, Default)]
pub struct BlockTransition {
    pub created: Vec<(TxoRef, Utxo)>,
    pub spent: Vec<TxoRef>,
    pub inscriptions: Vec<(TxoRef, Inscription)>,
}

/// Convert a decoded block into its ledger transition. Every output becomes
/// a UTxO insert; envelope-bearing outputs additionally become inscription
/// inserts; every non-coinbase input becomes a removal. Outputs produced and
/// consumed within the same block are netted out of the UTxO sets entirely
/// (their inscription entries remain). No I/O; `observed_at` is supplied by
/// the caller.
pub fn build_transition(
    block: &Block,
    network: Network,
    observed_at: u64,
) -> Result<BlockTransition, Error> {
    let malformed = |reason: &str| Error::MalformedBlock {
        hash: block.block_hash().to_string(),
        reason: reason.to_string(),
    };

    let mut created: HashMap<TxoRef, Utxo> = HashMap::new();
    let mut created_order: Vec<TxoRef> = Vec::new();
    let mut created_seen: HashSet<TxoRef> = HashSet::new();
    let mut spent: Vec<TxoRef> = Vec::new();
    let mut spent_seen: HashSet<TxoRef> = HashSet::new();
    let mut inscriptions: Vec<(TxoRef, Inscription)> = Vec::new();

    for tx in &block.txdata {
        let txid = tx.compute_txid();

        for (output_index, output) in tx.output.iter().enumerate() {
            let txo_ref = TxoRef {
                tx_hash: txid.to_byte_array(),
                txo_index: output_index as u32,
            };

            if !created_seen.insert(txo_ref) {
                return Err(malformed("duplicate output key"));
            }

            created.insert(
                txo_ref,
                Utxo {
                    address: output_address(&output.script_pubkey, network),
                    value: output.value.to_sat(),
                },
            );
            created_order.push(txo_ref);

            if let Some(kind) = classify_script(&output.script_pubkey) {
                inscriptions.push((
                    txo_ref,
                    Inscription {
                        kind,
                        payload: output.script_pubkey.to_bytes(),
                        observed_at,
                    },
                ));
            }
        }

        // coinbase inputs consume nothing
        if tx.is_coinbase() {
            continue;
        }

        for input in &tx.input {
            let txo_ref = TxoRef::from(input.previous_output);

            if !spent_seen.insert(txo_ref) {
                return Err(malformed("output consumed twice"));
            }

            // outputs chained within the block never reach storage
            if created.remove(&txo_ref).is_some() {
                continue;
            }

            spent.push(txo_ref);
        }
    }

    let created = created_order
        .into_iter()
        .filter_map(|txo_ref| created.remove(&txo_ref).map(|utxo| (txo_ref, utxo)))
        .collect();

    Ok(BlockTransition {
        created,
        spent,
        inscriptions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tables::EnvelopeKind;
    use crate::testutil::*;
    use bitcoin::script::ScriptBuf;
    use bitcoin::transaction::TxOut;
    use bitcoin::{Amount, BlockHash};

    #[test]
    fn outputs_become_utxos_inputs_become_removals() {
        let spend = tx(
            vec![external(9, 0)],
            vec![p2pkh_output(1, 5_000), envelope_output(b"rune", 546)],
        );
        let block = test_block(
            BlockHash::all_zeros(),
            vec![coinbase(vec![p2pkh_output(0, 50_000)]), spend.clone()],
        );

        let transition = build_transition(&block, Network::Bitcoin, 1).unwrap();

        // coinbase output + both spend outputs, envelope included
        assert_eq!(transition.created.len(), 3);
        assert_eq!(transition.spent, vec![TxoRef::from(external(9, 0))]);

        assert_eq!(transition.inscriptions.len(), 1);
        let (inscribed, inscription) = &transition.inscriptions[0];
        assert_eq!(*inscribed, TxoRef::from(outpoint(&spend, 1)));
        assert_eq!(inscription.kind, EnvelopeKind::Rune);
        assert_eq!(inscription.observed_at, 1);
    }

    #[test]
    fn coinbase_input_consumes_nothing() {
        let block = test_block(
            BlockHash::all_zeros(),
            vec![coinbase(vec![p2pkh_output(0, 50_000)])],
        );

        let transition = build_transition(&block, Network::Bitcoin, 1).unwrap();

        assert!(transition.spent.is_empty());
        assert_eq!(transition.created.len(), 1);
    }

    #[test]
    fn chained_outputs_are_netted_out() {
        let first = tx(vec![external(9, 0)], vec![envelope_output(b"rune", 546)]);
        let second = tx(vec![outpoint(&first, 0)], vec![p2pkh_output(1, 400)]);
        let block = test_block(BlockHash::all_zeros(), vec![first.clone(), second.clone()]);

        let transition = build_transition(&block, Network::Bitcoin, 1).unwrap();

        // only the surviving output is created, only the external input spent
        let created_keys: Vec<_> = transition.created.iter().map(|(k, _)| *k).collect();
        assert_eq!(created_keys, vec![TxoRef::from(outpoint(&second, 0))]);
        assert_eq!(transition.spent, vec![TxoRef::from(external(9, 0))]);

        // the chained output's inscription provenance is kept
        assert_eq!(transition.inscriptions.len(), 1);
        assert_eq!(
            transition.inscriptions[0].0,
            TxoRef::from(outpoint(&first, 0))
        );
    }

    #[test]
    fn duplicate_output_keys_are_rejected() {
        let repeated = tx(vec![external(9, 0)], vec![p2pkh_output(1, 5_000)]);
        let block = test_block(BlockHash::all_zeros(), vec![repeated.clone(), repeated]);

        let err = build_transition(&block, Network::Bitcoin, 1).unwrap_err();
        assert!(matches!(err, Error::MalformedBlock { .. }));
    }

    #[test]
    fn double_spends_are_rejected() {
        let first = tx(vec![external(9, 0)], vec![p2pkh_output(1, 5_000)]);
        let second = tx(vec![external(9, 0)], vec![p2pkh_output(2, 5_000)]);
        let block = test_block(BlockHash::all_zeros(), vec![first, second]);

        let err = build_transition(&block, Network::Bitcoin, 1).unwrap_err();
        assert!(matches!(err, Error::MalformedBlock { .. }));
    }

    #[test]
    fn addresses_derive_per_output_script() {
        let mixed = tx(
            vec![external(9, 0)],
            vec![
                p2pkh_output(1, 5_000),
                TxOut {
                    value: Amount::from_sat(0),
                    script_pubkey: ScriptBuf::new_op_return(b"data"),
                },
            ],
        );
        let block = test_block(BlockHash::all_zeros(), vec![mixed]);

        let transition = build_transition(&block, Network::Bitcoin, 1).unwrap();

        assert!(transition.created[0].1.address.is_some());
        assert!(transition.created[1].1.address.is_none());
    }
}
