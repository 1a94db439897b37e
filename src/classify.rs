use bitcoin::opcodes::all::OP_IF;
use bitcoin::script::{Instruction, Script};
use bitcoin::{Address, Network};

use crate::storage::tables::EnvelopeKind;

/// Envelope magics. A script carrying more than one envelope kind resolves
/// by this order: ordinal, then satribute, then rune.
const ORDINAL_MAGIC: &[u8] = b"ord"; // 6f7264
const SATRIBUTE_MAGIC: &[u8] = b"sattr"; // 7361747472
const RUNE_MAGIC: &[u8] = b"rune"; // 72756e65

/// Classify an output script by scanning its decoded instruction sequence
/// for an inscription envelope: an empty push (`OP_FALSE`), `OP_IF`, then a
/// data push whose payload begins with one of the envelope magics.
///
/// Matching happens on the decoded opcode/push level, so push-encoding
/// variations of the same envelope classify identically. Total function:
/// scripts that fail to parse classify as carrying no envelope.
pub fn classify_script(script: &Script) -> Option<EnvelopeKind> {
    let mut instructions = Vec::new();

    for instruction in script.instructions() {
        match instruction {
            Ok(instruction) => instructions.push(instruction),
            Err(_) => return None,
        }
    }

    let envelopes = instructions
        .windows(3)
        .filter_map(|window| match window {
            [
                Instruction::PushBytes(empty),
                Instruction::Op(op),
                Instruction::PushBytes(payload),
            ] if empty.is_empty() && *op == OP_IF => Some(payload.as_bytes()),
            _ => None,
        })
        .collect::<Vec<_>>();

    for (magic, kind) in [
        (ORDINAL_MAGIC, EnvelopeKind::Ordinal),
        (SATRIBUTE_MAGIC, EnvelopeKind::Satribute),
        (RUNE_MAGIC, EnvelopeKind::Rune),
    ] {
        if envelopes.iter().any(|payload| payload.starts_with(magic)) {
            return Some(kind);
        }
    }

    None
}

/// Derive the standard address controlling an output script. Scripts with
/// no standard address encoding yield `None`; such outputs are still
/// tracked, just not attributable to an address-scoped query.
pub fn output_address(script: &Script, network: Network) -> Option<String> {
    Address::from_script(script, network)
        .map(|address| address.to_string())
        .ok()
}
