use crate::binary::Halfword;
use crate::instructions::Instruction;

/// A fetched instruction together with the catalog entry that claims it.
pub struct Decoded<'a> {
    pub instruction: &'a dyn Instruction,
    /// One or two halfwords, as consumed by `instruction`.
    pub opcode: Vec<Halfword>,
    /// Bytes to advance the PC by when the instruction does not branch.
    pub width: u32,
}

pub trait Decoder {
    /// `second` is the halfword after `first`, when there is one.
    fn decode(&self, first: Halfword, second: Option<Halfword>) -> Option<Decoded<'_>>;
}
