use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::binary::{Byte, Halfword, Word};
use crate::cpu::CpuConfig;

/// Memory access contract used by instruction executors. Accesses are
/// little-endian. Reads take `&mut self` so memory-mapped devices may react to
/// them.
pub trait Bus {
    fn read_byte(&mut self, addr: Word) -> Result<Byte>;
    fn read_halfword(&mut self, addr: Word) -> Result<Halfword>;
    fn read_word(&mut self, addr: Word) -> Result<Word>;
    fn write_byte(&mut self, addr: Word, val: Byte) -> Result<()>;
    fn write_halfword(&mut self, addr: Word, val: Halfword) -> Result<()>;
    fn write_word(&mut self, addr: Word, val: Word) -> Result<()>;
    fn clear(&mut self);

    fn write_bytes(&mut self, addr: Word, bytes: &[u8]) -> Result<()> {
        for (i, b) in bytes.iter().enumerate() {
            self.write_byte(addr.wrapping_add(i as u32), Byte::new(*b))?;
        }
        Ok(())
    }

    /// Programs `bytes` at `addr`, ignoring write protection.
    fn load(&mut self, addr: Word, bytes: &[u8]) -> Result<()> {
        self.write_bytes(addr, bytes)
    }
}

/// One contiguous region of memory starting at `base`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
    pub base: u32,
    /// Writes through the bus are dropped silently; `load` still works.
    pub read_only: bool,
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self {
            mem: vec![0; size],
            base: 0,
            read_only: false,
        }
    }

    pub fn at(base: u32, size: usize) -> Self {
        Self {
            mem: vec![0; size],
            base,
            read_only: false,
        }
    }

    pub fn contains(&self, addr: u32, len: usize) -> bool {
        let Some(off) = addr.checked_sub(self.base) else {
            return false;
        };
        (off as usize)
            .checked_add(len)
            .is_some_and(|end| end <= self.mem.len())
    }

    fn offset(&self, addr: Word, len: usize) -> Result<usize> {
        if !self.contains(addr.value(), len) {
            bail!("no device responsible for address {addr}");
        }
        Ok((addr.value() - self.base) as usize)
    }

    fn slice(&self, addr: Word, len: usize) -> Result<&[u8]> {
        let off = self.offset(addr, len)?;
        Ok(&self.mem[off..off + len])
    }

    fn store(&mut self, addr: Word, bytes: &[u8]) -> Result<()> {
        let off = self.offset(addr, bytes.len())?;
        if !self.read_only {
            self.mem[off..off + bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }
}

impl Bus for LinearMemory {
    fn read_byte(&mut self, addr: Word) -> Result<Byte> {
        Ok(Byte::new(self.slice(addr, 1)?[0]))
    }
    fn read_halfword(&mut self, addr: Word) -> Result<Halfword> {
        Ok(Halfword::from_le_bytes(self.slice(addr, 2)?)?)
    }
    fn read_word(&mut self, addr: Word) -> Result<Word> {
        Ok(Word::from_le_bytes(self.slice(addr, 4)?)?)
    }
    fn write_byte(&mut self, addr: Word, val: Byte) -> Result<()> {
        self.store(addr, &val.to_le_bytes())
    }
    fn write_halfword(&mut self, addr: Word, val: Halfword) -> Result<()> {
        self.store(addr, &val.to_le_bytes())
    }
    fn write_word(&mut self, addr: Word, val: Word) -> Result<()> {
        self.store(addr, &val.to_le_bytes())
    }
    fn write_bytes(&mut self, addr: Word, bytes: &[u8]) -> Result<()> {
        self.store(addr, bytes)
    }
    fn clear(&mut self) {
        self.mem.fill(0);
    }
    fn load(&mut self, addr: Word, bytes: &[u8]) -> Result<()> {
        let off = self.offset(addr, bytes.len())?;
        self.mem[off..off + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// Flash and RAM regions of the board, routed by address.
#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryMap {
    pub regions: Vec<LinearMemory>,
}

impl MemoryMap {
    pub fn new(cfg: &CpuConfig) -> Self {
        let mut flash = LinearMemory::at(cfg.flash_origin, cfg.flash_size);
        flash.read_only = true;
        let ram = LinearMemory::at(cfg.ram_origin, cfg.ram_size);
        Self {
            regions: vec![flash, ram],
        }
    }

    fn region(&mut self, addr: Word, len: usize) -> Result<&mut LinearMemory> {
        match self
            .regions
            .iter_mut()
            .find(|r| r.contains(addr.value(), len))
        {
            Some(r) => Ok(r),
            None => bail!("no device responsible for address {addr}"),
        }
    }
}

impl Bus for MemoryMap {
    fn read_byte(&mut self, addr: Word) -> Result<Byte> {
        self.region(addr, 1)?.read_byte(addr)
    }
    fn read_halfword(&mut self, addr: Word) -> Result<Halfword> {
        self.region(addr, 2)?.read_halfword(addr)
    }
    fn read_word(&mut self, addr: Word) -> Result<Word> {
        self.region(addr, 4)?.read_word(addr)
    }
    fn write_byte(&mut self, addr: Word, val: Byte) -> Result<()> {
        self.region(addr, 1)?.write_byte(addr, val)
    }
    fn write_halfword(&mut self, addr: Word, val: Halfword) -> Result<()> {
        self.region(addr, 2)?.write_halfword(addr, val)
    }
    fn write_word(&mut self, addr: Word, val: Word) -> Result<()> {
        self.region(addr, 4)?.write_word(addr, val)
    }
    fn write_bytes(&mut self, addr: Word, bytes: &[u8]) -> Result<()> {
        self.region(addr, bytes.len())?.write_bytes(addr, bytes)
    }
    fn clear(&mut self) {
        for r in &mut self.regions {
            r.clear();
        }
    }
    fn load(&mut self, addr: Word, bytes: &[u8]) -> Result<()> {
        self.region(addr, bytes.len())?.load(addr, bytes)
    }
}
