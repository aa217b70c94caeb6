use crate::vm::Error;

/// Size of the address space in bytes
pub const MEMORY_SIZE: usize = 256;

/// Number of general purpose registers
pub const REGISTER_COUNT: usize = 8;

/// Register reserved for the stack pointer
pub const SP: u8 = 7;

/// Where the stack pointer starts, leaving the top of memory free and the
/// stack clear of the program loaded at address 0
pub const STACK_START: u8 = 0xF4;

/// Flag bit set by `CMP` when `r[a] == r[b]`
pub const FLAG_EQUAL: u8 = 0b001;
/// Flag bit set by `CMP` when `r[a] > r[b]`
pub const FLAG_GREATER: u8 = 0b010;
/// Flag bit set by `CMP` when `r[a] < r[b]`
pub const FLAG_LESS: u8 = 0b100;

/// Flat, byte addressable memory
#[derive(Debug, Clone)]
pub struct Memory {
  cells: [u8; MEMORY_SIZE],
}

impl Memory {
  pub fn new() -> Self {
    Self {
      cells: [0; MEMORY_SIZE],
    }
  }

  pub fn read(&self, address: usize) -> Result<u8, Error> {
    self
      .cells
      .get(address)
      .copied()
      .ok_or(Error::OutOfBounds(address))
  }

  pub fn write(&mut self, address: usize, value: u8) -> Result<(), Error> {
    self
      .cells
      .get_mut(address)
      .map(|prev| {
        *prev = value;
      })
      .ok_or(Error::OutOfBounds(address))
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.cells
  }
}

impl Default for Memory {
  fn default() -> Self {
    Self::new()
  }
}

/// The general purpose register file, with `R7` doubling as the stack pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
  slots: [u8; REGISTER_COUNT],
}

impl Registers {
  pub fn new() -> Self {
    let mut slots = [0; REGISTER_COUNT];
    slots[SP as usize] = STACK_START;
    Self { slots }
  }

  pub fn get(&self, index: u8) -> Result<u8, Error> {
    self
      .slots
      .get(index as usize)
      .copied()
      .ok_or(Error::InvalidRegister(index))
  }

  pub fn set(&mut self, index: u8, value: u8) -> Result<(), Error> {
    let slot = self
      .slots
      .get_mut(index as usize)
      .ok_or(Error::InvalidRegister(index))?;
    *slot = value;
    Ok(())
  }

  pub fn sp(&self) -> u8 {
    self.slots[SP as usize]
  }

  pub fn set_sp(&mut self, value: u8) {
    self.slots[SP as usize] = value;
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.slots
  }
}

impl Default for Registers {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  mod memory {
    use super::*;

    #[test]
    fn new() {
      let memory = Memory::new();
      assert!(memory.as_slice().iter().all(|&b| b == 0));
      assert_eq!(memory.as_slice().len(), MEMORY_SIZE);
    }

    #[test]
    fn read_write() {
      let mut memory = Memory::new();
      assert!(memory.write(0xFF, 42).is_ok());
      assert_eq!(memory.read(0xFF).ok(), Some(42));
      assert_eq!(memory.read(0xFE).ok(), Some(0));
    }

    #[test]
    fn out_of_bounds() {
      let mut memory = Memory::new();
      assert!(matches!(memory.read(256), Err(Error::OutOfBounds(256))));
      assert!(matches!(memory.write(300, 1), Err(Error::OutOfBounds(300))));
      // nothing else got clobbered
      assert!(memory.as_slice().iter().all(|&b| b == 0));
    }
  }

  mod registers {
    use super::*;

    #[test]
    fn new() {
      let registers = Registers::new();
      assert_eq!(registers.as_slice(), &[0, 0, 0, 0, 0, 0, 0, 0xF4]);
      assert_eq!(registers.sp(), STACK_START);
    }

    #[test]
    fn get_set() {
      let mut registers = Registers::new();
      assert!(registers.set(3, 9).is_ok());
      assert_eq!(registers.get(3).ok(), Some(9));
      registers.set_sp(0x10);
      assert_eq!(registers.get(SP).ok(), Some(0x10));
    }

    #[test]
    fn invalid_register() {
      let mut registers = Registers::new();
      assert!(matches!(registers.get(8), Err(Error::InvalidRegister(8))));
      assert!(matches!(registers.set(200, 1), Err(Error::InvalidRegister(200))));
    }
  }
}
