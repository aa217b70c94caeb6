use std::fmt;

use crate::vm::Error;

/// Bit 5 of an opcode marks an ALU operation.
pub const ALU_BIT: u8 = 0b0010_0000;

/// Bit 4 of an opcode marks an instruction that moves the program counter
/// itself.
pub const SETS_PC_BIT: u8 = 0b0001_0000;

/// An LS-8 opcode.
///
/// The byte layout is `AABCDDDD`, where `AA` is the operand count, `B` is
/// set for ALU operations, `C` is set when the instruction sets the program
/// counter, and `DDDD` identifies the instruction.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
  /// | Operation | Semantics/RTL      | Assembly |
  /// |-----------|--------------------|----------|
  /// | Halt      | `(stop execution)` | `HLT`    |
  Hlt = 0b0000_0001,

  /// | Operation      | Semantics/RTL | Assembly      |
  /// |----------------|---------------|---------------|
  /// | Load Immediate | `r[a] ← b`    | `LDI ra, b`   |
  Ldi = 0b1000_0010,

  /// Loads a register from the address held in another register.
  ///
  /// | Operation | Semantics/RTL    | Assembly     |
  /// |-----------|------------------|--------------|
  /// | Load      | `r[a] ← m[r[b]]` | `LD ra, rb`  |
  Ld = 0b1000_0011,

  /// Stores a register at the address held in another register.
  ///
  /// | Operation | Semantics/RTL    | Assembly     |
  /// |-----------|------------------|--------------|
  /// | Store     | `m[r[a]] ← r[b]` | `ST ra, rb`  |
  St = 0b1000_0100,

  /// Writes the register in decimal, followed by a newline.
  ///
  /// | Operation | Semantics/RTL     | Assembly |
  /// |-----------|-------------------|----------|
  /// | Print     | `out ← dec(r[a])` | `PRN ra` |
  Prn = 0b0100_0111,

  /// | Operation | Semantics/RTL                  | Assembly  |
  /// |-----------|--------------------------------|-----------|
  /// | Push      | `sp ← sp − 1; m[sp] ← r[a]`    | `PUSH ra` |
  Push = 0b0100_0101,

  /// | Operation | Semantics/RTL                  | Assembly  |
  /// |-----------|--------------------------------|-----------|
  /// | Pop       | `r[a] ← m[sp]; sp ← sp + 1`    | `POP ra`  |
  Pop = 0b0100_0110,

  /// Pushes the address of the following instruction, then jumps.
  ///
  /// | Operation | Semantics/RTL                           | Assembly  |
  /// |-----------|-----------------------------------------|-----------|
  /// | Call      | `sp ← sp − 1; m[sp] ← pc + 2; pc ← r[a]` | `CALL ra` |
  Call = 0b0101_0000,

  /// | Operation | Semantics/RTL               | Assembly |
  /// |-----------|-----------------------------|----------|
  /// | Return    | `pc ← m[sp]; sp ← sp + 1`   | `RET`    |
  Ret = 0b0001_0001,

  /// | Operation | Semantics/RTL | Assembly |
  /// |-----------|---------------|----------|
  /// | Jump      | `pc ← r[a]`   | `JMP ra` |
  Jmp = 0b0101_0100,

  /// | Operation     | Semantics/RTL                     | Assembly |
  /// |---------------|-----------------------------------|----------|
  /// | Jump if Equal | `if fl.e : pc ← r[a] else pc + 2` | `JEQ ra` |
  Jeq = 0b0101_0101,

  /// | Operation         | Semantics/RTL                      | Assembly |
  /// |-------------------|------------------------------------|----------|
  /// | Jump if Not Equal | `if !fl.e : pc ← r[a] else pc + 2` | `JNE ra` |
  Jne = 0b0101_0110,

  /// | Operation       | Semantics/RTL                     | Assembly |
  /// |-----------------|-----------------------------------|----------|
  /// | Jump if Greater | `if fl.g : pc ← r[a] else pc + 2` | `JGT ra` |
  Jgt = 0b0101_0111,

  /// | Operation    | Semantics/RTL                     | Assembly |
  /// |--------------|-----------------------------------|----------|
  /// | Jump if Less | `if fl.l : pc ← r[a] else pc + 2` | `JLT ra` |
  Jlt = 0b0101_1000,

  /// | Operation | Semantics/RTL         | Assembly     |
  /// |-----------|-----------------------|--------------|
  /// | Add       | `r[a] ← r[a] + r[b]`  | `ADD ra, rb` |
  Add = 0b1010_0000,

  /// | Operation | Semantics/RTL         | Assembly     |
  /// |-----------|-----------------------|--------------|
  /// | Subtract  | `r[a] ← r[a] − r[b]`  | `SUB ra, rb` |
  Sub = 0b1010_0001,

  /// | Operation | Semantics/RTL         | Assembly     |
  /// |-----------|-----------------------|--------------|
  /// | Multiply  | `r[a] ← r[a] × r[b]`  | `MUL ra, rb` |
  Mul = 0b1010_0010,

  /// Overwrites the flag register with exactly one of equal, greater or
  /// less, comparing `r[a]` against `r[b]`.
  ///
  /// | Operation | Semantics/RTL           | Assembly     |
  /// |-----------|-------------------------|--------------|
  /// | Compare   | `fl ← cmp(r[a], r[b])`  | `CMP ra, rb` |
  Cmp = 0b1010_0111,
}

impl Opcode {
  /// Number of operand bytes following the opcode.
  pub fn operands(self) -> u8 {
    (self as u8) >> 6
  }

  /// Total length of the instruction in bytes.
  pub fn width(self) -> u8 {
    1 + self.operands()
  }

  pub fn is_alu(self) -> bool {
    is_alu(self as u8)
  }

  pub fn sets_pc(self) -> bool {
    (self as u8) & SETS_PC_BIT != 0
  }

  pub fn mnemonic(self) -> &'static str {
    match self {
      Self::Hlt => "HLT",
      Self::Ldi => "LDI",
      Self::Ld => "LD",
      Self::St => "ST",
      Self::Prn => "PRN",
      Self::Push => "PUSH",
      Self::Pop => "POP",
      Self::Call => "CALL",
      Self::Ret => "RET",
      Self::Jmp => "JMP",
      Self::Jeq => "JEQ",
      Self::Jne => "JNE",
      Self::Jgt => "JGT",
      Self::Jlt => "JLT",
      Self::Add => "ADD",
      Self::Sub => "SUB",
      Self::Mul => "MUL",
      Self::Cmp => "CMP",
    }
  }
}

/// Whether a raw opcode byte belongs to the ALU, known or not.
pub fn is_alu(byte: u8) -> bool {
  byte & ALU_BIT != 0
}

impl TryFrom<u8> for Opcode {
  type Error = Error;

  fn try_from(byte: u8) -> Result<Self, Self::Error> {
    let op = match byte {
      0b0000_0001 => Self::Hlt,
      0b1000_0010 => Self::Ldi,
      0b1000_0011 => Self::Ld,
      0b1000_0100 => Self::St,
      0b0100_0111 => Self::Prn,
      0b0100_0101 => Self::Push,
      0b0100_0110 => Self::Pop,
      0b0101_0000 => Self::Call,
      0b0001_0001 => Self::Ret,
      0b0101_0100 => Self::Jmp,
      0b0101_0101 => Self::Jeq,
      0b0101_0110 => Self::Jne,
      0b0101_0111 => Self::Jgt,
      0b0101_1000 => Self::Jlt,
      0b1010_0000 => Self::Add,
      0b1010_0001 => Self::Sub,
      0b1010_0010 => Self::Mul,
      0b1010_0111 => Self::Cmp,
      _ if is_alu(byte) => return Err(Error::UnsupportedAluOperation(byte)),
      _ => return Err(Error::UnknownOpcode(byte)),
    };
    Ok(op)
  }
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.mnemonic())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL: [Opcode; 18] = [
    Opcode::Hlt,
    Opcode::Ldi,
    Opcode::Ld,
    Opcode::St,
    Opcode::Prn,
    Opcode::Push,
    Opcode::Pop,
    Opcode::Call,
    Opcode::Ret,
    Opcode::Jmp,
    Opcode::Jeq,
    Opcode::Jne,
    Opcode::Jgt,
    Opcode::Jlt,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Cmp,
  ];

  #[test]
  fn decode_known() {
    for op in ALL {
      assert_eq!(Opcode::try_from(op as u8).ok(), Some(op));
    }
  }

  #[test]
  fn operand_counts() {
    assert_eq!(Opcode::Hlt.operands(), 0);
    assert_eq!(Opcode::Ret.operands(), 0);
    assert_eq!(Opcode::Prn.operands(), 1);
    assert_eq!(Opcode::Push.operands(), 1);
    assert_eq!(Opcode::Call.operands(), 1);
    assert_eq!(Opcode::Ldi.operands(), 2);
    assert_eq!(Opcode::Cmp.operands(), 2);
    assert_eq!(Opcode::Ldi.width(), 3);
  }

  #[test]
  fn classification() {
    let alu: Vec<_> = ALL.into_iter().filter(|op| op.is_alu()).collect();
    assert_eq!(alu, [Opcode::Add, Opcode::Sub, Opcode::Mul, Opcode::Cmp]);

    let jumps: Vec<_> = ALL.into_iter().filter(|op| op.sets_pc()).collect();
    assert_eq!(
      jumps,
      [
        Opcode::Call,
        Opcode::Ret,
        Opcode::Jmp,
        Opcode::Jeq,
        Opcode::Jne,
        Opcode::Jgt,
        Opcode::Jlt,
      ]
    );
  }

  #[test]
  fn decode_unknown_alu() {
    // DIV is a real LS-8 opcode we don't implement
    assert!(matches!(
      Opcode::try_from(0b1010_0011),
      Err(Error::UnsupportedAluOperation(0b1010_0011))
    ));
  }

  #[test]
  fn decode_unknown() {
    assert!(matches!(Opcode::try_from(0x00), Err(Error::UnknownOpcode(0x00))));
    assert!(matches!(Opcode::try_from(0xFF & !ALU_BIT), Err(Error::UnknownOpcode(_))));
  }

  #[test]
  fn display() {
    assert_eq!(Opcode::Jne.to_string(), "JNE");
  }
}
