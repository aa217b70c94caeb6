use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};

use crate::memory::{self, Memory, Registers, MEMORY_SIZE};
use crate::opcode::Opcode;
use crate::region::Region;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
  Active,
  Halted,
}

/// A virtual machine for the LS-8 architecture.
///
/// Owns 256 bytes of memory, eight 8-bit registers (`R7` is the stack
/// pointer), the program counter and the flag register. Programs are placed
/// at address 0 with [`Vm::load`] and executed with [`Vm::run`] or one
/// instruction at a time with [`Vm::step`].
///
/// Arithmetic wraps at 8 bits, the same as the registers holding it.
#[derive(Debug)]
pub struct Vm {
  // address of the next opcode to fetch
  pc: usize,
  memory: Memory,
  registers: Registers,
  flags: u8,
  state: State,
}

impl Vm {
  /// Create a new, empty virtual machine
  pub fn new() -> Self {
    Self {
      pc: 0,
      memory: Memory::new(),
      registers: Registers::new(),
      flags: 0,
      state: State::Active,
    }
  }

  /// Create a virtual machine with `region` already loaded
  pub fn with_program<R>(region: &R) -> Result<Self, Error>
  where
    R: Region,
  {
    let mut vm = Self::new();
    vm.load(region)?;
    Ok(vm)
  }

  /// Copy a program into memory, starting at address 0
  pub fn load<R>(&mut self, region: &R) -> Result<(), Error>
  where
    R: Region,
  {
    let bytes = region.instructions();
    if bytes.len() > MEMORY_SIZE {
      return Err(Error::ProgramTooLarge(bytes.len()));
    }
    for (address, &byte) in bytes.iter().enumerate() {
      self.memory.write(address, byte)?;
    }
    tracing::debug!(bytes = bytes.len(), "loaded program");
    Ok(())
  }

  /// Execute a single instruction, writing anything it prints to `out`
  pub fn step<W>(&mut self, out: &mut W) -> Result<(), Error>
  where
    W: Write,
  {
    if self.state == State::Halted {
      return Err(Error::MachineHalted);
    }
    tracing::trace!("{}", self.snapshot());
    let mut task = Task::new(self, out);
    task.run()
  }

  /// Execute instructions until the machine halts or faults
  pub fn run<W>(&mut self, out: &mut W) -> Result<(), Error>
  where
    W: Write,
  {
    let mut steps: u64 = 0;
    while self.state == State::Active {
      self.step(out)?;
      steps += 1;
    }
    tracing::debug!(pc = self.pc, steps, "halted");
    Ok(())
  }

  /// Capture the program counter, the bytes it points at and the registers
  pub fn snapshot(&self) -> Snapshot {
    let peek = |offset: usize| {
      self
        .memory
        .as_slice()
        .get(self.pc + offset)
        .copied()
        .unwrap_or_default()
    };
    let mut registers = [0; memory::REGISTER_COUNT];
    registers.copy_from_slice(self.registers.as_slice());
    Snapshot {
      pc: self.pc,
      bytes: [peek(0), peek(1), peek(2)],
      registers,
    }
  }

  pub fn pc(&self) -> usize {
    self.pc
  }

  pub fn flags(&self) -> u8 {
    self.flags
  }

  pub fn registers(&self) -> &Registers {
    &self.registers
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn is_halted(&self) -> bool {
    self.state == State::Halted
  }

  fn reg(&self, index: u8) -> Result<u8, Error> {
    self.registers.get(index)
  }

  fn set_reg(&mut self, index: u8, value: u8) -> Result<(), Error> {
    self.registers.set(index, value)
  }

  fn push(&mut self, value: u8) -> Result<(), Error> {
    let sp = self.registers.sp().checked_sub(1).ok_or(Error::StackOverflow)?;
    self.registers.set_sp(sp);
    self.memory.write(sp as usize, value)
  }

  fn pop(&mut self) -> Result<u8, Error> {
    let sp = self.registers.sp();
    let value = self.memory.read(sp as usize)?;
    self
      .registers
      .set_sp(sp.checked_add(1).ok_or(Error::StackUnderflow)?);
    Ok(value)
  }
}

impl Default for Vm {
  fn default() -> Self {
    Self::new()
  }
}

/// The machine state as shown by the debug trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
  pub pc: usize,
  pub bytes: [u8; 3],
  pub registers: [u8; memory::REGISTER_COUNT],
}

impl fmt::Display for Snapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let [op, a, b] = self.bytes;
    write!(f, "TRACE: {:02X} | {op:02X} {a:02X} {b:02X} |", self.pc)?;
    for register in self.registers {
      write!(f, " {register:02X}")?;
    }
    Ok(())
  }
}

/// An error that occurred during execution of instructions
#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("address {0:#04x} is out of bounds")]
  OutOfBounds(usize),

  #[error("register R{0} does not exist")]
  InvalidRegister(u8),

  #[error("unknown opcode {0:#010b}")]
  UnknownOpcode(u8),

  #[error("unsupported ALU operation {0:#010b}")]
  UnsupportedAluOperation(u8),

  #[error("push with the stack pointer at address 0")]
  StackOverflow,

  #[error("pop past the top of memory")]
  StackUnderflow,

  #[error("program is {0} bytes, which does not fit in memory")]
  ProgramTooLarge(usize),

  #[error("machine is halted")]
  MachineHalted,

  #[error("failed to write output")]
  Output(#[from] io::Error),
}

/// What the dispatch loop does with the program counter once a handler
/// returns
#[derive(Debug, Clone, Copy, PartialEq)]
enum Flow {
  /// Move past the instruction and its operands
  Next,
  /// The handler picked the next address itself
  Jump(usize),
}

struct Task<'vm, 'out, W> {
  vm: &'vm mut Vm,
  out: &'out mut W,
}

impl<'vm, 'out, W> Task<'vm, 'out, W>
where
  W: Write,
{
  fn new(vm: &'vm mut Vm, out: &'out mut W) -> Self {
    Self { vm, out }
  }

  // only operands the opcode declares are fetched, so an instruction that
  // ends on the last cell doesn't read past memory
  fn operand(&self, op: Opcode, index: u8) -> Result<u8, Error> {
    if index < op.operands() {
      self.vm.memory.read(self.vm.pc + 1 + index as usize)
    } else {
      Ok(0)
    }
  }

  fn run(&mut self) -> Result<(), Error> {
    let op = Opcode::try_from(self.vm.memory.read(self.vm.pc)?)?;
    let a = self.operand(op, 0)?;
    let b = self.operand(op, 1)?;
    let flow = if op.is_alu() {
      alu(self, op, a, b)?
    } else {
      match op {
        Opcode::Hlt => halt(self)?,
        Opcode::Ldi => load_immediate(self, a, b)?,
        Opcode::Ld => load(self, a, b)?,
        Opcode::St => store(self, a, b)?,
        Opcode::Prn => print(self, a)?,
        Opcode::Push => push(self, a)?,
        Opcode::Pop => pop(self, a)?,
        Opcode::Call => call(self, a)?,
        Opcode::Ret => ret(self)?,
        Opcode::Jmp => jump(self, a)?,
        Opcode::Jeq => jump_if(self, a, memory::FLAG_EQUAL, true)?,
        Opcode::Jne => jump_if(self, a, memory::FLAG_EQUAL, false)?,
        Opcode::Jgt => jump_if(self, a, memory::FLAG_GREATER, true)?,
        Opcode::Jlt => jump_if(self, a, memory::FLAG_LESS, true)?,
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Cmp => {
          return Err(Error::UnsupportedAluOperation(op as u8))
        }
      }
    };
    match flow {
      Flow::Next => self.vm.pc += op.width() as usize,
      Flow::Jump(target) => self.vm.pc = target,
    }
    Ok(())
  }
}

// r[a] ← r[a] ⊕ r[b]
fn alu<W>(task: &mut Task<'_, '_, W>, op: Opcode, a: u8, b: u8) -> Result<Flow, Error>
where
  W: Write,
{
  let ra = task.vm.reg(a)?;
  let rb = task.vm.reg(b)?;
  match op {
    Opcode::Add => task.vm.set_reg(a, ra.wrapping_add(rb))?,
    Opcode::Sub => task.vm.set_reg(a, ra.wrapping_sub(rb))?,
    Opcode::Mul => task.vm.set_reg(a, ra.wrapping_mul(rb))?,
    Opcode::Cmp => {
      task.vm.flags = match ra.cmp(&rb) {
        Ordering::Equal => memory::FLAG_EQUAL,
        Ordering::Greater => memory::FLAG_GREATER,
        Ordering::Less => memory::FLAG_LESS,
      };
    }
    _ => return Err(Error::UnsupportedAluOperation(op as u8)),
  }
  Ok(Flow::Next)
}

// (stop execution)
fn halt<W>(task: &mut Task<'_, '_, W>) -> Result<Flow, Error>
where
  W: Write,
{
  task.vm.state = State::Halted;
  Ok(Flow::Next)
}

// r[a] ← b
fn load_immediate<W>(task: &mut Task<'_, '_, W>, a: u8, b: u8) -> Result<Flow, Error>
where
  W: Write,
{
  task.vm.set_reg(a, b)?;
  Ok(Flow::Next)
}

// r[a] ← m[r[b]]
fn load<W>(task: &mut Task<'_, '_, W>, a: u8, b: u8) -> Result<Flow, Error>
where
  W: Write,
{
  let address = task.vm.reg(b)? as usize;
  let value = task.vm.memory.read(address)?;
  task.vm.set_reg(a, value)?;
  Ok(Flow::Next)
}

// m[r[a]] ← r[b]
fn store<W>(task: &mut Task<'_, '_, W>, a: u8, b: u8) -> Result<Flow, Error>
where
  W: Write,
{
  let address = task.vm.reg(a)? as usize;
  let value = task.vm.reg(b)?;
  task.vm.memory.write(address, value)?;
  Ok(Flow::Next)
}

// out ← dec(r[a])
fn print<W>(task: &mut Task<'_, '_, W>, a: u8) -> Result<Flow, Error>
where
  W: Write,
{
  let value = task.vm.reg(a)?;
  writeln!(task.out, "{value}")?;
  Ok(Flow::Next)
}

// sp ← sp − 1; m[sp] ← r[a]
fn push<W>(task: &mut Task<'_, '_, W>, a: u8) -> Result<Flow, Error>
where
  W: Write,
{
  let value = task.vm.reg(a)?;
  task.vm.push(value)?;
  Ok(Flow::Next)
}

// r[a] ← m[sp]; sp ← sp + 1
fn pop<W>(task: &mut Task<'_, '_, W>, a: u8) -> Result<Flow, Error>
where
  W: Write,
{
  let value = task.vm.pop()?;
  task.vm.set_reg(a, value)?;
  Ok(Flow::Next)
}

// sp ← sp − 1; m[sp] ← pc + 2; pc ← r[a]
fn call<W>(task: &mut Task<'_, '_, W>, a: u8) -> Result<Flow, Error>
where
  W: Write,
{
  let target = task.vm.reg(a)? as usize;
  let next = task.vm.pc + Opcode::Call.width() as usize;
  let next = u8::try_from(next).map_err(|_| Error::OutOfBounds(next))?;
  task.vm.push(next)?;
  Ok(Flow::Jump(target))
}

// pc ← m[sp]; sp ← sp + 1
fn ret<W>(task: &mut Task<'_, '_, W>) -> Result<Flow, Error>
where
  W: Write,
{
  let target = task.vm.pop()? as usize;
  Ok(Flow::Jump(target))
}

// pc ← r[a]
fn jump<W>(task: &mut Task<'_, '_, W>, a: u8) -> Result<Flow, Error>
where
  W: Write,
{
  Ok(Flow::Jump(task.vm.reg(a)? as usize))
}

// if (fl & flag != 0) == expect : pc ← r[a]
fn jump_if<W>(task: &mut Task<'_, '_, W>, a: u8, flag: u8, expect: bool) -> Result<Flow, Error>
where
  W: Write,
{
  let target = task.vm.reg(a)? as usize;
  if (task.vm.flags & flag != 0) == expect {
    Ok(Flow::Jump(target))
  } else {
    Ok(Flow::Next)
  }
}
