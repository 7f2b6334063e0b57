use crate::{
    common::{integer_pow, integer_sqrt, Cell, MachineState, Memory},
    error::Fault,
    opcode::Opcode,
    stack::AccessMode,
    trace::TraceRecord,
};

use super::{Core, REGISTER_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    Continue,
    Halt,
}

impl Core {
    /// Runs until `HALT` or a fault. Devices are scanned after every instruction.
    pub fn execute_until_halt(&mut self) -> Result<(), Fault> {
        loop {
            match self.execute_next()? {
                ExecutionResult::Continue => {},
                ExecutionResult::Halt => return Ok(()),
            }
        }
    }

    /// Executes a single instruction and scans devices, for hosts which run one instruction per
    /// frame. Once as many instructions have run as the program has cells, halts instead of
    /// fetching anything further.
    pub fn step(&mut self) -> Result<ExecutionResult, Fault> {
        if self.is_halted() {
            return Ok(ExecutionResult::Halt);
        }

        if self.step >= self.steps {
            log::debug!("step budget of {} exhausted", self.steps);
            self.unload_program();
            return Ok(ExecutionResult::Halt);
        }

        self.step += 1;
        self.execute_next()
    }

    fn execute_next(&mut self) -> Result<ExecutionResult, Fault> {
        if self.is_halted() {
            return Ok(ExecutionResult::Halt);
        }

        let result = self.fetch_and_execute()
            .and_then(|result| {
                self.devices.scan(&mut self.memory)?;
                Ok(result)
            });

        if let Err(fault) = &result {
            log::debug!("halting on fault: {fault}");
            self.state = MachineState::Halted;
        }
        result
    }

    fn fetch_and_execute(&mut self) -> Result<ExecutionResult, Fault> {
        let pc = self.program_counter;
        let raw = self.memory.read_cell(pc)?;
        let opcode = Opcode::decode(raw)
            .ok_or(Fault::UnknownOpcode { opcode: raw, pc })?;

        let result = self.execute_one_instruction(opcode)?;
        self.emit_trace(pc, opcode);
        Ok(result)
    }

    pub fn execute_one_instruction(&mut self, opcode: Opcode) -> Result<ExecutionResult, Fault> {
        match opcode {
            Opcode::Halt => {
                log::debug!("HALT at pc {}", self.program_counter);
                self.unload_program();
                return Ok(ExecutionResult::Halt);
            }

            Opcode::LoadR1 | Opcode::LoadR2 | Opcode::LoadR3 | Opcode::LoadR4
            | Opcode::LoadR5 | Opcode::LoadR6 | Opcode::LoadR7 | Opcode::LoadR8 => {
                let register = opcode as usize - Opcode::LoadR1 as usize;
                self.registers[register] = self.operand(1)?;
            }

            Opcode::Add => {
                let (a, b) = self.pop_two()?;
                self.working_stack.push(a.wrapping_add(b))?;
            }

            Opcode::Sub => {
                let (a, b) = self.pop_two()?;
                self.working_stack.push(a.wrapping_sub(b))?;
            }

            Opcode::Push => {
                let register = self.register_index(self.operand(1)?)?;
                let value = self.registers[register];
                self.working_stack.push(value)?;
            }

            Opcode::Pop => {
                let register = self.register_index(self.operand(1)?)?;
                self.registers[register] = self.working_stack.pop()?;
            }

            // Comparisons push 0 for true
            Opcode::Equal => {
                let (a, b) = self.pop_two()?;
                self.working_stack.push(if a == b { 0 } else { 1 })?;
            }

            Opcode::Gth => {
                let (a, b) = self.pop_two()?;
                self.working_stack.push(if a > b { 0 } else { 1 })?;
            }

            Opcode::Lth => {
                let (a, b) = self.pop_two()?;
                self.working_stack.push(if a < b { 0 } else { 1 })?;
            }

            Opcode::Dup => {
                let (top,) = self.working_stack.take_operands(AccessMode::Keep).cell().done()?;
                self.working_stack.push(top)?;
            }

            Opcode::Pot => {
                let value = self.operand(1)?;
                self.working_stack.push(value)?;
            }

            Opcode::Ovr => self.over()?,

            Opcode::Inc => self.working_stack.modify_top(|n| n.wrapping_add(1))?,
            Opcode::Dcr => self.working_stack.modify_top(|n| n.wrapping_sub(1))?,

            Opcode::Mov => {
                let (dst_flag, src_flag) = (self.operand(1)?, self.operand(2)?);
                let (dst, src) = (self.operand(3)?, self.operand(4)?);

                let value = match src_flag {
                    0 => {
                        let src = self.register_index(src)?;
                        self.registers[src]
                    }
                    _ => self.memory.read_at(src)?,
                };

                match dst_flag {
                    0 => {
                        let dst = self.register_index(dst)?;
                        self.registers[dst] = value;
                    }
                    _ => self.memory.write_at(dst, value)?,
                }
            }

            Opcode::Pow => {
                let (base, exponent) = self.pop_two()?;
                self.working_stack.push(integer_pow(base, exponent))?;
            }

            Opcode::Sqrt => {
                let value = self.peek()?;
                let root = integer_sqrt(value)
                    .ok_or(Fault::ArithmeticDomain { mnemonic: opcode.mnemonic(), operand: value })?;
                self.working_stack.modify_top(|_| root)?;
            }

            Opcode::Abs => self.working_stack.modify_top(|n| n.wrapping_abs())?,

            Opcode::Str => {
                let (addr, value) = self.peek_two()?;
                self.memory.write_at(addr, value)?;
                self.working_stack.discard(2)?;
            }

            Opcode::Dvo => {
                let port = self.operand(1)?;
                self.devices.console_out(port)?;
            }

            Opcode::Dvw => {
                let port = self.operand(1)?;
                let value = self.peek()?;
                self.devices.write_port(port, value)?;
                self.working_stack.discard(1)?;
            }

            // Register numbers come from the stack, even though the encoding reserves two cells
            Opcode::Swap => {
                let (first, second) = self.peek_two()?;
                let (first, second) = (self.register_index(first)?, self.register_index(second)?);
                self.working_stack.discard(2)?;
                self.registers.swap(first, second);
            }

            // Equivalent to pushing the return address, then OVR and JMP, so the target and the
            // return address are left on the stack
            Opcode::Goto => {
                let addr = self.peek()?;
                let target = self.memory.resolve(addr)?;
                let return_address = self.pc_cell(self.program_counter + 1)?;
                self.working_stack.reserve(2)?;
                self.working_stack.push(return_address)?;
                self.program_counter = target;
            }

            Opcode::Jmp => {
                let addr = self.peek()?;
                let target = self.memory.resolve(addr)?;
                self.working_stack.discard(1)?;
                self.program_counter = target;
            }

            Opcode::Rmv => {
                self.working_stack.pop()?;
            }

            Opcode::Jnz => {
                if self.peek()? != 0 {
                    let (_, target) = self.peek_two()?;
                    let target = self.memory.resolve(target)?;
                    self.working_stack.discard(2)?;
                    self.program_counter = target;
                } else {
                    self.working_stack.discard(1)?;
                    self.program_counter += 1;
                }
            }

            Opcode::Rpc => {
                let pc = self.pc_cell(self.program_counter)?;
                self.working_stack.push(pc)?;
            }

            Opcode::Ret => {
                let value = self.peek()?;
                self.return_stack.push(value)?;
                self.working_stack.discard(1)?;
            }
        }

        if !opcode.is_jump() {
            self.program_counter += opcode.width();
        }

        Ok(ExecutionResult::Continue)
    }

    /// Reads the `n`th cell after the current opcode.
    fn operand(&self, n: usize) -> Result<Cell, Fault> {
        self.memory.read_cell(self.program_counter + n)
    }

    /// Converts a 1-based register number from an instruction into an index.
    fn register_index(&self, register: Cell) -> Result<usize, Fault> {
        usize::try_from(register)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .filter(|n| *n < REGISTER_COUNT)
            .ok_or(Fault::InvalidRegister { register })
    }

    fn pc_cell(&self, pc: usize) -> Result<Cell, Fault> {
        Cell::try_from(pc).map_err(|_| Fault::MemoryFault { address: pc as i64 })
    }

    /// Pops `(a, b)`, where `a` was on top.
    fn pop_two(&mut self) -> Result<(Cell, Cell), Fault> {
        self.working_stack.take_operands(AccessMode::Pop).cell().then_cell().done()
    }

    fn peek(&mut self) -> Result<Cell, Fault> {
        let (a,) = self.working_stack.take_operands(AccessMode::Keep).cell().done()?;
        Ok(a)
    }

    /// Reads `(a, b)` like [`Core::pop_two`], but leaves them in place until the instruction can
    /// no longer fault.
    fn peek_two(&mut self) -> Result<(Cell, Cell), Fault> {
        self.working_stack.take_operands(AccessMode::Keep).cell().then_cell().done()
    }

    fn over(&mut self) -> Result<(), Fault> {
        let (_, second) = self.working_stack
            .take_operands(AccessMode::Keep)
            .cell().then_cell()
            .done()?;
        self.working_stack.push(second)
    }

    fn emit_trace(&mut self, pc: usize, opcode: Opcode) {
        let Some(tracer) = self.tracer.as_mut() else {
            return;
        };

        tracer.trace(&TraceRecord {
            pc,
            opcode: opcode as Cell,
            mnemonic: opcode.mnemonic(),
            working_stack: self.working_stack.cells(),
            return_stack: self.return_stack.cells(),
            registers: &self.registers,
            display_region: self.memory.display_cells(),
        });
    }
}
