// these modules are re-exported as a single module

pub use self::decoder::*;
mod decoder;

pub use self::instruction::*;
mod instruction;

pub use self::segment::*;
mod segment;

pub use self::register::*;
mod register;

pub use self::flag::*;
mod flag;

pub use self::parameter::*;
mod parameter;

pub use self::op::*;
mod op;

use std::cmp;
use std::num::Wrapping;

use crate::io::IoBus;
use crate::memory::MMU;

#[cfg(test)]
#[path = "./cpu_test.rs"]
mod cpu_test;

quick_error! {
    /// A host-visible fault. The core does not recover from these;
    /// guest-visible faults (divide error) go through the internal
    /// interrupt slot instead.
    #[derive(Clone, Debug, PartialEq)]
    pub enum Fault {
        /// encoding is undefined on the emulated CPU generation
        Undefined { cs: u16, ip: u16, opcodes: Vec<u8> } {
            display("undefined opcode {:02X?} at {:04X}:{:04X}", opcodes, cs, ip)
        }
        /// encoding is recognized but not built
        Unimplemented { cs: u16, ip: u16, opcodes: Vec<u8> } {
            display("unimplemented opcode {:02X?} at {:04X}:{:04X}", opcodes, cs, ip)
        }
        /// group opcode with a reserved reg field
        Reserved { cs: u16, ip: u16, opcodes: Vec<u8>, reg: u8 } {
            display("reserved reg {} in group opcode {:02X?} at {:04X}:{:04X}", reg, opcodes, cs, ip)
        }
    }
}

/// the emulated CPU generation, selectable at startup
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CpuModel {
    /// strict original 8086 instruction set
    Intel8086,

    /// adds the 80186 encodings: shift r/m by imm8 (0xC0/0xC1) and the
    /// sign-extended OR/AND/XOR forms of the 0x83 group
    Intel80186,
}

/// The processor core. Serializable as a whole, which is the snapshot
/// surface: register file, FLAGS, pending-interrupt slot and the
/// halt/override latches.
#[derive(Clone, Serialize, Deserialize)]
pub struct CPU {
    pub instruction_count: usize,
    pub cycle_count: usize,

    /// coarse cycle counter: a step spent waiting executes nothing.
    /// not tuned to real instruction timings
    pub cycles_to_wait: usize,

    /// general purpose registers, segment registers, ip, flags
    pub regs: RegisterState,

    /// armed segment-override prefix, if any
    pub segment_override: SegmentOverride,

    /// interrupt raised by the core itself (divide error), serviced at
    /// the next step boundary before fetch
    pub pending_interrupt: Option<u8>,

    /// HLT latch: no fetching until a hardware interrupt arrives
    pub halted: bool,

    pub model: CpuModel,
}

impl Default for CPU {
    fn default() -> Self {
        CPU::new(CpuModel::Intel8086)
    }
}

impl CPU {
    pub fn new(model: CpuModel) -> Self {
        CPU {
            instruction_count: 0,
            cycle_count: 0,
            cycles_to_wait: 0,
            regs: RegisterState::default(),
            segment_override: SegmentOverride::None,
            pending_interrupt: None,
            halted: false,
            model,
        }
    }

    /// puts the processor back in its power-on state
    pub fn reset(&mut self) {
        self.regs.reset();
        self.segment_override = SegmentOverride::None;
        self.pending_interrupt = None;
        self.halted = false;
        self.cycles_to_wait = 0;
    }

    pub fn get_r8(&self, r: R) -> u8 {
        self.regs.get_r8(r)
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        self.regs.set_r8(r, val);
    }

    pub fn get_r16(&self, r: R) -> u16 {
        self.regs.get_r16(r)
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        self.regs.set_r16(r, val);
    }

    /// returns the value of the given segment register
    pub fn segment(&self, seg: Segment) -> u16 {
        self.get_r16(seg.as_register())
    }

    /// Executes at most one instruction.
    ///
    /// A pending hardware interrupt (IF=1) or internal interrupt is
    /// serviced instead of fetching; a wait-state step only decrements
    /// the cycle counter. Instructions are atomic with respect to
    /// interrupts: pending requests are only observed here, at the
    /// instruction boundary.
    pub fn step(&mut self, mmu: &mut MMU, io: &mut dyn IoBus) -> Result<(), Fault> {
        if self.cycles_to_wait > 0 {
            self.cycles_to_wait -= 1;
            return Ok(());
        }

        // an armed override that was not consumed by the previous
        // instruction has outlived its consumer
        let stale = self.segment_override.tick();
        debug_assert!(!stale, "segment-override prefix outlived its consumer");

        if self.regs.flags.interrupt && io.has_pending_interrupt() {
            let int = io.take_pending_interrupt();
            trace!("servicing hardware interrupt {:02X}", int);
            self.halted = false;
            self.execute_interrupt(mmu, int);
            return Ok(());
        }

        if self.halted {
            return Ok(());
        }

        if let Some(int) = self.pending_interrupt.take() {
            trace!("servicing internal interrupt {:02X}", int);
            self.execute_interrupt(mmu, int);
            return Ok(());
        }

        let cs = self.get_r16(R::CS);
        let start_ip = self.regs.ip;
        let op = self.decode(mmu);
        match op.command {
            Op::Uninitialized => unreachable!("decoder left op uninitialized"),
            Op::Invalid(opcodes, kind) => {
                let fault = match kind {
                    Invalid::Undefined => Fault::Undefined { cs, ip: start_ip, opcodes },
                    Invalid::Unimplemented => Fault::Unimplemented { cs, ip: start_ip, opcodes },
                    Invalid::Reg(reg) => Fault::Reserved { cs, ip: start_ip, opcodes, reg },
                };
                error!("{}", fault);
                Err(fault)
            }
            _ => {
                trace!("[{:04X}:{:04X}] {}", cs, start_ip, op);
                self.execute(mmu, io, &op);
                Ok(())
            }
        }
    }

    /// Interrupt entry, shared by INT n, INTO, internal faults and
    /// hardware interrupts: push FLAGS, clear IF and TF, push CS:IP,
    /// then load the handler address from the vector table.
    pub fn execute_interrupt(&mut self, mmu: &mut MMU, int: u8) {
        let flags = self.regs.flags.u16();
        self.push16(mmu, flags);
        self.regs.flags.interrupt = false;
        self.regs.flags.trap = false;
        let cs = self.get_r16(R::CS);
        let ip = self.regs.ip;
        self.push16(mmu, cs);
        self.push16(mmu, ip);
        let (seg, off) = mmu.read_vec(int);
        self.set_r16(R::CS, seg);
        self.regs.ip = off;
    }

    fn execute(&mut self, mmu: &mut MMU, io: &mut dyn IoBus, op: &Instruction) {
        self.instruction_count += 1;
        self.cycle_count += 1;
        match op.command {
            Op::Aaa => {
                let v = if self.get_r8(R::AL) > 0xF9 {
                    2
                } else {
                    1
                };
                self.adjb(6, v);
            }
            Op::Aad => {
                let imm = self.read_parameter_value(mmu, &op.params.dst) as u16;
                let mut ax = u16::from(self.get_r8(R::AH)) * imm;
                ax += u16::from(self.get_r8(R::AL));
                let al = ax as u8;
                self.set_r8(R::AL, al);
                self.set_r8(R::AH, 0);
                // modification of flags A,C,O is undocumented
                self.regs.flags.carry = false;
                self.regs.flags.overflow = false;
                self.regs.flags.adjust = false;
                // The SF, ZF, and PF flags are set according to the resulting binary value in the AL register
                self.regs.flags.set_sign_u8(al as usize);
                self.regs.flags.set_zero_u8(al as usize);
                self.regs.flags.set_parity(al as usize);
            }
            Op::Aam => {
                // AH ← AL / imm8; AL ← AL MOD imm8
                let imm = self.read_parameter_value(mmu, &op.params.dst) as u8;
                if imm == 0 {
                    self.pending_interrupt = Some(0);
                    return;
                }
                let al = self.get_r8(R::AL);
                self.set_r8(R::AH, al / imm);
                self.set_r8(R::AL, al % imm);
                // modification of flags A,C,O is undocumented
                self.regs.flags.carry = false;
                self.regs.flags.overflow = false;
                self.regs.flags.adjust = false;
                let al = self.get_r8(R::AL);
                self.regs.flags.set_sign_u8(al as usize);
                self.regs.flags.set_zero_u8(al as usize);
                self.regs.flags.set_parity(al as usize);
            }
            Op::Aas => {
                let v = if self.get_r8(R::AL) < 6 {
                    -2
                } else {
                    -1
                };
                self.adjb(-6, v);
            }
            Op::Adc8 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let carry = self.regs.flags.carry_val();
                let res = dst + src + carry;

                // The OF, SF, ZF, AF, CF, and PF flags are set according to the result.
                self.regs.flags.set_overflow_add_u8(res, src + carry, dst);
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_adjust(res, src + carry, dst);
                self.regs.flags.set_carry_u8(res);
                self.regs.flags.set_parity(res);

                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
            }
            Op::Adc16 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let carry = self.regs.flags.carry_val();
                let res = dst + src + carry;

                // The OF, SF, ZF, AF, CF, and PF flags are set according to the result.
                self.regs.flags.set_overflow_add_u16(res, src + carry, dst);
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_adjust(res, src + carry, dst);
                self.regs.flags.set_carry_u16(res);
                self.regs.flags.set_parity(res);

                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
            }
            Op::Add8 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = src + dst;

                // The OF, SF, ZF, AF, CF, and PF flags are set according to the result.
                self.regs.flags.set_carry_u8(res);
                self.regs.flags.set_parity(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_overflow_add_u8(res, src, dst);

                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
            }
            Op::Add16 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = src + dst;

                // The OF, SF, ZF, AF, CF, and PF flags are set according to the result.
                self.regs.flags.set_carry_u16(res);
                self.regs.flags.set_parity(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_overflow_add_u16(res, src, dst);

                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
            }
            Op::And8 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = dst & src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.regs.flags.overflow = false;
                self.regs.flags.carry = false;
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_parity(res);

                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
            }
            Op::And16 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = dst & src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.regs.flags.overflow = false;
                self.regs.flags.carry = false;
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_parity(res);

                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
            }
            Op::CallNear => {
                let old_ip = self.regs.ip;
                let temp_ip = self.read_parameter_value(mmu, &op.params.dst);
                self.push16(mmu, old_ip);
                self.regs.ip = temp_ip as u16;
            }
            Op::CallFar => {
                let (segment, offset) = self.far_target(mmu, &op.params.dst);
                let old_cs = self.get_r16(R::CS);
                let old_ip = self.regs.ip;
                self.push16(mmu, old_cs);
                self.push16(mmu, old_ip);
                self.set_r16(R::CS, segment);
                self.regs.ip = offset;
            }
            Op::Cbw => {
                let ah = if self.get_r8(R::AL) & 0x80 != 0 {
                    0xFF
                } else {
                    0x00
                };
                self.set_r8(R::AH, ah);
            }
            Op::Clc => self.regs.flags.carry = false,
            Op::Cld => self.regs.flags.direction = false,
            Op::Cli => self.regs.flags.interrupt = false,
            Op::Cmc => self.regs.flags.carry = !self.regs.flags.carry,
            Op::Cmp8 => {
                // Modify status flags in the same manner as the SUB instruction
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                self.cmp8(dst, src);
            }
            Op::Cmp16 => {
                // Modify status flags in the same manner as the SUB instruction
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                self.cmp16(dst, src);
            }
            Op::Cwd => {
                // DX:AX ← sign-extend of AX
                let dx = if self.get_r16(R::AX) & 0x8000 != 0 {
                    0xFFFF
                } else {
                    0
                };
                self.set_r16(R::DX, dx);
            }
            Op::Daa => self.adj4(6, 0x60),
            Op::Das => self.adj4(-6, -0x60),
            Op::Dec8 => {
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let src = 1;
                let res = (Wrapping(dst) - Wrapping(src)).0;

                // The CF flag is not affected. The OF, SF, ZF, AF,
                // and PF flags are set according to the result.
                self.regs.flags.set_overflow_sub_u8(res, src, dst);
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);

                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
            }
            Op::Dec16 => {
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let src = 1;
                let res = (Wrapping(dst) - Wrapping(src)).0;

                // The CF flag is not affected. The OF, SF, ZF, AF,
                // and PF flags are set according to the result.
                self.regs.flags.set_overflow_sub_u16(res, src, dst);
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);

                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
            }
            Op::Div8 => {
                // Unsigned divide AX by r/m8: AL ← quotient, AH ← remainder
                let ax = self.get_r16(R::AX);
                let op1 = self.read_parameter_value(mmu, &op.params.dst) as u16;
                if op1 == 0 {
                    self.pending_interrupt = Some(0);
                    return;
                }
                let quotient = ax / op1;
                if quotient > 0xFF {
                    self.pending_interrupt = Some(0);
                    return;
                }
                let remainder = (ax % op1) as u8;
                self.set_r8(R::AH, remainder);
                self.set_r8(R::AL, quotient as u8);
                // The CF, OF, SF, ZF, AF, and PF flags are undefined.
            }
            Op::Div16 => {
                // Unsigned divide DX:AX by r/m16: AX ← quotient, DX ← remainder
                let num = (u32::from(self.get_r16(R::DX)) << 16) | u32::from(self.get_r16(R::AX));
                let op1 = self.read_parameter_value(mmu, &op.params.dst) as u32;
                if op1 == 0 {
                    self.pending_interrupt = Some(0);
                    return;
                }
                let quotient = num / op1;
                if quotient > 0xFFFF {
                    self.pending_interrupt = Some(0);
                    return;
                }
                let remainder = (num % op1) as u16;
                self.set_r16(R::DX, remainder);
                self.set_r16(R::AX, quotient as u16);
                // The CF, OF, SF, ZF, AF, and PF flags are undefined.
            }
            Op::Esc => {
                // FPU opcode with no FPU attached
            }
            Op::Hlt => {
                // stall until the i/o manager posts an interrupt
                self.halted = true;
            }
            Op::Idiv8 => {
                let ax = self.get_r16(R::AX) as i16;
                let op1 = self.read_parameter_value(mmu, &op.params.dst) as u8 as i8;
                if op1 == 0 {
                    self.pending_interrupt = Some(0);
                    return;
                }
                let quo = ax / i16::from(op1);
                let rem = (ax % i16::from(op1)) as i8;
                if quo != i16::from(quo as i8) {
                    self.pending_interrupt = Some(0);
                    return;
                }
                self.set_r8(R::AL, quo as u8);
                self.set_r8(R::AH, rem as u8);
                // The CF, OF, SF, ZF, AF, and PF flags are undefined.
            }
            Op::Idiv16 => {
                let dividend = ((u32::from(self.get_r16(R::DX)) << 16) | u32::from(self.get_r16(R::AX))) as i32;
                let op1 = self.read_parameter_value(mmu, &op.params.dst) as u16 as i16;
                if op1 == 0 {
                    self.pending_interrupt = Some(0);
                    return;
                }
                let quo = dividend / i32::from(op1);
                let rem = (dividend % i32::from(op1)) as i16;
                if quo != i32::from(quo as i16) {
                    self.pending_interrupt = Some(0);
                    return;
                }
                self.set_r16(R::AX, quo as u16);
                self.set_r16(R::DX, rem as u16);
                // The CF, OF, SF, ZF, AF, and PF flags are undefined.
            }
            Op::Imul8 => {
                // AX ← AL ∗ r/m8
                let f1 = self.get_r8(R::AL) as i8;
                let f2 = self.read_parameter_value(mmu, &op.params.dst) as u8 as i8;
                let ax = (i16::from(f1) * i16::from(f2)) as u16;
                self.set_r16(R::AX, ax);

                // CF and OF are set when significant bits are carried into
                // the upper half of the result
                if ax & 0xFF80 == 0xFF80 || ax & 0xFF80 == 0x0000 {
                    self.regs.flags.carry = false;
                    self.regs.flags.overflow = false;
                } else {
                    self.regs.flags.carry = true;
                    self.regs.flags.overflow = true;
                }
            }
            Op::Imul16 => {
                // DX:AX ← AX ∗ r/m16
                let a = self.get_r16(R::AX) as i16;
                let b = self.read_parameter_value(mmu, &op.params.dst) as u16 as i16;
                let tmp = i32::from(a) * i32::from(b);
                self.set_r16(R::AX, tmp as u16);
                self.set_r16(R::DX, (tmp >> 16) as u16);

                if tmp == i32::from(tmp as i16) {
                    self.regs.flags.carry = false;
                    self.regs.flags.overflow = false;
                } else {
                    self.regs.flags.carry = true;
                    self.regs.flags.overflow = true;
                }
            }
            Op::In8 => {
                let port = self.read_parameter_value(mmu, &op.params.src) as u16;
                let data = io.in_u8(port);
                self.write_parameter_u8(mmu, &op.params.dst, data);
            }
            Op::In16 => {
                let port = self.read_parameter_value(mmu, &op.params.src) as u16;
                let data = io.in_u16(port);
                self.write_parameter_u16(mmu, &op.params.dst, data);
            }
            Op::Inc8 => {
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let src = 1;
                let res = (Wrapping(dst) + Wrapping(src)).0;

                // The CF flag is not affected. The OF, SF, ZF, AF,
                // and PF flags are set according to the result.
                self.regs.flags.set_overflow_add_u8(res, src, dst);
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);

                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
            }
            Op::Inc16 => {
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let src = 1;
                let res = (Wrapping(dst) + Wrapping(src)).0;

                // The CF flag is not affected. The OF, SF, ZF, AF,
                // and PF flags are set according to the result.
                self.regs.flags.set_overflow_add_u16(res, src, dst);
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);

                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
            }
            Op::Int => {
                let int = self.read_parameter_value(mmu, &op.params.dst) as u8;
                self.execute_interrupt(mmu, int);
            }
            Op::Into => {
                if self.regs.flags.overflow {
                    self.execute_interrupt(mmu, 4);
                }
            }
            Op::Iret => {
                self.regs.ip = self.pop16(mmu);
                let cs = self.pop16(mmu);
                self.set_r16(R::CS, cs);
                let flags = self.pop16(mmu);
                self.regs.flags.set_u16(flags);
            }
            Op::Ja => {
                if !self.regs.flags.carry & !self.regs.flags.zero {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jc => {
                if self.regs.flags.carry {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jcxz => {
                if self.get_r16(R::CX) == 0 {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jg => {
                if !self.regs.flags.zero & (self.regs.flags.sign == self.regs.flags.overflow) {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jl => {
                if self.regs.flags.sign != self.regs.flags.overflow {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::JmpFar => {
                let (segment, offset) = self.far_target(mmu, &op.params.dst);
                self.set_r16(R::CS, segment);
                self.regs.ip = offset;
            }
            Op::JmpNear | Op::JmpShort => {
                self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
            }
            Op::Jna => {
                if self.regs.flags.carry | self.regs.flags.zero {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jnc => {
                if !self.regs.flags.carry {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jng => {
                if self.regs.flags.zero | (self.regs.flags.sign != self.regs.flags.overflow) {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jnl => {
                if self.regs.flags.sign == self.regs.flags.overflow {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jno => {
                if !self.regs.flags.overflow {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jns => {
                if !self.regs.flags.sign {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jnz => {
                if !self.regs.flags.zero {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jo => {
                if self.regs.flags.overflow {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jpe => {
                if self.regs.flags.parity {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jpo => {
                if !self.regs.flags.parity {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Js => {
                if self.regs.flags.sign {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Jz => {
                if self.regs.flags.zero {
                    self.regs.ip = self.read_parameter_value(mmu, &op.params.dst) as u16;
                }
            }
            Op::Lahf => {
                // AH ← SF:ZF:0:AF:0:PF:1:CF
                let mut val = 0u8;
                if self.regs.flags.carry {
                    val |= 1;
                }
                val |= 1 << 1;
                if self.regs.flags.parity {
                    val |= 1 << 2;
                }
                if self.regs.flags.adjust {
                    val |= 1 << 4;
                }
                if self.regs.flags.zero {
                    val |= 1 << 6;
                }
                if self.regs.flags.sign {
                    val |= 1 << 7;
                }
                self.set_r8(R::AH, val);
            }
            Op::Lds => {
                // Load DS:r16 with far pointer from memory
                let (segment, offset) = self.read_far_pointer(mmu, &op.params.src);
                self.set_r16(R::DS, segment);
                self.write_parameter_u16(mmu, &op.params.dst, offset);
            }
            Op::Lea16 => {
                // the resolved offset, disregarding the segment part
                let offset = match op.params.src {
                    Parameter::Ptr16(_, offset) => offset,
                    _ => unreachable!("lea requires a memory operand"),
                };
                self.write_parameter_u16(mmu, &op.params.dst, offset);
            }
            Op::Les => {
                // Load ES:r16 with far pointer from memory
                let (segment, offset) = self.read_far_pointer(mmu, &op.params.src);
                self.set_r16(R::ES, segment);
                self.write_parameter_u16(mmu, &op.params.dst, offset);
            }
            Op::Lock | Op::Nop | Op::SegPrefix => {}
            Op::Lodsb | Op::Lodsw |
            Op::Movsb | Op::Movsw |
            Op::Stosb | Op::Stosw |
            Op::Cmpsb | Op::Cmpsw |
            Op::Scasb | Op::Scasw => self.execute_string(mmu, op),
            Op::Loop => {
                // Decrement count; jump short if count ≠ 0
                let dst = self.read_parameter_value(mmu, &op.params.dst) as u16;
                let cx = self.get_r16(R::CX).wrapping_sub(1);
                self.set_r16(R::CX, cx);
                if cx != 0 {
                    self.regs.ip = dst;
                }
            }
            Op::Loope => {
                // Decrement count; jump short if count ≠ 0 and ZF = 1
                let dst = self.read_parameter_value(mmu, &op.params.dst) as u16;
                let cx = self.get_r16(R::CX).wrapping_sub(1);
                self.set_r16(R::CX, cx);
                if cx != 0 && self.regs.flags.zero {
                    self.regs.ip = dst;
                }
            }
            Op::Loopne => {
                // Decrement count; jump short if count ≠ 0 and ZF = 0
                let dst = self.read_parameter_value(mmu, &op.params.dst) as u16;
                let cx = self.get_r16(R::CX).wrapping_sub(1);
                self.set_r16(R::CX, cx);
                if cx != 0 && !self.regs.flags.zero {
                    self.regs.ip = dst;
                }
            }
            Op::Mov8 => {
                let data = self.read_parameter_value(mmu, &op.params.src) as u8;
                self.write_parameter_u8(mmu, &op.params.dst, data);
            }
            Op::Mov16 => {
                let data = self.read_parameter_value(mmu, &op.params.src) as u16;
                self.write_parameter_u16(mmu, &op.params.dst, data);
            }
            Op::Mul8 => {
                // Unsigned multiply: AX ← AL ∗ r/m8
                let al = self.get_r8(R::AL) as usize;
                let arg1 = self.read_parameter_value(mmu, &op.params.dst);
                let ax = (al * arg1) as u16;
                self.set_r16(R::AX, ax);

                // The OF and CF flags are set to 0 if the upper half of the
                // result is 0; otherwise, they are set to 1.
                // The SF, ZF, AF, and PF flags are undefined.
                let high = ax & 0xFF00 != 0;
                self.regs.flags.carry = high;
                self.regs.flags.overflow = high;
            }
            Op::Mul16 => {
                // Unsigned multiply: DX:AX ← AX ∗ r/m16
                let src = self.get_r16(R::AX) as usize;
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = dst * src;

                self.set_r16(R::AX, res as u16);
                let dx = (res >> 16) as u16;
                self.set_r16(R::DX, dx);

                self.regs.flags.carry = dx != 0;
                self.regs.flags.overflow = dx != 0;
            }
            Op::Neg8 => {
                // Two's Complement Negation
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let src = 0;
                let res = (Wrapping(src) - Wrapping(dst)).0;
                self.write_parameter_u8(mmu, &op.params.dst, res as u8);

                self.regs.flags.carry = dst != 0;
                // The OF, SF, ZF, AF, and PF flags are set according to the result.
                self.regs.flags.overflow = res & 0xFF == 0x80;
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);
            }
            Op::Neg16 => {
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let src = 0;
                let res = (Wrapping(src) - Wrapping(dst)).0;
                self.write_parameter_u16(mmu, &op.params.dst, res as u16);

                self.regs.flags.carry = dst != 0;
                // The OF, SF, ZF, AF, and PF flags are set according to the result.
                self.regs.flags.overflow = res & 0xFFFF == 0x8000;
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);
            }
            Op::Not8 => {
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = !dst;
                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
                // Flags Affected: None
            }
            Op::Not16 => {
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = !dst;
                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
                // Flags Affected: None
            }
            Op::Or8 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = dst | src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.regs.flags.overflow = false;
                self.regs.flags.carry = false;
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_parity(res);

                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
            }
            Op::Or16 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = dst | src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.regs.flags.overflow = false;
                self.regs.flags.carry = false;
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_parity(res);

                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
            }
            Op::Out8 => {
                let port = self.read_parameter_value(mmu, &op.params.dst) as u16;
                let data = self.read_parameter_value(mmu, &op.params.src) as u8;
                io.out_u8(port, data);
            }
            Op::Out16 => {
                let port = self.read_parameter_value(mmu, &op.params.dst) as u16;
                let data = self.read_parameter_value(mmu, &op.params.src) as u16;
                io.out_u16(port, data);
            }
            Op::Pop16 => {
                let data = self.pop16(mmu);
                self.write_parameter_u16(mmu, &op.params.dst, data);
            }
            Op::Popf => {
                let data = self.pop16(mmu);
                self.regs.flags.set_u16(data);
            }
            Op::Push16 => {
                let data = self.read_parameter_value(mmu, &op.params.dst) as u16;
                self.push16(mmu, data);
            }
            Op::Pushf => {
                let data = self.regs.flags.u16();
                self.push16(mmu, data);
            }
            Op::Rcl8 => {
                // Rotate 9 bits (CF, r/m8) left `src` times
                let count = self.read_parameter_value(mmu, &op.params.src) % 9;
                if count > 0 {
                    let cf = self.regs.flags.carry_val() as u16;
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u16;
                    let res = ((op1 << count) | (cf << (count - 1)) | (op1 >> (9 - count))) as u8;
                    self.write_parameter_u8(mmu, &op.params.dst, res);
                    self.regs.flags.carry = (op1 >> (8 - count)) & 1 != 0;
                    // For left rotates, the OF flag is set to the exclusive OR of the CF bit
                    // (after the rotate) and the most-significant bit of the result.
                    self.regs.flags.overflow = self.regs.flags.carry_val() ^ usize::from(res >> 7) != 0;
                }
            }
            Op::Rcl16 => {
                // Rotate 17 bits (CF, r/m16) left `src` times
                let count = self.read_parameter_value(mmu, &op.params.src) % 17;
                if count > 0 {
                    let cf = self.regs.flags.carry_val() as u32;
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u32;
                    let res = ((op1 << count) | (cf << (count - 1)) | (op1 >> (17 - count))) as u16;
                    self.write_parameter_u16(mmu, &op.params.dst, res);
                    self.regs.flags.carry = (op1 >> (16 - count)) & 1 != 0;
                    self.regs.flags.overflow = self.regs.flags.carry_val() ^ usize::from(res >> 15) != 0;
                }
            }
            Op::Rcr8 => {
                // Rotate 9 bits (CF, r/m8) right `src` times
                let count = self.read_parameter_value(mmu, &op.params.src) % 9;
                if count > 0 {
                    let cf = self.regs.flags.carry_val() as u16;
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u16;
                    let res = ((op1 >> count) | (cf << (8 - count)) | (op1 << (9 - count))) as u8;
                    self.write_parameter_u8(mmu, &op.params.dst, res);
                    self.regs.flags.carry = (op1 >> (count - 1)) & 1 != 0;
                    // The OF flag is set to the exclusive OR of the two most-significant bits of the result.
                    self.regs.flags.overflow = (res ^ (res << 1)) & 0x80 != 0;
                }
            }
            Op::Rcr16 => {
                // Rotate 17 bits (CF, r/m16) right `src` times
                let count = self.read_parameter_value(mmu, &op.params.src) % 17;
                if count > 0 {
                    let cf = self.regs.flags.carry_val() as u32;
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u32;
                    let res = ((op1 >> count) | (cf << (16 - count)) | (op1 << (17 - count))) as u16;
                    self.write_parameter_u16(mmu, &op.params.dst, res);
                    self.regs.flags.carry = (op1 >> (count - 1)) & 1 != 0;
                    let bit15 = (res >> 15) & 1;
                    let bit14 = (res >> 14) & 1;
                    self.regs.flags.overflow = bit15 ^ bit14 != 0;
                }
            }
            Op::Retf => {
                self.regs.ip = self.pop16(mmu);
                let cs = self.pop16(mmu);
                self.set_r16(R::CS, cs);
                if let Parameter::Imm16(imm) = op.params.dst {
                    // release imm16 bytes of stack arguments
                    let sp = self.get_r16(R::SP).wrapping_add(imm);
                    self.set_r16(R::SP, sp);
                }
            }
            Op::Retn => {
                self.regs.ip = self.pop16(mmu);
                if let Parameter::Imm16(imm) = op.params.dst {
                    // release imm16 bytes of stack arguments
                    let sp = self.get_r16(R::SP).wrapping_add(imm);
                    self.set_r16(R::SP, sp);
                }
            }
            Op::Rol8 => {
                // Rotate 8 bits of 'dst' left 'src' times
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u8;
                    let res = op1.rotate_left((count % 8) as u32);
                    self.write_parameter_u8(mmu, &op.params.dst, res);
                    let bit0 = res & 1;
                    let bit7 = res >> 7;
                    self.regs.flags.carry = bit0 != 0;
                    self.regs.flags.overflow = bit0 ^ bit7 != 0;
                }
            }
            Op::Rol16 => {
                // Rotate 16 bits of 'dst' left 'src' times
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u16;
                    let res = op1.rotate_left((count % 16) as u32);
                    self.write_parameter_u16(mmu, &op.params.dst, res);
                    let bit0 = res & 1;
                    let bit15 = res >> 15;
                    self.regs.flags.carry = bit0 != 0;
                    self.regs.flags.overflow = bit0 ^ bit15 != 0;
                }
            }
            Op::Ror8 => {
                // Rotate 8 bits of 'dst' right 'src' times
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u8;
                    let res = op1.rotate_right((count % 8) as u32);
                    self.write_parameter_u8(mmu, &op.params.dst, res);
                    let bit6 = (res >> 6) & 1;
                    let bit7 = res >> 7;
                    self.regs.flags.carry = bit7 != 0;
                    self.regs.flags.overflow = bit6 ^ bit7 != 0;
                }
            }
            Op::Ror16 => {
                // Rotate 16 bits of 'dst' right 'src' times
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u16;
                    let res = op1.rotate_right((count % 16) as u32);
                    self.write_parameter_u16(mmu, &op.params.dst, res);
                    let bit14 = (res >> 14) & 1;
                    let bit15 = res >> 15;
                    self.regs.flags.carry = bit15 != 0;
                    self.regs.flags.overflow = bit14 ^ bit15 != 0;
                }
            }
            Op::Sahf => {
                // Load SF, ZF, AF, PF, CF from the corresponding bits of AH
                let ah = self.get_r8(R::AH);
                self.regs.flags.carry = ah & 0x01 != 0;
                self.regs.flags.parity = ah & 0x04 != 0;
                self.regs.flags.adjust = ah & 0x10 != 0;
                self.regs.flags.zero = ah & 0x40 != 0;
                self.regs.flags.sign = ah & 0x80 != 0;
            }
            Op::Sar8 => {
                // Signed divide r/m8 by 2, 'src' times
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u8;
                    let signed = i32::from(op1 as i8);
                    let res = (signed >> cmp::min(count, 7)) as u8;
                    self.write_parameter_u8(mmu, &op.params.dst, res);
                    self.regs.flags.carry = (signed >> cmp::min(count - 1, 31)) & 1 != 0;
                    self.regs.flags.overflow = false;
                    self.regs.flags.set_sign_u8(res as usize);
                    self.regs.flags.set_zero_u8(res as usize);
                    self.regs.flags.set_parity(res as usize);
                }
            }
            Op::Sar16 => {
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst) as u16;
                    let signed = i32::from(op1 as i16);
                    let res = (signed >> cmp::min(count, 15)) as u16;
                    self.write_parameter_u16(mmu, &op.params.dst, res);
                    self.regs.flags.carry = (signed >> cmp::min(count - 1, 31)) & 1 != 0;
                    self.regs.flags.overflow = false;
                    self.regs.flags.set_sign_u16(res as usize);
                    self.regs.flags.set_zero_u16(res as usize);
                    self.regs.flags.set_parity(res as usize);
                }
            }
            Op::Sbb8 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let cf = self.regs.flags.carry_val();
                let res = (Wrapping(dst) - (Wrapping(src) + Wrapping(cf))).0;

                // The OF, SF, ZF, AF, PF, and CF flags are set according to the result.
                self.regs.flags.set_overflow_sub_u8(res, src, dst);
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);
                self.regs.flags.set_carry_u8(res);

                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
            }
            Op::Sbb16 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let cf = self.regs.flags.carry_val();
                let res = (Wrapping(dst) - (Wrapping(src) + Wrapping(cf))).0;

                // The OF, SF, ZF, AF, PF, and CF flags are set according to the result.
                self.regs.flags.set_overflow_sub_u16(res, src, dst);
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);
                self.regs.flags.set_carry_u16(res);

                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
            }
            Op::Shl8 => {
                // Multiply 'dst' by 2, 'src' times
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst);
                    let res = if count < 8 {
                        op1 << count
                    } else {
                        0
                    };
                    self.regs.flags.carry = count <= 8 && (op1 >> (8 - count)) & 1 != 0;
                    // set if the sign bit changed
                    self.regs.flags.overflow = ((res >> 7) & 1) ^ self.regs.flags.carry_val() != 0;
                    self.regs.flags.set_sign_u8(res);
                    self.regs.flags.set_zero_u8(res);
                    self.regs.flags.set_parity(res);
                    self.write_parameter_u8(mmu, &op.params.dst, res as u8);
                }
            }
            Op::Shl16 => {
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst);
                    let res = if count < 16 {
                        op1 << count
                    } else {
                        0
                    };
                    self.regs.flags.carry = count <= 16 && (op1 >> (16 - count)) & 1 != 0;
                    // set if the sign bit changed
                    self.regs.flags.overflow = ((res >> 15) & 1) ^ self.regs.flags.carry_val() != 0;
                    self.regs.flags.set_sign_u16(res);
                    self.regs.flags.set_zero_u16(res);
                    self.regs.flags.set_parity(res);
                    self.write_parameter_u16(mmu, &op.params.dst, res as u16);
                }
            }
            Op::Shr8 => {
                // Unsigned divide r/m8 by 2, 'src' times
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst);
                    let res = if count < 8 {
                        op1 >> count
                    } else {
                        0
                    };
                    self.regs.flags.carry = count <= 8 && (op1 >> (count - 1)) & 1 != 0;
                    // the MSB of the pre-shift value
                    self.regs.flags.overflow = op1 & 0x80 != 0;
                    self.regs.flags.set_sign_u8(res);
                    self.regs.flags.set_zero_u8(res);
                    self.regs.flags.set_parity(res);
                    self.write_parameter_u8(mmu, &op.params.dst, res as u8);
                }
            }
            Op::Shr16 => {
                let count = self.read_parameter_value(mmu, &op.params.src);
                if count > 0 {
                    let op1 = self.read_parameter_value(mmu, &op.params.dst);
                    let res = if count < 16 {
                        op1 >> count
                    } else {
                        0
                    };
                    self.regs.flags.carry = count <= 16 && (op1 >> (count - 1)) & 1 != 0;
                    // the MSB of the pre-shift value
                    self.regs.flags.overflow = op1 & 0x8000 != 0;
                    self.regs.flags.set_sign_u16(res);
                    self.regs.flags.set_zero_u16(res);
                    self.regs.flags.set_parity(res);
                    self.write_parameter_u16(mmu, &op.params.dst, res as u16);
                }
            }
            Op::Stc => self.regs.flags.carry = true,
            Op::Std => self.regs.flags.direction = true,
            Op::Sti => self.regs.flags.interrupt = true,
            Op::Sub8 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = (Wrapping(dst) - Wrapping(src)).0;

                // The OF, SF, ZF, AF, PF, and CF flags are set according to the result.
                self.regs.flags.set_overflow_sub_u8(res, src, dst);
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);
                self.regs.flags.set_carry_u8(res);

                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
            }
            Op::Sub16 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = (Wrapping(dst) - Wrapping(src)).0;

                // The OF, SF, ZF, AF, PF, and CF flags are set according to the result.
                self.regs.flags.set_overflow_sub_u16(res, src, dst);
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_adjust(res, src, dst);
                self.regs.flags.set_parity(res);
                self.regs.flags.set_carry_u16(res);

                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
            }
            Op::Test8 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = dst & src;
                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.regs.flags.overflow = false;
                self.regs.flags.carry = false;
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_parity(res);
            }
            Op::Test16 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = dst & src;
                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.regs.flags.overflow = false;
                self.regs.flags.carry = false;
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_parity(res);
            }
            Op::Xchg8 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                self.write_parameter_u8(mmu, &op.params.dst, src as u8);
                self.write_parameter_u8(mmu, &op.params.src, dst as u8);
            }
            Op::Xchg16 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                self.write_parameter_u16(mmu, &op.params.dst, src as u16);
                self.write_parameter_u16(mmu, &op.params.src, dst as u16);
            }
            Op::Xlatb => {
                // AL ← memory byte [BX + unsigned AL], DS overridable
                let seg = self.source_segment();
                let offset = self.get_r16(R::BX).wrapping_add(u16::from(self.get_r8(R::AL)));
                let al = mmu.read_u8(seg, offset);
                self.set_r8(R::AL, al);
            }
            Op::Xor8 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = dst ^ src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.regs.flags.overflow = false;
                self.regs.flags.carry = false;
                self.regs.flags.set_sign_u8(res);
                self.regs.flags.set_zero_u8(res);
                self.regs.flags.set_parity(res);

                self.write_parameter_u8(mmu, &op.params.dst, res as u8);
            }
            Op::Xor16 => {
                let src = self.read_parameter_value(mmu, &op.params.src);
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let res = dst ^ src;

                // The OF and CF flags are cleared; the SF, ZF, and PF flags
                // are set according to the result.
                self.regs.flags.overflow = false;
                self.regs.flags.carry = false;
                self.regs.flags.set_sign_u16(res);
                self.regs.flags.set_zero_u16(res);
                self.regs.flags.set_parity(res);

                self.write_parameter_u16(mmu, &op.params.dst, res as u16);
            }
            Op::Uninitialized | Op::Invalid(_, _) => unreachable!("filtered before execute"),
        }
    }

    /// Runs a string primitive, honoring an attached repeat prefix.
    ///
    /// The source segment (DS unless overridden) is resolved once, up
    /// front; the destination is always ES:DI and never consumes the
    /// override. A repeat runs to completion within the step: CX is
    /// checked before every iteration and decremented after each, and
    /// REPE/REPNE additionally test ZF after each CMPS/SCAS.
    fn execute_string(&mut self, mmu: &mut MMU, op: &Instruction) {
        let src_seg = self.source_segment();
        match op.repeat {
            RepeatMode::None => self.string_once(mmu, &op.command, src_seg),
            _ => loop {
                let cx = self.get_r16(R::CX);
                if cx == 0 {
                    break;
                }
                self.string_once(mmu, &op.command, src_seg);
                self.set_r16(R::CX, cx.wrapping_sub(1));
                match op.command {
                    Op::Cmpsb | Op::Cmpsw | Op::Scasb | Op::Scasw => match op.repeat {
                        RepeatMode::Repe => {
                            if !self.regs.flags.zero {
                                break;
                            }
                        }
                        RepeatMode::Repne => {
                            if self.regs.flags.zero {
                                break;
                            }
                        }
                        _ => {}
                    },
                    _ => {}
                }
            },
        }
    }

    /// one iteration of a string primitive
    fn string_once(&mut self, mmu: &mut MMU, command: &Op, src_seg: u16) {
        match command {
            Op::Lodsb => {
                // Load byte at address DS:SI into AL
                let val = mmu.read_u8(src_seg, self.get_r16(R::SI));
                self.set_r8(R::AL, val);
                self.advance_si(1);
            }
            Op::Lodsw => {
                // Load word at address DS:SI into AX
                let val = mmu.read_u16(src_seg, self.get_r16(R::SI));
                self.set_r16(R::AX, val);
                self.advance_si(2);
            }
            Op::Movsb => {
                // Move byte from address DS:SI to ES:DI
                let val = mmu.read_u8(src_seg, self.get_r16(R::SI));
                self.advance_si(1);
                let es = self.get_r16(R::ES);
                let di = self.get_r16(R::DI);
                mmu.write_u8(es, di, val);
                self.advance_di(1);
            }
            Op::Movsw => {
                // Move word from address DS:SI to ES:DI
                let val = mmu.read_u16(src_seg, self.get_r16(R::SI));
                self.advance_si(2);
                let es = self.get_r16(R::ES);
                let di = self.get_r16(R::DI);
                mmu.write_u16(es, di, val);
                self.advance_di(2);
            }
            Op::Stosb => {
                // Store AL at address ES:DI
                let al = self.get_r8(R::AL);
                let es = self.get_r16(R::ES);
                let di = self.get_r16(R::DI);
                mmu.write_u8(es, di, al);
                self.advance_di(1);
            }
            Op::Stosw => {
                // Store AX at address ES:DI
                let ax = self.get_r16(R::AX);
                let es = self.get_r16(R::ES);
                let di = self.get_r16(R::DI);
                mmu.write_u16(es, di, ax);
                self.advance_di(2);
            }
            Op::Cmpsb => {
                // Compare byte at DS:SI with byte at ES:DI, flags as [SI] - [DI]
                let lhs = mmu.read_u8(src_seg, self.get_r16(R::SI)) as usize;
                let rhs = mmu.read_u8(self.get_r16(R::ES), self.get_r16(R::DI)) as usize;
                self.cmp8(lhs, rhs);
                self.advance_si(1);
                self.advance_di(1);
            }
            Op::Cmpsw => {
                // Compare word at DS:SI with word at ES:DI, flags as [SI] - [DI]
                let lhs = mmu.read_u16(src_seg, self.get_r16(R::SI)) as usize;
                let rhs = mmu.read_u16(self.get_r16(R::ES), self.get_r16(R::DI)) as usize;
                self.cmp16(lhs, rhs);
                self.advance_si(2);
                self.advance_di(2);
            }
            Op::Scasb => {
                // Compare AL with byte at ES:DI
                let al = self.get_r8(R::AL) as usize;
                let mem = mmu.read_u8(self.get_r16(R::ES), self.get_r16(R::DI)) as usize;
                self.cmp8(al, mem);
                self.advance_di(1);
            }
            Op::Scasw => {
                // Compare AX with word at ES:DI
                let ax = self.get_r16(R::AX) as usize;
                let mem = mmu.read_u16(self.get_r16(R::ES), self.get_r16(R::DI)) as usize;
                self.cmp16(ax, mem);
                self.advance_di(2);
            }
            _ => unreachable!("not a string op: {:?}", command),
        }
    }

    /// moves SI one element in the DF direction
    fn advance_si(&mut self, size: u16) {
        let si = if !self.regs.flags.direction {
            self.get_r16(R::SI).wrapping_add(size)
        } else {
            self.get_r16(R::SI).wrapping_sub(size)
        };
        self.set_r16(R::SI, si);
    }

    /// moves DI one element in the DF direction
    fn advance_di(&mut self, size: u16) {
        let di = if !self.regs.flags.direction {
            self.get_r16(R::DI).wrapping_add(size)
        } else {
            self.get_r16(R::DI).wrapping_sub(size)
        };
        self.set_r16(R::DI, di);
    }

    /// segment for a string source or table lookup: a consumed override, else DS
    fn source_segment(&mut self) -> u16 {
        match self.segment_override.consume() {
            Some(segment) => self.segment(segment),
            None => self.get_r16(R::DS),
        }
    }

    /// target of a far control transfer: either embedded in the
    /// instruction, or two adjacent words in memory (offset, then segment)
    fn far_target(&self, mmu: &MMU, p: &Parameter) -> (u16, u16) {
        match *p {
            Parameter::Ptr16Imm(segment, offset) => (segment, offset),
            Parameter::Ptr16(_, _) => self.read_far_pointer(mmu, p),
            _ => panic!("far transfer needs a pointer operand: {:?}", p),
        }
    }

    /// reads a 16:16 far pointer at a memory operand, used by LDS/LES
    /// and indirect far transfers
    fn read_far_pointer(&self, mmu: &MMU, p: &Parameter) -> (u16, u16) {
        match *p {
            Parameter::Ptr16(seg, off) => {
                let offset = mmu.read_u16(seg, off);
                let segment = mmu.read_u16(seg, off.wrapping_add(2));
                (segment, offset)
            }
            _ => panic!("far pointer needs a memory operand: {:?}", p),
        }
    }

    /// sets the flags like SUB, discarding the result
    pub fn cmp8(&mut self, dst: usize, src: usize) {
        let res = (Wrapping(dst) - Wrapping(src)).0;

        // The CF, OF, SF, ZF, AF, and PF flags are set according to the result.
        self.regs.flags.set_carry_u8(res);
        self.regs.flags.set_overflow_sub_u8(res, src, dst);
        self.regs.flags.set_sign_u8(res);
        self.regs.flags.set_zero_u8(res);
        self.regs.flags.set_adjust(res, src, dst);
        self.regs.flags.set_parity(res);
    }

    pub fn cmp16(&mut self, dst: usize, src: usize) {
        let res = (Wrapping(dst) - Wrapping(src)).0;

        // The CF, OF, SF, ZF, AF, and PF flags are set according to the result.
        self.regs.flags.set_carry_u16(res);
        self.regs.flags.set_overflow_sub_u16(res, src, dst);
        self.regs.flags.set_sign_u16(res);
        self.regs.flags.set_zero_u16(res);
        self.regs.flags.set_adjust(res, src, dst);
        self.regs.flags.set_parity(res);
    }

    /// used by aaa, aas
    fn adjb(&mut self, param1: i8, param2: i8) {
        if self.regs.flags.adjust || (self.get_r8(R::AL) & 0xF) > 9 {
            let al = (i16::from(self.get_r8(R::AL)) + i16::from(param1)) as u8;
            let ah = (i16::from(self.get_r8(R::AH)) + i16::from(param2)) as u8;
            self.set_r8(R::AL, al);
            self.set_r8(R::AH, ah);
            self.regs.flags.adjust = true;
            self.regs.flags.carry = true;
        } else {
            self.regs.flags.adjust = false;
            self.regs.flags.carry = false;
        }
        let al = self.get_r8(R::AL);
        self.set_r8(R::AL, al & 0x0F);
    }

    /// used by daa, das
    fn adj4(&mut self, param1: i16, param2: i16) {
        let old_al = self.get_r8(R::AL);
        let mut al = old_al;
        if (al & 0x0F) > 0x09 || self.regs.flags.adjust {
            if old_al > 0x99 || self.regs.flags.carry {
                al = (i16::from(al) + param2) as u8;
                self.regs.flags.carry = true;
            } else {
                self.regs.flags.carry = false;
            }
            al = (i16::from(al) + param1) as u8;
            self.regs.flags.adjust = true;
        } else {
            if old_al > 0x99 || self.regs.flags.carry {
                al = (i16::from(al) + param2) as u8;
                self.regs.flags.carry = true;
            } else {
                self.regs.flags.carry = false;
            }
            self.regs.flags.adjust = false;
        }
        self.set_r8(R::AL, al);
        self.regs.flags.set_sign_u8(al as usize);
        self.regs.flags.set_zero_u8(al as usize);
        self.regs.flags.set_parity(al as usize);
    }

    /// pushes a word on the stack; SP is decremented before the write
    pub fn push16(&mut self, mmu: &mut MMU, data: u16) {
        let sp = self.get_r16(R::SP).wrapping_sub(2);
        self.set_r16(R::SP, sp);
        let ss = self.get_r16(R::SS);
        mmu.write_u16(ss, sp, data);
    }

    /// pops a word off the stack; SP is incremented after the read
    pub fn pop16(&mut self, mmu: &mut MMU) -> u16 {
        let ss = self.get_r16(R::SS);
        let sp = self.get_r16(R::SP);
        let data = mmu.read_u16(ss, sp);
        self.set_r16(R::SP, sp.wrapping_add(2));
        data
    }

    pub fn read_parameter_value(&self, mmu: &MMU, p: &Parameter) -> usize {
        match *p {
            Parameter::Imm8(imm) => imm as usize,
            // 0x83-group immediates are sign-extended to 16 bits
            Parameter::ImmS8(imm) => imm as i16 as u16 as usize,
            Parameter::Imm16(imm) => imm as usize,
            Parameter::Reg8(r) => self.get_r8(r) as usize,
            Parameter::Reg16(r) |
            Parameter::SReg16(r) => self.get_r16(r) as usize,
            Parameter::Ptr8(seg, off) => mmu.read_u8(seg, off) as usize,
            Parameter::Ptr16(seg, off) => mmu.read_u16(seg, off) as usize,
            _ => panic!("read_parameter_value: unhandled parameter {:?}", p),
        }
    }

    pub fn write_parameter_u8(&mut self, mmu: &mut MMU, p: &Parameter, data: u8) {
        match *p {
            Parameter::Reg8(r) => self.set_r8(r, data),
            Parameter::Ptr8(seg, off) => mmu.write_u8(seg, off, data),
            _ => panic!("write_parameter_u8: unhandled parameter {:?}", p),
        }
    }

    pub fn write_parameter_u16(&mut self, mmu: &mut MMU, p: &Parameter, data: u16) {
        match *p {
            Parameter::Reg16(r) |
            Parameter::SReg16(r) => self.set_r16(r, data),
            Parameter::Ptr16(seg, off) => mmu.write_u16(seg, off, data),
            _ => panic!("write_parameter_u16: unhandled parameter {:?}", p),
        }
    }
}
