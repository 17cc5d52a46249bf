use crate::cpu::instruction::{Instruction, ModRegRm, RepeatMode};
use crate::cpu::op::{Invalid, Op};
use crate::cpu::parameter::{Parameter, ParameterSet};
use crate::cpu::register::{r16, r8, sr, R};
use crate::cpu::segment::Segment;
use crate::cpu::{CpuModel, CPU};
use crate::memory::MMU;

#[cfg(test)]
#[path = "./decoder_test.rs"]
mod decoder_test;

impl CPU {
    /// Decodes the instruction at CS:IP, advancing IP past the consumed
    /// bytes. Operands come out fully resolved: memory operands carry
    /// the effective segment value and 16-bit wrapped offset.
    pub fn decode(&mut self, mmu: &MMU) -> Instruction {
        let mut op = Instruction::new(Op::Uninitialized);
        let b = self.read_u8(mmu);

        match b {
            0x00 => {
                // add r/m8, r8
                op.command = Op::Add8;
                op.params = self.rm8_r8(mmu);
            }
            0x01 => {
                // add r/m16, r16
                op.command = Op::Add16;
                op.params = self.rm16_r16(mmu);
            }
            0x02 => {
                // add r8, r/m8
                op.command = Op::Add8;
                op.params = self.r8_rm8(mmu);
            }
            0x03 => {
                // add r16, r/m16
                op.command = Op::Add16;
                op.params = self.r16_rm16(mmu);
            }
            0x04 => {
                // add AL, imm8
                op.command = Op::Add8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x05 => {
                // add AX, imm16
                op.command = Op::Add16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x06 => {
                // push es
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::ES);
            }
            0x07 => {
                // pop es
                op.command = Op::Pop16;
                op.params.dst = Parameter::SReg16(R::ES);
            }
            0x08 => {
                // or r/m8, r8
                op.command = Op::Or8;
                op.params = self.rm8_r8(mmu);
            }
            0x09 => {
                // or r/m16, r16
                op.command = Op::Or16;
                op.params = self.rm16_r16(mmu);
            }
            0x0A => {
                // or r8, r/m8
                op.command = Op::Or8;
                op.params = self.r8_rm8(mmu);
            }
            0x0B => {
                // or r16, r/m16
                op.command = Op::Or16;
                op.params = self.r16_rm16(mmu);
            }
            0x0C => {
                // or AL, imm8
                op.command = Op::Or8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x0D => {
                // or AX, imm16
                op.command = Op::Or16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x0E => {
                // push cs
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::CS);
            }
            0x10 => {
                // adc r/m8, r8
                op.command = Op::Adc8;
                op.params = self.rm8_r8(mmu);
            }
            0x11 => {
                // adc r/m16, r16
                op.command = Op::Adc16;
                op.params = self.rm16_r16(mmu);
            }
            0x12 => {
                // adc r8, r/m8
                op.command = Op::Adc8;
                op.params = self.r8_rm8(mmu);
            }
            0x13 => {
                // adc r16, r/m16
                op.command = Op::Adc16;
                op.params = self.r16_rm16(mmu);
            }
            0x14 => {
                // adc AL, imm8
                op.command = Op::Adc8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x15 => {
                // adc AX, imm16
                op.command = Op::Adc16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x16 => {
                // push ss
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::SS);
            }
            0x17 => {
                // pop ss
                op.command = Op::Pop16;
                op.params.dst = Parameter::SReg16(R::SS);
            }
            0x18 => {
                // sbb r/m8, r8
                op.command = Op::Sbb8;
                op.params = self.rm8_r8(mmu);
            }
            0x19 => {
                // sbb r/m16, r16
                op.command = Op::Sbb16;
                op.params = self.rm16_r16(mmu);
            }
            0x1A => {
                // sbb r8, r/m8
                op.command = Op::Sbb8;
                op.params = self.r8_rm8(mmu);
            }
            0x1B => {
                // sbb r16, r/m16
                op.command = Op::Sbb16;
                op.params = self.r16_rm16(mmu);
            }
            0x1C => {
                // sbb AL, imm8
                op.command = Op::Sbb8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x1D => {
                // sbb AX, imm16
                op.command = Op::Sbb16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x1E => {
                // push ds
                op.command = Op::Push16;
                op.params.dst = Parameter::SReg16(R::DS);
            }
            0x1F => {
                // pop ds
                op.command = Op::Pop16;
                op.params.dst = Parameter::SReg16(R::DS);
            }
            0x20 => {
                // and r/m8, r8
                op.command = Op::And8;
                op.params = self.rm8_r8(mmu);
            }
            0x21 => {
                // and r/m16, r16
                op.command = Op::And16;
                op.params = self.rm16_r16(mmu);
            }
            0x22 => {
                // and r8, r/m8
                op.command = Op::And8;
                op.params = self.r8_rm8(mmu);
            }
            0x23 => {
                // and r16, r/m16
                op.command = Op::And16;
                op.params = self.r16_rm16(mmu);
            }
            0x24 => {
                // and AL, imm8
                op.command = Op::And8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x25 => {
                // and AX, imm16
                op.command = Op::And16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x26 => {
                // es segment prefix: arms the override, executes as its own step
                op.command = Op::SegPrefix;
                self.segment_override.arm(Segment::ES);
            }
            0x27 => op.command = Op::Daa,
            0x28 => {
                // sub r/m8, r8
                op.command = Op::Sub8;
                op.params = self.rm8_r8(mmu);
            }
            0x29 => {
                // sub r/m16, r16
                op.command = Op::Sub16;
                op.params = self.rm16_r16(mmu);
            }
            0x2A => {
                // sub r8, r/m8
                op.command = Op::Sub8;
                op.params = self.r8_rm8(mmu);
            }
            0x2B => {
                // sub r16, r/m16
                op.command = Op::Sub16;
                op.params = self.r16_rm16(mmu);
            }
            0x2C => {
                // sub AL, imm8
                op.command = Op::Sub8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x2D => {
                // sub AX, imm16
                op.command = Op::Sub16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x2E => {
                // cs segment prefix
                op.command = Op::SegPrefix;
                self.segment_override.arm(Segment::CS);
            }
            0x2F => op.command = Op::Das,
            0x30 => {
                // xor r/m8, r8
                op.command = Op::Xor8;
                op.params = self.rm8_r8(mmu);
            }
            0x31 => {
                // xor r/m16, r16
                op.command = Op::Xor16;
                op.params = self.rm16_r16(mmu);
            }
            0x32 => {
                // xor r8, r/m8
                op.command = Op::Xor8;
                op.params = self.r8_rm8(mmu);
            }
            0x33 => {
                // xor r16, r/m16
                op.command = Op::Xor16;
                op.params = self.r16_rm16(mmu);
            }
            0x34 => {
                // xor AL, imm8
                op.command = Op::Xor8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x35 => {
                // xor AX, imm16
                op.command = Op::Xor16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x36 => {
                // ss segment prefix
                op.command = Op::SegPrefix;
                self.segment_override.arm(Segment::SS);
            }
            0x37 => op.command = Op::Aaa,
            0x38 => {
                // cmp r/m8, r8
                op.command = Op::Cmp8;
                op.params = self.rm8_r8(mmu);
            }
            0x39 => {
                // cmp r/m16, r16
                op.command = Op::Cmp16;
                op.params = self.rm16_r16(mmu);
            }
            0x3A => {
                // cmp r8, r/m8
                op.command = Op::Cmp8;
                op.params = self.r8_rm8(mmu);
            }
            0x3B => {
                // cmp r16, r/m16
                op.command = Op::Cmp16;
                op.params = self.r16_rm16(mmu);
            }
            0x3C => {
                // cmp AL, imm8
                op.command = Op::Cmp8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0x3D => {
                // cmp AX, imm16
                op.command = Op::Cmp16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0x3E => {
                // ds segment prefix
                op.command = Op::SegPrefix;
                self.segment_override.arm(Segment::DS);
            }
            0x3F => op.command = Op::Aas,
            0x40..=0x47 => {
                // inc r16
                op.command = Op::Inc16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x48..=0x4F => {
                // dec r16
                op.command = Op::Dec16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x50..=0x57 => {
                // push r16
                op.command = Op::Push16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x58..=0x5F => {
                // pop r16
                op.command = Op::Pop16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
            }
            0x70 => {
                // jo rel8
                op.command = Op::Jo;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x71 => {
                // jno rel8
                op.command = Op::Jno;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x72 => {
                // jc rel8
                op.command = Op::Jc;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x73 => {
                // jnc rel8
                op.command = Op::Jnc;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x74 => {
                // jz rel8
                op.command = Op::Jz;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x75 => {
                // jnz rel8
                op.command = Op::Jnz;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x76 => {
                // jna rel8
                op.command = Op::Jna;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x77 => {
                // ja rel8
                op.command = Op::Ja;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x78 => {
                // js rel8
                op.command = Op::Js;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x79 => {
                // jns rel8
                op.command = Op::Jns;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7A => {
                // jpe rel8    (alias: jp)
                op.command = Op::Jpe;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7B => {
                // jpo rel8    (alias: jnp)
                op.command = Op::Jpo;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7C => {
                // jl rel8
                op.command = Op::Jl;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7D => {
                // jnl rel8
                op.command = Op::Jnl;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7E => {
                // jng rel8
                op.command = Op::Jng;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x7F => {
                // jg rel8
                op.command = Op::Jg;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0x80 | 0x82 => {
                // <arithmetic> r/m8, imm8
                // 0x82 is an alias of 0x80 on the 8086
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
                op.command = match x.reg {
                    0 => Op::Add8,
                    1 => Op::Or8,
                    2 => Op::Adc8,
                    3 => Op::Sbb8,
                    4 => Op::And8,
                    5 => Op::Sub8,
                    6 => Op::Xor8,
                    7 => Op::Cmp8,
                    _ => unreachable!(),
                };
            }
            0x81 => {
                // <arithmetic> r/m16, imm16
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
                op.command = match x.reg {
                    0 => Op::Add16,
                    1 => Op::Or16,
                    2 => Op::Adc16,
                    3 => Op::Sbb16,
                    4 => Op::And16,
                    5 => Op::Sub16,
                    6 => Op::Xor16,
                    7 => Op::Cmp16,
                    _ => unreachable!(),
                };
            }
            0x83 => {
                // <arithmetic> r/m16, imm8 (sign-extended)
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                op.params.src = Parameter::ImmS8(self.read_s8(mmu));
                op.command = match x.reg {
                    0 => Op::Add16,
                    2 => Op::Adc16,
                    3 => Op::Sbb16,
                    5 => Op::Sub16,
                    7 => Op::Cmp16,
                    // the sign-extended OR/AND/XOR variants are a 80186 addition
                    1 if self.model == CpuModel::Intel80186 => Op::Or16,
                    4 if self.model == CpuModel::Intel80186 => Op::And16,
                    6 if self.model == CpuModel::Intel80186 => Op::Xor16,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Undefined),
                };
            }
            0x84 => {
                // test r/m8, r8
                op.command = Op::Test8;
                op.params = self.rm8_r8(mmu);
            }
            0x85 => {
                // test r/m16, r16
                op.command = Op::Test16;
                op.params = self.rm16_r16(mmu);
            }
            0x86 => {
                // xchg r8, r/m8
                op.command = Op::Xchg8;
                op.params = self.r8_rm8(mmu);
            }
            0x87 => {
                // xchg r16, r/m16
                op.command = Op::Xchg16;
                op.params = self.r16_rm16(mmu);
            }
            0x88 => {
                // mov r/m8, r8
                op.command = Op::Mov8;
                op.params = self.rm8_r8(mmu);
            }
            0x89 => {
                // mov r/m16, r16
                op.command = Op::Mov16;
                op.params = self.rm16_r16(mmu);
            }
            0x8A => {
                // mov r8, r/m8
                op.command = Op::Mov8;
                op.params = self.r8_rm8(mmu);
            }
            0x8B => {
                // mov r16, r/m16
                op.command = Op::Mov16;
                op.params = self.r16_rm16(mmu);
            }
            0x8C => {
                // mov r/m16, sreg    (the reg field wraps past DS on the 8086)
                let x = self.read_mod_reg_rm(mmu);
                op.command = Op::Mov16;
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                op.params.src = Parameter::SReg16(sr(x.reg & 3));
            }
            0x8D => {
                // lea r16, m
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = Parameter::Reg16(r16(x.reg));
                op.params.src = self.rm16(mmu, x.rm, x.md);
                op.command = if op.params.src.is_ptr() {
                    Op::Lea16
                } else {
                    // register operand is not a valid effective address
                    Op::Invalid(vec![b, x.u8()], Invalid::Undefined)
                };
            }
            0x8E => {
                // mov sreg, r/m16
                let x = self.read_mod_reg_rm(mmu);
                op.command = Op::Mov16;
                op.params.dst = Parameter::SReg16(sr(x.reg & 3));
                op.params.src = self.rm16(mmu, x.rm, x.md);
            }
            0x8F => {
                // pop r/m16
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                op.command = match x.reg {
                    0 => Op::Pop16,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0x90 => op.command = Op::Nop,
            0x91..=0x97 => {
                // xchg AX, r16
                op.command = Op::Xchg16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Reg16(r16(b & 7));
            }
            0x98 => op.command = Op::Cbw,
            0x99 => op.command = Op::Cwd,
            0x9A => {
                // call ptr16:16
                op.command = Op::CallFar;
                let offset = self.read_u16(mmu);
                let segment = self.read_u16(mmu);
                op.params.dst = Parameter::Ptr16Imm(segment, offset);
            }
            0x9B => {
                // wait: needs a coprocessor model to do anything useful
                op.command = Op::Invalid(vec![b], Invalid::Unimplemented);
            }
            0x9C => op.command = Op::Pushf,
            0x9D => op.command = Op::Popf,
            0x9E => op.command = Op::Sahf,
            0x9F => op.command = Op::Lahf,
            0xA0 => {
                // mov AL, [moffs16]
                op.command = Op::Mov8;
                op.params.dst = Parameter::Reg8(R::AL);
                let offset = self.read_u16(mmu);
                op.params.src = Parameter::Ptr8(self.mem_segment(Segment::DS), offset);
            }
            0xA1 => {
                // mov AX, [moffs16]
                op.command = Op::Mov16;
                op.params.dst = Parameter::Reg16(R::AX);
                let offset = self.read_u16(mmu);
                op.params.src = Parameter::Ptr16(self.mem_segment(Segment::DS), offset);
            }
            0xA2 => {
                // mov [moffs16], AL
                op.command = Op::Mov8;
                let offset = self.read_u16(mmu);
                op.params.dst = Parameter::Ptr8(self.mem_segment(Segment::DS), offset);
                op.params.src = Parameter::Reg8(R::AL);
            }
            0xA3 => {
                // mov [moffs16], AX
                op.command = Op::Mov16;
                let offset = self.read_u16(mmu);
                op.params.dst = Parameter::Ptr16(self.mem_segment(Segment::DS), offset);
                op.params.src = Parameter::Reg16(R::AX);
            }
            0xA4 => op.command = Op::Movsb,
            0xA5 => op.command = Op::Movsw,
            0xA6 => op.command = Op::Cmpsb,
            0xA7 => op.command = Op::Cmpsw,
            0xA8 => {
                // test AL, imm8
                op.command = Op::Test8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xA9 => {
                // test AX, imm16
                op.command = Op::Test16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0xAA => op.command = Op::Stosb,
            0xAB => op.command = Op::Stosw,
            0xAC => op.command = Op::Lodsb,
            0xAD => op.command = Op::Lodsw,
            0xAE => op.command = Op::Scasb,
            0xAF => op.command = Op::Scasw,
            0xB0..=0xB7 => {
                // mov r8, imm8
                op.command = Op::Mov8;
                op.params.dst = Parameter::Reg8(r8(b & 7));
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xB8..=0xBF => {
                // mov r16, imm16
                op.command = Op::Mov16;
                op.params.dst = Parameter::Reg16(r16(b & 7));
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
            }
            0xC0 if self.model == CpuModel::Intel80186 => {
                // <shift> r/m8, imm8    (80186)
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
                op.command = match x.reg {
                    0 => Op::Rol8,
                    1 => Op::Ror8,
                    2 => Op::Rcl8,
                    3 => Op::Rcr8,
                    4 => Op::Shl8,
                    5 => Op::Shr8,
                    7 => Op::Sar8,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xC1 if self.model == CpuModel::Intel80186 => {
                // <shift> r/m16, imm8    (80186)
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
                op.command = match x.reg {
                    0 => Op::Rol16,
                    1 => Op::Ror16,
                    2 => Op::Rcl16,
                    3 => Op::Rcr16,
                    4 => Op::Shl16,
                    5 => Op::Shr16,
                    7 => Op::Sar16,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xC2 => {
                // ret [near] imm16
                op.command = Op::Retn;
                op.params.dst = Parameter::Imm16(self.read_u16(mmu));
            }
            0xC3 => op.command = Op::Retn, // ret [near]
            0xC4 => {
                // les r16, m16
                op.params = self.r16_rm16(mmu);
                op.command = if op.params.src.is_ptr() {
                    Op::Les
                } else {
                    Op::Invalid(vec![b], Invalid::Undefined)
                };
            }
            0xC5 => {
                // lds r16, m16
                op.params = self.r16_rm16(mmu);
                op.command = if op.params.src.is_ptr() {
                    Op::Lds
                } else {
                    Op::Invalid(vec![b], Invalid::Undefined)
                };
            }
            0xC6 => {
                // mov r/m8, imm8
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, x.rm, x.md);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
                op.command = match x.reg {
                    0 => Op::Mov8,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xC7 => {
                // mov r/m16, imm16
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                op.params.src = Parameter::Imm16(self.read_u16(mmu));
                op.command = match x.reg {
                    0 => Op::Mov16,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xCA => {
                // ret [far] imm16
                op.command = Op::Retf;
                op.params.dst = Parameter::Imm16(self.read_u16(mmu));
            }
            0xCB => op.command = Op::Retf,
            0xCC => {
                // int3
                op.command = Op::Int;
                op.params.dst = Parameter::Imm8(3);
            }
            0xCD => {
                // int imm8
                op.command = Op::Int;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
            }
            0xCE => op.command = Op::Into,
            0xCF => op.command = Op::Iret,
            0xD0 => {
                // <shift> r/m8, 1
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, x.rm, x.md);
                op.params.src = Parameter::Imm8(1);
                op.command = match x.reg {
                    0 => Op::Rol8,
                    1 => Op::Ror8,
                    2 => Op::Rcl8,
                    3 => Op::Rcr8,
                    4 => Op::Shl8,
                    5 => Op::Shr8,
                    7 => Op::Sar8,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xD1 => {
                // <shift> r/m16, 1
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                op.params.src = Parameter::Imm8(1);
                op.command = match x.reg {
                    0 => Op::Rol16,
                    1 => Op::Ror16,
                    2 => Op::Rcl16,
                    3 => Op::Rcr16,
                    4 => Op::Shl16,
                    5 => Op::Shr16,
                    7 => Op::Sar16,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xD2 => {
                // <shift> r/m8, CL
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, x.rm, x.md);
                op.params.src = Parameter::Reg8(R::CL);
                op.command = match x.reg {
                    0 => Op::Rol8,
                    1 => Op::Ror8,
                    2 => Op::Rcl8,
                    3 => Op::Rcr8,
                    4 => Op::Shl8,
                    5 => Op::Shr8,
                    7 => Op::Sar8,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xD3 => {
                // <shift> r/m16, CL
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                op.params.src = Parameter::Reg8(R::CL);
                op.command = match x.reg {
                    0 => Op::Rol16,
                    1 => Op::Ror16,
                    2 => Op::Rcl16,
                    3 => Op::Rcr16,
                    4 => Op::Shl16,
                    5 => Op::Shr16,
                    7 => Op::Sar16,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xD4 => {
                // aam imm8
                op.command = Op::Aam;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
            }
            0xD5 => {
                // aad imm8
                op.command = Op::Aad;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
            }
            0xD7 => op.command = Op::Xlatb,
            0xD8..=0xDF => {
                // FPU escape: consume the addressing bytes, execute nothing
                let x = self.read_mod_reg_rm(mmu);
                if x.md != 3 {
                    let _ = self.effective_address(mmu, x.md, x.rm);
                }
                op.command = Op::Esc;
            }
            0xE0 => {
                // loopne rel8
                op.command = Op::Loopne;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE1 => {
                // loope rel8
                op.command = Op::Loope;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE2 => {
                // loop rel8
                op.command = Op::Loop;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE3 => {
                // jcxz rel8
                op.command = Op::Jcxz;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xE4 => {
                // in AL, imm8
                op.command = Op::In8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xE5 => {
                // in AX, imm8
                op.command = Op::In16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Imm8(self.read_u8(mmu));
            }
            0xE6 => {
                // out imm8, AL
                op.command = Op::Out8;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
                op.params.src = Parameter::Reg8(R::AL);
            }
            0xE7 => {
                // out imm8, AX
                op.command = Op::Out16;
                op.params.dst = Parameter::Imm8(self.read_u8(mmu));
                op.params.src = Parameter::Reg16(R::AX);
            }
            0xE8 => {
                // call rel16
                op.command = Op::CallNear;
                op.params.dst = Parameter::Imm16(self.read_rel16(mmu));
            }
            0xE9 => {
                // jmp rel16
                op.command = Op::JmpNear;
                op.params.dst = Parameter::Imm16(self.read_rel16(mmu));
            }
            0xEA => {
                // jmp ptr16:16
                op.command = Op::JmpFar;
                let offset = self.read_u16(mmu);
                let segment = self.read_u16(mmu);
                op.params.dst = Parameter::Ptr16Imm(segment, offset);
            }
            0xEB => {
                // jmp short rel8
                op.command = Op::JmpShort;
                op.params.dst = Parameter::Imm16(self.read_rel8(mmu));
            }
            0xEC => {
                // in AL, DX
                op.command = Op::In8;
                op.params.dst = Parameter::Reg8(R::AL);
                op.params.src = Parameter::Reg16(R::DX);
            }
            0xED => {
                // in AX, DX
                op.command = Op::In16;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Reg16(R::DX);
            }
            0xEE => {
                // out DX, AL
                op.command = Op::Out8;
                op.params.dst = Parameter::Reg16(R::DX);
                op.params.src = Parameter::Reg8(R::AL);
            }
            0xEF => {
                // out DX, AX
                op.command = Op::Out16;
                op.params.dst = Parameter::Reg16(R::DX);
                op.params.src = Parameter::Reg16(R::AX);
            }
            0xF0 => {
                // lock prefix: no concurrent bus, so nothing to lock
                op.command = Op::Lock;
            }
            0xF2 => {
                // repne prefix: dispatch a repeat variant of the string op
                op = self.decode(mmu);
                match op.command {
                    Op::Cmpsb | Op::Cmpsw | Op::Scasb | Op::Scasw |
                    Op::Movsb | Op::Movsw | Op::Stosb | Op::Stosw |
                    Op::Lodsb | Op::Lodsw => op.repeat = RepeatMode::Repne,
                    _ => op.command = Op::Invalid(vec![b], Invalid::Undefined),
                }
            }
            0xF3 => {
                // rep / repe prefix
                op = self.decode(mmu);
                match op.command {
                    Op::Movsb | Op::Movsw | Op::Stosb | Op::Stosw |
                    Op::Lodsb | Op::Lodsw => op.repeat = RepeatMode::Rep,
                    Op::Cmpsb | Op::Cmpsw | Op::Scasb | Op::Scasw => op.repeat = RepeatMode::Repe,
                    _ => op.command = Op::Invalid(vec![b], Invalid::Undefined),
                }
            }
            0xF4 => op.command = Op::Hlt,
            0xF5 => op.command = Op::Cmc,
            0xF6 => {
                // <math> r/m8
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, x.rm, x.md);
                match x.reg {
                    0 | 1 => {
                        // test r/m8, imm8
                        op.command = Op::Test8;
                        op.params.src = Parameter::Imm8(self.read_u8(mmu));
                    }
                    2 => op.command = Op::Not8,
                    3 => op.command = Op::Neg8,
                    4 => op.command = Op::Mul8,
                    5 => op.command = Op::Imul8,
                    6 => op.command = Op::Div8,
                    7 => op.command = Op::Idiv8,
                    _ => unreachable!(),
                }
            }
            0xF7 => {
                // <math> r/m16
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                match x.reg {
                    0 | 1 => {
                        // test r/m16, imm16
                        op.command = Op::Test16;
                        op.params.src = Parameter::Imm16(self.read_u16(mmu));
                    }
                    2 => op.command = Op::Not16,
                    3 => op.command = Op::Neg16,
                    4 => op.command = Op::Mul16,
                    5 => op.command = Op::Imul16,
                    6 => op.command = Op::Div16,
                    7 => op.command = Op::Idiv16,
                    _ => unreachable!(),
                }
            }
            0xF8 => op.command = Op::Clc,
            0xF9 => op.command = Op::Stc,
            0xFA => op.command = Op::Cli,
            0xFB => op.command = Op::Sti,
            0xFC => op.command = Op::Cld,
            0xFD => op.command = Op::Std,
            0xFE => {
                // inc/dec r/m8
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm8(mmu, x.rm, x.md);
                op.command = match x.reg {
                    0 => Op::Inc8,
                    1 => Op::Dec8,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            0xFF => {
                // inc/dec/call/jmp/push r/m16
                let x = self.read_mod_reg_rm(mmu);
                op.params.dst = self.rm16(mmu, x.rm, x.md);
                op.command = match x.reg {
                    0 => Op::Inc16,
                    1 => Op::Dec16,
                    2 => Op::CallNear,
                    // far transfers need a memory operand for the pointer
                    3 if op.params.dst.is_ptr() => Op::CallFar,
                    4 => Op::JmpNear,
                    5 if op.params.dst.is_ptr() => Op::JmpFar,
                    3 | 5 => Op::Invalid(vec![b, x.u8()], Invalid::Undefined),
                    6 => Op::Push16,
                    _ => Op::Invalid(vec![b, x.u8()], Invalid::Reg(x.reg)),
                };
            }
            // undefined on both emulated CPU generations; 0x60..0x6F
            // only gained encodings on the 286 and later
            0x0F | 0x60..=0x6F | 0xC8 | 0xC9 | 0xD6 | 0xF1 => {
                op.command = Op::Invalid(vec![b], Invalid::Undefined);
            }
            // 0xC0/0xC1 reach here in strict 8086 mode
            _ => op.command = Op::Invalid(vec![b], Invalid::Undefined),
        }
        op
    }

    /// decode r8, r/m8
    fn r8_rm8(&mut self, mmu: &MMU) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: Parameter::Reg8(r8(x.reg)),
            src: self.rm8(mmu, x.rm, x.md),
        }
    }

    /// decode r/m8, r8
    fn rm8_r8(&mut self, mmu: &MMU) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: self.rm8(mmu, x.rm, x.md),
            src: Parameter::Reg8(r8(x.reg)),
        }
    }

    /// decode r16, r/m16
    fn r16_rm16(&mut self, mmu: &MMU) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: Parameter::Reg16(r16(x.reg)),
            src: self.rm16(mmu, x.rm, x.md),
        }
    }

    /// decode r/m16, r16
    fn rm16_r16(&mut self, mmu: &MMU) -> ParameterSet {
        let x = self.read_mod_reg_rm(mmu);
        ParameterSet {
            dst: self.rm16(mmu, x.rm, x.md),
            src: Parameter::Reg16(r16(x.reg)),
        }
    }

    /// decode rm8
    fn rm8(&mut self, mmu: &MMU, rm: u8, md: u8) -> Parameter {
        match md {
            3 => Parameter::Reg8(r8(rm)),
            _ => {
                let (segment, offset) = self.effective_address(mmu, md, rm);
                Parameter::Ptr8(segment, offset)
            }
        }
    }

    /// decode rm16
    fn rm16(&mut self, mmu: &MMU, rm: u8, md: u8) -> Parameter {
        match md {
            3 => Parameter::Reg16(r16(rm)),
            _ => {
                let (segment, offset) = self.effective_address(mmu, md, rm);
                Parameter::Ptr16(segment, offset)
            }
        }
    }

    /// Resolves the ModR/M addressing form to a (segment value, offset)
    /// pair, reading any displacement bytes from the instruction stream.
    ///
    /// The default segment is DS, except for the forms involving BP,
    /// which default to SS. An armed segment-override prefix replaces
    /// the default and is consumed here. Offset arithmetic wraps at
    /// 16 bits.
    fn effective_address(&mut self, mmu: &MMU, md: u8, rm: u8) -> (u16, u16) {
        let (default_segment, base) = match rm {
            0 => (Segment::DS, self.get_r16(R::BX).wrapping_add(self.get_r16(R::SI))),
            1 => (Segment::DS, self.get_r16(R::BX).wrapping_add(self.get_r16(R::DI))),
            2 => (Segment::SS, self.get_r16(R::BP).wrapping_add(self.get_r16(R::SI))),
            3 => (Segment::SS, self.get_r16(R::BP).wrapping_add(self.get_r16(R::DI))),
            4 => (Segment::DS, self.get_r16(R::SI)),
            5 => (Segment::DS, self.get_r16(R::DI)),
            6 if md == 0 => (Segment::DS, 0), // [disp16] direct address
            6 => (Segment::SS, self.get_r16(R::BP)),
            7 => (Segment::DS, self.get_r16(R::BX)),
            _ => unreachable!(),
        };
        let offset = match md {
            0 => {
                if rm == 6 {
                    self.read_u16(mmu)
                } else {
                    base
                }
            }
            1 => base.wrapping_add(self.read_s8(mmu) as u16), // sign-extended disp8
            2 => base.wrapping_add(self.read_u16(mmu)),
            _ => unreachable!("effective_address in register mode"),
        };
        (self.mem_segment(default_segment), offset)
    }

    /// segment value for a memory operand: a consumed override, or the default
    fn mem_segment(&mut self, default: Segment) -> u16 {
        match self.segment_override.consume() {
            Some(segment) => self.segment(segment),
            None => self.segment(default),
        }
    }

    fn read_mod_reg_rm(&mut self, mmu: &MMU) -> ModRegRm {
        let b = self.read_u8(mmu);
        ModRegRm {
            md: b >> 6,        // high 2 bits
            reg: (b >> 3) & 7, // mid 3 bits
            rm: b & 7,         // low 3 bits
        }
    }

    fn read_rel8(&mut self, mmu: &MMU) -> u16 {
        let val = self.read_s8(mmu);
        (self.regs.ip as i16).wrapping_add(i16::from(val)) as u16
    }

    fn read_rel16(&mut self, mmu: &MMU) -> u16 {
        let val = self.read_s16(mmu);
        (self.regs.ip as i16).wrapping_add(val) as u16
    }

    /// fetches the next instruction byte at CS:IP, advancing IP
    fn read_u8(&mut self, mmu: &MMU) -> u8 {
        let cs = self.get_r16(R::CS);
        let b = mmu.read_u8(cs, self.regs.ip);
        self.regs.ip = self.regs.ip.wrapping_add(1);
        b
    }

    fn read_u16(&mut self, mmu: &MMU) -> u16 {
        let lo = self.read_u8(mmu);
        let hi = self.read_u8(mmu);
        u16::from(hi) << 8 | u16::from(lo)
    }

    fn read_s8(&mut self, mmu: &MMU) -> i8 {
        self.read_u8(mmu) as i8
    }

    fn read_s16(&mut self, mmu: &MMU) -> i16 {
        self.read_u16(mmu) as i16
    }
}
