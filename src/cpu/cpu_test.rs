use std::collections::VecDeque;

use pretty_assertions::assert_eq;

use crate::cpu::{CpuModel, Fault, SegmentOverride, CPU, R};
use crate::io::IoBus;
use crate::memory::{MemoryAddress, MMU};

/// I/O manager double: scripted port reads, recorded writes, and a
/// poke-able interrupt queue.
#[derive(Default)]
struct TestIo {
    pending: VecDeque<u8>,
    in8_value: u8,
    in16_value: u16,
    out8_log: Vec<(u16, u8)>,
    out16_log: Vec<(u16, u16)>,
}

impl IoBus for TestIo {
    fn in_u8(&mut self, _port: u16) -> u8 {
        self.in8_value
    }

    fn in_u16(&mut self, _port: u16) -> u16 {
        self.in16_value
    }

    fn out_u8(&mut self, port: u16, data: u8) {
        self.out8_log.push((port, data));
    }

    fn out_u16(&mut self, port: u16, data: u16) {
        self.out16_log.push((port, data));
    }

    fn has_pending_interrupt(&self) -> bool {
        !self.pending.is_empty()
    }

    fn take_pending_interrupt(&mut self) -> u8 {
        self.pending.pop_front().unwrap()
    }
}

const CODE_SEG: u16 = 0x085F;

/// loads a code image at a fixed CS:0x0100 with a separate stack segment
fn boot(code: &[u8]) -> (CPU, MMU, TestIo) {
    let mut cpu = CPU::default();
    let mut mmu = MMU::default();
    cpu.set_r16(R::CS, CODE_SEG);
    cpu.set_r16(R::DS, CODE_SEG);
    cpu.set_r16(R::ES, CODE_SEG);
    cpu.set_r16(R::SS, 0x0800);
    cpu.set_r16(R::SP, 0xFFFE);
    cpu.regs.ip = 0x0100;
    mmu.write(CODE_SEG, 0x0100, code);
    (cpu, mmu, TestIo::default())
}

fn step_n(cpu: &mut CPU, mmu: &mut MMU, io: &mut TestIo, n: usize) {
    for _ in 0..n {
        cpu.step(mmu, io).unwrap();
    }
}

#[test]
fn can_execute_add16_flags() {
    let code: Vec<u8> = vec![
        0x01, 0xD8, // add ax,bx
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::AX, 0x7FFF);
    cpu.set_r16(R::BX, 0x0001);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(0x8000, cpu.get_r16(R::AX));
    assert_eq!(true, cpu.regs.flags.overflow);
    assert_eq!(true, cpu.regs.flags.sign);
    assert_eq!(false, cpu.regs.flags.zero);
    assert_eq!(false, cpu.regs.flags.carry);
    assert_eq!(true, cpu.regs.flags.parity);
}

#[test]
fn can_execute_sub8_borrow() {
    let code: Vec<u8> = vec![
        0x28, 0xD8, // sub al,bl
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0x00);
    cpu.set_r8(R::BL, 0x01);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(0xFF, cpu.get_r8(R::AL));
    assert_eq!(true, cpu.regs.flags.carry);
    assert_eq!(false, cpu.regs.flags.overflow);
    assert_eq!(true, cpu.regs.flags.sign);
    assert_eq!(false, cpu.regs.flags.zero);
}

#[test]
fn can_execute_mul8() {
    let code: Vec<u8> = vec![
        0xF6, 0xE3, // mul bl
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0xFF);
    cpu.set_r8(R::BL, 0xFF);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(0xFE01, cpu.get_r16(R::AX));
    assert_eq!(true, cpu.regs.flags.carry);
    assert_eq!(true, cpu.regs.flags.overflow);
}

#[test]
fn div_by_zero_raises_internal_interrupt() {
    let code: Vec<u8> = vec![
        0xF6, 0xF3, // div bl
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write_vec(0, MemoryAddress::new(0x2000, 0x0400));
    cpu.set_r16(R::AX, 0x1234);
    cpu.set_r8(R::BL, 0x00);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    // the fault is latched, AX untouched, and nothing serviced yet
    assert_eq!(Some(0), cpu.pending_interrupt);
    assert_eq!(0x1234, cpu.get_r16(R::AX));
    assert_eq!(CODE_SEG, cpu.get_r16(R::CS));

    let flags_before = cpu.regs.flags.u16();
    let return_ip = cpu.regs.ip;
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    // now the handler runs, with FLAGS, CS and IP on the stack
    assert_eq!(None, cpu.pending_interrupt);
    assert_eq!(0x2000, cpu.get_r16(R::CS));
    assert_eq!(0x0400, cpu.regs.ip);
    let sp = cpu.get_r16(R::SP);
    assert_eq!(return_ip, mmu.read_u16(0x0800, sp));
    assert_eq!(CODE_SEG, mmu.read_u16(0x0800, sp + 2));
    assert_eq!(flags_before, mmu.read_u16(0x0800, sp + 4));
}

#[test]
fn div_quotient_overflow_raises_internal_interrupt() {
    let code: Vec<u8> = vec![
        0xF6, 0xF3, // div bl
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::AX, 0x0200);
    cpu.set_r8(R::BL, 0x01);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(Some(0), cpu.pending_interrupt);
    assert_eq!(0x0200, cpu.get_r16(R::AX));
}

#[test]
fn aam_zero_raises_internal_interrupt() {
    let code: Vec<u8> = vec![
        0xD4, 0x00, // aam 0
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0x25);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(Some(0), cpu.pending_interrupt);
    assert_eq!(0x25, cpu.get_r8(R::AL));
}

#[test]
fn can_execute_rep_movsw() {
    let code: Vec<u8> = vec![
        0xF3, 0xA5, // rep movsw
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write(CODE_SEG, 0x0200, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    cpu.set_r16(R::CX, 3);
    cpu.set_r16(R::SI, 0x0200);
    cpu.set_r16(R::DI, 0x0300);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0, cpu.get_r16(R::CX));
    assert_eq!(0x0206, cpu.get_r16(R::SI));
    assert_eq!(0x0306, cpu.get_r16(R::DI));
    assert_eq!(vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66], mmu.read(CODE_SEG, 0x0300, 6));
}

#[test]
fn rep_with_zero_count_is_a_no_op() {
    let code: Vec<u8> = vec![
        0xF3, 0xA4, // rep movsb
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::CX, 0);
    cpu.set_r16(R::SI, 0x0200);
    cpu.set_r16(R::DI, 0x0300);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(0, cpu.get_r16(R::CX));
    assert_eq!(0x0200, cpu.get_r16(R::SI));
    assert_eq!(0x0300, cpu.get_r16(R::DI));
}

#[test]
fn can_execute_jmp_far() {
    let code: Vec<u8> = vec![
        0xEA, 0x00, 0x10, 0x00, 0x20, // jmp 0x2000:0x1000
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(0x2000, cpu.get_r16(R::CS));
    assert_eq!(0x1000, cpu.regs.ip);
}

#[test]
fn pushf_popf_roundtrip() {
    let code: Vec<u8> = vec![
        0x9C,             // pushf
        0xB8, 0x00, 0x00, // mov ax,0x0
        0x9D,             // popf
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.regs.flags.set_u16(0x0246);
    let sp_before = cpu.get_r16(R::SP);
    step_n(&mut cpu, &mut mmu, &mut io, 3);

    assert_eq!(0x0246, cpu.regs.flags.u16());
    assert_eq!(sp_before, cpu.get_r16(R::SP));
}

#[test]
fn inc_dec_preserve_carry() {
    let code: Vec<u8> = vec![
        0x40, // inc ax
        0x48, // dec ax
        0xFE, 0xC3, // inc bl
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.regs.flags.carry = true;
    cpu.set_r16(R::AX, 0xFFFF);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x0000, cpu.get_r16(R::AX));
    assert_eq!(true, cpu.regs.flags.zero);
    assert_eq!(true, cpu.regs.flags.carry);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0xFFFF, cpu.get_r16(R::AX));
    assert_eq!(true, cpu.regs.flags.carry);

    cpu.regs.flags.carry = false;
    cpu.set_r8(R::BL, 0xFF);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x00, cpu.get_r8(R::BL));
    assert_eq!(false, cpu.regs.flags.carry);
}

#[test]
fn mov_between_registers_preserves_flags() {
    let code: Vec<u8> = vec![
        0x89, 0xD8, // mov ax,bx
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::BX, 0xBEEF);
    cpu.regs.flags.set_u16(0x0AD7);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(0xBEEF, cpu.get_r16(R::AX));
    assert_eq!(cpu.get_r16(R::BX), cpu.get_r16(R::AX));
    assert_eq!(0x0AD7, cpu.regs.flags.u16());
}

#[test]
fn can_execute_push_pop() {
    let code: Vec<u8> = vec![
        0xB8, 0x88, 0x88, // mov ax,0x8888
        0x50,             // push ax
        0x5B,             // pop bx
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    let sp_before = cpu.get_r16(R::SP);

    step_n(&mut cpu, &mut mmu, &mut io, 2);
    assert_eq!(sp_before - 2, cpu.get_r16(R::SP));
    // the pushed word is readable at SS:SP
    assert_eq!(0x8888, mmu.read_u16(0x0800, cpu.get_r16(R::SP)));

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(sp_before, cpu.get_r16(R::SP));
    assert_eq!(0x8888, cpu.get_r16(R::BX));
}

#[test]
fn string_ops_follow_the_direction_flag() {
    let code: Vec<u8> = vec![
        0xAC, // lodsb
        0xFD, // std
        0xAC, // lodsb
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write(CODE_SEG, 0x0200, &[0xAA, 0xBB]);
    cpu.set_r16(R::SI, 0x0200);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0xAA, cpu.get_r8(R::AL));
    assert_eq!(0x0201, cpu.get_r16(R::SI));

    step_n(&mut cpu, &mut mmu, &mut io, 2);
    assert_eq!(0xBB, cpu.get_r8(R::AL));
    assert_eq!(0x0200, cpu.get_r16(R::SI));
}

#[test]
fn can_execute_rep_stosb() {
    let code: Vec<u8> = vec![
        0xF3, 0xAA, // rep stosb
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0x5A);
    cpu.set_r16(R::CX, 5);
    cpu.set_r16(R::DI, 0x0300);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(0, cpu.get_r16(R::CX));
    assert_eq!(0x0305, cpu.get_r16(R::DI));
    assert_eq!(vec![0x5A; 5], mmu.read(CODE_SEG, 0x0300, 5));
}

#[test]
fn repne_scasb_finds_a_byte() {
    let code: Vec<u8> = vec![
        0xF2, 0xAE, // repne scasb
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write(CODE_SEG, 0x0300, &[0x11, 0x22, 0x33, 0x44]);
    cpu.set_r8(R::AL, 0x33);
    cpu.set_r16(R::CX, 8);
    cpu.set_r16(R::DI, 0x0300);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    // stops one element past the match
    assert_eq!(5, cpu.get_r16(R::CX));
    assert_eq!(0x0303, cpu.get_r16(R::DI));
    assert_eq!(true, cpu.regs.flags.zero);
}

#[test]
fn repe_cmpsw_compares_equal_regions() {
    let code: Vec<u8> = vec![
        0xF3, 0xA7, // repe cmpsw
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write(CODE_SEG, 0x0200, &[0x01, 0x02, 0x03, 0x04]);
    mmu.write(CODE_SEG, 0x0300, &[0x01, 0x02, 0x03, 0x04]);
    cpu.set_r16(R::CX, 2);
    cpu.set_r16(R::SI, 0x0200);
    cpu.set_r16(R::DI, 0x0300);
    step_n(&mut cpu, &mut mmu, &mut io, 1);

    assert_eq!(0, cpu.get_r16(R::CX));
    assert_eq!(true, cpu.regs.flags.zero);
}

#[test]
fn int_iret_restores_state() {
    let code: Vec<u8> = vec![
        0xCD, 0x21, // int 0x21
        0x90,       // nop
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write_vec(0x21, MemoryAddress::new(0x2000, 0x0010));
    mmu.write(0x2000, 0x0010, &[0xCF]); // iret
    cpu.regs.flags.interrupt = true;
    let flags_before = cpu.regs.flags.u16();
    let sp_before = cpu.get_r16(R::SP);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x2000, cpu.get_r16(R::CS));
    assert_eq!(0x0010, cpu.regs.ip);
    assert_eq!(false, cpu.regs.flags.interrupt);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(CODE_SEG, cpu.get_r16(R::CS));
    assert_eq!(0x0102, cpu.regs.ip);
    assert_eq!(flags_before, cpu.regs.flags.u16());
    assert_eq!(sp_before, cpu.get_r16(R::SP));
}

#[test]
fn segment_override_is_consumed_once() {
    let code: Vec<u8> = vec![
        0x26, 0x8A, 0x0E, 0x20, 0x00, // es: mov cl,[0x0020]
        0x8A, 0x1E, 0x20, 0x00,       // mov bl,[0x0020]
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::ES, 0x4000);
    mmu.write_u8(0x4000, 0x0020, 0x55);
    mmu.write_u8(CODE_SEG, 0x0020, 0x99);

    // prefix byte is its own step
    step_n(&mut cpu, &mut mmu, &mut io, 2);
    assert_eq!(0x55, cpu.get_r8(R::CL));
    assert_eq!(SegmentOverride::None, cpu.segment_override);

    // the following instruction is back on the DS default
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x99, cpu.get_r8(R::BL));
}

#[test]
fn rep_movsb_honors_source_override() {
    let code: Vec<u8> = vec![
        0x2E, 0xF3, 0xA4, // cs: rep movsb
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::DS, 0x1111); // red herring; source reads through CS
    cpu.set_r16(R::ES, 0x4000);
    mmu.write(CODE_SEG, 0x0200, &[0xDE, 0xAD]);
    cpu.set_r16(R::CX, 2);
    cpu.set_r16(R::SI, 0x0200);
    cpu.set_r16(R::DI, 0x0300);

    step_n(&mut cpu, &mut mmu, &mut io, 2);
    assert_eq!(vec![0xDE, 0xAD], mmu.read(0x4000, 0x0300, 2));
    assert_eq!(SegmentOverride::None, cpu.segment_override);
}

#[test]
#[should_panic]
fn unconsumed_override_trips_the_age_check() {
    let code: Vec<u8> = vec![
        0x26, // es:
        0x90, // nop (no memory operand, override not consumed)
        0x90, // nop
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    step_n(&mut cpu, &mut mmu, &mut io, 3);
}

#[test]
fn undefined_opcode_faults() {
    let code: Vec<u8> = vec![0x0F];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    let res = cpu.step(&mut mmu, &mut io);
    assert_eq!(
        Err(Fault::Undefined {
            cs: CODE_SEG,
            ip: 0x0100,
            opcodes: vec![0x0F],
        }),
        res
    );
}

#[test]
fn unimplemented_opcode_faults_distinctly() {
    let code: Vec<u8> = vec![0x9B]; // wait
    let (mut cpu, mut mmu, mut io) = boot(&code);
    let res = cpu.step(&mut mmu, &mut io);
    assert_eq!(
        Err(Fault::Unimplemented {
            cs: CODE_SEG,
            ip: 0x0100,
            opcodes: vec![0x9B],
        }),
        res
    );
}

#[test]
fn strict_8086_faults_on_80186_encodings() {
    let code: Vec<u8> = vec![0x83, 0xC9, 0x01]; // or cx,byte 1
    let (mut cpu, mut mmu, mut io) = boot(&code);
    assert_eq!(true, cpu.step(&mut mmu, &mut io).is_err());

    // the same bytes execute on a 80186
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.model = CpuModel::Intel80186;
    cpu.set_r16(R::CX, 0x0002);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x0003, cpu.get_r16(R::CX));
}

#[test]
fn hlt_stalls_until_hardware_interrupt() {
    let code: Vec<u8> = vec![
        0xF4, // hlt
        0x90, // nop
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write_vec(0x08, MemoryAddress::new(0x2000, 0x0040));
    cpu.regs.flags.interrupt = true;

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(true, cpu.halted);
    let resume_ip = cpu.regs.ip;

    // stays put while nothing arrives
    step_n(&mut cpu, &mut mmu, &mut io, 3);
    assert_eq!(resume_ip, cpu.regs.ip);

    io.pending.push_back(0x08);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(false, cpu.halted);
    assert_eq!(0x2000, cpu.get_r16(R::CS));
    assert_eq!(0x0040, cpu.regs.ip);
    // the interrupt returns to the instruction after hlt
    assert_eq!(resume_ip, mmu.read_u16(0x0800, cpu.get_r16(R::SP)));
}

#[test]
fn interrupts_wait_for_the_interrupt_flag() {
    let code: Vec<u8> = vec![
        0x90, // nop
        0xFB, // sti
        0x90, // nop
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write_vec(0x08, MemoryAddress::new(0x2000, 0x0040));
    io.pending.push_back(0x08);

    // IF=0: the queued interrupt is ignored
    step_n(&mut cpu, &mut mmu, &mut io, 2);
    assert_eq!(CODE_SEG, cpu.get_r16(R::CS));

    // IF=1: serviced at the next boundary instead of fetching
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x2000, cpu.get_r16(R::CS));
    assert_eq!(0x0040, cpu.regs.ip);
}

#[test]
fn can_execute_in_out() {
    let code: Vec<u8> = vec![
        0xE4, 0x60,       // in al,0x60
        0xE6, 0x61,       // out 0x61,al
        0xBA, 0xF8, 0x03, // mov dx,0x3f8
        0xED,             // in ax,dx
        0xEF,             // out dx,ax
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    io.in8_value = 0xAA;
    io.in16_value = 0xBEEF;
    step_n(&mut cpu, &mut mmu, &mut io, 5);

    assert_eq!(0xBEEF, cpu.get_r16(R::AX));
    assert_eq!(vec![(0x61, 0xAA)], io.out8_log);
    assert_eq!(vec![(0x03F8, 0xBEEF)], io.out16_log);
}

#[test]
fn can_execute_call_ret() {
    let code: Vec<u8> = vec![
        0xE8, 0x02, 0x00, // call +2
        0x90,             // nop
        0x90,             // nop
        0xC3,             // ret
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    let sp_before = cpu.get_r16(R::SP);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x0105, cpu.regs.ip);
    assert_eq!(0x0103, mmu.read_u16(0x0800, cpu.get_r16(R::SP)));

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x0103, cpu.regs.ip);
    assert_eq!(sp_before, cpu.get_r16(R::SP));
}

#[test]
fn can_execute_call_far_retf() {
    let code: Vec<u8> = vec![
        0x9A, 0x00, 0x03, 0x00, 0x20, // call 0x2000:0x0300
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write(0x2000, 0x0300, &[0xCB]); // retf
    let sp_before = cpu.get_r16(R::SP);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x2000, cpu.get_r16(R::CS));
    assert_eq!(0x0300, cpu.regs.ip);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(CODE_SEG, cpu.get_r16(R::CS));
    assert_eq!(0x0105, cpu.regs.ip);
    assert_eq!(sp_before, cpu.get_r16(R::SP));
}

#[test]
fn retn_imm_releases_stack_arguments() {
    let code: Vec<u8> = vec![
        0xB8, 0x11, 0x11, // mov ax,0x1111
        0x50,             // push ax
        0xE8, 0x00, 0x00, // call +0
        0x90,             // nop    <- return target
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write(CODE_SEG, 0x0107, &[0xC2, 0x02, 0x00]); // ret 2 (overwrites the nop)
    let sp_before = cpu.get_r16(R::SP);

    step_n(&mut cpu, &mut mmu, &mut io, 4);
    assert_eq!(0x0107, cpu.regs.ip);
    // both the return address and the pushed argument are gone
    assert_eq!(sp_before, cpu.get_r16(R::SP));
}

#[test]
fn can_execute_jmp_indirect() {
    let code: Vec<u8> = vec![
        0xFF, 0x26, 0x00, 0x02, // jmp [0x0200]
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write_u16(CODE_SEG, 0x0200, 0x0456);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x0456, cpu.regs.ip);
}

#[test]
fn can_execute_jmp_far_indirect() {
    let code: Vec<u8> = vec![
        0xFF, 0x2E, 0x00, 0x02, // jmp far [0x0200]
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write_u16(CODE_SEG, 0x0200, 0x0456);
    mmu.write_u16(CODE_SEG, 0x0202, 0x3000);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x3000, cpu.get_r16(R::CS));
    assert_eq!(0x0456, cpu.regs.ip);
}

#[test]
fn can_execute_loop() {
    let code: Vec<u8> = vec![
        0xB9, 0x03, 0x00, // mov cx,0x3
        0x40,             // inc ax
        0xE2, 0xFD,       // loop -3
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    // mov, then 3 rounds of inc+loop
    step_n(&mut cpu, &mut mmu, &mut io, 7);
    assert_eq!(3, cpu.get_r16(R::AX));
    assert_eq!(0, cpu.get_r16(R::CX));
    assert_eq!(0x0106, cpu.regs.ip);
}

#[test]
fn can_execute_lds_les() {
    let code: Vec<u8> = vec![
        0xC5, 0x1E, 0x00, 0x02, // lds bx,[0x0200]
        0xC4, 0x0E, 0x04, 0x02, // les cx,[0x0204]
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write_u16(CODE_SEG, 0x0200, 0x1234);
    mmu.write_u16(CODE_SEG, 0x0202, 0x5000);
    // les resolves through the DS that lds just loaded
    mmu.write_u16(0x5000, 0x0204, 0x4321);
    mmu.write_u16(0x5000, 0x0206, 0x6000);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x1234, cpu.get_r16(R::BX));
    assert_eq!(0x5000, cpu.get_r16(R::DS));

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x4321, cpu.get_r16(R::CX));
    assert_eq!(0x6000, cpu.get_r16(R::ES));
}

#[test]
fn lea_stores_the_offset_only() {
    let code: Vec<u8> = vec![
        0x8D, 0x47, 0x10, // lea ax,[bx+0x10]
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::BX, 0x0200);
    cpu.set_r16(R::DS, 0x9999); // must not leak into the result
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x0210, cpu.get_r16(R::AX));
}

#[test]
fn can_execute_xchg_xlat() {
    let code: Vec<u8> = vec![
        0x91,       // xchg ax,cx
        0xD7,       // xlat
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::AX, 0x1111);
    cpu.set_r16(R::CX, 0x2222);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x2222, cpu.get_r16(R::AX));
    assert_eq!(0x1111, cpu.get_r16(R::CX));

    cpu.set_r16(R::BX, 0x0400);
    cpu.set_r8(R::AL, 0x02);
    mmu.write(CODE_SEG, 0x0400, &[0x10, 0x20, 0x30]);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x30, cpu.get_r8(R::AL));
}

#[test]
fn can_execute_shifts_and_rotates() {
    // shl al,1
    let (mut cpu, mut mmu, mut io) = boot(&[0xD0, 0xE0]);
    cpu.set_r8(R::AL, 0x80);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x00, cpu.get_r8(R::AL));
    assert_eq!(true, cpu.regs.flags.carry);
    assert_eq!(true, cpu.regs.flags.overflow); // sign bit changed
    assert_eq!(true, cpu.regs.flags.zero);

    // shr al,1
    let (mut cpu, mut mmu, mut io) = boot(&[0xD0, 0xE8]);
    cpu.set_r8(R::AL, 0x81);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x40, cpu.get_r8(R::AL));
    assert_eq!(true, cpu.regs.flags.carry);
    assert_eq!(true, cpu.regs.flags.overflow); // MSB of the pre-shift value

    // sar al,1 keeps the sign
    let (mut cpu, mut mmu, mut io) = boot(&[0xD0, 0xF8]);
    cpu.set_r8(R::AL, 0x81);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0xC0, cpu.get_r8(R::AL));
    assert_eq!(true, cpu.regs.flags.carry);

    // rcl al,1 pulls the old carry into bit 0
    let (mut cpu, mut mmu, mut io) = boot(&[0xD0, 0xD0]);
    cpu.set_r8(R::AL, 0x80);
    cpu.regs.flags.carry = true;
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x01, cpu.get_r8(R::AL));
    assert_eq!(true, cpu.regs.flags.carry);

    // rcr al,1 pushes the old carry into bit 7
    let (mut cpu, mut mmu, mut io) = boot(&[0xD0, 0xD8]);
    cpu.set_r8(R::AL, 0x01);
    cpu.regs.flags.carry = true;
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x80, cpu.get_r8(R::AL));
    assert_eq!(true, cpu.regs.flags.carry);

    // rol/ror by cl
    let (mut cpu, mut mmu, mut io) = boot(&[0xD2, 0xC0]); // rol al,cl
    cpu.set_r8(R::AL, 0x81);
    cpu.set_r8(R::CL, 4);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x18, cpu.get_r8(R::AL));

    // shift counts are not masked on the 8086: 16 shifts empty a byte
    let (mut cpu, mut mmu, mut io) = boot(&[0xD2, 0xE0]); // shl al,cl
    cpu.set_r8(R::AL, 0xFF);
    cpu.set_r8(R::CL, 16);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x00, cpu.get_r8(R::AL));
    assert_eq!(false, cpu.regs.flags.carry);
}

#[test]
fn shift_through_memory_operands() {
    let code: Vec<u8> = vec![
        0xD1, 0x26, 0x00, 0x02, // shl word [0x0200],1
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write_u16(CODE_SEG, 0x0200, 0x4001);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x8002, mmu.read_u16(CODE_SEG, 0x0200));
    assert_eq!(false, cpu.regs.flags.carry);
    assert_eq!(true, cpu.regs.flags.overflow);
}

#[test]
fn can_execute_adc_sbb_chain() {
    // 32-bit add: 0x0001_FFFF + 0x0000_0001
    let code: Vec<u8> = vec![
        0x05, 0x01, 0x00, // add ax,0x1
        0x83, 0xD3, 0x00, // adc bx,0x0
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::AX, 0xFFFF);
    cpu.set_r16(R::BX, 0x0001);
    step_n(&mut cpu, &mut mmu, &mut io, 2);
    assert_eq!(0x0000, cpu.get_r16(R::AX));
    assert_eq!(0x0002, cpu.get_r16(R::BX));

    // 32-bit sub: 0x0002_0000 - 0x0000_0001
    let code: Vec<u8> = vec![
        0x2D, 0x01, 0x00, // sub ax,0x1
        0x83, 0xDB, 0x00, // sbb bx,0x0
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::AX, 0x0000);
    cpu.set_r16(R::BX, 0x0002);
    step_n(&mut cpu, &mut mmu, &mut io, 2);
    assert_eq!(0xFFFF, cpu.get_r16(R::AX));
    assert_eq!(0x0001, cpu.get_r16(R::BX));
}

#[test]
fn can_execute_neg_not() {
    let code: Vec<u8> = vec![
        0xF6, 0xD8, // neg al
        0xF6, 0xD3, // not bl
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0x01);
    cpu.set_r8(R::BL, 0x0F);
    cpu.regs.flags.carry = false;

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0xFF, cpu.get_r8(R::AL));
    assert_eq!(true, cpu.regs.flags.carry);

    let flags_before = cpu.regs.flags.u16();
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0xF0, cpu.get_r8(R::BL));
    // NOT affects no flags
    assert_eq!(flags_before, cpu.regs.flags.u16());
}

#[test]
fn can_execute_cbw_cwd() {
    let code: Vec<u8> = vec![
        0x98, // cbw
        0x99, // cwd
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0x80);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0xFF80, cpu.get_r16(R::AX));

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0xFFFF, cpu.get_r16(R::DX));
}

#[test]
fn can_execute_daa() {
    let code: Vec<u8> = vec![
        0x27, // daa
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0x9A);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x00, cpu.get_r8(R::AL));
    assert_eq!(true, cpu.regs.flags.carry);
    assert_eq!(true, cpu.regs.flags.adjust);
    assert_eq!(true, cpu.regs.flags.zero);
}

#[test]
fn can_execute_aam_aad() {
    let code: Vec<u8> = vec![
        0xD4, 0x0A, // aam
        0xD5, 0x0A, // aad
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0x25); // 37 = 3*10 + 7
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x03, cpu.get_r8(R::AH));
    assert_eq!(0x07, cpu.get_r8(R::AL));

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x00, cpu.get_r8(R::AH));
    assert_eq!(0x25, cpu.get_r8(R::AL));
}

#[test]
fn can_execute_idiv8() {
    let code: Vec<u8> = vec![
        0xF6, 0xFB, // idiv bl
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r16(R::AX, (-39i16) as u16);
    cpu.set_r8(R::BL, 5);
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    // -39 / 5 = -7 rem -4
    assert_eq!((-7i8) as u8, cpu.get_r8(R::AL));
    assert_eq!((-4i8) as u8, cpu.get_r8(R::AH));
}

#[test]
fn into_raises_when_overflow_set() {
    let code: Vec<u8> = vec![
        0xCE, // into
        0xCE, // into
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    mmu.write_vec(4, MemoryAddress::new(0x2000, 0x0080));

    cpu.regs.flags.overflow = false;
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(CODE_SEG, cpu.get_r16(R::CS));

    cpu.regs.flags.overflow = true;
    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(0x2000, cpu.get_r16(R::CS));
    assert_eq!(0x0080, cpu.regs.ip);
}

#[test]
fn wait_states_consume_steps() {
    let code: Vec<u8> = vec![
        0x40, // inc ax
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.cycles_to_wait = 2;

    step_n(&mut cpu, &mut mmu, &mut io, 2);
    assert_eq!(0, cpu.get_r16(R::AX));
    assert_eq!(0x0100, cpu.regs.ip);

    step_n(&mut cpu, &mut mmu, &mut io, 1);
    assert_eq!(1, cpu.get_r16(R::AX));
}

#[test]
fn can_execute_conditional_jumps() {
    let code: Vec<u8> = vec![
        0x3C, 0x05, // cmp al,0x5
        0x74, 0x02, // jz +2
        0xB3, 0x01, // mov bl,0x1
        0xB7, 0x01, // mov bh,0x1
    ];
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0x05);
    step_n(&mut cpu, &mut mmu, &mut io, 3);
    // the equal path skips "mov bl"
    assert_eq!(0x0100, cpu.get_r16(R::BX));

    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0x06);
    step_n(&mut cpu, &mut mmu, &mut io, 4);
    assert_eq!(0x0101, cpu.get_r16(R::BX));
}

#[test]
fn can_execute_signed_conditional_jumps() {
    let code: Vec<u8> = vec![
        0x3C, 0x05, // cmp al,0x5
        0x7C, 0x02, // jl +2
        0xB3, 0x01, // mov bl,0x1
        0x90,       // nop
    ];
    // 0xFE is -2 signed, so it is less than 5
    let (mut cpu, mut mmu, mut io) = boot(&code);
    cpu.set_r8(R::AL, 0xFE);
    step_n(&mut cpu, &mut mmu, &mut io, 3);
    assert_eq!(0x00, cpu.get_r8(R::BL));
    assert_eq!(0x0107, cpu.regs.ip);
}
