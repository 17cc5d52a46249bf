use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// ASCII Adjust After Addition
    Aaa,

    /// ASCII Adjust AX Before Division
    Aad,

    /// ASCII Adjust AX After Multiply
    Aam,

    /// ASCII Adjust AL After Subtraction
    Aas,

    Adc8, Adc16,
    Add8, Add16,
    And8, And16,

    CallNear, CallFar,

    /// Convert Byte to Word
    Cbw,

    /// Clear Carry Flag
    Clc,

    /// Clear Direction Flag
    Cld,

    /// Clear Interrupt Flag
    Cli,

    /// Complement Carry Flag
    Cmc,

    Cmp8, Cmp16,

    /// Compare String Operands
    Cmpsb, Cmpsw,

    /// Convert Word to Doubleword
    Cwd,

    /// Decimal Adjust AL after Addition
    Daa,

    /// Decimal Adjust AL after Subtraction
    Das,

    Dec8, Dec16,
    Div8, Div16,

    /// FPU escape opcode, executed as a no-op (no coprocessor is modelled)
    Esc,

    Hlt,

    Idiv8, Idiv16,
    Imul8, Imul16,

    /// Input from Port
    In8, In16,

    Inc8, Inc16,

    Int,

    /// Interrupt on overflow (INT 4 when OF=1)
    Into,

    Iret,

    /// Jump if above (CF=0 and ZF=0).    (alias: jnbe)
    Ja,

    /// Jump if carry (CF=1).    (alias: jb, jnae)
    Jc,

    /// Jump if CX register is 0.
    Jcxz,

    /// Jump if greater (ZF=0 and SF=OF).    (alias: jnle)
    Jg,

    /// Jump if less (SF ≠ OF).    (alias: jnge)
    Jl,

    JmpShort, JmpNear, JmpFar,

    /// Jump if not above (CF=1 or ZF=1).    (alias: jbe)
    Jna,

    /// Jump if not carry (CF=0).    (alias: jae, jnb)
    Jnc,

    /// Jump if not greater (ZF=1 or SF ≠ OF).    (alias: jle)
    Jng,

    /// Jump if not less (SF=OF).    (alias: jge)
    Jnl,

    /// Jump if not overflow (OF=0).
    Jno,

    /// Jump if not sign (SF=0).
    Jns,

    /// Jump if not zero (ZF=0).    (alias: jne)
    Jnz,

    /// Jump if overflow (OF=1).
    Jo,

    /// Jump short if parity even (PF=1)
    Jpe,

    /// Jump short if parity odd (PF=0).
    Jpo,

    /// Jump if sign (SF=1).
    Js,

    /// Jump if zero (ZF=1).    (alias: je)
    Jz,

    /// Load Status Flags into AH Register
    Lahf,

    /// Bus-lock prefix; a no-op to the core (no concurrent bus is modelled)
    Lock,

    /// Load DS:r16 with far pointer from memory.
    Lds,

    /// Load Effective Address
    Lea16,

    /// Load ES:r16 with far pointer from memory.
    Les,

    /// Load byte at address DS:SI into AL.
    Lodsb,

    /// Load word at address DS:SI into AX.
    Lodsw,

    /// Decrement count (cx); jump short if count ≠ 0.
    Loop,

    /// Decrement count (cx); jump short if count ≠ 0 and ZF = 1.
    Loope,

    /// Decrement count (cx); jump short if count ≠ 0 and ZF = 0.
    Loopne,

    Mov8, Mov16,
    Movsb, Movsw,
    Mul8, Mul16,
    Neg8, Neg16,
    Nop,
    Not8, Not16,
    Or8, Or16,
    Out8, Out16,
    Pop16,

    /// Pop top of stack into the FLAGS register.
    Popf,

    Push16,

    /// push the FLAGS register onto stack
    Pushf,

    /// Rotate 9 bits (CF, r/m8) left
    Rcl8,
    /// Rotate 17 bits (CF, r/m16) left
    Rcl16,
    /// Rotate 9 bits (CF, r/m8) right
    Rcr8,
    /// Rotate 17 bits (CF, r/m16) right
    Rcr16,

    Retn, Retf,

    Rol8, Rol16,
    Ror8, Ror16,

    /// Store AH into Flags
    Sahf,

    Sar8, Sar16,

    /// Integer Subtraction with Borrow
    Sbb8, Sbb16,

    Scasb, Scasw,

    /// Segment-override prefix opcode; the override was armed at decode
    /// time and this step executes nothing further
    SegPrefix,

    /// Multiply `dst` by 2, `src` times (alias sal)
    Shl8, Shl16,

    Shr8, Shr16,

    /// Set Carry Flag
    Stc,

    /// Set Direction Flag
    Std,

    /// Set Interrupt Flag
    Sti,

    Stosb, Stosw,
    Sub8, Sub16,
    Test8, Test16,

    /// Exchange Register/Memory with Register
    Xchg8, Xchg16,

    Xlatb,

    Xor8, Xor16,

    /// Initial state
    Uninitialized,

    /// An encoding the decoder rejected (opcode bytes, classification)
    Invalid(Vec<u8>, Invalid),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Op::Invalid(bytes, _) => {
                let mut x = Vec::new();
                for b in bytes {
                    x.push(format!("{:02X}", b));
                }
                write!(f, "INVALID {}", x.join(", "))
            }
            _ => write!(f, "{:?}", self),
        }
    }
}

impl Op {
    pub fn is_valid(&self) -> bool {
        match *self {
            Op::Uninitialized | Op::Invalid(_, _) => false,
            _ => true,
        }
    }
}

/// the class of instruction decode error that occured
#[derive(Clone, Debug, PartialEq)]
pub enum Invalid {
    /// encoding is undefined on the selected CPU generation
    Undefined,

    /// encoding is recognized but not built (kept distinct so tests can
    /// tell stubs from genuinely undefined encodings)
    Unimplemented,

    /// a group opcode with a reserved `reg` field value
    Reg(u8),
}
