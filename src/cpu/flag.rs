#[cfg(test)]
#[path = "./flag_test.rs"]
mod flag_test;

/// https://en.wikipedia.org/wiki/FLAGS_register
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Flags {
    // ____ O___ SZ_A _P_C
    pub carry: bool, // 0: carry flag
    pub parity: bool, // 2: parity flag
    pub adjust: bool, // 4: adjust flag
    pub zero: bool, // 6: zero flag
    pub sign: bool, // 7: sign flag
    pub trap: bool, // 8: trap flag (single step)
    pub interrupt: bool, // 9: interrupt flag
    pub direction: bool, // 10: direction flag (control with cld, std)
    pub overflow: bool, // 11: overflow flag
}

pub const FLAG_CF: u16 = 0x0001;
pub const FLAG_PF: u16 = 0x0004;
pub const FLAG_AF: u16 = 0x0010;
pub const FLAG_ZF: u16 = 0x0040;
pub const FLAG_SF: u16 = 0x0080;
pub const FLAG_TF: u16 = 0x0100;
pub const FLAG_IF: u16 = 0x0200;
pub const FLAG_DF: u16 = 0x0400;
pub const FLAG_OF: u16 = 0x0800;

static PARITY_LOOKUP: [u16; 256] = [
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0,
    FLAG_PF, 0, 0, FLAG_PF, 0, FLAG_PF, FLAG_PF, 0, 0, FLAG_PF, FLAG_PF, 0, FLAG_PF, 0, 0, FLAG_PF
];

impl Flags {
    pub fn new() -> Self {
        Flags::default()
    }

    /// Set equal to the most-significant bit of the result,
    /// which is the sign bit of a signed integer.
    pub fn set_sign_u8(&mut self, v: usize) {
        self.sign = v & 0x80 != 0;
    }

    pub fn set_sign_u16(&mut self, v: usize) {
        self.sign = v & 0x8000 != 0;
    }

    /// Set if the least-significant byte of the result contains an
    /// even number of 1 bits; cleared otherwise.
    pub fn set_parity(&mut self, v: usize) {
        self.parity = PARITY_LOOKUP[v & 0xFF] != 0
    }

    /// Zero flag — Set if the result is zero; cleared otherwise.
    pub fn set_zero_u8(&mut self, v: usize) {
        self.zero = v & 0xFF == 0;
    }

    pub fn set_zero_u16(&mut self, v: usize) {
        self.zero = v & 0xFFFF == 0;
    }

    /// Set if an arithmetic operation generates a carry or a borrow out
    /// of bit 3 of the result; cleared otherwise. This flag is used in
    /// binary-coded decimal (BCD) arithmetic.
    pub fn set_adjust(&mut self, res: usize, v1: usize, v2: usize) {
        self.adjust = (res ^ (v1 ^ v2)) & 0x10 != 0;
    }

    /// Set if the integer result is too large a positive number or too
    /// small a negative number (excluding the sign-bit) to fit in the
    /// destination operand; cleared otherwise. This flag indicates an
    /// overflow condition for signed-integer (two's complement) arithmetic.
    pub fn set_overflow_add_u8(&mut self, res: usize, v1: usize, v2: usize) {
        self.overflow = (res ^ v1) & (res ^ v2) & 0x80 != 0;
    }

    pub fn set_overflow_add_u16(&mut self, res: usize, v1: usize, v2: usize) {
        self.overflow = (res ^ v1) & (res ^ v2) & 0x8000 != 0;
    }

    pub fn set_overflow_sub_u8(&mut self, res: usize, v1: usize, v2: usize) {
        self.overflow = (v2 ^ v1) & (v2 ^ res) & 0x80 != 0;
    }

    pub fn set_overflow_sub_u16(&mut self, res: usize, v1: usize, v2: usize) {
        self.overflow = (v2 ^ v1) & (v2 ^ res) & 0x8000 != 0;
    }

    /// Set if an arithmetic operation generates a carry or a borrow out of
    /// the most-significant bit of the result; cleared otherwise. This flag
    /// indicates an overflow condition for unsigned-integer arithmetic.
    pub fn set_carry_u8(&mut self, res: usize) {
        self.carry = res & 0x100 != 0;
    }

    pub fn set_carry_u16(&mut self, res: usize) {
        self.carry = res & 0x1_0000 != 0;
    }

    pub fn carry_val(&self) -> usize {
        if self.carry {
            1
        } else {
            0
        }
    }

    /// loads the flags from a packed u16
    pub fn set_u16(&mut self, val: u16) {
        self.carry = val & FLAG_CF != 0;
        self.parity = val & FLAG_PF != 0;
        self.adjust = val & FLAG_AF != 0;
        self.zero = val & FLAG_ZF != 0;
        self.sign = val & FLAG_SF != 0;
        self.trap = val & FLAG_TF != 0;
        self.interrupt = val & FLAG_IF != 0;
        self.direction = val & FLAG_DF != 0;
        self.overflow = val & FLAG_OF != 0;
    }

    /// returns the packed FLAGS register. bit 1 is reserved and always
    /// reads as 1 on the 8086
    pub fn u16(&self) -> u16 {
        let mut val = 0x0002u16;
        if self.carry {
            val |= FLAG_CF;
        }
        if self.parity {
            val |= FLAG_PF;
        }
        if self.adjust {
            val |= FLAG_AF;
        }
        if self.zero {
            val |= FLAG_ZF;
        }
        if self.sign {
            val |= FLAG_SF;
        }
        if self.trap {
            val |= FLAG_TF;
        }
        if self.interrupt {
            val |= FLAG_IF;
        }
        if self.direction {
            val |= FLAG_DF;
        }
        if self.overflow {
            val |= FLAG_OF;
        }
        val
    }
}
