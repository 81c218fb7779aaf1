use std::cell::RefCell;
use std::rc::Rc;

use log::warn;

use crate::constants::sfr::*;
use crate::constants::SFR_SIZE;
use crate::Address;

/// Named special function registers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sfr {
    Ie1,
    Ie2,
    Ifg1,
    Ifg2,
}

impl Sfr {
    pub fn offset(self) -> usize {
        match self {
            Sfr::Ie1 => SFR_IE1,
            Sfr::Ie2 => SFR_IE2,
            Sfr::Ifg1 => SFR_IFG1,
            Sfr::Ifg2 => SFR_IFG2,
        }
    }
}

/// Interrupt enable/flag register bank shared by every device on one bus
///
/// Cloning yields another handle to the same registers, so a bus and the
/// devices attached to it observe each other's updates. Devices own single
/// bits and must go through [`SfrBank::modify`] to change them.
#[derive(Clone, Default)]
pub struct SfrBank {
    regs: Rc<RefCell<[u8; SFR_SIZE]>>,
}

impl SfrBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, reg: Sfr) -> u8 {
        self.regs.borrow()[reg.offset()]
    }

    /// Set the bits selected by `mask` to the matching bits of `value`
    pub fn modify(&self, reg: Sfr, mask: u8, value: u8) {
        let mut regs = self.regs.borrow_mut();
        let cell = &mut regs[reg.offset()];
        *cell = (*cell & !mask) | (value & mask);
    }

    /// Whether `addr` falls in the register block
    pub fn contains(addr: Address) -> bool {
        (addr as usize) < SFR_SIZE
    }

    /// Bus read of the register block, `None` outside of it
    pub fn read_addr(&self, addr: Address) -> Option<u8> {
        if Self::contains(addr) {
            Some(self.regs.borrow()[addr as usize])
        } else {
            None
        }
    }

    /// Bus write of the register block, returns false outside of it
    pub fn write_addr(&self, addr: Address, data: u8) -> bool {
        if !Self::contains(addr) {
            return false;
        }
        if addr as usize > SFR_IFG2 {
            warn!("Write to reserved SFR at 0x{:02x}", addr);
        }
        self.regs.borrow_mut()[addr as usize] = data;
        true
    }

    pub fn reset(&self) {
        *self.regs.borrow_mut() = [0; SFR_SIZE];
    }
}

#[cfg(test)]
mod sfr_tests {
    use super::*;

    #[test]
    fn test_modify_is_masked() {
        let sfr = SfrBank::new();
        sfr.modify(Sfr::Ifg2, 0xFF, 0b1010_0001);

        sfr.modify(Sfr::Ifg2, 0x04, 0x04);
        assert_eq!(sfr.read(Sfr::Ifg2), 0b1010_0101);

        sfr.modify(Sfr::Ifg2, 0x20, 0x00);
        assert_eq!(sfr.read(Sfr::Ifg2), 0b1000_0101);

        // Value bits outside the mask are ignored
        sfr.modify(Sfr::Ifg2, 0x02, 0xFD);
        assert_eq!(sfr.read(Sfr::Ifg2), 0b1000_0101);
        assert_eq!(sfr.read(Sfr::Ifg1), 0);
    }

    #[test]
    fn test_handles_share_state() {
        let sfr = SfrBank::new();
        let other = sfr.clone();
        other.modify(Sfr::Ie2, 0x01, 0x01);
        assert_eq!(sfr.read(Sfr::Ie2), 0x01);
        assert_eq!(sfr.read_addr(0x01), Some(0x01));

        assert!(sfr.write_addr(0x03, 0x84));
        assert_eq!(other.read(Sfr::Ifg2), 0x84);
        assert!(!sfr.write_addr(0x10, 0x01));
        assert_eq!(sfr.read_addr(0x10), None);

        other.reset();
        assert_eq!(sfr.read(Sfr::Ifg2), 0);
    }
}
