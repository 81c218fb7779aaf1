// Special function register block at the bottom of the address space
pub const SFR_SIZE: usize = 16;

pub mod sfr {
    // Interrupt enable / flag registers (byte addresses)
    pub const SFR_IE1: usize = 0x00;
    pub const SFR_IE2: usize = 0x01;
    pub const SFR_IFG1: usize = 0x02;
    pub const SFR_IFG2: usize = 0x03;
}

pub mod spi {
    use crate::Address;

    // USCI B0 receive / transmit buffers
    pub const UCB0_RXBUF: Address = 0x006E;
    pub const UCB0_TXBUF: Address = 0x006F;

    // UCB0RXIFG lives in bit 2 of IFG2
    pub const UCB0_RX_IRQ_BIT: u32 = 2;
}

pub mod expr {
    // Bounded evaluation stacks
    pub const STACK_DEPTH: usize = 32;
}
