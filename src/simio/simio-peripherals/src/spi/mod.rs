//! SPI peer emulation
//!
//! Each byte the firmware writes to the transmit buffer is forwarded to an
//! external peer process; the peer's answer is fetched the next time the
//! firmware reads the receive buffer.

use std::fmt::Write as _;
use std::rc::Rc;

use log::{debug, error, warn};
use simio_core::constants::spi::{UCB0_RXBUF, UCB0_RX_IRQ_BIT, UCB0_TXBUF};
use simio_core::{
    Address, ArgTokens, ConfigError, DeviceClass, DeviceError, SfrBank, Sfr, SimioDevice,
    WriteAccess,
};
use simio_protocol::{default_endpoint, Endpoint, DEFAULT_CHANNEL};

use crate::transport::{Connector, Transport, TransportError};

mod config;

pub const HELP: &str = "\
This peripheral forwards SPI traffic to an external process. Bytes written
to the Tx register are sent to the peer and raise the receive interrupt
flag; the peer's reply is returned by the next read of the Rx register.

Endpoints use ZeroMQ-style URIs but the wire is a plain Unix or TCP stream
carrying one raw byte per message. ZeroMQ REQ/REP peers can't connect; run
`simio peer <endpoint>` or any program that answers each byte with one byte.

Create arguments are:
    [channel | endpoint]
        Channel name used for the default endpoint
        ipc:///tmp/simio_<channel>.sock (default UCB0), or a full
        endpoint to connect to instead.

Config arguments are:
    rx <address>
        Set the Rx buffer address.
    tx <address>
        Set the Tx buffer address.
    irq_bit <bit>
        Set the IFG2 bit raised on transmit.
    endpoint <endpoint>
        Reconnect to ipc://<path>, tcp://<host>:<port> or inproc://<name>.
";

/// Most recent access to the device's registers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LastOp {
    /// Rx cache is current
    Read,
    /// A reply is owed for the last byte sent
    Write,
}

pub struct Spi {
    sfr: SfrBank,
    interrupt_bit: u32, // IFG2 bit, stored unchecked
    rx_addr: Address,
    tx_addr: Address,
    rx_reg: u8,
    last_op: LastOp,
    transport: Transport,
}

fn transport_error(err: TransportError) -> DeviceError {
    error!("spi: {}", err);
    DeviceError::Transport(Box::new(err))
}

impl Spi {
    /// Device with USCI B0 defaults talking over `transport`
    pub fn new(sfr: SfrBank, transport: Transport) -> Self {
        Self {
            sfr,
            interrupt_bit: UCB0_RX_IRQ_BIT,
            rx_addr: UCB0_RXBUF,
            tx_addr: UCB0_TXBUF,
            rx_reg: 0x00,
            last_op: LastOp::Read,
            transport,
        }
    }

    pub fn rx_addr(&self) -> Address {
        self.rx_addr
    }

    pub fn tx_addr(&self) -> Address {
        self.tx_addr
    }

    pub fn interrupt_bit(&self) -> u32 {
        self.interrupt_bit
    }

    /// IFG2 bit owned by this device; empty when the bit index is out of range
    pub fn irq_mask(&self) -> u8 {
        1u8.checked_shl(self.interrupt_bit).unwrap_or(0)
    }

    pub fn rx_value(&self) -> u8 {
        self.rx_reg
    }

    pub fn last_op(&self) -> LastOp {
        self.last_op
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

impl SimioDevice for Spi {
    fn reset(&mut self) {
        self.sfr.modify(Sfr::Ifg2, self.irq_mask(), 0);
        self.rx_reg = 0x00;
        self.last_op = LastOp::Read;
    }

    fn config(&mut self, param: &str, args: &mut ArgTokens<'_>) -> Result<(), ConfigError> {
        self.configure(param, args)
    }

    fn info(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Rx address:          0x{:04x}", self.rx_addr);
        let _ = writeln!(text, "Tx address:          0x{:04x}", self.tx_addr);
        let _ = writeln!(text, "RxIFG mask:          0x{:02x}", self.irq_mask());
        let _ = writeln!(text, "Data endpoint:       {}", self.transport.describe());
        let _ = writeln!(
            text,
            "Last op:             {}",
            match self.last_op {
                LastOp::Read => 'R',
                LastOp::Write => 'W',
            }
        );
        let _ = writeln!(text, "Rx value:            0x{:02x}", self.rx_reg);
        text
    }

    /// Writes are never claimed so other devices still observe them
    fn write_b(&mut self, addr: Address, data: u8) -> Result<WriteAccess, DeviceError> {
        if addr == self.tx_addr {
            // Previous reply was never read: it overruns the Rx cache
            let overrun = if self.transport.reply_owed() {
                Some(self.transport.receive().map_err(transport_error)?)
            } else {
                None
            };
            self.transport.send(data).map_err(transport_error)?;
            if let Some(reply) = overrun {
                warn!("spi: Rx overrun, dropping 0x{:02x}", self.rx_reg);
                self.rx_reg = reply;
            }

            // Flag goes up as soon as the byte is out, before any reply arrives
            let irq = self.irq_mask();
            self.sfr.modify(Sfr::Ifg2, irq, irq);
            self.last_op = LastOp::Write;
            debug!("spi: tx 0x{:02x}", data);
        }

        Ok(WriteAccess::PassThrough)
    }

    fn read_b(&mut self, addr: Address) -> Result<Option<u8>, DeviceError> {
        if addr != self.rx_addr {
            return Ok(None);
        }

        if self.last_op == LastOp::Write {
            self.rx_reg = self.transport.receive().map_err(transport_error)?;
            debug!("spi: rx 0x{:02x}", self.rx_reg);
        }
        self.last_op = LastOp::Read;
        Ok(Some(self.rx_reg))
    }
}

/// `spi` device class using `connector` to reach peers
pub fn class(connector: Rc<dyn Connector>) -> DeviceClass {
    DeviceClass::new(
        "spi",
        HELP,
        move |sfr: &SfrBank, args: &mut ArgTokens<'_>| {
            let endpoint = match args.next_arg() {
                Some(text) if text.contains("://") => text.parse::<Endpoint>()?,
                Some(channel) => default_endpoint(channel),
                None => default_endpoint(DEFAULT_CHANNEL),
            };
            let transport = Transport::open(connector.clone(), endpoint.clone()).map_err(|err| {
                error!("spi: can't open {}: {}", endpoint, err);
                err
            })?;
            Ok(Box::new(Spi::new(sfr.clone(), transport)) as Box<dyn SimioDevice>)
        },
    )
}
