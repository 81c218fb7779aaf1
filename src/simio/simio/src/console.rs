use std::convert::TryFrom;
use std::fmt::Write as _;

use simio_core::{expr, ArgTokens, ExprError, Sfr, Simio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("can't parse {text}: {source}")]
    Value {
        text: String,
        #[source]
        source: ExprError,
    },
    #[error("byte value out of range: 0x{0:x}")]
    ByteRange(u32),
    #[error(transparent)]
    Bus(#[from] simio_core::Error),
}

/// Result of a single console line
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Text(String),
    Quit,
}

/// Host-side command processor driving one simulated bus
pub struct Console {
    bus: Simio,
}

fn value(text: &str) -> Result<u32, CommandError> {
    expr::eval(text).map_err(|source| CommandError::Value {
        text: text.to_string(),
        source,
    })
}

fn byte(text: &str) -> Result<u8, CommandError> {
    let val = value(text)?;
    u8::try_from(val).map_err(|_| CommandError::ByteRange(val))
}

impl Console {
    pub fn new(bus: Simio) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Simio {
        &self.bus
    }

    /// Execute one command line
    pub fn execute(&mut self, line: &str) -> Result<Outcome, CommandError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Outcome::Text(String::new()));
        }

        let mut args = ArgTokens::new(line);
        let command = args.next_arg().unwrap_or_default().to_ascii_lowercase();
        let mut out = String::new();

        match command.as_str() {
            "quit" | "exit" => return Ok(Outcome::Quit),
            "classes" => {
                for name in self.bus.registry().names() {
                    let _ = writeln!(out, "{}", name);
                }
            }
            "help" => {
                let name = args.next_arg().ok_or(CommandError::Usage("help <class>"))?;
                let class = self
                    .bus
                    .registry()
                    .get(name)
                    .ok_or_else(|| simio_core::Error::UnknownClass(name.to_string()))?;
                out.push_str(class.help());
            }
            "add" => {
                const USAGE: &str = "add <class> <name> [args...]";
                let class = args.next_arg().ok_or(CommandError::Usage(USAGE))?;
                let name = args.next_arg().ok_or(CommandError::Usage(USAGE))?;
                self.bus.add(class, name, &mut args)?;
            }
            "del" => {
                let name = args.next_arg().ok_or(CommandError::Usage("del <name>"))?;
                self.bus.del(name)?;
            }
            "devices" => {
                for name in self.bus.devices() {
                    let _ = writeln!(out, "{}", name);
                }
            }
            "config" => {
                const USAGE: &str = "config <name> <param> [args...]";
                let name = args.next_arg().ok_or(CommandError::Usage(USAGE))?;
                let param = args.next_arg().ok_or(CommandError::Usage(USAGE))?;
                self.bus.config(name, param, &mut args)?;
            }
            "info" => {
                let name = args.next_arg().ok_or(CommandError::Usage("info <name>"))?;
                out = self.bus.info(name)?;
            }
            "reset" => self.bus.reset(),
            "mw" => {
                const USAGE: &str = "mw <address> <byte> [byte...]";
                let addr = value(args.next_arg().ok_or(CommandError::Usage(USAGE))?)?;
                let data = args.map(byte).collect::<Result<Vec<u8>, _>>()?;
                if data.is_empty() {
                    return Err(CommandError::Usage(USAGE));
                }
                for (offset, data) in data.into_iter().enumerate() {
                    self.bus.write_b(addr.wrapping_add(offset as u32), data)?;
                }
            }
            "md" => {
                const USAGE: &str = "md <address> [count]";
                let addr = value(args.next_arg().ok_or(CommandError::Usage(USAGE))?)?;
                let count = args.next_arg().map(value).transpose()?.unwrap_or(1);
                for offset in 0..count {
                    let at = addr.wrapping_add(offset);
                    let _ = match self.bus.read_b(at)? {
                        Some(data) => writeln!(out, "0x{:04x}: {:02x}", at, data),
                        None => writeln!(out, "0x{:04x}: --", at),
                    };
                }
            }
            "sfr" => {
                let sfr = self.bus.sfr();
                for (label, reg) in [
                    ("IE1", Sfr::Ie1),
                    ("IE2", Sfr::Ie2),
                    ("IFG1", Sfr::Ifg1),
                    ("IFG2", Sfr::Ifg2),
                ] {
                    let _ = writeln!(out, "{:<5} 0x{:02x}", label, sfr.read(reg));
                }
            }
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        }

        Ok(Outcome::Text(out))
    }
}

#[cfg(test)]
mod console_tests {
    use super::*;
    use simio_core::Registry;
    use simio_peripherals::{register_all, InprocConnector, InprocPeer};
    use std::rc::Rc;

    fn console() -> (Console, InprocPeer) {
        let connector = InprocConnector::new();
        let peer = connector.bind("spi");
        let mut registry = Registry::new();
        register_all(&mut registry, Rc::new(connector));
        (Console::new(Simio::new(registry)), peer)
    }

    fn text(console: &mut Console, line: &str) -> String {
        match console.execute(line).unwrap() {
            Outcome::Text(text) => text,
            Outcome::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn test_walkthrough() {
        let (mut console, peer) = console();
        assert_eq!(text(&mut console, "classes"), "spi\n");
        assert!(text(&mut console, "help spi").contains("irq_bit"));

        text(&mut console, "add spi spi0 inproc://spi");
        assert_eq!(text(&mut console, "devices"), "spi0\n");

        text(&mut console, "mw 0x6f 0xab");
        assert_eq!(peer.try_request(), Some(0xAB));
        assert!(text(&mut console, "sfr").contains("IFG2  0x04"));

        peer.reply(0x5A).unwrap();
        assert_eq!(text(&mut console, "md 0x6e 2"), "0x006e: 5a\n0x006f: --\n");
        assert_eq!(text(&mut console, "md 0x6e"), "0x006e: 5a\n");

        text(&mut console, "config spi0 irq_bit 5");
        text(&mut console, "mw 0x6f 1");
        assert!(text(&mut console, "sfr").contains("IFG2  0x24"));
        assert!(text(&mut console, "info spi0").contains("Last op:             W"));

        text(&mut console, "reset");
        assert!(text(&mut console, "sfr").contains("IFG2  0x00"));
        let info = text(&mut console, "info spi0");
        assert!(info.contains("Rx value:            0x00"));
        assert!(info.contains("RxIFG mask:          0x20"));

        text(&mut console, "del spi0");
        assert_eq!(text(&mut console, "devices"), "");
        assert_eq!(console.execute("quit").unwrap(), Outcome::Quit);
    }

    #[test]
    fn test_errors() {
        let (mut console, _peer) = console();
        assert_eq!(text(&mut console, "  # comment"), "");
        assert!(matches!(
            console.execute("frobnicate"),
            Err(CommandError::UnknownCommand(_))
        ));
        assert!(matches!(console.execute("add spi"), Err(CommandError::Usage(_))));
        assert!(matches!(console.execute("mw 0x6f"), Err(CommandError::Usage(_))));
        assert!(matches!(
            console.execute("mw 0x6f 0x100"),
            Err(CommandError::ByteRange(0x100))
        ));
        assert!(matches!(
            console.execute("md zz"),
            Err(CommandError::Value { .. })
        ));
        assert!(matches!(
            console.execute("add uart u0"),
            Err(CommandError::Bus(simio_core::Error::UnknownClass(_)))
        ));
        assert!(matches!(
            console.execute("add spi spi0 inproc://nobody"),
            Err(CommandError::Bus(simio_core::Error::Create { .. }))
        ));

        text(&mut console, "add spi spi0 inproc://spi");
        assert!(matches!(
            console.execute("config spi0 endpoint bad://uri"),
            Err(CommandError::Bus(simio_core::Error::Config { .. }))
        ));
        assert!(console.bus().info("spi0").unwrap().contains("inproc://spi"));
    }
}
