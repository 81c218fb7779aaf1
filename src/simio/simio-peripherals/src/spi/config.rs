use log::info;
use simio_core::{expr, Address, ArgTokens, ConfigError};

use super::Spi;

/// Evaluate the next argument as a number
fn numeric_arg(args: &mut ArgTokens<'_>, what: &'static str) -> Result<Address, ConfigError> {
    let text = args.next_arg().ok_or(ConfigError::MissingArgument(what))?;
    expr::eval(text).map_err(|source| ConfigError::BadValue {
        what,
        text: text.to_string(),
        source,
    })
}

/// Every parameter takes exactly one argument
fn no_more_args(args: &mut ArgTokens<'_>) -> Result<(), ConfigError> {
    match args.next_arg() {
        Some(extra) => Err(ConfigError::ExtraArgument(extra.to_string())),
        None => Ok(()),
    }
}

impl Spi {
    /// Apply one `config` parameter; a failure leaves every field as it was
    pub(super) fn configure(
        &mut self,
        param: &str,
        args: &mut ArgTokens<'_>,
    ) -> Result<(), ConfigError> {
        match param.to_ascii_lowercase().as_str() {
            "rx" => {
                let addr = numeric_arg(args, "address")?;
                no_more_args(args)?;
                self.rx_addr = addr;
            }
            "tx" => {
                let addr = numeric_arg(args, "address")?;
                no_more_args(args)?;
                self.tx_addr = addr;
            }
            "irq_bit" => {
                let bit = numeric_arg(args, "interrupt number")?;
                no_more_args(args)?;
                self.interrupt_bit = bit;
            }
            "endpoint" => {
                let endpoint = args
                    .next_arg()
                    .ok_or(ConfigError::MissingArgument("endpoint"))?;
                no_more_args(args)?;
                self.transport
                    .reconfigure(endpoint)
                    .map_err(|source| ConfigError::BadEndpoint {
                        endpoint: endpoint.to_string(),
                        source: Box::new(source),
                    })?;
            }
            _ => return Err(ConfigError::UnknownParameter(param.to_string())),
        }

        info!("spi: {} updated", param);
        Ok(())
    }
}
