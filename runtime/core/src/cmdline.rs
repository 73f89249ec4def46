// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2022 Takashi Sakamoto

use {
    super::{Error, ErrorKind, LogLevel, RuntimeOperation},
    clap::Parser,
};

pub trait ServiceCmd<A, T, R>: Sized
where
    A: Parser,
    R: RuntimeOperation<T>,
{
    fn params(args: &A) -> (T, Option<LogLevel>);

    fn run() {
        let code = A::try_parse()
            .map_err(|err| err.to_string())
            .map(|args| Self::params(&args))
            .and_then(|(params, log_level)| {
                R::new(params, log_level)
                    .and_then(|mut runtime| {
                        runtime.listen()?;
                        runtime.run()?;
                        Ok(libc::EXIT_SUCCESS)
                    })
                    .map_err(|err| specific_err_to_string(&err))
            })
            .unwrap_or_else(|msg| {
                eprintln!("{}", msg);
                libc::EXIT_FAILURE
            });

        std::process::exit(code)
    }
}

fn specific_err_to_string(e: &Error) -> String {
    let domain = match e.kind() {
        ErrorKind::Inval => "Configuration error",
        ErrorKind::Busy => "Card operation error",
        ErrorKind::Nxio => "Device detection error",
        ErrorKind::Failed => "Unknown domain error",
    };
    format!("{}: {}", domain, e)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_domain() {
        let err = Error::new(ErrorKind::Nxio, "TCO module is not detected");
        assert_eq!(
            specific_err_to_string(&err),
            "Device detection error: No such device: TCO module is not detected"
        );
    }
}
