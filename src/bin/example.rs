//! Command-line front end
//!
//! Issues one request and prints the status reason; on a 200 the body goes
//! to `--output` or stdout.

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use httpreq::{Error, InternetProtocol, Request};

const USAGE: &str = "example --uri <url> [--protocol ipv4|ipv6] [--method <method>] \
[--arguments <body>] [--output <file>]";

struct Options {
    uri: String,
    protocol: InternetProtocol,
    method: String,
    arguments: String,
    output: Option<String>,
    help: bool,
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        uri: String::new(),
        protocol: InternetProtocol::V4,
        method: "GET".to_string(),
        arguments: String::new(),
        output: None,
        help: false,
    };

    let mut arguments = std::env::args().skip(1);
    while let Some(flag) = arguments.next() {
        match flag.as_str() {
            "--help" => options.help = true,
            "--uri" => {
                options.uri = arguments
                    .next()
                    .ok_or("Missing argument for --uri".to_string())?;
            }
            "--protocol" => {
                let value = arguments
                    .next()
                    .ok_or("Missing argument for --protocol".to_string())?;
                options.protocol = match value.as_str() {
                    "ipv4" => InternetProtocol::V4,
                    "ipv6" => InternetProtocol::V6,
                    _ => return Err("Invalid protocol".to_string()),
                };
            }
            "--method" => {
                options.method = arguments
                    .next()
                    .ok_or("Missing argument for --method".to_string())?;
            }
            "--arguments" => {
                options.arguments = arguments
                    .next()
                    .ok_or("Missing argument for --arguments".to_string())?;
            }
            "--output" => {
                options.output = Some(
                    arguments
                        .next()
                        .ok_or("Missing argument for --output".to_string())?,
                );
            }
            _ => return Err(format!("Invalid flag: {flag}")),
        }
    }

    Ok(options)
}

fn main() -> ExitCode {
    let options = match parse_options() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    if options.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let request = match Request::with_protocol(&options.uri, options.protocol) {
        Ok(request) => request,
        Err(error) => return report(&error),
    };

    let header_fields = [
        (
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ),
        ("User-Agent".to_string(), "httpreq/0.1".to_string()),
        ("Accept".to_string(), "*/*".to_string()),
    ];

    let response = match request.send(
        &options.method,
        options.arguments.as_bytes(),
        &header_fields,
        Some(Duration::from_secs(2)),
    ) {
        Ok(response) => response,
        Err(error) => return report(&error),
    };

    println!("{}", response.status.reason);

    if response.status.code == 200 {
        let result = match options.output {
            Some(path) => std::fs::write(path, &response.body),
            None => std::io::stdout().write_all(&response.body),
        };
        if let Err(error) = result {
            eprintln!("Error: {error}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn report(error: &Error) -> ExitCode {
    match error {
        Error::Request(error) => eprintln!("Request error: {error}"),
        Error::Response(error) => eprintln!("Response error: {error}"),
        Error::System(error) => eprintln!("Error: {error}"),
    }
    ExitCode::FAILURE
}
