// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    clap::{Arg, ArgMatches, Command},
    log::LevelFilter,
    std::{fs, io::Read, path::PathBuf},
    xpi_signer::{SignerConfig, SignerError, XpiSigner, MONITORING_PAYLOAD},
};

fn read_config(args: &ArgMatches) -> Result<SignerConfig, SignerError> {
    let path = PathBuf::from(args.value_of("config").expect("config is required"));
    let data = fs::read(&path)?;

    Ok(serde_json::from_slice(&data)?)
}

fn read_payload(args: &ArgMatches) -> Result<Vec<u8>, SignerError> {
    match args.value_of("input") {
        Some(path) => Ok(fs::read(path)?),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn command_sign_data(args: &ArgMatches) -> Result<(), SignerError> {
    let config = read_config(args)?;
    let signer = XpiSigner::new(config)?;

    let payload = read_payload(args)?;

    let options = match args.value_of("options_id") {
        Some(id) => serde_json::json!({ "id": id }),
        None => serde_json::Value::Null,
    };

    let signature = signer.sign_data(&payload, &options)?;

    let output = if args.is_present("pem") {
        signature.to_pem()
    } else {
        signature.marshal()?
    };

    match args.value_of("output") {
        Some(path) => fs::write(path, output)?,
        None => println!("{output}"),
    }

    Ok(())
}

fn command_monitor(args: &ArgMatches) -> Result<(), SignerError> {
    let config = read_config(args)?;
    let signer = XpiSigner::new(config)?;

    let options = serde_json::to_value(signer.default_options())?;
    let signature = signer.sign_data(MONITORING_PAYLOAD, &options)?;

    println!("{}", signature.marshal()?);

    Ok(())
}

fn command_config(args: &ArgMatches) -> Result<(), SignerError> {
    let config = read_config(args)?;
    let signer = XpiSigner::new(config)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "id": signer.config().id,
            "type": signer.config().signer_type,
            "mode": signer.config().mode,
        }))?
    );

    Ok(())
}

fn config_arg() -> Arg<'static> {
    Arg::new("config")
        .long("config")
        .takes_value(true)
        .required(true)
        .help("Path to a JSON signer configuration file")
}

fn main_impl() -> Result<(), SignerError> {
    let app = Command::new("xpi-signer")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Mozilla Release Engineering")
        .about("Mint XPI code-signing leaves and produce detached PKCS#7 signatures")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let app = app.subcommand(
        Command::new("sign-data")
            .about("Sign a payload, producing a detached PKCS#7 signature")
            .arg(config_arg())
            .arg(
                Arg::new("input")
                    .long("input")
                    .takes_value(true)
                    .help("Path to the payload to sign; defaults to stdin"),
            )
            .arg(
                Arg::new("output")
                    .long("output")
                    .takes_value(true)
                    .help("Path to write the signature to; defaults to stdout"),
            )
            .arg(
                Arg::new("options_id")
                    .long("id")
                    .takes_value(true)
                    .help("The requested common name, carried in the options value"),
            )
            .arg(
                Arg::new("pem")
                    .long("pem")
                    .takes_value(false)
                    .help("Emit PEM instead of base64"),
            ),
    );

    let app = app.subcommand(
        Command::new("monitor")
            .about("Sign the monitoring heartbeat payload using default options")
            .arg(config_arg()),
    );

    let app = app.subcommand(
        Command::new("config")
            .about("Validate a signer configuration and print its public fields")
            .arg(config_arg()),
    );

    let matches = app.get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();

    match matches.subcommand() {
        Some(("sign-data", args)) => command_sign_data(args),
        Some(("monitor", args)) => command_monitor(args),
        Some(("config", args)) => command_config(args),
        _ => Err(SignerError::ConfigInvalid("no subcommand given".to_string())),
    }
}

fn main() {
    let exit_code = match main_impl() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err}");
            1
        }
    };

    std::process::exit(exit_code)
}
