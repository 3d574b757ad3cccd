// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    apple_ipa_validate::{
        IpaValidateError, ValidationPipeline, ValidationReport, ValidationSettings, VerifierKind,
    },
    clap::{Arg, ArgMatches, Command},
    log::{error, LevelFilter},
    std::{io::Write, path::Path, str::FromStr},
};

const ABOUT: &str = "\
Validate an iOS application archive (.ipa) for distribution.

The archive is unpacked, its Payload directory and app bundle are checked,
the bundle's Info.plist is read, the embedded provisioning profile is
unwrapped and cross checked against the bundle identifier, and the
architectures of the main executable are listed.

The certificate chain of the provisioning profile is NOT evaluated.

The exit code is 0 if validation passed and 1 otherwise.
";

fn write_report(report: &ValidationReport, format: &str) -> Result<(), IpaValidateError> {
    let stdout = std::io::stdout();
    let mut fh = stdout.lock();

    match format {
        "json" => {
            writeln!(fh, "{}", report.to_json()?)?;
        }
        "text" => {
            report.write_text(&mut fh)?;
        }
        _ => return Err(IpaValidateError::CliBadArgument),
    }

    Ok(())
}

/// Returns whether validation passed.
fn command_validate(args: &ArgMatches) -> Result<bool, IpaValidateError> {
    let input = args
        .value_of("input")
        .ok_or(IpaValidateError::CliBadArgument)?;
    let format = args.value_of("format").unwrap_or("text");

    let mut settings = ValidationSettings::default();
    if let Some(verifier) = args.value_of("verifier") {
        settings.set_verifier(VerifierKind::from_str(verifier)?);
    }
    if let Some(path) = args.value_of("openssl_exe") {
        settings.set_openssl_exe(path);
    }

    let pipeline = ValidationPipeline::new(settings);

    let report = if args.is_present("unpacked") {
        if args.is_present("dest_dir") {
            return Err(IpaValidateError::CliGeneralError(
                "--dest-dir cannot be used with --unpacked".into(),
            ));
        }
        pipeline.validate_directory(input)?
    } else {
        pipeline.validate_archive(input, args.value_of("dest_dir").map(Path::new))?
    };

    write_report(&report, format)?;

    if !report.passed() {
        error!("validation of {} failed", input);
    }

    Ok(report.passed())
}

fn main_impl() -> Result<bool, IpaValidateError> {
    let app = Command::new("ipa-validate")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Validate iOS application archives")
        .long_about(ABOUT)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        )
        .arg(
            Arg::new("dest_dir")
                .long("dest-dir")
                .takes_value(true)
                .help("Directory to extract the archive into. It is not removed afterwards"),
        )
        .arg(
            Arg::new("verifier")
                .long("verifier")
                .takes_value(true)
                .possible_values(&["native", "openssl"])
                .default_value("native")
                .help("How to unwrap the signed provisioning profile"),
        )
        .arg(
            Arg::new("openssl_exe")
                .long("openssl-exe")
                .takes_value(true)
                .help("Path to the openssl executable used by --verifier openssl"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .takes_value(true)
                .possible_values(&["text", "json"])
                .default_value("text")
                .help("Output format of the validation report"),
        )
        .arg(
            Arg::new("unpacked")
                .long("unpacked")
                .help("Treat the input as an already extracted archive directory"),
        )
        .arg(
            Arg::new("input")
                .required(true)
                .help("Path to the .ipa file (or directory with --unpacked) to validate"),
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

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();

    command_validate(&matches)
}

/// The line printed to stderr when a run ends in an error.
fn error_line(err: &IpaValidateError) -> String {
    format!("Error: {}", err)
}

fn main() {
    let exit_code = match main_impl() {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            eprintln!("{}", error_line(&err));
            1
        }
    };

    std::process::exit(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_line_is_message_only() {
        assert_eq!(
            error_line(&IpaValidateError::UnknownMagic(0xdeadbeef)),
            "Error: unknown header magic: 0xdeadbeef"
        );
    }
}
