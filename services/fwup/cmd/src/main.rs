//! Firmware update tool.
//!
//! Generates key material, protects firmware images into authenticated
//! blobs, inspects blobs and streams them to a device bootloader over a
//! serial port.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fwup_bundle::{bundle, open_blob, Blob, KeyMaterial};
use fwup_session::{open_serial, SessionConfig, SessionError, UpdateSession};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::FwupConfig;
use logging::FwupLogFormatter;

/// Secure firmware update toolkit
#[derive(Parser, Debug)]
#[command(name = "fwup", version, about = "Protect firmware images and stream them to a bootloader")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Configuration file path
    #[arg(long, global = true, default_value = "fwup.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh key artifact for a bootloader build
    Keygen {
        /// Where to write the 48-byte key artifact
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print both keys as C initializer lists
        #[arg(long)]
        print_c_arrays: bool,
    },

    /// Encrypt and authenticate a firmware image
    Protect {
        /// Path to the raw firmware image
        #[arg(long)]
        infile: PathBuf,

        /// Where to write the protected blob
        #[arg(long)]
        outfile: PathBuf,

        /// Firmware version
        #[arg(long)]
        version: u16,

        /// Release message
        #[arg(long)]
        message: String,

        /// Key artifact (defaults to the configured path)
        #[arg(long)]
        secrets: Option<PathBuf>,
    },

    /// Verify a protected blob and summarize its contents
    Inspect {
        /// Path to the protected blob
        #[arg(long)]
        firmware: PathBuf,

        /// Key artifact (defaults to the configured path)
        #[arg(long)]
        secrets: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stream a protected blob to a device in update mode
    Update {
        /// Serial device node, e.g. /dev/ttyACM0
        #[arg(long)]
        port: Option<PathBuf>,

        /// Line speed in baud (default 115200)
        #[arg(long)]
        baud: Option<u32>,

        /// Path to the protected blob
        #[arg(long)]
        firmware: PathBuf,

        /// Log every frame
        #[arg(long)]
        debug: bool,

        /// Response timeout, e.g. 2s
        #[arg(long)]
        response_timeout: Option<humantime::Duration>,

        /// Handshake timeout, e.g. 5s
        #[arg(long)]
        handshake_timeout: Option<humantime::Duration>,
    },
}

impl Args {
    /// Effective log level; `update --debug` forces debug output
    fn effective_log_level(&self) -> &str {
        match self.command {
            Command::Update { debug: true, .. } => "debug",
            _ => &self.log_level,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.effective_log_level())?;

    let config = FwupConfig::load_from_file(&args.config)?;

    match args.command {
        Command::Keygen {
            out,
            print_c_arrays,
        } => keygen(out.as_deref().unwrap_or(config.secrets.as_path()), print_c_arrays),
        Command::Protect {
            infile,
            outfile,
            version,
            message,
            secrets,
        } => {
            let secrets = secrets.unwrap_or_else(|| config.secrets.clone());
            protect(&infile, &outfile, version, &message, &secrets)
        }
        Command::Inspect {
            firmware,
            secrets,
            json,
        } => {
            let secrets = secrets.unwrap_or_else(|| config.secrets.clone());
            inspect(&firmware, &secrets, json)
        }
        Command::Update {
            port,
            baud,
            firmware,
            debug: _,
            response_timeout,
            handshake_timeout,
        } => {
            let Some(port) = port.or_else(|| config.port.clone()) else {
                bail!("no serial port given (use --port, FWUP_PORT or the config file)");
            };
            let mut session_config = config.session_config();
            if let Some(wait) = response_timeout {
                session_config.response_timeout = wait.into();
            }
            if let Some(wait) = handshake_timeout {
                session_config.handshake_timeout = wait.into();
            }
            let baud_rate = baud.unwrap_or(config.baud_rate);
            update(&port, baud_rate, &firmware, session_config).await
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let env_filter = EnvFilter::new("info")
        .add_directive(format!("fwup={}", level).parse()?)
        .add_directive(format!("fwup_wire={}", level).parse()?)
        .add_directive(format!("fwup_bundle={}", level).parse()?)
        .add_directive(format!("fwup_session={}", level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(FwupLogFormatter::new("fwup".to_string()))
        .init();
    Ok(())
}

fn keygen(out: &Path, print_c_arrays: bool) -> Result<()> {
    let keys = KeyMaterial::generate();
    keys.store(out)
        .with_context(|| format!("failed to write key artifact {:?}", out))?;
    component_info!("keygen", "Generated key artifact {:?}", out);

    if print_c_arrays {
        let (cbc, hmac) = keys.c_arrays();
        println!("CBC={}", cbc);
        println!("HMAC={}", hmac);
    }
    Ok(())
}

fn protect(infile: &Path, outfile: &Path, version: u16, message: &str, secrets: &Path) -> Result<()> {
    let keys = load_keys(secrets)?;
    let firmware =
        std::fs::read(infile).with_context(|| format!("failed to read firmware {:?}", infile))?;

    let blob = bundle(&firmware, version, message, &keys)
        .with_context(|| format!("cannot protect {:?}", infile))?;
    blob.write_to(outfile)
        .with_context(|| format!("failed to write blob {:?}", outfile))?;

    component_info!(
        "protect",
        "Protected {} byte firmware as version {} ({} chunks)",
        firmware.len(),
        version,
        blob.metadata().chunk_count()
    );
    Ok(())
}

fn inspect(path: &Path, secrets: &Path, json: bool) -> Result<()> {
    let keys = load_keys(secrets)?;
    let blob = read_blob(path)?;
    let opened = open_blob(blob.as_bytes(), &keys)
        .with_context(|| format!("blob {:?} failed verification", path))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&opened)?);
    } else {
        println!("version:       {}", opened.metadata.version);
        println!("firmware size: {} bytes", opened.metadata.firmware_size);
        println!("message:       {}", opened.message);
        println!("chunks:        {}", opened.chunks);
        println!("blob size:     {} bytes", blob.len());
    }
    component_info!("inspect", "Blob {:?} verified", path);
    Ok(())
}

async fn update(
    port: &Path,
    baud_rate: u32,
    firmware: &Path,
    config: SessionConfig,
) -> Result<()> {
    // validated before the port is touched
    let blob = read_blob(firmware)?;
    let metadata = blob.metadata();
    info!(
        "Updating {:?} at {} baud to version {} ({} byte firmware, {} byte blob)",
        port,
        baud_rate,
        metadata.version,
        metadata.firmware_size,
        blob.len()
    );

    let channel = open_serial(&port.to_string_lossy(), baud_rate)
        .with_context(|| format!("failed to open serial port {:?}", port))?;
    let mut session = UpdateSession::new(channel, config);

    match session.run(blob.as_bytes()).await {
        Ok(report) => {
            component_info!(
                "update",
                "Installed version {}: {} bytes, {} frames, {} bytes written in {:?}",
                report.version,
                report.firmware_size,
                report.stats.frames_sent,
                report.stats.bytes_out,
                report.elapsed
            );
            Ok(())
        }
        Err(err) => {
            if let SessionError::Protocol { last_sent, .. }
            | SessionError::DeviceRejected { last_sent, .. } = &err
            {
                component_error!(
                    "update",
                    "Last {} bytes sent before failure: {:02x?}",
                    last_sent.len(),
                    &last_sent[..last_sent.len().min(16)]
                );
            }
            Err(err).context("firmware update failed")
        }
    }
}

fn load_keys(path: &Path) -> Result<KeyMaterial> {
    KeyMaterial::load(path).with_context(|| format!("failed to load key artifact {:?}", path))
}

fn read_blob(path: &Path) -> Result<Blob> {
    Blob::read_from(path).with_context(|| format!("failed to read blob {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_update_debug_forces_debug_level() {
        let args = Args::parse_from([
            "fwup",
            "update",
            "--port",
            "/dev/ttyACM0",
            "--firmware",
            "blob.bin",
            "--debug",
        ]);
        assert_eq!(args.effective_log_level(), "debug");

        let args = Args::parse_from(["fwup", "--log-level", "warn", "keygen"]);
        assert_eq!(args.effective_log_level(), "warn");
    }

    #[test]
    fn test_update_timeouts_parse_as_durations() {
        let args = Args::parse_from([
            "fwup",
            "update",
            "--firmware",
            "blob.bin",
            "--response-timeout",
            "750ms",
        ]);
        match args.command {
            Command::Update {
                port,
                baud,
                response_timeout,
                ..
            } => {
                assert!(port.is_none());
                assert!(baud.is_none());
                let wait: std::time::Duration = response_timeout.unwrap().into();
                assert_eq!(wait, std::time::Duration::from_millis(750));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_update_baud_flag() {
        let args = Args::parse_from([
            "fwup",
            "update",
            "--port",
            "/dev/ttyUSB0",
            "--baud",
            "57600",
            "--firmware",
            "blob.bin",
        ]);
        match args.command {
            Command::Update { baud, .. } => assert_eq!(baud, Some(57_600)),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Args::try_parse_from([
            "fwup",
            "update",
            "--baud",
            "fast",
            "--firmware",
            "blob.bin",
        ])
        .is_err());
    }

    #[test]
    fn test_keygen_protect_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secret_build_output.txt");
        let infile = dir.path().join("firmware.bin");
        let outfile = dir.path().join("firmware.prot");

        keygen(&secrets, false).unwrap();
        assert_eq!(std::fs::metadata(&secrets).unwrap().len(), 48);

        std::fs::write(&infile, vec![0xA5u8; 1000]).unwrap();
        protect(&infile, &outfile, 7, "release 7", &secrets).unwrap();

        let blob = Blob::read_from(&outfile).unwrap();
        assert_eq!(blob.metadata().version, 7);
        assert_eq!(blob.metadata().firmware_size, 1000);

        inspect(&outfile, &secrets, true).unwrap();

        // a different key artifact cannot open the blob
        let other = dir.path().join("other.txt");
        keygen(&other, false).unwrap();
        assert!(inspect(&outfile, &other, false).is_err());
    }

    #[test]
    fn test_protect_rejects_empty_firmware() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("keys");
        let infile = dir.path().join("empty.bin");
        keygen(&secrets, false).unwrap();
        std::fs::write(&infile, b"").unwrap();

        let err = protect(&infile, &dir.path().join("out"), 1, "", &secrets).unwrap_err();
        assert!(err.to_string().contains("cannot protect"));
        assert!(!dir.path().join("out").exists());
    }
}
