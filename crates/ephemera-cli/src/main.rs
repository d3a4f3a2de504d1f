// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ephemera — short-lived document artifact store.
//
// Entry point. Initialises logging, loads configuration and dispatches one
// subcommand against the storage root.

mod commands;
mod paths;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ephemera_core::ops::{PageRange, ProtectAction, Quality, RedactRegion, TargetFormat};
use ephemera_core::types::ArtifactId;

#[derive(Debug, Parser)]
#[command(name = "ephemera")]
#[command(author, version, about = "Short-lived document artifact store")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (JSON). Missing file means defaults.
    #[arg(long, global = true, env = "EPHEMERA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage root, overriding the configuration and environment.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a file as a new artifact
    Put {
        file: PathBuf,
        /// Name to record instead of the file's own
        #[arg(long)]
        name: Option<String>,
        /// MIME type; inferred from the extension when omitted
        #[arg(long = "type")]
        content_type: Option<String>,
    },

    /// Show an artifact's metadata and page count
    Info {
        id: ArtifactId,
        /// Re-hash the payload against the recorded digest
        #[arg(long)]
        verify: bool,
    },

    /// List stored artifacts, oldest first
    Ls,

    /// Download an artifact
    Get {
        id: ArtifactId,
        /// Destination file, or `-` for stdout (default: the artifact's name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete an artifact
    Rm { id: ArtifactId },

    /// Concatenate PDFs into one
    Merge {
        #[arg(required = true, num_args = 2..)]
        ids: Vec<ArtifactId>,
        /// Permutation of input positions, e.g. `2,0,1`
        #[arg(long, value_delimiter = ',')]
        order: Option<Vec<usize>>,
    },

    /// Extract page ranges (0-based, inclusive), one artifact per range
    Split {
        id: ArtifactId,
        /// `3` or `0-4`; repeat for several outputs
        #[arg(short, long = "range", required = true)]
        ranges: Vec<PageRange>,
    },

    /// Shrink a PDF
    Compress {
        id: ArtifactId,
        /// high, medium or low
        #[arg(short, long, default_value = "medium")]
        quality: Quality,
    },

    /// Convert to another format
    Convert {
        id: ArtifactId,
        /// pdf, txt, png, jpeg or docx
        #[arg(long)]
        to: TargetFormat,
    },

    /// Stamp a signature image onto a page
    Sign {
        id: ArtifactId,
        /// PNG or JPEG signature image
        #[arg(long)]
        image: PathBuf,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 72.0)]
        x: f32,
        #[arg(long, default_value_t = 72.0)]
        y: f32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
    },

    /// Black out rectangles
    Redact {
        id: ArtifactId,
        /// `page:x,y,width,height` in PDF points; repeatable
        #[arg(short, long = "region", required = true, value_parser = parse_region)]
        regions: Vec<RedactRegion>,
    },

    /// Fill AcroForm text fields
    Fill {
        id: ArtifactId,
        /// `name=value`; repeatable
        #[arg(short, long = "field", required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// Fail if any named field does not exist
        #[arg(long)]
        strict: bool,
    },

    /// Encrypt or decrypt with a passphrase
    Protect {
        id: ArtifactId,
        /// encrypt or decrypt
        action: ProtectAction,
        #[arg(long, env = "EPHEMERA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Recognise text in an image
    Ocr {
        id: ArtifactId,
        /// `en` or `eng`
        #[arg(long)]
        language: Option<String>,
    },

    /// Run one retention sweep
    Sweep,

    /// Run the retention sweeper until interrupted
    Serve,

    /// Print the effective configuration
    Config {
        /// Also write it to the configuration file
        #[arg(long)]
        write: bool,
    },
}

/// `page:x,y,width,height`.
fn parse_region(s: &str) -> Result<RedactRegion, String> {
    let (page, rect) = s
        .split_once(':')
        .ok_or_else(|| format!("expected page:x,y,width,height, got '{s}'"))?;
    let page = page
        .trim()
        .parse()
        .map_err(|_| format!("invalid page '{page}'"))?;
    let numbers = rect
        .split(',')
        .map(|n| n.trim().parse::<f32>().map_err(|_| format!("invalid number '{n}'")))
        .collect::<Result<Vec<_>, _>>()?;
    let [x, y, width, height] = numbers[..] else {
        return Err(format!("expected four numbers after the page, got {}", numbers.len()));
    };
    Ok(RedactRegion {
        page,
        x,
        y,
        width,
        height,
    })
}

/// `name=value`. The value may itself contain `=`.
fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{s}'")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let public = err.public_error();
            eprintln!("{}: {}", public.kind, public.message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn regions_parse() {
        let region = parse_region("2:10,20.5,100,40").unwrap();
        assert_eq!(region.page, 2);
        assert_eq!(region.y, 20.5);
        assert_eq!(region.height, 40.0);

        assert!(parse_region("10,20,100,40").is_err());
        assert!(parse_region("0:10,20,100").is_err());
        assert!(parse_region("x:1,2,3,4").is_err());
    }

    #[test]
    fn fields_parse() {
        assert_eq!(
            parse_field("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_field("empty=").unwrap().1, "");
        assert!(parse_field("=value").is_err());
        assert!(parse_field("novalue").is_err());
    }

    #[test]
    fn operation_arguments_parse() {
        let cli = Cli::try_parse_from([
            "ephemera",
            "--root",
            "/tmp/eph",
            "split",
            "6f1c2a4e-8d0b-4c3e-9a57-0c1d2e3f4a5b",
            "-r",
            "0-1",
            "-r",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/eph")));
        match cli.command {
            Command::Split { ranges, .. } => {
                assert_eq!(ranges, vec![PageRange::new(0, 1), PageRange::new(3, 3)]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn merge_needs_two_ids() {
        let one = Cli::try_parse_from(["ephemera", "merge", "6f1c2a4e-8d0b-4c3e-9a57-0c1d2e3f4a5b"]);
        assert!(one.is_err());
    }
}
