// ABOUTME: Operator CLI generating the RSA key pair that provisions the token service
// ABOUTME: Writes SPKI public / PKCS8 private PEM files for the server configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Cadence Works

use anyhow::Result;
use cadence_auth::crypto::keys::generate_rsa_key_pair_pem;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "cadence-keygen",
    about = "Generate the RSA key pair used for RS256 access token signing"
)]
struct Args {
    /// Directory to write the PEM files into
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Basename for the generated files
    #[arg(long, default_value = "cadence")]
    prefix: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Generating 2048-bit RSA key pair");
    let pair = generate_rsa_key_pair_pem()?;

    std::fs::create_dir_all(&args.out_dir)?;
    let private_path = args.out_dir.join(format!("{}_private.pem", args.prefix));
    let public_path = args.out_dir.join(format!("{}_public.pem", args.prefix));

    std::fs::write(&private_path, pair.private_key_pem)?;
    std::fs::write(&public_path, pair.public_key_pem)?;

    info!(
        private_key = %private_path.display(),
        public_key = %public_path.display(),
        "Key pair written"
    );
    println!("Private key: {}", private_path.display());
    println!("Public key:  {}", public_path.display());
    println!("Keep the private key out of version control and readable only by the server user.");

    Ok(())
}
