use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sm3_crypto::Engine;

#[derive(Parser)]
#[command(
    name = "sm3",
    about = "SM3 hashing, Merkle inclusion proofs and a length-extension demo",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with engine and tree settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum EngineArg {
    Reference,
    Optimized,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Reference => Engine::Reference,
            EngineArg::Optimized => Engine::Optimized,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Hash text, a file, or stdin
    Hash(HashArgs),
    /// Check the standard test vectors and engine agreement
    Selftest(SelftestArgs),
    /// Extend a digest of an unknown message with a suffix
    Extend(ExtendArgs),
    /// Run a secret-prefix length-extension attack end to end
    ExtensionDemo(ExtensionDemoArgs),
    /// Build a Merkle tree and prove leaves
    Merkle(MerkleArgs),
    /// Time the reference and optimized engines
    Bench(BenchArgs),
}

#[derive(Args)]
pub struct HashArgs {
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,
    #[arg(long)]
    pub file: Option<PathBuf>,
    #[arg(long)]
    pub engine: Option<EngineArg>,
}

#[derive(Args)]
pub struct SelftestArgs {
    /// Random blocks compared between engines
    #[arg(long, default_value = "256")]
    pub blocks: usize,
}

#[derive(Args)]
pub struct ExtendArgs {
    /// Hex digest of the original message
    #[arg(long)]
    pub digest: String,
    /// Length of the original message in bytes
    #[arg(long)]
    pub length: u64,
    #[arg(long)]
    pub suffix: String,
}

#[derive(Args)]
pub struct ExtensionDemoArgs {
    #[arg(long, default_value = "secret_key")]
    pub secret: String,
    #[arg(long, default_value = "hello world")]
    pub message: String,
    #[arg(long, default_value = "attack_data")]
    pub suffix: String,
}

#[derive(Args)]
pub struct MerkleArgs {
    /// Number of synthetic `leaf_data_{i}` leaves
    #[arg(long, default_value = "100000", conflicts_with = "leaves")]
    pub count: usize,
    /// File with one leaf per line
    #[arg(long)]
    pub leaves: Option<PathBuf>,
    /// Leaf index to prove and verify
    #[arg(long)]
    pub prove: Option<usize>,
    /// Leaf data to run the absence check for
    #[arg(long)]
    pub absent: Option<String>,
}

#[derive(Args)]
pub struct BenchArgs {
    #[arg(long, default_value = "4096")]
    pub size: usize,
    #[arg(short = 'n', long, default_value = "1000")]
    pub iterations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hash_text() {
        let cli = Cli::try_parse_from(["sm3", "hash", "--text", "abc"]).unwrap();
        if let Command::Hash(args) = cli.command {
            assert_eq!(args.text, Some("abc".into()));
            assert!(args.engine.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_hash_engine() {
        let cli = Cli::try_parse_from(["sm3", "hash", "--engine", "reference"]).unwrap();
        if let Command::Hash(args) = cli.command {
            assert!(matches!(args.engine, Some(EngineArg::Reference)));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn hash_text_and_file_conflict() {
        assert!(Cli::try_parse_from(["sm3", "hash", "--text", "a", "--file", "x"]).is_err());
    }

    #[test]
    fn parse_selftest() {
        let cli = Cli::try_parse_from(["sm3", "selftest"]).unwrap();
        if let Command::Selftest(args) = cli.command {
            assert_eq!(args.blocks, 256);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_extend() {
        let cli = Cli::try_parse_from([
            "sm3", "extend", "--digest", "00", "--length", "21", "--suffix", "x",
        ])
        .unwrap();
        if let Command::Extend(args) = cli.command {
            assert_eq!(args.length, 21);
            assert_eq!(args.suffix, "x");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn extend_requires_length() {
        assert!(Cli::try_parse_from(["sm3", "extend", "--digest", "00", "--suffix", "x"]).is_err());
    }

    #[test]
    fn parse_extension_demo_defaults() {
        let cli = Cli::try_parse_from(["sm3", "extension-demo"]).unwrap();
        if let Command::ExtensionDemo(args) = cli.command {
            assert_eq!(args.secret, "secret_key");
            assert_eq!(args.message, "hello world");
            assert_eq!(args.suffix, "attack_data");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_merkle_prove() {
        let cli = Cli::try_parse_from(["sm3", "merkle", "--count", "5", "--prove", "3"]).unwrap();
        if let Command::Merkle(args) = cli.command {
            assert_eq!(args.count, 5);
            assert_eq!(args.prove, Some(3));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_bench() {
        let cli = Cli::try_parse_from(["sm3", "bench", "--size", "64", "-n", "10"]).unwrap();
        if let Command::Bench(args) = cli.command {
            assert_eq!(args.size, 64);
            assert_eq!(args.iterations, 10);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "sm3", "--verbose", "--format", "json", "--config", "sm3.toml", "selftest",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.config, Some(PathBuf::from("sm3.toml")));
    }

    #[test]
    fn engine_arg_converts() {
        assert_eq!(Engine::from(EngineArg::Optimized), Engine::Optimized);
    }
}
